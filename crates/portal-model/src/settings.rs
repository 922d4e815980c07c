//! Singleton settings

use crate::article::Platform;
use serde::{Deserialize, Serialize};

/// Portal-wide social profile links; exactly one instance exists once saved
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SocialLinks {
    /// Facebook page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fb: Option<String>,
    /// Instagram profile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insta: Option<String>,
    /// X profile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
}

impl SocialLinks {
    /// Settings key the singleton is stored under
    pub const KEY: &'static str = "social_links";

    /// Link for one platform
    #[must_use]
    pub fn get(&self, platform: Platform) -> Option<&str> {
        match platform {
            Platform::Facebook => self.fb.as_deref(),
            Platform::Instagram => self.insta.as_deref(),
            Platform::X => self.x.as_deref(),
        }
    }

    /// Drop blank entries
    #[must_use]
    pub fn normalized(self) -> Self {
        let keep = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Self {
            fb: keep(self.fb),
            insta: keep(self.insta),
            x: keep(self.x),
        }
    }
}
