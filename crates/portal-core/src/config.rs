//! Portal configuration loaded from the process environment

use crate::session::SessionScope;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

/// Configuration error naming the offending variable
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Required variable is not set
    #[error("{0} must be set")]
    Missing(&'static str),

    /// Variable is set but cannot be parsed
    #[error("invalid {key} value {value:?}: {message}")]
    Invalid {
        /// Variable name
        key: &'static str,
        /// Raw value
        value: String,
        /// Parser message
        message: String,
    },
}

/// Which `PortalStore` backend to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Process-local store; contents vanish on exit
    #[default]
    Memory,
    /// JSON files under the data directory
    Json,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            "json" | "file" => Ok(Self::Json),
            other => Err(format!("expected memory or json, got {other}")),
        }
    }
}

impl Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::Json => "json",
        })
    }
}

/// Portal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Admin credential
    #[serde(skip_serializing, default)]
    pub admin_secret: String,
    /// Store backend
    pub backend: BackendKind,
    /// Root for the JSON store, blob files and session files
    pub data_dir: PathBuf,
    /// How long a sign-in survives
    pub session_scope: SessionScope,
    /// Token lifetime for durable sessions
    pub session_ttl_secs: u64,
    /// Extra attempts for a failed counter increment
    pub counter_retries: u32,
    /// Prefix of public blob URLs
    pub public_base_url: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            admin_secret: String::new(),
            backend: BackendKind::Memory,
            data_dir: PathBuf::from("./portal-data"),
            session_scope: SessionScope::Tab,
            session_ttl_secs: 7 * 24 * 60 * 60,
            counter_retries: 2,
            public_base_url: "/media".to_string(),
        }
    }
}

impl PortalConfig {
    /// Create default configuration with the given admin secret
    #[inline]
    #[must_use]
    pub fn new(admin_secret: impl Into<String>) -> Self {
        Self {
            admin_secret: admin_secret.into(),
            ..Self::default()
        }
    }

    /// With backend
    #[inline]
    #[must_use]
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// With data directory
    #[inline]
    #[must_use]
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// With session scope
    #[inline]
    #[must_use]
    pub fn with_session_scope(mut self, scope: SessionScope) -> Self {
        self.session_scope = scope;
        self
    }

    /// With counter retries
    #[inline]
    #[must_use]
    pub fn with_counter_retries(mut self, retries: u32) -> Self {
        self.counter_retries = retries;
        self
    }

    /// Load from `PORTAL_*` environment variables
    ///
    /// # Errors
    /// `ConfigError::Missing` without `PORTAL_ADMIN_SECRET`, `ConfigError::Invalid`
    /// for unparsable values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup
    ///
    /// # Errors
    /// See [`PortalConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let admin_secret = lookup("PORTAL_ADMIN_SECRET")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("PORTAL_ADMIN_SECRET"))?;

        Ok(Self {
            admin_secret,
            backend: try_load(&lookup, "PORTAL_BACKEND", defaults.backend)?,
            data_dir: try_load(&lookup, "PORTAL_DATA_DIR", defaults.data_dir)?,
            session_scope: try_load(&lookup, "PORTAL_SESSION_SCOPE", defaults.session_scope)?,
            session_ttl_secs: try_load(&lookup, "PORTAL_SESSION_TTL_SECS", defaults.session_ttl_secs)?,
            counter_retries: try_load(&lookup, "PORTAL_COUNTER_RETRIES", defaults.counter_retries)?,
            public_base_url: try_load(&lookup, "PORTAL_PUBLIC_BASE_URL", defaults.public_base_url)?,
        })
    }

    /// Directory of the JSON store
    #[must_use]
    pub fn store_dir(&self) -> PathBuf {
        self.data_dir.join("store")
    }

    /// Directory of uploaded blobs
    #[must_use]
    pub fn blob_dir(&self) -> PathBuf {
        self.data_dir.join("blobs")
    }

    /// Directory of persisted sessions
    #[must_use]
    pub fn session_dir(&self) -> PathBuf {
        self.data_dir.join("session")
    }
}

fn try_load<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + std::fmt::Debug,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| {
            tracing::warn!("Invalid {key} value: {e}");
            ConfigError::Invalid {
                key,
                value: raw.clone(),
                message: e.to_string(),
            }
        }),
        None => {
            tracing::info!("{key} not set, using default: {default:?}");
            Ok(default)
        }
    }
}
