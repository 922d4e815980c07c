//! Media descriptors, upload payloads and media-kit assets

use crate::error::ValidationError;
use crate::id::RecordId;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Broad kind of a featured media file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Still image
    Image,
    /// Video clip
    Video,
    /// Anything else (PDF, office documents, ...)
    Document,
}

impl MediaKind {
    /// Classify by MIME type
    #[must_use]
    pub fn from_mime(mime_type: &str) -> Self {
        if mime_type.starts_with("image/") {
            Self::Image
        } else if mime_type.starts_with("video/") {
            Self::Video
        } else {
            Self::Document
        }
    }
}

/// Descriptor of a stored or linked file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Public URL (may be a `data:` URL for inline media)
    pub url: String,
    /// Original file name
    pub name: String,
    /// MIME type
    #[serde(default)]
    pub mime_type: String,
    /// Blob-store path when the file was uploaded through the portal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<String>,
}

impl FileDescriptor {
    /// Create a descriptor for an externally hosted file
    #[must_use]
    pub fn new(url: impl Into<String>, name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            mime_type: mime_type.into(),
            storage_path: None,
        }
    }

    /// Mark the descriptor as backed by a blob at `path`
    #[must_use]
    pub fn with_storage_path(mut self, path: impl Into<String>) -> Self {
        self.storage_path = Some(path.into());
        self
    }
}

/// Featured media of an article
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeaturedMedia {
    /// Public URL
    pub url: String,
    /// Kind of media
    #[serde(rename = "type")]
    pub kind: MediaKind,
    /// Original file name
    pub name: String,
    /// MIME type
    #[serde(default)]
    pub mime_type: String,
    /// Blob-store path when uploaded through the portal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<String>,
}

impl FeaturedMedia {
    /// Describe an already hosted file; kind is derived from the MIME type
    #[must_use]
    pub fn new(url: impl Into<String>, name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        let mime_type = mime_type.into();
        Self {
            url: url.into(),
            kind: MediaKind::from_mime(&mime_type),
            name: name.into(),
            mime_type,
            storage_path: None,
        }
    }
}

impl From<FileDescriptor> for FeaturedMedia {
    fn from(file: FileDescriptor) -> Self {
        Self {
            kind: MediaKind::from_mime(&file.mime_type),
            url: file.url,
            name: file.name,
            mime_type: file.mime_type,
            storage_path: file.storage_path,
        }
    }
}

/// Raw file contents awaiting upload
#[derive(Clone, PartialEq, Eq)]
pub struct FilePayload {
    /// File name as chosen by the uploader
    pub name: String,
    /// MIME type
    pub mime_type: String,
    /// File bytes
    pub bytes: Vec<u8>,
}

impl FilePayload {
    /// Create payload from bytes
    #[must_use]
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Decode a base64 `data:` URL (`data:<mime>;base64,<payload>`)
    ///
    /// # Errors
    /// `ValidationError::InvalidDataUrl` when the header or the base64 body is malformed.
    pub fn from_data_url(name: impl Into<String>, data_url: &str) -> Result<Self, ValidationError> {
        let rest = data_url
            .strip_prefix("data:")
            .ok_or_else(|| ValidationError::InvalidDataUrl("missing data: prefix".to_string()))?;
        let (header, body) = rest
            .split_once(',')
            .ok_or_else(|| ValidationError::InvalidDataUrl("missing payload separator".to_string()))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| ValidationError::InvalidDataUrl("only base64 payloads are supported".to_string()))?;
        if mime_type.is_empty() {
            return Err(ValidationError::InvalidDataUrl("missing MIME type".to_string()));
        }
        let bytes = STANDARD
            .decode(body.trim())
            .map_err(|e| ValidationError::InvalidDataUrl(e.to_string()))?;

        Ok(Self::new(name, mime_type, bytes))
    }

    /// Size in bytes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when the payload carries no bytes
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for FilePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilePayload")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Featured media as supplied on a form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaInput {
    /// Keep an existing descriptor as-is (hosted URL or inline `data:` URL)
    Linked(FeaturedMedia),
    /// Upload bytes through the blob store first
    Upload(FilePayload),
}

impl MediaInput {
    /// Decode a `data:` URL into an upload
    ///
    /// # Errors
    /// See [`FilePayload::from_data_url`].
    pub fn from_data_url(name: impl Into<String>, data_url: &str) -> Result<Self, ValidationError> {
        FilePayload::from_data_url(name, data_url).map(Self::Upload)
    }
}

/// Media-kit category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MediaAssetCategory {
    /// Logos
    #[serde(rename = "Logos")]
    Logo,
    /// Banners
    #[serde(rename = "Banners")]
    Banner,
    /// Leader photos
    #[serde(rename = "Leader Photos")]
    LeaderPhotos,
    /// Event templates
    #[serde(rename = "Event Templates")]
    EventTemplates,
    /// Anything else
    #[default]
    #[serde(rename = "General")]
    General,
}

impl MediaAssetCategory {
    /// All categories in display order
    pub const ALL: [Self; 5] = [
        Self::Logo,
        Self::Banner,
        Self::LeaderPhotos,
        Self::EventTemplates,
        Self::General,
    ];

    /// Display label
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Logo => "Logos",
            Self::Banner => "Banners",
            Self::LeaderPhotos => "Leader Photos",
            Self::EventTemplates => "Event Templates",
            Self::General => "General",
        }
    }
}

/// A downloadable media-kit file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAsset {
    /// Unique id
    pub id: RecordId,
    /// Title
    pub title: String,
    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Category
    pub category: MediaAssetCategory,
    /// Stored file
    pub file: FileDescriptor,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl MediaAsset {
    /// Sort newest first by creation time
    pub fn sort_newest_first(assets: &mut [MediaAsset]) {
        assets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }

    /// Assets of one category, or all when `category` is `None`
    #[must_use]
    pub fn filter_by_category(assets: &[MediaAsset], category: Option<MediaAssetCategory>) -> Vec<&MediaAsset> {
        assets
            .iter()
            .filter(|a| category.map_or(true, |c| a.category == c))
            .collect()
    }
}

/// Upload form for a media asset
#[derive(Debug, Clone, Default)]
pub struct MediaAssetDraft {
    /// Title
    pub title: String,
    /// Optional description
    pub description: Option<String>,
    /// Category
    pub category: MediaAssetCategory,
    /// File to upload
    pub file: Option<FilePayload>,
}

impl MediaAssetDraft {
    /// Create a draft
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// With category
    #[must_use]
    pub fn with_category(mut self, category: MediaAssetCategory) -> Self {
        self.category = category;
        self
    }

    /// With description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// With file payload
    #[must_use]
    pub fn with_file(mut self, file: FilePayload) -> Self {
        self.file = Some(file);
        self
    }

    /// Check required fields
    ///
    /// # Errors
    /// `ValidationError::IncompleteAsset` naming every missing field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut missing = Vec::new();
        if self.title.trim().is_empty() {
            missing.push("title");
        }
        if self.file.as_ref().map_or(true, FilePayload::is_empty) {
            missing.push("file");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::IncompleteAsset { missing })
        }
    }

    /// Build the record once the file is stored
    #[must_use]
    pub fn into_asset(self, file: FileDescriptor, now: DateTime<Utc>) -> MediaAsset {
        MediaAsset {
            id: RecordId::new(),
            title: self.title.trim().to_string(),
            description: self.description.filter(|d| !d.trim().is_empty()),
            category: self.category,
            file,
            created_at: now,
        }
    }
}
