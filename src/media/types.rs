use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::{MediaError, Result};

/// The only media type the add-file entry point accepts
pub const ACCEPTED_MEDIA_TYPE: &str = "video/mp4";

/// Binary media content together with the name and type it was added under
///
/// Content is reference counted so snapshots of the collection stay cheap.
#[derive(Clone)]
pub struct MediaFile {
    name: String,
    media_type: String,
    bytes: Arc<[u8]>,
}

impl MediaFile {
    /// Create a media file from in-memory content
    pub fn new<N, T>(name: N, media_type: T, bytes: impl Into<Arc<[u8]>>) -> Self
    where
        N: Into<String>,
        T: Into<String>,
    {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, inferring its media type from the extension
    pub async fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| MediaError::ReadFailed { path: path.display().to_string() })?
            .to_string();

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|_| MediaError::ReadFailed { path: path.display().to_string() })?;

        Ok(Self::new(name, Self::media_type_for(path), bytes))
    }

    /// Map a file extension onto the media type a browser would report for it
    pub fn media_type_for<P: AsRef<Path>>(path: P) -> &'static str {
        let extension = path
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());

        match extension.as_deref() {
            Some("mp4") | Some("m4v") => "video/mp4",
            Some("mov") => "video/quicktime",
            Some("webm") => "video/webm",
            Some("mkv") => "video/x-matroska",
            _ => "application/octet-stream",
        }
    }

    /// Reject anything that is not an MP4 before it reaches the collection
    pub fn ensure_accepted(&self) -> Result<()> {
        if self.media_type != ACCEPTED_MEDIA_TYPE {
            return Err(MediaError::UnsupportedMediaType {
                name: self.name.clone(),
                media_type: self.media_type.clone(),
            }.into());
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for MediaFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaFile")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Session-scoped identity of a collection item
///
/// Assigned by the collection at append time. Two files with the same
/// name still get distinct ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(u64);

impl ItemId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item-{}", self.0)
    }
}

/// A still preview of a clip, encoded as a PNG data URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    pub data_uri: String,
}

impl Thumbnail {
    pub const DATA_URI_PREFIX: &'static str = "data:image/png;base64,";

    /// Decode the data URI back into PNG bytes
    pub fn png_bytes(&self) -> Option<Vec<u8>> {
        use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

        let payload = self.data_uri.strip_prefix(Self::DATA_URI_PREFIX)?;
        BASE64.decode(payload).ok()
    }
}

/// One entry of the media collection
#[derive(Debug, Clone)]
pub struct MediaItem {
    pub id: ItemId,
    pub source: MediaFile,
    pub thumbnail: Thumbnail,
}

impl MediaItem {
    pub fn name(&self) -> &str {
        self.source.name()
    }
}
