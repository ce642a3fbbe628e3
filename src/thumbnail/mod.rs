//! # Thumbnail Module
//!
//! Derives a still preview image for a clip. The preview is taken at a fixed
//! offset into the clip and delivered as a lossless PNG data URI.

mod ffmpeg;

pub use ffmpeg::{render_thumbnail, seek_position, FfmpegThumbnailer, LAST_FRAME_MARGIN_SECS};

use async_trait::async_trait;

use crate::{
    error::Result,
    media::{MediaFile, Thumbnail},
};

/// Produces a preview image for a media file
///
/// Implementations must release any decode resources they allocate,
/// whether derivation succeeds or fails.
#[async_trait]
pub trait ThumbnailDeriver: Send + Sync {
    /// Derive a thumbnail, failing with a decode or render error
    async fn derive(&self, file: &MediaFile) -> Result<Thumbnail>;
}
