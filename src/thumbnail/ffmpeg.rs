use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::{DynamicImage, GenericImageView, ImageFormat, ImageOutputFormat};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::{
    config::{EngineConfig, ThumbnailConfig},
    error::{Result, ThumbnailError},
    media::{MediaFile, Thumbnail},
    thumbnail::ThumbnailDeriver,
};

/// How far before the end of a short clip the preview frame is taken
pub const LAST_FRAME_MARGIN_SECS: f64 = 0.05;

/// Pick the capture position for a clip of the given duration
///
/// Clips at least as long as the offset are captured at the offset. Shorter
/// clips are clamped to their last available frame.
pub fn seek_position(duration: f64, offset: f64) -> f64 {
    if duration > offset {
        offset
    } else {
        (duration - LAST_FRAME_MARGIN_SECS).max(0.0)
    }
}

/// Encode a decoded frame as a PNG data URI at its native dimensions
pub fn render_thumbnail(frame: &DynamicImage) -> std::result::Result<Thumbnail, String> {
    let (width, height) = (frame.width(), frame.height());
    if width == 0 || height == 0 {
        return Err("frame has no drawable area".to_string());
    }

    let mut png = Vec::new();
    frame
        .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
        .map_err(|e| e.to_string())?;

    Ok(Thumbnail {
        width,
        height,
        data_uri: format!("{}{}", Thumbnail::DATA_URI_PREFIX, BASE64.encode(&png)),
    })
}

/// Thumbnail deriver backed by the ffprobe and ffmpeg executables
pub struct FfmpegThumbnailer {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    seek_offset: f64,
    scratch_dir: Option<PathBuf>,
}

impl FfmpegThumbnailer {
    pub fn new(engine: &EngineConfig, thumbnail: &ThumbnailConfig) -> Self {
        Self {
            ffmpeg: engine.binary.clone(),
            ffprobe: engine.probe_binary.clone(),
            seek_offset: thumbnail.seek_offset_secs,
            scratch_dir: None,
        }
    }

    /// Place decode scratch files in `dir` instead of the system temp directory
    pub fn with_scratch_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    fn scratch_file(&self) -> std::io::Result<tempfile::NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("clip-thumb-").suffix(".mp4");
        match &self.scratch_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
    }

    async fn probe_duration(&self, name: &str, path: &Path) -> Result<f64> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "error", "-show_entries", "format=duration", "-of", "default=noprint_wrappers=1:nokey=1"])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ThumbnailError::Decode {
                name: name.to_string(),
                reason: format!("ffprobe could not be started: {}", e),
            })?;

        if !output.status.success() {
            return Err(ThumbnailError::Decode {
                name: name.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }.into());
        }

        let text = String::from_utf8_lossy(&output.stdout);
        text.trim()
            .parse::<f64>()
            .ok()
            .filter(|d| d.is_finite() && *d >= 0.0)
            .ok_or_else(|| ThumbnailError::Decode {
                name: name.to_string(),
                reason: format!("no usable duration ({})", text.trim()),
            }.into())
    }

    async fn extract_frame(&self, name: &str, path: &Path, seek: f64) -> Result<Vec<u8>> {
        let seek_arg = format!("{:.3}", seek);
        let output = Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-loglevel", "error", "-ss", seek_arg.as_str(), "-i"])
            .arg(path)
            .args(["-frames:v", "1", "-f", "image2pipe", "-c:v", "png", "-"])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ThumbnailError::Decode {
                name: name.to_string(),
                reason: format!("ffmpeg could not be started: {}", e),
            })?;

        if !output.status.success() {
            return Err(ThumbnailError::Decode {
                name: name.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }.into());
        }

        if output.stdout.is_empty() {
            return Err(ThumbnailError::Render {
                name: name.to_string(),
                reason: format!("no frame available at {:.3}s", seek),
            }.into());
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl ThumbnailDeriver for FfmpegThumbnailer {
    async fn derive(&self, file: &MediaFile) -> Result<Thumbnail> {
        let name = file.name();

        // Dropping the scratch file removes it on every return path.
        let scratch = self.scratch_file()?;
        tokio::fs::write(scratch.path(), file.bytes()).await?;

        let duration = self.probe_duration(name, scratch.path()).await?;
        let seek = seek_position(duration, self.seek_offset);
        if seek < self.seek_offset {
            warn!("{} is only {:.2}s long, capturing preview at {:.2}s", name, duration, seek);
        }

        let png = self.extract_frame(name, scratch.path(), seek).await?;
        let frame = image::load_from_memory_with_format(&png, ImageFormat::Png)
            .map_err(|e| ThumbnailError::Render {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        let thumbnail = render_thumbnail(&frame).map_err(|reason| ThumbnailError::Render {
            name: name.to_string(),
            reason,
        })?;

        debug!("Derived {}x{} thumbnail for {}", thumbnail.width, thumbnail.height, name);
        Ok(thumbnail)
    }
}
