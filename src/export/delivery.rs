use std::fmt;
use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::task;
use tracing::info;

use crate::error::{ExportError, Result};

/// The finished export, ready to be handed to the user
#[derive(Clone)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub media_type: String,
    pub file_name: String,
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("file_name", &self.file_name)
            .field("media_type", &self.media_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Receipt for an artifact that has been handed off
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredArtifact {
    pub file_name: String,
    pub media_type: String,
    pub size: u64,
    pub location: Option<PathBuf>,
}

/// Where finished exports go
///
/// The artifact is passed by value; the sink owns it from then on and the
/// in-memory copy is released once delivery returns.
#[async_trait]
pub trait DownloadSink: Send + Sync {
    async fn deliver(&self, artifact: Artifact) -> Result<DeliveredArtifact>;
}

/// Saves artifacts into a directory, replacing any previous file of the same name
pub struct DirectoryDownload {
    dir: PathBuf,
}

impl DirectoryDownload {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl DownloadSink for DirectoryDownload {
    async fn deliver(&self, artifact: Artifact) -> Result<DeliveredArtifact> {
        let dir = self.dir.clone();
        let target = dir.join(&artifact.file_name);
        let size = artifact.bytes.len() as u64;
        let file_name = artifact.file_name.clone();
        let media_type = artifact.media_type.clone();

        let written = target.clone();
        task::spawn_blocking(move || -> std::io::Result<()> {
            std::fs::create_dir_all(&dir)?;
            let mut staging = tempfile::NamedTempFile::new_in(&dir)?;
            staging.write_all(&artifact.bytes)?;
            staging.persist(&written).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| ExportError::DeliveryFailed { reason: e.to_string() })?
        .map_err(|e| ExportError::DeliveryFailed {
            reason: format!("{}: {}", target.display(), e),
        })?;

        info!("Delivered {} ({} bytes)", target.display(), size);
        Ok(DeliveredArtifact {
            file_name,
            media_type,
            size,
            location: Some(target),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn artifact(bytes: &[u8]) -> Artifact {
        Artifact {
            bytes: bytes.to_vec(),
            media_type: "video/mp4".to_string(),
            file_name: "output.mp4".to_string(),
        }
    }

    #[tokio::test]
    async fn test_directory_download_writes_file() {
        let dir = tempdir().unwrap();
        let sink = DirectoryDownload::new(dir.path().join("exports"));

        let delivered = sink.deliver(artifact(b"joined")).await.unwrap();
        let location = delivered.location.unwrap();

        assert_eq!(delivered.file_name, "output.mp4");
        assert_eq!(delivered.size, 6);
        assert_eq!(std::fs::read(location).unwrap(), b"joined");
    }

    #[tokio::test]
    async fn test_directory_download_replaces_previous_export() {
        let dir = tempdir().unwrap();
        let sink = DirectoryDownload::new(dir.path());

        sink.deliver(artifact(b"first run")).await.unwrap();
        sink.deliver(artifact(b"second")).await.unwrap();

        assert_eq!(std::fs::read(dir.path().join("output.mp4")).unwrap(), b"second");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
