//! # Clip-Assembler
//!
//! Collect video clips, put them in order, and join them into a single MP4.
//!
//! The library keeps an ordered collection of clips (each with a preview
//! thumbnail) and exports that order through FFmpeg's concat demuxer.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use clip_assembler::{
//!     collection::MediaCollection,
//!     config::Config,
//!     engine::{EngineSession, FfmpegEngine},
//!     export::{DirectoryDownload, ExportOrchestrator},
//!     media::MediaFile,
//!     thumbnail::FfmpegThumbnailer,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = Config::default();
//!
//! let session = Arc::new(EngineSession::new(Arc::new(FfmpegEngine::new(&config.engine))));
//! session.initialize().await?;
//!
//! let thumbnailer = FfmpegThumbnailer::new(&config.engine, &config.thumbnail);
//! let mut collection = MediaCollection::new(Arc::new(thumbnailer));
//! for path in ["intro.mp4", "middle.mp4", "outro.mp4"] {
//!     let file = MediaFile::from_path(path).await?;
//!     file.ensure_accepted()?;
//!     collection.append(file).await?;
//! }
//!
//! let outro = collection.snapshot().ids()[2];
//! collection.reorder(outro, 0)?;
//!
//! let orchestrator = ExportOrchestrator::new(&config.export, Arc::new(DirectoryDownload::new("out")));
//! orchestrator.export(&collection.snapshot(), &session).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`media`] - Source files, item identity and the MP4 input gate
//! - [`thumbnail`] - Preview frame derivation
//! - [`engine`] - Engine lifecycle and the session namespace
//! - [`collection`] - The ordered, reorderable clip list
//! - [`export`] - Manifest, concat command and delivery
//! - [`config`] - Configuration management

pub mod collection;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod media;
pub mod thumbnail;

#[cfg(test)]
mod testing;

// Re-export commonly used types for convenience
pub use crate::{
    collection::MediaCollection,
    config::Config,
    engine::EngineSession,
    error::{AssemblerError, Result},
    export::ExportOrchestrator,
};
