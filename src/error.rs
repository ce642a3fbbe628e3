use std::time::Duration;

use thiserror::Error;

/// Main error type for the clip assembler library
#[derive(Error, Debug)]
pub enum AssemblerError {
    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Thumbnail error: {0}")]
    Thumbnail(#[from] ThumbnailError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Collection error: {0}")]
    Collection(#[from] CollectionError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Input file errors, raised before a file reaches the collection
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Unsupported media type for {name}: {media_type}")]
    UnsupportedMediaType { name: String, media_type: String },

    #[error("Failed to read media file: {path}")]
    ReadFailed { path: String },
}

/// Thumbnail derivation errors
#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("Could not decode {name} as playable media: {reason}")]
    Decode { name: String, reason: String },

    #[error("Could not rasterize a frame of {name}: {reason}")]
    Render { name: String, reason: String },
}

/// Engine session errors
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Engine is not ready (state: {state})")]
    NotReady { state: String },

    #[error("Engine failed to load: {reason}")]
    LoadFailed { reason: String },

    #[error("Engine execution failed: {diagnostics}")]
    Execution { diagnostics: String },

    #[error("Engine did not finish within {limit:?}")]
    Timeout { limit: Duration },

    #[error("File not found in engine namespace: {name}")]
    NotFound { name: String },

    #[error("Invalid namespace file name: {name}")]
    InvalidName { name: String },
}

/// Collection store errors
#[derive(Error, Debug)]
pub enum CollectionError {
    #[error("No item with id {id}")]
    NotFound { id: String },

    #[error("Position {position} is out of range for a collection of {len}")]
    PositionOutOfRange { position: usize, len: usize },
}

/// Export orchestration errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Nothing to export: the collection is empty")]
    EmptyCollection,

    #[error("An export is already running")]
    AlreadyRunning,

    #[error("Delivery failed: {reason}")]
    DeliveryFailed { reason: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using AssemblerError
pub type Result<T> = std::result::Result<T, AssemblerError>;

impl AssemblerError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Check if the user can reasonably retry the operation that produced this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(_) => true,
            Self::Engine(EngineError::LoadFailed { .. }) => true,
            Self::Engine(EngineError::NotReady { .. }) => true,
            Self::Engine(EngineError::Execution { .. }) => true,
            Self::Engine(EngineError::Timeout { .. }) => true,
            Self::Export(ExportError::AlreadyRunning) => true,
            Self::Export(ExportError::DeliveryFailed { .. }) => true,
            _ => false,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Media(MediaError::UnsupportedMediaType { .. }) => {
                "Please select a valid .mp4 file.".to_string()
            }
            Self::Engine(EngineError::NotReady { .. }) => {
                "The video engine is still loading. Please try again in a moment.".to_string()
            }
            Self::Engine(EngineError::LoadFailed { reason }) => {
                format!("The video engine could not be loaded ({}). Check that FFmpeg is installed.", reason)
            }
            Self::Export(ExportError::EmptyCollection) => {
                "Add at least one video before exporting.".to_string()
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}
