//! # Engine Module
//!
//! Owns the lifecycle of the external media engine and the session-scoped
//! namespace that inputs and outputs are passed through.
//!
//! The engine itself is opaque: it is loaded once, then asked to execute flat
//! argument lists against the namespace. [`EngineSession`] adds the state
//! machine (`Uninitialized -> Loading -> Ready`, or `LoadFailed`) and refuses
//! every namespace operation until the engine is ready.

mod ffmpeg;
mod session;

pub use ffmpeg::FfmpegEngine;
pub use session::EngineSession;

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::Result;

/// Lifecycle state of an engine session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Loading,
    Ready,
    /// Loading failed; only an explicit re-initialize leaves this state
    LoadFailed(String),
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Loading => write!(f, "loading"),
            Self::Ready => write!(f, "ready"),
            Self::LoadFailed(reason) => write!(f, "load failed: {}", reason),
        }
    }
}

/// What the engine reported about itself when it loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInfo {
    pub version_line: String,
}

/// The external media engine
#[async_trait]
pub trait Engine: Send + Sync {
    /// Fetch and initialize the engine runtime
    async fn load(&self, log: &LogSink) -> Result<EngineInfo>;

    /// Run one command with `workdir` as the namespace, until it finishes or fails
    ///
    /// Abnormal completion is reported as an execution error carrying the
    /// engine's own diagnostics.
    async fn execute(&self, workdir: &Path, args: &[String], log: &LogSink) -> Result<()>;
}

type LogCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Fan-out of engine log lines to registered observers
#[derive(Clone, Default)]
pub struct LogSink {
    callbacks: Arc<Mutex<Vec<LogCallback>>>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer for every subsequent message
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(callback));
    }

    pub fn emit(&self, message: &str) {
        let callbacks = self
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for callback in callbacks {
            callback(message);
        }
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.callbacks.lock().map(|c| c.len()).unwrap_or(0);
        f.debug_struct("LogSink").field("observers", &count).finish()
    }
}
