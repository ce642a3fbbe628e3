//! In-memory stand-ins for the engine and the thumbnail deriver.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::{
    engine::{Engine, EngineInfo, LogSink},
    error::{EngineError, Result, ThumbnailError},
    export::{Artifact, DeliveredArtifact, DownloadSink},
    media::{MediaFile, Thumbnail},
    thumbnail::ThumbnailDeriver,
};

/// Engine that concatenates the files named in a concat manifest byte for byte
pub struct FakeEngine {
    loads: AtomicUsize,
    fail_load: AtomicBool,
    gate: Option<Arc<Notify>>,
    execute_failure: Option<String>,
    hang: bool,
    executions: Mutex<Vec<Vec<String>>>,
    manifests: Mutex<Vec<String>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            loads: AtomicUsize::new(0),
            fail_load: AtomicBool::new(false),
            gate: None,
            execute_failure: None,
            hang: false,
            executions: Mutex::new(Vec::new()),
            manifests: Mutex::new(Vec::new()),
        }
    }

    /// Hold `load` until `release_load` is called
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Notify::new()));
        self
    }

    pub fn failing_load(self) -> Self {
        self.fail_load.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_execute(mut self, diagnostics: &str) -> Self {
        self.execute_failure = Some(diagnostics.to_string());
        self
    }

    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn set_load_failure(&self, fail: bool) {
        self.fail_load.store(fail, Ordering::SeqCst);
    }

    pub fn release_load(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn executions(&self) -> Vec<Vec<String>> {
        self.executions.lock().unwrap().clone()
    }

    /// Manifest contents seen by each execution, in order
    pub fn manifests(&self) -> Vec<String> {
        self.manifests.lock().unwrap().clone()
    }
}

fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

#[async_trait]
impl Engine for FakeEngine {
    async fn load(&self, log: &LogSink) -> Result<EngineInfo> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(EngineError::LoadFailed { reason: "runtime unavailable".to_string() }.into());
        }
        log.emit("fake engine loaded");
        Ok(EngineInfo { version_line: "fake engine 1.0".to_string() })
    }

    async fn execute(&self, workdir: &Path, args: &[String], log: &LogSink) -> Result<()> {
        self.executions.lock().unwrap().push(args.to_vec());
        if self.hang {
            std::future::pending::<()>().await;
        }
        if let Some(diagnostics) = &self.execute_failure {
            log.emit(diagnostics);
            return Err(EngineError::Execution { diagnostics: diagnostics.clone() }.into());
        }

        let manifest_name = value_after(args, "-i").ok_or_else(|| EngineError::Execution {
            diagnostics: "no input".to_string(),
        })?;
        let output_name = args.last().ok_or_else(|| EngineError::Execution {
            diagnostics: "no output".to_string(),
        })?;

        let manifest = tokio::fs::read_to_string(workdir.join(manifest_name)).await?;
        self.manifests.lock().unwrap().push(manifest.clone());

        let mut joined = Vec::new();
        for line in manifest.lines() {
            let name = line
                .strip_prefix("file '")
                .and_then(|rest| rest.strip_suffix('\''))
                .ok_or_else(|| EngineError::Execution {
                    diagnostics: format!("bad manifest line: {}", line),
                })?;
            joined.extend(tokio::fs::read(workdir.join(name)).await?);
        }

        tokio::fs::write(workdir.join(output_name), joined).await?;
        Ok(())
    }
}

/// Deriver that renders a 1x1 preview, failing for chosen file names
#[derive(Default)]
pub struct FakeDeriver {
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl FakeDeriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(names: &[&str]) -> Self {
        Self {
            failing: names.iter().map(|n| n.to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ThumbnailDeriver for FakeDeriver {
    async fn derive(&self, file: &MediaFile) -> Result<Thumbnail> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        if self.failing.contains(file.name()) {
            return Err(ThumbnailError::Decode {
                name: file.name().to_string(),
                reason: "not playable".to_string(),
            }.into());
        }

        Ok(Thumbnail {
            width: 1,
            height: 1,
            data_uri: format!("{}{}", Thumbnail::DATA_URI_PREFIX, file.name()),
        })
    }
}

pub fn mp4(name: &str) -> MediaFile {
    MediaFile::new(name, "video/mp4", name.as_bytes().to_vec())
}

/// Download sink that keeps every artifact in memory
#[derive(Default)]
pub struct MemoryDownload {
    delivered: Mutex<Vec<Artifact>>,
}

impl MemoryDownload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn artifacts(&self) -> Vec<Artifact> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl DownloadSink for MemoryDownload {
    async fn deliver(&self, artifact: Artifact) -> Result<DeliveredArtifact> {
        let receipt = DeliveredArtifact {
            file_name: artifact.file_name.clone(),
            media_type: artifact.media_type.clone(),
            size: artifact.bytes.len() as u64,
            location: None,
        };
        self.delivered.lock().unwrap().push(artifact);
        Ok(receipt)
    }
}
