use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::{
    config::EngineConfig,
    engine::{Engine, EngineInfo, LogSink},
    error::{EngineError, Result},
};

/// Diagnostic lines kept for error reports
const DIAGNOSTIC_TAIL: usize = 20;

/// Engine backed by an FFmpeg executable
pub struct FfmpegEngine {
    binary: PathBuf,
    required_version: Option<String>,
}

impl FfmpegEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            required_version: config.required_version.clone(),
        }
    }
}

#[async_trait]
impl Engine for FfmpegEngine {
    async fn load(&self, log: &LogSink) -> Result<EngineInfo> {
        log.emit(&format!("Loading engine runtime from {}", self.binary.display()));

        let output = Command::new(&self.binary)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| EngineError::LoadFailed {
                reason: format!("{}: {}", self.binary.display(), e),
            })?;

        if !output.status.success() {
            return Err(EngineError::LoadFailed {
                reason: format!("{} -version exited with {}", self.binary.display(), output.status),
            }.into());
        }

        let version_line = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();

        if let Some(required) = &self.required_version {
            if !version_line.starts_with(required.as_str()) {
                return Err(EngineError::LoadFailed {
                    reason: format!("expected '{}', found '{}'", required, version_line),
                }.into());
            }
        }

        info!("Engine runtime loaded: {}", version_line);
        log.emit(&version_line);
        Ok(EngineInfo { version_line })
    }

    async fn execute(&self, workdir: &Path, args: &[String], log: &LogSink) -> Result<()> {
        debug!("ffmpeg {}", args.join(" "));

        let mut child = Command::new(&self.binary)
            .current_dir(workdir)
            .args(["-hide_banner", "-y"])
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Execution {
                diagnostics: format!("failed to spawn {}: {}", self.binary.display(), e),
            })?;

        let mut tail = VecDeque::with_capacity(DIAGNOSTIC_TAIL);
        if let Some(stderr) = child.stderr.take() {
            let mut reader = BufReader::new(stderr);
            let mut raw = Vec::new();
            while reader.read_until(b'\n', &mut raw).await? > 0 {
                let line = String::from_utf8_lossy(&raw).trim_end().to_string();
                raw.clear();
                log.emit(&line);
                if tail.len() == DIAGNOSTIC_TAIL {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            let diagnostics = if tail.is_empty() {
                format!("ffmpeg exited with {}", status)
            } else {
                Vec::from(tail).join("\n")
            };
            return Err(EngineError::Execution { diagnostics }.into());
        }

        Ok(())
    }
}
