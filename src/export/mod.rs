//! # Export Module
//!
//! Turns the current collection order into one MP4.
//!
//! Each clip is staged into the engine namespace as `input{index}`, a concat
//! manifest lists them in collection order, and the engine is invoked once to
//! join them. The result is read back and handed to a [`DownloadSink`].

mod delivery;
mod orchestrator;

pub use delivery::{Artifact, DeliveredArtifact, DirectoryDownload, DownloadSink};
pub use orchestrator::{ExportOrchestrator, ExportState};

use serde::{Deserialize, Serialize};

/// Media type of the delivered file
pub const OUTPUT_MEDIA_TYPE: &str = "video/mp4";

/// Default name of the delivered file and of the engine output
pub const OUTPUT_FILE_NAME: &str = "output.mp4";

/// Name the manifest is staged under
pub const MANIFEST_FILE_NAME: &str = "concat_list.txt";

/// How the inputs are joined
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ConcatPolicy {
    /// Join without re-encoding; inputs must share codec parameters
    #[default]
    StreamCopy,

    /// Re-encode the joined stream with a single fixed profile
    Reencode {
        codec: String,
        crf: u8,
        preset: String,
    },
}

impl ConcatPolicy {
    /// The stock re-encode profile (H.264, CRF 23, medium)
    pub fn reencode() -> Self {
        Self::Reencode {
            codec: "libx264".to_string(),
            crf: 23,
            preset: "medium".to_string(),
        }
    }
}

/// Namespace name for the clip at `index`
pub fn staged_input_name(index: usize) -> String {
    format!("input{}", index)
}

/// Build the concat manifest, one `file '<name>'` line per input
pub fn build_manifest<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(|name| format!("file '{}'", name.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the engine argument list for one concatenation
pub fn build_concat_args(manifest: &str, output: &str, policy: &ConcatPolicy) -> Vec<String> {
    let mut args: Vec<String> = ["-f", "concat", "-safe", "0", "-i", manifest]
        .iter()
        .map(|s| s.to_string())
        .collect();

    match policy {
        ConcatPolicy::StreamCopy => {
            args.extend(["-c".to_string(), "copy".to_string()]);
        }
        ConcatPolicy::Reencode { codec, crf, preset } => {
            args.extend([
                "-c:v".to_string(),
                codec.clone(),
                "-crf".to_string(),
                crf.to_string(),
                "-preset".to_string(),
                preset.clone(),
            ]);
        }
    }

    args.push(output.to_string());
    args
}
