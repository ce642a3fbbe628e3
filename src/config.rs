use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigError, Result},
    export::ConcatPolicy,
};

/// Main configuration for the clip assembler
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Engine runtime settings
    pub engine: EngineConfig,

    /// Thumbnail derivation settings
    pub thumbnail: ThumbnailConfig,

    /// Export settings
    pub export: ExportConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;
        self.thumbnail.validate()?;
        self.export.validate()?;
        Ok(())
    }
}

/// Where the engine runtime lives and how to verify it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// FFmpeg executable (name on PATH or absolute path)
    pub binary: PathBuf,

    /// FFprobe executable, used to read clip durations
    pub probe_binary: PathBuf,

    /// Optional version prefix the runtime must report, e.g. "ffmpeg version 6."
    pub required_version: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
            probe_binary: PathBuf::from("ffprobe"),
            required_version: None,
        }
    }
}

impl EngineConfig {
    fn validate(&self) -> Result<()> {
        if self.binary.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "engine.binary".to_string(),
                value: String::new(),
            }.into());
        }

        if self.probe_binary.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "engine.probe_binary".to_string(),
                value: String::new(),
            }.into());
        }

        Ok(())
    }
}

/// Thumbnail derivation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// Offset into the clip at which the preview frame is captured (seconds)
    pub seek_offset_secs: f64,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            seek_offset_secs: 1.0,
        }
    }
}

impl ThumbnailConfig {
    fn validate(&self) -> Result<()> {
        if !self.seek_offset_secs.is_finite() || self.seek_offset_secs < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "thumbnail.seek_offset_secs".to_string(),
                value: self.seek_offset_secs.to_string()
            }.into());
        }

        Ok(())
    }
}

/// Export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Name of the delivered file
    pub output_file_name: String,

    /// Upper bound on a single engine invocation (seconds); unbounded when absent
    pub timeout_secs: Option<u64>,

    /// Concatenation policy applied to every run
    pub policy: ConcatPolicy,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_file_name: crate::export::OUTPUT_FILE_NAME.to_string(),
            timeout_secs: None,
            policy: ConcatPolicy::default(),
        }
    }
}

impl ExportConfig {
    /// A plain `*.mp4` name that cannot overwrite a staged input or the manifest
    fn output_file_name_is_usable(&self) -> bool {
        let name = self.output_file_name.as_str();
        let plain = !name.trim().is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\']);
        let stem_and_ext = Path::new(name)
            .file_stem()
            .zip(Path::new(name).extension())
            .and_then(|(stem, ext)| Some((stem.to_str()?, ext.to_str()?)));
        let is_mp4 = matches!(stem_and_ext, Some((stem, ext))
            if !stem.is_empty() && ext.eq_ignore_ascii_case("mp4"));
        let is_staged_input = name
            .strip_prefix("input")
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()));

        plain && is_mp4 && !is_staged_input && name != crate::export::MANIFEST_FILE_NAME
    }

    fn validate(&self) -> Result<()> {
        if let ConcatPolicy::Reencode { codec, crf, preset } = &self.policy {
            if *crf > 51 {
                return Err(ConfigError::InvalidValue {
                    key: "export.policy.crf".to_string(),
                    value: crf.to_string()
                }.into());
            }

            if codec.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "export.policy.codec".to_string(),
                    value: codec.clone()
                }.into());
            }

            if preset.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "export.policy.preset".to_string(),
                    value: preset.clone()
                }.into());
            }
        }

        if !self.output_file_name_is_usable() {
            return Err(ConfigError::InvalidValue {
                key: "export.output_file_name".to_string(),
                value: self.output_file_name.clone()
            }.into());
        }

        if self.timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "export.timeout_secs".to_string(),
                value: "0".to_string()
            }.into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.thumbnail.seek_offset_secs, 1.0);
        assert_eq!(config.export.output_file_name, "output.mp4");
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test_config.toml");

        let mut original_config = Config::default();
        original_config.export.policy = ConcatPolicy::Reencode {
            codec: "libx264".to_string(),
            crf: 20,
            preset: "fast".to_string(),
        };
        original_config.export.timeout_secs = Some(600);

        original_config.save_to_file(&file_path).unwrap();
        let loaded_config = Config::from_file(&file_path).unwrap();

        assert_eq!(loaded_config.export.policy, original_config.export.policy);
        assert_eq!(loaded_config.export.timeout_secs, Some(600));
        assert_eq!(loaded_config.engine.binary, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("partial.toml");
        std::fs::write(&file_path, "[thumbnail]\nseek_offset_secs = 2.5\n").unwrap();

        let config = Config::from_file(&file_path).unwrap();
        assert_eq!(config.thumbnail.seek_offset_secs, 2.5);
        assert_eq!(config.export.policy, ConcatPolicy::StreamCopy);
    }

    #[test]
    fn test_missing_file() {
        let result = Config::from_file("/nonexistent/clip-assembler.toml");
        assert!(matches!(
            result,
            Err(crate::error::AssemblerError::Config(ConfigError::FileNotFound { .. }))
        ));
    }

    #[test]
    fn test_invalid_crf() {
        let mut config = Config::default();
        config.export.policy = ConcatPolicy::Reencode {
            codec: "libx264".to_string(),
            crf: 60,
            preset: "medium".to_string(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_seek_offset() {
        let mut config = Config::default();
        config.thumbnail.seek_offset_secs = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_output_file_name_must_be_plain_mp4() {
        let mut config = Config::default();
        for name in ["", "sub/out.mp4", "..\\out.mp4", "out.mkv", "output", ".mp4", "input0", "concat_list.txt"] {
            config.export.output_file_name = name.to_string();
            assert!(
                matches!(
                    config.validate(),
                    Err(crate::error::AssemblerError::Config(ConfigError::InvalidValue { .. }))
                ),
                "accepted output name {:?}",
                name
            );
        }

        for name in ["joined.mp4", "FINAL.MP4", "input.mp4"] {
            config.export.output_file_name = name.to_string();
            assert!(config.validate().is_ok(), "rejected output name {:?}", name);
        }
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config.export.timeout_secs = Some(0);
        assert!(config.validate().is_err());
    }
}
