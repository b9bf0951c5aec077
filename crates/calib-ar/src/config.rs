//! JSON configuration file for the tool.

use crate::overlay::OverlayKind;
use crate::pipeline::PipelineConfig;
use calib_ar_core::{PatternError, PatternSpec};
use calib_ar_vision::{DetectorParams, HarrisParams};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_OUTPUT_DIR: &str = "calibration_data";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Pattern(#[from] PatternError),
}

/// Everything the binary can be configured with; command-line flags
/// override individual fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pattern: PatternSpec,
    pub output_dir: PathBuf,
    pub pipeline: PipelineConfig,
    pub detector: DetectorParams,
    pub harris: HarrisParams,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pattern: PatternSpec::default(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            pipeline: PipelineConfig::default(),
            detector: DetectorParams::default(),
            harris: HarrisParams::default(),
        }
    }
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn with_pattern(mut self, pattern: &str) -> Result<Self, ConfigError> {
        self.pattern = pattern.parse()?;
        Ok(self)
    }

    pub fn with_overlay(mut self, overlay: OverlayKind) -> Self {
        self.pipeline.overlay = overlay;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: AppConfig = serde_json::from_str(
            r#"{"pattern":{"columns":7,"rows":5},"pipeline":{"overlay":"axes"}}"#,
        )
        .unwrap();
        assert_eq!(PatternSpec::new(7, 5).unwrap(), cfg.pattern);
        assert_eq!(OverlayKind::Axes, cfg.pipeline.overlay);
        assert!(cfg.pipeline.refine);
        assert_eq!(PathBuf::from(DEFAULT_OUTPUT_DIR), cfg.output_dir);
        assert_eq!(150.0, cfg.harris.threshold);
    }

    #[test]
    fn invalid_pattern_in_json_is_rejected() {
        let err = serde_json::from_str::<AppConfig>(r#"{"pattern":{"columns":1,"rows":5}}"#);
        assert!(err.is_err());
    }

    #[test]
    fn flag_overrides_apply() {
        let cfg = AppConfig::default()
            .with_pattern("8x6")
            .unwrap()
            .with_overlay(OverlayKind::Axes);
        assert_eq!(8, cfg.pattern.columns());
        assert_eq!(OverlayKind::Axes, cfg.pipeline.overlay);
        assert!(AppConfig::default().with_pattern("8").is_err());
    }

    #[test]
    fn missing_file_reports_its_path() {
        let err = AppConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }
}
