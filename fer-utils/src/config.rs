//! Shared configuration types consumed across the FER workspace.
//!
//! Settings can be serialized to disk as JSON and are overridden field by
//! field by the CLI.

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::{fmt, fs, path::Path, str::FromStr};

/// Default location of the FER+ ONNX model.
pub const DEFAULT_MODEL_PATH: &str = "models/emotion-ferplus-8.onnx";

/// Interpolation used when resizing the grayscale face to the model input.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    /// Coverage-weighted block averaging (default).
    #[default]
    Area,
    /// Bilinear interpolation.
    Triangle,
    /// Nearest-neighbour sampling.
    Nearest,
}

impl fmt::Display for ResizeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResizeFilter::Area => "area",
            ResizeFilter::Triangle => "triangle",
            ResizeFilter::Nearest => "nearest",
        })
    }
}

impl FromStr for ResizeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "area" => Ok(ResizeFilter::Area),
            "triangle" | "bilinear" | "linear" => Ok(ResizeFilter::Triangle),
            "nearest" => Ok(ResizeFilter::Nearest),
            other => Err(format!(
                "invalid resize filter '{other}'; expected 'area', 'triangle' or 'nearest'"
            )),
        }
    }
}

/// Model input resolution and pixel handling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InputDimensions {
    pub width: u32,
    pub height: u32,
    /// Interpolation used for the resize step.
    pub resize_filter: ResizeFilter,
    /// Divide intensities by 255 before inference instead of feeding raw 0-255 values.
    pub scale_to_unit: bool,
}

impl Default for InputDimensions {
    fn default() -> Self {
        Self {
            width: 64,
            height: 64,
            resize_filter: ResizeFilter::Area,
            scale_to_unit: false,
        }
    }
}

/// How many labels to report per image and whether to attach probabilities.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LabelingSettings {
    /// Number of top-ranked emotions to report (1-8).
    pub top_n: usize,
    /// Include the full probability distribution in each record.
    pub include_scores: bool,
}

impl Default for LabelingSettings {
    fn default() -> Self {
        Self {
            top_n: 1,
            include_scores: false,
        }
    }
}

/// Batch execution preferences.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BatchSettings {
    /// Worker threads for batch classification. `1` processes images sequentially.
    pub jobs: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self { jobs: 1 }
    }
}

/// Settings controlling optional runtime telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Whether telemetry timing logs are enabled.
    pub enabled: bool,
    /// Logging level for telemetry output (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "debug".to_string(),
        }
    }
}

impl TelemetrySettings {
    /// Resolve the configured level string into a `LevelFilter`.
    ///
    /// Unknown strings fall back to `Debug`.
    pub fn level_filter(&self) -> LevelFilter {
        match self.level.trim().to_ascii_lowercase().as_str() {
            "warning" => LevelFilter::Warn,
            other => other.parse().unwrap_or(LevelFilter::Debug),
        }
    }
}

/// Persistent settings consumed by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Path to the emotion ONNX model.
    pub model_path: Option<String>,
    /// Model input geometry and pixel handling.
    pub input: InputDimensions,
    /// Top-N reporting options.
    pub labeling: LabelingSettings,
    /// Batch execution options.
    pub batch: BatchSettings,
    /// Telemetry and diagnostics preferences.
    pub telemetry: TelemetrySettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            model_path: Some(DEFAULT_MODEL_PATH.into()),
            input: InputDimensions::default(),
            labeling: LabelingSettings::default(),
            batch: BatchSettings::default(),
            telemetry: TelemetrySettings::default(),
        }
    }
}

impl AppSettings {
    /// Load settings from a JSON file.
    ///
    /// Missing fields take their defaults; a missing `model_path` falls back to
    /// [`DEFAULT_MODEL_PATH`].
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let mut settings: AppSettings = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse settings JSON at {}", path.display()))?;

        if settings.model_path.is_none() {
            settings.model_path = Some(DEFAULT_MODEL_PATH.into());
        }

        Ok(settings)
    }

    /// Serialize settings to disk in pretty-printed JSON, overwriting any existing file.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let payload =
            serde_json::to_string_pretty(self).context("failed to serialize settings JSON")?;
        fs::write(path, payload)
            .with_context(|| format!("failed to write settings file {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn default_settings_round_trip() {
        let file = NamedTempFile::new().expect("tempfile");
        let mut settings = AppSettings::default();
        settings.labeling.top_n = 3;
        settings.input.resize_filter = ResizeFilter::Nearest;
        settings.save_to_path(file.path()).expect("save");

        let loaded = AppSettings::load_from_path(file.path()).expect("load");
        assert_eq!(loaded.input, settings.input);
        assert_eq!(loaded.labeling, settings.labeling);
        assert_eq!(loaded.batch, settings.batch);
        assert_eq!(loaded.model_path, settings.model_path);
        assert_eq!(loaded.telemetry.level, settings.telemetry.level);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let file = NamedTempFile::new().expect("tempfile");
        let json = r#"{ "input": { "resize_filter": "triangle" }, "labeling": { "top_n": 2 } }"#;
        fs::write(file.path(), json).expect("write settings");

        let loaded = AppSettings::load_from_path(file.path()).expect("load");
        assert_eq!(loaded.input.width, 64);
        assert_eq!(loaded.input.height, 64);
        assert_eq!(loaded.input.resize_filter, ResizeFilter::Triangle);
        assert!(!loaded.input.scale_to_unit);
        assert_eq!(loaded.labeling.top_n, 2);
        assert!(!loaded.labeling.include_scores);
        assert_eq!(loaded.batch.jobs, 1);
        assert_eq!(loaded.model_path.as_deref(), Some(DEFAULT_MODEL_PATH));
    }

    #[test]
    fn malformed_json_is_reported() {
        let file = NamedTempFile::new().expect("tempfile");
        fs::write(file.path(), "{ not json").expect("write settings");
        let err = AppSettings::load_from_path(file.path()).expect_err("should fail");
        assert!(format!("{err}").contains("failed to parse settings JSON"));
    }

    #[test]
    fn resize_filter_parses_aliases() {
        assert_eq!("AREA".parse::<ResizeFilter>(), Ok(ResizeFilter::Area));
        assert_eq!("bilinear".parse::<ResizeFilter>(), Ok(ResizeFilter::Triangle));
        assert_eq!(" nearest ".parse::<ResizeFilter>(), Ok(ResizeFilter::Nearest));
        assert!("cubic".parse::<ResizeFilter>().is_err());
    }

    #[test]
    fn telemetry_level_parses_variants() {
        let telemetry = TelemetrySettings {
            level: "TRACE".into(),
            ..TelemetrySettings::default()
        };
        assert_eq!(telemetry.level_filter(), LevelFilter::Trace);

        let telemetry = TelemetrySettings {
            level: "warning".into(),
            ..TelemetrySettings::default()
        };
        assert_eq!(telemetry.level_filter(), LevelFilter::Warn);

        let telemetry = TelemetrySettings {
            level: "bogus".into(),
            ..TelemetrySettings::default()
        };
        assert_eq!(telemetry.level_filter(), LevelFilter::Debug);
    }
}
