//! Settings loading and CLI override logic.

use std::path::{Path, PathBuf};

use anyhow::Result;
use fer_core::{EmotionTable, PreprocessConfig};
use fer_utils::{
    config::{AppSettings, DEFAULT_MODEL_PATH},
    normalize_path,
};
use log::info;

use crate::args::ClassifyArgs;

/// Load settings from `config_path`, or fall back to the built-in defaults.
pub fn load_settings(config_path: Option<&Path>) -> Result<AppSettings> {
    match config_path {
        Some(path) => {
            let resolved = normalize_path(path)?;
            let settings = AppSettings::load_from_path(&resolved)?;
            info!("Loaded settings from {}", resolved.display());
            Ok(settings)
        }
        None => Ok(AppSettings::default()),
    }
}

/// Apply command-line flags on top of loaded or default settings.
pub fn apply_cli_overrides(settings: &mut AppSettings, args: &ClassifyArgs) {
    if let Some(model) = args.model.as_ref() {
        settings.model_path = Some(model.to_string_lossy().into_owned());
    }

    if args.telemetry {
        settings.telemetry.enabled = true;
    }
    if let Some(level) = args.telemetry_level.as_ref() {
        let normalized = level.trim();
        if !normalized.is_empty() {
            let lower = normalized.to_ascii_lowercase();
            if lower == "off" {
                settings.telemetry.enabled = false;
            }
            settings.telemetry.level = lower;
        }
    }

    if let Some(width) = args.width {
        settings.input.width = width;
    }
    if let Some(height) = args.height {
        settings.input.height = height;
    }
    if let Some(filter) = args.resize_filter {
        settings.input.resize_filter = filter;
    }
    if args.unit_scale {
        settings.input.scale_to_unit = true;
    }

    if let Some(top_n) = args.top_n {
        settings.labeling.top_n = top_n;
    }
    if args.scores {
        settings.labeling.include_scores = true;
    }
    if let Some(jobs) = args.jobs {
        settings.batch.jobs = jobs;
    }
}

/// Model path after overrides.
pub fn resolved_model_path(settings: &AppSettings) -> PathBuf {
    PathBuf::from(
        settings
            .model_path
            .as_deref()
            .filter(|path| !path.trim().is_empty())
            .unwrap_or(DEFAULT_MODEL_PATH),
    )
}

/// Build the preprocessing configuration from `settings.input`.
pub fn build_preprocess_config(settings: &AppSettings) -> Result<PreprocessConfig> {
    let input = &settings.input;
    anyhow::ensure!(
        input.width > 0 && input.height > 0,
        "model input size must be positive (got {}x{})",
        input.width,
        input.height
    );
    Ok(PreprocessConfig::from(input))
}

/// Check the top-N count against the table before loading anything.
pub fn validate_top_n(settings: &AppSettings, table: &EmotionTable) -> Result<()> {
    table.validate_top_n(settings.labeling.top_n)?;
    Ok(())
}
