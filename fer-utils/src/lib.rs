//! Common helpers shared across the FER crates.

/// Application configuration and settings management.
pub mod config;
/// Image loading, grayscale conversion and resizing.
pub mod image_utils;
/// Scoped timing helpers for stage timings and optional tracing.
pub mod telemetry;

use std::path::Path;

use anyhow::Result;
use log::LevelFilter;

pub use image_utils::{gray_to_plane, load_image, resize_area, resize_gray, to_grayscale};
pub use telemetry::{
    TELEMETRY_TARGET, TimingGuard, configure as configure_telemetry, measure, telemetry_allows,
    telemetry_enabled, telemetry_level, timing_guard, timing_guard_if,
};

/// Initialize logging once.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` applies. The telemetry
/// target is always let through so [`configure_telemetry`] alone decides
/// whether timing lines appear.
pub fn init_logging(default_filter: LevelFilter) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter.as_str()),
    );
    builder.filter_module(TELEMETRY_TARGET, LevelFilter::Trace);

    if builder.try_init().is_err() {
        // Logger already initialized; nothing to do.
    }
    Ok(())
}

/// Validate that a path exists and resolve it to an absolute path.
pub fn normalize_path<P: AsRef<Path>>(path: P) -> Result<std::path::PathBuf> {
    let path = path.as_ref();
    anyhow::ensure!(path.exists(), "path does not exist: {}", path.display());
    Ok(path.canonicalize()?)
}
