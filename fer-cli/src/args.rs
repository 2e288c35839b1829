//! Command-line argument definitions for fer-cli.

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use fer_utils::config::ResizeFilter;

/// Classify facial emotions for an image or every file under a directory.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct ClassifyArgs {
    /// Path to an image file or a directory of images.
    #[arg(short, long)]
    pub input: PathBuf,

    /// Path to the emotion ONNX model. Falls back to the settings file, then
    /// `models/emotion-ferplus-8.onnx`.
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Optional settings JSON; built-in defaults apply otherwise.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of top emotions to report per image (1-8).
    #[arg(short = 'n', long)]
    pub top_n: Option<usize>,

    /// Override model input width (pixels).
    #[arg(long)]
    pub width: Option<u32>,

    /// Override model input height (pixels).
    #[arg(long)]
    pub height: Option<u32>,

    /// Resize filter: `area`, `triangle` or `nearest`.
    #[arg(long, value_name = "FILTER")]
    pub resize_filter: Option<ResizeFilter>,

    /// Scale pixel values to [0, 1] instead of feeding raw 0-255 intensities.
    #[arg(long, action = ArgAction::SetTrue)]
    pub unit_scale: bool,

    /// Include the full probability distribution in each output record.
    #[arg(long, action = ArgAction::SetTrue)]
    pub scores: bool,

    /// Number of worker threads for the batch (1 = sequential).
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Write results to a JSON file instead of stdout.
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Enable telemetry timing logs (defaults to settings file).
    #[arg(long, action = ArgAction::SetTrue)]
    pub telemetry: bool,

    /// Override telemetry logging level (error, warn, info, debug, trace).
    #[arg(long, value_name = "LEVEL")]
    pub telemetry_level: Option<String>,
}
