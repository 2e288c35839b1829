use std::{fmt, path::PathBuf};

use serde::Serialize;
use thiserror::Error;

/// Errors raised by the emotion classification pipeline.
#[derive(Debug, Error)]
pub enum FerError {
    /// The model artifact could not be loaded or prepared. No inference is possible.
    #[error("failed to load model {}: {reason}", path.display())]
    ModelLoad { path: PathBuf, reason: String },

    /// An input image could not be read or decoded.
    #[error("failed to decode image {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// The tensor handed to the model does not match its declared input.
    #[error("input tensor shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Model execution failed or produced unusable output.
    #[error("inference failed: {0}")]
    Inference(String),

    /// The caller passed an argument outside its valid range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Coarse classification of [`FerError`] used in batch reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ModelLoad,
    Decode,
    Inference,
    InvalidArgument,
}

impl ErrorKind {
    /// Whether an error of this kind should abort a whole batch run.
    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorKind::ModelLoad | ErrorKind::InvalidArgument)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::ModelLoad => "model_load",
            ErrorKind::Decode => "decode",
            ErrorKind::Inference => "inference",
            ErrorKind::InvalidArgument => "invalid_argument",
        })
    }
}

impl FerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FerError::ModelLoad { .. } => ErrorKind::ModelLoad,
            FerError::Decode { .. } => ErrorKind::Decode,
            FerError::ShapeMismatch { .. } | FerError::Inference(_) => ErrorKind::Inference,
            FerError::InvalidArgument(_) => ErrorKind::InvalidArgument,
        }
    }

    pub(crate) fn model_load(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        FerError::ModelLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result alias for pipeline operations.
pub type FerResult<T> = Result<T, FerError>;
