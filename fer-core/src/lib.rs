//! Core facial emotion classification pipeline.
//!
//! This crate loads an FER+ style ONNX model with `tract-onnx`, turns face
//! images into `[1, 1, 64, 64]` grayscale tensors, and maps the resulting
//! logits to ranked emotion labels.

/// Per-image pipeline orchestration and batch processing.
pub mod classifier;
/// Emotion classes and the index-to-label table.
pub mod emotion;
/// Error taxonomy shared by every pipeline stage.
pub mod error;
/// ONNX model loading, I/O discovery and execution.
pub mod model;
/// Softmax and ranking of raw class scores.
pub mod postprocess;
/// Image pre-processing (grayscale, resizing, tensor conversion).
pub mod preprocess;

pub use classifier::{
    BatchReport, ClassifiedImage, EmotionClassifier, EmotionResult, ImageFailure, PipelineStage,
    StageTimings,
};
pub use emotion::{Emotion, EmotionTable};
pub use error::{ErrorKind, FerError, FerResult};
pub use model::{EmotionModel, InferenceBackend, ModelDescriptor, TensorBinding};
pub use postprocess::{Scores, interpret, rank, softmax};
pub use preprocess::{
    CpuPreprocessor, InputSize, PreprocessConfig, PreprocessOutput, Preprocessor, decode_image,
    preprocess_dynamic_image, preprocess_image,
};

/// Returns the crate version for diagnostics.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
