use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use fer_utils::{measure, timing_guard};
use image::DynamicImage;
use log::{Level, debug, warn};
use rayon::prelude::*;
use serde::{Serialize, ser::SerializeStruct};

use crate::emotion::{Emotion, EmotionTable};
use crate::error::{ErrorKind, FerError, FerResult};
use crate::model::{EmotionModel, InferenceBackend};
use crate::postprocess::{Scores, interpret};
use crate::preprocess::{CpuPreprocessor, PreprocessConfig, Preprocessor, decode_image};

const IN_MEMORY_SOURCE: &str = "<in-memory>";

/// Pipeline steps an image passes through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Decoding,
    Preprocessing,
    Inferring,
    Interpreting,
    Labeling,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PipelineStage::Decoding => "decoding",
            PipelineStage::Preprocessing => "preprocessing",
            PipelineStage::Inferring => "inferring",
            PipelineStage::Interpreting => "interpreting",
            PipelineStage::Labeling => "labeling",
        })
    }
}

/// Wall-clock durations of the measured sub-stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageTimings {
    pub grayscale: Duration,
    pub resize: Duration,
    pub model: Duration,
}

impl Serialize for StageTimings {
    /// Serialized as seconds, e.g. `{"grayscale": 0.0001, "resize": 0.0004, "model": 0.0021}`.
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("StageTimings", 3)?;
        state.serialize_field("grayscale", &self.grayscale.as_secs_f64())?;
        state.serialize_field("resize", &self.resize.as_secs_f64())?;
        state.serialize_field("model", &self.model.as_secs_f64())?;
        state.end()
    }
}

/// Outcome of classifying one image.
#[derive(Debug, Clone)]
pub struct EmotionResult {
    /// Top-N emotions, most probable first.
    pub labels: Vec<Emotion>,
    /// Per-stage timings.
    pub timings: StageTimings,
    /// Full probability distribution and ranking.
    pub scores: Scores,
}

impl EmotionResult {
    /// Probability of each emotion in table order.
    pub fn probabilities<'a>(
        &'a self,
        table: &'a EmotionTable,
    ) -> impl Iterator<Item = (Emotion, f32)> + 'a {
        table
            .entries()
            .iter()
            .copied()
            .zip(self.scores.probabilities.iter().copied())
    }
}

/// A successfully classified file.
#[derive(Debug, Clone)]
pub struct ClassifiedImage {
    pub path: PathBuf,
    pub result: EmotionResult,
}

/// A file that ended in the failed state.
#[derive(Debug, Clone, Serialize)]
pub struct ImageFailure {
    pub path: PathBuf,
    pub stage: PipelineStage,
    pub kind: ErrorKind,
    pub message: String,
}

/// Results and failures of a batch, both in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: Vec<ClassifiedImage>,
    pub failures: Vec<ImageFailure>,
}

impl BatchReport {
    /// Number of files attempted.
    pub fn processed(&self) -> usize {
        self.results.len() + self.failures.len()
    }

    fn record(&mut self, path: PathBuf, outcome: Result<EmotionResult, StageFailure>) {
        match outcome {
            Ok(result) => self.results.push(ClassifiedImage { path, result }),
            Err(StageFailure { stage, error }) => {
                warn!(
                    "Failed to classify {} while {}: {}",
                    path.display(),
                    stage,
                    error
                );
                self.failures.push(ImageFailure {
                    path,
                    stage,
                    kind: error.kind(),
                    message: error.to_string(),
                });
            }
        }
    }
}

struct StageFailure {
    stage: PipelineStage,
    error: FerError,
}

trait AtStage<T> {
    fn at(self, stage: PipelineStage) -> Result<T, StageFailure>;
}

impl<T> AtStage<T> for FerResult<T> {
    fn at(self, stage: PipelineStage) -> Result<T, StageFailure> {
        self.map_err(|error| StageFailure { stage, error })
    }
}

/// Couples the emotion model with preprocessing settings, the emotion table
/// and the top-N count.
///
/// This is the main entry point for classifying images. It holds no
/// per-image state, so a shared reference can be used from several threads.
#[derive(Debug)]
pub struct EmotionClassifier<M = EmotionModel> {
    model: M,
    preprocess: PreprocessConfig,
    table: EmotionTable,
    top_n: usize,
}

impl EmotionClassifier<EmotionModel> {
    /// Load the model at `model_path` and build a classifier around it.
    ///
    /// `top_n` is validated before the model is touched.
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        preprocess: PreprocessConfig,
        table: EmotionTable,
        top_n: usize,
    ) -> FerResult<Self> {
        table.validate_top_n(top_n)?;
        let model = EmotionModel::load(model_path, preprocess.input_size, &table)?;
        Self::with_backend(model, preprocess, table, top_n)
    }
}

impl<M: InferenceBackend> EmotionClassifier<M> {
    /// Build a classifier around an already constructed backend.
    pub fn with_backend(
        model: M,
        preprocess: PreprocessConfig,
        table: EmotionTable,
        top_n: usize,
    ) -> FerResult<Self> {
        table.validate_top_n(top_n)?;
        Ok(Self {
            model,
            preprocess,
            table,
            top_n,
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn table(&self) -> &EmotionTable {
        &self.table
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }

    pub fn preprocess_config(&self) -> &PreprocessConfig {
        &self.preprocess
    }

    /// Classify an image file.
    pub fn classify_path<P: AsRef<Path>>(&self, path: P) -> FerResult<EmotionResult> {
        self.run_path(path.as_ref()).map_err(|failure| failure.error)
    }

    /// Classify an already decoded image.
    pub fn classify_image(&self, image: &DynamicImage) -> FerResult<EmotionResult> {
        self.run_decoded(Path::new(IN_MEMORY_SOURCE), image)
            .map_err(|failure| failure.error)
    }

    /// Classify files one after another in the given order.
    ///
    /// Per-image failures are logged and collected; they never stop the batch.
    pub fn classify_batch<P: AsRef<Path>>(&self, paths: &[P]) -> BatchReport {
        let _guard = timing_guard("fer_core::classify_batch", Level::Info);
        let mut report = BatchReport::default();
        for path in paths {
            let path = path.as_ref();
            report.record(path.to_path_buf(), self.run_path(path));
        }
        report
    }

    /// Classify files on a pool of `jobs` worker threads.
    ///
    /// The report keeps the input order. `jobs <= 1` runs sequentially.
    pub fn classify_batch_parallel<P>(&self, paths: &[P], jobs: usize) -> FerResult<BatchReport>
    where
        P: AsRef<Path> + Sync,
    {
        if jobs <= 1 {
            return Ok(self.classify_batch(paths));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .map_err(|e| FerError::InvalidArgument(format!("unable to start {jobs} workers: {e}")))?;

        let _guard = timing_guard("fer_core::classify_batch_parallel", Level::Info);
        let outcomes: Vec<_> = pool.install(|| {
            paths
                .par_iter()
                .map(|path| {
                    let path = path.as_ref();
                    (path.to_path_buf(), self.run_path(path))
                })
                .collect()
        });

        let mut report = BatchReport::default();
        for (path, outcome) in outcomes {
            report.record(path, outcome);
        }
        Ok(report)
    }

    fn run_path(&self, path: &Path) -> Result<EmotionResult, StageFailure> {
        let _guard = timing_guard("fer_core::classify_path", Level::Debug);
        let image = decode_image(path)
            .map_err(|source| FerError::Decode {
                path: path.to_path_buf(),
                source,
            })
            .at(PipelineStage::Decoding)?;
        self.run_decoded(path, &image)
    }

    fn run_decoded(
        &self,
        path: &Path,
        image: &DynamicImage,
    ) -> Result<EmotionResult, StageFailure> {
        let prep = CpuPreprocessor
            .preprocess(image, &self.preprocess)
            .map_err(|err| {
                FerError::Inference(format!(
                    "failed to prepare model input for {}: {err:#}",
                    path.display()
                ))
            })
            .at(PipelineStage::Preprocessing)?;

        let (raw, model_time) = measure("fer_core::inference", Level::Debug, || {
            self.model.run(prep.tensor)
        });
        let raw = raw.at(PipelineStage::Inferring)?;

        let scores = interpret(&raw);
        if scores.probabilities.iter().any(|p| !p.is_finite()) {
            return Err(StageFailure {
                stage: PipelineStage::Interpreting,
                error: FerError::Inference(format!("model produced non-finite scores: {raw:?}")),
            });
        }

        let labels = self
            .table
            .label(&scores.ranking, self.top_n)
            .at(PipelineStage::Labeling)?;

        debug!(
            "{} -> {}",
            path.display(),
            labels
                .iter()
                .map(|emotion| emotion.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(EmotionResult {
            labels,
            timings: StageTimings {
                grayscale: prep.grayscale,
                resize: prep.resize,
                model: model_time,
            },
            scores,
        })
    }
}
