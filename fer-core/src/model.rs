use std::{fmt::Write, path::Path};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use tract_onnx::prelude::{
    DatumExt, DatumType, Framework, Graph, InferenceModel, InferenceModelExt, IntoTensor,
    OutletId, SimplePlan, TValue, TVec, Tensor, TypedFact, TypedModel, TypedOp, tvec,
};

use crate::emotion::EmotionTable;
use crate::error::{FerError, FerResult};
use crate::preprocess::InputSize;

type RunnableModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Name, shape and element type of one model input or output, as declared by the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorBinding {
    pub name: String,
    /// `None` when the graph leaves some dimension symbolic.
    pub shape: Option<Vec<usize>>,
    pub datum_type: DatumType,
}

/// I/O layout discovered from the model artifact at load time.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDescriptor {
    /// The image tensor input, with the shape declared in the model file.
    pub data_input: TensorBinding,
    /// Optional second input that receives the emotion table.
    pub auxiliary_input: Option<TensorBinding>,
    /// The single requested output.
    pub output: TensorBinding,
}

/// Seam between the pipeline and whatever executes the network.
pub trait InferenceBackend: Send + Sync + std::fmt::Debug {
    /// Run one `[1, 1, H, W]` tensor and return the raw class scores.
    fn run(&self, input: Tensor) -> FerResult<Vec<f32>>;
}

/// Emotion classifier network loaded through `tract-onnx`.
///
/// Immutable after [`EmotionModel::load`]; `run` only borrows it, so one
/// instance can serve several threads.
#[derive(Debug)]
pub struct EmotionModel {
    runnable: RunnableModel,
    descriptor: ModelDescriptor,
    /// Shape the image input is pinned to; every tensor passed to `run` must match it.
    input_shape: Vec<usize>,
    auxiliary: Option<Tensor>,
    class_count: usize,
}

impl EmotionModel {
    /// Load the ONNX graph, bind its inputs and prepare an execution plan.
    ///
    /// The first declared input is pinned to `f32 [1, 1, H, W]`; a model that
    /// declares a different concrete shape is rejected. A second declared
    /// input, if any, is fed the class indices of `table`.
    pub fn load<P: AsRef<Path>>(
        model_path: P,
        input_size: InputSize,
        table: &EmotionTable,
    ) -> FerResult<Self> {
        let path = model_path.as_ref();
        if !path.exists() {
            return Err(FerError::model_load(path, "model file not found"));
        }
        Self::load_inner(path, input_size, table)
            .map_err(|err| FerError::model_load(path, format!("{err:#}")))
    }

    fn load_inner(path: &Path, input_size: InputSize, table: &EmotionTable) -> Result<Self> {
        let model = tract_onnx::onnx()
            .model_for_path(path)
            .with_context(|| format!("failed to parse ONNX graph from {}", path.display()))?;
        let declared = model
            .input_fact(0)
            .context("model declares no inputs")?
            .shape
            .as_concrete_finite()?
            .map(|dims| dims.to_vec());
        let input_shape = input_size.tensor_shape().to_vec();
        if let Some(declared) = declared.as_ref() {
            anyhow::ensure!(
                *declared == input_shape,
                "model declares image input shape {declared:?} but preprocessing is configured for {input_shape:?}"
            );
        }

        let typed = bind_model(model, input_size)?;
        let mut descriptor = describe(&typed)?;
        descriptor.data_input.shape = declared;
        log_descriptor(path, &descriptor);

        let auxiliary = descriptor
            .auxiliary_input
            .as_ref()
            .map(|binding| emotion_table_tensor(binding, table))
            .transpose()?;

        let runnable = match plan(typed.clone(), true) {
            Ok(plan) => {
                debug!("emotion model {} optimized successfully", path.display());
                plan
            }
            Err(opt_err) => {
                let mut chain_msg = String::new();
                for cause in opt_err.chain() {
                    let _ = writeln!(&mut chain_msg, "  - {cause}");
                }
                warn!(
                    "emotion model {} failed optimized load; falling back to decluttered graph.\nError chain:\n{}",
                    path.display(),
                    chain_msg.trim_end()
                );
                plan(typed, false).with_context(|| {
                    format!("fallback to decluttered graph failed after optimize error: {opt_err}")
                })?
            }
        };

        Ok(Self {
            runnable,
            descriptor,
            input_shape,
            auxiliary,
            class_count: table.len(),
        })
    }

    pub fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    /// Resolution declared by the model file, if it fixes one.
    pub fn input_size(&self) -> Option<InputSize> {
        match self.descriptor.data_input.shape.as_deref() {
            Some([_, _, h, w]) => Some(InputSize::new(*w as u32, *h as u32)),
            _ => None,
        }
    }
}

impl InferenceBackend for EmotionModel {
    fn run(&self, input: Tensor) -> FerResult<Vec<f32>> {
        if input.shape() != self.input_shape.as_slice() {
            return Err(FerError::ShapeMismatch {
                expected: self.input_shape.clone(),
                actual: input.shape().to_vec(),
            });
        }

        let mut inputs: TVec<TValue> = tvec![input.into()];
        if let Some(aux) = self.auxiliary.as_ref() {
            inputs.push(aux.clone().into());
        }

        let outputs = self
            .runnable
            .run(inputs)
            .map_err(|e| FerError::Inference(format!("model execution failed: {e}")))?;
        let output = outputs
            .into_iter()
            .next()
            .ok_or_else(|| FerError::Inference("model produced no outputs".into()))?
            .into_tensor();

        let scores = output
            .cast_to::<f32>()
            .map_err(|e| FerError::Inference(format!("model output is not numeric: {e}")))?;
        let scores = scores
            .as_slice::<f32>()
            .map_err(|e| FerError::Inference(format!("model output is not f32: {e}")))?;
        if scores.len() != self.class_count {
            return Err(FerError::Inference(format!(
                "expected {} class scores, got {}",
                self.class_count,
                scores.len()
            )));
        }
        Ok(scores.to_vec())
    }
}

/// Pin the image input, keep only the first output and type-check the graph.
fn bind_model(mut model: InferenceModel, input_size: InputSize) -> Result<TypedModel> {
    let input_count = model.input_outlets()?.len();
    anyhow::ensure!(input_count > 0, "model declares no inputs");
    anyhow::ensure!(
        input_count <= 2,
        "model declares {input_count} inputs; expected an image input and at most one emotion table input"
    );

    let first_output = *model
        .output_outlets()?
        .first()
        .context("model declares no outputs")?;
    model.set_output_outlets(&[first_output])?;

    model
        .set_input_fact(0, f32::fact(input_size.tensor_shape()).into())
        .context("unable to bind image input")?;

    model
        .into_typed()
        .context("unable to type-check emotion graph")
}

fn plan(model: TypedModel, optimized: bool) -> Result<RunnableModel> {
    let model = if optimized {
        model
            .into_optimized()
            .map_err(|e| anyhow::anyhow!("unable to optimize emotion graph: {e}"))?
    } else {
        model
            .into_decluttered()
            .map_err(|e| anyhow::anyhow!("unable to declutter emotion graph: {e}"))?
    };
    model
        .into_runnable()
        .map_err(|e| anyhow::anyhow!("unable to make emotion graph runnable: {e}"))
}

fn describe(model: &TypedModel) -> Result<ModelDescriptor> {
    let binding = |outlet: OutletId, fallback_name: &str| -> Result<TensorBinding> {
        let fact = model.outlet_fact(outlet)?;
        let name = model
            .outlet_label(outlet)
            .map(str::to_owned)
            .unwrap_or_else(|| model.node(outlet.node).name.clone());
        Ok(TensorBinding {
            name: if name.is_empty() {
                fallback_name.to_owned()
            } else {
                name
            },
            shape: fact.shape.as_concrete().map(|dims| dims.to_vec()),
            datum_type: fact.datum_type,
        })
    };

    let inputs = model.input_outlets()?;
    let data_input = binding(inputs[0], "input")?;
    let auxiliary_input = inputs
        .get(1)
        .map(|outlet| binding(*outlet, "emotion_table"))
        .transpose()?;
    let output = binding(model.output_outlets()?[0], "output")?;

    Ok(ModelDescriptor {
        data_input,
        auxiliary_input,
        output,
    })
}

/// Build the auxiliary input holding the table's class indices.
///
/// The tensor takes the declared element type and, when fully known, the
/// declared shape; otherwise it is shaped `[1, len]`.
pub(crate) fn emotion_table_tensor(binding: &TensorBinding, table: &EmotionTable) -> Result<Tensor> {
    let indices = table.class_indices();
    let shape = match binding.shape.as_ref() {
        Some(shape) => {
            anyhow::ensure!(
                shape.iter().product::<usize>() == indices.len(),
                "emotion table input '{}' has shape {:?}, which cannot hold {} classes",
                binding.name,
                shape,
                indices.len()
            );
            shape.clone()
        }
        None => vec![1, indices.len()],
    };
    let tensor = Tensor::from_shape(&shape, &indices)
        .map_err(|e| anyhow::anyhow!("failed to build emotion table tensor: {e}"))?;
    let tensor = tensor
        .cast_to_dt(binding.datum_type)
        .map_err(|e| {
            anyhow::anyhow!(
                "emotion table input '{}' has unsupported type {:?}: {e}",
                binding.name,
                binding.datum_type
            )
        })?
        .into_owned();
    Ok(tensor)
}

fn log_descriptor(path: &Path, descriptor: &ModelDescriptor) {
    info!("Loaded emotion model {}", path.display());
    info!("Input: {}", format_binding(&descriptor.data_input));
    if let Some(aux) = descriptor.auxiliary_input.as_ref() {
        info!("Input: {} (emotion table)", format_binding(aux));
    }
    info!("Output: {}", format_binding(&descriptor.output));
}

fn format_binding(binding: &TensorBinding) -> String {
    match binding.shape.as_ref() {
        Some(shape) => format!("{} {:?} {:?}", binding.name, binding.datum_type, shape),
        None => format!("{} {:?} (dynamic)", binding.name, binding.datum_type),
    }
}
