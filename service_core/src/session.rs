use crate::{
    config::{DevicePreference, ModelConfig},
    error::{InferenceError, StartupError},
    invoke::Cancellation,
};
use ndarray::{ArrayD, ArrayView4};
use ort::{
    execution_providers::{CUDAExecutionProvider, ExecutionProvider},
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::{fmt, path::PathBuf, sync::Mutex};

/// A network mapping one NCHW `f32` tensor to its first output tensor.
///
/// Implementations that serialize runs check `cancellation` once they hold
/// their lock and skip the run if the caller has already given up.
pub trait TensorModel: Send + Sync + 'static {
    fn run(
        &self,
        input: ArrayView4<'_, f32>,
        cancellation: &Cancellation,
    ) -> Result<ArrayD<f32>, InferenceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cuda,
    Cpu,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cuda => f.write_str("cuda"),
            Device::Cpu => f.write_str("cpu"),
        }
    }
}

/// Picks the device from the preference and the outcome of registering the
/// accelerator. `register_accelerator` is not called for `Cpu`; a failed
/// registration falls back to CPU for both `Auto` and `Cuda`.
fn resolve_device<E: fmt::Display>(
    preference: DevicePreference,
    register_accelerator: impl FnOnce() -> Result<(), E>,
) -> Device {
    if preference == DevicePreference::Cpu {
        return Device::Cpu;
    }

    match register_accelerator() {
        Ok(()) => Device::Cuda,
        Err(e) if preference == DevicePreference::Cuda => {
            tracing::warn!("CUDA requested but unusable, falling back to CPU: {}", e);
            Device::Cpu
        }
        Err(e) => {
            tracing::info!("No usable CUDA device, running on CPU: {}", e);
            Device::Cpu
        }
    }
}

/// A model loaded once at startup and bound to one device for the lifetime of
/// the process. ONNX Runtime needs exclusive access to run a session, so every
/// run holds the inner mutex.
pub struct ModelSession {
    session: Mutex<Session>,
    device: Device,
    model_path: PathBuf,
}

impl ModelSession {
    pub fn initialize(model_config: &ModelConfig) -> Result<Self, StartupError> {
        model_config.validate()?;

        let model_path = model_config.get_path();

        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(model_config.intra_threads)?;
        // Registration loads the provider against the real driver, unlike
        // `is_available`, which only reports how the runtime was built.
        let device = resolve_device(model_config.device, || {
            CUDAExecutionProvider::default().register(&mut builder)
        });
        let session = builder.commit_from_file(&model_path)?;

        tracing::info!(
            "Loaded model {:?} on {} with {} intra-op threads",
            model_path,
            device,
            model_config.intra_threads
        );

        Ok(Self {
            session: Mutex::new(session),
            device,
            model_path,
        })
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn model_path(&self) -> &PathBuf {
        &self.model_path
    }
}

impl TensorModel for ModelSession {
    fn run(
        &self,
        input: ArrayView4<'_, f32>,
        cancellation: &Cancellation,
    ) -> Result<ArrayD<f32>, InferenceError> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| InferenceError::SessionPoisoned)?;
        cancellation.check()?;

        let owned_buffer;
        let input_view = if input.is_standard_layout() {
            input.reborrow()
        } else {
            owned_buffer = input.to_owned();
            owned_buffer.view()
        };

        let tensor_ref = TensorRef::from_array_view(input_view)?;
        let outputs = session.run(ort::inputs![tensor_ref])?;

        if outputs.len() == 0 {
            return Err(InferenceError::Output("model produced no outputs".into()));
        }

        // Copies the tensor into host memory owned by the caller.
        let array = outputs[0].try_extract_array::<f32>()?.to_owned();

        Ok(array)
    }
}
