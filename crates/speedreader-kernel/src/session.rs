//! Environment and session management over the native runtime.

use crate::error::KernelError;
use crate::tensor::{TensorData, MAX_TENSOR_DIMS};
use ndarray::{ArrayD, IxDyn};
use once_cell::sync::OnceCell;
use ort::{
    inputs,
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::sync::Mutex;
use tracing::debug;

static ENV: OnceCell<()> = OnceCell::new();

/// Initialize the process-wide runtime environment. Idempotent; the native
/// environment lives until process exit.
pub fn ensure_env() -> Result<(), KernelError> {
    ENV.get_or_try_init(|| {
        ort::init()
            .with_name("speedreader")
            .commit()
            .map(|_| ())
            .map_err(|e| KernelError::ModelLoad {
                name: "environment".into(),
                message: e.to_string(),
            })
    })
    .map(|_| ())
}

/// Session construction options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub intra_threads: usize,
    pub inter_threads: usize,
    pub enable_profiling: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            intra_threads: 1,
            inter_threads: 1,
            enable_profiling: false,
        }
    }
}

/// A loaded model session.
///
/// `run` may be called from any thread; construction is not thread-safe with
/// respect to other `create_*` calls and is expected to happen at startup.
/// Dropping the session releases the native handle exactly once.
pub struct InferenceSession {
    name: String,
    inner: Mutex<Session>,
}

impl InferenceSession {
    /// Build a session from in-memory model bytes.
    pub fn from_bytes(
        name: impl Into<String>,
        model_bytes: &[u8],
        options: &SessionOptions,
    ) -> Result<Self, KernelError> {
        ensure_env()?;
        let name = name.into();
        let mut builder = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level1))
            .and_then(|b| b.with_intra_threads(options.intra_threads))
            .and_then(|b| b.with_inter_threads(options.inter_threads))
            .map_err(|e| KernelError::ModelLoad {
                name: name.clone(),
                message: e.to_string(),
            })?;
        if options.enable_profiling {
            builder = builder
                .with_profiling("speedreader-profile")
                .map_err(|e| KernelError::ModelLoad {
                    name: name.clone(),
                    message: e.to_string(),
                })?;
        }
        let session = builder
            .commit_from_memory(model_bytes)
            .map_err(|e| KernelError::ModelLoad {
                name: name.clone(),
                message: e.to_string(),
            })?;
        debug!(session = %name, bytes = model_bytes.len(), "kernel session ready");
        Ok(Self {
            name,
            inner: Mutex::new(session),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute the model on one input tensor and return the output tensor.
    ///
    /// The native error string is preserved inside [`KernelError::Native`].
    pub fn run(&self, input: TensorData) -> Result<TensorData, KernelError> {
        let array = ArrayD::from_shape_vec(IxDyn(&input.shape), input.data).map_err(|e| {
            KernelError::Native(format!("input tensor rejected by runtime: {e}"))
        })?;

        let mut session = self
            .inner
            .lock()
            .map_err(|_| KernelError::Native("session mutex poisoned".into()))?;

        let input_ref: TensorRef<f32> = TensorRef::from_array_view(&array)
            .map_err(|e| KernelError::Native(e.to_string()))?;
        let outputs = session
            .run(inputs![input_ref])
            .map_err(|e| KernelError::Native(e.to_string()))?;

        let view = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| KernelError::Native(e.to_string()))?;
        let shape: Vec<usize> = view.shape().to_vec();
        if shape.len() > MAX_TENSOR_DIMS {
            return Err(KernelError::RankTooLarge {
                rank: shape.len(),
                max: MAX_TENSOR_DIMS,
            });
        }
        // Copy out of the runtime-owned buffer regardless of its layout.
        let data: Vec<f32> = view.iter().copied().collect();

        TensorData::new(data, shape)
    }

    /// Like [`InferenceSession::run`], but validates the output element count
    /// against what the caller sized its buffer for.
    pub fn run_expecting(
        &self,
        input: TensorData,
        expected_elements: usize,
    ) -> Result<TensorData, KernelError> {
        let output = self.run(input)?;
        if output.element_count() != expected_elements {
            return Err(KernelError::OutputSizeMismatch {
                expected: expected_elements,
                actual: output.element_count(),
            });
        }
        Ok(output)
    }
}

impl std::fmt::Debug for InferenceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceSession")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_are_single_threaded() {
        let options = SessionOptions::default();
        assert_eq!(options.intra_threads, 1);
        assert_eq!(options.inter_threads, 1);
        assert!(!options.enable_profiling);
    }

    #[test]
    fn garbage_model_bytes_fail_with_model_load() {
        let result =
            InferenceSession::from_bytes("junk", b"not a model", &SessionOptions::default());
        match result {
            Err(KernelError::ModelLoad { name, .. }) => assert_eq!(name, "junk"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("junk bytes must not load"),
        }
    }
}
