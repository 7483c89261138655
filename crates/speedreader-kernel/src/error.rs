//! Kernel error type.

use speedreader_core::OcrError;
use thiserror::Error;

/// Errors produced at the inference-kernel boundary.
#[derive(Debug, Clone, Error)]
pub enum KernelError {
    /// The model could not be parsed or the session could not be built.
    #[error("failed to load model '{name}': {message}")]
    ModelLoad { name: String, message: String },

    /// The native runtime returned a non-OK status; carries its error string.
    #[error("kernel run failed: {0}")]
    Native(String),

    /// A tensor's declared shape does not multiply out to its data length.
    #[error("tensor shape {shape:?} implies {expected} elements, buffer holds {actual}")]
    ShapeMismatch {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    /// The output element count differs from what the caller declared.
    #[error("output element count mismatch: expected {expected}, kernel produced {actual}")]
    OutputSizeMismatch { expected: usize, actual: usize },

    /// A unit batch dimension was expected but absent.
    #[error("expected a unit batch dimension, got shape {shape:?}")]
    BatchDimension { shape: Vec<usize> },

    /// Tensor rank exceeds the ABI limit.
    #[error("tensor rank {rank} exceeds the supported maximum of {max}")]
    RankTooLarge { rank: usize, max: usize },

    /// A tensor dimension of zero was supplied.
    #[error("tensor shape {shape:?} contains a zero dimension")]
    ZeroDimension { shape: Vec<usize> },
}

impl From<KernelError> for OcrError {
    fn from(err: KernelError) -> Self {
        OcrError::Inference(err.to_string())
    }
}
