//! Error kinds shared across the pipeline.

use thiserror::Error;

/// Errors surfaced by SpeedReader operations.
///
/// Per-item failures (`InvalidInput`, `Inference`, `Cancelled`) are carried
/// inside the item's result and never tear down the pipeline. `Pipeline`
/// indicates a fatal invariant violation: the fabric poisons its channels and
/// every outstanding submission resolves to it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OcrError {
    /// Unreadable or malformed input: unknown image format, empty request
    /// body, bad content type.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A decoded image buffer was not a contiguous `H x W x 3` block.
    #[error("image buffer is not contiguous: expected {expected} bytes, got {actual}")]
    NonContiguous { expected: usize, actual: usize },

    /// The inference kernel returned a non-OK status or a mismatched shape.
    /// The pool worker and session remain usable.
    #[error("inference failed: {0}")]
    Inference(String),

    /// Cooperative cancellation was observed at a checkpoint.
    #[error("operation cancelled")]
    Cancelled,

    /// Fatal invariant violation; surfaces on all outstanding submissions.
    #[error("pipeline failure: {0}")]
    Pipeline(String),

    /// CPU pinning was attempted on a platform without support.
    #[error("platform unsupported: {0}")]
    PlatformUnsupported(String),
}

impl OcrError {
    /// Whether this error tears the pipeline down rather than failing one item.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Pipeline(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification() {
        assert!(OcrError::Pipeline("poisoned".into()).is_fatal());
        assert!(!OcrError::InvalidInput("bad png".into()).is_fatal());
        assert!(!OcrError::Cancelled.is_fatal());
    }

    #[test]
    fn display_includes_sizes() {
        let err = OcrError::NonContiguous {
            expected: 300,
            actual: 256,
        };
        let msg = err.to_string();
        assert!(msg.contains("300"));
        assert!(msg.contains("256"));
    }
}
