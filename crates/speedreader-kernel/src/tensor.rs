//! The tensor type crossing the kernel boundary.

use crate::error::KernelError;

/// Maximum tensor rank accepted by the native ABI.
pub const MAX_TENSOR_DIMS: usize = 16;

/// A dense row-major `f32` tensor plus its shape.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorData {
    pub data: Vec<f32>,
    pub shape: Vec<usize>,
}

impl TensorData {
    /// Build a tensor, validating that the shape multiplies out to the data
    /// length, that the rank is within the ABI limit, and that no dimension
    /// is zero.
    pub fn new(data: Vec<f32>, shape: Vec<usize>) -> Result<Self, KernelError> {
        if shape.len() > MAX_TENSOR_DIMS {
            return Err(KernelError::RankTooLarge {
                rank: shape.len(),
                max: MAX_TENSOR_DIMS,
            });
        }
        if shape.iter().any(|&d| d == 0) {
            return Err(KernelError::ZeroDimension { shape });
        }
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(KernelError::ShapeMismatch {
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { data, shape })
    }

    #[inline]
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.data.len()
    }

    #[inline]
    #[must_use]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Return a copy with a unit batch dimension prepended.
    pub fn with_unit_batch(&self) -> Result<Self, KernelError> {
        let mut shape = Vec::with_capacity(self.shape.len() + 1);
        shape.push(1);
        shape.extend_from_slice(&self.shape);
        Self::new(self.data.clone(), shape)
    }

    /// Strip a leading unit batch dimension, failing if the leading dimension
    /// is not 1.
    pub fn strip_unit_batch(mut self) -> Result<Self, KernelError> {
        match self.shape.first() {
            Some(1) => {
                self.shape.remove(0);
                Ok(self)
            }
            _ => Err(KernelError::BatchDimension { shape: self.shape }),
        }
    }
}
