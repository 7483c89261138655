//! Inference engine: batches-of-one model execution on the pinned pool.

use async_trait::async_trait;
use speedreader_core::{EngineConfig, OcrError};
use speedreader_cpu::{optimal_cpus, PinnedPool};
use speedreader_kernel::{InferenceSession, SessionOptions, TensorData};
use std::sync::Arc;
use tracing::debug;

/// The capability set every inference engine exposes to the pipeline.
///
/// CPU-only in this repo; the trait is the seam that lets tests substitute a
/// synthetic model.
#[async_trait]
pub trait TextInference: Send + Sync {
    /// Execute the model on one unbatched input tensor.
    async fn run(&self, input: TensorData) -> Result<TensorData, OcrError>;

    /// Number of kernel invocations that can make progress concurrently.
    /// Upstream admission and stage parallelism are sized from this.
    fn current_max_capacity(&self) -> usize;
}

/// Engine that schedules single-item kernel runs on the affinitized pool.
pub struct CpuEngine {
    session: Arc<InferenceSession>,
    pool: Arc<PinnedPool>,
}

impl CpuEngine {
    #[must_use]
    pub fn new(session: InferenceSession, pool: Arc<PinnedPool>) -> Self {
        Self {
            session: Arc::new(session),
            pool,
        }
    }

    /// Load a model and wrap it over the given pool, per the engine config.
    pub fn load(
        name: &str,
        model_bytes: &[u8],
        config: &EngineConfig,
        pool: Arc<PinnedPool>,
    ) -> Result<Self, OcrError> {
        let EngineConfig::Cpu {
            intra_op_threads,
            inter_op_threads,
            profiling,
            ..
        } = config;
        let options = SessionOptions {
            intra_threads: *intra_op_threads,
            inter_threads: *inter_op_threads,
            enable_profiling: *profiling,
        };
        let session = InferenceSession::from_bytes(name, model_bytes, &options)?;
        debug!(model = name, pool = pool.size(), "cpu engine ready");
        Ok(Self::new(session, pool))
    }
}

#[async_trait]
impl TextInference for CpuEngine {
    async fn run(&self, input: TensorData) -> Result<TensorData, OcrError> {
        // Unit batch dimension on, kernel call on a pinned thread, unit batch off.
        let batched = input.with_unit_batch()?;
        let session = Arc::clone(&self.session);
        let output = self
            .pool
            .run(move || session.run(batched))
            .await
            .map_err(OcrError::from)??;
        Ok(output.strip_unit_batch()?)
    }

    fn current_max_capacity(&self) -> usize {
        self.pool.size()
    }
}

/// Resolve the worker core list from the engine config: explicit cores when
/// given, the L2 topology probe otherwise.
pub fn resolve_cores(config: &EngineConfig) -> Result<Vec<usize>, OcrError> {
    let EngineConfig::Cpu { cores, .. } = config;
    match cores {
        Some(ids) => Ok(ids.clone()),
        None => Ok(optimal_cpus().map_err(OcrError::from)?.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Doubler {
        pool: Arc<PinnedPool>,
    }

    #[async_trait]
    impl TextInference for Doubler {
        async fn run(&self, input: TensorData) -> Result<TensorData, OcrError> {
            let out = self
                .pool
                .run(move || {
                    let data = input.data.iter().map(|v| v * 2.0).collect();
                    TensorData::new(data, input.shape)
                })
                .await
                .map_err(OcrError::from)??;
            Ok(out)
        }

        fn current_max_capacity(&self) -> usize {
            self.pool.size()
        }
    }

    #[tokio::test]
    async fn trait_object_dispatch_works() {
        let pool = Arc::new(PinnedPool::unpinned(1).unwrap());
        let engine: Arc<dyn TextInference> = Arc::new(Doubler { pool });
        let input = TensorData::new(vec![1.0, 2.0], vec![2]).unwrap();
        let output = engine.run(input).await.unwrap();
        assert_eq!(output.data, vec![2.0, 4.0]);
        assert_eq!(engine.current_max_capacity(), 1);
    }

    #[test]
    fn explicit_cores_bypass_probe() {
        let config = EngineConfig::Cpu {
            cores: Some(vec![2, 4]),
            intra_op_threads: 1,
            inter_op_threads: 1,
            profiling: false,
        };
        assert_eq!(resolve_cores(&config).unwrap(), vec![2, 4]);
    }
}
