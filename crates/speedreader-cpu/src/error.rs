//! CPU subsystem errors.

use speedreader_core::OcrError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CpuError {
    /// sysfs reported no level-2 caches.
    #[error("topology probe found no level-2 caches")]
    NoL2Caches,

    /// L2 caches exist but no primary SMT thread could be selected.
    #[error("topology probe found no eligible cpus")]
    NoEligibleCpus,

    /// Reading the topology out of sysfs failed.
    #[error("topology probe failed: {0}")]
    Probe(String),

    /// The pool was constructed with an empty core list.
    #[error("worker pool requires at least one core")]
    EmptyPool,

    /// A worker failed to pin itself; fatal for pool construction.
    #[error("failed to pin worker thread to cpu {core}")]
    PinFailed { core: usize },

    /// Pinning was requested on a platform without affinity support.
    #[error("cpu pinning is not supported on this platform")]
    PlatformUnsupported,

    /// The pool's queue closed while a job was waiting on it.
    #[error("worker pool has shut down")]
    PoolShutdown,
}

impl From<CpuError> for OcrError {
    fn from(err: CpuError) -> Self {
        match err {
            CpuError::PlatformUnsupported => OcrError::PlatformUnsupported(err.to_string()),
            other => OcrError::Pipeline(other.to_string()),
        }
    }
}
