//! CPU topology probing and the affinitized inference worker pool.
//!
//! Inference threads are pinned one-per-L2-cache so sibling hyperthreads
//! never compete for the same cache, and performance cores are preferred over
//! efficiency cores. Pinning is Linux-only; [`pool::PinnedPool::unpinned`] is
//! the explicit override for tests and unsupported platforms.

mod error;
pub mod pool;
pub mod topology;

pub use error::CpuError;
pub use pool::{JobHandle, PinnedPool};
pub use topology::optimal_cpus;
