//! The affinitized worker pool.
//!
//! One OS thread per core id; each worker pins itself before entering its
//! work loop. Jobs flow through an MPMC channel, so they start in FIFO order
//! across the pool while completing in arbitrary order.

use crate::error::CpuError;
use crossbeam_channel::{Receiver, Sender};
use std::thread::JoinHandle;
use tokio::sync::oneshot;
use tracing::{debug, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A pool of worker threads pinned to specific CPU cores.
pub struct PinnedPool {
    tx: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    size: usize,
}

impl PinnedPool {
    /// Spawn one pinned worker per core id. A worker that cannot pin itself
    /// aborts during startup and fails the whole construction.
    pub fn pinned(core_ids: &[usize]) -> Result<Self, CpuError> {
        Self::build(core_ids.iter().map(|&id| Some(id)).collect())
    }

    /// Spawn `size` workers without touching thread affinity. This is the
    /// configuration override for tests and platforms without pinning
    /// support.
    pub fn unpinned(size: usize) -> Result<Self, CpuError> {
        Self::build(vec![None; size])
    }

    fn build(slots: Vec<Option<usize>>) -> Result<Self, CpuError> {
        if slots.is_empty() {
            return Err(CpuError::EmptyPool);
        }
        let size = slots.len();
        let (tx, rx) = crossbeam_channel::unbounded::<Job>();
        let (ack_tx, ack_rx) = crossbeam_channel::bounded::<Result<(), CpuError>>(size);

        let mut workers = Vec::with_capacity(size);
        for (index, slot) in slots.into_iter().enumerate() {
            let rx = rx.clone();
            let ack = ack_tx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("sr-infer-{index}"))
                .spawn(move || {
                    if let Some(core) = slot {
                        if let Err(err) = pin_current_thread(core) {
                            let _ = ack.send(Err(err));
                            return;
                        }
                        debug!(worker = index, core, "worker pinned");
                    }
                    let _ = ack.send(Ok(()));
                    worker_loop(&rx);
                })
                .map_err(|e| CpuError::Probe(format!("failed to spawn worker: {e}")))?;
            workers.push(handle);
        }
        drop(ack_tx);

        for _ in 0..size {
            match ack_rx.recv() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    // Tear down the part-built pool before surfacing.
                    drop(tx);
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(err);
                }
                Err(_) => {
                    drop(tx);
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(CpuError::PoolShutdown);
                }
            }
        }

        Ok(Self {
            tx: Some(tx),
            workers,
            size,
        })
    }

    /// Number of worker threads.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Enqueue a job; the returned handle resolves with its result.
    pub fn submit<F, R>(&self, job: F) -> JobHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let boxed: Job = Box::new(move || {
            let _ = done_tx.send(job());
        });
        let sent = self
            .tx
            .as_ref()
            .map(|tx| tx.send(boxed).is_ok())
            .unwrap_or(false);
        JobHandle {
            rx: done_rx,
            enqueued: sent,
        }
    }

    /// Submit and await in one step.
    pub async fn run<F, R>(&self, job: F) -> Result<R, CpuError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.submit(job).join().await
    }
}

impl Drop for PinnedPool {
    fn drop(&mut self) {
        // Closing the channel lets every worker drain and exit.
        self.tx.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("worker thread panicked during shutdown");
            }
        }
    }
}

fn worker_loop(rx: &Receiver<Job>) {
    while let Ok(job) = rx.recv() {
        job();
    }
}

/// Completion handle for a submitted job.
pub struct JobHandle<R> {
    rx: oneshot::Receiver<R>,
    enqueued: bool,
}

impl<R> JobHandle<R> {
    /// Wait for the job to finish on its worker thread.
    pub async fn join(self) -> Result<R, CpuError> {
        if !self.enqueued {
            return Err(CpuError::PoolShutdown);
        }
        self.rx.await.map_err(|_| CpuError::PoolShutdown)
    }
}

#[cfg(target_os = "linux")]
fn pin_current_thread(core: usize) -> Result<(), CpuError> {
    if core_affinity::set_for_current(core_affinity::CoreId { id: core }) {
        Ok(())
    } else {
        Err(CpuError::PinFailed { core })
    }
}

#[cfg(not(target_os = "linux"))]
fn pin_current_thread(_core: usize) -> Result<(), CpuError> {
    Err(CpuError::PlatformUnsupported)
}
