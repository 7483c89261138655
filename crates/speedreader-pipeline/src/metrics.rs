//! Shared pipeline counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters updated from every stage. Cheap enough to live on the hot
/// path; the kernel dominates throughput, not these.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    pages_submitted: AtomicU64,
    pages_completed: AtomicU64,
    regions_detected: AtomicU64,
    words_recognized: AtomicU64,
    inference_failures: AtomicU64,
    cancellations: AtomicU64,
}

impl PipelineMetrics {
    pub fn page_submitted(&self) {
        self.pages_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn page_completed(&self) {
        self.pages_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn regions_detected(&self, count: usize) {
        self.regions_detected
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn word_recognized(&self) {
        self.words_recognized.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inference_failure(&self) {
        self.inference_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cancellation(&self) {
        self.cancellations.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pages_submitted: self.pages_submitted.load(Ordering::Relaxed),
            pages_completed: self.pages_completed.load(Ordering::Relaxed),
            regions_detected: self.regions_detected.load(Ordering::Relaxed),
            words_recognized: self.words_recognized.load(Ordering::Relaxed),
            inference_failures: self.inference_failures.load(Ordering::Relaxed),
            cancellations: self.cancellations.load(Ordering::Relaxed),
        }
    }
}

impl Drop for PipelineMetrics {
    fn drop(&mut self) {
        tracing::info!(snapshot = ?self.snapshot(), "pipeline metrics at shutdown");
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub pages_submitted: u64,
    pub pages_completed: u64,
    pub regions_detected: u64,
    pub words_recognized: u64,
    pub inference_failures: u64,
    pub cancellations: u64,
}
