//! The pipeline fabric: a linear composition of bounded stages moving
//! `(image, context)` pairs through detect -> crop -> recognize -> assemble.
//!
//! Every stage owns a bounded input channel (default capacity 1) drained by a
//! fixed number of worker tasks; a full downstream channel suspends the
//! upstream sender, which is the backpressure story. CPU-bound work always
//! hops to the pinned pool; the cooperative tasks here only coordinate.
//! Fatal failures poison downstream channels; per-item failures ride inside
//! the item's completion. Cancellation (per item and whole pipeline) is
//! checked at every channel boundary and before each kernel invocation.

mod assembler;
mod metrics;
mod stages;

pub use metrics::{MetricsSnapshot, PipelineMetrics};

use futures::{Stream, StreamExt};
use speedreader_core::{Image, OcrError, OcrResult, PageContext, PipelineConfig};
use speedreader_cpu::PinnedPool;
use speedreader_engine::TextInference;
use speedreader_ocr::{Detector, Recognizer};
use stages::{DetectJob, StageMsg};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Handle to a running OCR pipeline. Cheap to clone; dropping every handle
/// closes the head channel, which propagates completion through the stages
/// after in-flight work drains.
#[derive(Clone)]
pub struct OcrPipeline {
    ingress: mpsc::Sender<StageMsg<DetectJob>>,
    cancel: CancellationToken,
    metrics: Arc<PipelineMetrics>,
    buffer_depth: usize,
}

impl OcrPipeline {
    /// Wire up the stages and spawn their workers.
    ///
    /// Stage parallelism defaults to each engine's `current_max_capacity`,
    /// keeping the kernel busy whenever the queue is non-empty while bounding
    /// memory.
    pub fn new(
        det_engine: Arc<dyn TextInference>,
        rec_engine: Arc<dyn TextInference>,
        detector: Detector,
        recognizer: Recognizer,
        pool: Arc<PinnedPool>,
        config: &PipelineConfig,
    ) -> Self {
        let cancel = CancellationToken::new();
        let metrics = Arc::new(PipelineMetrics::default());

        let capacity = config.channel_capacity.max(1);
        let n_det = config
            .detect_parallelism
            .unwrap_or_else(|| det_engine.current_max_capacity())
            .max(1);
        let n_rec = config
            .recognize_parallelism
            .unwrap_or_else(|| rec_engine.current_max_capacity())
            .max(1);

        let (ingress_tx, ingress_rx) = mpsc::channel(capacity);
        let (crop_tx, crop_rx) = mpsc::channel(capacity);
        let (rec_tx, rec_rx) = mpsc::channel(capacity);

        let ingress_rx = Arc::new(Mutex::new(ingress_rx));
        let crop_rx = Arc::new(Mutex::new(crop_rx));
        let rec_rx = Arc::new(Mutex::new(rec_rx));

        let detector = Arc::new(detector);
        let recognizer = Arc::new(recognizer);

        for _ in 0..n_det {
            tokio::spawn(stages::detect_worker(
                Arc::clone(&ingress_rx),
                crop_tx.clone(),
                Arc::clone(&det_engine),
                Arc::clone(&detector),
                Arc::clone(&pool),
                cancel.clone(),
                Arc::clone(&metrics),
            ));
        }
        for _ in 0..n_rec {
            tokio::spawn(stages::crop_worker(
                Arc::clone(&crop_rx),
                rec_tx.clone(),
                Arc::clone(&recognizer),
                Arc::clone(&pool),
                cancel.clone(),
            ));
            tokio::spawn(stages::recognize_worker(
                Arc::clone(&rec_rx),
                Arc::clone(&rec_engine),
                Arc::clone(&recognizer),
                Arc::clone(&pool),
                cancel.clone(),
                Arc::clone(&metrics),
            ));
        }

        info!(
            detect_workers = n_det,
            recognize_workers = n_rec,
            channel_capacity = capacity,
            "pipeline online"
        );

        Self {
            ingress: ingress_tx,
            cancel,
            metrics,
            buffer_depth: (n_det * 2).max(4),
        }
    }

    /// Run one image through the pipeline.
    pub async fn submit(&self, image: Image, ctx: PageContext) -> Result<OcrResult, OcrError> {
        self.submit_with_cancel(image, ctx, CancellationToken::new())
            .await
    }

    /// Like [`OcrPipeline::submit`], with a caller-held token that aborts
    /// just this item. The pipeline-wide token is carried separately.
    pub async fn submit_with_cancel(
        &self,
        image: Image,
        ctx: PageContext,
        item_cancel: CancellationToken,
    ) -> Result<OcrResult, OcrError> {
        if self.cancel.is_cancelled() || item_cancel.is_cancelled() {
            return Err(OcrError::Cancelled);
        }
        self.metrics.page_submitted();

        let (done_tx, done_rx) = oneshot::channel();
        let job = DetectJob {
            image: Arc::new(image),
            ctx,
            cancel: item_cancel,
            done: done_tx,
        };

        // Backpressure: suspends here while the detect stage is full.
        tokio::select! {
            _ = self.cancel.cancelled() => return Err(OcrError::Cancelled),
            sent = self.ingress.send(StageMsg::Item(job)) => {
                if sent.is_err() {
                    return Err(OcrError::Pipeline("pipeline is shut down".into()));
                }
            }
        }

        match done_rx.await {
            Ok(result) => result,
            Err(_) if self.cancel.is_cancelled() => Err(OcrError::Cancelled),
            Err(_) => Err(OcrError::Pipeline(
                "pipeline dropped the page before completion".into(),
            )),
        }
    }

    /// Process a stream of images, yielding results in input order.
    pub fn read_many<'a, S>(
        &'a self,
        images: S,
    ) -> impl Stream<Item = Result<OcrResult, OcrError>> + 'a
    where
        S: Stream<Item = Image> + 'a,
    {
        images
            .enumerate()
            .map(move |(page, image)| self.submit(image, PageContext::new(page)))
            .buffered(self.buffer_depth)
    }

    /// [`OcrPipeline::submit`] with a deadline: a timeout is cancellation of
    /// the item's own token once the deadline passes.
    pub async fn submit_with_deadline(
        &self,
        image: Image,
        ctx: PageContext,
        deadline: std::time::Duration,
    ) -> Result<OcrResult, OcrError> {
        let token = CancellationToken::new();
        let timer = token.clone();
        let submit = self.submit_with_cancel(image, ctx, token);
        tokio::pin!(submit);
        tokio::select! {
            result = &mut submit => result,
            () = tokio::time::sleep(deadline) => {
                timer.cancel();
                submit.await
            }
        }
    }

    /// Tear down all in-flight and queued work. Outstanding submissions
    /// resolve with [`OcrError::Cancelled`].
    pub fn cancel_all(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl std::fmt::Debug for OcrPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrPipeline")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("metrics", &self.metrics.snapshot())
            .finish_non_exhaustive()
    }
}
