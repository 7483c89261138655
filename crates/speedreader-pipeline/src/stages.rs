//! Stage worker loops.
//!
//! Each stage is a bounded mpsc channel drained by N worker tasks through a
//! shared receiver (one mutex per channel). Workers pull one item, run its
//! CPU work on the pinned pool, and push downstream; a full downstream
//! channel parks the worker, which is what bounds in-flight work per stage.

use crate::assembler::PageAssembler;
use crate::metrics::PipelineMetrics;
use image::RgbImage;
use speedreader_core::{Image, OcrError, OcrResult, PageContext};
use speedreader_cpu::{CpuError, PinnedPool};
use speedreader_engine::TextInference;
use speedreader_ocr::{DetectedRegion, Detector, Recognizer};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Channel message: a live item, or the error sentinel a fatally failed
/// stage uses to poison its downstream.
pub(crate) enum StageMsg<T> {
    Item(T),
    Poison(OcrError),
}

pub(crate) struct DetectJob {
    pub image: Arc<Image>,
    pub ctx: PageContext,
    pub cancel: CancellationToken,
    pub done: oneshot::Sender<Result<OcrResult, OcrError>>,
}

pub(crate) struct CropJob {
    pub image: Arc<Image>,
    pub regions: Vec<DetectedRegion>,
    pub cancel: CancellationToken,
    pub assembler: Arc<PageAssembler>,
}

pub(crate) struct RecognizeJob {
    pub crop: RgbImage,
    pub region: DetectedRegion,
    pub index: usize,
    pub cancel: CancellationToken,
    pub assembler: Arc<PageAssembler>,
}

type SharedRx<T> = Arc<Mutex<mpsc::Receiver<StageMsg<T>>>>;

/// Pull the next message, yielding `None` on channel close or pipeline
/// cancellation - either way the worker exits.
async fn next_msg<T>(rx: &SharedRx<T>, cancel: &CancellationToken) -> Option<StageMsg<T>> {
    let mut guard = tokio::select! {
        _ = cancel.cancelled() => return None,
        guard = rx.lock() => guard,
    };
    tokio::select! {
        _ = cancel.cancelled() => None,
        msg = guard.recv() => msg,
    }
}

/// Collapse a pool round-trip: a dead pool is a fatal pipeline error, an
/// inner error is the item's own.
fn flatten<T>(result: Result<Result<T, OcrError>, CpuError>) -> Result<T, OcrError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(OcrError::from(err)),
    }
}

pub(crate) async fn detect_worker(
    rx: SharedRx<DetectJob>,
    crop_tx: mpsc::Sender<StageMsg<CropJob>>,
    engine: Arc<dyn TextInference>,
    detector: Arc<Detector>,
    pool: Arc<PinnedPool>,
    cancel: CancellationToken,
    metrics: Arc<PipelineMetrics>,
) {
    while let Some(msg) = next_msg(&rx, &cancel).await {
        let job = match msg {
            StageMsg::Poison(err) => {
                let _ = crop_tx.send(StageMsg::Poison(err)).await;
                continue;
            }
            StageMsg::Item(job) => job,
        };

        if job.cancel.is_cancelled() || cancel.is_cancelled() {
            metrics.cancellation();
            let _ = job.done.send(Err(OcrError::Cancelled));
            continue;
        }

        let page = job.ctx.page_number;
        let det = Arc::clone(&detector);
        let image = Arc::clone(&job.image);
        let preprocessed = flatten(pool.run(move || det.preprocess(&image)).await);
        let (tensor, scale) = match preprocessed {
            Ok(v) => v,
            Err(err) => {
                fail_page(err, job.done, &crop_tx, &cancel, &metrics).await;
                continue;
            }
        };

        // Cancellation checkpoint before the kernel.
        if job.cancel.is_cancelled() || cancel.is_cancelled() {
            metrics.cancellation();
            let _ = job.done.send(Err(OcrError::Cancelled));
            continue;
        }

        let output = match engine.run(tensor).await {
            Ok(output) => output,
            Err(err) => {
                metrics.inference_failure();
                fail_page(err, job.done, &crop_tx, &cancel, &metrics).await;
                continue;
            }
        };

        // The engine future is a suspension point; re-check on resume.
        if job.cancel.is_cancelled() || cancel.is_cancelled() {
            metrics.cancellation();
            let _ = job.done.send(Err(OcrError::Cancelled));
            continue;
        }

        let det = Arc::clone(&detector);
        let regions = match flatten(pool.run(move || det.postprocess(output, scale)).await) {
            Ok(regions) => regions,
            Err(err) => {
                fail_page(err, job.done, &crop_tx, &cancel, &metrics).await;
                continue;
            }
        };
        metrics.regions_detected(regions.len());
        debug!(page, regions = regions.len(), "detected");

        if regions.is_empty() {
            metrics.page_completed();
            let _ = job.done.send(Ok(OcrResult::empty(page)));
            continue;
        }

        let assembler = Arc::new(PageAssembler::new(
            page,
            regions.len(),
            job.done,
            Arc::clone(&metrics),
        ));
        let assembler_for_cancel = Arc::clone(&assembler);
        let crop_job = CropJob {
            image: job.image,
            regions,
            cancel: job.cancel,
            assembler,
        };
        tokio::select! {
            _ = cancel.cancelled() => {
                assembler_for_cancel.fail(OcrError::Cancelled);
            }
            sent = crop_tx.send(StageMsg::Item(crop_job)) => {
                if let Err(mpsc::error::SendError(StageMsg::Item(job))) = sent {
                    job.assembler
                        .fail(OcrError::Pipeline("crop stage is gone".into()));
                }
            }
        }
    }
}

pub(crate) async fn crop_worker(
    rx: SharedRx<CropJob>,
    rec_tx: mpsc::Sender<StageMsg<RecognizeJob>>,
    recognizer: Arc<Recognizer>,
    pool: Arc<PinnedPool>,
    cancel: CancellationToken,
) {
    while let Some(msg) = next_msg(&rx, &cancel).await {
        let job = match msg {
            StageMsg::Poison(err) => {
                let _ = rec_tx.send(StageMsg::Poison(err)).await;
                continue;
            }
            StageMsg::Item(job) => job,
        };

        for (index, region) in job.regions.into_iter().enumerate() {
            if job.assembler.is_failed() {
                break;
            }
            if job.cancel.is_cancelled() || cancel.is_cancelled() {
                job.assembler.fail(OcrError::Cancelled);
                break;
            }

            let rec = Arc::clone(&recognizer);
            let image = Arc::clone(&job.image);
            let rect = region.rect;
            let cropped = flatten(pool.run(move || rec.crop(&image, &rect)).await);
            let crop = match cropped {
                Ok(crop) => crop,
                Err(err) => {
                    let fatal = err.is_fatal();
                    job.assembler.fail(err.clone());
                    if fatal {
                        let _ = rec_tx.send(StageMsg::Poison(err)).await;
                        cancel.cancel();
                    }
                    break;
                }
            };

            let rec_job = RecognizeJob {
                crop,
                region,
                index,
                cancel: job.cancel.clone(),
                assembler: Arc::clone(&job.assembler),
            };
            tokio::select! {
                _ = cancel.cancelled() => {
                    job.assembler.fail(OcrError::Cancelled);
                    break;
                }
                sent = rec_tx.send(StageMsg::Item(rec_job)) => {
                    if sent.is_err() {
                        job.assembler
                            .fail(OcrError::Pipeline("recognition stage is gone".into()));
                        break;
                    }
                }
            }
        }
    }
}

pub(crate) async fn recognize_worker(
    rx: SharedRx<RecognizeJob>,
    engine: Arc<dyn TextInference>,
    recognizer: Arc<Recognizer>,
    pool: Arc<PinnedPool>,
    cancel: CancellationToken,
    metrics: Arc<PipelineMetrics>,
) {
    while let Some(msg) = next_msg(&rx, &cancel).await {
        let job = match msg {
            StageMsg::Poison(err) => {
                // Tail stage: drop the sentinel after logging it.
                warn!(error = %err, "recognition stage dropping poisoned input");
                continue;
            }
            StageMsg::Item(job) => job,
        };

        if job.assembler.is_failed() {
            continue;
        }
        if job.cancel.is_cancelled() || cancel.is_cancelled() {
            job.assembler.fail(OcrError::Cancelled);
            continue;
        }

        let rec = Arc::clone(&recognizer);
        let crop = job.crop;
        let tensor = match flatten(pool.run(move || rec.preprocess(&crop)).await) {
            Ok(tensor) => tensor,
            Err(err) => {
                job.assembler.fail(err);
                continue;
            }
        };

        // Cancellation checkpoint before the kernel.
        if job.cancel.is_cancelled() || cancel.is_cancelled() {
            job.assembler.fail(OcrError::Cancelled);
            continue;
        }

        let output = match engine.run(tensor).await {
            Ok(output) => output,
            Err(err) => {
                metrics.inference_failure();
                job.assembler.fail(err);
                continue;
            }
        };

        // The engine future is a suspension point; re-check on resume.
        if job.cancel.is_cancelled() || cancel.is_cancelled() {
            job.assembler.fail(OcrError::Cancelled);
            continue;
        }

        let rec = Arc::clone(&recognizer);
        let decoded = match flatten(pool.run(move || rec.decode(output)).await) {
            Ok(decoded) => decoded,
            Err(err) => {
                job.assembler.fail(err);
                continue;
            }
        };

        let (text, confidence) = decoded;
        let word = Recognizer::build_word(&job.region, text, confidence);
        metrics.word_recognized();
        job.assembler.complete(job.index, word);
    }
}

/// Resolve a page's future with `err`; if the error is fatal, also poison
/// downstream and tear the pipeline down.
async fn fail_page(
    err: OcrError,
    done: oneshot::Sender<Result<OcrResult, OcrError>>,
    crop_tx: &mpsc::Sender<StageMsg<CropJob>>,
    cancel: &CancellationToken,
    metrics: &PipelineMetrics,
) {
    if matches!(err, OcrError::Cancelled) {
        metrics.cancellation();
    }
    if err.is_fatal() {
        let _ = crop_tx.send(StageMsg::Poison(err.clone())).await;
        cancel.cancel();
    }
    let _ = done.send(Err(err));
}
