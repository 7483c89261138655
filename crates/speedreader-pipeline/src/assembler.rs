//! Fan-in of recognized words back into one page result.

use crate::metrics::PipelineMetrics;
use speedreader_core::{OcrError, OcrResult, Word};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

/// Gathers the words of one page. Region recognition is unordered; words are
/// slotted by region index, and the page completes only when every region
/// has reported. The first failure wins and resolves the page's future.
pub struct PageAssembler {
    page_number: usize,
    slots: Mutex<Vec<Option<Word>>>,
    remaining: AtomicUsize,
    failed: AtomicBool,
    done: Mutex<Option<oneshot::Sender<Result<OcrResult, OcrError>>>>,
    metrics: Arc<PipelineMetrics>,
}

impl PageAssembler {
    pub fn new(
        page_number: usize,
        region_count: usize,
        done: oneshot::Sender<Result<OcrResult, OcrError>>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            page_number,
            slots: Mutex::new(vec![None; region_count]),
            remaining: AtomicUsize::new(region_count),
            failed: AtomicBool::new(false),
            done: Mutex::new(Some(done)),
            metrics,
        }
    }

    /// Record the word for one region; completes the page when it is the
    /// last one outstanding.
    pub fn complete(&self, index: usize, word: Word) {
        {
            let mut slots = self.slots.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Some(slot) = slots.get_mut(index) {
                *slot = Some(word);
            }
        }
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.finish();
        }
    }

    fn finish(&self) {
        if self.failed.load(Ordering::Acquire) {
            return;
        }
        let words: Vec<Word> = {
            let mut slots = self.slots.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            slots.iter_mut().filter_map(Option::take).collect()
        };
        if let Some(done) = self.take_sender() {
            self.metrics.page_completed();
            let _ = done.send(Ok(OcrResult {
                page_number: self.page_number,
                words,
            }));
        }
    }

    /// Fail the whole page. Idempotent; later completions become no-ops.
    pub fn fail(&self, err: OcrError) {
        if self.failed.swap(true, Ordering::AcqRel) {
            return;
        }
        if matches!(err, OcrError::Cancelled) {
            self.metrics.cancellation();
        }
        if let Some(done) = self.take_sender() {
            let _ = done.send(Err(err));
        }
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    fn take_sender(&self) -> Option<oneshot::Sender<Result<OcrResult, OcrError>>> {
        self.done.lock().unwrap_or_else(std::sync::PoisonError::into_inner).take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use speedreader_core::{BoundingBox, Point, Polygon, RotatedRectangle};

    fn word(text: &str) -> Word {
        let rect = RotatedRectangle::new(0.0, 0.0, 2.0, 1.0, 0.0);
        Word {
            bounding_box: BoundingBox {
                axis_aligned_rectangle: rect.axis_aligned(),
                rotated_rectangle: rect,
                polygon: Polygon::new(vec![Point::new(0.0, 0.0)]),
            },
            text: text.into(),
            confidence: 1.0,
        }
    }

    #[tokio::test]
    async fn completes_in_region_order_regardless_of_arrival() {
        let (tx, rx) = oneshot::channel();
        let assembler = PageAssembler::new(7, 3, tx, Arc::new(PipelineMetrics::default()));
        assembler.complete(2, word("c"));
        assembler.complete(0, word("a"));
        assembler.complete(1, word("b"));
        let result = rx.await.unwrap().unwrap();
        assert_eq!(result.page_number, 7);
        let texts: Vec<_> = result.words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn first_failure_wins() {
        let (tx, rx) = oneshot::channel();
        let assembler = PageAssembler::new(0, 2, tx, Arc::new(PipelineMetrics::default()));
        assembler.complete(0, word("a"));
        assembler.fail(OcrError::Inference("boom".into()));
        assembler.fail(OcrError::Cancelled);
        assembler.complete(1, word("b"));
        let result = rx.await.unwrap();
        assert_eq!(result, Err(OcrError::Inference("boom".into())));
    }

    #[tokio::test]
    async fn failure_resolves_with_regions_still_outstanding() {
        let (tx, rx) = oneshot::channel();
        let assembler = PageAssembler::new(1, 1, tx, Arc::new(PipelineMetrics::default()));
        assembler.fail(OcrError::Cancelled);
        assert!(assembler.is_failed());
        assert_eq!(rx.await.unwrap(), Err(OcrError::Cancelled));
    }
}
