//! Recognition output types.

use crate::geometry::BoundingBox;
use serde::{Deserialize, Serialize};

/// A single recognized word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Word {
    pub bounding_box: BoundingBox,
    pub text: String,
    /// Recognition confidence in `[0, 1]`.
    pub confidence: f32,
}

/// All words recognized on one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrResult {
    pub page_number: usize,
    pub words: Vec<Word>,
}

impl OcrResult {
    #[must_use]
    pub fn empty(page_number: usize) -> Self {
        Self {
            page_number,
            words: Vec::new(),
        }
    }
}

/// Caller-supplied context that rides with an image through the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageContext {
    pub page_number: usize,
    /// Originating file name, when known (CLI and multipart uploads).
    pub source: Option<String>,
}

impl PageContext {
    #[must_use]
    pub fn new(page_number: usize) -> Self {
        Self {
            page_number,
            source: None,
        }
    }

    #[must_use]
    pub fn with_source(page_number: usize, source: impl Into<String>) -> Self {
        Self {
            page_number,
            source: Some(source.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_result_has_no_words() {
        let result = OcrResult::empty(3);
        assert_eq!(result.page_number, 3);
        assert!(result.words.is_empty());
    }
}
