//! Wire format for CLI and HTTP responses.

use crate::result::{OcrResult, Word};
use serde::{Deserialize, Serialize};

/// One page of the JSON response: camelCase keys, pretty-printed by callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrJsonResult {
    pub filename: Option<String>,
    pub results: Vec<Word>,
}

impl OcrJsonResult {
    #[must_use]
    pub fn new(filename: Option<String>, result: OcrResult) -> Self {
        Self {
            filename,
            results: result.words,
        }
    }
}

/// Serialize a batch of page results the way every surface emits them.
pub fn to_pretty_json(pages: &[OcrJsonResult]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(pages)
}
