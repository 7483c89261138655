//! CTC character dictionary.

use speedreader_core::OcrError;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Replacement for indices outside the vocabulary.
const UNKNOWN: &str = "?";

/// Ordered character table for CTC decoding.
///
/// Index 0 is the blank token; line N of the dictionary file maps to index N,
/// so the vocabulary size is `lines + 1`.
#[derive(Debug, Clone)]
pub struct CharDictionary {
    entries: Vec<String>,
}

impl CharDictionary {
    pub fn from_path(path: &Path) -> Result<Self, OcrError> {
        let file = std::fs::File::open(path).map_err(|e| {
            OcrError::InvalidInput(format!(
                "failed to open character dictionary {}: {e}",
                path.display()
            ))
        })?;
        Self::from_reader(file)
    }

    /// Read one codepoint per line (UTF-8). Every line occupies its index
    /// slot, so a blank line becomes an empty entry rather than shifting the
    /// rest of the vocabulary away from what the model was trained against.
    pub fn from_reader(reader: impl Read) -> Result<Self, OcrError> {
        let reader = BufReader::new(reader);
        let mut entries = vec![String::new()]; // index 0: CTC blank
        let mut populated = 0usize;
        for line in reader.lines() {
            let line = line.map_err(|e| {
                OcrError::InvalidInput(format!("failed to read character dictionary: {e}"))
            })?;
            let ch = line.trim_end_matches(['\r', '\n']).to_string();
            if !ch.is_empty() {
                populated += 1;
            }
            entries.push(ch);
        }
        if populated == 0 {
            return Err(OcrError::InvalidInput(
                "character dictionary is empty".into(),
            ));
        }
        Ok(Self { entries })
    }

    /// Vocabulary size including the blank token.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        // Never true for a constructed dictionary; index 0 always exists.
        self.entries.is_empty()
    }

    /// Character at `index`; out-of-range indices come back as `?`.
    #[must_use]
    pub fn lookup(&self, index: usize) -> &str {
        self.entries.get(index).map_or(UNKNOWN, String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocabulary_is_lines_plus_one() {
        let dict = CharDictionary::from_reader("a\nb\nc\n".as_bytes()).unwrap();
        assert_eq!(dict.len(), 4);
        assert_eq!(dict.lookup(1), "a");
        assert_eq!(dict.lookup(3), "c");
    }

    #[test]
    fn out_of_range_lookup_is_question_mark() {
        let dict = CharDictionary::from_reader("x\n".as_bytes()).unwrap();
        assert_eq!(dict.lookup(99), "?");
    }

    #[test]
    fn blank_lines_keep_their_index_slot() {
        let dict = CharDictionary::from_reader("a\n\nb\n".as_bytes()).unwrap();
        assert_eq!(dict.len(), 4); // blank token + three lines
        assert_eq!(dict.lookup(1), "a");
        assert_eq!(dict.lookup(2), "");
        assert_eq!(dict.lookup(3), "b");
    }

    #[test]
    fn all_blank_file_is_rejected() {
        assert!(CharDictionary::from_reader("\n\n\n".as_bytes()).is_err());
    }

    #[test]
    fn multibyte_codepoints_survive() {
        let dict = CharDictionary::from_reader("日\n本\n".as_bytes()).unwrap();
        assert_eq!(dict.lookup(1), "日");
        assert_eq!(dict.lookup(2), "本");
    }

    #[test]
    fn empty_file_is_rejected() {
        assert!(CharDictionary::from_reader("".as_bytes()).is_err());
    }
}
