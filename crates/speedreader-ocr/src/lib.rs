//! The two neural stages of the OCR pipeline.
//!
//! [`detect`] turns an image into scored rotated word regions via a DBNet
//! probability map; [`recognize`] reads each region with an SVTR recognizer
//! and greedy CTC decoding. Both expose preprocess / postprocess halves so
//! the pipeline fabric can interleave cancellation checks and hop the CPU
//! work onto the pinned pool.

pub mod ctc;
pub mod detect;
pub mod dict;
pub mod recognize;

pub use ctc::greedy_decode;
pub use detect::{DetectedRegion, Detector};
pub use dict::CharDictionary;
pub use recognize::Recognizer;
