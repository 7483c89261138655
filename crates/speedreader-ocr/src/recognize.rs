//! Text recognition: perspective crops, normalization and CTC decoding.

use crate::ctc::greedy_decode;
use crate::detect::DetectedRegion;
use crate::dict::CharDictionary;
use image::RgbImage;
use speedreader_core::{
    BoundingBox, Image, OcrError, RecognitionConfig, RotatedRectangle, Word,
};
use speedreader_kernel::TensorData;
use speedreader_vision::perspective_crop;
use std::sync::Arc;
use tracing::warn;

const PIXEL_MAX_VALUE_F32: f32 = 255.0;
/// Recognition inputs are centered to `[-1, 1]`: `(x/255 - 0.5) / 0.5`.
const NORMALIZE_CENTER: f32 = 0.5;
const NORMALIZE_SCALE: f32 = 0.5;

/// SVTR-style recognition stage. Regions are processed one at a time, which
/// keeps word order within an image trivially stable.
#[derive(Debug, Clone)]
pub struct Recognizer {
    config: RecognitionConfig,
    dict: Arc<CharDictionary>,
}

impl Recognizer {
    #[must_use]
    pub fn new(config: RecognitionConfig, dict: Arc<CharDictionary>) -> Self {
        Self { config, dict }
    }

    #[must_use]
    pub fn dictionary(&self) -> &CharDictionary {
        &self.dict
    }

    /// Perspective-crop one region to the fixed recognition height.
    pub fn crop(&self, image: &Image, rect: &RotatedRectangle) -> Result<RgbImage, OcrError> {
        perspective_crop(
            image.as_rgb(),
            rect,
            self.config.crop_height,
            self.config.pad_color,
        )
    }

    /// Normalize a crop to a CHW tensor in `[-1, 1]`.
    pub fn preprocess(&self, crop: &RgbImage) -> Result<TensorData, OcrError> {
        let (w, h) = (crop.width() as usize, crop.height() as usize);
        let plane = w * h;
        let mut data = vec![0.0f32; 3 * plane];
        for (x, y, pixel) in crop.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for c in 0..3 {
                let normalized =
                    (f32::from(pixel[c]) / PIXEL_MAX_VALUE_F32 - NORMALIZE_CENTER) / NORMALIZE_SCALE;
                data[c * plane + y * w + x] = normalized;
            }
        }
        Ok(TensorData::new(data, vec![3, h, w])?)
    }

    /// Greedy-decode a `steps x vocab` output matrix into text + confidence.
    pub fn decode(&self, output: TensorData) -> Result<(String, f32), OcrError> {
        let (steps, vocab) = match output.shape.as_slice() {
            [t, v] => (*t, *v),
            [1, t, v] => (*t, *v),
            other => {
                return Err(OcrError::Inference(format!(
                    "recognition output shape {:?} ({} elements), expected [steps, vocab]",
                    other,
                    output.element_count()
                )))
            }
        };
        if vocab != self.dict.len() {
            // Out-of-range indices decode to `?`, so this is survivable.
            warn!(
                vocab,
                dictionary = self.dict.len(),
                "recognition vocabulary differs from dictionary size"
            );
        }
        Ok(greedy_decode(&output.data, steps, vocab, &self.dict))
    }

    /// Assemble the final word for one region.
    #[must_use]
    pub fn build_word(region: &DetectedRegion, text: String, confidence: f32) -> Word {
        Word {
            bounding_box: BoundingBox {
                axis_aligned_rectangle: region.rect.axis_aligned(),
                rotated_rectangle: region.rect,
                polygon: region.polygon.clone(),
            },
            text,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}
