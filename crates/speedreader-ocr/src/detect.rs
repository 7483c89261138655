//! Text detection: letterbox preprocessing and probability-map postprocessing.

use image::{imageops, imageops::FilterType, Rgb, RgbImage};
use speedreader_core::{DetectionConfig, Image, OcrError, Polygon, RotatedRectangle};
use speedreader_kernel::TensorData;
use speedreader_vision::{geometry, ReliefMap};
use tracing::debug;

/// Maximum pixel value for 8-bit channels.
const PIXEL_MAX_VALUE_F32: f32 = 255.0;

/// One candidate word region in original-image coordinates.
#[derive(Debug, Clone)]
pub struct DetectedRegion {
    pub rect: RotatedRectangle,
    /// The contour the rectangle was fitted from.
    pub polygon: Polygon,
    /// Mean probability inside the contour.
    pub confidence: f32,
}

/// DBNet-style detection stage.
#[derive(Debug, Clone)]
pub struct Detector {
    config: DetectionConfig,
}

impl Detector {
    #[must_use]
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Resize the image to fit the square canvas (image at the top-left,
    /// constant-color padding at the bottom-right), then normalize to a CHW
    /// tensor with ImageNet statistics.
    ///
    /// Returns the tensor and the applied scale factor; postprocessing maps
    /// coordinates back by dividing by it.
    pub fn preprocess(&self, image: &Image) -> Result<(TensorData, f64), OcrError> {
        let side = self.config.canvas_side();
        let (w, h) = (image.width(), image.height());
        let scale = (f64::from(side) / f64::from(w)).min(f64::from(side) / f64::from(h));
        let resized_w = ((f64::from(w) * scale).round() as u32).clamp(1, side);
        let resized_h = ((f64::from(h) * scale).round() as u32).clamp(1, side);

        let resized = imageops::resize(image.as_rgb(), resized_w, resized_h, FilterType::CatmullRom);
        let mut canvas = RgbImage::from_pixel(side, side, Rgb(self.config.pad_color));
        imageops::replace(&mut canvas, &resized, 0, 0);

        let side = side as usize;
        let plane = side * side;
        let mut data = vec![0.0f32; 3 * plane];
        for (x, y, pixel) in canvas.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for c in 0..3 {
                let normalized = (f32::from(pixel[c]) / PIXEL_MAX_VALUE_F32
                    - self.config.mean[c])
                    / self.config.std[c];
                data[c * plane + y * side + x] = normalized;
            }
        }

        let tensor = TensorData::new(data, vec![3, side, side])?;
        Ok((tensor, scale))
    }

    /// Turn the model's probability map into rotated word regions, in
    /// component-discovery order.
    pub fn postprocess(
        &self,
        output: TensorData,
        scale: f64,
    ) -> Result<Vec<DetectedRegion>, OcrError> {
        let side = self.config.canvas_side() as usize;
        let expected = [1, side, side];
        if output.shape != expected {
            return Err(OcrError::Inference(format!(
                "detection output shape {:?} ({} elements), expected {:?} ({} elements)",
                output.shape,
                output.element_count(),
                expected,
                side * side,
            )));
        }

        let probs = ReliefMap::from_raw(side, side, output.data)?;
        let mut mask = probs.clone();
        mask.binarize(self.config.binarize_threshold);
        if self.config.use_dilation {
            mask.dilate();
        }

        let components = mask.connected_components();
        let mut regions = Vec::new();
        for component in &components {
            let contour = component.contour();
            if contour.vertex_count() < 4 {
                continue;
            }
            // Area filter runs in canvas coordinates, before scaling back.
            let map_area = geometry::polygon_area(contour.points()).abs();
            if map_area < self.config.min_area {
                continue;
            }
            let score = probs.mean_inside(&contour);
            if score < self.config.box_threshold {
                continue;
            }
            let expanded = geometry::unclip(contour.points(), self.config.unclip_ratio);
            let Some(rect) = geometry::min_area_rect(&expanded) else {
                continue;
            };
            if rect.width <= 0.0 || rect.height <= 0.0 {
                continue;
            }
            regions.push(DetectedRegion {
                rect: rect.scaled(1.0 / scale),
                polygon: contour.scaled(1.0 / scale),
                confidence: score,
            });
        }
        debug!(
            components = components.len(),
            regions = regions.len(),
            "detection postprocess"
        );
        Ok(regions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn small_config() -> DetectionConfig {
        DetectionConfig {
            target_side: 64,
            ..DetectionConfig::default()
        }
    }

    fn image_of(width: u32, height: u32, color: [u8; 3]) -> Image {
        Image::from_rgb(RgbImage::from_pixel(width, height, Rgb(color))).unwrap()
    }

    /// A map with a filled probability block.
    fn map_with_blob(side: usize, x0: usize, x1: usize, y0: usize, y1: usize, p: f32) -> TensorData {
        let mut data = vec![0.0f32; side * side];
        for y in y0..=y1 {
            for x in x0..=x1 {
                data[y * side + x] = p;
            }
        }
        TensorData::new(data, vec![1, side, side]).unwrap()
    }

    #[test]
    fn preprocess_letterboxes_to_canvas() {
        let detector = Detector::new(DetectionConfig::default());
        let (tensor, scale) = detector.preprocess(&image_of(320, 240, [0, 0, 0])).unwrap();
        assert_eq!(tensor.shape, vec![3, 960, 960]);
        assert!((scale - 3.0).abs() < 1e-9);
    }

    #[test]
    fn preprocess_pads_bottom_right_with_constant() {
        let config = DetectionConfig {
            pad_color: [0, 0, 0],
            ..small_config()
        };
        let detector = Detector::new(config.clone());
        // 32x64 image: scale 1.0 in y, canvas right half is padding.
        let (tensor, scale) = detector.preprocess(&image_of(32, 64, [255, 255, 255])).unwrap();
        assert!((scale - 1.0).abs() < 1e-9);
        let side = 64usize;
        let plane = side * side;
        let white = (1.0 - config.mean[0]) / config.std[0];
        let black = (0.0 - config.mean[0]) / config.std[0];
        // Inside the image, channel 0.
        assert!((tensor.data[10 * side + 10] - white).abs() < 1e-5);
        // Inside the padding.
        assert!((tensor.data[10 * side + 50] - black).abs() < 1e-5);
        // Channel 2 sees the same padding.
        assert!((tensor.data[2 * plane + 10 * side + 50] - ((0.0 - config.mean[2]) / config.std[2])).abs() < 1e-5);
    }

    #[test]
    fn postprocess_rejects_wrong_shape() {
        let detector = Detector::new(small_config());
        let bad = TensorData::new(vec![0.0; 32 * 32], vec![1, 32, 32]).unwrap();
        let err = detector.postprocess(bad, 1.0).unwrap_err();
        match err {
            OcrError::Inference(msg) => {
                assert!(msg.contains("1024"), "message must name both sizes: {msg}");
                assert!(msg.contains("4096"), "message must name both sizes: {msg}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn solid_blob_becomes_one_region() {
        let detector = Detector::new(small_config());
        let output = map_with_blob(64, 10, 49, 10, 29, 0.9);
        let regions = detector.postprocess(output, 1.0).unwrap();
        assert_eq!(regions.len(), 1);
        let region = &regions[0];
        assert!(region.confidence > 0.6, "score {}", region.confidence);
        assert!(region.rect.angle.abs() < 0.1);
        // Unclip grows the fitted rect beyond the 40x20 blob.
        assert!(region.rect.width > 40.0);
        assert!(region.rect.height > 20.0);
        assert!((region.rect.cx - 29.5).abs() < 3.0);
        assert!((region.rect.cy - 19.5).abs() < 3.0);
    }

    #[test]
    fn low_probability_blob_is_discarded() {
        let detector = Detector::new(small_config());
        // Above the binarize threshold but below the box threshold.
        let output = map_with_blob(64, 10, 49, 10, 29, 0.4);
        let regions = detector.postprocess(output, 1.0).unwrap();
        assert!(regions.is_empty());
    }

    #[test]
    fn tiny_blob_is_discarded_by_min_area() {
        let detector = Detector::new(small_config());
        let output = map_with_blob(64, 10, 11, 10, 11, 0.9);
        let regions = detector.postprocess(output, 1.0).unwrap();
        assert!(regions.is_empty());
    }

    #[test]
    fn min_area_is_measured_in_canvas_coordinates() {
        let detector = Detector::new(small_config());
        // A 5x4 blob: contour area ~30 canvas px, above the threshold. An
        // upscaled source (scale > 1) must not change the verdict.
        let output = map_with_blob(64, 10, 14, 10, 13, 0.9);
        let regions = detector.postprocess(output, 4.0).unwrap();
        assert_eq!(regions.len(), 1);

        // The same blob fails only when its canvas area is too small.
        let output = map_with_blob(64, 10, 11, 10, 11, 0.9);
        let regions = detector.postprocess(output, 4.0).unwrap();
        assert!(regions.is_empty());
    }

    #[test]
    fn scale_maps_regions_back_to_original_coordinates() {
        let detector = Detector::new(small_config());
        let output = map_with_blob(64, 10, 49, 10, 29, 0.9);
        let scale = 2.0; // original image was half the canvas resolution
        let regions = detector.postprocess(output, scale).unwrap();
        assert_eq!(regions.len(), 1);
        assert!((regions[0].rect.cx - 29.5 / 2.0).abs() < 2.0);
    }

    #[test]
    fn two_blobs_arrive_in_scan_order() {
        let detector = Detector::new(small_config());
        let mut data = vec![0.0f32; 64 * 64];
        for (x0, x1, y0, y1) in [(5, 25, 5, 15), (35, 58, 40, 52)] {
            for y in y0..=y1 {
                for x in x0..=x1 {
                    data[y * 64 + x] = 0.95;
                }
            }
        }
        let output = TensorData::new(data, vec![1, 64, 64]).unwrap();
        let regions = detector.postprocess(output, 1.0).unwrap();
        assert_eq!(regions.len(), 2);
        assert!(regions[0].rect.cy < regions[1].rect.cy);
    }
}
