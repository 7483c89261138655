//! Perspective extraction of oriented rectangles.

use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use speedreader_core::{OcrError, RotatedRectangle};

/// Lift `rect` out of `image` into an axis-aligned crop of height
/// `target_height` whose width preserves the rectangle's aspect ratio,
/// sampling bilinearly from the four oriented corners.
pub fn perspective_crop(
    image: &RgbImage,
    rect: &RotatedRectangle,
    target_height: u32,
    fill: [u8; 3],
) -> Result<RgbImage, OcrError> {
    if rect.width <= 0.0 || rect.height <= 0.0 {
        return Err(OcrError::InvalidInput(format!(
            "degenerate crop rectangle: {:.2}x{:.2}",
            rect.width, rect.height
        )));
    }
    let aspect = rect.width / rect.height;
    let target_width = ((f64::from(target_height) * aspect).round() as u32).max(1);

    let corners = rect.corners();
    let from: [(f32, f32); 4] = [
        (corners[0].x as f32, corners[0].y as f32),
        (corners[1].x as f32, corners[1].y as f32),
        (corners[2].x as f32, corners[2].y as f32),
        (corners[3].x as f32, corners[3].y as f32),
    ];
    let to: [(f32, f32); 4] = [
        (0.0, 0.0),
        (target_width as f32, 0.0),
        (target_width as f32, target_height as f32),
        (0.0, target_height as f32),
    ];

    let projection = Projection::from_control_points(from, to).ok_or_else(|| {
        OcrError::InvalidInput("crop rectangle corners are degenerate".into())
    })?;

    let mut out = RgbImage::new(target_width, target_height);
    warp_into(image, &projection, Interpolation::Bilinear, Rgb(fill), &mut out);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crop_preserves_aspect_ratio() {
        let image = RgbImage::from_pixel(200, 100, Rgb([90, 90, 90]));
        let rect = RotatedRectangle::new(100.0, 50.0, 120.0, 40.0, 0.0);
        let crop = perspective_crop(&image, &rect, 48, [0, 0, 0]).unwrap();
        assert_eq!(crop.height(), 48);
        assert_eq!(crop.width(), 144); // 48 * (120 / 40)
    }

    #[test]
    fn axis_aligned_crop_samples_source_pixels() {
        let mut image = RgbImage::from_pixel(64, 64, Rgb([0, 0, 0]));
        for y in 16..48 {
            for x in 16..48 {
                image.put_pixel(x, y, Rgb([200, 10, 10]));
            }
        }
        let rect = RotatedRectangle::new(32.0, 32.0, 16.0, 16.0, 0.0);
        let crop = perspective_crop(&image, &rect, 16, [0, 0, 0]).unwrap();
        // Entirely inside the red block.
        assert_eq!(crop.get_pixel(8, 8), &Rgb([200, 10, 10]));
    }

    #[test]
    fn rotated_crop_of_uniform_region_is_uniform() {
        let image = RgbImage::from_pixel(100, 100, Rgb([30, 60, 90]));
        let rect = RotatedRectangle::new(50.0, 50.0, 40.0, 20.0, 0.5);
        let crop = perspective_crop(&image, &rect, 48, [0, 0, 0]).unwrap();
        assert_eq!(crop.get_pixel(crop.width() / 2, 24), &Rgb([30, 60, 90]));
    }

    #[test]
    fn degenerate_rect_is_rejected() {
        let image = RgbImage::from_pixel(10, 10, Rgb([0, 0, 0]));
        let rect = RotatedRectangle::new(5.0, 5.0, 0.0, 4.0, 0.0);
        assert!(perspective_crop(&image, &rect, 48, [0, 0, 0]).is_err());
    }
}
