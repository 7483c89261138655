//! Input image wrapper.

use crate::error::OcrError;
use image::RgbImage;

/// A contiguous `H x W x 3` 8-bit RGB image.
///
/// Contiguity is an invariant of the whole pipeline: every stage indexes the
/// raw buffer directly. Decoders are configured to produce contiguous
/// buffers; anything else fails with [`OcrError::NonContiguous`].
#[derive(Debug, Clone)]
pub struct Image {
    pixels: RgbImage,
}

impl Image {
    /// Decode an encoded image (PNG, JPEG, ...) from a byte buffer.
    pub fn decode(bytes: &[u8]) -> Result<Self, OcrError> {
        if bytes.is_empty() {
            return Err(OcrError::InvalidInput("empty image body".into()));
        }
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| OcrError::InvalidInput(format!("failed to decode image: {e}")))?;
        Self::from_rgb(decoded.to_rgb8())
    }

    /// Wrap an already-decoded RGB buffer, validating contiguity.
    pub fn from_rgb(pixels: RgbImage) -> Result<Self, OcrError> {
        let expected = pixels.width() as usize * pixels.height() as usize * 3;
        let actual = pixels.as_raw().len();
        if expected != actual {
            return Err(OcrError::NonContiguous { expected, actual });
        }
        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(OcrError::InvalidInput(format!(
                "invalid image dimensions: {}x{}",
                pixels.width(),
                pixels.height()
            )));
        }
        Ok(Self { pixels })
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    #[inline]
    #[must_use]
    pub fn as_rgb(&self) -> &RgbImage {
        &self.pixels
    }

    /// Surrender the underlying buffer to the caller.
    #[must_use]
    pub fn into_rgb(self) -> RgbImage {
        self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn from_rgb_accepts_contiguous_buffer() {
        let img = RgbImage::from_pixel(4, 3, Rgb([10, 20, 30]));
        let wrapped = Image::from_rgb(img).unwrap();
        assert_eq!(wrapped.width(), 4);
        assert_eq!(wrapped.height(), 3);
    }

    #[test]
    fn decode_rejects_empty_body() {
        assert!(matches!(
            Image::decode(&[]),
            Err(OcrError::InvalidInput(_))
        ));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            Image::decode(b"not an image"),
            Err(OcrError::InvalidInput(_))
        ));
    }

    #[test]
    fn decode_roundtrips_png() {
        let img = RgbImage::from_pixel(8, 8, Rgb([200, 100, 50]));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        let decoded = Image::decode(buf.get_ref()).unwrap();
        assert_eq!(decoded.width(), 8);
        assert_eq!(decoded.as_rgb().get_pixel(3, 3), &Rgb([200, 100, 50]));
    }
}
