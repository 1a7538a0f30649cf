//! Decoded frames ready for blitting

use image::imageops::{self, FilterType};
use image::RgbaImage;

/// Frame data handed to the overlay.
///
/// Pixels are top-down BGRA, the layout a 32-bit DIB expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// Convert an RGBA image into a BGRA frame
    pub fn from_rgba(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        let mut data = image.into_raw();

        for chunk in data.chunks_exact_mut(4) {
            chunk.swap(0, 2);
        }

        Self { data, width, height }
    }

    /// Resize `image` to `width`x`height` and convert it.
    ///
    /// Returns `None` for a zero-sized target.
    pub fn scaled(image: &RgbaImage, width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }

        if image.dimensions() == (width, height) {
            return Some(Self::from_rgba(image.clone()));
        }

        let resized = imageops::resize(image, width, height, FilterType::Triangle);
        Some(Self::from_rgba(resized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn swaps_red_and_blue() {
        let img = RgbaImage::from_pixel(2, 1, Rgba([10, 20, 30, 255]));
        let frame = Frame::from_rgba(img);
        assert_eq!(frame.data, vec![30, 20, 10, 255, 30, 20, 10, 255]);
    }

    #[test]
    fn scales_to_requested_size() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 255, 255]));
        let frame = Frame::scaled(&img, 8, 2).unwrap();
        assert_eq!((frame.width, frame.height), (8, 2));
        assert_eq!(frame.data.len(), 8 * 2 * 4);
        assert!(Frame::scaled(&img, 0, 2).is_none());
    }
}
