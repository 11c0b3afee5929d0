//! In-memory rendered image.

use std::io::Cursor;

use image::{ImageFormat, Rgb, RgbImage};

use crate::backend::BackendError;

/// A rendered image, normalized to 8-bit RGB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    pixels: RgbImage,
}

impl RenderedImage {
    pub fn from_rgb(pixels: RgbImage) -> Self {
        Self { pixels }
    }

    /// A single-color image. Handy for placeholders and tests.
    pub fn solid(width: u32, height: u32, color: [u8; 3]) -> Self {
        Self::from_rgb(RgbImage::from_pixel(width, height, Rgb(color)))
    }

    /// Decode PNG/JPEG/WebP bytes, converting any pixel layout to RGB.
    pub fn decode(bytes: &[u8]) -> Result<Self, BackendError> {
        let decoded =
            image::load_from_memory(bytes).map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(Self::from_rgb(decoded.to_rgb8()))
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    /// Encode as PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>, image::ImageError> {
        let mut buffer = Cursor::new(Vec::new());
        self.pixels.write_to(&mut buffer, ImageFormat::Png)?;
        Ok(buffer.into_inner())
    }
}
