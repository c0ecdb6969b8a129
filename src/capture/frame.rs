//! Frame data structures for pasted screenshots

use image::RgbaImage;
use std::path::Path;
use std::time::Instant;

/// A screenshot pasted for capture
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// RGBA pixels
    pub image: RgbaImage,
    /// When the frame was received
    pub timestamp: Instant,
}

impl CapturedFrame {
    /// Wrap an already decoded image
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image,
            timestamp: Instant::now(),
        }
    }

    /// Decode a screenshot file (any format the `image` crate reads)
    pub fn open(path: &Path) -> image::ImageResult<Self> {
        Ok(Self::new(image::open(path)?.to_rgba8()))
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}
