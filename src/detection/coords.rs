use crate::config::WorkingSize;
use crate::models::{PixelLine, Point2};

/// Maps cropped working-image pixels to coordinates normalized by the uncropped
/// working size: `(x, y) -> (x / w, (y + c) / h)`. Values are not clamped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateNormalizer {
    pub crop_offset: u32,
    pub size: WorkingSize,
}

impl CoordinateNormalizer {
    pub fn new(crop_offset: u32, size: WorkingSize) -> Self {
        Self { crop_offset, size }
    }

    pub fn normalize(&self, x: f32, y: f32) -> Point2 {
        Point2::new(
            x / self.size.width as f32,
            (y + self.crop_offset as f32) / self.size.height as f32,
        )
    }

    /// Inverse of [`normalize`](Self::normalize)
    pub fn denormalize(&self, p: Point2) -> (f32, f32) {
        (
            p.x * self.size.width as f32,
            p.y * self.size.height as f32 - self.crop_offset as f32,
        )
    }

    pub fn normalize_line(&self, line: &PixelLine) -> [Point2; 2] {
        [
            self.normalize(line.x1 as f32, line.y1 as f32),
            self.normalize(line.x2 as f32, line.y2 as f32),
        ]
    }
}
