//! Photometric correction applied before color segmentation.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Per-channel affine correction `corrected = shift + scale * raw`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorTransform {
    pub shift: [f32; 3],
    pub scale: [f32; 3],
}

impl Default for ColorTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ColorTransform {
    pub const IDENTITY: ColorTransform = ColorTransform {
        shift: [0.0; 3],
        scale: [1.0; 3],
    };

    /// Parse the `[shift(3), scale(3)]` layout published by the calibration side
    pub fn from_slice(values: &[f32]) -> anyhow::Result<Self> {
        if values.len() != 6 {
            anyhow::bail!("color transform needs 6 values, got {}", values.len());
        }
        Ok(Self {
            shift: [values[0], values[1], values[2]],
            scale: [values[3], values[4], values[5]],
        })
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Apply the transform, saturating each channel to `0..=255`
    pub fn apply(&self, image: &RgbImage) -> RgbImage {
        if self.is_identity() {
            return image.clone();
        }
        let mut out = image.clone();
        for pixel in out.pixels_mut() {
            for c in 0..3 {
                let value = self.shift[c] + self.scale[c] * pixel[c] as f32;
                pixel[c] = value.round().clamp(0.0, 255.0) as u8;
            }
        }
        out
    }
}

/// One-shot white balance calibration
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WhiteBalanceState {
    Uninitialized,
    Calibrated { gains: [f32; 3] },
}

/// Estimates gray-world channel gains from the first frame it sees and applies them
/// to every later frame. Calibration never happens twice.
#[derive(Debug, Clone)]
pub struct WhiteBalanceEstimator {
    state: WhiteBalanceState,
}

impl Default for WhiteBalanceEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl WhiteBalanceEstimator {
    pub fn new() -> Self {
        Self {
            state: WhiteBalanceState::Uninitialized,
        }
    }

    pub fn state(&self) -> WhiteBalanceState {
        self.state
    }

    /// Calibrate on the first call, correct in place on every later one.
    /// Returns true when `image` was corrected.
    pub fn process(&mut self, image: &mut RgbImage) -> bool {
        match self.state {
            WhiteBalanceState::Uninitialized => {
                let gains = estimate_gains(image);
                debug!("White balance: gains computed {:?}", gains);
                self.state = WhiteBalanceState::Calibrated { gains };
                false
            }
            WhiteBalanceState::Calibrated { gains } => {
                apply_gains(image, gains);
                true
            }
        }
    }
}

fn estimate_gains(image: &RgbImage) -> [f32; 3] {
    let mut sums = [0u64; 3];
    for pixel in image.pixels() {
        for c in 0..3 {
            sums[c] += pixel[c] as u64;
        }
    }
    let count = (image.width() as u64 * image.height() as u64).max(1) as f64;
    let means = sums.map(|s| s as f64 / count);
    let gray = means.iter().sum::<f64>() / 3.0;

    means.map(|m| if m > 0.0 { (gray / m) as f32 } else { 1.0 })
}

fn apply_gains(image: &mut RgbImage, gains: [f32; 3]) {
    for pixel in image.pixels_mut() {
        for c in 0..3 {
            pixel[c] = (pixel[c] as f32 * gains[c]).round().clamp(0.0, 255.0) as u8;
        }
    }
}
