use crate::config::HsvRange;
use image::{GrayImage, Luma, Rgb, RgbImage};

/// Image whose three channels hold H (`0..=180`), S and V (`0..=255`)
pub type HsvImage = RgbImage;

pub const MASK_ON: u8 = 255;

/// Binary mask of one color class
#[derive(Debug, Clone)]
pub struct ColorMask {
    pub mask: GrayImage,
    /// Number of set pixels
    pub area: u32,
}

/// Convert one RGB pixel to 8-bit HSV (hue halved to fit a byte).
pub fn rgb_to_hsv(rgb: [u8; 3]) -> [u8; 3] {
    let [r, g, b] = rgb.map(|c| c as f32);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let s = if max > 0.0 { 255.0 * delta / max } else { 0.0 };

    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    [
        (h / 2.0).round().min(180.0) as u8,
        s.round() as u8,
        max as u8,
    ]
}

pub fn to_hsv(image: &RgbImage) -> HsvImage {
    let mut hsv = RgbImage::new(image.width(), image.height());
    for (src, dst) in image.pixels().zip(hsv.pixels_mut()) {
        *dst = Rgb(rgb_to_hsv(src.0));
    }
    hsv
}

/// Mark every pixel whose HSV value falls in any of `ranges`
pub fn color_mask(hsv: &HsvImage, ranges: &[HsvRange]) -> ColorMask {
    let mut mask = GrayImage::new(hsv.width(), hsv.height());
    let mut area = 0;
    for (src, dst) in hsv.pixels().zip(mask.pixels_mut()) {
        if ranges.iter().any(|r| r.contains(src.0)) {
            *dst = Luma([MASK_ON]);
            area += 1;
        }
    }
    ColorMask { mask, area }
}
