use crate::config::DetectionParameters;
use crate::error::{ConfigError, DetectorError, DetectorResult};
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbImage};
use imageproc::edges::canny;

/// Working-resolution image with the top rows removed
#[derive(Debug, Clone)]
pub struct Preprocessed {
    pub image: RgbImage,
    /// Rows removed from the top, needed to map coordinates back
    pub crop_offset: u32,
}

/// Resize to the working size (nearest neighbour, only when needed) and cut off the top rows
pub fn resize_and_crop(image: &RgbImage, params: &DetectionParameters) -> DetectorResult<Preprocessed> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(DetectorError::EmptyFrame { width, height });
    }

    let size = params.working_size;
    let resized;
    let working = if size.width != width || size.height != height {
        resized = imageops::resize(image, size.width, size.height, FilterType::Nearest);
        &resized
    } else {
        image
    };

    let cutoff = params.top_cutoff;
    if cutoff >= size.height {
        return Err(ConfigError::CutoffTooLarge {
            cutoff,
            height: size.height,
        }
        .into());
    }

    let cropped = imageops::crop_imm(working, 0, cutoff, size.width, size.height - cutoff).to_image();
    Ok(Preprocessed {
        image: cropped,
        crop_offset: cutoff,
    })
}

/// Detect edges using Canny edge detector
pub fn detect_edges(img: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    canny(img, low_threshold, high_threshold)
}

/// Canny on every channel; a pixel is an edge if it is one in any channel.
/// Saturated colors like red barely change luma, so a grayscale edge map would miss them.
pub fn detect_color_edges(img: &RgbImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut edges = GrayImage::new(width, height);
    for c in 0..3 {
        let channel = GrayImage::from_fn(width, height, |x, y| Luma([img.get_pixel(x, y)[c]]));
        let found = detect_edges(&channel, low_threshold, high_threshold);
        for (dst, src) in edges.pixels_mut().zip(found.pixels()) {
            dst[0] = dst[0].max(src[0]);
        }
    }
    edges
}
