use crate::config::DetectionParameters;
use crate::detection::hough::{self, HoughParams};
use crate::detection::segmentation::ColorMask;
use crate::models::PixelLine;
use image::GrayImage;
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;

/// Line segments found for one color class
#[derive(Debug, Clone)]
pub struct ColorLines {
    pub lines: Vec<PixelLine>,
    /// Pixel count of the undilated mask
    pub area: u32,
}

/// Grow the color mask by `dilation_kernel_size` pixels in every direction
pub fn dilate_mask(mask: &GrayImage, params: &DetectionParameters) -> GrayImage {
    if params.dilation_kernel_size == 0 {
        return mask.clone();
    }
    dilate(mask, Norm::LInf, params.dilation_kernel_size)
}

/// Keep only edge pixels that fall inside `region`
pub fn mask_edges(edges: &GrayImage, region: &GrayImage) -> GrayImage {
    let mut masked = edges.clone();
    for (edge, inside) in masked.pixels_mut().zip(region.pixels()) {
        if inside[0] == 0 {
            edge[0] = 0;
        }
    }
    masked
}

/// Fit line segments to the edges of the frame that lie in (or next to) a color region.
/// `edges` is the color-independent edge map of the whole working image.
pub fn extract_lines(edges: &GrayImage, mask: &ColorMask, params: &DetectionParameters) -> ColorLines {
    if mask.area == 0 {
        return ColorLines {
            lines: Vec::new(),
            area: 0,
        };
    }

    let region = dilate_mask(&mask.mask, params);
    let masked = mask_edges(edges, &region);
    let lines = hough::detect_segments(
        &masked,
        &HoughParams {
            threshold: params.hough_threshold,
            min_line_length: params.hough_min_line_length,
            max_line_gap: params.hough_max_line_gap,
        },
    );

    ColorLines {
        lines,
        area: mask.area,
    }
}
