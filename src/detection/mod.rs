pub mod color;
pub mod coords;
pub mod hough;
pub mod lines;
pub mod normals;
pub mod preprocessing;
pub mod segmentation;

use crate::config::ParameterSnapshot;
use crate::models::{PixelLine, SegmentColor, Vector2};
use image::{GrayImage, RgbImage};
use segmentation::HsvImage;

/// Lines, normals and mask area found for one color class
#[derive(Debug, Clone)]
pub struct ColorDetections {
    pub color: SegmentColor,
    pub lines: Vec<PixelLine>,
    pub normals: Vec<Vector2>,
    pub area: u32,
}

impl ColorDetections {
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Per-frame detector. The HSV conversion and the edge map are computed once and
/// shared by all color classes.
pub struct LineDetector<'a> {
    snapshot: &'a ParameterSnapshot,
    hsv: HsvImage,
    edges: GrayImage,
}

impl<'a> LineDetector<'a> {
    pub fn new(image: &RgbImage, snapshot: &'a ParameterSnapshot) -> Self {
        let [low, high] = snapshot.params.canny_thresholds;
        Self {
            snapshot,
            hsv: segmentation::to_hsv(image),
            edges: preprocessing::detect_color_edges(image, low, high),
        }
    }

    /// Run segmentation, line extraction and normal orientation for one color
    pub fn detect_lines(&self, color: SegmentColor) -> ColorDetections {
        let mask = segmentation::color_mask(&self.hsv, self.snapshot.thresholds.ranges(color));
        let found = lines::extract_lines(&self.edges, &mask, &self.snapshot.params);
        // Normals sample the undilated mask.
        let normals = normals::compute_normals(
            &found.lines,
            &mask.mask,
            self.snapshot.polarity.for_color(color),
        );

        ColorDetections {
            color,
            lines: found.lines,
            normals,
            area: found.area,
        }
    }

    /// All color classes in publishing order
    pub fn detect_all(&self) -> Vec<ColorDetections> {
        SegmentColor::ALL
            .iter()
            .map(|&color| self.detect_lines(color))
            .collect()
    }
}
