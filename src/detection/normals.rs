use crate::config::NormalPolarity;
use crate::models::{PixelLine, Vector2};
use image::GrayImage;

/// Distance from the segment midpoint at which the mask is sampled
pub const NORMAL_SAMPLE_OFFSET: f32 = 3.0;

fn inside(mask: &GrayImage, x: f32, y: f32) -> bool {
    let px = (x.floor() as i64).clamp(0, mask.width() as i64 - 1) as u32;
    let py = (y.floor() as i64).clamp(0, mask.height() as i64 - 1) as u32;
    mask.get_pixel(px, py)[0] > 0
}

/// Unit normal of `line`, oriented with respect to the color region `mask`.
///
/// The candidate `((y2 - y1) / L, (x1 - x2) / L)` is sampled on both sides of the
/// midpoint. When exactly one side lies in the mask the polarity decides which side
/// the normal points to; otherwise the negated candidate is used.
pub fn compute_normal(line: &PixelLine, mask: &GrayImage, polarity: NormalPolarity) -> Vector2 {
    let length = line.length();
    if length == 0.0 {
        return Vector2::default();
    }
    let n = Vector2::new(
        (line.y2 - line.y1) as f32 / length,
        (line.x1 - line.x2) as f32 / length,
    );

    let (cx, cy) = line.midpoint();
    let behind = inside(
        mask,
        cx - NORMAL_SAMPLE_OFFSET * n.x,
        cy - NORMAL_SAMPLE_OFFSET * n.y,
    );
    let ahead = inside(
        mask,
        cx + NORMAL_SAMPLE_OFFSET * n.x,
        cy + NORMAL_SAMPLE_OFFSET * n.y,
    );

    let keep = match polarity {
        NormalPolarity::TowardMask => ahead && !behind,
        NormalPolarity::AwayFromMask => behind && !ahead,
    };
    if keep { n } else { n.scaled(-1.0) }
}

/// Normals for every line, in the same order
pub fn compute_normals(lines: &[PixelLine], mask: &GrayImage, polarity: NormalPolarity) -> Vec<Vector2> {
    lines
        .iter()
        .map(|line| compute_normal(line, mask, polarity))
        .collect()
}
