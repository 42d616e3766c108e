//! Progressive probabilistic Hough transform.
//!
//! Points are visited in a pseudo-random order. Each visited point votes in a
//! `(theta, rho)` accumulator; once a bin reaches the vote threshold the line through
//! the point is followed in both directions across gaps of at most `max_line_gap`
//! pixels. Pixels on an accepted line are removed from the edge set and their votes
//! withdrawn, so every edge pixel ends up in at most one segment.

use crate::models::PixelLine;
use image::GrayImage;

/// Number of angle bins, 1 degree each over `[0, pi)`
const NUM_ANGLES: usize = 180;
/// Fixed-point fraction bits used while walking along a line
const SHIFT: u32 = 16;
/// Seed for the visiting order; fixed so detections are reproducible
const SEED: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoughParams {
    /// Minimum accumulator votes before a line is followed
    pub threshold: u32,
    pub min_line_length: u32,
    pub max_line_gap: u32,
}

/// xorshift64*, only used to shuffle the visiting order
struct Shuffle(u64);

impl Shuffle {
    fn below(&mut self, bound: usize) -> usize {
        self.0 ^= self.0 >> 12;
        self.0 ^= self.0 << 25;
        self.0 ^= self.0 >> 27;
        (self.0.wrapping_mul(0x2545_F491_4F6C_DD1D) % bound as u64) as usize
    }
}

struct Accumulator {
    votes: Vec<i32>,
    num_rho: usize,
    trig: Vec<(f32, f32)>,
}

impl Accumulator {
    fn new(width: u32, height: u32) -> Self {
        let num_rho = ((width + height) * 2 + 1) as usize;
        let trig = (0..NUM_ANGLES)
            .map(|n| {
                let theta = n as f32 * std::f32::consts::PI / NUM_ANGLES as f32;
                (theta.cos(), theta.sin())
            })
            .collect();
        Self {
            votes: vec![0; NUM_ANGLES * num_rho],
            num_rho,
            trig,
        }
    }

    fn bin(&self, n: usize, x: i32, y: i32) -> usize {
        let (cos, sin) = self.trig[n];
        let rho = (x as f32 * cos + y as f32 * sin).round() as i64;
        let offset = (self.num_rho as i64 - 1) / 2;
        n * self.num_rho + (rho + offset) as usize
    }

    /// Vote for all lines through `(x, y)`; returns the best angle and its votes
    fn vote(&mut self, x: i32, y: i32) -> (usize, i32) {
        let mut best = (0, 0);
        for n in 0..NUM_ANGLES {
            let idx = self.bin(n, x, y);
            self.votes[idx] += 1;
            if self.votes[idx] > best.1 {
                best = (n, self.votes[idx]);
            }
        }
        best
    }

    fn unvote(&mut self, x: i32, y: i32) {
        for n in 0..NUM_ANGLES {
            let idx = self.bin(n, x, y);
            self.votes[idx] -= 1;
        }
    }
}

/// Fixed-point walker along the line with angle index `n` through a start pixel
#[derive(Clone, Copy)]
struct Walker {
    x_major: bool,
    x0: i64,
    y0: i64,
    dx: i64,
    dy: i64,
}

impl Walker {
    fn new(acc: &Accumulator, n: usize, x: i32, y: i32) -> Self {
        let (cos, sin) = acc.trig[n];
        // Direction of the line is perpendicular to its (cos, sin) normal.
        let a = -sin;
        let b = cos;
        let one = (1i64 << SHIFT) as f32;
        let half = 1i64 << (SHIFT - 1);

        if a.abs() > b.abs() {
            Walker {
                x_major: true,
                x0: x as i64,
                y0: ((y as i64) << SHIFT) + half,
                dx: if a > 0.0 { 1 } else { -1 },
                dy: (b * one / a.abs()).round() as i64,
            }
        } else {
            Walker {
                x_major: false,
                x0: ((x as i64) << SHIFT) + half,
                y0: y as i64,
                dx: (a * one / b.abs()).round() as i64,
                dy: if b > 0.0 { 1 } else { -1 },
            }
        }
    }

    /// Pixels visited going forward (`reverse == false`) or backward, starting at the origin
    fn pixels(self, reverse: bool, width: i32, height: i32) -> impl Iterator<Item = (i32, i32)> {
        let (dx, dy) = if reverse { (-self.dx, -self.dy) } else { (self.dx, self.dy) };
        let (mut x, mut y) = (self.x0, self.y0);
        std::iter::from_fn(move || {
            let (px, py) = if self.x_major {
                (x, y >> SHIFT)
            } else {
                (x >> SHIFT, y)
            };
            x += dx;
            y += dy;
            Some((px as i32, py as i32))
        })
        .take_while(move |&(px, py)| px >= 0 && px < width && py >= 0 && py < height)
    }
}

/// Extract line segments from a binary edge image (non-zero = edge)
pub fn detect_segments(edges: &GrayImage, params: &HoughParams) -> Vec<PixelLine> {
    let (width, height) = edges.dimensions();
    let (w, h) = (width as i32, height as i32);
    let threshold = params.threshold.max(1) as i32;
    let min_len = params.min_line_length as i32;
    let max_gap = params.max_line_gap;

    let mut mask: Vec<bool> = edges.pixels().map(|p| p[0] > 0).collect();
    let mut voted = vec![false; mask.len()];
    let mut points: Vec<(i32, i32)> = edges
        .enumerate_pixels()
        .filter(|(_, _, p)| p[0] > 0)
        .map(|(x, y, _)| (x as i32, y as i32))
        .collect();

    let mut acc = Accumulator::new(width, height);
    let mut rng = Shuffle(SEED);
    let mut lines = Vec::new();
    let at = |x: i32, y: i32| (y * w + x) as usize;

    let mut remaining = points.len();
    while remaining > 0 {
        let pick = rng.below(remaining);
        let (x, y) = points[pick];
        points[pick] = points[remaining - 1];
        remaining -= 1;

        // Already consumed by an earlier line
        if !mask[at(x, y)] {
            continue;
        }

        let (best_n, best_votes) = acc.vote(x, y);
        voted[at(x, y)] = true;
        if best_votes < threshold {
            continue;
        }

        let walker = Walker::new(&acc, best_n, x, y);
        let mut ends = [(x, y); 2];
        for (k, end) in ends.iter_mut().enumerate() {
            let mut gap = 0;
            for (px, py) in walker.pixels(k == 1, w, h) {
                if mask[at(px, py)] {
                    gap = 0;
                    *end = (px, py);
                } else {
                    gap += 1;
                    if gap > max_gap {
                        break;
                    }
                }
            }
        }

        let good_line =
            (ends[1].0 - ends[0].0).abs() >= min_len || (ends[1].1 - ends[0].1).abs() >= min_len;

        // Walk again to consume the pixels up to each end point.
        for (k, end) in ends.iter().enumerate() {
            for (px, py) in walker.pixels(k == 1, w, h) {
                let idx = at(px, py);
                if mask[idx] {
                    if good_line && voted[idx] {
                        acc.unvote(px, py);
                    }
                    mask[idx] = false;
                }
                if (px, py) == *end {
                    break;
                }
            }
        }

        if good_line {
            lines.push(PixelLine::new(ends[0].0, ends[0].1, ends[1].0, ends[1].1));
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn params() -> HoughParams {
        HoughParams {
            threshold: 2,
            min_line_length: 3,
            max_line_gap: 1,
        }
    }

    #[test]
    fn empty_image_has_no_lines() {
        let edges = GrayImage::new(20, 20);
        assert!(detect_segments(&edges, &params()).is_empty());
    }

    #[test]
    fn horizontal_run_is_found() {
        let mut edges = GrayImage::new(40, 20);
        for x in 5..35 {
            edges.put_pixel(x, 10, Luma([255]));
        }
        let lines = detect_segments(&edges, &params());
        assert!(!lines.is_empty());
        for line in &lines {
            assert_eq!(line.y1, 10);
            assert_eq!(line.y2, 10);
            assert!((5..35).contains(&line.x1));
            assert!((5..35).contains(&line.x2));
        }
        let longest = lines.iter().map(|l| l.length()).fold(0.0, f32::max);
        assert!(longest >= 3.0);
    }

    #[test]
    fn isolated_points_are_not_lines() {
        let mut edges = GrayImage::new(30, 30);
        edges.put_pixel(3, 3, Luma([255]));
        edges.put_pixel(20, 25, Luma([255]));
        edges.put_pixel(27, 8, Luma([255]));
        assert!(detect_segments(&edges, &params()).is_empty());
    }

    #[test]
    fn detection_is_deterministic() {
        let mut edges = GrayImage::new(50, 50);
        for i in 0..40 {
            edges.put_pixel(i + 5, i + 5, Luma([255]));
            edges.put_pixel(10, i + 2, Luma([255]));
        }
        let first = detect_segments(&edges, &params());
        let second = detect_segments(&edges, &params());
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }
}
