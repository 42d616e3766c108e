use image::RgbImage;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A decoded camera frame as delivered by the ingress side.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbImage,
    /// Acquisition time stamped by the camera driver
    pub stamp: OffsetDateTime,
}

impl Frame {
    pub fn new(image: RgbImage, stamp: OffsetDateTime) -> Self {
        Self { image, stamp }
    }

    /// Frame stamped with the current wall-clock time
    pub fn now(image: RgbImage) -> Self {
        Self::new(image, OffsetDateTime::now_utc())
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Color class of a lane marking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentColor {
    White,
    Yellow,
    Red,
}

impl SegmentColor {
    /// All classes in publishing order
    pub const ALL: [SegmentColor; 3] = [SegmentColor::White, SegmentColor::Yellow, SegmentColor::Red];

    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentColor::White => "white",
            SegmentColor::Yellow => "yellow",
            SegmentColor::Red => "red",
        }
    }
}

impl std::fmt::Display for SegmentColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}

impl Vector2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn norm(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn scaled(&self, factor: f32) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }
}

/// Line segment in pixel coordinates of the cropped working image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelLine {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl PixelLine {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn length(&self) -> f32 {
        let dx = (self.x2 - self.x1) as f32;
        let dy = (self.y2 - self.y1) as f32;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn midpoint(&self) -> (f32, f32) {
        (
            (self.x1 + self.x2) as f32 / 2.0,
            (self.y1 + self.y2) as f32 / 2.0,
        )
    }
}

/// A detected marking segment, published to the lane filter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub color: SegmentColor,
    /// Endpoints in normalized image coordinates
    pub pixels_normalized: [Point2; 2],
    pub normal: Vector2,
}

/// Everything detected in one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentList {
    #[serde(with = "time::serde::rfc3339")]
    pub stamp: OffsetDateTime,
    pub segments: Vec<Segment>,
}

impl SegmentList {
    pub fn new(stamp: OffsetDateTime) -> Self {
        Self {
            stamp,
            segments: Vec::new(),
        }
    }

    pub fn count(&self, color: SegmentColor) -> usize {
        self.segments.iter().filter(|s| s.color == color).count()
    }

    pub fn of_color(&self, color: SegmentColor) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(move |s| s.color == color)
    }
}
