//! Error types for the line detector.

use thiserror::Error;

/// Result type alias for detector operations.
pub type DetectorResult<T> = Result<T, DetectorError>;

/// A parameter set that cannot be used for detection.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Working image size has a zero dimension.
    #[error("working size must be positive, got {height}x{width}")]
    InvalidWorkingSize { height: u32, width: u32 },

    /// Top cutoff removes the whole working image.
    #[error("top cutoff {cutoff} must be smaller than working height {height}")]
    CutoffTooLarge { cutoff: u32, height: u32 },

    /// An HSV range has a low bound above its high bound, or is out of range.
    #[error("malformed {color} threshold range: {reason}")]
    MalformedRange { color: String, reason: String },

    /// Canny thresholds are not ordered.
    #[error("canny low threshold {low} exceeds high threshold {high}")]
    CannyThresholds { low: f32, high: f32 },

    /// Hough parameters that can never produce a line.
    #[error("invalid line detector parameter: {0}")]
    LineParams(String),
}

/// Errors that abort the processing of a single frame.
#[derive(Debug, Error)]
pub enum DetectorError {
    /// No valid parameter snapshot is available.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The frame has no pixels.
    #[error("empty frame ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },

    /// The processor panicked while handling a frame.
    #[error("frame processing panicked: {0}")]
    Panicked(String),
}
