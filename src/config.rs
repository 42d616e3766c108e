//! Tunable detection parameters and the snapshot store the pipeline reads them from.
//!
//! Every reload builds a fresh [`ParameterSnapshot`] and publishes it as a whole; a frame
//! that already holds an `Arc` to the previous snapshot keeps using it until it finishes.

use crate::error::ConfigError;
use crate::models::SegmentColor;
use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{info, warn};

/// Largest hue value in the 8-bit HSV convention (degrees / 2)
pub const HUE_MAX: u8 = 180;

/// Inclusive HSV range, H in `0..=180`, S and V in `0..=255`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    pub low: [u8; 3],
    pub high: [u8; 3],
}

impl HsvRange {
    pub const fn new(low: [u8; 3], high: [u8; 3]) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|c| self.low[c] <= hsv[c] && hsv[c] <= self.high[c])
    }

    fn validate(&self, color: SegmentColor) -> Result<(), ConfigError> {
        for (c, name) in ["hue", "saturation", "value"].iter().enumerate() {
            if self.low[c] > self.high[c] {
                return Err(ConfigError::MalformedRange {
                    color: color.to_string(),
                    reason: format!("{} low {} > high {}", name, self.low[c], self.high[c]),
                });
            }
        }
        if self.high[0] > HUE_MAX {
            return Err(ConfigError::MalformedRange {
                color: color.to_string(),
                reason: format!("hue {} exceeds {}", self.high[0], HUE_MAX),
            });
        }
        Ok(())
    }
}

/// HSV thresholds for every color class. Red straddles the hue wraparound, so it is
/// described by a low-hue and a high-hue range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorThresholdSet {
    pub white: HsvRange,
    pub yellow: HsvRange,
    pub red: [HsvRange; 2],
}

impl Default for ColorThresholdSet {
    fn default() -> Self {
        Self {
            white: HsvRange::new([0, 0, 150], [180, 60, 255]),
            yellow: HsvRange::new([25, 140, 100], [45, 255, 255]),
            red: [
                HsvRange::new([0, 140, 100], [15, 255, 255]),
                HsvRange::new([165, 140, 100], [180, 255, 255]),
            ],
        }
    }
}

impl ColorThresholdSet {
    /// Ranges whose union makes up the given color class
    pub fn ranges(&self, color: SegmentColor) -> &[HsvRange] {
        match color {
            SegmentColor::White => std::slice::from_ref(&self.white),
            SegmentColor::Yellow => std::slice::from_ref(&self.yellow),
            SegmentColor::Red => &self.red,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for color in SegmentColor::ALL {
            for range in self.ranges(color) {
                range.validate(color)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingSize {
    pub height: u32,
    pub width: u32,
}

/// Geometry, edge and line detector settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionParameters {
    pub working_size: WorkingSize,
    /// Rows removed from the top of the working image
    pub top_cutoff: u32,
    pub dilation_kernel_size: u8,
    /// Canny hysteresis thresholds `[low, high]`
    pub canny_thresholds: [f32; 2],
    pub hough_threshold: u32,
    pub hough_min_line_length: u32,
    pub hough_max_line_gap: u32,
}

impl Default for DetectionParameters {
    fn default() -> Self {
        Self {
            working_size: WorkingSize {
                height: 120,
                width: 160,
            },
            top_cutoff: 40,
            dilation_kernel_size: 3,
            canny_thresholds: [80.0, 200.0],
            hough_threshold: 2,
            hough_min_line_length: 3,
            hough_max_line_gap: 1,
        }
    }
}

impl DetectionParameters {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let WorkingSize { height, width } = self.working_size;
        if height == 0 || width == 0 {
            return Err(ConfigError::InvalidWorkingSize { height, width });
        }
        if self.top_cutoff >= height {
            return Err(ConfigError::CutoffTooLarge {
                cutoff: self.top_cutoff,
                height,
            });
        }
        let [low, high] = self.canny_thresholds;
        if !(low >= 0.0 && low <= high) {
            return Err(ConfigError::CannyThresholds { low, high });
        }
        if self.hough_threshold == 0 {
            return Err(ConfigError::LineParams("vote threshold must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Which side of a segment its normal points to, relative to the color mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalPolarity {
    TowardMask,
    AwayFromMask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolarityTable {
    pub white: NormalPolarity,
    pub yellow: NormalPolarity,
    pub red: NormalPolarity,
}

impl Default for PolarityTable {
    fn default() -> Self {
        Self {
            white: NormalPolarity::TowardMask,
            yellow: NormalPolarity::AwayFromMask,
            red: NormalPolarity::AwayFromMask,
        }
    }
}

impl PolarityTable {
    pub fn for_color(&self, color: SegmentColor) -> NormalPolarity {
        match color {
            SegmentColor::White => self.white,
            SegmentColor::Yellow => self.yellow,
            SegmentColor::Red => self.red,
        }
    }
}

/// Immutable parameter bundle read by exactly one frame at a time
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSnapshot {
    pub version: u64,
    pub loaded_at: OffsetDateTime,
    pub params: DetectionParameters,
    pub thresholds: ColorThresholdSet,
    pub polarity: PolarityTable,
}

struct StoreState {
    current: Arc<ParameterSnapshot>,
    /// Last rejected reload; frames are skipped while set
    rejected: Option<ConfigError>,
}

/// Publishes parameter snapshots to the processing side
pub struct ParameterStore {
    state: RwLock<StoreState>,
}

impl ParameterStore {
    pub fn new(
        params: DetectionParameters,
        thresholds: ColorThresholdSet,
        polarity: PolarityTable,
    ) -> Result<Self, ConfigError> {
        params.validate()?;
        thresholds.validate()?;
        let snapshot = ParameterSnapshot {
            version: 1,
            loaded_at: OffsetDateTime::now_utc(),
            params,
            thresholds,
            polarity,
        };
        Ok(Self {
            state: RwLock::new(StoreState {
                current: Arc::new(snapshot),
                rejected: None,
            }),
        })
    }

    /// Replace detection parameters and thresholds, keeping the polarity table
    pub fn reload(
        &self,
        params: DetectionParameters,
        thresholds: ColorThresholdSet,
    ) -> Result<u64, ConfigError> {
        let polarity = self.state.read().current.polarity;
        self.reload_with_polarity(params, thresholds, polarity)
    }

    pub fn reload_with_polarity(
        &self,
        params: DetectionParameters,
        thresholds: ColorThresholdSet,
        polarity: PolarityTable,
    ) -> Result<u64, ConfigError> {
        let validated = params.validate().and_then(|_| thresholds.validate());
        let mut state = self.state.write();
        if let Err(e) = validated {
            warn!("Rejected parameter reload: {}", e);
            state.rejected = Some(e.clone());
            return Err(e);
        }

        if state.current.params == params
            && state.current.thresholds == thresholds
            && state.current.polarity == polarity
        {
            // Periodic polls mostly see unchanged values; keep the version stable.
            state.rejected = None;
            return Ok(state.current.version);
        }

        let version = state.current.version + 1;
        state.current = Arc::new(ParameterSnapshot {
            version,
            loaded_at: OffsetDateTime::now_utc(),
            params,
            thresholds,
            polarity,
        });
        if state.rejected.take().is_some() {
            info!("Valid parameters restored (version {})", version);
        }
        Ok(version)
    }

    /// Snapshot for the next frame, or the error that keeps frames from being processed
    pub fn snapshot(&self) -> Result<Arc<ParameterSnapshot>, ConfigError> {
        let state = self.state.read();
        match &state.rejected {
            Some(e) => Err(e.clone()),
            None => Ok(Arc::clone(&state.current)),
        }
    }

    /// Last valid snapshot, regardless of rejected reloads
    pub fn current(&self) -> Arc<ParameterSnapshot> {
        Arc::clone(&self.state.read().current)
    }
}

fn default_verbose_interval() -> u32 {
    10
}

/// Everything the node reads from its parameter file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub detection: DetectionParameters,
    #[serde(default)]
    pub thresholds: ColorThresholdSet,
    #[serde(default)]
    pub polarity: PolarityTable,
    #[serde(default)]
    pub verbose: bool,
    /// Emit diagnostics on every Nth processed frame
    #[serde(default = "default_verbose_interval")]
    pub verbose_interval: u32,
    #[serde(default)]
    pub white_balance: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            detection: DetectionParameters::default(),
            thresholds: ColorThresholdSet::default(),
            polarity: PolarityTable::default(),
            verbose: false,
            verbose_interval: default_verbose_interval(),
            white_balance: false,
        }
    }
}

impl NodeConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: NodeConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.detection.validate()?;
        self.thresholds.validate()
    }
}
