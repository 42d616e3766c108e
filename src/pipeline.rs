use crate::config::{ParameterSnapshot, ParameterStore};
use crate::detection::color::{ColorTransform, WhiteBalanceEstimator};
use crate::detection::coords::CoordinateNormalizer;
use crate::detection::{preprocessing, ColorDetections, LineDetector};
use crate::error::DetectorResult;
use crate::latency::LatencyTracker;
use crate::models::{Frame, Segment, SegmentList};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Verbose diagnostics settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticsConfig {
    pub verbose: bool,
    /// Diagnostics are emitted for the first processed frame and then every Nth
    pub interval: u32,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            interval: 10,
        }
    }
}

/// Everything one frame reads from shared state, captured once before processing starts
#[derive(Debug, Clone)]
pub struct FrameContext {
    pub snapshot: Arc<ParameterSnapshot>,
    pub transform: ColorTransform,
    /// Sequence number of this processed frame, starting at 1
    pub sequence: u64,
    /// Whether diagnostics are emitted for this frame
    pub sampled: bool,
}

/// Result of one frame's run through the pipeline
#[derive(Debug, Clone)]
pub struct ProcessedFrame {
    pub segments: SegmentList,
    pub detections: Vec<ColorDetections>,
    pub latency: LatencyTracker,
    pub context: FrameContext,
}

/// The per-frame processing chain: resize/crop, color correction, detection,
/// normalization and assembly.
pub struct FramePipeline {
    params: Arc<ParameterStore>,
    transform: Mutex<ColorTransform>,
    white_balance_enabled: AtomicBool,
    white_balance: Mutex<WhiteBalanceEstimator>,
    diagnostics: Mutex<DiagnosticsConfig>,
    counter: AtomicU64,
}

impl FramePipeline {
    pub fn new(params: Arc<ParameterStore>) -> Self {
        Self {
            params,
            transform: Mutex::new(ColorTransform::IDENTITY),
            white_balance_enabled: AtomicBool::new(false),
            white_balance: Mutex::new(WhiteBalanceEstimator::new()),
            diagnostics: Mutex::new(DiagnosticsConfig::default()),
            counter: AtomicU64::new(0),
        }
    }

    pub fn with_diagnostics(self, diagnostics: DiagnosticsConfig) -> Self {
        *self.diagnostics.lock() = diagnostics;
        self
    }

    pub fn with_white_balance(self, enabled: bool) -> Self {
        self.white_balance_enabled.store(enabled, Ordering::Relaxed);
        self
    }

    pub fn params(&self) -> &Arc<ParameterStore> {
        &self.params
    }

    /// Takes effect from the next frame that starts processing
    pub fn set_color_transform(&self, transform: ColorTransform) {
        *self.transform.lock() = transform;
        debug!("Color transform updated: {:?}", transform);
    }

    pub fn color_transform(&self) -> ColorTransform {
        *self.transform.lock()
    }

    pub fn set_white_balance(&self, enabled: bool) {
        self.white_balance_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn set_diagnostics(&self, diagnostics: DiagnosticsConfig) {
        *self.diagnostics.lock() = diagnostics;
    }

    pub fn processed_count(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    /// Capture the parameter snapshot and color transform for the next frame.
    /// Fails while the parameter store holds a rejected configuration.
    pub fn capture(&self) -> DetectorResult<FrameContext> {
        let snapshot = self.params.snapshot()?;
        let transform = *self.transform.lock();
        let sequence = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let diagnostics = *self.diagnostics.lock();
        let sampled =
            diagnostics.verbose && (sequence - 1) % diagnostics.interval.max(1) as u64 == 0;

        Ok(FrameContext {
            snapshot,
            transform,
            sequence,
            sampled,
        })
    }

    pub fn process(&self, frame: Frame) -> DetectorResult<ProcessedFrame> {
        let context = self.capture()?;
        self.run(frame, context)
    }

    /// Run the whole chain under an already captured context
    pub fn run(&self, frame: Frame, context: FrameContext) -> DetectorResult<ProcessedFrame> {
        let mut latency = LatencyTracker::new(frame.stamp);
        let params = &context.snapshot.params;

        let preprocessed = preprocessing::resize_and_crop(&frame.image, params)?;
        latency.completed("resized");

        let mut image = preprocessed.image;
        if self.white_balance_enabled.load(Ordering::Relaxed) {
            let corrected = self.white_balance.lock().process(&mut image);
            if !corrected && context.sampled {
                info!("White balance: parameters computed");
            }
        }
        let image = context.transform.apply(&image);
        latency.completed("corrected");

        let detector = LineDetector::new(&image, &context.snapshot);
        let detections = detector.detect_all();
        latency.completed("detected");

        let normalizer = CoordinateNormalizer::new(preprocessed.crop_offset, params.working_size);
        let segments = assemble(&frame, &detections, &normalizer);
        latency.completed("prepared");

        if context.sampled {
            info!(
                "[{:3}] # segments: white {:3} yellow {:3} red {:3} (params v{})",
                context.sequence,
                detections[0].len(),
                detections[1].len(),
                detections[2].len(),
                context.snapshot.version
            );
        }

        Ok(ProcessedFrame {
            segments,
            detections,
            latency,
            context,
        })
    }
}

/// Build the published segment list, grouped by color in detection order
fn assemble(
    frame: &Frame,
    detections: &[ColorDetections],
    normalizer: &CoordinateNormalizer,
) -> SegmentList {
    let mut list = SegmentList::new(frame.stamp);
    for found in detections {
        for (line, normal) in found.lines.iter().zip(&found.normals) {
            if normal.norm() == 0.0 {
                continue;
            }
            list.segments.push(Segment {
                color: found.color,
                pixels_normalized: normalizer.normalize_line(line),
                normal: *normal,
            });
        }
    }
    list
}
