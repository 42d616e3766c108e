pub mod config;
pub mod detection;
pub mod error;
pub mod latency;
pub mod models;
pub mod node;
pub mod pipeline;
pub mod scheduler;

pub use config::{
    ColorThresholdSet, DetectionParameters, HsvRange, NodeConfig, NormalPolarity,
    ParameterSnapshot, ParameterStore, PolarityTable, WorkingSize,
};
pub use detection::color::{ColorTransform, WhiteBalanceEstimator, WhiteBalanceState};
pub use detection::LineDetector;
pub use error::{ConfigError, DetectorError, DetectorResult};
pub use latency::{LatencyReport, LatencyTracker};
pub use models::{Frame, PixelLine, Point2, Segment, SegmentColor, SegmentList, Vector2};
pub use node::{ChannelSink, LineDetectorNode, SegmentSink, SinkEvent};
pub use pipeline::{DiagnosticsConfig, FrameContext, FramePipeline, ProcessedFrame};
pub use scheduler::{Admission, FrameHandler, FrameScheduler, SchedulerStats};
