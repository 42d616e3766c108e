mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from lanelines for tests
pub use lanelines::{
    Admission, ChannelSink, ColorThresholdSet, ColorTransform, DetectionParameters, Frame,
    FramePipeline, LineDetectorNode, NodeConfig, ParameterStore, PolarityTable, Segment,
    SegmentColor, SegmentList, SinkEvent, WorkingSize,
};
