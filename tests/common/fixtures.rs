#![allow(dead_code)]

use image::{ImageBuffer, Rgb, RgbImage};
use lanelines::{
    ChannelSink, DetectionParameters, Frame, FramePipeline, LineDetectorNode, NodeConfig,
    ParameterStore, SegmentList, SinkEvent, WorkingSize,
};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::time::Duration;

pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const YELLOW: Rgb<u8> = Rgb([255, 220, 0]);
/// Hue 0, low side of the red wraparound
pub const RED_LOW: Rgb<u8> = Rgb([255, 0, 0]);
/// Hue 175, high side of the red wraparound
pub const RED_HIGH: Rgb<u8> = Rgb([255, 0, 40]);

/// 100x100 black frame with a 5px wide white stripe along the main diagonal
pub fn diagonal_stripe() -> RgbImage {
    ImageBuffer::from_fn(100, 100, |x, y| {
        if (x as i32 - y as i32).abs() <= 2 { WHITE } else { BLACK }
    })
}

/// Black frame with full-height bars; each entry is `(x_start, x_end, color)`
pub fn vertical_bars(width: u32, height: u32, bars: &[(u32, u32, Rgb<u8>)]) -> RgbImage {
    ImageBuffer::from_fn(width, height, |x, _| {
        bars.iter()
            .find(|(start, end, _)| (*start..*end).contains(&x))
            .map(|(_, _, color)| *color)
            .unwrap_or(BLACK)
    })
}

/// Default thresholds on a 100x100 working image without top cutoff
pub fn square_config() -> NodeConfig {
    NodeConfig {
        detection: DetectionParameters {
            working_size: WorkingSize {
                height: 100,
                width: 100,
            },
            top_cutoff: 0,
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn pipeline_for(config: &NodeConfig) -> FramePipeline {
    let store = ParameterStore::new(
        config.detection.clone(),
        config.thresholds.clone(),
        config.polarity,
    )
    .expect("Failed to build parameter store");
    FramePipeline::new(Arc::new(store))
}

pub fn process(config: &NodeConfig, image: RgbImage) -> SegmentList {
    pipeline_for(config)
        .process(Frame::now(image))
        .expect("Frame processing failed")
        .segments
}

/// Node publishing into a channel the test can read from
pub fn channel_node(config: &NodeConfig) -> (LineDetectorNode, Receiver<SinkEvent>) {
    let (tx, rx) = mpsc::channel();
    let node = LineDetectorNode::new(config, Arc::new(ChannelSink::new(tx)))
        .expect("Failed to start node");
    (node, rx)
}

pub fn next_event(rx: &Receiver<SinkEvent>) -> SinkEvent {
    rx.recv_timeout(Duration::from_secs(10))
        .expect("No event from the detector within 10s")
}

pub fn assert_in_unit_square(list: &SegmentList) {
    for segment in &list.segments {
        for p in segment.pixels_normalized {
            assert!((0.0..=1.0).contains(&p.x), "x out of range: {:?}", segment);
            assert!((0.0..=1.0).contains(&p.y), "y out of range: {:?}", segment);
        }
    }
}

pub fn assert_unit_normals(list: &SegmentList) {
    for segment in &list.segments {
        let n = segment.normal;
        let norm = (n.x * n.x + n.y * n.y).sqrt();
        assert!((norm - 1.0).abs() < 1e-4, "normal not unit: {:?}", segment);
    }
}
