//! Integration tests for live parameter reloads.
//!
//! Tests cover:
//! - A frame already in flight finishing under the snapshot it started with
//! - Rejected reloads holding frames until valid parameters arrive
//! - Geometry changes taking effect on the next frame

mod common;

use common::*;
use lanelines::{ConfigError, DetectorError, DetectorResult, FrameHandler, FrameScheduler, HsvRange};
use parking_lot::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(10);

/// White thresholds that reject unsaturated pixels, i.e. every white marking
fn blind_to_white() -> ColorThresholdSet {
    ColorThresholdSet {
        white: HsvRange::new([0, 200, 150], [180, 255, 255]),
        ..Default::default()
    }
}

/// Captures the frame context, then waits for the test before running the chain
struct HeldFrame {
    pipeline: Arc<FramePipeline>,
    captured: Mutex<Sender<u64>>,
    release: Mutex<Receiver<()>>,
    done: Mutex<Sender<SegmentList>>,
}

impl FrameHandler for HeldFrame {
    fn handle(&self, frame: Frame) -> DetectorResult<()> {
        let context = self.pipeline.capture()?;
        let _ = self.captured.lock().send(context.snapshot.version);
        let _ = self.release.lock().recv();
        let processed = self.pipeline.run(frame, context)?;
        let _ = self.done.lock().send(processed.segments);
        Ok(())
    }

    fn name(&self) -> &str {
        "held-frame"
    }
}

#[test]
fn frame_in_flight_keeps_its_snapshot() {
    let config = square_config();
    let pipeline = Arc::new(pipeline_for(&config));
    let (captured_tx, captured_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let (done_tx, done_rx) = mpsc::channel();
    let scheduler = FrameScheduler::spawn(Arc::new(HeldFrame {
        pipeline: Arc::clone(&pipeline),
        captured: Mutex::new(captured_tx),
        release: Mutex::new(release_rx),
        done: Mutex::new(done_tx),
    }))
    .unwrap();

    let frame = Frame::now(diagonal_stripe());
    assert_eq!(scheduler.submit(frame.clone()), Admission::Admitted);
    assert_eq!(captured_rx.recv_timeout(WAIT).unwrap(), 1);

    // The frame is in flight: reload, then let it finish.
    let version = pipeline
        .params()
        .reload(config.detection.clone(), blind_to_white())
        .unwrap();
    assert_eq!(version, 2);
    release_tx.send(()).unwrap();

    let processed = done_rx.recv_timeout(WAIT).unwrap();
    let reference = pipeline_for(&config).process(frame.clone()).unwrap();
    assert_eq!(processed, reference.segments);
    assert!(processed.count(SegmentColor::White) > 0);
    assert!(scheduler.wait_idle(WAIT));

    // The next frame sees the new thresholds.
    let next = pipeline.process(frame).unwrap();
    assert_eq!(next.context.snapshot.version, 2);
    assert_eq!(next.segments.count(SegmentColor::White), 0);
    scheduler.shutdown();
}

#[test]
fn rejected_reload_holds_frames_until_fixed() {
    let config = square_config();
    let pipeline = pipeline_for(&config);

    let broken = DetectionParameters {
        top_cutoff: 100,
        ..config.detection.clone()
    };
    let err = pipeline
        .params()
        .reload(broken, config.thresholds.clone())
        .unwrap_err();
    assert!(matches!(err, ConfigError::CutoffTooLarge { .. }));

    let skipped = pipeline.process(Frame::now(diagonal_stripe()));
    assert!(matches!(skipped, Err(DetectorError::Config(_))));
    // The last good snapshot is still there.
    assert_eq!(pipeline.params().current().version, 1);

    let version = pipeline
        .params()
        .reload(config.detection.clone(), config.thresholds.clone())
        .unwrap();
    assert_eq!(version, 1);
    let list = pipeline.process(Frame::now(diagonal_stripe())).unwrap().segments;
    assert!(list.count(SegmentColor::White) > 0);
}

#[test]
fn geometry_changes_apply_to_the_next_frame() {
    let config = square_config();
    let pipeline = pipeline_for(&config);
    let image = vertical_bars(100, 100, &[(40, 50, WHITE)]);

    let params = DetectionParameters {
        top_cutoff: 60,
        ..config.detection.clone()
    };
    pipeline
        .params()
        .reload(params, config.thresholds.clone())
        .unwrap();

    let list = pipeline.process(Frame::now(image)).unwrap().segments;
    assert!(!list.segments.is_empty());
    for segment in &list.segments {
        for p in segment.pixels_normalized {
            assert!(p.y >= 0.6, "{:?}", segment);
        }
    }
}
