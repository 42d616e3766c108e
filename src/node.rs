//! The line detector as seen by the transport layer: frames in, segment lists out.

use crate::config::{ColorThresholdSet, DetectionParameters, NodeConfig, ParameterStore};
use crate::detection::color::ColorTransform;
use crate::error::{ConfigError, DetectorError, DetectorResult};
use crate::latency::LatencyReport;
use crate::models::{Frame, SegmentList};
use crate::pipeline::{DiagnosticsConfig, FramePipeline};
use crate::scheduler::{Admission, FrameHandler, FrameScheduler, SchedulerStats};
use anyhow::Result;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Receives the detector's output. Called on the worker thread.
pub trait SegmentSink: Send + Sync + 'static {
    /// `latency` is set on frames sampled for verbose diagnostics
    fn publish(&self, segments: SegmentList, latency: Option<&LatencyReport>);

    fn report_error(&self, _error: &DetectorError) {}
}

/// What a [`ChannelSink`] forwards
#[derive(Debug, Clone)]
pub enum SinkEvent {
    Published {
        segments: SegmentList,
        latency: Option<LatencyReport>,
    },
    Failed(String),
}

/// Forwards everything to an mpsc channel
pub struct ChannelSink {
    tx: Sender<SinkEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<SinkEvent>) -> Self {
        Self { tx }
    }
}

impl SegmentSink for ChannelSink {
    fn publish(&self, segments: SegmentList, latency: Option<&LatencyReport>) {
        // A closed receiver just means nobody listens anymore.
        let _ = self.tx.send(SinkEvent::Published {
            segments,
            latency: latency.cloned(),
        });
    }

    fn report_error(&self, error: &DetectorError) {
        let _ = self.tx.send(SinkEvent::Failed(error.to_string()));
    }
}

struct PipelineHandler<S: SegmentSink> {
    pipeline: Arc<FramePipeline>,
    sink: Arc<S>,
}

impl<S: SegmentSink> FrameHandler for PipelineHandler<S> {
    fn handle(&self, frame: Frame) -> DetectorResult<()> {
        let processed = self.pipeline.process(frame)?;
        let mut latency = processed.latency;
        let sampled = processed.context.sampled;

        self.sink
            .publish(processed.segments, sampled.then(|| latency.report()));
        latency.completed("published");

        if sampled {
            info!("{}", latency.report());
        }
        Ok(())
    }

    fn on_error(&self, error: &DetectorError) {
        self.sink.report_error(error);
    }

    fn name(&self) -> &str {
        "line-detector"
    }
}

/// Scheduler, pipeline and parameter store wired together
pub struct LineDetectorNode {
    pipeline: Arc<FramePipeline>,
    scheduler: FrameScheduler,
}

impl LineDetectorNode {
    pub fn new<S: SegmentSink>(config: &NodeConfig, sink: Arc<S>) -> Result<Self> {
        let store = ParameterStore::new(
            config.detection.clone(),
            config.thresholds.clone(),
            config.polarity,
        )?;
        let pipeline = Arc::new(
            FramePipeline::new(Arc::new(store))
                .with_white_balance(config.white_balance)
                .with_diagnostics(DiagnosticsConfig {
                    verbose: config.verbose,
                    interval: config.verbose_interval,
                }),
        );
        let scheduler = FrameScheduler::spawn(Arc::new(PipelineHandler {
            pipeline: Arc::clone(&pipeline),
            sink,
        }))?;

        info!(
            "Line detector initialized (verbose: {} interval: {})",
            config.verbose, config.verbose_interval
        );
        Ok(Self {
            pipeline,
            scheduler,
        })
    }

    /// Never blocks; frames arriving while one is in flight are dropped
    pub fn submit(&self, frame: Frame) -> Admission {
        self.scheduler.submit(frame)
    }

    /// Adopt new parameters for the next frame that starts processing
    pub fn reload(
        &self,
        params: DetectionParameters,
        thresholds: ColorThresholdSet,
    ) -> Result<u64, ConfigError> {
        self.pipeline.params().reload(params, thresholds)
    }

    /// Reload everything a parameter file carries, including diagnostics settings
    pub fn reload_config(&self, config: &NodeConfig) -> Result<u64, ConfigError> {
        self.pipeline.set_diagnostics(DiagnosticsConfig {
            verbose: config.verbose,
            interval: config.verbose_interval,
        });
        self.pipeline.set_white_balance(config.white_balance);
        let result = self.pipeline.params().reload_with_polarity(
            config.detection.clone(),
            config.thresholds.clone(),
            config.polarity,
        );
        if let Err(e) = &result {
            warn!("Keeping frames on hold until parameters are fixed: {}", e);
        }
        result
    }

    pub fn set_color_transform(&self, transform: ColorTransform) {
        self.pipeline.set_color_transform(transform);
    }

    pub fn set_active(&self, active: bool) {
        self.scheduler.set_active(active);
    }

    pub fn is_active(&self) -> bool {
        self.scheduler.is_active()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.scheduler.wait_idle(timeout)
    }

    pub fn pipeline(&self) -> &Arc<FramePipeline> {
        &self.pipeline
    }

    pub fn shutdown(self) {
        info!("[LineDetectorNode] Shutdown.");
        self.scheduler.shutdown();
    }
}
