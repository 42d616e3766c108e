use anyhow::{Context, bail};
use clap::Parser;
use parking_lot::Mutex;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use lanelines::{
    Admission, DetectorError, Frame, LatencyReport, LineDetectorNode, NodeConfig, SegmentList,
    SegmentSink,
};

#[derive(Parser)]
#[command(name = "lanelines")]
#[command(about = "Detect colored lane-marking segments in a sequence of camera frames")]
struct Cli {
    /// Directory of frames, processed in file-name order
    #[arg(value_name = "FRAMES_DIR")]
    frames_dir: PathBuf,

    /// YAML parameter file, re-read every second
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Rate at which frames are fed to the detector
    #[arg(long, default_value_t = 30.0)]
    fps: f64,

    /// Log segment counts and latencies every `verbose_interval` frames
    #[arg(short, long)]
    verbose: bool,

    /// Calibrate white balance on the first frame
    #[arg(long)]
    white_balance: bool,

    /// Write segment lists as JSON lines to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[derive(Serialize)]
struct OutputLine<'a> {
    #[serde(flatten)]
    segments: &'a SegmentList,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency: Option<&'a LatencyReport>,
}

/// Writes one JSON object per published segment list
struct JsonLinesSink {
    out: Mutex<Box<dyn Write + Send>>,
}

impl JsonLinesSink {
    fn new(path: Option<&Path>) -> anyhow::Result<Self> {
        let out: Box<dyn Write + Send> = match path {
            Some(p) => Box::new(BufWriter::new(
                File::create(p).with_context(|| format!("Failed to create {}", p.display()))?,
            )),
            None => Box::new(std::io::stdout()),
        };
        Ok(Self { out: Mutex::new(out) })
    }
}

impl SegmentSink for JsonLinesSink {
    fn publish(&self, segments: SegmentList, latency: Option<&LatencyReport>) {
        let line = OutputLine {
            segments: &segments,
            latency,
        };
        let mut out = self.out.lock();
        let written = serde_json::to_writer(&mut *out, &line)
            .map_err(std::io::Error::from)
            .and_then(|_| {
                writeln!(out)?;
                out.flush()
            });
        if let Err(e) = written {
            warn!("Failed to write segment list: {}", e);
        }
    }

    fn report_error(&self, error: &DetectorError) {
        debug!("Frame skipped: {}", error);
    }
}

fn apply_overrides(mut config: NodeConfig, args: &Cli) -> NodeConfig {
    config.verbose |= args.verbose;
    config.white_balance |= args.white_balance;
    config
}

fn list_frames(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut frames: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read frame directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg" | "bmp"))
        })
        .collect();
    frames.sort();
    Ok(frames)
}

async fn poll_config(path: PathBuf, node: Arc<LineDetectorNode>, args: Arc<Cli>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.tick().await;
    loop {
        ticker.tick().await;
        match NodeConfig::load(&path) {
            Ok(config) => {
                if let Ok(version) = node.reload_config(&apply_overrides(config, &args)) {
                    debug!("Parameters at version {}", version);
                }
            }
            Err(e) => warn!("Keeping previous parameters: {:#}", e),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lanelines=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Arc::new(Cli::parse());
    if !(args.fps > 0.0) {
        bail!("--fps must be positive, got {}", args.fps);
    }

    let config = match &args.config {
        Some(path) => NodeConfig::load(path)?,
        None => NodeConfig::default(),
    };
    let config = apply_overrides(config, &args);

    let frames = list_frames(&args.frames_dir)?;
    if frames.is_empty() {
        bail!("No frames found in {}", args.frames_dir.display());
    }
    info!("Found {} frame(s) in {}", frames.len(), args.frames_dir.display());

    let sink = Arc::new(JsonLinesSink::new(args.output.as_deref())?);
    let node = Arc::new(LineDetectorNode::new(&config, sink)?);

    let reload_task = args.config.clone().map(|path| {
        tokio::spawn(poll_config(path, Arc::clone(&node), Arc::clone(&args)))
    });

    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / args.fps));
    for path in frames {
        ticker.tick().await;
        let decoded = tokio::task::spawn_blocking(move || {
            image::open(&path)
                .map(|img| Frame::now(img.to_rgb8()))
                .with_context(|| format!("Failed to decode {}", path.display()))
        })
        .await?;

        match decoded {
            Ok(frame) => {
                if node.submit(frame) == Admission::Dropped {
                    debug!("Detector busy, frame dropped");
                }
            }
            Err(e) => warn!("{:#}", e),
        }
    }

    let waiting = Arc::clone(&node);
    let idle = tokio::task::spawn_blocking(move || waiting.wait_idle(Duration::from_secs(30))).await?;
    if !idle {
        warn!("Detector still busy after 30s, shutting down anyway");
    }

    if let Some(task) = reload_task {
        task.abort();
        let _ = task.await;
    }

    let stats = node.stats();
    info!(
        "Done: {} admitted, {} dropped, {} failed",
        stats.admitted, stats.dropped, stats.failed
    );

    if let Ok(node) = Arc::try_unwrap(node) {
        node.shutdown();
    }
    Ok(())
}
