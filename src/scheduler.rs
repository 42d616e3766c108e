//! Single-flight frame admission.
//!
//! At most one frame is in the pipeline at any time. A frame that arrives while
//! another is being processed is dropped, never queued: the controller prefers a
//! slightly stale result over a growing backlog.

use crate::error::{DetectorError, DetectorResult};
use crate::models::Frame;
use anyhow::Result;
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Work run on the scheduler's worker thread for every admitted frame
pub trait FrameHandler: Send + Sync + 'static {
    fn handle(&self, frame: Frame) -> DetectorResult<()>;

    /// Called on the worker after `handle` failed or panicked
    fn on_error(&self, _error: &DetectorError) {}

    /// Human-readable name (used for the worker thread and in logs)
    fn name(&self) -> &str;
}

/// Outcome of a `submit` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    /// Another frame is in flight
    Dropped,
    /// The scheduler is switched off
    Inactive,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub admitted: u64,
    pub dropped: u64,
    pub inactive: u64,
    pub completed: u64,
    pub failed: u64,
}

#[derive(Default)]
struct Gate {
    busy: AtomicBool,
    active: AtomicBool,
    idle_lock: Mutex<()>,
    idle: Condvar,
    admitted: AtomicU64,
    dropped: AtomicU64,
    inactive: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl Gate {
    fn release(&self) {
        let _guard = self.idle_lock.lock();
        self.busy.store(false, Ordering::Release);
        self.idle.notify_all();
    }
}

pub struct FrameScheduler {
    gate: Arc<Gate>,
    sender: Option<SyncSender<Frame>>,
    worker: Option<JoinHandle<()>>,
}

impl FrameScheduler {
    /// Start the dedicated worker thread for `handler`
    pub fn spawn<H: FrameHandler>(handler: Arc<H>) -> Result<Self> {
        let gate = Arc::new(Gate::default());
        gate.active.store(true, Ordering::Relaxed);

        // Capacity 1: the busy flag guarantees the slot is empty whenever a frame is sent.
        let (sender, receiver) = mpsc::sync_channel(1);
        let worker_gate = Arc::clone(&gate);
        let worker = thread::Builder::new()
            .name(handler.name().to_string())
            .spawn(move || worker_loop(handler, receiver, worker_gate))?;

        Ok(Self {
            gate,
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    /// Hand a frame to the worker if it is idle. Never blocks.
    pub fn submit(&self, frame: Frame) -> Admission {
        let gate = &self.gate;
        if !gate.active.load(Ordering::Relaxed) {
            gate.inactive.fetch_add(1, Ordering::Relaxed);
            return Admission::Inactive;
        }

        if gate
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            gate.dropped.fetch_add(1, Ordering::Relaxed);
            debug!("Frame dropped, processing in flight");
            return Admission::Dropped;
        }

        let Some(sender) = &self.sender else {
            gate.release();
            return Admission::Dropped;
        };
        match sender.try_send(frame) {
            Ok(()) => {
                gate.admitted.fetch_add(1, Ordering::Relaxed);
                Admission::Admitted
            }
            Err(TrySendError::Full(_)) => {
                // The worker still owns the busy flag for the queued frame.
                gate.dropped.fetch_add(1, Ordering::Relaxed);
                Admission::Dropped
            }
            Err(TrySendError::Disconnected(_)) => {
                error!("Frame worker has exited; dropping frame");
                gate.release();
                gate.dropped.fetch_add(1, Ordering::Relaxed);
                Admission::Dropped
            }
        }
    }

    /// While inactive every submitted frame is discarded
    pub fn set_active(&self, active: bool) {
        self.gate.active.store(active, Ordering::Relaxed);
    }

    pub fn is_active(&self) -> bool {
        self.gate.active.load(Ordering::Relaxed)
    }

    pub fn is_busy(&self) -> bool {
        self.gate.busy.load(Ordering::Acquire)
    }

    /// Block until no frame is in flight or `timeout` passes. Returns true when idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.gate.idle_lock.lock();
        while self.gate.busy.load(Ordering::Acquire) {
            if self.gate.idle.wait_until(&mut guard, deadline).timed_out() {
                return !self.gate.busy.load(Ordering::Acquire);
            }
        }
        true
    }

    pub fn stats(&self) -> SchedulerStats {
        let g = &self.gate;
        SchedulerStats {
            admitted: g.admitted.load(Ordering::Relaxed),
            dropped: g.dropped.load(Ordering::Relaxed),
            inactive: g.inactive.load(Ordering::Relaxed),
            completed: g.completed.load(Ordering::Relaxed),
            failed: g.failed.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting frames, let the in-flight frame finish and join the worker
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.gate.active.store(false, Ordering::Relaxed);
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Frame worker terminated abnormally");
            }
        }
    }
}

impl Drop for FrameScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Marks the admitted frame as done when dropped, including during unwinding
struct InFlight<'a>(&'a Gate);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.completed.fetch_add(1, Ordering::Relaxed);
        self.0.release();
    }
}

fn worker_loop<H: FrameHandler>(handler: Arc<H>, receiver: Receiver<Frame>, gate: Arc<Gate>) {
    while let Ok(frame) = receiver.recv() {
        let _in_flight = InFlight(gate.as_ref());
        let result = panic::catch_unwind(AssertUnwindSafe(|| handler.handle(frame)))
            .unwrap_or_else(|payload| Err(DetectorError::Panicked(panic_message(payload))));

        if let Err(e) = result {
            gate.failed.fetch_add(1, Ordering::Relaxed);
            error!("[{}] Frame processing failed: {}", handler.name(), e);
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler.on_error(&e))) {
                error!(
                    "[{}] Error handler panicked: {}",
                    handler.name(),
                    panic_message(payload)
                );
            }
        }
    }
    debug!("[{}] Frame worker exiting", handler.name());
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
