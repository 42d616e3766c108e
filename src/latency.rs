//! Stage-completion timing relative to frame acquisition. Diagnostics only.

use serde::Serialize;
use std::fmt;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseLatency {
    pub phase: &'static str,
    pub latency_ms: f64,
}

/// Phase name -> milliseconds elapsed since the frame was acquired
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatencyReport {
    pub phases: Vec<PhaseLatency>,
}

impl LatencyReport {
    pub fn get(&self, phase: &str) -> Option<f64> {
        self.phases
            .iter()
            .find(|p| p.phase == phase)
            .map(|p| p.latency_ms)
    }
}

impl fmt::Display for LatencyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Latencies:")?;
        for p in &self.phases {
            writeln!(f, " {:>15} latency {:.1}ms", p.phase, p.latency_ms)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct LatencyTracker {
    acquired: OffsetDateTime,
    report: LatencyReport,
}

impl LatencyTracker {
    pub fn new(acquired: OffsetDateTime) -> Self {
        let mut tracker = Self {
            acquired,
            report: LatencyReport::default(),
        };
        tracker.completed("acquired");
        tracker
    }

    pub fn completed(&mut self, phase: &'static str) {
        let elapsed = OffsetDateTime::now_utc() - self.acquired;
        self.report.phases.push(PhaseLatency {
            phase,
            latency_ms: elapsed.as_seconds_f64() * 1000.0,
        });
    }

    pub fn report(&self) -> &LatencyReport {
        &self.report
    }
}
