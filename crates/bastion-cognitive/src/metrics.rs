//! Short-horizon behavioral metrics feeding the sync gate.

use serde::{Deserialize, Serialize};
use tracing::warn;

use bastion_contracts::metrics::SyncSnapshot;

use crate::window::RollingWindow;

/// One observation of agent behavior.
///
/// Quality fields are optional: a planning call only knows its latency and
/// whether it was deterministic, while an external evaluator can report
/// precision and alignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncObservation {
    pub precision: Option<f64>,
    pub alignment_score: Option<f64>,
    pub latency_ms: f64,
    pub drift_corrected: Option<bool>,
    pub planner_mismatch: bool,
}

impl SyncObservation {
    /// Observation produced by a single planner call.
    pub fn planner(latency_ms: f64, mismatch: bool) -> Self {
        Self {
            precision: None,
            alignment_score: None,
            latency_ms,
            drift_corrected: None,
            planner_mismatch: mismatch,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncMetrics {
    window: RollingWindow<SyncObservation>,
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

impl SyncMetrics {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: RollingWindow::new(capacity),
        }
    }

    pub fn record(&mut self, observation: SyncObservation) {
        self.window.push(observation);
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Compute the snapshot over the current window.
    ///
    /// An empty window reports ideal values with `bootstrap_defaults` set, so
    /// a freshly booted runtime passes the sync gate before any behavior is
    /// observed. Quality fields nobody has reported fall back to ideal values
    /// the same way.
    pub fn snapshot(&self) -> SyncSnapshot {
        if self.window.is_empty() {
            warn!("sync window is empty; reporting bootstrap defaults");
            return SyncSnapshot::bootstrap();
        }

        let items = || self.window.iter();
        let precision = mean(items().filter_map(|o| o.precision));
        let alignment = mean(items().filter_map(|o| o.alignment_score));
        let drift = mean(
            items()
                .filter_map(|o| o.drift_corrected)
                .map(|ok| if ok { 1.0 } else { 0.0 }),
        );
        let bootstrap_defaults = precision.is_none() || alignment.is_none() || drift.is_none();

        SyncSnapshot {
            precision: precision.unwrap_or(1.0),
            alignment_score: alignment.unwrap_or(1.0),
            latency_ms: mean(items().map(|o| o.latency_ms)).unwrap_or(0.0),
            drift_correction_success: drift.unwrap_or(1.0),
            planner_mismatch: items().filter(|o| o.planner_mismatch).count() as u64,
            observations: self.window.len(),
            bootstrap_defaults,
        }
    }
}
