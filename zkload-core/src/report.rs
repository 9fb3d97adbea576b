use std::time::Duration;

use zkload_metrics::Snapshot;

use crate::metrics::names;
use crate::thresholds::Evaluation;

/// Outcome of one finished run: the final metric snapshot plus the verdicts
/// the process exit code is derived from.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub wall: Duration,
    pub metrics: Snapshot,
    pub thresholds: Evaluation,
    pub checks_failed: bool,
}

impl RunReport {
    pub fn thresholds_failed(&self) -> bool {
        !self.thresholds.passed()
    }

    pub fn peak_vus(&self) -> i64 {
        self.metrics.gauge(names::VUS_MAX).unwrap_or(0)
    }

    pub fn requests_total(&self) -> u64 {
        self.metrics.counter(names::HTTP_REQS).unwrap_or(0)
    }

    pub fn iterations_total(&self) -> u64 {
        self.metrics.counter(names::ITERATIONS).unwrap_or(0)
    }
}
