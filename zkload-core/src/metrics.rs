use std::sync::Arc;

use zkload_metrics::{MetricHandle, MetricKind, Registry, Snapshot};

/// Well-known metric names emitted by every run.
pub mod names {
    pub const HTTP_REQS: &str = "http_reqs";
    pub const HTTP_REQ_DURATION: &str = "http_req_duration";
    pub const HTTP_REQ_FAILED: &str = "http_req_failed";
    pub const ERRORS: &str = "errors";
    pub const CHECKS: &str = "checks";
    pub const ITERATIONS: &str = "iterations";
    pub const VUS: &str = "vus";
    pub const VUS_MAX: &str = "vus_max";
    pub const PROOF_GENERATION_TIME: &str = "proof_generation_time";
    pub const VERIFICATION_TIME: &str = "verification_time";

    /// Per-check rate metrics live under a `check:` prefix next to the
    /// aggregate `checks` rate.
    pub fn check(name: &str) -> String {
        format!("check:{name}")
    }
}

/// All metric storage for one run, with typed handles for the hot paths.
#[derive(Debug)]
pub struct RunMetrics {
    registry: Registry,
    http_reqs: MetricHandle,
    http_req_duration: MetricHandle,
    http_req_failed: MetricHandle,
    errors: MetricHandle,
    checks: MetricHandle,
    iterations: MetricHandle,
    vus: MetricHandle,
    vus_max: MetricHandle,
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RunMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();
        let http_reqs = registry.handle(names::HTTP_REQS, MetricKind::Counter);
        let http_req_duration = registry.handle(names::HTTP_REQ_DURATION, MetricKind::Trend);
        let http_req_failed = registry.handle(names::HTTP_REQ_FAILED, MetricKind::Rate);
        let errors = registry.handle(names::ERRORS, MetricKind::Rate);
        let checks = registry.handle(names::CHECKS, MetricKind::Rate);
        let iterations = registry.handle(names::ITERATIONS, MetricKind::Counter);
        let vus = registry.handle(names::VUS, MetricKind::Gauge);
        let vus_max = registry.handle(names::VUS_MAX, MetricKind::Gauge);
        Self {
            registry,
            http_reqs,
            http_req_duration,
            http_req_failed,
            errors,
            checks,
            iterations,
            vus,
            vus_max,
        }
    }

    /// Book one finished HTTP call. `duration_ms` is `None` when the request
    /// never produced a response (transport error), in which case no latency
    /// sample is recorded.
    pub fn record_request(&self, duration_ms: Option<f64>, failed: bool, error: bool) {
        self.http_reqs.increment(1);
        if let Some(ms) = duration_ms {
            self.http_req_duration.record(ms);
        }
        self.http_req_failed.add_bool(failed);
        self.errors.add_bool(error);
    }

    pub fn record_check(&self, name: &str, passed: bool) {
        self.checks.add_bool(passed);
        self.registry
            .handle(&names::check(name), MetricKind::Rate)
            .add_bool(passed);
    }

    pub fn record_trend(&self, name: &str, value_ms: f64) {
        self.registry.handle(name, MetricKind::Trend).record(value_ms);
    }

    pub fn record_iteration(&self) {
        self.iterations.increment(1);
    }

    /// Mark one VU as active until the returned guard is dropped. The `vus`
    /// gauge follows the live population; `vus_max` keeps the peak.
    pub fn enter_active_vu(self: &Arc<Self>) -> ActiveVuGuard {
        if let Some(vus) = self.vus.as_gauge() {
            let now = vus.add(1);
            if let Some(max) = self.vus_max.as_gauge() {
                max.raise_to(now);
            }
        }
        ActiveVuGuard {
            metrics: Arc::clone(self),
        }
    }

    pub fn checks_failed(&self) -> bool {
        let snap = self.registry.snapshot();
        match snap.get(names::CHECKS).map(|m| &m.values) {
            Some(zkload_metrics::MetricValues::Rate { total, trues, .. }) => trues < total,
            _ => false,
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.registry.snapshot()
    }
}

#[derive(Debug)]
pub struct ActiveVuGuard {
    metrics: Arc<RunMetrics>,
}

impl Drop for ActiveVuGuard {
    fn drop(&mut self) {
        if let Some(vus) = self.metrics.vus.as_gauge() {
            vus.sub(1);
        }
    }
}
