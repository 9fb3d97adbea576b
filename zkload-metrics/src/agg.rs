use hdrhistogram::Histogram;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use crate::snapshot::{MetricValues, TrendSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum MetricKind {
    Counter,
    Gauge,
    Rate,
    Trend,
}

/// Running sum of non-negative integer observations.
#[derive(Debug, Default)]
pub struct CounterAgg {
    value: AtomicU64,
}

impl CounterAgg {
    pub fn add(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
pub struct GaugeAgg {
    value: AtomicI64,
}

impl GaugeAgg {
    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn add(&self, delta: i64) -> i64 {
        self.value.fetch_add(delta, Ordering::Relaxed) + delta
    }

    pub fn sub(&self, delta: i64) {
        self.value.fetch_sub(delta, Ordering::Relaxed);
    }

    /// Raise the gauge to `candidate` if it is above the current value.
    pub fn raise_to(&self, candidate: i64) {
        let mut cur = self.value.load(Ordering::Relaxed);
        while candidate > cur {
            match self
                .value
                .compare_exchange_weak(cur, candidate, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(observed) => cur = observed,
            }
        }
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Fraction of boolean observations that were true.
#[derive(Debug, Default)]
pub struct RateAgg {
    total: AtomicU64,
    trues: AtomicU64,
}

impl RateAgg {
    pub fn add(&self, value: bool) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if value {
            // Release pairs with the acquire load in `get`: a reader that
            // sees this increment also sees the matching total increment.
            self.trues.fetch_add(1, Ordering::Release);
        }
    }

    pub fn get(&self) -> (u64, u64) {
        // trues is read first; it only increments after total does, so this
        // order can under-read trues but never observes trues > total.
        let trues = self.trues.load(Ordering::Acquire);
        let total = self.total.load(Ordering::Relaxed);
        (total, trues)
    }

    pub(crate) fn summarize(&self) -> MetricValues {
        let (total, trues) = self.get();
        let rate = if total == 0 {
            None
        } else {
            Some(trues as f64 / total as f64)
        };
        MetricValues::Rate { total, trues, rate }
    }
}

/// Distribution of numeric observations (milliseconds by convention).
///
/// Exact count/sum/min/max via atomics; quantiles come from an HDR histogram
/// holding the values scaled x1000 (so millisecond inputs keep microsecond
/// resolution). Non-finite and non-positive observations are dropped.
#[derive(Debug)]
pub struct TrendAgg {
    count: AtomicU64,
    sum_scaled: AtomicU64,
    min_scaled: AtomicU64,
    max_scaled: AtomicU64,
    hist: Mutex<Histogram<u64>>,
}

impl TrendAgg {
    pub(crate) fn new() -> Self {
        // Upper bound: 1 hour in scaled (microsecond) units.
        let hist = Histogram::<u64>::new_with_bounds(1, 3_600_000_000, 3)
            .unwrap_or_else(|err| panic!("failed to init histogram: {err}"));
        Self {
            count: AtomicU64::new(0),
            sum_scaled: AtomicU64::new(0),
            min_scaled: AtomicU64::new(u64::MAX),
            max_scaled: AtomicU64::new(0),
            hist: Mutex::new(hist),
        }
    }

    pub fn record(&self, value: f64) {
        if !value.is_finite() {
            return;
        }
        let scaled = (value * 1000.0).round();
        if scaled <= 0.0 {
            return;
        }
        let scaled = scaled as u64;

        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_scaled.fetch_add(scaled, Ordering::Relaxed);

        let mut cur = self.min_scaled.load(Ordering::Relaxed);
        while scaled < cur {
            match self.min_scaled.compare_exchange_weak(
                cur,
                scaled,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => cur = observed,
            }
        }

        let mut cur = self.max_scaled.load(Ordering::Relaxed);
        while scaled > cur {
            match self.max_scaled.compare_exchange_weak(
                cur,
                scaled,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => cur = observed,
            }
        }

        let mut h = self.hist.lock();
        let _ = h.record(scaled);
    }

    pub(crate) fn summarize(&self) -> MetricValues {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return MetricValues::Trend(TrendSummary::default());
        }

        let sum = self.sum_scaled.load(Ordering::Relaxed) as f64;
        let min = self.min_scaled.load(Ordering::Relaxed);
        let max = self.max_scaled.load(Ordering::Relaxed);

        let h = self.hist.lock();
        let q = |quantile: f64| Some(h.value_at_quantile(quantile) as f64 / 1000.0);

        MetricValues::Trend(TrendSummary {
            count,
            min: Some(min as f64 / 1000.0),
            max: Some(max as f64 / 1000.0),
            avg: Some(sum / (count as f64) / 1000.0),
            p50: q(0.50),
            p90: q(0.90),
            p95: q(0.95),
            p99: q(0.99),
        })
    }
}

/// Cloneable write handle to one metric's storage.
#[derive(Debug, Clone)]
pub enum MetricHandle {
    Counter(Arc<CounterAgg>),
    Gauge(Arc<GaugeAgg>),
    Rate(Arc<RateAgg>),
    Trend(Arc<TrendAgg>),
}

impl MetricHandle {
    #[inline]
    pub fn increment(&self, value: u64) {
        if let MetricHandle::Counter(c) = self {
            c.add(value);
        }
    }

    #[inline]
    pub fn add_bool(&self, value: bool) {
        if let MetricHandle::Rate(r) = self {
            r.add(value);
        }
    }

    #[inline]
    pub fn record(&self, value: f64) {
        if let MetricHandle::Trend(t) = self {
            t.record(value);
        }
    }

    pub fn as_gauge(&self) -> Option<&GaugeAgg> {
        match self {
            MetricHandle::Gauge(g) => Some(g),
            _ => None,
        }
    }
}
