use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::agg::{CounterAgg, GaugeAgg, MetricHandle, MetricKind, RateAgg, TrendAgg};
use crate::snapshot::{MetricSummary, MetricValues, Snapshot};

/// Create-or-get metric registry keyed by name.
///
/// The first registration of a name fixes its kind; later calls for the same
/// name return the existing storage regardless of the requested kind, so a
/// name always refers to exactly one aggregator.
#[derive(Debug, Default)]
pub struct Registry {
    series: Mutex<HashMap<Arc<str>, MetricHandle>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self, name: &str, kind: MetricKind) -> MetricHandle {
        let mut series = self.series.lock();
        if let Some(existing) = series.get(name) {
            return existing.clone();
        }
        let handle = match kind {
            MetricKind::Counter => MetricHandle::Counter(Arc::new(CounterAgg::default())),
            MetricKind::Gauge => MetricHandle::Gauge(Arc::new(GaugeAgg::default())),
            MetricKind::Rate => MetricHandle::Rate(Arc::new(RateAgg::default())),
            MetricKind::Trend => MetricHandle::Trend(Arc::new(TrendAgg::new())),
        };
        series.insert(Arc::from(name), handle.clone());
        handle
    }

    pub fn snapshot(&self) -> Snapshot {
        let series = self.series.lock();
        let mut metrics: Vec<MetricSummary> = series
            .iter()
            .map(|(name, handle)| {
                let (kind, values) = match handle {
                    MetricHandle::Counter(c) => {
                        (MetricKind::Counter, MetricValues::Counter { value: c.get() })
                    }
                    MetricHandle::Gauge(g) => {
                        (MetricKind::Gauge, MetricValues::Gauge { value: g.get() })
                    }
                    MetricHandle::Rate(r) => (MetricKind::Rate, r.summarize()),
                    MetricHandle::Trend(t) => (MetricKind::Trend, t.summarize()),
                };
                MetricSummary {
                    name: name.to_string(),
                    kind,
                    values,
                }
            })
            .collect();
        metrics.sort_by(|a, b| a.name.cmp(&b.name));
        Snapshot { metrics }
    }
}
