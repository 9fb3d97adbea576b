use crate::agg::MetricKind;

/// Summarized values of a single metric at snapshot time.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValues {
    Counter { value: u64 },
    Gauge { value: i64 },
    Rate { total: u64, trues: u64, rate: Option<f64> },
    Trend(TrendSummary),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrendSummary {
    pub count: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub avg: Option<f64>,
    pub p50: Option<f64>,
    pub p90: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct MetricSummary {
    pub name: String,
    pub kind: MetricKind,
    pub values: MetricValues,
}

/// Point-in-time view of every registered metric, sorted by name.
///
/// Each metric's values are internally consistent; the snapshot as a whole
/// is not atomic across metrics.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub metrics: Vec<MetricSummary>,
}

impl Snapshot {
    pub fn get(&self, name: &str) -> Option<&MetricSummary> {
        self.metrics.iter().find(|m| m.name == name)
    }

    pub fn counter(&self, name: &str) -> Option<u64> {
        match self.get(name)?.values {
            MetricValues::Counter { value } => Some(value),
            _ => None,
        }
    }

    pub fn gauge(&self, name: &str) -> Option<i64> {
        match self.get(name)?.values {
            MetricValues::Gauge { value } => Some(value),
            _ => None,
        }
    }

    pub fn rate(&self, name: &str) -> Option<f64> {
        match self.get(name)?.values {
            MetricValues::Rate { rate, .. } => rate,
            _ => None,
        }
    }

    pub fn trend(&self, name: &str) -> Option<&TrendSummary> {
        match &self.get(name)?.values {
            MetricValues::Trend(t) => Some(t),
            _ => None,
        }
    }
}
