#![forbid(unsafe_code)]

mod agg;
mod registry;
mod snapshot;

pub use agg::{CounterAgg, GaugeAgg, MetricHandle, MetricKind, RateAgg, TrendAgg};
pub use registry::Registry;
pub use snapshot::{MetricSummary, MetricValues, Snapshot, TrendSummary};
