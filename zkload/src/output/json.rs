use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write as _;

use zkload_core::{RunPlan, RunReport};
use zkload_metrics::{MetricValues, TrendSummary};

use super::OutputFormatter;

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _plan: &RunPlan) {}

    fn print_summary(&self, report: &RunReport) -> anyhow::Result<()> {
        let doc = results_document(report);
        emit_json_line(&doc);
        Ok(())
    }
}

/// The run summary as written to the results artifact and, in JSON output
/// mode, to stdout.
#[derive(Debug, Serialize)]
pub(crate) struct ResultsDocument {
    pub kind: &'static str,
    pub duration_ms: u64,
    pub peak_vus: i64,
    pub iterations: u64,
    pub requests: u64,
    pub checks_failed: bool,
    pub thresholds_failed: bool,
    pub metrics: BTreeMap<String, JsonMetric>,
    pub thresholds: Vec<JsonThreshold>,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonMetric {
    pub kind: String,
    #[serde(flatten)]
    pub values: JsonMetricValues,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum JsonMetricValues {
    Counter {
        value: u64,
    },
    Gauge {
        value: i64,
    },
    Rate {
        total: u64,
        trues: u64,
        rate: Option<f64>,
    },
    Trend {
        count: u64,
        min: Option<f64>,
        max: Option<f64>,
        avg: Option<f64>,
        p50: Option<f64>,
        p90: Option<f64>,
        p95: Option<f64>,
        p99: Option<f64>,
    },
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonThreshold {
    pub metric: String,
    pub expression: String,
    pub observed: Option<f64>,
    pub passed: bool,
}

pub(crate) fn results_document(report: &RunReport) -> ResultsDocument {
    let metrics = report
        .metrics
        .metrics
        .iter()
        .map(|m| {
            let values = match &m.values {
                MetricValues::Counter { value } => JsonMetricValues::Counter { value: *value },
                MetricValues::Gauge { value } => JsonMetricValues::Gauge { value: *value },
                MetricValues::Rate { total, trues, rate } => JsonMetricValues::Rate {
                    total: *total,
                    trues: *trues,
                    rate: *rate,
                },
                MetricValues::Trend(t) => trend_values(t),
            };
            (
                m.name.clone(),
                JsonMetric {
                    kind: m.kind.to_string(),
                    values,
                },
            )
        })
        .collect();

    let thresholds = report
        .thresholds
        .results
        .iter()
        .map(|r| JsonThreshold {
            metric: r.metric.clone(),
            expression: r.expression.clone(),
            observed: r.observed,
            passed: r.passed,
        })
        .collect();

    ResultsDocument {
        kind: "summary",
        duration_ms: report.wall.as_millis() as u64,
        peak_vus: report.peak_vus(),
        iterations: report.iterations_total(),
        requests: report.requests_total(),
        checks_failed: report.checks_failed,
        thresholds_failed: report.thresholds_failed(),
        metrics,
        thresholds,
    }
}

fn trend_values(t: &TrendSummary) -> JsonMetricValues {
    JsonMetricValues::Trend {
        count: t.count,
        min: t.min,
        max: t.max,
        avg: t.avg,
        p50: t.p50,
        p90: t.p90,
        p95: t.p95,
        p99: t.p99,
    }
}

fn emit_json_line<T: Serialize>(line: &T) {
    let mut out = std::io::stdout().lock();
    if serde_json::to_writer(&mut out, line).is_ok() {
        let _ = writeln!(out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::time::Duration;
    use zkload_metrics::{MetricKind, MetricSummary, Snapshot};

    fn sample_report() -> RunReport {
        RunReport {
            wall: Duration::from_millis(1500),
            metrics: Snapshot {
                metrics: vec![
                    MetricSummary {
                        name: "http_reqs".to_string(),
                        kind: MetricKind::Counter,
                        values: MetricValues::Counter { value: 12 },
                    },
                    MetricSummary {
                        name: "errors".to_string(),
                        kind: MetricKind::Rate,
                        values: MetricValues::Rate {
                            total: 12,
                            trues: 0,
                            rate: Some(0.0),
                        },
                    },
                ],
            },
            thresholds: zkload_core::Evaluation {
                results: vec![zkload_core::ThresholdResult {
                    metric: "errors".to_string(),
                    expression: "rate<0.1".to_string(),
                    observed: Some(0.0),
                    passed: true,
                }],
            },
            checks_failed: false,
        }
    }

    #[test]
    fn document_carries_metrics_and_verdicts() {
        let doc = results_document(&sample_report());
        let v: Value = match serde_json::to_value(&doc) {
            Ok(v) => v,
            Err(err) => panic!("to_value failed: {err}"),
        };

        assert_eq!(v.get("kind").and_then(Value::as_str), Some("summary"));
        assert_eq!(v.get("duration_ms").and_then(Value::as_u64), Some(1500));
        assert_eq!(
            v.pointer("/metrics/http_reqs/value").and_then(Value::as_u64),
            Some(12)
        );
        assert_eq!(
            v.pointer("/metrics/http_reqs/kind").and_then(Value::as_str),
            Some("counter")
        );
        assert_eq!(
            v.pointer("/metrics/errors/rate").and_then(Value::as_f64),
            Some(0.0)
        );
        assert_eq!(
            v.pointer("/thresholds/0/passed").and_then(Value::as_bool),
            Some(true)
        );
        assert_eq!(
            v.get("thresholds_failed").and_then(Value::as_bool),
            Some(false)
        );
    }
}
