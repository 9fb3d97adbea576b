use zkload_metrics::{MetricValues, Snapshot};

use crate::error::{Error, Result};

/// One configured threshold: a metric name plus a k6-style expression
/// such as `p(95)<5000` or `rate<0.1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdSpec {
    pub metric: String,
    pub expression: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdOp {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThresholdAgg {
    Avg,
    Min,
    Max,
    Count,
    Rate,
    P(u32),
}

#[derive(Debug, Clone)]
pub struct ThresholdExpr {
    pub agg: ThresholdAgg,
    pub op: ThresholdOp,
    pub value: f64,
}

#[derive(Debug, Clone)]
pub struct ThresholdResult {
    pub metric: String,
    pub expression: String,
    /// The aggregated value the expression was compared against. `None` when
    /// the metric is missing or the aggregation does not apply to its kind;
    /// such results always count as failed.
    pub observed: Option<f64>,
    pub passed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub results: Vec<ThresholdResult>,
}

impl Evaluation {
    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ThresholdResult> {
        self.results.iter().filter(|r| !r.passed)
    }
}

pub fn parse_threshold_expr(raw: &str) -> Result<ThresholdExpr> {
    let s: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if s.is_empty() {
        return Err(Error::InvalidThreshold("empty expression".to_string()));
    }

    let ops = [
        ("<=", ThresholdOp::Lte),
        (">=", ThresholdOp::Gte),
        ("==", ThresholdOp::Eq),
        ("<", ThresholdOp::Lt),
        (">", ThresholdOp::Gt),
    ];
    let (op_pos, op_len, op) = ops
        .iter()
        .find_map(|(tok, op)| s.find(tok).map(|pos| (pos, tok.len(), *op)))
        .ok_or_else(|| Error::InvalidThreshold(format!("missing operator: {raw}")))?;

    let (left, right_with_op) = s.split_at(op_pos);
    let right = &right_with_op[op_len..];
    if left.is_empty() || right.is_empty() {
        return Err(Error::InvalidThreshold(raw.to_string()));
    }

    let agg = if left.eq_ignore_ascii_case("avg") {
        ThresholdAgg::Avg
    } else if left.eq_ignore_ascii_case("min") {
        ThresholdAgg::Min
    } else if left.eq_ignore_ascii_case("max") {
        ThresholdAgg::Max
    } else if left.eq_ignore_ascii_case("count") {
        ThresholdAgg::Count
    } else if left.eq_ignore_ascii_case("rate") {
        ThresholdAgg::Rate
    } else if let Some(inner) = left.strip_prefix("p(").and_then(|v| v.strip_suffix(')')) {
        let p: u32 = inner
            .parse()
            .map_err(|_| Error::InvalidThreshold(format!("invalid percentile: {raw}")))?;
        if !(1..=100).contains(&p) {
            return Err(Error::InvalidThreshold(format!(
                "percentile out of range: {raw}"
            )));
        }
        ThresholdAgg::P(p)
    } else {
        return Err(Error::InvalidThreshold(format!(
            "unknown aggregation `{left}`: {raw}"
        )));
    };

    let value: f64 = right
        .parse()
        .map_err(|_| Error::InvalidThreshold(format!("invalid numeric value: {raw}")))?;

    Ok(ThresholdExpr { agg, op, value })
}

pub fn evaluate_thresholds(snapshot: &Snapshot, specs: &[ThresholdSpec]) -> Result<Evaluation> {
    let mut results = Vec::with_capacity(specs.len());

    for spec in specs {
        let expr = parse_threshold_expr(&spec.expression)?;
        let observed = snapshot
            .get(&spec.metric)
            .and_then(|m| observed_value(&m.values, &expr.agg));
        let passed = observed
            .map(|v| compare(v, expr.op, expr.value))
            .unwrap_or(false);
        results.push(ThresholdResult {
            metric: spec.metric.clone(),
            expression: spec.expression.clone(),
            observed,
            passed,
        });
    }

    Ok(Evaluation { results })
}

fn compare(left: f64, op: ThresholdOp, right: f64) -> bool {
    match op {
        ThresholdOp::Lt => left < right,
        ThresholdOp::Lte => left <= right,
        ThresholdOp::Gt => left > right,
        ThresholdOp::Gte => left >= right,
        ThresholdOp::Eq => left == right,
    }
}

fn observed_value(values: &MetricValues, agg: &ThresholdAgg) -> Option<f64> {
    match (values, agg) {
        (MetricValues::Trend(t), ThresholdAgg::Avg) => t.avg,
        (MetricValues::Trend(t), ThresholdAgg::Min) => t.min,
        (MetricValues::Trend(t), ThresholdAgg::Max) => t.max,
        (MetricValues::Trend(t), ThresholdAgg::Count) => Some(t.count as f64),
        (MetricValues::Trend(t), ThresholdAgg::P(p)) => match *p {
            50 => t.p50,
            90 => t.p90,
            95 => t.p95,
            99 => t.p99,
            // Only the common percentiles are kept in the summary.
            _ => None,
        },

        (MetricValues::Counter { value }, ThresholdAgg::Count) => Some(*value as f64),
        (MetricValues::Gauge { value }, ThresholdAgg::Avg) => Some(*value as f64),
        (MetricValues::Gauge { value }, ThresholdAgg::Min) => Some(*value as f64),
        (MetricValues::Gauge { value }, ThresholdAgg::Max) => Some(*value as f64),

        (MetricValues::Rate { rate, .. }, ThresholdAgg::Rate) => *rate,
        (MetricValues::Rate { total, .. }, ThresholdAgg::Count) => Some(*total as f64),

        // Non-sensical combinations.
        (_, _) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zkload_metrics::{MetricKind, Registry};

    fn spec(metric: &str, expression: &str) -> ThresholdSpec {
        ThresholdSpec {
            metric: metric.to_string(),
            expression: expression.to_string(),
        }
    }

    #[test]
    fn parse_threshold_expr_trims_whitespace() {
        let expr = parse_threshold_expr("  avg  <=  123  ").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(expr.agg, ThresholdAgg::Avg);
        assert_eq!(expr.op, ThresholdOp::Lte);
        assert_eq!(expr.value, 123.0);
    }

    #[test]
    fn parse_threshold_expr_rejects_out_of_range_percentiles() {
        assert!(parse_threshold_expr("p(101)<1").is_err());
        assert!(parse_threshold_expr("p(0)<1").is_err());
    }

    #[test]
    fn parse_threshold_expr_rejects_garbage() {
        assert!(parse_threshold_expr("").is_err());
        assert!(parse_threshold_expr("avg").is_err());
        assert!(parse_threshold_expr("median<5").is_err());
        assert!(parse_threshold_expr("rate<abc").is_err());
    }

    #[test]
    fn error_rate_threshold_passes_and_fails() {
        let reg = Registry::new();
        let errors = reg.handle("errors", MetricKind::Rate);
        for _ in 0..16 {
            errors.add_bool(false);
        }
        for _ in 0..4 {
            errors.add_bool(true);
        }

        // Observed rate is 0.2.
        let eval = evaluate_thresholds(&reg.snapshot(), &[spec("errors", "rate<0.1")])
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(!eval.passed());
        assert_eq!(eval.results[0].observed, Some(0.2));

        let eval = evaluate_thresholds(&reg.snapshot(), &[spec("errors", "rate<0.25")])
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(eval.passed());
    }

    #[test]
    fn missing_metric_fails_explicitly() {
        let reg = Registry::new();
        let eval = evaluate_thresholds(&reg.snapshot(), &[spec("does_not_exist", "rate<0.1")])
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(!eval.passed());
        let failure = eval
            .failures()
            .next()
            .unwrap_or_else(|| panic!("expected a failure"));
        assert_eq!(failure.metric, "does_not_exist");
        assert_eq!(failure.observed, None);
    }

    #[test]
    fn inapplicable_aggregation_fails() {
        let reg = Registry::new();
        reg.handle("http_reqs", MetricKind::Counter).increment(10);

        let eval = evaluate_thresholds(&reg.snapshot(), &[spec("http_reqs", "p(95)<100")])
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(!eval.passed());
        assert_eq!(eval.results[0].observed, None);
    }

    #[test]
    fn percentile_threshold_on_trend() {
        let reg = Registry::new();
        let trend = reg.handle("http_req_duration", MetricKind::Trend);
        for v in 1..=100 {
            trend.record(v as f64);
        }

        let eval = evaluate_thresholds(
            &reg.snapshot(),
            &[spec("http_req_duration", "p(95)<5000")],
        )
        .unwrap_or_else(|e| panic!("{e}"));
        assert!(eval.passed());

        let eval = evaluate_thresholds(&reg.snapshot(), &[spec("http_req_duration", "p(95)<50")])
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(!eval.passed());
    }

    #[test]
    fn bad_expression_is_a_hard_error() {
        let reg = Registry::new();
        assert!(evaluate_thresholds(&reg.snapshot(), &[spec("m", "oops")]).is_err());
    }
}
