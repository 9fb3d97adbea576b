use std::fmt::Write as _;

use zkload_core::{Executor, RunPlan, RunReport, names};
use zkload_metrics::MetricValues;

use super::OutputFormatter;

pub(crate) struct HumanReadableOutput;

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, plan: &RunPlan) {
        println!("{}", header(plan));
        println!();
    }

    fn print_summary(&self, report: &RunReport) -> anyhow::Result<()> {
        print!("{}", render(report));

        if report.thresholds_failed() {
            eprintln!("thresholds failed:");
            for r in report.thresholds.failures() {
                match r.observed {
                    Some(obs) => eprintln!("  {}: {} (observed {obs})", r.metric, r.expression),
                    None => eprintln!("  {}: {} (missing series)", r.metric, r.expression),
                }
            }
        }

        Ok(())
    }
}

fn header(plan: &RunPlan) -> String {
    let mut out = format!("target: {}\n", plan.base_url);
    match &plan.executor {
        Executor::ConstantVus { vus } => {
            let _ = write!(out, "executor: constant vus={vus}");
            if let Some(n) = plan.iterations {
                let _ = write!(out, " iterations={n}");
            }
            if let Some(d) = plan.duration {
                let _ = write!(out, " duration={}", format_secs(d));
            }
        }
        Executor::RampingVus { start_vus, stages } => {
            let total: std::time::Duration = stages.iter().map(|s| s.duration).sum();
            let _ = write!(
                out,
                "executor: ramping startVUs={start_vus} stages={} peak={} total={}",
                stages.len(),
                plan.executor.max_vus(),
                format_secs(total)
            );
        }
    }
    out
}

fn render(report: &RunReport) -> String {
    let mut out = String::new();
    let snap = &report.metrics;

    let _ = writeln!(out, "{}", "=".repeat(60));
    let _ = writeln!(out, "  Proof Service Load Test Results");
    let _ = writeln!(out, "{}", "=".repeat(60));
    let _ = writeln!(out);

    let _ = writeln!(out, "  peak VUs ......: {}", report.peak_vus());
    let _ = writeln!(out, "  duration ......: {}", format_secs(report.wall));
    let _ = writeln!(out, "  iterations ....: {}", report.iterations_total());
    let _ = writeln!(out);

    let _ = writeln!(out, "  http_reqs .....: {}", report.requests_total());
    if let Some(t) = snap.trend(names::HTTP_REQ_DURATION) {
        let _ = writeln!(
            out,
            "  http_req_duration: avg={} p95={} p99={} max={}",
            format_ms(t.avg),
            format_ms(t.p95),
            format_ms(t.p99),
            format_ms(t.max)
        );
    }
    let _ = writeln!(
        out,
        "  http_req_failed: {}",
        format_pct(snap.rate(names::HTTP_REQ_FAILED))
    );
    let _ = writeln!(out, "  errors ........: {}", format_pct(snap.rate(names::ERRORS)));
    let _ = writeln!(out);

    for name in [names::PROOF_GENERATION_TIME, names::VERIFICATION_TIME] {
        if let Some(t) = snap.trend(name) {
            let _ = writeln!(
                out,
                "  {name}: count={} avg={} p95={}",
                t.count,
                format_ms(t.avg),
                format_ms(t.p95)
            );
        }
    }

    let checks: Vec<_> = snap
        .metrics
        .iter()
        .filter_map(|m| {
            let label = m.name.strip_prefix("check:")?;
            match m.values {
                MetricValues::Rate { total, trues, .. } => Some((label, total, trues)),
                _ => None,
            }
        })
        .collect();

    if !checks.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "  checks:");
        for (label, total, trues) in checks {
            let mark = if trues == total { '\u{2713}' } else { '\u{2717}' };
            let _ = writeln!(out, "    {mark} {label}: {trues}/{total}");
        }
    }

    let _ = writeln!(out);
    out
}

fn format_secs(d: std::time::Duration) -> String {
    format!("{:.1}s", d.as_secs_f64())
}

fn format_ms(v: Option<f64>) -> String {
    match v {
        Some(v) => format!("{v:.2}ms"),
        None => "-".to_string(),
    }
}

fn format_pct(rate: Option<f64>) -> String {
    match rate {
        Some(r) => format!("{:.2}%", r * 100.0),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use zkload_core::Evaluation;
    use zkload_metrics::{MetricKind, MetricSummary, Snapshot, TrendSummary};

    #[test]
    fn header_spells_out_configured_limits() {
        let mut plan = RunPlan::standard("http://localhost:8080".to_string(), String::new());
        plan.executor = Executor::ConstantVus { vus: 2 };
        plan.iterations = Some(10);

        let text = header(&plan);
        assert!(text.contains("vus=2"));
        assert!(text.contains("iterations=10"));
        assert!(!text.contains("Some("));
        assert!(!text.contains("None"));

        plan.iterations = None;
        plan.duration = Some(Duration::from_secs(30));
        let text = header(&plan);
        assert!(text.contains("duration=30.0s"));
        assert!(!text.contains("iterations="));
    }

    #[test]
    fn render_lists_checks_with_verdict_marks() {
        let report = RunReport {
            wall: Duration::from_secs(2),
            metrics: Snapshot {
                metrics: vec![
                    MetricSummary {
                        name: "check:health check status is 200".to_string(),
                        kind: MetricKind::Rate,
                        values: MetricValues::Rate {
                            total: 4,
                            trues: 4,
                            rate: Some(1.0),
                        },
                    },
                    MetricSummary {
                        name: "check:verify proof returns valid".to_string(),
                        kind: MetricKind::Rate,
                        values: MetricValues::Rate {
                            total: 4,
                            trues: 1,
                            rate: Some(0.25),
                        },
                    },
                    MetricSummary {
                        name: "http_req_duration".to_string(),
                        kind: MetricKind::Trend,
                        values: MetricValues::Trend(TrendSummary {
                            count: 24,
                            avg: Some(12.5),
                            p95: Some(40.0),
                            ..TrendSummary::default()
                        }),
                    },
                ],
            },
            thresholds: Evaluation::default(),
            checks_failed: true,
        };

        let text = render(&report);
        assert!(text.contains("\u{2713} health check status is 200: 4/4"));
        assert!(text.contains("\u{2717} verify proof returns valid: 1/4"));
        assert!(text.contains("avg=12.50ms"));
    }
}
