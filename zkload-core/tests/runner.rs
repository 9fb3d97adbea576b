use std::time::Duration;

use anyhow::Context as _;
use zkload_core::{Error, Executor, RunPlan, Stage, ThresholdSpec, names, run};
use zkload_testserver::{TestServer, TestServerConfig};

fn plan_against(base_url: &str) -> RunPlan {
    let mut plan = RunPlan::standard(base_url.to_string(), String::new());
    plan.pause = Duration::ZERO;
    plan
}

#[tokio::test]
async fn constant_run_passes_quality_gates() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;

    let mut plan = plan_against(server.base_url());
    plan.executor = Executor::ConstantVus { vus: 3 };
    plan.iterations = Some(6);

    let report = run(plan).await.context("run")?;
    server.shutdown().await;

    assert!(!report.checks_failed);
    assert!(!report.thresholds_failed());
    assert_eq!(report.peak_vus(), 3);
    assert_eq!(report.iterations_total(), 6);
    // Six requests per iteration.
    assert_eq!(report.requests_total(), 36);
    assert_eq!(report.metrics.rate(names::HTTP_REQ_FAILED), Some(0.0));

    Ok(())
}

#[tokio::test]
async fn ramping_run_drains_and_reports_peak() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;

    let mut plan = plan_against(server.base_url());
    plan.executor = Executor::RampingVus {
        start_vus: 0,
        stages: vec![
            Stage {
                duration: Duration::from_millis(300),
                target: 2,
            },
            Stage {
                duration: Duration::from_millis(300),
                target: 0,
            },
        ],
    };

    let report = run(plan).await.context("run")?;
    server.shutdown().await;

    assert!(report.wall >= Duration::from_millis(600));
    assert!(report.peak_vus() <= 2);
    // Every VU retired once the profile completed.
    assert_eq!(report.metrics.gauge(names::VUS), Some(0));
    assert!(!report.thresholds_failed());

    Ok(())
}

#[tokio::test]
async fn failing_checks_are_reflected_in_the_report() -> anyhow::Result<()> {
    let server = TestServer::start_with(TestServerConfig {
        systems: 3,
        ..TestServerConfig::default()
    })
    .await
    .context("start test server")?;

    let mut plan = plan_against(server.base_url());
    plan.executor = Executor::ConstantVus { vus: 1 };
    plan.iterations = Some(1);

    let report = run(plan).await.context("run")?;
    server.shutdown().await;

    assert!(report.checks_failed);
    // HTTP-level thresholds still pass; only the predicate failed.
    assert!(!report.thresholds_failed());

    Ok(())
}

#[tokio::test]
async fn unsatisfiable_threshold_fails_the_run() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;

    let mut plan = plan_against(server.base_url());
    plan.executor = Executor::ConstantVus { vus: 1 };
    plan.iterations = Some(1);
    plan.thresholds = vec![ThresholdSpec {
        metric: names::HTTP_REQS.to_string(),
        expression: "count<1".to_string(),
    }];

    let report = run(plan).await.context("run")?;
    server.shutdown().await;

    assert!(report.thresholds_failed());
    let failure = report
        .thresholds
        .failures()
        .next()
        .context("expected a threshold failure")?;
    assert_eq!(failure.metric, names::HTTP_REQS);
    assert_eq!(failure.observed, Some(6.0));

    Ok(())
}

#[tokio::test]
async fn invalid_plans_are_rejected_before_any_load() {
    let mut plan = plan_against("http://127.0.0.1:1");
    plan.executor = Executor::ConstantVus { vus: 0 };
    plan.iterations = Some(1);
    assert!(matches!(run(plan).await, Err(Error::InvalidVus)));

    let mut plan = plan_against("http://127.0.0.1:1");
    plan.thresholds = vec![ThresholdSpec {
        metric: "errors".to_string(),
        expression: "median<5".to_string(),
    }];
    assert!(matches!(run(plan).await, Err(Error::InvalidThreshold(_))));
}
