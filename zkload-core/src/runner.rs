use std::sync::Arc;
use std::time::Instant;

use zkload_http::HttpClient;

use crate::budget::IterationBudget;
use crate::config::{Executor, RunPlan};
use crate::error::Result;
use crate::metrics::RunMetrics;
use crate::report::RunReport;
use crate::scenario::ProofScenario;
use crate::schedule::StagedSchedule;
use crate::thresholds::evaluate_thresholds;
use crate::vu::{StartLine, VuContext, VuWork, run_vu};

/// Execute a full load run: spawn every VU the plan can need, open the start
/// line once all are ready, wait for the population to drain, then evaluate
/// thresholds over the final snapshot.
pub async fn run(plan: RunPlan) -> Result<RunReport> {
    plan.validate()?;

    let client = Arc::new(HttpClient::default());
    let metrics = Arc::new(RunMetrics::new());
    let scenario = Arc::new(ProofScenario::new(
        client,
        plan.base_url.clone(),
        plan.api_key.clone(),
    ));

    let max_vus = plan.executor.max_vus();
    let total_vus = max_vus.min(usize::MAX as u64) as usize;

    let mut budget: Option<Arc<IterationBudget>> = None;
    let work = match &plan.executor {
        Executor::ConstantVus { .. } => {
            let b = Arc::new(IterationBudget::new(plan.iterations, plan.duration));
            budget = Some(b.clone());
            VuWork::Constant { budget: b }
        }
        Executor::RampingVus { start_vus, stages } => VuWork::Ramping {
            schedule: Arc::new(StagedSchedule::new(*start_vus, stages.clone())),
        },
    };

    let start_line = Arc::new(StartLine::new(total_vus));

    let mut handles = Vec::with_capacity(total_vus);
    for vu_id in 1..=max_vus {
        let ctx = VuContext {
            vu_id,
            metrics: metrics.clone(),
            work: work.clone(),
            pause: plan.pause,
            start_line: start_line.clone(),
        };
        handles.push(tokio::spawn(run_vu(ctx, scenario.clone())));
    }

    // Block until every VU is parked at the start line, then start timing.
    start_line.ready().await;
    let started = Instant::now();
    if let Some(budget) = &budget {
        budget.arm(started);
    }
    start_line.release_at(started);

    for h in handles {
        h.await??;
    }

    let wall = started.elapsed();
    let snapshot = metrics.snapshot();
    let thresholds = evaluate_thresholds(&snapshot, &plan.thresholds)?;
    let checks_failed = metrics.checks_failed();

    Ok(RunReport {
        wall,
        metrics: snapshot,
        thresholds,
        checks_failed,
    })
}
