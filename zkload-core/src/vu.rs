use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use tokio::sync::{Barrier, Notify};

use crate::budget::IterationBudget;
use crate::error::Result;
use crate::metrics::{ActiveVuGuard, RunMetrics};
use crate::scenario::ProofScenario;
use crate::schedule::StagedSchedule;

/// Start line every spawned VU checks in at. The runner waits for the full
/// population to check in, then releases the run with a single shared start
/// instant, keeping per-VU spawn skew out of the measurement.
#[derive(Debug)]
pub struct StartLine {
    checkin: Barrier,
    released: AtomicBool,
    go: Notify,
    started: OnceLock<Instant>,
}

impl StartLine {
    /// `vus` VU tasks plus the runner check in at the line.
    pub fn new(vus: usize) -> Self {
        Self {
            checkin: Barrier::new(vus.saturating_add(1)),
            released: AtomicBool::new(false),
            go: Notify::new(),
            started: OnceLock::new(),
        }
    }

    /// VU side: check in, block until the release, learn the start instant.
    pub async fn arrive(&self) -> Instant {
        self.checkin.wait().await;
        while !self.released.load(Ordering::Acquire) {
            self.go.notified().await;
        }
        self.started.get().copied().unwrap_or_else(Instant::now)
    }

    /// Runner side: block until the whole population has checked in.
    pub async fn ready(&self) {
        self.checkin.wait().await;
    }

    /// Runner side: open the line. The start instant is published before any
    /// VU can observe the release.
    pub fn release_at(&self, started: Instant) {
        let _ = self.started.set(started);
        self.released.store(true, Ordering::Release);
        self.go.notify_waiters();
    }
}

#[derive(Debug, Clone)]
pub struct VuContext {
    pub vu_id: u64,
    pub metrics: Arc<RunMetrics>,
    pub work: VuWork,
    pub pause: Duration,
    pub start_line: Arc<StartLine>,
}

#[derive(Debug, Clone)]
pub enum VuWork {
    Constant { budget: Arc<IterationBudget> },
    Ramping { schedule: Arc<StagedSchedule> },
}

pub(crate) async fn run_vu(ctx: VuContext, scenario: Arc<ProofScenario>) -> Result<()> {
    let started = ctx.start_line.arrive().await;
    let mut iteration: u64 = 0;

    match &ctx.work {
        VuWork::Constant { budget } => {
            let _guard = ctx.metrics.enter_active_vu();
            while budget.try_claim() {
                scenario
                    .run_iteration(&ctx.metrics, ctx.vu_id, iteration)
                    .await;
                ctx.metrics.record_iteration();
                iteration += 1;
                tokio::time::sleep(ctx.pause).await;
            }
        }
        VuWork::Ramping { schedule } => {
            let mut active: Option<ActiveVuGuard> = None;
            loop {
                let elapsed = started.elapsed();
                if schedule.is_done(elapsed) {
                    break;
                }

                // A VU is active exactly while the ramp target covers its
                // index; the highest indices are the first to go idle on a
                // ramp-down, and an in-flight iteration always completes.
                let target = schedule.target_at(elapsed);
                if ctx.vu_id > target {
                    if active.take().is_some() {
                        tracing::debug!(vu = ctx.vu_id, target, "vu retiring");
                    }
                    let wait = schedule.next_recheck_in(elapsed, ctx.vu_id);
                    tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
                    continue;
                }
                if active.is_none() {
                    tracing::debug!(vu = ctx.vu_id, target, "vu activating");
                    active = Some(ctx.metrics.enter_active_vu());
                }

                scenario
                    .run_iteration(&ctx.metrics, ctx.vu_id, iteration)
                    .await;
                ctx.metrics.record_iteration();
                iteration += 1;
                tokio::time::sleep(ctx.pause).await;
            }
        }
    }

    Ok(())
}
