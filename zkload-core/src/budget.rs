use std::sync::OnceLock;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

/// Shared iteration budget for constant-VU runs.
///
/// Every VU claims from the same countdown before starting an iteration; the
/// population drains once the countdown or the deadline is spent. With
/// neither configured the budget admits a single iteration.
#[derive(Debug)]
pub struct IterationBudget {
    remaining: AtomicI64,
    duration: Option<Duration>,
    deadline: OnceLock<Instant>,
}

impl IterationBudget {
    pub fn new(iterations: Option<u64>, duration: Option<Duration>) -> Self {
        let remaining = match (iterations, duration) {
            (Some(n), _) => n.min(i64::MAX as u64) as i64,
            (None, Some(_)) => i64::MAX,
            (None, None) => 1,
        };
        Self {
            remaining: AtomicI64::new(remaining),
            duration,
            deadline: OnceLock::new(),
        }
    }

    /// Pin the deadline to the actual run start. A duration budget that is
    /// never armed arms itself on the first claim instead.
    pub fn arm(&self, started: Instant) {
        if let Some(duration) = self.duration {
            let _ = self.deadline.set(started + duration);
        }
    }

    /// Claim one iteration; returns false once the budget is spent.
    pub fn try_claim(&self) -> bool {
        if let Some(duration) = self.duration {
            let now = Instant::now();
            let deadline = *self.deadline.get_or_init(|| now + duration);
            if now >= deadline {
                return false;
            }
        }
        self.remaining.fetch_sub(1, Ordering::Relaxed) > 0
    }
}
