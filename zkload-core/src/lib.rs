#![forbid(unsafe_code)]

mod budget;
mod config;
mod error;
mod metrics;
mod report;
mod runner;
mod scenario;
mod schedule;
mod thresholds;
mod vu;

pub use config::{
    DEFAULT_API_KEY, DEFAULT_BASE_URL, Executor, RunPlan, Stage, default_stages,
    default_thresholds,
};
pub use budget::IterationBudget;
pub use error::{Error, Result};
pub use metrics::{RunMetrics, names};
pub use report::RunReport;
pub use runner::run;
pub use scenario::ProofScenario;
pub use schedule::StagedSchedule;
pub use thresholds::{
    Evaluation, ThresholdResult, ThresholdSpec, evaluate_thresholds, parse_threshold_expr,
};
pub use vu::{StartLine, VuContext, VuWork};
