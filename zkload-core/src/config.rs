use std::time::Duration;

use crate::error::{Error, Result};
use crate::thresholds::{ThresholdSpec, parse_threshold_expr};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_API_KEY: &str = "test_zapiki_key_1230ab3c044056686e2552fb5a2648cd";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    pub target: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Executor {
    ConstantVus { vus: u64 },
    RampingVus { start_vus: u64, stages: Vec<Stage> },
}

impl Executor {
    pub fn max_vus(&self) -> u64 {
        match self {
            Executor::ConstantVus { vus } => *vus,
            Executor::RampingVus { start_vus, stages } => {
                let max_stage = stages.iter().map(|s| s.target).max().unwrap_or(0);
                max_stage.max(*start_vus)
            }
        }
    }
}

/// Everything the runner needs for one run.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub base_url: String,
    pub api_key: String,
    pub executor: Executor,
    /// Constant mode only: stop after this many iterations across all VUs.
    pub iterations: Option<u64>,
    /// Constant mode only: stop after this wall time.
    pub duration: Option<Duration>,
    /// Sleep between iterations on each VU.
    pub pause: Duration,
    pub thresholds: Vec<ThresholdSpec>,
}

impl RunPlan {
    /// The profile and gates used when nothing else is configured:
    /// a ramp to 10, 50, then 100 concurrent users with holds in between,
    /// p95 latency under 5s, error rate under 10%, failed requests under 5%.
    pub fn standard(base_url: String, api_key: String) -> Self {
        Self {
            base_url,
            api_key,
            executor: Executor::RampingVus {
                start_vus: 0,
                stages: default_stages(),
            },
            iterations: None,
            duration: None,
            pause: Duration::from_secs(1),
            thresholds: default_thresholds(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.base_url)
            .map_err(|_| Error::InvalidBaseUrl(self.base_url.clone()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(Error::InvalidBaseUrl(self.base_url.clone()));
        }

        match &self.executor {
            Executor::ConstantVus { vus } => {
                if *vus == 0 {
                    return Err(Error::InvalidVus);
                }
                if self.iterations == Some(0) {
                    return Err(Error::InvalidIterations);
                }
                if self.iterations.is_none() && self.duration.is_none() {
                    return Err(Error::InvalidIterations);
                }
            }
            Executor::RampingVus { stages, .. } => {
                if stages.is_empty() {
                    return Err(Error::InvalidStages);
                }
                let total = stages
                    .iter()
                    .fold(Duration::ZERO, |acc, s| acc.saturating_add(s.duration));
                if total.is_zero() {
                    return Err(Error::InvalidStages);
                }
                if self.executor.max_vus() == 0 {
                    return Err(Error::InvalidVus);
                }
            }
        }

        // Surface malformed threshold expressions before any load is generated.
        for spec in &self.thresholds {
            parse_threshold_expr(&spec.expression)?;
        }

        Ok(())
    }
}

pub fn default_stages() -> Vec<Stage> {
    let s = |secs: u64, target: u64| Stage {
        duration: Duration::from_secs(secs),
        target,
    };
    vec![
        s(30, 10),
        s(60, 10),
        s(30, 50),
        s(120, 50),
        s(30, 100),
        s(60, 100),
        s(30, 0),
    ]
}

pub fn default_thresholds() -> Vec<ThresholdSpec> {
    vec![
        ThresholdSpec {
            metric: "http_req_duration".to_string(),
            expression: "p(95)<5000".to_string(),
        },
        ThresholdSpec {
            metric: "errors".to_string(),
            expression: "rate<0.1".to_string(),
        },
        ThresholdSpec {
            metric: "http_req_failed".to_string(),
            expression: "rate<0.05".to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_plan_validates() {
        let plan = RunPlan::standard(DEFAULT_BASE_URL.to_string(), DEFAULT_API_KEY.to_string());
        assert!(plan.validate().is_ok());
        assert_eq!(plan.executor.max_vus(), 100);
    }

    #[test]
    fn constant_without_gates_is_rejected() {
        let mut plan = RunPlan::standard(DEFAULT_BASE_URL.to_string(), String::new());
        plan.executor = Executor::ConstantVus { vus: 5 };
        assert!(matches!(plan.validate(), Err(Error::InvalidIterations)));

        plan.iterations = Some(10);
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn zero_vus_is_rejected() {
        let mut plan = RunPlan::standard(DEFAULT_BASE_URL.to_string(), String::new());
        plan.executor = Executor::ConstantVus { vus: 0 };
        plan.iterations = Some(1);
        assert!(matches!(plan.validate(), Err(Error::InvalidVus)));
    }

    #[test]
    fn empty_or_zero_length_stages_are_rejected() {
        let mut plan = RunPlan::standard(DEFAULT_BASE_URL.to_string(), String::new());
        plan.executor = Executor::RampingVus {
            start_vus: 0,
            stages: Vec::new(),
        };
        assert!(matches!(plan.validate(), Err(Error::InvalidStages)));

        plan.executor = Executor::RampingVus {
            start_vus: 0,
            stages: vec![Stage {
                duration: Duration::ZERO,
                target: 10,
            }],
        };
        assert!(matches!(plan.validate(), Err(Error::InvalidStages)));
    }

    #[test]
    fn non_http_base_url_is_rejected() {
        let mut plan = RunPlan::standard("ftp://example.com".to_string(), String::new());
        plan.iterations = Some(1);
        assert!(matches!(plan.validate(), Err(Error::InvalidBaseUrl(_))));
    }
}
