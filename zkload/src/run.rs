use std::time::Duration;

use anyhow::Context as _;

use crate::cli::RunArgs;
use crate::exit_codes::ExitCode;
use crate::output;
use crate::profile_yaml::{self, ProfileYaml, YamlDuration};

use zkload_core::{
    DEFAULT_API_KEY, DEFAULT_BASE_URL, Executor, RunPlan, ThresholdSpec, default_stages,
    default_thresholds,
};

pub(crate) async fn run(args: RunArgs) -> ExitCode {
    match try_run(args).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            classify(&err)
        }
    }
}

async fn try_run(args: RunArgs) -> anyhow::Result<ExitCode> {
    let out = output::formatter(args.output);

    let profile = match &args.profile {
        Some(path) => profile_yaml::load_profile(path).await?,
        None => ProfileYaml::default(),
    };

    let plan = build_plan(&args, &profile);
    out.print_header(&plan);

    let report = zkload_core::run(plan).await?;

    let doc = output::results_document(&report);
    let json = serde_json::to_vec_pretty(&doc).context("failed to encode results document")?;
    tokio::fs::write(&args.results, json)
        .await
        .with_context(|| format!("failed to write results: {}", args.results.display()))?;

    out.print_summary(&report)?;

    Ok(ExitCode::from_quality_gates(
        report.checks_failed,
        report.thresholds_failed(),
    ))
}

/// CLI flags override the YAML profile, which overrides the standard run.
/// Any of --vus/--iterations/--duration forces a constant-VU shape;
/// --stage forces a ramping one.
fn build_plan(args: &RunArgs, profile: &ProfileYaml) -> RunPlan {
    let base_url = args
        .base_url
        .clone()
        .or_else(|| profile.base_url.clone())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    let api_key = args
        .api_key
        .clone()
        .or_else(|| profile.api_key.clone())
        .unwrap_or_else(|| DEFAULT_API_KEY.to_string());

    let pause = args
        .pause
        .or(profile.pause.map(YamlDuration::into_inner))
        .unwrap_or(Duration::from_secs(1));

    let iterations = args.iterations.or(profile.iterations);
    let duration = args
        .duration
        .or(profile.duration.map(YamlDuration::into_inner));

    let constant_forced =
        args.vus.is_some() || args.iterations.is_some() || args.duration.is_some();

    let (executor, iterations, duration) = if constant_forced {
        let vus = args.vus.or(profile.vus).unwrap_or(1);
        (Executor::ConstantVus { vus }, iterations, duration)
    } else if !args.stages.is_empty() {
        let executor = Executor::RampingVus {
            start_vus: profile.start_vus.unwrap_or(0),
            stages: args.stages.clone(),
        };
        (executor, None, None)
    } else if !profile.stages.is_empty() {
        let executor = Executor::RampingVus {
            start_vus: profile.start_vus.unwrap_or(0),
            stages: profile.stages(),
        };
        (executor, None, None)
    } else if profile.vus.is_some() || iterations.is_some() || duration.is_some() {
        let vus = profile.vus.unwrap_or(1);
        (Executor::ConstantVus { vus }, iterations, duration)
    } else {
        let executor = Executor::RampingVus {
            start_vus: 0,
            stages: default_stages(),
        };
        (executor, None, None)
    };

    let thresholds = resolve_thresholds(args, profile);

    RunPlan {
        base_url,
        api_key,
        executor,
        iterations,
        duration,
        pause,
        thresholds,
    }
}

fn resolve_thresholds(args: &RunArgs, profile: &ProfileYaml) -> Vec<ThresholdSpec> {
    if !args.thresholds.is_empty() {
        return args.thresholds.clone();
    }
    let from_profile = profile.threshold_specs();
    if !from_profile.is_empty() {
        return from_profile;
    }
    default_thresholds()
}

fn classify(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<zkload_core::Error>() {
        Some(
            zkload_core::Error::InvalidVus
            | zkload_core::Error::InvalidIterations
            | zkload_core::Error::InvalidStages
            | zkload_core::Error::InvalidBaseUrl(_)
            | zkload_core::Error::InvalidThreshold(_),
        ) => ExitCode::InvalidInput,
        Some(_) => ExitCode::RuntimeError,
        // Profile IO/parse problems are operator input too.
        None if err.is::<serde_yaml::Error>() || err.downcast_ref::<std::io::Error>().is_some() => {
            ExitCode::InvalidInput
        }
        None => ExitCode::RuntimeError,
    }
}
