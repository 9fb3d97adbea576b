use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use zkload_core::{Stage, ThresholdSpec};

pub(crate) fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 10s, 250ms, 1m)".to_string());
    }

    let number_end = s
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_digit())
        .map_or(s.len(), |(idx, _)| idx);

    if number_end == 0 {
        return Err(format!(
            "invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"
        ));
    }

    let (number_str, unit_str) = s.split_at(number_end);
    let value: u64 = number_str
        .parse()
        .map_err(|_| format!("invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"))?;

    let unit = unit_str.trim();
    match unit {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => Ok(Duration::from_secs(value)),
        "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => {
            Ok(Duration::from_millis(value))
        }
        "m" | "min" | "mins" | "minute" | "minutes" => {
            let secs = value
                .checked_mul(60)
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        "h" | "hr" | "hrs" | "hour" | "hours" => {
            let secs = value
                .checked_mul(60)
                .and_then(|v| v.checked_mul(60))
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        _ => Err(format!(
            "invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"
        )),
    }
}

/// `DURATION:TARGET`, e.g. `30s:10`.
pub(crate) fn parse_stage(input: &str) -> Result<Stage, String> {
    let (duration_str, target_str) = input
        .split_once(':')
        .ok_or_else(|| format!("invalid stage '{input}' (expected DURATION:TARGET, e.g. 30s:10)"))?;

    let duration = parse_duration(duration_str)?;
    let target: u64 = target_str
        .trim()
        .parse()
        .map_err(|_| format!("invalid stage target '{target_str}' (expected an integer)"))?;

    Ok(Stage { duration, target })
}

/// `METRIC:EXPRESSION`, e.g. `http_req_duration:p(95)<5000`.
pub(crate) fn parse_threshold(input: &str) -> Result<ThresholdSpec, String> {
    let (metric, expression) = input.split_once(':').ok_or_else(|| {
        format!("invalid threshold '{input}' (expected METRIC:EXPRESSION, e.g. errors:rate<0.1)")
    })?;

    let metric = metric.trim();
    let expression = expression.trim();
    if metric.is_empty() || expression.is_empty() {
        return Err(format!(
            "invalid threshold '{input}' (expected METRIC:EXPRESSION, e.g. errors:rate<0.1)"
        ));
    }

    Ok(ThresholdSpec {
        metric: metric.to_string(),
        expression: expression.to_string(),
    })
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary.
    HumanReadable,
    /// Machine-readable summary document on stdout.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "zkload",
    author,
    version,
    about = "Load generator and CI gate for ZK-proof service APIs",
    long_about = "zkload drives a staged population of virtual users against a proof service HTTP API, streams request and check metrics, and evaluates threshold expressions over the final aggregates.\n\nWith no profile it reproduces the standard ramp (10 -> 50 -> 100 users over 6 minutes) and quality gates.",
    after_help = "Examples:\n  zkload run\n  zkload run --base-url http://localhost:8080 --vus 20 --duration 1m\n  zkload run profile.yaml --threshold 'errors:rate<0.01'\n  zkload run --stage 30s:10 --stage 1m:10 --stage 30s:0\n\nExit codes: 0 ok, 10 checks failed, 11 thresholds failed, 12 both, 30 invalid input, 40 runtime error."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a load test against a proof service
    #[command(
        long_about = "Run a load test. A YAML profile (if given) configures the run; CLI flags override the profile, and --vus/--duration/--iterations force a constant-VU run shape over a ramping one."
    )]
    Run(RunArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Optional YAML profile (stages, thresholds, target, pacing)
    pub profile: Option<PathBuf>,

    /// Base URL of the proof service (default: http://localhost:8080)
    #[arg(long, env = "BASE_URL")]
    pub base_url: Option<String>,

    /// API key sent as X-API-Key on authenticated routes
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Number of virtual users (forces a constant-VU run)
    #[arg(long)]
    pub vus: Option<u64>,

    /// Test duration for a constant-VU run (e.g. 10s, 250ms, 1m)
    #[arg(long, value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Total iterations across all VUs (forces a constant-VU run)
    #[arg(long)]
    pub iterations: Option<u64>,

    /// Ramping stage as DURATION:TARGET (repeatable, e.g. --stage 30s:10)
    #[arg(long = "stage", value_name = "DURATION:TARGET", value_parser = parse_stage)]
    pub stages: Vec<Stage>,

    /// Threshold as METRIC:EXPRESSION (repeatable, e.g. --threshold 'errors:rate<0.1')
    #[arg(long = "threshold", value_name = "METRIC:EXPRESSION", value_parser = parse_threshold)]
    pub thresholds: Vec<ThresholdSpec>,

    /// Pause between iterations on each VU (default: 1s)
    #[arg(long, value_parser = parse_duration)]
    pub pause: Option<Duration>,

    /// Path of the JSON results artifact
    #[arg(long, default_value = "load-test-results.json")]
    pub results: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_accepts_common_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("10s"), Ok(Duration::from_secs(10)));
        assert_eq!(parse_duration("1m"), Ok(Duration::from_secs(60)));
        assert_eq!(parse_duration("2h"), Ok(Duration::from_secs(2 * 60 * 60)));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("10x").is_err());
    }

    #[test]
    fn parse_stage_splits_duration_and_target() {
        assert_eq!(
            parse_stage("30s:10"),
            Ok(Stage {
                duration: Duration::from_secs(30),
                target: 10
            })
        );
        assert!(parse_stage("30s").is_err());
        assert!(parse_stage("30s:abc").is_err());
    }

    #[test]
    fn parse_threshold_splits_on_first_colon() {
        let spec = parse_threshold("errors:rate<0.1").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(spec.metric, "errors");
        assert_eq!(spec.expression, "rate<0.1");

        // Expressions may themselves contain separators.
        let spec =
            parse_threshold("http_req_duration:p(95)<5000").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(spec.expression, "p(95)<5000");

        assert!(parse_threshold("no-expression").is_err());
        assert!(parse_threshold(":rate<0.1").is_err());
    }

    #[test]
    fn cli_parses_run_with_overrides() {
        let parsed = Cli::try_parse_from([
            "zkload",
            "run",
            "profile.yaml",
            "--vus",
            "2",
            "--duration",
            "250ms",
            "--stage",
            "30s:10",
            "--threshold",
            "errors:rate<0.1",
            "--pause",
            "0s",
            "--output",
            "json",
        ]);

        let cli = match parsed {
            Ok(v) => v,
            Err(err) => panic!("failed to parse args: {err}"),
        };

        let Command::Run(args) = cli.command;
        assert_eq!(args.profile, Some(PathBuf::from("profile.yaml")));
        assert_eq!(args.vus, Some(2));
        assert_eq!(args.duration, Some(Duration::from_millis(250)));
        assert_eq!(args.stages.len(), 1);
        assert_eq!(args.thresholds.len(), 1);
        assert_eq!(args.pause, Some(Duration::ZERO));
        assert!(matches!(args.output, OutputFormat::Json));
    }
}
