use std::process::Command;

use anyhow::Context as _;
use zkload_testserver::{TestServer, TestServerConfig};

fn status_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

fn zkload() -> Command {
    Command::new(env!("CARGO_BIN_EXE_zkload"))
}

async fn run_against(
    base_url: String,
    results: std::path::PathBuf,
    extra: Vec<String>,
) -> anyhow::Result<std::process::Output> {
    tokio::task::spawn_blocking(move || {
        zkload()
            .arg("run")
            .arg("--base-url")
            .arg(&base_url)
            .arg("--vus")
            .arg("2")
            .arg("--iterations")
            .arg("4")
            .arg("--pause")
            .arg("0s")
            .arg("--results")
            .arg(&results)
            .arg("--output")
            .arg("json")
            .args(&extra)
            .output()
    })
    .await
    .context("spawn_blocking join")?
    .context("run zkload binary")
}

#[test]
fn invalid_flags_exit_30() -> anyhow::Result<()> {
    let out = zkload()
        .arg("run")
        .arg("--duration")
        .arg("10x")
        .output()
        .context("run zkload binary")?;

    anyhow::ensure!(
        status_code(out.status) == 30,
        "expected exit code 30, got {}\nstdout:\n{}\nstderr:\n{}",
        status_code(out.status),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );

    Ok(())
}

#[test]
fn missing_profile_exits_30() -> anyhow::Result<()> {
    let dir = tempfile::tempdir().context("create temp dir")?;

    let out = zkload()
        .arg("run")
        .arg(dir.path().join("nope.yaml"))
        .output()
        .context("run zkload binary")?;

    anyhow::ensure!(
        status_code(out.status) == 30,
        "expected exit code 30, got {}\nstdout:\n{}\nstderr:\n{}",
        status_code(out.status),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );

    Ok(())
}

#[tokio::test]
async fn healthy_run_exits_0_and_writes_results() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let dir = tempfile::tempdir().context("create temp dir")?;
    let results = dir.path().join("results.json");

    let out = run_against(server.base_url().to_string(), results.clone(), Vec::new()).await?;
    server.shutdown().await;

    anyhow::ensure!(
        status_code(out.status) == 0,
        "expected exit code 0, got {}\nstdout:\n{}\nstderr:\n{}",
        status_code(out.status),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );

    let doc: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&results).context("read results artifact")?)
            .context("parse results artifact")?;
    anyhow::ensure!(doc["kind"] == "summary", "unexpected artifact: {doc}");
    anyhow::ensure!(
        doc["checks_failed"] == false && doc["thresholds_failed"] == false,
        "unexpected verdicts: {doc}"
    );
    anyhow::ensure!(
        doc["metrics"]["http_reqs"]["value"] == 24,
        "unexpected request count: {doc}"
    );

    Ok(())
}

#[tokio::test]
async fn failing_checks_exit_10() -> anyhow::Result<()> {
    // Three systems instead of four fails a check predicate without any
    // request-level error, so only the checks gate trips.
    let server = TestServer::start_with(TestServerConfig {
        systems: 3,
        ..TestServerConfig::default()
    })
    .await
    .context("start test server")?;
    let dir = tempfile::tempdir().context("create temp dir")?;

    let out = run_against(
        server.base_url().to_string(),
        dir.path().join("results.json"),
        Vec::new(),
    )
    .await?;
    server.shutdown().await;

    anyhow::ensure!(
        status_code(out.status) == 10,
        "expected exit code 10, got {}\nstdout:\n{}\nstderr:\n{}",
        status_code(out.status),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );

    Ok(())
}

#[tokio::test]
async fn failing_thresholds_exit_11() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let dir = tempfile::tempdir().context("create temp dir")?;

    let out = run_against(
        server.base_url().to_string(),
        dir.path().join("results.json"),
        vec!["--threshold".to_string(), "http_reqs:count<1".to_string()],
    )
    .await?;
    server.shutdown().await;

    anyhow::ensure!(
        status_code(out.status) == 11,
        "expected exit code 11, got {}\nstdout:\n{}\nstderr:\n{}",
        status_code(out.status),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );

    Ok(())
}

#[tokio::test]
async fn failing_checks_and_thresholds_exit_12() -> anyhow::Result<()> {
    let server = TestServer::start_with(TestServerConfig {
        systems: 3,
        ..TestServerConfig::default()
    })
    .await
    .context("start test server")?;
    let dir = tempfile::tempdir().context("create temp dir")?;

    let out = run_against(
        server.base_url().to_string(),
        dir.path().join("results.json"),
        vec!["--threshold".to_string(), "http_reqs:count<1".to_string()],
    )
    .await?;
    server.shutdown().await;

    anyhow::ensure!(
        status_code(out.status) == 12,
        "expected exit code 12, got {}\nstdout:\n{}\nstderr:\n{}",
        status_code(out.status),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );

    Ok(())
}

#[tokio::test]
async fn yaml_profile_drives_the_run() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let dir = tempfile::tempdir().context("create temp dir")?;
    let results = dir.path().join("results.json");

    let profile_path = dir.path().join("profile.yaml");
    let profile = format!(
        "baseUrl: {}\nvus: 1\niterations: 2\npause: 1ms\nthresholds:\n  errors: rate<0.5\n",
        server.base_url()
    );
    std::fs::write(&profile_path, profile).context("write profile")?;

    let results_arg = results.clone();
    let out = tokio::task::spawn_blocking(move || {
        zkload()
            .arg("run")
            .arg(&profile_path)
            .arg("--results")
            .arg(&results_arg)
            .arg("--output")
            .arg("json")
            .output()
    })
    .await
    .context("spawn_blocking join")?
    .context("run zkload binary")?;
    server.shutdown().await;

    anyhow::ensure!(
        status_code(out.status) == 0,
        "expected exit code 0, got {}\nstdout:\n{}\nstderr:\n{}",
        status_code(out.status),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );

    let doc: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&results).context("read results artifact")?)
            .context("parse results artifact")?;
    anyhow::ensure!(
        doc["metrics"]["iterations"]["value"] == 2,
        "unexpected iteration count: {doc}"
    );

    Ok(())
}
