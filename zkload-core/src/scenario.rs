use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use zkload_http::{HttpClient, HttpRequest, HttpResponse};

use crate::metrics::{RunMetrics, names};

/// The fixed iteration executed by every virtual user: health check,
/// systems listing, commitment proof generation, templates listing, then a
/// generate-and-verify round trip.
#[derive(Debug)]
pub struct ProofScenario {
    client: Arc<HttpClient>,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct HealthBody {
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SystemsBody {
    #[serde(default)]
    systems: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ProofBody {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    proof: String,
    #[serde(default)]
    verification_key: String,
}

#[derive(Debug, Deserialize)]
struct TemplatesBody {
    #[serde(default)]
    templates: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct VerifyBody {
    #[serde(default)]
    valid: bool,
}

#[derive(Debug, Serialize)]
struct ProofPayload<'a> {
    proof_system: &'a str,
    data: ProofData,
}

#[derive(Debug, Serialize)]
struct ProofData {
    #[serde(rename = "type")]
    kind: &'static str,
    value: String,
}

#[derive(Debug, Serialize)]
struct VerifyPayload<'a> {
    proof_system: &'a str,
    proof: String,
    verification_key: String,
}

#[derive(Debug)]
struct ProofArtifact {
    proof: String,
    verification_key: String,
}

impl ProofScenario {
    pub fn new(client: Arc<HttpClient>, base_url: String, api_key: String) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            api_key,
        }
    }

    pub async fn run_iteration(&self, metrics: &RunMetrics, vu_id: u64, iteration: u64) {
        self.health_check(metrics).await;
        self.list_systems(metrics).await;
        let _ = self.generate_proof(metrics, vu_id, iteration).await;
        self.list_templates(metrics).await;
        self.verify_proof(metrics, vu_id, iteration).await;
    }

    async fn health_check(&self, metrics: &RunMetrics) {
        let req = HttpRequest::get(format!("{}/health", self.base_url));
        let (res, _) = self.execute(metrics, req).await;

        let healthy = decode::<HealthBody>(&res)
            .and_then(|b| b.status)
            .is_some_and(|s| s == "healthy");
        metrics.record_check("health check status is 200", res.status == 200);
        metrics.record_check("health check returns healthy", healthy);
    }

    async fn list_systems(&self, metrics: &RunMetrics) {
        let req = HttpRequest::get(format!("{}/api/v1/systems", self.base_url))
            .header("X-API-Key", &self.api_key);
        let (res, _) = self.execute(metrics, req).await;

        let four_systems = decode::<SystemsBody>(&res).is_some_and(|b| b.systems.len() == 4);
        metrics.record_check("list systems status is 200", res.status == 200);
        metrics.record_check("list systems returns 4 systems", four_systems);
    }

    async fn generate_proof(
        &self,
        metrics: &RunMetrics,
        vu_id: u64,
        iteration: u64,
    ) -> Option<ProofArtifact> {
        let payload = ProofPayload {
            proof_system: "commitment",
            data: ProofData {
                kind: "string",
                value: format!("Test message {}-{vu_id}-{iteration}", now_millis()),
            },
        };
        let body = serde_json::to_vec(&payload).unwrap_or_default();
        let req = HttpRequest::post(format!("{}/api/v1/proofs", self.base_url), Bytes::from(body))
            .header("X-API-Key", &self.api_key)
            .header("Content-Type", "application/json");

        let (res, elapsed) = self.execute(metrics, req).await;
        let duration_ms = elapsed.as_secs_f64() * 1000.0;

        let decoded = decode::<ProofBody>(&res);
        let ok_status = res.status == 200;
        let completed = decoded
            .as_ref()
            .and_then(|b| b.status.as_deref())
            .is_some_and(|s| s == "completed");
        let fast = duration_ms < 500.0;

        metrics.record_check("commitment proof status is 200", ok_status);
        metrics.record_check("commitment proof is completed", completed);
        metrics.record_check("commitment proof < 500ms", fast);

        if ok_status && completed && fast {
            metrics.record_trend(names::PROOF_GENERATION_TIME, duration_ms);
        }

        if !ok_status {
            return None;
        }
        decoded.map(|b| ProofArtifact {
            proof: b.proof,
            verification_key: b.verification_key,
        })
    }

    async fn list_templates(&self, metrics: &RunMetrics) {
        let req = HttpRequest::get(format!("{}/api/v1/templates", self.base_url))
            .header("X-API-Key", &self.api_key);
        let (res, _) = self.execute(metrics, req).await;

        let has_templates = decode::<TemplatesBody>(&res).is_some_and(|b| !b.templates.is_empty());
        metrics.record_check("list templates status is 200", res.status == 200);
        metrics.record_check("list templates returns templates", has_templates);
    }

    async fn verify_proof(&self, metrics: &RunMetrics, vu_id: u64, iteration: u64) {
        // Verification needs a fresh artifact; if generation yields none the
        // whole step is skipped without any verify observations.
        let Some(artifact) = self.generate_proof(metrics, vu_id, iteration).await else {
            return;
        };

        let payload = VerifyPayload {
            proof_system: "commitment",
            proof: artifact.proof,
            verification_key: artifact.verification_key,
        };
        let body = serde_json::to_vec(&payload).unwrap_or_default();
        let req = HttpRequest::post(format!("{}/api/v1/verify", self.base_url), Bytes::from(body))
            .header("X-API-Key", &self.api_key)
            .header("Content-Type", "application/json");

        let (res, elapsed) = self.execute(metrics, req).await;
        let duration_ms = elapsed.as_secs_f64() * 1000.0;

        let ok_status = res.status == 200;
        let valid = decode::<VerifyBody>(&res).is_some_and(|b| b.valid);
        let fast = duration_ms < 100.0;

        metrics.record_check("verify proof status is 200", ok_status);
        metrics.record_check("verify proof returns valid", valid);
        metrics.record_check("verification < 100ms", fast);

        if ok_status && valid && fast {
            metrics.record_trend(names::VERIFICATION_TIME, duration_ms);
        }
    }

    /// Issue one request and book the request-level metrics. A transport
    /// error yields a synthetic status-0 response with an empty body, so all
    /// downstream status and body checks for the operation fail.
    async fn execute(&self, metrics: &RunMetrics, req: HttpRequest) -> (HttpResponse, Duration) {
        let started = Instant::now();
        let result = self.client.request(req).await;
        let elapsed = started.elapsed();

        match result {
            Ok(res) => {
                let failed = !(200..400).contains(&res.status);
                metrics.record_request(
                    Some(elapsed.as_secs_f64() * 1000.0),
                    failed,
                    res.status != 200,
                );
                (res, elapsed)
            }
            Err(err) => {
                tracing::debug!(
                    kind = %err.transport_error_kind(),
                    error = %err,
                    "request failed in transport"
                );
                metrics.record_request(None, true, true);
                let res = HttpResponse {
                    status: 0,
                    body: Bytes::new(),
                    headers: Vec::new(),
                };
                (res, elapsed)
            }
        }
    }
}

fn decode<T: DeserializeOwned>(res: &HttpResponse) -> Option<T> {
    match serde_json::from_slice(&res.body) {
        Ok(v) => Some(v),
        Err(err) => {
            tracing::debug!(error = %err, status = res.status, "undecodable response body");
            None
        }
    }
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
