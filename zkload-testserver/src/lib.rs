//! In-process mock of the proof service HTTP API, for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::sleep;

pub const PATH_HEALTH: &str = "/health";
pub const PATH_SYSTEMS: &str = "/api/v1/systems";
pub const PATH_PROOFS: &str = "/api/v1/proofs";
pub const PATH_TEMPLATES: &str = "/api/v1/templates";
pub const PATH_VERIFY: &str = "/api/v1/verify";

/// Behavior knobs, fixed at server start.
#[derive(Debug, Clone)]
pub struct TestServerConfig {
    /// Number of entries returned from the systems listing.
    pub systems: usize,
    /// Number of entries returned from the templates listing.
    pub templates: usize,
    /// When set, protected routes reject requests without a matching X-API-Key.
    pub api_key: Option<String>,
    /// Respond 500 to proof generation requests.
    pub fail_proofs: bool,
    /// Respond 200 to proof generation with an undecodable body.
    pub malformed_proofs: bool,
    /// Report every submitted proof as invalid.
    pub invalid_verify: bool,
    /// Artificial latency added to proof generation.
    pub proof_delay: Option<Duration>,
}

impl Default for TestServerConfig {
    fn default() -> Self {
        Self {
            systems: 4,
            templates: 3,
            api_key: None,
            fail_proofs: false,
            malformed_proofs: false,
            invalid_verify: false,
            proof_delay: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    requests_total: Arc<AtomicU64>,
    proofs_generated: Arc<AtomicU64>,
    verifications: Arc<AtomicU64>,
}

impl TestServerStats {
    fn inc_requests_total(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_proofs_generated(&self) {
        self.proofs_generated.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_verifications(&self) {
        self.verifications.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn proofs_generated(&self) -> u64 {
        self.proofs_generated.load(Ordering::Relaxed)
    }

    pub fn verifications(&self) -> u64 {
        self.verifications.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
struct AppState {
    config: Arc<TestServerConfig>,
    stats: TestServerStats,
}

impl AppState {
    fn authorized(&self, headers: &HeaderMap) -> bool {
        match &self.config.api_key {
            None => true,
            Some(key) => {
                headers.get("x-api-key").and_then(|v| v.to_str().ok()) == Some(key.as_str())
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct SystemsResponse {
    systems: Vec<SystemEntry>,
}

#[derive(Debug, Serialize)]
struct SystemEntry {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ProofRequest {
    proof_system: String,
    #[allow(dead_code)]
    data: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ProofResponse {
    status: &'static str,
    proof_system: String,
    proof: String,
    verification_key: String,
}

#[derive(Debug, Serialize)]
struct TemplatesResponse {
    templates: Vec<TemplateEntry>,
}

#[derive(Debug, Serialize)]
struct TemplateEntry {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct VerifyRequest {
    #[allow(dead_code)]
    proof_system: String,
    proof: String,
    verification_key: String,
}

#[derive(Debug, Serialize)]
struct VerifyResponse {
    valid: bool,
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> (StatusCode, Bytes) {
    match serde_json::to_vec(value) {
        Ok(bytes) => (status, Bytes::from(bytes)),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Bytes::from_static(b"encode error"),
        ),
    }
}

async fn handle_health(State(state): State<AppState>) -> (StatusCode, Bytes) {
    state.stats.inc_requests_total();
    json_response(StatusCode::OK, &HealthResponse { status: "healthy" })
}

async fn handle_systems(State(state): State<AppState>, headers: HeaderMap) -> (StatusCode, Bytes) {
    state.stats.inc_requests_total();
    if !state.authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Bytes::from_static(b"unauthorized"));
    }

    let systems = (0..state.config.systems)
        .map(|i| SystemEntry {
            id: format!("sys-{i}"),
            name: format!("system-{i}"),
        })
        .collect();
    json_response(StatusCode::OK, &SystemsResponse { systems })
}

async fn handle_proofs(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Bytes) {
    state.stats.inc_requests_total();
    if !state.authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Bytes::from_static(b"unauthorized"));
    }

    if let Some(delay) = state.config.proof_delay {
        sleep(delay).await;
    }
    if state.config.fail_proofs {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Bytes::from_static(b"proof backend unavailable"),
        );
    }
    if state.config.malformed_proofs {
        return (StatusCode::OK, Bytes::from_static(b"not json at all"));
    }

    let req: ProofRequest = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => return (StatusCode::BAD_REQUEST, Bytes::from_static(b"bad json")),
    };

    state.stats.inc_proofs_generated();
    let n = state.stats.proofs_generated();
    json_response(
        StatusCode::OK,
        &ProofResponse {
            status: "completed",
            proof_system: req.proof_system,
            proof: format!("proof-{n:08x}"),
            verification_key: format!("vk-{n:08x}"),
        },
    )
}

async fn handle_templates(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> (StatusCode, Bytes) {
    state.stats.inc_requests_total();
    if !state.authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Bytes::from_static(b"unauthorized"));
    }

    let templates = (0..state.config.templates)
        .map(|i| TemplateEntry {
            id: format!("tpl-{i}"),
            name: format!("template-{i}"),
        })
        .collect();
    json_response(StatusCode::OK, &TemplatesResponse { templates })
}

async fn handle_verify(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Bytes) {
    state.stats.inc_requests_total();
    if !state.authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Bytes::from_static(b"unauthorized"));
    }

    let req: VerifyRequest = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => return (StatusCode::BAD_REQUEST, Bytes::from_static(b"bad json")),
    };

    state.stats.inc_verifications();
    let valid = !state.config.invalid_verify
        && req.proof.starts_with("proof-")
        && req.verification_key.starts_with("vk-");
    json_response(StatusCode::OK, &VerifyResponse { valid })
}

pub fn router(config: TestServerConfig, stats: TestServerStats) -> Router {
    let state = AppState {
        config: Arc::new(config),
        stats,
    };
    Router::new()
        .route(PATH_HEALTH, get(handle_health))
        .route(PATH_SYSTEMS, get(handle_systems))
        .route(PATH_PROOFS, post(handle_proofs))
        .route(PATH_TEMPLATES, get(handle_templates))
        .route(PATH_VERIFY, post(handle_verify))
        .with_state(state)
}

pub struct TestServer {
    addr: SocketAddr,
    base_url: String,
    stats: TestServerStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        Self::start_with(TestServerConfig::default()).await
    }

    pub async fn start_with(config: TestServerConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();
        let app = router(config, stats.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        Ok(Self {
            addr,
            base_url: format!("http://{addr}"),
            stats,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}
