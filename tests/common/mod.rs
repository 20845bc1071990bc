//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode, Uri},
    routing::get,
    Json, Router,
};
use edge_gateway::config::{BackendConfig, GatewayConfig};
use edge_gateway::lifecycle::Shutdown;
use edge_gateway::load_balancer::BackendRegistry;
use edge_gateway::observability::PrometheusTelemetry;
use edge_gateway::GatewayServer;
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// Handle to a mock backend whose health endpoint can be flipped.
#[derive(Clone)]
pub struct MockBackend {
    pub addr: SocketAddr,
    pub name: &'static str,
    healthy: Arc<AtomicBool>,
}

impl MockBackend {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }
}

#[derive(Clone)]
struct MockState {
    name: &'static str,
    healthy: Arc<AtomicBool>,
}

async fn mock_health(State(state): State<MockState>) -> StatusCode {
    if state.healthy.load(Ordering::SeqCst) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Echo what the backend received so tests can assert on the rewrite.
async fn mock_echo(State(state): State<MockState>, uri: Uri, headers: HeaderMap) -> Json<Value> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    Json(json!({
        "backend": state.name,
        "path": uri.path(),
        "query": uri.query(),
        "host": header("host"),
        "x_forwarded_host": header("x-forwarded-host"),
        "x_forwarded_for": header("x-forwarded-for"),
        "x_forwarded_proto": header("x-forwarded-proto"),
        "x_request_id": header("x-request-id"),
    }))
}

/// Start a mock backend on an ephemeral port.
pub async fn start_mock_backend(name: &'static str) -> MockBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let healthy = Arc::new(AtomicBool::new(true));

    let app = Router::new()
        .route("/health", get(mock_health))
        .fallback(mock_echo)
        .with_state(MockState {
            name,
            healthy: healthy.clone(),
        });

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockBackend { addr, name, healthy }
}

/// Config with the given backends and active probing off.
pub fn gateway_config(backends: &[MockBackend]) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.backends = backends
        .iter()
        .map(|b| BackendConfig {
            name: b.name.to_string(),
            url: b.url(),
            weight: 50,
            health: "/health".to_string(),
        })
        .collect();
    config.health_check.enabled = false;
    config.rate_limit.requests_per_minute = 6000;
    config.rate_limit.burst_size = 1000;
    config
}

/// A gateway running on an ephemeral port.
pub struct RunningGateway {
    pub addr: SocketAddr,
    pub registry: Arc<BackendRegistry>,
    pub shutdown: Shutdown,
}

impl RunningGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for RunningGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_gateway(config: GatewayConfig) -> RunningGateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = GatewayServer::new(config, Arc::new(PrometheusTelemetry::install()));
    let registry = server.registry();
    let shutdown = Shutdown::new();
    tokio::spawn(server.run(listener, shutdown.subscribe()));

    RunningGateway {
        addr,
        registry,
        shutdown,
    }
}

/// Poll `check` until it holds or `timeout` elapses.
pub async fn eventually<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    check()
}
