//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the health, metrics and proxy handlers
//! - Wire up layers (request ID, access log, metrics, admission, timeouts)
//! - Start the health monitor, metrics upkeep and the optional admin listener
//! - Serve until the shutdown signal, then drain

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::timeout::{RequestBodyTimeoutLayer, TimeoutLayer};

use crate::admin::{self, AdminState};
use crate::config::GatewayConfig;
use crate::health::active::HealthMonitor;
use crate::http::middleware::{access_log, capture_metrics};
use crate::http::proxy::{build_client, proxy_handler, HttpClient};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::load_balancer::BackendRegistry;
use crate::observability::metrics::{run_upkeep, UPKEEP_INTERVAL};
use crate::observability::Telemetry;
use crate::security::{AdmissionGate, AdmissionState};
use crate::security::rate_limit::admission_middleware;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<BackendRegistry>,
    pub client: HttpClient,
    pub telemetry: Arc<dyn Telemetry>,
}

/// Errors that stop the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
    state: AppState,
}

impl GatewayServer {
    /// Create a new gateway server with the given configuration.
    pub fn new(config: GatewayConfig, telemetry: Arc<dyn Telemetry>) -> Self {
        let registry = Arc::new(BackendRegistry::from_config(
            &config.backends,
            &config.load_balancer.algorithm,
        ));
        let state = AppState {
            registry,
            client: build_client(config.server.idle_timeout()),
            telemetry,
        };
        let gate = Arc::new(AdmissionGate::from_config(&config.rate_limit));

        let router = Self::build_router(&config, state.clone(), gate);
        Self { router, config, state }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Layers run outermost first: request ID, access log, metrics,
    /// admission, then the response and body timeouts.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState, gate: Arc<AdmissionGate>) -> Router {
        let admission = AdmissionState {
            gate,
            telemetry: state.telemetry.clone(),
        };
        let telemetry = state.telemetry.clone();

        Router::new()
            .route("/health", get(health_handler).fallback(proxy_handler))
            .route("/metrics", get(metrics_handler).fallback(proxy_handler))
            .fallback(proxy_handler)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(propagate_request_id_layer())
                    .layer(middleware::from_fn(access_log))
                    .layer(middleware::from_fn_with_state(telemetry, capture_metrics))
                    .layer(middleware::from_fn_with_state(admission, admission_middleware))
                    .layer(TimeoutLayer::new(config.server.write_timeout()))
                    .layer(RequestBodyTimeoutLayer::new(config.server.read_timeout())),
            )
    }

    /// Shared backend registry (health overrides, stats).
    pub fn registry(&self) -> Arc<BackendRegistry> {
        self.state.registry.clone()
    }

    /// The routed service, for driving requests without a listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires. In-flight requests are drained before returning.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let monitor = HealthMonitor::new(
            self.state.registry.clone(),
            self.state.telemetry.clone(),
            self.state.client.clone(),
            self.config.health_check.clone(),
        );
        tokio::spawn(monitor.run(shutdown.resubscribe()));
        tokio::spawn(run_upkeep(
            self.state.telemetry.clone(),
            UPKEEP_INTERVAL,
            shutdown.resubscribe(),
        ));

        if self.config.admin.enabled {
            self.spawn_admin(shutdown.resubscribe()).await?;
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    async fn spawn_admin(&self, mut shutdown: broadcast::Receiver<()>) -> Result<(), ServerError> {
        let address = self.config.admin.bind_address.clone();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| ServerError::Bind { address: address.clone(), source })?;

        let router = admin::setup_admin_router(AdminState::new(
            self.state.registry.clone(),
            &self.config.admin.api_key,
        ));
        tracing::info!(address = %address, "Admin API listening");

        tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown.recv().await;
                })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "Admin API stopped with error");
            }
        });
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    healthy_backends: usize,
}

/// Gateway liveness: healthy while at least one backend is.
async fn health_handler(State(state): State<AppState>) -> Response {
    let healthy_backends = state.registry.healthy_count();
    let (code, status) = if healthy_backends > 0 {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };
    (code, Json(HealthBody { status, healthy_backends })).into_response()
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.telemetry.render(),
    )
        .into_response()
}
