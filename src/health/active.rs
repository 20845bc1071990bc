//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every configured backend, one task per backend
//! - Classify: healthy iff the probe returns 2xx within the timeout
//! - Write results into the registry and mirror them to telemetry

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode, Uri};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::http::proxy::HttpClient;
use crate::load_balancer::{BackendDescriptor, BackendRegistry};
use crate::observability::Telemetry;

const USER_AGENT: &str = concat!("edge-gateway-health-check/", env!("CARGO_PKG_VERSION"));

/// Why a probe classified a backend as unhealthy.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("invalid health url {0:?}")]
    InvalidUrl(String),
    #[error("connection error: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("non-success status {0}")]
    Status(StatusCode),
}

/// Issues a single liveness request with a bounded timeout.
#[derive(Clone)]
pub struct Prober {
    client: HttpClient,
    timeout: Duration,
}

impl Prober {
    pub fn new(client: HttpClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Probe `backend`'s health endpoint. The timeout cancels only this probe.
    pub async fn probe(&self, backend: &BackendDescriptor) -> Result<StatusCode, ProbeError> {
        let url = backend.health_url();
        let uri: Uri = url.parse().map_err(|_| ProbeError::InvalidUrl(url.clone()))?;
        if uri.host().is_none() {
            return Err(ProbeError::InvalidUrl(url));
        }

        let request = Request::get(uri)
            .header(header::USER_AGENT, USER_AGENT)
            .body(Body::empty())
            .map_err(|_| ProbeError::InvalidUrl(url.clone()))?;

        let response = time::timeout(self.timeout, self.client.request(request))
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))??;

        let status = response.status();
        if status.is_success() {
            Ok(status)
        } else {
            Err(ProbeError::Status(status))
        }
    }
}

/// Recurring prober that keeps the registry's health flags current.
pub struct HealthMonitor {
    registry: Arc<BackendRegistry>,
    telemetry: Arc<dyn Telemetry>,
    prober: Prober,
    config: HealthCheckConfig,
}

impl HealthMonitor {
    pub fn new(
        registry: Arc<BackendRegistry>,
        telemetry: Arc<dyn Telemetry>,
        client: HttpClient,
        config: HealthCheckConfig,
    ) -> Self {
        Self {
            registry,
            telemetry,
            prober: Prober::new(client, config.timeout()),
            config,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval_secs = self.config.interval_secs,
            timeout_secs = self.config.timeout_secs,
            "Health monitor starting"
        );

        let mut ticker = time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every backend concurrently and wait for all results.
    pub async fn check_all(&self) {
        let mut probes = JoinSet::new();

        for backend in self.registry.descriptors() {
            let prober = self.prober.clone();
            let registry = self.registry.clone();
            let telemetry = self.telemetry.clone();

            probes.spawn(async move {
                let healthy = match prober.probe(&backend).await {
                    Ok(status) => {
                        tracing::debug!(backend = %backend.name, status = status.as_u16(), "Health check passed");
                        true
                    }
                    Err(e) => {
                        tracing::warn!(backend = %backend.name, error = %e, "Health check failed");
                        false
                    }
                };
                registry.set_health(&backend.name, healthy);
                telemetry.set_backend_status(&backend.name, healthy);
            });
        }

        while let Some(joined) = probes.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Health probe task failed");
            }
        }
    }
}
