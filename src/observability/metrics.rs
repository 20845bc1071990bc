//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, backend
//! - `gateway_request_duration_seconds` (summary): latency by method, backend
//! - `gateway_backend_requests_total` (counter): forwarded requests by backend, status
//! - `gateway_backend_up` (gauge): 1=healthy, 0=unhealthy
//! - `gateway_rate_limited_requests_total` (counter): admission rejections
//! - `gateway_info` (gauge): build version
//!
//! # Design Decisions
//! - The dispatch core only emits through [`Telemetry`]; it never reads back
//! - One process-wide Prometheus recorder, installed on first use
//! - Histogram samples are buffered until drained, so [`run_upkeep`] must run
//!   for the life of the server whether or not anything scrapes `/metrics`

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

/// How often buffered histogram samples are folded into summaries.
pub const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Sink for request and backend events.
pub trait Telemetry: Send + Sync {
    /// One finished request. `backend` is `"none"` when nothing was selected.
    fn record_request(&self, method: &str, status: u16, backend: &str, duration: Duration);

    /// One response received from (or synthesized for) a backend.
    fn record_backend_request(&self, backend: &str, status: u16);

    /// Latest probe classification for a backend.
    fn set_backend_status(&self, backend: &str, up: bool);

    /// One request rejected by admission control.
    fn record_rate_limited(&self);

    /// Text exposition for the `/metrics` endpoint.
    fn render(&self) -> String;

    /// Periodic housekeeping for recorders that buffer samples.
    fn upkeep(&self) {}
}

/// Call [`Telemetry::upkeep`] every `period` until `shutdown` fires.
pub async fn run_upkeep(
    telemetry: Arc<dyn Telemetry>,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => telemetry.upkeep(),
            _ = shutdown.recv() => {
                tracing::debug!("Metrics upkeep stopped");
                break;
            }
        }
    }
}

static PROMETHEUS: OnceLock<PrometheusHandle> = OnceLock::new();

/// [`Telemetry`] backed by the `metrics` facade and a Prometheus recorder.
#[derive(Clone)]
pub struct PrometheusTelemetry {
    handle: PrometheusHandle,
}

impl PrometheusTelemetry {
    /// Install the global recorder (once per process) and return a handle.
    pub fn install() -> Self {
        let handle = PROMETHEUS
            .get_or_init(|| {
                let recorder = PrometheusBuilder::new().build_recorder();
                let handle = recorder.handle();
                if let Err(e) = metrics::set_global_recorder(recorder) {
                    tracing::error!(error = %e, "Failed to install Prometheus recorder");
                }
                metrics::gauge!("gateway_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
                handle
            })
            .clone();
        Self { handle }
    }
}

impl Telemetry for PrometheusTelemetry {
    fn record_request(&self, method: &str, status: u16, backend: &str, duration: Duration) {
        metrics::counter!(
            "gateway_requests_total",
            "method" => method.to_string(),
            "status" => status.to_string(),
            "backend" => backend.to_string()
        )
        .increment(1);
        metrics::histogram!(
            "gateway_request_duration_seconds",
            "method" => method.to_string(),
            "backend" => backend.to_string()
        )
        .record(duration.as_secs_f64());
    }

    fn record_backend_request(&self, backend: &str, status: u16) {
        metrics::counter!(
            "gateway_backend_requests_total",
            "backend" => backend.to_string(),
            "status" => status.to_string()
        )
        .increment(1);
    }

    fn set_backend_status(&self, backend: &str, up: bool) {
        metrics::gauge!("gateway_backend_up", "backend" => backend.to_string())
            .set(if up { 1.0 } else { 0.0 });
    }

    fn record_rate_limited(&self) {
        metrics::counter!("gateway_rate_limited_requests_total").increment(1);
    }

    fn render(&self) -> String {
        self.handle.render()
    }

    fn upkeep(&self) {
        self.handle.run_upkeep();
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prometheus_renders_recorded_series() {
        let telemetry = PrometheusTelemetry::install();
        telemetry.record_request("GET", 200, "render-test", Duration::from_millis(5));
        telemetry.set_backend_status("render-test", false);

        let text = telemetry.render();
        assert!(text.contains("gateway_requests_total"));
        assert!(text.contains("gateway_backend_up{backend=\"render-test\"}"));
    }

    #[test]
    fn test_upkeep_keeps_drained_samples_visible() {
        let telemetry = PrometheusTelemetry::install();
        for _ in 0..100 {
            telemetry.record_request("GET", 200, "upkeep-test", Duration::from_millis(2));
        }
        telemetry.upkeep();

        let text = telemetry.render();
        let count_line = text
            .lines()
            .find(|l| l.starts_with("gateway_request_duration_seconds_count") && l.contains("backend=\"upkeep-test\""))
            .unwrap();
        assert!(count_line.ends_with(" 100"), "{}", count_line);
    }

    #[tokio::test]
    async fn test_upkeep_runs_until_shutdown() {
        use super::testing::{Event, RecordingTelemetry};

        let telemetry = Arc::new(RecordingTelemetry::default());
        let (tx, rx) = broadcast::channel(1);
        let task = tokio::spawn(run_upkeep(telemetry.clone(), Duration::from_millis(10), rx));

        time::sleep(Duration::from_millis(100)).await;
        let ticks = telemetry.events().iter().filter(|e| **e == Event::Upkeep).count();
        assert!(ticks >= 2, "upkeep ran {} times", ticks);

        tx.send(()).unwrap();
        time::timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
    }
}
