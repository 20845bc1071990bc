use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use edge_gateway::config::loader::{load_config, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use edge_gateway::lifecycle::{shutdown_signal, Shutdown};
use edge_gateway::observability::logging::init_logging;
use edge_gateway::observability::PrometheusTelemetry;
use edge_gateway::GatewayServer;

#[derive(Parser)]
#[command(name = "edge-gateway")]
#[command(about = "HTTP edge dispatch gateway", long_about = None)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(short, long, env = CONFIG_PATH_ENV, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration from {}: {}", cli.config.display(), e);
            std::process::exit(1);
        }
    };

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "edge-gateway starting");
    tracing::info!(
        address = %config.server.address,
        backends = config.backends.len(),
        algorithm = %config.load_balancer.algorithm,
        requests_per_minute = config.rate_limit.requests_per_minute,
        burst_size = config.rate_limit.burst_size,
        "Configuration loaded"
    );

    let telemetry = Arc::new(PrometheusTelemetry::install());
    let grace = config.server.shutdown_grace();

    let listener = TcpListener::bind(&config.server.address).await?;
    let server = GatewayServer::new(config, telemetry);

    let shutdown = Shutdown::new();
    let mut server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    tokio::select! {
        _ = shutdown_signal() => {}
        joined = &mut server_task => {
            // The server only returns on its own when it fails.
            match joined {
                Ok(Ok(())) => tracing::warn!("Server exited without a shutdown signal"),
                Ok(Err(e)) => tracing::error!(error = %e, "Server failed"),
                Err(e) => tracing::error!(error = %e, "Server task panicked"),
            }
            std::process::exit(1);
        }
    }

    tracing::info!("Shutting down gracefully");
    shutdown.trigger();
    shutdown.drain(server_task, grace).await;

    tracing::info!("Shutdown complete");
    Ok(())
}
