use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the edge gateway admin API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:8081")]
    url: String,

    #[arg(short, long, env = "GATEWAY_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway status
    Status,
    /// Show backend table and selection algorithm
    Stats,
    /// Switch the selection algorithm
    SetAlgorithm {
        /// round_robin, weighted_round_robin, random or least_connections
        algorithm: String,
    },
    /// Force a backend healthy or unhealthy until the next probe
    SetHealth {
        name: String,
        #[arg(action = clap::ArgAction::Set)]
        healthy: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let request = match cli.command {
        Commands::Status => client.get(format!("{}/admin/status", cli.url)),
        Commands::Stats => client.get(format!("{}/admin/stats", cli.url)),
        Commands::SetAlgorithm { algorithm } => client
            .put(format!("{}/admin/algorithm", cli.url))
            .json(&json!({ "algorithm": algorithm })),
        Commands::SetHealth { name, healthy } => client
            .put(format!("{}/admin/backends/{}/health", cli.url, name))
            .json(&json!({ "healthy": healthy })),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            if !text.is_empty() {
                eprintln!("Response: {}", text);
            }
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
