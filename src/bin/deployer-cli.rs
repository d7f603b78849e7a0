use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "deployer-cli")]
#[command(about = "Operator CLI for the model token deployer", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8002")]
    url: String,

    /// Admin API key (Bearer token); only needed for admin commands.
    #[arg(short, long, default_value = "")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Liveness probe
    Live,
    /// Readiness probe (required contracts deployed)
    Ready,
    /// Aggregate health
    Health,
    /// Per-component health, alerts and metrics
    Detailed,
    /// Pipeline status and queue depths
    Status,
    /// List dead-lettered messages, newest first
    DeadLetters {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Move the oldest dead-lettered message back to the inbound queue
    Replay,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    if !cli.key.is_empty() {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
        );
    }

    let request = match cli.command {
        Commands::Live => client.get(format!("{}/health/live", base)),
        Commands::Ready => client.get(format!("{}/health/ready", base)),
        Commands::Health => client.get(format!("{}/health", base)),
        Commands::Detailed => client.get(format!("{}/health/detailed", base)),
        Commands::Status => client.get(format!("{}/admin/status", base)).headers(headers),
        Commands::DeadLetters { limit } => client
            .get(format!("{}/admin/dead-letters", base))
            .query(&[("limit", limit)])
            .headers(headers),
        Commands::Replay => client
            .post(format!("{}/admin/dead-letters/replay", base))
            .headers(headers),
    };

    let res = request.send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    let body = match serde_json::from_str::<Value>(&text) {
        Ok(json) => serde_json::to_string_pretty(&json)?,
        Err(_) => text,
    };

    if status.is_success() {
        println!("{}", body);
    } else {
        eprintln!("Error: deployer returned status {}", status);
        if !body.is_empty() {
            eprintln!("{}", body);
        }
        std::process::exit(1);
    }
    Ok(())
}
