//! Model token deployer.
//!
//! Consumes "model ready" messages, deploys a token contract per model,
//! registers it in the on-chain model registry and publishes a completion event.
//!
//! # Architecture Overview
//!
//! ```text
//!   inbound queue ──▶ queue::consumer ──▶ deployment::orchestrator ──▶ blockchain::client
//!        ▲                 │                      │                      (deploy, register)
//!        │ requeue         │ dead letter          │ publish
//!        └─────────────────┤                      ▼
//!                          ▼               outbound queue
//!                    dead-letter queue
//!
//!   health + admin HTTP ◀── health::service ◀── PipelineMetrics, broker, chain
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use model_token_deployer::lifecycle::{self, StartupOptions};

#[derive(Parser)]
#[command(name = "model-token-deployer")]
#[command(about = "Deploys and registers a token for every model-ready message", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use an in-process broker instead of Redis (local runs only).
    #[arg(long)]
    memory_broker: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let options = StartupOptions {
        config_path: args.config,
        memory_broker: args.memory_broker,
    };

    match lifecycle::run(options).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal startup error");
            eprintln!("model-token-deployer: {}", e);
            ExitCode::FAILURE
        }
    }
}
