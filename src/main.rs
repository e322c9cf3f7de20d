//! Withdrawal Approval
//!
//! ```text
//! serve    record service + in-process approval workflow
//! trigger  start a workflow on a running service and poll its status
//! decider  decision provider simulator
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use withdrawal_approval::config::AppConfig;
use withdrawal_approval::decider::run_decider;
use withdrawal_approval::logging::init_logging;
use withdrawal_approval::providers::RecordServiceClient;
use withdrawal_approval::server::{AppState, run_server};
use withdrawal_approval::withdrawal::WithdrawalState;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config environment, loads config/{env}.yaml
    #[arg(short, long, default_value = "dev")]
    env: String,

    /// Explicit config file, overrides --env
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the record service with the approval workflow
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Start an approval on a running service and wait for it to settle
    Trigger {
        /// Withdrawal id; the service mints one if absent
        #[arg(long)]
        id: Option<String>,
        #[arg(long, default_value = "http://127.0.0.1:8090")]
        server: String,
        /// Give up polling after this many seconds
        #[arg(long, default_value_t = 600)]
        wait_secs: u64,
    },
    /// Answer APPROVED/DISAPPROVED deterministically per id
    Decider {
        #[arg(long)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::load(&cli.env),
    }
    .context("Failed to load configuration")?;
    let _guard = init_logging(&config);

    match cli.command {
        Command::Serve { port } => {
            let port = port.unwrap_or(config.server.port);
            let state = AppState::from_config(&config).context("Failed to build provider clients")?;
            run_server(&config.server.host, port, state)
                .await
                .context("Record service stopped")?;
        }
        Command::Trigger {
            id,
            server,
            wait_secs,
        } => trigger(&server, id.as_deref(), Duration::from_secs(wait_secs)).await?,
        Command::Decider { port } => {
            run_decider(port).await.context("Decider stopped")?;
        }
    }
    Ok(())
}

async fn trigger(server: &str, id: Option<&str>, wait: Duration) -> Result<()> {
    let client = RecordServiceClient::new(server);
    let id = client
        .start(id)
        .await
        .context("Failed to start workflow")?;
    info!(withdrawal_id = %id, "Workflow started");
    println!("Started withdrawal {}", id);

    let deadline = tokio::time::Instant::now() + wait;
    let mut last = None;
    while tokio::time::Instant::now() < deadline {
        // Record may not exist yet right after start
        if let Ok(state) = client.status(&id).await {
            if last != Some(state) {
                println!("{} {}", id, state);
                last = Some(state);
            }
            if state.is_terminal() {
                return Ok(());
            }
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    println!(
        "{} still {} after {:?}",
        id,
        last.map(|s: WithdrawalState| s.as_str()).unwrap_or("unknown"),
        wait
    );
    Ok(())
}
