//! devnet-session
//!
//! Command line front end for a wallet session against an EVM devnet.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │                       DEVNET SESSION                          │
//!   │                                                               │
//!   │  intents ──▶ ┌──────────────┐ ──▶ ┌──────────────┐            │
//!   │              │ orchestrator │     │   account    │            │
//!   │              │  (session)   │     │   manager    │            │
//!   │              └──────┬───────┘     └──────┬───────┘            │
//!   │                     │                    │                    │
//!   │            ┌────────▼───────┐    ┌───────▼────────┐           │
//!   │            │ WalletProvider │    │  LedgerClient  │ ──▶ RPC   │
//!   │            │   (keystore)   │    │ (faucet, txs)  │           │
//!   │            └────────────────┘    └────────────────┘           │
//!   │                                                               │
//!   │  SessionStore (watch) ──▶ snapshots ──▶ stdout (JSON)         │
//!   │                                                               │
//!   │  Cross-cutting: config, logging, metrics, lifecycle (Ctrl-C)  │
//!   └──────────────────────────────────────────────────────────────┘
//! ```

use alloy::primitives::utils::format_ether;
use alloy::primitives::Address;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use devnet_session::config::{load_or_default, SessionConfig};
use devnet_session::ledger::{LedgerClient, RpcLedgerClient};
use devnet_session::lifecycle::signals::shutdown_on_ctrl_c;
use devnet_session::lifecycle::Shutdown;
use devnet_session::observability::{logging, metrics};
use devnet_session::provider;
use devnet_session::session::SessionOrchestrator;

#[derive(Parser)]
#[command(name = "devnet-session")]
#[command(about = "Wallet session with an ephemeral, faucet-funded devnet account", long_about = None)]
struct Cli {
    /// Path to a TOML config file; defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report provider presence, ledger health and chain id
    Probe,
    /// Print the balance of an address in ether
    Balance { address: String },
    /// Connect, fund an ephemeral account, transfer to the wallet, disconnect
    Demo,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_or_default(cli.config.as_deref())?;

    logging::init_logging(&config.observability);
    tracing::info!(rpc_url = %config.ledger.rpc_url, chain_id = config.ledger.chain_id, "devnet-session starting");

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let shutdown = Shutdown::new();
    tokio::spawn(shutdown_on_ctrl_c(shutdown.clone()));

    match cli.command {
        Commands::Probe => probe(&config).await?,
        Commands::Balance { address } => {
            let address: Address = address.parse()?;
            let client = RpcLedgerClient::new(config.ledger.clone()).await?;
            let balance = client.get_balance(address).await?;
            println!("{} ETH", format_ether(balance));
        }
        Commands::Demo => demo(&config, &shutdown).await?,
    }

    shutdown.trigger();
    Ok(())
}

async fn probe(config: &SessionConfig) -> Result<(), Box<dyn std::error::Error>> {
    let provider = provider::detect(&config.wallet);
    let client = RpcLedgerClient::new(config.ledger.clone()).await?;
    let healthy = client.is_healthy().await;
    let chain_id = if healthy { client.get_chain_id().await.ok() } else { None };

    let report = serde_json::json!({
        "provider": provider.as_ref().map(|p| p.name()),
        "ledger_healthy": healthy,
        "chain_id": chain_id,
        "faucet": client.faucet().map(|f| f.address()),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn demo(config: &SessionConfig, shutdown: &Shutdown) -> Result<(), Box<dyn std::error::Error>> {
    let ledger: Arc<dyn LedgerClient> = Arc::new(RpcLedgerClient::new(config.ledger.clone()).await?);

    let session = SessionOrchestrator::initialize(
        config,
        ledger,
        provider::detect(&config.wallet),
        shutdown.token(),
    );

    let mut updates = session.subscribe();
    let watcher = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            tracing::debug!(
                wallet = ?snapshot.wallet,
                funding = ?snapshot.funding_state(),
                transfer = ?snapshot.transfer.as_ref().map(|t| &t.status),
                "Session updated"
            );
        }
    });

    let outcome = run_demo(&session).await;
    if shutdown.is_triggered() {
        tracing::warn!("Demo interrupted, printing the last session state");
    }
    println!("{}", serde_json::to_string_pretty(&session.snapshot())?);

    session.shutdown().await;
    watcher.abort();
    outcome
}

async fn run_demo(session: &SessionOrchestrator) -> Result<(), Box<dyn std::error::Error>> {
    let wallet = session.connect().await?;
    tracing::info!(wallet = ?wallet, "Wallet ready");

    let account = session.create_and_fund_account().await?;
    tracing::info!(address = %account.address, balance = %account.display_balance(), "Ephemeral account funded");

    let transfer = session.transfer().await?;
    tracing::info!(transfer_id = %transfer.id, status = ?transfer.status, "Transfer finished");

    session.disconnect().await?;
    Ok(())
}
