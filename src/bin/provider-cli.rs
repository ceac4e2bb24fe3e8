use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::json;

use chain_providers::config::{load_config, ProvidersConfig};
use chain_providers::observability::logging::init_tracing;
use chain_providers::{ProviderError, ProviderRegistry, RpcProvider};

#[derive(Parser)]
#[command(name = "provider-cli")]
#[command(about = "Resolve RPC endpoints and monitor transaction confirmations", long_about = None)]
struct Cli {
    /// Provider configuration file (TOML). Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the HTTP and WebSocket endpoints for a network
    Urls {
        #[arg(long, default_value = "solana")]
        chain: String,
        #[arg(long, default_value = "mainnet-beta")]
        network: String,
    },
    /// Probe provider liveness
    Health {
        #[arg(long, default_value = "solana")]
        chain: String,
        #[arg(long, default_value = "mainnet-beta")]
        network: String,
    },
    /// Wait for a Solana signature to confirm
    Monitor {
        #[arg(long, default_value = "mainnet-beta")]
        network: String,
        /// Transaction signature (base58)
        signature: String,
        /// Confirmation timeout; the configured default applies when omitted
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProvidersConfig::default(),
    };
    init_tracing(&config.observability.log_level);

    let registry = ProviderRegistry::from_config(&config);

    match cli.command {
        Commands::Urls { chain, network } => {
            let provider = registry.resolve(&chain, &network)?;
            provider.initialize().await?;
            let output = json!({
                "provider": provider.kind().to_string(),
                "http": provider.http_url(),
                "websocket": provider.websocket_url(),
                "monitoring": provider.supports_transaction_monitoring(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Health { chain, network } => {
            let provider = registry.resolve(&chain, &network)?;
            provider.initialize().await?;
            let healthy = provider.health_check().await;
            println!("{}", serde_json::to_string_pretty(&json!({ "healthy": healthy }))?);
        }
        Commands::Monitor {
            network,
            signature,
            timeout_ms,
        } => {
            let provider = registry.resolve("solana", &network)?;
            provider.initialize().await?;
            require_monitoring(provider.as_ref())?;

            // Zero selects the configured default timeout
            let timeout = Duration::from_millis(timeout_ms.unwrap_or(0));
            let outcome = provider.monitor_transaction(&signature, timeout).await;
            registry.disconnect_all();

            println!("{}", serde_json::to_string_pretty(&outcome?)?);
        }
    }

    Ok(())
}

/// Fail when the provider cannot push confirmations, so the process exits non-zero.
fn require_monitoring(provider: &dyn RpcProvider) -> Result<(), ProviderError> {
    if provider.supports_transaction_monitoring() {
        return Ok(());
    }
    Err(ProviderError::Unavailable(format!(
        "no push channel for {}",
        provider.network_info()
    )))
}
