//! Infura provider for EVM networks.
//!
//! # Responsibilities
//! - Resolve an EVM network name to the Infura HTTP endpoint
//! - Probe liveness through `eth_blockNumber`
//!
//! Infura exposes no push channel here; transaction confirmation is left to the
//! caller's receipt poller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use alloy::providers::{Provider, ProviderBuilder};
use async_trait::async_trait;
use tokio::time::timeout;

use crate::observability::metrics;
use crate::providers::types::{
    is_usable_api_key, NetworkInfo, ProviderConfig, ProviderKind, ProviderResult,
};
use crate::providers::RpcProvider;

const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Networks Infura serves under a `<name>-mainnet` subdomain.
const MAINNET_SUFFIXED: [&str; 6] = [
    "polygon",
    "arbitrum",
    "optimism",
    "base",
    "avalanche",
    "linea",
];

/// Polling-only provider backed by Infura.
pub struct InfuraProvider {
    config: ProviderConfig,
    network: NetworkInfo,
    health_timeout: Duration,
    initialized: AtomicBool,
}

impl InfuraProvider {
    pub fn new(config: ProviderConfig, network: NetworkInfo) -> Self {
        Self {
            config,
            network,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
            initialized: AtomicBool::new(false),
        }
    }

    pub fn with_health_timeout(mut self, health_timeout: Duration) -> Self {
        self.health_timeout = health_timeout;
        self
    }

    /// Whether the configured API key can be used.
    pub fn has_valid_api_key(&self) -> bool {
        is_usable_api_key(&self.config.api_key)
    }
}

/// Map a network name to its Infura subdomain.
pub fn infura_subdomain(network: &str) -> String {
    let network = network.to_ascii_lowercase();
    if network.contains('-') {
        return network;
    }
    if MAINNET_SUFFIXED.contains(&network.as_str()) {
        return format!("{}-mainnet", network);
    }
    network
}

#[async_trait]
impl RpcProvider for InfuraProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Infura
    }

    fn network_info(&self) -> &NetworkInfo {
        &self.network
    }

    async fn initialize(&self) -> ProviderResult<()> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if !self.has_valid_api_key() {
            tracing::warn!(
                network = %self.network,
                "Infura API key missing or placeholder, requests will be rejected by the vendor"
            );
        }
        tracing::info!(
            network = %self.network,
            chain_id = self.network.chain_id,
            "Infura provider initialized (polling only)"
        );
        Ok(())
    }

    fn http_url(&self) -> String {
        if let Some(endpoint) = &self.config.http_endpoint {
            return endpoint.clone();
        }
        format!(
            "https://{}.infura.io/v3/{}",
            infura_subdomain(&self.network.network),
            self.config.api_key
        )
    }

    async fn health_check(&self) -> bool {
        let url: url::Url = match self.http_url().parse() {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(network = %self.network, error = %e, "Health check failed: invalid URL");
                return false;
            }
        };

        let provider = ProviderBuilder::new().connect_http(url);
        let healthy = match timeout(self.health_timeout, provider.get_block_number()).await {
            Ok(Ok(block)) => {
                tracing::debug!(network = %self.network, block, "Infura health check ok");
                true
            }
            Ok(Err(e)) => {
                tracing::warn!(network = %self.network, error = %e, "Health check failed: RPC error");
                false
            }
            Err(_) => {
                tracing::warn!(network = %self.network, "Health check failed: timeout");
                false
            }
        };

        metrics::record_provider_health("infura", &self.network.to_string(), healthy);
        healthy
    }
}

impl std::fmt::Debug for InfuraProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfuraProvider")
            .field("network", &self.network)
            .field("has_api_key", &self.has_valid_api_key())
            .finish()
    }
}
