//! Provider registry.
//!
//! # Responsibilities
//! - Build providers lazily from configuration
//! - Cache exactly one instance per (chain, network)
//! - Tear down push connections on shutdown
//!
//! Owned by the composition root; there is no global instance.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::config::schema::{ChainConfig, MonitorConfig, ProviderConfig, ProvidersConfig};
use crate::providers::helius::{HeliusProvider, MonitorSettings};
use crate::providers::infura::InfuraProvider;
use crate::providers::types::{
    ChainFamily, NetworkInfo, ProviderError, ProviderKind, ProviderResult,
};
use crate::providers::RpcProvider;

/// Cache key: lowercased chain family and network name.
type RegistryKey = (String, String);

/// Lazily built provider instances keyed by (chain, network).
#[derive(Debug)]
pub struct ProviderRegistry {
    helius: ProviderConfig,
    infura: ProviderConfig,
    monitor: MonitorConfig,
    chains: Vec<ChainConfig>,
    providers: DashMap<RegistryKey, Arc<dyn RpcProvider>>,
}

impl ProviderRegistry {
    /// Create a registry from configuration. Nothing is built until first use.
    pub fn from_config(config: &ProvidersConfig) -> Self {
        Self {
            helius: config.helius.clone(),
            infura: config.infura.clone(),
            monitor: config.monitor.clone(),
            chains: config.chains.clone(),
            providers: DashMap::new(),
        }
    }

    /// Provider for a configured chain entry.
    pub fn get_for_chain(&self, chain: &ChainConfig) -> ProviderResult<Arc<dyn RpcProvider>> {
        self.get(&chain.chain, &chain.provider, &chain.network, chain.chain_id)
    }

    /// Provider for `(chain, network)`, using the configured entry when one exists
    /// and the chain's default vendor otherwise.
    pub fn resolve(&self, chain: &str, network: &str) -> ProviderResult<Arc<dyn RpcProvider>> {
        if let Some(entry) = self
            .chains
            .iter()
            .find(|c| c.chain.eq_ignore_ascii_case(chain) && c.network.eq_ignore_ascii_case(network))
        {
            return self.get_for_chain(entry);
        }

        let family: ChainFamily = chain.parse()?;
        let kind = default_provider(family);
        self.get(chain, &kind.to_string(), network, 0)
    }

    /// Provider named `provider_name` for `(chain, network)`.
    ///
    /// The first call for a key builds the instance; later calls return the cached one.
    pub fn get(
        &self,
        chain: &str,
        provider_name: &str,
        network: &str,
        chain_id: u64,
    ) -> ProviderResult<Arc<dyn RpcProvider>> {
        let family: ChainFamily = chain.parse()?;
        let kind: ProviderKind = provider_name.parse()?;
        if !kind.supports(family) {
            return Err(ProviderError::UnsupportedChain(format!(
                "{} is not served by {}",
                family, kind
            )));
        }

        let network = network.trim().to_ascii_lowercase();
        if network.is_empty() {
            return Err(ProviderError::Configuration(format!(
                "{} network name must not be empty",
                family
            )));
        }

        // Each family has a single vendor, so the key alone fixes the provider kind
        let key = (family.to_string(), network.clone());
        let entry = self.providers.entry(key).or_insert_with(|| {
            tracing::info!(chain = %family, network = %network, provider = %kind, "Creating provider");
            self.build(kind, NetworkInfo::new(family.to_string(), network.as_str(), chain_id))
        });

        Ok(Arc::clone(entry.value()))
    }

    fn build(&self, kind: ProviderKind, network: NetworkInfo) -> Arc<dyn RpcProvider> {
        match kind {
            ProviderKind::Helius => Arc::new(HeliusProvider::new(
                self.helius.clone(),
                network,
                MonitorSettings::from(&self.monitor),
            )),
            ProviderKind::Infura => Arc::new(
                InfuraProvider::new(self.infura.clone(), network)
                    .with_health_timeout(Duration::from_secs(self.monitor.health_timeout_secs)),
            ),
        }
    }

    /// Build and initialize every configured chain entry.
    pub async fn initialize_all(&self) -> ProviderResult<()> {
        for chain in &self.chains {
            let provider = self.get_for_chain(chain)?;
            provider.initialize().await?;
        }
        Ok(())
    }

    /// Disconnect every cached provider's push channel.
    pub fn disconnect_all(&self) {
        for entry in self.providers.iter() {
            entry.value().disconnect();
        }
        tracing::info!(providers = self.providers.len(), "All providers disconnected");
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Vendor used for a chain when no entry names one.
pub fn default_provider(family: ChainFamily) -> ProviderKind {
    match family {
        ChainFamily::Solana => ProviderKind::Helius,
        ChainFamily::Ethereum => ProviderKind::Infura,
    }
}
