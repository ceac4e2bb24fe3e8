//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for provider resolution
//! and transaction monitoring. All types derive Serde traits for deserialization
//! from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the provider layer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Push-channel monitoring settings shared by every push-capable provider.
    pub monitor: MonitorConfig,

    /// Helius (Solana) credentials and options.
    pub helius: ProviderConfig,

    /// Infura (EVM) credentials and options.
    pub infura: ProviderConfig,

    /// Chain/network entries the registry resolves.
    pub chains: Vec<ChainConfig>,
}

/// Vendor credentials and options for a single provider.
///
/// An empty or placeholder API key is accepted: the provider still resolves an
/// HTTP endpoint but reports no push capability.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Vendor API key appended to endpoint URLs.
    pub api_key: String,

    /// Allow the provider to open a push channel for confirmation monitoring.
    pub use_websocket: bool,

    /// Overrides the derived HTTP endpoint (dedicated nodes, local validators).
    pub http_endpoint: Option<String>,

    /// Overrides the derived WebSocket endpoint.
    pub websocket_endpoint: Option<String>,

    /// Region code for the Helius Sender fast-submit endpoint (e.g. "fra", "ewr").
    pub sender_region: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            use_websocket: true,
            http_endpoint: None,
            websocket_endpoint: None,
            sender_region: None,
        }
    }
}

impl ProviderConfig {
    /// Config with only an API key set.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }
}

/// Push-channel monitoring settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Commitment level requested in subscribe calls.
    pub commitment: String,

    /// Delay before an unused push connection is closed, in milliseconds.
    pub idle_timeout_ms: u64,

    /// Upper bound on establishing the push connection, in milliseconds.
    pub connect_timeout_ms: u64,

    /// Confirmation timeout used when the caller does not pass one, in milliseconds.
    pub default_timeout_ms: u64,

    /// Health probe timeout in seconds.
    pub health_timeout_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            commitment: "confirmed".to_string(),
            idle_timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
            default_timeout_ms: 30_000,
            health_timeout_secs: 5,
        }
    }
}

/// A single chain/network the registry can resolve.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainConfig {
    /// Chain family name ("solana", "ethereum").
    pub chain: String,

    /// Network name ("mainnet-beta", "devnet", "mainnet", "sepolia", ...).
    pub network: String,

    /// Numeric chain id (EVM chain id; Solana entries use 101/102/103 by convention).
    #[serde(default)]
    pub chain_id: u64,

    /// Configured provider name ("helius", "infura").
    pub provider: String,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
