//! Provider value objects and error definitions.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

// Re-export ProviderConfig from config module to avoid duplication
pub use crate::config::schema::ProviderConfig;

/// Chain family a provider can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainFamily {
    Solana,
    Ethereum,
}

impl FromStr for ChainFamily {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "solana" => Ok(Self::Solana),
            "ethereum" => Ok(Self::Ethereum),
            other => Err(ProviderError::UnsupportedChain(other.to_string())),
        }
    }
}

impl fmt::Display for ChainFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Solana => write!(f, "solana"),
            Self::Ethereum => write!(f, "ethereum"),
        }
    }
}

/// Vendor behind a provider instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Push-capable Solana provider.
    Helius,
    /// Polling-only EVM provider.
    Infura,
}

impl ProviderKind {
    /// Whether this vendor serves the given chain family.
    pub fn supports(self, family: ChainFamily) -> bool {
        matches!(
            (self, family),
            (Self::Helius, ChainFamily::Solana) | (Self::Infura, ChainFamily::Ethereum)
        )
    }
}

impl FromStr for ProviderKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "helius" => Ok(Self::Helius),
            "infura" => Ok(Self::Infura),
            other => Err(ProviderError::UnknownProvider(other.to_string())),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Helius => write!(f, "helius"),
            Self::Infura => write!(f, "infura"),
        }
    }
}

/// Identity of the network a provider resolves. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NetworkInfo {
    pub chain: String,
    pub network: String,
    pub chain_id: u64,
}

impl NetworkInfo {
    pub fn new(chain: impl Into<String>, network: impl Into<String>, chain_id: u64) -> Self {
        Self {
            chain: chain.into(),
            network: network.into(),
            chain_id,
        }
    }
}

impl fmt::Display for NetworkInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chain, self.network)
    }
}

/// Final state of a monitored transaction.
///
/// `details` is present whenever the vendor reported on the transaction; a timeout
/// yields `confirmed: false` with no details.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorOutcome {
    pub confirmed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl MonitorOutcome {
    pub fn timed_out() -> Self {
        Self {
            confirmed: false,
            details: None,
        }
    }

    pub fn reported(confirmed: bool, details: serde_json::Value) -> Self {
        Self {
            confirmed,
            details: Some(details),
        }
    }

    /// True when the outcome came from the timeout path.
    pub fn is_timeout(&self) -> bool {
        !self.confirmed && self.details.is_none()
    }
}

/// Errors surfaced by providers and the registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Provider has no push channel for this operation.
    #[error("Transaction monitoring not supported by {0}")]
    Unsupported(String),

    /// Push channel could not be established; callers fall back to polling.
    #[error("Transaction monitoring unavailable: {0}")]
    Unavailable(String),

    /// Push channel dropped while the subscription was pending.
    #[error("WebSocket disconnected before {signature} settled")]
    Disconnected { signature: String },

    /// Vendor rejected the subscription.
    #[error("RPC error {code}: {message}")]
    Server { code: i64, message: String },

    /// Configured provider name is not known.
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Chain name is not known, or the provider does not serve it.
    #[error("Unsupported chain: {0}")]
    UnsupportedChain(String),

    /// Configuration could not be used to build a provider.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Whether an API key can be used against the vendor.
///
/// Empty keys and template placeholders such as `YOUR_HELIUS_API_KEY` are unusable.
pub fn is_usable_api_key(api_key: &str) -> bool {
    let key = api_key.trim();
    !key.is_empty() && !key.to_ascii_uppercase().starts_with("YOUR_")
}
