//! RPC provider subsystem.
//!
//! # Data Flow
//! ```text
//! ProvidersConfig
//!     → registry.rs (one cached instance per (chain, network))
//!     → RpcProvider::http_url / websocket_url (endpoint resolution, no IO)
//!     → RpcProvider::monitor_transaction (push-capable providers only)
//!         → helius/connection.rs (shared connect attempt, reader/writer tasks)
//!         → helius/protocol.rs (frame classification)
//!         → helius/subscriptions.rs (local id → server id table)
//! ```
//!
//! # Design Decisions
//! - Endpoint resolution is pure and never fails; bad credentials degrade capability
//! - Monitoring unavailability is reported, never retried; callers fall back to polling
//! - A timeout is an outcome (`confirmed: false`), not an error

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

pub mod helius;
pub mod infura;
pub mod registry;
pub mod types;

pub use helius::HeliusProvider;
pub use infura::InfuraProvider;
pub use registry::ProviderRegistry;
pub use types::{
    ChainFamily, MonitorOutcome, NetworkInfo, ProviderConfig, ProviderError, ProviderKind,
    ProviderResult,
};

/// Capability surface every provider implements.
#[async_trait]
pub trait RpcProvider: Send + Sync + fmt::Debug {
    /// Vendor behind this instance.
    fn kind(&self) -> ProviderKind;

    /// Network this instance was built for.
    fn network_info(&self) -> &NetworkInfo;

    /// One-time setup. Calling it again is a no-op.
    async fn initialize(&self) -> ProviderResult<()> {
        Ok(())
    }

    /// HTTP JSON-RPC endpoint. Pure function of the API key and network.
    fn http_url(&self) -> String;

    /// Push endpoint, or `None` when unsupported or the API key is unusable.
    fn websocket_url(&self) -> Option<String> {
        None
    }

    /// Probe endpoint liveness. Failures are reported as `false`.
    async fn health_check(&self) -> bool;

    fn supports_transaction_monitoring(&self) -> bool {
        false
    }

    /// Wait for `signature` to reach the configured commitment, or `timeout` to pass.
    async fn monitor_transaction(
        &self,
        signature: &str,
        timeout: Duration,
    ) -> ProviderResult<MonitorOutcome> {
        let _ = (signature, timeout);
        Err(ProviderError::Unsupported(self.kind().to_string()))
    }

    fn is_websocket_connected(&self) -> bool {
        false
    }

    /// Tear down any push connection. Idempotent.
    fn disconnect(&self) {}
}
