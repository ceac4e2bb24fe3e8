//! Blockchain RPC provider resolution and push-based transaction confirmation.
//!
//! ```text
//!   ProvidersConfig ──▶ ProviderRegistry ──▶ Arc<dyn RpcProvider>
//!                                              │
//!                       ┌──────────────────────┴─────────────────────┐
//!                       ▼                                            ▼
//!               HeliusProvider (Solana)                     InfuraProvider (EVM)
//!        http/ws endpoints + signatureSubscribe            http endpoint only,
//!        over one on-demand WebSocket                      callers poll receipts
//! ```

pub mod config;
pub mod observability;
pub mod providers;

pub use config::schema::ProvidersConfig;
pub use providers::{MonitorOutcome, ProviderError, ProviderRegistry, RpcProvider};
