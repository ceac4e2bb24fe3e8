//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Providers and registry produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout via tracing-subscriber
//!     → whatever recorder the host installs for the `metrics` facade
//! ```
//!
//! # Design Decisions
//! - Structured fields (signature, subscription id, network) instead of formatted text
//! - Metrics go through the `metrics` facade; without a recorder they are no-ops

pub mod logging;
pub mod metrics;
