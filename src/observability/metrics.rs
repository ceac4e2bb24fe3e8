//! Metrics collection.
//!
//! # Metrics
//! - `provider_subscriptions_total` (counter): settled subscriptions by network and outcome
//! - `provider_active_subscriptions` (gauge): subscriptions awaiting a notification, by network
//! - `provider_websocket_connected` (gauge): 1=connected, 0=disconnected, by network
//! - `provider_websocket_connects_total` (counter): connect attempts by network and result
//! - `provider_health` (gauge): 1=healthy, 0=unhealthy, by provider and network
//!
//! `network` is the provider's `chain/network` label, so several cached
//! instances never overwrite each other's gauges.

use metrics::{counter, gauge};

/// Record how a subscription settled ("confirmed", "failed", "timeout", "error", "disconnected").
pub fn record_subscription_outcome(network: &str, outcome: &'static str) {
    counter!(
        "provider_subscriptions_total",
        "network" => network.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_active_subscriptions(network: &str, count: usize) {
    gauge!("provider_active_subscriptions", "network" => network.to_string()).set(count as f64);
}

pub fn record_websocket_connected(network: &str, connected: bool) {
    gauge!("provider_websocket_connected", "network" => network.to_string())
        .set(if connected { 1.0 } else { 0.0 });
}

/// Record a connect attempt result ("ok", "error", "timeout").
pub fn record_connect_attempt(network: &str, result: &'static str) {
    counter!(
        "provider_websocket_connects_total",
        "network" => network.to_string(),
        "result" => result
    )
    .increment(1);
}

pub fn record_provider_health(provider: &str, network: &str, healthy: bool) {
    gauge!(
        "provider_health",
        "provider" => provider.to_string(),
        "network" => network.to_string()
    )
    .set(if healthy { 1.0 } else { 0.0 });
}
