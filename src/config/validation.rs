//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check chain/provider compatibility for every chain entry
//! - Validate value ranges (timeouts > 0) and endpoint URL schemes
//! - Detect duplicate (chain, network) entries
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProvidersConfig → Result<(), Vec<ValidationError>>
//! - API keys are never validated here; a missing key only degrades capability

use std::collections::HashSet;
use std::fmt;

use crate::config::schema::{MonitorConfig, ProviderConfig, ProvidersConfig};
use crate::providers::types::{ChainFamily, ProviderKind};

/// Commitment levels understood by the Solana subscription API.
const COMMITMENT_LEVELS: [&str; 3] = ["processed", "confirmed", "finalized"];

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// Human readable description.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration, collecting every error.
pub fn validate_config(config: &ProvidersConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_monitor(&config.monitor, &mut errors);
    validate_endpoints("helius", &config.helius, &mut errors);
    validate_endpoints("infura", &config.infura, &mut errors);

    let mut seen = HashSet::new();
    for (i, chain) in config.chains.iter().enumerate() {
        let field = format!("chains[{}]", i);

        let family = match chain.chain.parse::<ChainFamily>() {
            Ok(family) => Some(family),
            Err(_) => {
                errors.push(ValidationError::new(
                    format!("{}.chain", field),
                    format!("unknown chain '{}'", chain.chain),
                ));
                None
            }
        };

        match chain.provider.parse::<ProviderKind>() {
            Ok(kind) => {
                if let Some(family) = family {
                    if !kind.supports(family) {
                        errors.push(ValidationError::new(
                            format!("{}.provider", field),
                            format!("provider '{}' does not serve chain '{}'", kind, family),
                        ));
                    }
                }
            }
            Err(_) => errors.push(ValidationError::new(
                format!("{}.provider", field),
                format!("unknown provider '{}'", chain.provider),
            )),
        }

        if chain.network.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("{}.network", field),
                "network must not be empty",
            ));
        }

        let key = (
            chain.chain.trim().to_ascii_lowercase(),
            chain.network.trim().to_ascii_lowercase(),
        );
        if !seen.insert(key) {
            errors.push(ValidationError::new(
                field,
                format!("duplicate entry for {}/{}", chain.chain, chain.network),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_monitor(monitor: &MonitorConfig, errors: &mut Vec<ValidationError>) {
    let positive = [
        ("monitor.idle_timeout_ms", monitor.idle_timeout_ms),
        ("monitor.connect_timeout_ms", monitor.connect_timeout_ms),
        ("monitor.default_timeout_ms", monitor.default_timeout_ms),
        ("monitor.health_timeout_secs", monitor.health_timeout_secs),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }

    if !COMMITMENT_LEVELS.contains(&monitor.commitment.as_str()) {
        errors.push(ValidationError::new(
            "monitor.commitment",
            format!(
                "'{}' is not one of {}",
                monitor.commitment,
                COMMITMENT_LEVELS.join(", ")
            ),
        ));
    }
}

fn validate_endpoints(section: &str, config: &ProviderConfig, errors: &mut Vec<ValidationError>) {
    if let Some(endpoint) = &config.http_endpoint {
        check_url(
            format!("{}.http_endpoint", section),
            endpoint,
            &["http", "https"],
            errors,
        );
    }
    if let Some(endpoint) = &config.websocket_endpoint {
        check_url(
            format!("{}.websocket_endpoint", section),
            endpoint,
            &["ws", "wss"],
            errors,
        );
    }
}

fn check_url(field: String, raw: &str, schemes: &[&str], errors: &mut Vec<ValidationError>) {
    match url::Url::parse(raw) {
        Ok(parsed) if schemes.contains(&parsed.scheme()) => {}
        Ok(parsed) => errors.push(ValidationError::new(
            field,
            format!(
                "scheme '{}' not allowed, expected {}",
                parsed.scheme(),
                schemes.join(" or ")
            ),
        )),
        Err(e) => errors.push(ValidationError::new(field, format!("invalid URL: {}", e))),
    }
}
