//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, multiplier >= 1)
//! - Check that addresses, hashes and hex blobs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Parameters a kind needs but that are absent are not errors here; they
//!   surface as missing parameters when the resource is bound

use alloy::primitives::{Address, Bytes, B256};
use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::{ResourceConfig, SyncConfig};

/// One semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("resource name must not be empty")]
    EmptyName,

    #[error("duplicate resource name '{0}'")]
    DuplicateName(String),

    #[error("{field} must be greater than zero")]
    NotPositive { field: String },

    #[error("{field}: invalid {expected} '{value}'")]
    Malformed {
        field: String,
        expected: &'static str,
        value: String,
    },

    #[error("gas_price_multiplier must be at least 1.0, got {0}")]
    Multiplier(f64),
}

/// Check `config`, collecting every problem.
pub fn validate_config(config: &SyncConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.blockchain.enabled {
        check_url(&mut errors, "blockchain.rpc_url", &config.blockchain.rpc_url);
        for url in &config.blockchain.failover_urls {
            check_url(&mut errors, "blockchain.failover_urls", url);
        }
    }
    if config.blockchain.rpc_timeout_secs == 0 {
        errors.push(not_positive("blockchain.rpc_timeout_secs"));
    }
    if !(config.blockchain.gas_price_multiplier >= 1.0) {
        errors.push(ValidationError::Multiplier(
            config.blockchain.gas_price_multiplier,
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::Malformed {
            field: "observability.metrics_address".to_string(),
            expected: "socket address",
            value: config.observability.metrics_address.clone(),
        });
    }

    for (field, value) in [
        ("watcher.block_poll_ms", config.watcher.block_poll_ms),
        ("watcher.chain_poll_ms", config.watcher.chain_poll_ms),
        ("defaults.interval_ms", config.defaults.interval_ms),
    ] {
        if value == 0 {
            errors.push(not_positive(field));
        }
    }

    let mut names = HashSet::new();
    for resource in &config.resources {
        if resource.name.trim().is_empty() {
            errors.push(ValidationError::EmptyName);
        } else if !names.insert(resource.name.as_str()) {
            errors.push(ValidationError::DuplicateName(resource.name.clone()));
        }
        validate_resource(&mut errors, resource);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_resource(errors: &mut Vec<ValidationError>, resource: &ResourceConfig) {
    let name = &resource.name;

    if resource.interval_ms == Some(0) {
        errors.push(not_positive(&format!("{name}.interval_ms")));
    }
    for (field, value) in [
        ("address", &resource.address),
        ("owner", &resource.owner),
        ("spender", &resource.spender),
    ] {
        if let Some(value) = value {
            check::<Address>(errors, &format!("{name}.{field}"), "address", value);
        }
    }
    if let Some(hash) = &resource.hash {
        check::<B256>(errors, &format!("{name}.hash"), "hash", hash);
    }
    if let Some(topic) = &resource.event_signature {
        check::<B256>(errors, &format!("{name}.event_signature"), "hash", topic);
    }
    if let Some(calldata) = &resource.calldata {
        check::<Bytes>(errors, &format!("{name}.calldata"), "hex", calldata);
    }
    for (i, call) in resource.calls.iter().enumerate() {
        check::<Address>(errors, &format!("{name}.calls[{i}].address"), "address", &call.address);
        check::<Bytes>(errors, &format!("{name}.calls[{i}].calldata"), "hex", &call.calldata);
    }
}

fn check<T: std::str::FromStr>(
    errors: &mut Vec<ValidationError>,
    field: &str,
    expected: &'static str,
    value: &str,
) {
    if value.parse::<T>().is_err() {
        errors.push(ValidationError::Malformed {
            field: field.to_string(),
            expected,
            value: value.to_string(),
        });
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    check::<url::Url>(errors, field, "URL", value);
}

fn not_positive(field: &str) -> ValidationError {
    ValidationError::NotPositive {
        field: field.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{CallConfig, ResourceKind};

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&SyncConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = SyncConfig::default();
        config.blockchain.gas_price_multiplier = 0.5;
        config.watcher.block_poll_ms = 0;

        let mut a = ResourceConfig::new("a", ResourceKind::Balance);
        a.address = Some("not-an-address".into());
        let b = ResourceConfig::new("a", ResourceKind::BlockNumber);
        config.resources = vec![a, b];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::DuplicateName("a".into())));
        assert!(errors.contains(&ValidationError::Multiplier(0.5)));
    }

    #[test]
    fn test_batch_calls_checked() {
        let mut config = SyncConfig::default();
        let mut reads = ResourceConfig::new("reads", ResourceKind::ContractReads);
        reads.calls.push(CallConfig {
            address: "0x0000000000000000000000000000000000000001".into(),
            calldata: "0xzz".into(),
        });
        config.resources.push(reads);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("reads.calls[0].calldata"));
    }

    #[test]
    fn test_enabled_rpc_url_checked() {
        let mut config = SyncConfig::default();
        config.blockchain.enabled = true;
        config.blockchain.rpc_url = "not a url".into();
        assert!(validate_config(&config).is_err());
    }
}
