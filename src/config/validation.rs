//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that the default network resolves to a registry name or an RPC URL
//! - Validate value ranges and key formats
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AccessConfig → Result<(), Vec<ValidationError>>
//! - Messages never echo secret values

use thiserror::Error;
use url::Url;

use crate::blockchain::network::is_known_network;
use crate::config::schema::AccessConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

fn is_http_url(value: &str) -> bool {
    Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false)
}

/// True for a 32-byte hex key with or without `0x`.
pub fn is_private_key_shape(value: &str) -> bool {
    let body = value.strip_prefix("0x").unwrap_or(value);
    body.len() == 64 && body.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Validate a configuration, collecting every violation.
pub fn validate_config(config: &AccessConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let network = config.default_network.as_str();
    if network.starts_with("http") {
        if !is_http_url(network) {
            errors.push(ValidationError::new("default_network", "not a valid http(s) URL"));
        }
    } else if !is_known_network(network) {
        errors.push(ValidationError::new(
            "default_network",
            format!("unknown network '{network}'"),
        ));
    }

    if let Some(key) = &config.private_key {
        if !is_private_key_shape(key) {
            errors.push(ValidationError::new(
                "private_key",
                "expected 64 hex characters with optional 0x prefix",
            ));
        }
    }

    let gateway = &config.tokens.ipfs_gateway;
    if !is_http_url(gateway) || !gateway.ends_with('/') {
        errors.push(ValidationError::new(
            "tokens.ipfs_gateway",
            "must be an http(s) URL ending with '/'",
        ));
    }
    if config.tokens.log_scan_block_range == 0 {
        errors.push(ValidationError::new("tokens.log_scan_block_range", "must be > 0"));
    }
    if config.tokens.max_scan_candidates == 0 {
        errors.push(ValidationError::new("tokens.max_scan_candidates", "must be > 0"));
    }

    if !LOG_LEVELS.contains(&config.observability.log_level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("must be one of {}", LOG_LEVELS.join(", ")),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AccessConfig::default()).is_ok());
    }

    #[test]
    fn test_url_default_network_is_valid() {
        let mut config = AccessConfig::default();
        config.default_network = "http://127.0.0.1:8545".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = AccessConfig::default();
        config.default_network = "atlantis".to_string();
        config.private_key = Some("not-a-key".to_string());
        config.tokens.ipfs_gateway = "https://ipfs.io/ipfs".to_string();
        config.tokens.log_scan_block_range = 0;
        config.tokens.max_scan_candidates = 0;
        config.observability.log_level = "loud".to_string();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "default_network",
                "private_key",
                "tokens.ipfs_gateway",
                "tokens.log_scan_block_range",
                "tokens.max_scan_candidates",
                "observability.log_level",
            ]
        );
        assert!(errors.iter().all(|e| !e.message.contains("not-a-key")));
    }

    #[test]
    fn test_private_key_shape() {
        let key = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
        assert!(is_private_key_shape(key));
        assert!(is_private_key_shape(&format!("0x{key}")));
        assert!(!is_private_key_shape(&key[..63]));
    }
}
