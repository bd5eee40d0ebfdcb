//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::blockchain::network::API_KEY_NAMES;
use crate::blockchain::wallet::PRIVATE_KEY_ENV_VAR;
use crate::config::schema::AccessConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding `default_network`.
pub const DEFAULT_NETWORK_ENV_VAR: &str = "CHAIN_ACCESS_DEFAULT_NETWORK";

/// Environment variable overriding `tokens.ipfs_gateway`.
pub const IPFS_GATEWAY_ENV_VAR: &str = "CHAIN_ACCESS_IPFS_GATEWAY";

/// Environment variable overriding `observability.log_level`.
pub const LOG_LEVEL_ENV_VAR: &str = "CHAIN_ACCESS_LOG_LEVEL";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[source] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ValidationError::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load a TOML file, apply environment overrides, then validate.
pub fn load_config(path: &Path) -> Result<AccessConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let mut config: AccessConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    tracing::debug!(path = %path.display(), network = %config.default_network, "Configuration loaded");
    Ok(config)
}

/// Build a configuration from defaults and the environment only.
pub fn from_env() -> Result<AccessConfig, ConfigError> {
    let mut config = AccessConfig::default();
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Overlay environment values onto `config`. Empty values are ignored.
///
/// `lookup` abstracts `std::env::var` so callers can supply their own source.
pub fn apply_env_overrides<F>(config: &mut AccessConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |name: &str| lookup(name).filter(|value| !value.is_empty());

    if let Some(network) = lookup(DEFAULT_NETWORK_ENV_VAR) {
        config.default_network = network;
    }
    if let Some(key) = lookup(PRIVATE_KEY_ENV_VAR) {
        config.private_key = Some(key);
    }
    for name in API_KEY_NAMES {
        if let Some(key) = lookup(name) {
            config.api_keys.insert(name.to_string(), key);
        }
    }
    if let Some(gateway) = lookup(IPFS_GATEWAY_ENV_VAR) {
        config.tokens.ipfs_gateway = gateway;
    }
    if let Some(level) = lookup(LOG_LEVEL_ENV_VAR) {
        config.observability.log_level = level;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn temp_file(name: &str, content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("chain_access_{}_{}", std::process::id(), name));
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_config_from_toml() {
        let path = temp_file(
            "valid.toml",
            r#"
default_network = "sepolia"

[tokens]
ipfs_gateway = "https://cloudflare-ipfs.com/ipfs/"
max_scan_candidates = 10
"#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.tokens.ipfs_gateway, "https://cloudflare-ipfs.com/ipfs/");
        assert_eq!(config.tokens.max_scan_candidates, 10);
        assert_eq!(config.tokens.log_scan_block_range, 50_000);
        fs::remove_file(path).unwrap_or_default();
    }

    #[test]
    fn test_load_config_reports_validation_errors() {
        let path = temp_file("invalid.toml", "[tokens]\nlog_scan_block_range = 0\n");
        match load_config(&path) {
            Err(ConfigError::Validation(errors)) => {
                assert!(errors.iter().any(|e| e.field == "tokens.log_scan_block_range"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        fs::remove_file(path).unwrap_or_default();
    }

    #[test]
    fn test_load_config_parse_error() {
        let path = temp_file("broken.toml", "default_network = [");
        assert!(matches!(load_config(&path), Err(ConfigError::Parse(_))));
        fs::remove_file(path).unwrap_or_default();
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/chain-access.toml")).unwrap_err();
        assert!(err.to_string().starts_with("IO error"));
    }

    #[test]
    fn test_validation_error_lists_every_field() {
        let err = ConfigError::Validation(vec![
            ValidationError {
                field: "default_network".to_string(),
                message: "unknown network 'atlantis'".to_string(),
            },
            ValidationError {
                field: "tokens.max_scan_candidates".to_string(),
                message: "must be > 0".to_string(),
            },
        ]);
        assert_eq!(
            err.to_string(),
            "Validation failed: default_network: unknown network 'atlantis', tokens.max_scan_candidates: must be > 0"
        );
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (DEFAULT_NETWORK_ENV_VAR, "base"),
            (PRIVATE_KEY_ENV_VAR, "0xabc"),
            ("INFURA_API_KEY", "infura-key"),
            (LOG_LEVEL_ENV_VAR, ""),
        ]);
        let mut config = AccessConfig::default();
        apply_env_overrides(&mut config, |name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.default_network, "base");
        assert_eq!(config.private_key.as_deref(), Some("0xabc"));
        assert_eq!(config.api_key("INFURA_API_KEY"), Some("infura-key"));
        assert_eq!(config.observability.log_level, "info");
    }
}
