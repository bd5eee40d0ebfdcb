//! Configuration schema definitions.
//!
//! All sections derive Serde traits and default every field, so an empty TOML
//! file is a valid configuration. Secrets (API keys, the private key) are
//! deserialized but never serialized, and `Debug` redacts them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root configuration consumed by [`crate::access::ChainAccess`].
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Network used when an operation names none (registry name or RPC URL).
    pub default_network: String,

    /// API keys by name (e.g. `INFURA_API_KEY`).
    #[serde(skip_serializing)]
    pub api_keys: BTreeMap<String, String>,

    /// Default signing key, hex with or without `0x`.
    #[serde(skip_serializing)]
    pub private_key: Option<String>,

    /// Token adapter settings.
    pub tokens: TokenConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            default_network: "mainnet".to_string(),
            api_keys: BTreeMap::new(),
            private_key: None,
            tokens: TokenConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl AccessConfig {
    /// Look up an API key by name, ignoring empty values.
    pub fn api_key(&self, name: &str) -> Option<&str> {
        self.api_keys
            .get(name)
            .map(String::as_str)
            .filter(|key| !key.is_empty())
    }
}

impl std::fmt::Debug for AccessConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessConfig")
            .field("default_network", &self.default_network)
            .field("api_keys", &self.api_keys.keys().collect::<Vec<_>>())
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("tokens", &self.tokens)
            .field("observability", &self.observability)
            .finish()
    }
}

/// Token adapter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Gateway prefix for `ipfs://` metadata URIs (must end with `/`).
    pub ipfs_gateway: String,

    /// How many blocks back an ownership log scan reaches.
    pub log_scan_block_range: u64,

    /// Maximum distinct token ids examined by an ownership scan.
    pub max_scan_candidates: usize,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            ipfs_gateway: "https://ipfs.io/ipfs/".to_string(),
            log_scan_block_range: 50_000,
            max_scan_candidates: 1_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON lines instead of human-readable output.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: AccessConfig = toml::from_str("").unwrap();
        assert_eq!(config.default_network, "mainnet");
        assert_eq!(config.tokens.log_scan_block_range, 50_000);
        assert_eq!(config.observability.log_level, "info");
        assert!(config.private_key.is_none());
    }

    #[test]
    fn test_secrets_are_not_serialized_or_printed() {
        let mut config = AccessConfig::default();
        config.private_key = Some("ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80".into());
        config.api_keys.insert("INFURA_API_KEY".into(), "super-secret".into());

        let serialized = toml::to_string(&config).unwrap();
        assert!(!serialized.contains("ac0974"));
        assert!(!serialized.contains("super-secret"));

        let debug = format!("{config:?}");
        assert!(!debug.contains("ac0974"));
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("INFURA_API_KEY"));
    }

    #[test]
    fn test_empty_api_key_counts_as_missing() {
        let mut config = AccessConfig::default();
        config.api_keys.insert("INFURA_API_KEY".into(), String::new());
        assert!(config.api_key("INFURA_API_KEY").is_none());
    }
}
