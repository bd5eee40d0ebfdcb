//! Network registry and connection resolution.
//!
//! # Responsibilities
//! - Map a network name or RPC URL to a fresh [`Connection`]
//! - Attach API credentials to hosted RPC templates
//! - Treat the endpoint as the authority on its chain id
//!
//! Nothing here is cached: descriptors are rebuilt from the static registry and
//! every resolution opens a new RPC handle.

use serde::Serialize;
use std::sync::Arc;
use url::Url;

use crate::blockchain::rpc::{ChainRpc, RpcConnector};
use crate::blockchain::types::{BlockchainError, BlockchainResult};
use crate::config::AccessConfig;

/// API key required by the hosted RPC templates.
pub const INFURA_API_KEY: &str = "INFURA_API_KEY";

/// Every API key name the registry may ask for.
pub const API_KEY_NAMES: &[&str] = &[INFURA_API_KEY];

struct NetworkEntry {
    name: &'static str,
    chain_id: u64,
    testnet: bool,
    currency: (&'static str, &'static str),
    /// `{key}` is replaced by the API key named in `api_key`.
    rpc_template: &'static str,
    api_key: Option<&'static str>,
}

const ETHER: (&str, &str) = ("Ether", "ETH");
const POL: (&str, &str) = ("POL", "POL");

const fn infura(
    name: &'static str,
    chain_id: u64,
    testnet: bool,
    currency: (&'static str, &'static str),
    rpc_template: &'static str,
) -> NetworkEntry {
    NetworkEntry {
        name,
        chain_id,
        testnet,
        currency,
        rpc_template,
        api_key: Some(INFURA_API_KEY),
    }
}

const REGISTRY: &[NetworkEntry] = &[
    infura("mainnet", 1, false, ETHER, "https://mainnet.infura.io/v3/{key}"),
    infura("sepolia", 11_155_111, true, ETHER, "https://sepolia.infura.io/v3/{key}"),
    infura("holesky", 17_000, true, ETHER, "https://holesky.infura.io/v3/{key}"),
    infura("polygon", 137, false, POL, "https://polygon-mainnet.infura.io/v3/{key}"),
    infura("polygon-amoy", 80_002, true, POL, "https://polygon-amoy.infura.io/v3/{key}"),
    infura("arbitrum", 42_161, false, ETHER, "https://arbitrum-mainnet.infura.io/v3/{key}"),
    infura("arbitrum-sepolia", 421_614, true, ETHER, "https://arbitrum-sepolia.infura.io/v3/{key}"),
    infura("optimism", 10, false, ETHER, "https://optimism-mainnet.infura.io/v3/{key}"),
    infura("optimism-sepolia", 11_155_420, true, ETHER, "https://optimism-sepolia.infura.io/v3/{key}"),
    infura("base", 8_453, false, ETHER, "https://base-mainnet.infura.io/v3/{key}"),
    infura("base-sepolia", 84_532, true, ETHER, "https://base-sepolia.infura.io/v3/{key}"),
    infura("linea", 59_144, false, ETHER, "https://linea-mainnet.infura.io/v3/{key}"),
    NetworkEntry {
        name: "localhost",
        chain_id: 31_337,
        testnet: true,
        currency: ETHER,
        rpc_template: "http://127.0.0.1:8545",
        api_key: None,
    },
];

fn find_entry(name: &str) -> Option<&'static NetworkEntry> {
    REGISTRY
        .iter()
        .find(|entry| entry.name.eq_ignore_ascii_case(name.trim()))
}

fn is_url_identifier(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// True when `name` is a registry network.
pub fn is_known_network(name: &str) -> bool {
    find_entry(name).is_some()
}

fn supported_names() -> String {
    REGISTRY
        .iter()
        .map(|entry| entry.name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Native currency of a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl Default for NativeCurrency {
    fn default() -> Self {
        Self {
            name: ETHER.0.to_string(),
            symbol: ETHER.1.to_string(),
            decimals: crate::blockchain::units::NATIVE_DECIMALS,
        }
    }
}

/// What is known about a network before talking to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkDescriptor {
    /// Registry name or the RPC URL as given.
    pub name: String,
    /// Registry chain id; `None` for raw URLs.
    pub chain_id: Option<u64>,
    pub is_default: bool,
    pub is_testnet: bool,
    pub native_currency: NativeCurrency,
}

impl NetworkDescriptor {
    fn from_entry(entry: &NetworkEntry, is_default: bool) -> Self {
        Self {
            name: entry.name.to_string(),
            chain_id: Some(entry.chain_id),
            is_default,
            is_testnet: entry.testnet,
            native_currency: NativeCurrency {
                name: entry.currency.0.to_string(),
                symbol: entry.currency.1.to_string(),
                decimals: crate::blockchain::units::NATIVE_DECIMALS,
            },
        }
    }

    fn from_url(url: &str, is_default: bool) -> Self {
        Self {
            name: url.to_string(),
            chain_id: None,
            is_default,
            is_testnet: false,
            native_currency: NativeCurrency::default(),
        }
    }
}

/// Every registry network, flagging the configured default.
pub fn list_networks(default_network: &str) -> Vec<NetworkDescriptor> {
    REGISTRY
        .iter()
        .map(|entry| {
            NetworkDescriptor::from_entry(entry, entry.name.eq_ignore_ascii_case(default_network))
        })
        .collect()
}

/// A live, call-scoped connection to one network.
#[derive(Clone)]
pub struct Connection {
    rpc: Arc<dyn ChainRpc>,
    network: NetworkDescriptor,
    chain_id: Option<u64>,
    warnings: Vec<String>,
}

impl Connection {
    pub fn rpc(&self) -> &dyn ChainRpc {
        self.rpc.as_ref()
    }

    pub fn network(&self) -> &NetworkDescriptor {
        &self.network
    }

    /// Chain-id mismatch warnings recorded during resolution.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Chain id this connection is bound to, asking the endpoint when the
    /// registry does not know it.
    pub async fn chain_id(&self) -> BlockchainResult<u64> {
        match self.chain_id {
            Some(id) => Ok(id),
            None => self.rpc.chain_id().await,
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("network", &self.network.name)
            .field("chain_id", &self.chain_id)
            .field("warnings", &self.warnings)
            .finish()
    }
}

/// Resolves network identifiers against one configuration.
pub struct NetworkResolver<'a> {
    config: &'a AccessConfig,
    connector: &'a dyn RpcConnector,
}

impl<'a> NetworkResolver<'a> {
    pub fn new(config: &'a AccessConfig, connector: &'a dyn RpcConnector) -> Self {
        Self { config, connector }
    }

    pub fn config(&self) -> &'a AccessConfig {
        self.config
    }

    /// Descriptor and endpoint for `identifier`, without opening anything.
    pub fn describe(&self, identifier: Option<&str>) -> BlockchainResult<(NetworkDescriptor, Url)> {
        let identifier = identifier
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(self.config.default_network.as_str());
        let is_default = identifier.eq_ignore_ascii_case(&self.config.default_network);

        if let Some(entry) = find_entry(identifier) {
            let endpoint = match entry.api_key {
                Some(key_name) => {
                    let key = self.config.api_key(key_name).ok_or_else(|| {
                        BlockchainError::MissingCredential {
                            key: key_name.to_string(),
                        }
                    })?;
                    entry.rpc_template.replace("{key}", key)
                }
                None => entry.rpc_template.to_string(),
            };
            let url = Url::parse(&endpoint).map_err(|e| BlockchainError::InvalidUrl {
                url: entry.rpc_template.to_string(),
                reason: e.to_string(),
            })?;
            return Ok((NetworkDescriptor::from_entry(entry, is_default), url));
        }

        if is_url_identifier(identifier) {
            let url = Url::parse(identifier).map_err(|e| BlockchainError::InvalidUrl {
                url: identifier.to_string(),
                reason: e.to_string(),
            })?;
            if url.host_str().map_or(true, str::is_empty) {
                return Err(BlockchainError::InvalidUrl {
                    url: identifier.to_string(),
                    reason: "missing host".to_string(),
                });
            }
            return Ok((NetworkDescriptor::from_url(identifier, is_default), url));
        }

        Err(BlockchainError::InvalidNetwork {
            name: identifier.to_string(),
            supported: supported_names(),
        })
    }

    /// Open a connection for `identifier` (default network when absent).
    ///
    /// A `chain_id_hint` is checked against `eth_chainId`. A disagreement is
    /// recorded as a warning and the connection stays bound to the endpoint's
    /// real chain id. Without a hint, registry networks make no call here.
    pub async fn resolve(
        &self,
        identifier: Option<&str>,
        chain_id_hint: Option<u64>,
    ) -> BlockchainResult<Connection> {
        let (network, endpoint) = self.describe(identifier)?;
        let rpc = self.connector.connect(&endpoint)?;

        // With a hint to check, the endpoint's own answer is the reference.
        let chain_id = match chain_id_hint {
            Some(_) => Some(rpc.chain_id().await?),
            None => network.chain_id,
        };

        let mut warnings = Vec::new();
        if let (Some(actual), Some(hint)) = (chain_id, chain_id_hint) {
            if actual != hint {
                let warning = format!(
                    "Chain ID hint {hint} does not match network '{}' (chain ID {actual}); using {actual}",
                    network.name
                );
                tracing::warn!(
                    network = %network.name,
                    hint,
                    chain_id = actual,
                    "Chain ID hint mismatch"
                );
                warnings.push(warning);
            }
        }

        tracing::debug!(
            network = %network.name,
            host = endpoint.host_str().unwrap_or_default(),
            chain_id = ?chain_id,
            "Connection resolved"
        );

        Ok(Connection {
            rpc,
            network,
            chain_id,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::rpc::HttpConnector;

    fn config_with_key() -> AccessConfig {
        let mut config = AccessConfig::default();
        config
            .api_keys
            .insert(INFURA_API_KEY.to_string(), "test-key".to_string());
        config
    }

    #[test]
    fn test_registry_lookup() {
        assert!(is_known_network("mainnet"));
        assert!(is_known_network("Base-Sepolia"));
        assert!(!is_known_network("atlantis"));
    }

    #[test]
    fn test_list_networks_flags_default() {
        let networks = list_networks("sepolia");
        assert_eq!(networks.len(), REGISTRY.len());
        let defaults: Vec<&str> = networks
            .iter()
            .filter(|n| n.is_default)
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(defaults, vec!["sepolia"]);
        let polygon = networks.iter().find(|n| n.name == "polygon").unwrap();
        assert_eq!(polygon.native_currency.symbol, "POL");
        assert_eq!(polygon.chain_id, Some(137));
    }

    #[test]
    fn test_describe_fills_api_key() {
        let config = config_with_key();
        let resolver = NetworkResolver::new(&config, &HttpConnector);
        let (network, url) = resolver.describe(Some("sepolia")).unwrap();
        assert_eq!(network.chain_id, Some(11_155_111));
        assert!(network.is_testnet);
        assert_eq!(url.as_str(), "https://sepolia.infura.io/v3/test-key");
    }

    #[test]
    fn test_missing_api_key() {
        let config = AccessConfig::default();
        let resolver = NetworkResolver::new(&config, &HttpConnector);
        let err = resolver.describe(None).unwrap_err();
        assert!(matches!(
            err,
            BlockchainError::MissingCredential { ref key } if key == INFURA_API_KEY
        ));
    }

    #[test]
    fn test_localhost_needs_no_key() {
        let config = AccessConfig::default();
        let resolver = NetworkResolver::new(&config, &HttpConnector);
        let (network, url) = resolver.describe(Some("localhost")).unwrap();
        assert_eq!(network.chain_id, Some(31_337));
        assert_eq!(url.host_str(), Some("127.0.0.1"));
    }

    #[test]
    fn test_url_identifiers() {
        let config = AccessConfig::default();
        let resolver = NetworkResolver::new(&config, &HttpConnector);

        let (network, _) = resolver.describe(Some("https://rpc.example.org/v1")).unwrap();
        assert_eq!(network.name, "https://rpc.example.org/v1");
        assert_eq!(network.chain_id, None);

        let err = resolver.describe(Some("http://")).unwrap_err();
        assert!(matches!(err, BlockchainError::InvalidUrl { .. }));
    }

    #[test]
    fn test_unknown_name_lists_supported() {
        let config = AccessConfig::default();
        let resolver = NetworkResolver::new(&config, &HttpConnector);
        let err = resolver.describe(Some("atlantis")).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("atlantis"));
        assert!(message.contains("mainnet, sepolia"));
        assert!(message.contains("localhost"));
    }
}
