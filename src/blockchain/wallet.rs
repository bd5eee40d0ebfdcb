//! Signer resolution and local signing.
//!
//! # Security
//! - Keys arrive already resolved (explicit argument, instance setter, config)
//! - Keys are never logged, serialized or echoed in error messages
//! - A [`Credential`] lives for one call and is dropped with its connection

use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::{Signature, Signer};

use crate::blockchain::network::{Connection, NetworkResolver};
use crate::blockchain::types::{BlockchainError, BlockchainResult};
use crate::config::validation::is_private_key_shape;

/// Configuration key holding the default signing key.
pub const PRIVATE_KEY_ENV_VAR: &str = "CHAIN_ACCESS_PRIVATE_KEY";

/// Parse a hex private key (with or without `0x`).
///
/// The error never contains the input.
pub fn parse_private_key(private_key_hex: &str) -> BlockchainResult<PrivateKeySigner> {
    let private_key_hex = private_key_hex.trim();
    if !is_private_key_shape(private_key_hex) {
        return Err(BlockchainError::Validation(
            "privateKey: expected 64 hex characters with optional 0x prefix".to_string(),
        ));
    }
    let key_hex = private_key_hex.strip_prefix("0x").unwrap_or(private_key_hex);
    key_hex.parse().map_err(|_| {
        BlockchainError::Validation("privateKey: not a valid secp256k1 private key".to_string())
    })
}

/// A signer bound to the connection it will submit through.
pub struct Credential {
    signer: PrivateKeySigner,
    connection: Connection,
}

impl Credential {
    pub fn new(signer: PrivateKeySigner, connection: Connection) -> Self {
        Self { signer, connection }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Network wallet used to sign transaction envelopes.
    pub fn wallet(&self) -> EthereumWallet {
        EthereumWallet::from(self.signer.clone())
    }

    /// Sign arbitrary message bytes (with Ethereum prefix).
    pub async fn sign_message(&self, message: &[u8]) -> BlockchainResult<Signature> {
        self.signer
            .sign_message(message)
            .await
            .map_err(|e| BlockchainError::Wallet(format!("Message signing failed: {}", e)))
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("address", &self.signer.address())
            .field("connection", &self.connection)
            .finish()
    }
}

/// Picks the signing key for one call.
///
/// Precedence: explicit override, then the instance-bound signer, then the
/// configured key.
pub struct SignerResolver<'a> {
    networks: &'a NetworkResolver<'a>,
    instance_signer: Option<&'a PrivateKeySigner>,
}

impl<'a> SignerResolver<'a> {
    pub fn new(
        networks: &'a NetworkResolver<'a>,
        instance_signer: Option<&'a PrivateKeySigner>,
    ) -> Self {
        Self {
            networks,
            instance_signer,
        }
    }

    /// Select and parse the key without touching the network.
    pub fn select(&self, override_key: Option<&str>) -> BlockchainResult<PrivateKeySigner> {
        if let Some(key) = override_key.filter(|key| !key.trim().is_empty()) {
            return parse_private_key(key);
        }
        if let Some(signer) = self.instance_signer {
            return Ok(signer.clone());
        }
        match self.networks.config().private_key.as_deref() {
            Some(key) if !key.trim().is_empty() => parse_private_key(key),
            _ => Err(BlockchainError::MissingCredential {
                key: PRIVATE_KEY_ENV_VAR.to_string(),
            }),
        }
    }

    /// Resolve a credential bound to the connection for `identifier`.
    pub async fn resolve(
        &self,
        override_key: Option<&str>,
        identifier: Option<&str>,
        chain_id_hint: Option<u64>,
    ) -> BlockchainResult<Credential> {
        let signer = self.select(override_key)?;
        let connection = self.networks.resolve(identifier, chain_id_hint).await?;
        tracing::debug!(
            address = %signer.address(),
            network = %connection.network().name,
            "Signer resolved"
        );
        Ok(Credential::new(signer, connection))
    }
}
