//! The internal error definition.

use thiserror::Error;

use crate::tokens::TokenError;

/// Errors raised inside the access layer.
///
/// These never cross the public boundary directly: [`crate::access::ChainAccess`]
/// and the token adapters turn them into a [`crate::blockchain::ChainError`]
/// through [`crate::blockchain::normalize::normalize`].
#[derive(Debug, Error)]
pub enum BlockchainError {
    /// Malformed caller input, caught before any network access.
    #[error("{0}")]
    Validation(String),

    /// Network name not present in the registry.
    #[error("Invalid network '{name}'. Supported networks: {supported}")]
    InvalidNetwork { name: String, supported: String },

    /// RPC URL that does not parse.
    #[error("Invalid RPC URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// A required key or signer is not configured.
    #[error("{key} is not configured")]
    MissingCredential { key: String },

    /// RPC connection or request failed, or the node rejected the request.
    #[error("{0}")]
    Rpc(String),

    /// A state-changing function was invoked through the read path.
    #[error("Function '{function}' is {mutability} and changes state; use write_contract to send a transaction")]
    WrongCallKind { function: String, mutability: String },

    /// Invalid private key format or signing failure.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Interface description could not be parsed or used.
    #[error("ABI error: {0}")]
    Abi(String),

    /// Token-domain failure.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

impl BlockchainError {
    /// True when the node reported an EVM revert rather than a transport fault.
    pub fn is_revert(&self) -> bool {
        match self {
            BlockchainError::Rpc(message) => {
                let message = message.to_ascii_lowercase();
                message.contains("revert") || message.contains("invalid opcode")
            }
            _ => false,
        }
    }
}

/// Result type for blockchain operations.
pub type BlockchainResult<T> = Result<T, BlockchainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BlockchainError::MissingCredential {
            key: "INFURA_API_KEY".to_string(),
        };
        assert_eq!(err.to_string(), "INFURA_API_KEY is not configured");

        let err = BlockchainError::InvalidNetwork {
            name: "moon".to_string(),
            supported: "mainnet, sepolia".to_string(),
        };
        assert!(err.to_string().contains("mainnet, sepolia"));
    }

    #[test]
    fn test_revert_detection() {
        let err = BlockchainError::Rpc(
            "server returned an error response: error code 3: execution reverted".to_string(),
        );
        assert!(err.is_revert());
        assert!(!BlockchainError::Rpc("connection refused".to_string()).is_revert());
        assert!(!BlockchainError::Validation("revert".to_string()).is_revert());
    }
}
