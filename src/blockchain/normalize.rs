//! Public error type and the normalization applied at every operation boundary.

use serde::Serialize;
use thiserror::Error;

use crate::blockchain::types::BlockchainError;
use crate::tokens::TokenErrorKind;

/// Category of a normalized failure, for branching without matching on text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed address, amount, hash or other input shape.
    Validation,
    /// A connection could not be resolved or constructed.
    Network,
    /// A required key or signer is absent.
    MissingCredential,
    /// The transport or the node reported a failure.
    Provider,
    /// Read path used for a state-changing function.
    WrongCallKind,
    /// Token-domain failure.
    Token(TokenErrorKind),
    /// Fallback.
    Generic,
}

/// The single error every public operation returns.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{message}")]
pub struct ChainError {
    pub kind: ErrorKind,
    pub message: String,
    /// Operation inputs, already serialized, in the order they were given.
    pub details: Vec<(String, String)>,
}

impl ChainError {
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Token failure kind, if this is a token-domain error.
    pub fn token_kind(&self) -> Option<TokenErrorKind> {
        match self.kind {
            ErrorKind::Token(kind) => Some(kind),
            _ => None,
        }
    }
}

fn kind_of(error: &BlockchainError) -> ErrorKind {
    match error {
        BlockchainError::Validation(_) => ErrorKind::Validation,
        BlockchainError::InvalidNetwork { .. } | BlockchainError::InvalidUrl { .. } => {
            ErrorKind::Network
        }
        BlockchainError::MissingCredential { .. } => ErrorKind::MissingCredential,
        BlockchainError::Rpc(_) => ErrorKind::Provider,
        BlockchainError::WrongCallKind { .. } => ErrorKind::WrongCallKind,
        BlockchainError::Token(token) => ErrorKind::Token(token.kind),
        BlockchainError::Wallet(_) | BlockchainError::Abi(_) | BlockchainError::Other(_) => {
            ErrorKind::Generic
        }
    }
}

/// Classify and reformat a failure raised while performing `context`.
///
/// `context` reads as a verb phrase ("get balance"). `details` are the
/// operation's inputs; they are attached to every error and spelled out in the
/// message of the fallback class.
pub fn normalize(error: BlockchainError, context: &str, details: &[(&str, String)]) -> ChainError {
    let kind = kind_of(&error);
    let details: Vec<(String, String)> = details
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();

    let message = match &error {
        BlockchainError::Validation(violation) => format!("Invalid input format: {violation}"),
        BlockchainError::Rpc(message) => {
            format!("Failed to {context}: Provider error: {message}")
        }
        other if details.is_empty() => format!("Failed to {context}: {other}"),
        other => {
            let rendered: Vec<String> = details.iter().map(|(k, v)| format!("{k}={v}")).collect();
            format!("Failed to {context}: {other} Details: {}", rendered.join(", "))
        }
    };

    tracing::debug!(operation = context, kind = ?kind, error = %message, "Operation failed");
    ChainError {
        kind,
        message,
        details,
    }
}
