//! Token-domain errors and result shapes.

use alloy::primitives::Address;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Token failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenErrorKind {
    /// The address holds no contract, or not one of the expected standard.
    InvalidToken,
    InsufficientBalance,
    InsufficientAllowance,
    /// The token id does not exist.
    NotFound,
    /// Metadata could not be fetched or parsed.
    MetadataError,
    /// A precondition of the transfer does not hold.
    TransferFailed,
}

/// A token-domain failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TokenError {
    pub kind: TokenErrorKind,
    pub message: String,
}

impl TokenError {
    pub fn new(kind: TokenErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::new(TokenErrorKind::InvalidToken, message)
    }

    pub fn insufficient_balance(message: impl Into<String>) -> Self {
        Self::new(TokenErrorKind::InsufficientBalance, message)
    }

    pub fn insufficient_allowance(message: impl Into<String>) -> Self {
        Self::new(TokenErrorKind::InsufficientAllowance, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(TokenErrorKind::NotFound, message)
    }

    pub fn metadata(message: impl Into<String>) -> Self {
        Self::new(TokenErrorKind::MetadataError, message)
    }

    pub fn transfer_failed(message: impl Into<String>) -> Self {
        Self::new(TokenErrorKind::TransferFailed, message)
    }
}

/// ERC20 contract description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FungibleInfo {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    /// Major units.
    pub total_supply: String,
    pub total_supply_raw: String,
}

/// ERC20 balance of one holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub token: Address,
    pub owner: Address,
    pub symbol: String,
    pub decimals: u8,
    /// Major units.
    pub balance: String,
    pub balance_raw: String,
}

/// ERC20 allowance granted by `owner` to `spender`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAllowance {
    pub token: Address,
    pub owner: Address,
    pub spender: Address,
    pub symbol: String,
    pub decimals: u8,
    pub allowance: String,
    pub allowance_raw: String,
}

/// ERC721 collection description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionInfo {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    /// Only present when the contract implements `totalSupply`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_supply: Option<String>,
}

/// Current owner of an ERC721 token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenOwner {
    pub contract: Address,
    pub token_id: String,
    pub owner: Address,
}

/// Metadata document of one token.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMetadata {
    pub contract: Address,
    pub token_id: String,
    /// URI as reported by the contract.
    pub uri: String,
    /// Where the document was actually read from; `None` for inline data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_uri: Option<String>,
    /// `image` field resolved the same way as the document URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub metadata: Value,
}

/// How an ownership listing was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipMethod {
    /// ERC721 enumerable extension.
    Enumerable,
    /// Explicit token id list checked with `balanceOfBatch`.
    IdList,
    /// Transfer-log scan over a bounded block window.
    LogScan,
}

/// ERC721 tokens held by one owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnedTokens {
    pub contract: Address,
    pub owner: Address,
    pub token_ids: Vec<String>,
    pub method: OwnershipMethod,
    /// True when a scan bound was hit and the listing may be incomplete.
    pub truncated: bool,
    /// First block examined by a log scan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scanned_from_block: Option<u64>,
}

/// ERC1155 balance of one (owner, id) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenHolding {
    pub owner: Address,
    pub token_id: String,
    pub balance: String,
}

/// ERC1155 holdings of one owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiTokenHoldings {
    pub contract: Address,
    pub owner: Address,
    pub holdings: Vec<TokenHolding>,
    pub method: OwnershipMethod,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scanned_from_block: Option<u64>,
}
