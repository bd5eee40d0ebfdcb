//! Shape validation for caller-supplied strings.
//!
//! Every public entry point runs its inputs through these parsers before a
//! connection is resolved, so malformed values never reach the wire.

use alloy::eips::{BlockId, BlockNumberOrTag};
use alloy::hex;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use std::str::FromStr;

use crate::blockchain::types::{BlockchainError, BlockchainResult};

fn is_hex_body(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Parse an address: `0x` followed by exactly 40 hex characters.
///
/// Mixed-case input is accepted without enforcing the EIP-55 checksum.
pub fn parse_address(value: &str, field: &str) -> BlockchainResult<Address> {
    let body = value
        .strip_prefix("0x")
        .filter(|body| is_hex_body(body, 40))
        .ok_or_else(|| {
            BlockchainError::Validation(format!(
                "{field}: expected 0x followed by 40 hex characters, got '{value}'"
            ))
        })?;
    Address::from_str(body)
        .map_err(|e| BlockchainError::Validation(format!("{field}: {e}")))
}

/// Parse a list of addresses, naming the failing index.
pub fn parse_addresses(values: &[String], field: &str) -> BlockchainResult<Vec<Address>> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| parse_address(v, &format!("{field}[{i}]")))
        .collect()
}

/// Parse a transaction hash: `0x` followed by exactly 64 hex characters.
pub fn parse_tx_hash(value: &str) -> BlockchainResult<TxHash> {
    let body = value
        .strip_prefix("0x")
        .filter(|body| is_hex_body(body, 64))
        .ok_or_else(|| {
            BlockchainError::Validation(format!(
                "txHash: expected 0x followed by 64 hex characters, got '{value}'"
            ))
        })?;
    TxHash::from_str(body).map_err(|e| BlockchainError::Validation(format!("txHash: {e}")))
}

/// Parse hex-encoded bytes (`0x` prefix required, even length).
pub fn parse_hex_bytes(value: &str, field: &str) -> BlockchainResult<Bytes> {
    let body = value.strip_prefix("0x").ok_or_else(|| {
        BlockchainError::Validation(format!("{field}: hex data must start with 0x"))
    })?;
    hex::decode(body)
        .map(Bytes::from)
        .map_err(|e| BlockchainError::Validation(format!("{field}: invalid hex data: {e}")))
}

/// Parse a block number or tag: decimal, `0x` hex, or a named tag.
pub fn parse_block_tag(value: &str, field: &str) -> BlockchainResult<BlockNumberOrTag> {
    let tag = match value.to_ascii_lowercase().as_str() {
        "latest" => BlockNumberOrTag::Latest,
        "earliest" => BlockNumberOrTag::Earliest,
        "pending" => BlockNumberOrTag::Pending,
        "safe" => BlockNumberOrTag::Safe,
        "finalized" => BlockNumberOrTag::Finalized,
        other => {
            let parsed = match other.strip_prefix("0x") {
                Some(hex_body) => u64::from_str_radix(hex_body, 16),
                None => other.parse::<u64>(),
            };
            BlockNumberOrTag::Number(parsed.map_err(|_| {
                BlockchainError::Validation(format!(
                    "{field}: expected a block number or one of latest, earliest, pending, safe, finalized, got '{value}'"
                ))
            })?)
        }
    };
    Ok(tag)
}

/// Parse a block identifier: a block hash, or anything [`parse_block_tag`] accepts.
pub fn parse_block_id(value: &str) -> BlockchainResult<BlockId> {
    if let Some(body) = value.strip_prefix("0x") {
        if body.len() == 64 {
            let hash = parse_tx_hash(value).map_err(|_| {
                BlockchainError::Validation(format!("block: invalid block hash '{value}'"))
            })?;
            return Ok(BlockId::hash(hash));
        }
    }
    parse_block_tag(value, "block").map(BlockId::Number)
}

/// Parse an unsigned 256-bit integer given in decimal or `0x` hex (token ids).
pub fn parse_uint(value: &str, field: &str) -> BlockchainResult<U256> {
    let parsed = match value.strip_prefix("0x") {
        Some(hex_body) if !hex_body.is_empty() => U256::from_str_radix(hex_body, 16),
        _ if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) => {
            U256::from_str_radix(value, 10)
        }
        _ => {
            return Err(BlockchainError::Validation(format!(
                "{field}: expected a non-negative integer, got '{value}'"
            )))
        }
    };
    parsed.map_err(|e| BlockchainError::Validation(format!("{field}: {e}")))
}
