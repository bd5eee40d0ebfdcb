//! Token standard adapters.
//!
//! # Data Flow
//! ```text
//! Erc20 / Erc721 / Erc1155 (borrowing one ChainAccess)
//!     → validate inputs (addresses, ids, amount shapes, batch lengths)
//!     → resolve connection or credential
//!     → typed calls through transaction::call_typed
//!     → precondition checks (balance, allowance, ownership) → TokenError
//!     → transaction::estimate_and_send for writes
//! ```
//!
//! Token-domain failures carry a [`TokenErrorKind`] that survives
//! normalization as `ErrorKind::Token(kind)`.

pub mod erc1155;
pub mod erc20;
pub mod erc721;
pub mod metadata;
pub mod types;

pub use erc1155::Erc1155;
pub use erc20::Erc20;
pub use erc721::Erc721;
pub use types::{TokenError, TokenErrorKind};

use alloy::primitives::{Address, U256};

use crate::blockchain::rpc::ChainRpc;
use crate::blockchain::types::{BlockchainError, BlockchainResult};
use crate::blockchain::validate::parse_uint;

/// Fail with `InvalidToken` when `address` holds no code.
pub(crate) async fn ensure_contract(rpc: &dyn ChainRpc, address: Address) -> BlockchainResult<()> {
    let code = rpc.code(address).await?;
    if code.is_empty() {
        return Err(TokenError::invalid_token(format!("No contract deployed at {address}")).into());
    }
    Ok(())
}

/// Block window `[from, latest]` of at most `range` blocks ending at the head.
pub(crate) async fn scan_window(rpc: &dyn ChainRpc, range: u64) -> BlockchainResult<(u64, u64)> {
    let latest = rpc.block_number().await?;
    let from = latest.saturating_sub(range.saturating_sub(1));
    Ok((from, latest))
}

/// Attach a batch position to an RPC failure.
pub(crate) fn at_index(index: usize, error: BlockchainError) -> BlockchainError {
    match error {
        BlockchainError::Rpc(message) => BlockchainError::Rpc(format!("item {index}: {message}")),
        other => other,
    }
}

/// Parse a list of token ids, naming the failing index.
pub(crate) fn parse_token_ids(values: &[String], field: &str) -> BlockchainResult<Vec<U256>> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| parse_uint(v, &format!("{field}[{i}]")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_index_only_touches_rpc_errors() {
        let err = at_index(2, BlockchainError::Rpc("execution reverted".into()));
        assert_eq!(err.to_string(), "item 2: execution reverted");
        assert!(err.is_revert());

        let err = at_index(2, BlockchainError::Validation("bad".into()));
        assert_eq!(err.to_string(), "bad");
    }

    #[test]
    fn test_parse_token_ids_names_index() {
        let ids = parse_token_ids(&["1".into(), "0x0a".into()], "tokenIds").unwrap();
        assert_eq!(ids, vec![U256::from(1u8), U256::from(10u8)]);

        let err = parse_token_ids(&["1".into(), "-3".into()], "tokenIds").unwrap_err();
        assert!(err.to_string().starts_with("tokenIds[1]"));
    }
}
