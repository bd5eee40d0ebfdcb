//! Blockchain access layer.
//!
//! # Data Flow
//! ```text
//! caller strings
//!     → validate.rs / units.rs (shape checks, exact amounts; no network)
//!     → network.rs (name or URL → Connection over rpc.rs)
//!     → wallet.rs (key precedence → Credential bound to that Connection)
//!     → transaction.rs + abi.rs (read, estimate-then-send, override-merge, raw)
//!     → logs.rs (raw logs, decoded events)
//!     → normalize.rs + serialize.rs (one ChainError, lossless text)
//! ```
//!
//! # Security Constraints
//! - Private keys never appear in logs, errors or serialized output
//! - Full RPC URLs may embed API keys; only hosts are logged
//! - Connections and credentials live for one call

pub mod abi;
pub mod logs;
pub mod network;
pub mod normalize;
pub mod rpc;
pub mod serialize;
pub mod transaction;
pub mod types;
pub mod units;
pub mod validate;
pub mod wallet;

pub use network::{Connection, NetworkDescriptor, NetworkResolver};
pub use normalize::{normalize, ChainError, ErrorKind};
pub use rpc::{AlloyRpc, ChainRpc, HttpConnector, RpcConnector};
pub use transaction::{TransactionOutcome, TxOverrides};
pub use types::{BlockchainError, BlockchainResult};
pub use wallet::{Credential, SignerResolver};
