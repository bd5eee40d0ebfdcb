//! Multi-network EVM blockchain access library

pub mod access;
pub mod blockchain;
pub mod config;
pub mod observability;
pub mod tokens;

pub use access::{CallOptions, ChainAccess, ChainInfo, ChainResult, GasPrice, NativeBalance, SignedMessage};
pub use blockchain::logs::{EventQuery, LogQuery};
pub use blockchain::{ChainError, ErrorKind, TransactionOutcome, TxOverrides};
pub use config::AccessConfig;
pub use tokens::TokenErrorKind;
