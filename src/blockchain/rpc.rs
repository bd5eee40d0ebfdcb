//! JSON-RPC seam.
//!
//! # Responsibilities
//! - Define [`ChainRpc`], the only interface through which the crate touches the wire
//! - Implement it over an alloy HTTP provider ([`AlloyRpc`])
//! - Produce one fresh RPC handle per call through an [`RpcConnector`]
//!
//! No timeout or retry policy is applied here; a stalled request returns when
//! the transport itself gives up.

use alloy::eips::BlockId;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{Block, Filter, Log, Transaction, TransactionReceipt, TransactionRequest};
use alloy::transports::TransportResult;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use url::Url;

use crate::blockchain::types::{BlockchainError, BlockchainResult};
use crate::observability::metrics;

/// EIP-1559 fee suggestion from the node, in wei.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeEstimate {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

/// Read and broadcast primitives of an EVM JSON-RPC endpoint.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// `eth_chainId`
    async fn chain_id(&self) -> BlockchainResult<u64>;

    /// `eth_blockNumber`
    async fn block_number(&self) -> BlockchainResult<u64>;

    /// `eth_getBalance` at the latest block.
    async fn balance(&self, address: Address) -> BlockchainResult<U256>;

    /// `eth_getCode` at the latest block.
    async fn code(&self, address: Address) -> BlockchainResult<Bytes>;

    /// `eth_getTransactionCount` at the pending block.
    async fn pending_nonce(&self, address: Address) -> BlockchainResult<u64>;

    /// `eth_gasPrice`
    async fn gas_price(&self) -> BlockchainResult<u128>;

    /// Fee caps derived from `eth_feeHistory`.
    async fn fee_estimate(&self) -> BlockchainResult<FeeEstimate>;

    async fn block(&self, id: BlockId) -> BlockchainResult<Option<Block>>;

    async fn transaction(&self, hash: TxHash) -> BlockchainResult<Option<Transaction>>;

    async fn receipt(&self, hash: TxHash) -> BlockchainResult<Option<TransactionReceipt>>;

    /// `eth_call` against the latest block.
    async fn call(&self, tx: TransactionRequest) -> BlockchainResult<Bytes>;

    async fn estimate_gas(&self, tx: TransactionRequest) -> BlockchainResult<u64>;

    /// `eth_getLogs`, in the order the node returns them.
    async fn logs(&self, filter: &Filter) -> BlockchainResult<Vec<Log>>;

    /// `eth_sendRawTransaction`; the payload is forwarded untouched.
    async fn send_raw(&self, raw: Bytes) -> BlockchainResult<TxHash>;
}

/// Opens RPC handles. One handle per operation; nothing is pooled.
pub trait RpcConnector: Send + Sync {
    fn connect(&self, endpoint: &Url) -> BlockchainResult<Arc<dyn ChainRpc>>;
}

/// Connector producing [`AlloyRpc`] handles over HTTP.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpConnector;

impl RpcConnector for HttpConnector {
    fn connect(&self, endpoint: &Url) -> BlockchainResult<Arc<dyn ChainRpc>> {
        Ok(Arc::new(AlloyRpc::connect_http(endpoint.clone())))
    }
}

/// [`ChainRpc`] backed by an alloy provider.
#[derive(Clone)]
pub struct AlloyRpc {
    provider: Arc<dyn Provider + Send + Sync>,
    /// Host only; the full URL may embed an API key.
    host: String,
}

impl AlloyRpc {
    /// Build an HTTP provider. No request is sent until the first call.
    pub fn connect_http(endpoint: Url) -> Self {
        let host = endpoint.host_str().unwrap_or("unknown").to_string();
        let provider = Arc::new(ProviderBuilder::new().connect_http(endpoint))
            as Arc<dyn Provider + Send + Sync>;
        Self { provider, host }
    }

    async fn observe<T, F>(&self, method: &'static str, request: F) -> BlockchainResult<T>
    where
        F: Future<Output = TransportResult<T>>,
    {
        let result = request.await;
        metrics::record_rpc_call(method, result.is_ok());
        result.map_err(|e| {
            tracing::debug!(method, host = %self.host, error = %e, "RPC request failed");
            BlockchainError::Rpc(e.to_string())
        })
    }
}

#[async_trait]
impl ChainRpc for AlloyRpc {
    async fn chain_id(&self) -> BlockchainResult<u64> {
        self.observe("eth_chainId", async { self.provider.get_chain_id().await })
            .await
    }

    async fn block_number(&self) -> BlockchainResult<u64> {
        self.observe("eth_blockNumber", async { self.provider.get_block_number().await })
            .await
    }

    async fn balance(&self, address: Address) -> BlockchainResult<U256> {
        self.observe("eth_getBalance", async { self.provider.get_balance(address).await })
            .await
    }

    async fn code(&self, address: Address) -> BlockchainResult<Bytes> {
        self.observe("eth_getCode", async { self.provider.get_code_at(address).await })
            .await
    }

    async fn pending_nonce(&self, address: Address) -> BlockchainResult<u64> {
        self.observe("eth_getTransactionCount", async {
            self.provider.get_transaction_count(address).pending().await
        })
        .await
    }

    async fn gas_price(&self) -> BlockchainResult<u128> {
        self.observe("eth_gasPrice", async { self.provider.get_gas_price().await })
            .await
    }

    async fn fee_estimate(&self) -> BlockchainResult<FeeEstimate> {
        let estimate = self
            .observe("eth_feeHistory", async { self.provider.estimate_eip1559_fees().await })
            .await?;
        Ok(FeeEstimate {
            max_fee_per_gas: estimate.max_fee_per_gas,
            max_priority_fee_per_gas: estimate.max_priority_fee_per_gas,
        })
    }

    async fn block(&self, id: BlockId) -> BlockchainResult<Option<Block>> {
        self.observe("eth_getBlock", async { self.provider.get_block(id).await })
            .await
    }

    async fn transaction(&self, hash: TxHash) -> BlockchainResult<Option<Transaction>> {
        self.observe("eth_getTransactionByHash", async {
            self.provider.get_transaction_by_hash(hash).await
        })
        .await
    }

    async fn receipt(&self, hash: TxHash) -> BlockchainResult<Option<TransactionReceipt>> {
        self.observe("eth_getTransactionReceipt", async {
            self.provider.get_transaction_receipt(hash).await
        })
        .await
    }

    async fn call(&self, tx: TransactionRequest) -> BlockchainResult<Bytes> {
        self.observe("eth_call", async { self.provider.call(tx).await })
            .await
    }

    async fn estimate_gas(&self, tx: TransactionRequest) -> BlockchainResult<u64> {
        self.observe("eth_estimateGas", async { self.provider.estimate_gas(tx).await })
            .await
    }

    async fn logs(&self, filter: &Filter) -> BlockchainResult<Vec<Log>> {
        self.observe("eth_getLogs", async { self.provider.get_logs(filter).await })
            .await
    }

    async fn send_raw(&self, raw: Bytes) -> BlockchainResult<TxHash> {
        let pending = self
            .observe("eth_sendRawTransaction", async {
                self.provider.send_raw_transaction(&raw).await
            })
            .await?;
        Ok(*pending.tx_hash())
    }
}

impl std::fmt::Debug for AlloyRpc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlloyRpc").field("host", &self.host).finish()
    }
}
