//! Shared test doubles: a scripted RPC endpoint and a one-shot HTTP server.
#![allow(dead_code)]

use alloy::primitives::{Address, Bytes, LogData, TxHash, B256, U256};
use alloy::rpc::types::{Block, BlockId, Filter, Log, Transaction, TransactionReceipt, TransactionRequest};
use alloy::sol_types::{SolCall, SolValue};
use async_trait::async_trait;
use chain_access::blockchain::rpc::{ChainRpc, FeeEstimate, RpcConnector};
use chain_access::blockchain::types::{BlockchainError, BlockchainResult};
use chain_access::config::AccessConfig;
use chain_access::ChainAccess;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

pub const TEST_PRIVATE_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const TEST_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
pub const ALICE: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";
pub const BOB: &str = "0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC";
pub const TOKEN: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

/// Scripted [`ChainRpc`]. `eth_call` answers are keyed by selector; a
/// selector without an answer reverts.
pub struct StubRpc {
    pub chain_id: u64,
    pub block_number: u64,
    pub nonce: u64,
    pub gas: u64,
    balance: Mutex<U256>,
    code: Mutex<Bytes>,
    answers: Mutex<HashMap<[u8; 4], Bytes>>,
    logs: Mutex<Vec<Log>>,
    send_result: Mutex<Result<TxHash, String>>,
    methods: Mutex<Vec<&'static str>>,
    sent: Mutex<Vec<Bytes>>,
    calls: Mutex<Vec<Bytes>>,
    filters: Mutex<Vec<Filter>>,
}

impl StubRpc {
    pub fn new(chain_id: u64) -> Arc<Self> {
        Arc::new(Self {
            chain_id,
            block_number: 1_000,
            nonce: 7,
            gas: 21_000,
            balance: Mutex::new(U256::ZERO),
            code: Mutex::new(Bytes::from_static(&[0x60, 0x80, 0x60, 0x40])),
            answers: Mutex::new(HashMap::new()),
            logs: Mutex::new(Vec::new()),
            send_result: Mutex::new(Ok(B256::repeat_byte(0xab))),
            methods: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            filters: Mutex::new(Vec::new()),
        })
    }

    /// Answer every `C` call with `value` encoded as its single return.
    pub fn answer<C: SolCall, V: SolValue>(&self, value: V) {
        let encoded = (value,).abi_encode_params();
        self.answers.lock().unwrap().insert(C::SELECTOR, encoded.into());
    }

    pub fn answer_raw(&self, selector: [u8; 4], output: Bytes) {
        self.answers.lock().unwrap().insert(selector, output);
    }

    pub fn set_balance(&self, wei: U256) {
        *self.balance.lock().unwrap() = wei;
    }

    pub fn set_code(&self, code: Bytes) {
        *self.code.lock().unwrap() = code;
    }

    pub fn push_log(&self, address: Address, topics: Vec<B256>, data: Bytes) {
        let log = Log {
            inner: alloy::primitives::Log {
                address,
                data: LogData::new_unchecked(topics, data),
            },
            block_number: Some(self.block_number),
            ..Default::default()
        };
        self.logs.lock().unwrap().push(log);
    }

    pub fn reject_broadcasts(&self, reason: &str) {
        *self.send_result.lock().unwrap() = Err(reason.to_string());
    }

    /// RPC methods invoked so far, in order.
    pub fn methods(&self) -> Vec<&'static str> {
        self.methods.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<Bytes> {
        self.sent.lock().unwrap().clone()
    }

    /// Calldata of every `eth_call`, in order.
    pub fn calls(&self) -> Vec<Bytes> {
        self.calls.lock().unwrap().clone()
    }

    pub fn filters(&self) -> Vec<Filter> {
        self.filters.lock().unwrap().clone()
    }

    fn record(&self, method: &'static str) {
        self.methods.lock().unwrap().push(method);
    }
}

#[async_trait]
impl ChainRpc for StubRpc {
    async fn chain_id(&self) -> BlockchainResult<u64> {
        self.record("eth_chainId");
        Ok(self.chain_id)
    }

    async fn block_number(&self) -> BlockchainResult<u64> {
        self.record("eth_blockNumber");
        Ok(self.block_number)
    }

    async fn balance(&self, _address: Address) -> BlockchainResult<U256> {
        self.record("eth_getBalance");
        Ok(*self.balance.lock().unwrap())
    }

    async fn code(&self, _address: Address) -> BlockchainResult<Bytes> {
        self.record("eth_getCode");
        Ok(self.code.lock().unwrap().clone())
    }

    async fn pending_nonce(&self, _address: Address) -> BlockchainResult<u64> {
        self.record("eth_getTransactionCount");
        Ok(self.nonce)
    }

    async fn gas_price(&self) -> BlockchainResult<u128> {
        self.record("eth_gasPrice");
        Ok(2_000_000_000)
    }

    async fn fee_estimate(&self) -> BlockchainResult<FeeEstimate> {
        self.record("eth_feeHistory");
        Ok(FeeEstimate {
            max_fee_per_gas: 30_000_000_000,
            max_priority_fee_per_gas: 1_000_000_000,
        })
    }

    async fn block(&self, _id: BlockId) -> BlockchainResult<Option<Block>> {
        self.record("eth_getBlockByNumber");
        Ok(None)
    }

    async fn transaction(&self, _hash: TxHash) -> BlockchainResult<Option<Transaction>> {
        self.record("eth_getTransactionByHash");
        Ok(None)
    }

    async fn receipt(&self, _hash: TxHash) -> BlockchainResult<Option<TransactionReceipt>> {
        self.record("eth_getTransactionReceipt");
        Ok(None)
    }

    async fn call(&self, tx: TransactionRequest) -> BlockchainResult<Bytes> {
        self.record("eth_call");
        let input = tx.input.input().cloned().unwrap_or_default();
        self.calls.lock().unwrap().push(input.clone());
        let selector: [u8; 4] = input
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| BlockchainError::Rpc("execution reverted".into()))?;
        self.answers
            .lock()
            .unwrap()
            .get(&selector)
            .cloned()
            .ok_or_else(|| BlockchainError::Rpc("execution reverted".into()))
    }

    async fn estimate_gas(&self, _tx: TransactionRequest) -> BlockchainResult<u64> {
        self.record("eth_estimateGas");
        Ok(self.gas)
    }

    async fn logs(&self, filter: &Filter) -> BlockchainResult<Vec<Log>> {
        self.record("eth_getLogs");
        self.filters.lock().unwrap().push(filter.clone());
        Ok(self.logs.lock().unwrap().clone())
    }

    async fn send_raw(&self, raw: Bytes) -> BlockchainResult<TxHash> {
        self.record("eth_sendRawTransaction");
        self.sent.lock().unwrap().push(raw);
        self.send_result
            .lock()
            .unwrap()
            .clone()
            .map_err(BlockchainError::Rpc)
    }
}

/// Hands out the same [`StubRpc`] for every endpoint and counts connections.
pub struct StubConnector {
    pub rpc: Arc<StubRpc>,
    connects: AtomicUsize,
}

impl StubConnector {
    pub fn new(rpc: Arc<StubRpc>) -> Arc<Self> {
        Arc::new(Self {
            rpc,
            connects: AtomicUsize::new(0),
        })
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl RpcConnector for StubConnector {
    fn connect(&self, _endpoint: &Url) -> BlockchainResult<Arc<dyn ChainRpc>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let rpc: Arc<dyn ChainRpc> = self.rpc.clone();
        Ok(rpc)
    }
}

/// A [`ChainAccess`] defaulting to `localhost`, wired to a fresh stub.
pub fn local_access() -> (ChainAccess, Arc<StubRpc>, Arc<StubConnector>) {
    access_with(AccessConfig {
        default_network: "localhost".to_string(),
        ..AccessConfig::default()
    })
}

pub fn access_with(config: AccessConfig) -> (ChainAccess, Arc<StubRpc>, Arc<StubConnector>) {
    access_on_chain(config, 31337)
}

/// Like [`access_with`], with the endpoint reporting `chain_id`.
pub fn access_on_chain(
    config: AccessConfig,
    chain_id: u64,
) -> (ChainAccess, Arc<StubRpc>, Arc<StubConnector>) {
    let rpc = StubRpc::new(chain_id);
    let connector = StubConnector::new(rpc.clone());
    let access = ChainAccess::with_connector(config, connector.clone());
    (access, rpc, connector)
}

/// Serve `body` as `application/json` with `status` to every request on an
/// ephemeral local port. Returns the bound address.
pub async fn start_mock_backend(status: u16, body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = [0u8; 1024];
                let _ = socket.read(&mut request).await;
                let response = format!(
                    "HTTP/1.1 {status} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
                tokio::time::sleep(Duration::from_millis(10)).await;
            });
        }
    });

    addr
}
