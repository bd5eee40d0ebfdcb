//! The public entry point.
//!
//! [`ChainAccess`] owns one [`AccessConfig`] plus an optional instance-bound
//! signer. Every operation validates its inputs, resolves a fresh connection
//! (and credential, for writes), does its work and normalizes any failure into
//! a [`ChainError`] before returning. Nothing set for a single call outlives it.
//!
//! The setters take `&mut self`: the last writer wins, and sharing an instance
//! across tasks while mutating it requires the caller's own synchronization.

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, TxHash, U256};
use alloy::rpc::types::{Block, Transaction, TransactionReceipt, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use alloy::network::TransactionBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::blockchain::abi::{coerce_args, parse_abi, resolve_function};
use crate::blockchain::logs::{self, EventQuery, EventRecord, LogQuery, LogRecord};
use crate::blockchain::network::{self, is_known_network, Connection, NetworkDescriptor, NetworkResolver};
use crate::blockchain::normalize::{normalize, ChainError};
use crate::blockchain::rpc::{HttpConnector, RpcConnector};
use crate::blockchain::serialize::serialize;
use crate::blockchain::transaction::{
    self, broadcast_raw, read_call, send_with_overrides, Payload, TransactionOutcome, TxOverrides,
};
use crate::blockchain::types::{BlockchainError, BlockchainResult};
use crate::blockchain::units::{format_amount, parse_amount, GWEI_DECIMALS};
use crate::blockchain::validate::{parse_address, parse_block_id, parse_hex_bytes, parse_tx_hash};
use crate::blockchain::wallet::{parse_private_key, Credential, SignerResolver};
use crate::config::AccessConfig;
use crate::observability::metrics;
use crate::tokens::{Erc1155, Erc20, Erc721};

/// Result of every public operation.
pub type ChainResult<T> = Result<T, ChainError>;

/// Per-call routing and signing options. Nothing here persists past the call.
#[derive(Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CallOptions {
    /// Registry name or RPC URL; the instance default when absent.
    pub network: Option<String>,
    /// Expected chain id. A mismatch is reported as a warning, never enforced.
    pub chain_id: Option<u64>,
    /// Signing key overriding the instance and configured keys. Writes only.
    pub private_key: Option<String>,
}

impl CallOptions {
    pub fn on(network: impl Into<String>) -> Self {
        Self {
            network: Some(network.into()),
            ..Self::default()
        }
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn with_private_key(mut self, private_key: impl Into<String>) -> Self {
        self.private_key = Some(private_key.into());
        self
    }
}

impl std::fmt::Debug for CallOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallOptions")
            .field("network", &self.network)
            .field("chain_id", &self.chain_id)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Native currency balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeBalance {
    pub address: Address,
    pub network: String,
    pub wei: String,
    /// Major units.
    pub balance: String,
    pub symbol: String,
}

/// Live view of a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainInfo {
    pub network: NetworkDescriptor,
    pub chain_id: u64,
    pub block_number: u64,
    pub warnings: Vec<String>,
}

/// Current legacy gas price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GasPrice {
    pub wei: String,
    pub gwei: String,
}

/// An EIP-191 personal-message signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedMessage {
    pub address: Address,
    pub message: String,
    pub signature: String,
}

/// Instance-owned access to EVM networks and token contracts.
pub struct ChainAccess {
    config: AccessConfig,
    connector: Arc<dyn RpcConnector>,
    signer: Option<PrivateKeySigner>,
    http: reqwest::Client,
}

impl ChainAccess {
    /// Access over HTTP JSON-RPC.
    pub fn new(config: AccessConfig) -> Self {
        Self::with_connector(config, Arc::new(HttpConnector))
    }

    /// Access through a custom connector (alternative transports, test doubles).
    pub fn with_connector(config: AccessConfig, connector: Arc<dyn RpcConnector>) -> Self {
        Self {
            config,
            connector,
            signer: None,
            http: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &AccessConfig {
        &self.config
    }

    pub fn default_network(&self) -> &str {
        &self.config.default_network
    }

    /// Change the network used when an operation names none.
    pub fn set_default_network(&mut self, network: &str) -> ChainResult<()> {
        let network = network.trim();
        let result = if is_known_network(network) {
            Ok(())
        } else {
            self.networks().describe(Some(network)).map(|_| ())
        };
        let result = result.map(|_| {
            self.config.default_network = network.to_string();
            tracing::info!(network = %network, "Default network changed");
        });
        self.finish(
            "set_default_network",
            "set default network",
            &CallOptions::default(),
            &[("network", network.to_string())],
            result,
        )
    }

    /// Bind a signing key to this instance; explicit per-call keys still win.
    pub fn set_signer(&mut self, private_key: &str) -> ChainResult<Address> {
        let result = parse_private_key(private_key).map(|signer| {
            let address = signer.address();
            self.signer = Some(signer);
            tracing::info!(address = %address, "Instance signer set");
            address
        });
        self.finish("set_signer", "set signer", &CallOptions::default(), &[], result)
    }

    /// Drop the instance-bound signer; the configured key applies again.
    pub fn clear_signer(&mut self) {
        self.signer = None;
    }

    pub fn erc20(&self) -> Erc20<'_> {
        Erc20::new(self)
    }

    pub fn erc721(&self) -> Erc721<'_> {
        Erc721::new(self)
    }

    pub fn erc1155(&self) -> Erc1155<'_> {
        Erc1155::new(self)
    }

    pub(crate) fn networks(&self) -> NetworkResolver<'_> {
        NetworkResolver::new(&self.config, self.connector.as_ref())
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) async fn connect(&self, options: &CallOptions) -> BlockchainResult<Connection> {
        self.networks()
            .resolve(options.network.as_deref(), options.chain_id)
            .await
    }

    pub(crate) async fn credential(&self, options: &CallOptions) -> BlockchainResult<Credential> {
        let networks = self.networks();
        let signers = SignerResolver::new(&networks, self.signer.as_ref());
        let credential = signers
            .resolve(
                options.private_key.as_deref(),
                options.network.as_deref(),
                options.chain_id,
            )
            .await?;
        Ok(credential)
    }

    /// Record the outcome and normalize the error, if any.
    pub(crate) fn finish<T>(
        &self,
        operation: &'static str,
        context: &str,
        options: &CallOptions,
        details: &[(&str, String)],
        result: BlockchainResult<T>,
    ) -> ChainResult<T> {
        metrics::record_operation(operation, result.is_ok());
        result.map_err(|error| {
            let mut details = details.to_vec();
            if options.network.is_some() {
                details.push(("network", serialize(&options.network)));
            }
            normalize(error, context, &details)
        })
    }

    /// Every registry network, with the current default flagged.
    pub fn list_networks(&self) -> Vec<NetworkDescriptor> {
        network::list_networks(&self.config.default_network)
    }

    pub async fn get_chain_info(&self, options: &CallOptions) -> ChainResult<ChainInfo> {
        let result: BlockchainResult<_> = async {
            let connection = self.connect(options).await?;
            let chain_id = connection.chain_id().await?;
            let block_number = connection.rpc().block_number().await?;
            Ok(ChainInfo {
                network: connection.network().clone(),
                chain_id,
                block_number,
                warnings: connection.warnings().to_vec(),
            })
        }
        .await;
        self.finish("get_chain_info", "get chain info", options, &[], result)
    }

    pub async fn get_balance(&self, address: &str, options: &CallOptions) -> ChainResult<NativeBalance> {
        let result: BlockchainResult<_> = async {
            let owner = parse_address(address, "address")?;
            let connection = self.connect(options).await?;
            let wei = connection.rpc().balance(owner).await?;
            let currency = &connection.network().native_currency;
            Ok(NativeBalance {
                address: owner,
                network: connection.network().name.clone(),
                wei: wei.to_string(),
                balance: format_amount(wei, currency.decimals),
                symbol: currency.symbol.clone(),
            })
        }
        .await;
        self.finish(
            "get_balance",
            "get balance",
            options,
            &[("address", address.to_string())],
            result,
        )
    }

    pub async fn get_block_number(&self, options: &CallOptions) -> ChainResult<u64> {
        let result: BlockchainResult<_> = async {
            let connection = self.connect(options).await?;
            let number = connection.rpc().block_number().await?;
            Ok(number)
        }
        .await;
        self.finish("get_block_number", "get block number", options, &[], result)
    }

    /// Block by number, hash or tag (`latest` when absent), without full transactions.
    pub async fn get_block(&self, block: Option<&str>, options: &CallOptions) -> ChainResult<Block> {
        let block_ref = block.unwrap_or("latest");
        let result: BlockchainResult<_> = async {
            let id = parse_block_id(block_ref)?;
            let connection = self.connect(options).await?;
            let block = connection.rpc().block(id).await?;
            block.ok_or_else(|| BlockchainError::Other(format!("Block {block_ref} not found")))
        }
        .await;
        self.finish(
            "get_block",
            "get block",
            options,
            &[("block", block_ref.to_string())],
            result,
        )
    }

    pub async fn get_transaction(&self, hash: &str, options: &CallOptions) -> ChainResult<Transaction> {
        let result: BlockchainResult<_> = async {
            let tx_hash = parse_tx_hash(hash)?;
            let connection = self.connect(options).await?;
            let transaction = connection.rpc().transaction(tx_hash).await?;
            transaction.ok_or_else(|| BlockchainError::Other(format!("Transaction {tx_hash} not found")))
        }
        .await;
        self.finish(
            "get_transaction",
            "get transaction",
            options,
            &[("txHash", hash.to_string())],
            result,
        )
    }

    pub async fn get_transaction_receipt(
        &self,
        hash: &str,
        options: &CallOptions,
    ) -> ChainResult<TransactionReceipt> {
        let result: BlockchainResult<_> = async {
            let tx_hash = parse_tx_hash(hash)?;
            let connection = self.connect(options).await?;
            let receipt = connection.rpc().receipt(tx_hash).await?;
            receipt.ok_or_else(|| {
                BlockchainError::Other(format!(
                    "Receipt for {tx_hash} not found (transaction unknown or still pending)"
                ))
            })
        }
        .await;
        self.finish(
            "get_transaction_receipt",
            "get transaction receipt",
            options,
            &[("txHash", hash.to_string())],
            result,
        )
    }

    /// True when `address` holds contract code.
    pub async fn is_contract(&self, address: &str, options: &CallOptions) -> ChainResult<bool> {
        let result: BlockchainResult<_> = async {
            let target = parse_address(address, "address")?;
            let connection = self.connect(options).await?;
            let code = connection.rpc().code(target).await?;
            Ok(!code.is_empty())
        }
        .await;
        self.finish(
            "is_contract",
            "check contract code",
            options,
            &[("address", address.to_string())],
            result,
        )
    }

    pub async fn get_gas_price(&self, options: &CallOptions) -> ChainResult<GasPrice> {
        let result: BlockchainResult<_> = async {
            let wei = self.connect(options).await?.rpc().gas_price().await?;
            Ok(GasPrice {
                wei: wei.to_string(),
                gwei: format_amount(U256::from(wei), GWEI_DECIMALS),
            })
        }
        .await;
        self.finish("get_gas_price", "get gas price", options, &[], result)
    }

    /// `eth_estimateGas` for a plain transaction. `value` is in major units.
    pub async fn estimate_gas(
        &self,
        to: &str,
        value: Option<&str>,
        data: Option<&str>,
        from: Option<&str>,
        options: &CallOptions,
    ) -> ChainResult<u64> {
        let result: BlockchainResult<_> = async {
            let to_address = parse_address(to, "to")?;
            let from_address = from.map(|f| parse_address(f, "from")).transpose()?;
            let input = data.map(|d| parse_hex_bytes(d, "data")).transpose()?.unwrap_or_default();
            let connection = self.connect(options).await?;
            let decimals = connection.network().native_currency.decimals;
            let wei = value.map(|v| parse_amount(v, decimals)).transpose()?.unwrap_or_default();

            let mut request = TransactionRequest::default()
                .with_to(to_address)
                .with_value(wei)
                .with_input(input);
            if let Some(from_address) = from_address {
                request.set_from(from_address);
            }
            let gas = connection.rpc().estimate_gas(request).await?;
            Ok(gas)
        }
        .await;
        self.finish(
            "estimate_gas",
            "estimate gas",
            options,
            &[("to", to.to_string()), ("value", serialize(&value))],
            result,
        )
    }

    /// Address of the signer that a write with these options would use.
    pub fn wallet_address(&self, options: &CallOptions) -> ChainResult<Address> {
        let networks = self.networks();
        let result = SignerResolver::new(&networks, self.signer.as_ref())
            .select(options.private_key.as_deref())
            .map(|signer| signer.address());
        self.finish("wallet_address", "get wallet address", options, &[], result)
    }

    /// EIP-191 signature of `message` by the resolved signer.
    pub async fn sign_message(&self, message: &str, options: &CallOptions) -> ChainResult<SignedMessage> {
        let result: BlockchainResult<_> = async {
            let credential = self.credential(options).await?;
            let signature = credential.sign_message(message.as_bytes()).await?;
            Ok(SignedMessage {
                address: credential.address(),
                message: message.to_string(),
                signature: format!("0x{}", alloy::hex::encode(signature.as_bytes())),
            })
        }
        .await;
        self.finish("sign_message", "sign message", options, &[], result)
    }

    /// Send native currency. `amount` is in major units; `overrides.value` is ignored.
    pub async fn send_native(
        &self,
        to: &str,
        amount: &str,
        overrides: &TxOverrides,
        options: &CallOptions,
    ) -> ChainResult<TransactionOutcome> {
        let result: BlockchainResult<_> = async {
            let recipient = parse_address(to, "to")?;
            crate::blockchain::units::check_amount_shape(amount)?;
            overrides.parse()?;
            let credential = self.credential(options).await?;
            let decimals = credential.connection().network().native_currency.decimals;
            let value = parse_amount(amount, decimals)?;
            let outcome =
                send_with_overrides(&credential, Payload::transfer(recipient, value), overrides)
                    .await?;
            Ok(outcome)
        }
        .await;
        self.finish(
            "send_native",
            "send transaction",
            options,
            &[("to", to.to_string()), ("amount", amount.to_string())],
            result,
        )
    }

    /// Call a view or pure function and return its serialized outputs.
    ///
    /// A single output is rendered on its own; several render as a JSON array.
    pub async fn read_contract(
        &self,
        address: &str,
        abi: &str,
        function_name: &str,
        args: &[Value],
        options: &CallOptions,
    ) -> ChainResult<String> {
        let result: BlockchainResult<_> = async {
            let contract = parse_address(address, "contractAddress")?;
            let abi = parse_abi(abi)?;
            let function = resolve_function(&abi, function_name, args.len())?;
            let values = coerce_args(function, args)?;
            let connection = self.connect(options).await?;
            let mut outputs = read_call(connection.rpc(), contract, function, &values).await?;
            Ok(if outputs.len() == 1 {
                serialize(&outputs.remove(0))
            } else {
                serialize(&DynSolValue::Tuple(outputs))
            })
        }
        .await;
        self.finish(
            "read_contract",
            "read contract",
            options,
            &[
                ("contractAddress", address.to_string()),
                ("functionName", function_name.to_string()),
                ("args", serialize(args)),
            ],
            result,
        )
    }

    /// Send a state-changing contract call. `value` is native currency in major
    /// units and only allowed for payable functions.
    #[allow(clippy::too_many_arguments)]
    pub async fn write_contract(
        &self,
        address: &str,
        abi: &str,
        function_name: &str,
        args: &[Value],
        value: Option<&str>,
        overrides: &TxOverrides,
        options: &CallOptions,
    ) -> ChainResult<TransactionOutcome> {
        let result: BlockchainResult<_> = async {
            let contract = parse_address(address, "contractAddress")?;
            let abi = parse_abi(abi)?;
            let function = resolve_function(&abi, function_name, args.len())?;
            let values = coerce_args(function, args)?;
            let data = transaction::encode_call(function, &values)?;
            if let Some(value) = value {
                crate::blockchain::units::check_amount_shape(value)?;
            }
            overrides.parse()?;

            let credential = self.credential(options).await?;
            let decimals = credential.connection().network().native_currency.decimals;
            let wei = value.map(|v| parse_amount(v, decimals)).transpose()?.unwrap_or_default();
            if !wei.is_zero() && function.state_mutability != alloy::json_abi::StateMutability::Payable {
                return Err(BlockchainError::Validation(format!(
                    "value: function '{}' is not payable",
                    function.name
                )));
            }
            let payload = Payload {
                to: contract,
                data,
                value: wei,
            };
            let outcome = send_with_overrides(&credential, payload, overrides).await?;
            Ok(outcome)
        }
        .await;
        self.finish(
            "write_contract",
            "write contract",
            options,
            &[
                ("contractAddress", address.to_string()),
                ("functionName", function_name.to_string()),
                ("args", serialize(args)),
                ("value", serialize(&value)),
            ],
            result,
        )
    }

    /// Broadcast an already-signed transaction without touching it.
    pub async fn send_raw_transaction(&self, signed_tx: &str, options: &CallOptions) -> ChainResult<TxHash> {
        let result: BlockchainResult<_> = async {
            parse_hex_bytes(signed_tx.trim(), "signedTransaction")?;
            let connection = self.connect(options).await?;
            let hash = broadcast_raw(connection.rpc(), signed_tx).await?;
            Ok(hash)
        }
        .await;
        self.finish("send_raw_transaction", "send raw transaction", options, &[], result)
    }

    /// Raw logs in node order.
    pub async fn query_logs(&self, query: &LogQuery, options: &CallOptions) -> ChainResult<Vec<LogRecord>> {
        let result: BlockchainResult<_> = async {
            let prepared = query.prepare()?;
            let connection = self.connect(options).await?;
            let records = logs::query_logs(connection.rpc(), &prepared).await?;
            Ok(records)
        }
        .await;
        self.finish(
            "query_logs",
            "query logs",
            options,
            &[
                ("address", serialize(&query.address)),
                ("fromBlock", serialize(&query.from_block)),
                ("toBlock", serialize(&query.to_block)),
            ],
            result,
        )
    }

    /// Logs of one contract decoded against its interface; undecodable records
    /// come back raw.
    pub async fn contract_events(
        &self,
        query: &EventQuery,
        options: &CallOptions,
    ) -> ChainResult<Vec<EventRecord>> {
        let result: BlockchainResult<_> = async {
            let prepared = query.prepare()?;
            let connection = self.connect(options).await?;
            let records = logs::contract_events(connection.rpc(), &prepared).await?;
            Ok(records)
        }
        .await;
        self.finish(
            "contract_events",
            "get contract events",
            options,
            &[
                ("contractAddress", query.address.clone()),
                ("eventName", serialize(&query.event_name)),
                ("fromBlock", serialize(&query.from_block)),
                ("toBlock", serialize(&query.to_block)),
            ],
            result,
        )
    }
}

impl std::fmt::Debug for ChainAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainAccess")
            .field("config", &self.config)
            .field("signer", &self.signer.as_ref().map(|s| s.address()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::normalize::ErrorKind;

    const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_set_default_network() {
        let mut access = ChainAccess::new(AccessConfig::default());
        access.set_default_network("sepolia").unwrap();
        assert_eq!(access.default_network(), "sepolia");
        access.set_default_network("http://127.0.0.1:8545").unwrap();
        assert_eq!(access.default_network(), "http://127.0.0.1:8545");

        let err = access.set_default_network("atlantis").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(access.default_network(), "http://127.0.0.1:8545");
    }

    #[test]
    fn test_signer_setters_and_wallet_address() {
        let mut access = ChainAccess::new(AccessConfig::default());
        let err = access.wallet_address(&CallOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingCredential);

        let address = access.set_signer(TEST_PRIVATE_KEY).unwrap();
        assert_eq!(access.wallet_address(&CallOptions::default()).unwrap(), address);
        assert!(!format!("{access:?}").contains(TEST_PRIVATE_KEY));

        access.clear_signer();
        assert!(access.wallet_address(&CallOptions::default()).is_err());
    }

    #[test]
    fn test_bad_signer_is_validation_error() {
        let mut access = ChainAccess::new(AccessConfig::default());
        let err = access.set_signer("0x1234").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.message().starts_with("Invalid input format: privateKey"));
    }

    #[test]
    fn test_call_options_redact_key() {
        let options = CallOptions::on("sepolia")
            .with_chain_id(11_155_111)
            .with_private_key(TEST_PRIVATE_KEY);
        let debug = format!("{options:?}");
        assert!(debug.contains("sepolia"));
        assert!(!debug.contains(TEST_PRIVATE_KEY));
    }

    #[test]
    fn test_list_networks_tracks_default() {
        let mut access = ChainAccess::new(AccessConfig::default());
        access.set_default_network("base").unwrap();
        let defaults: Vec<String> = access
            .list_networks()
            .into_iter()
            .filter(|n| n.is_default)
            .map(|n| n.name)
            .collect();
        assert_eq!(defaults, vec!["base".to_string()]);
    }
}
