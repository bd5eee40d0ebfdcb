//! Transaction construction and submission.
//!
//! # Call shapes
//! - [`read_call`]: non-broadcast `eth_call` of a view/pure function
//! - [`estimate_and_send`]: gas estimated first, then used as the explicit limit
//! - [`send_with_overrides`]: caller overrides merged with node-filled defaults
//! - [`broadcast_raw`]: an already-signed payload, forwarded verbatim
//!
//! Every write is signed locally and goes out through `eth_sendRawTransaction`.
//! The outcome is returned at broadcast; confirmation tracking is left to the
//! caller.

use alloy::dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt};
use alloy::eips::eip2718::Encodable2718;
use alloy::json_abi::Function;
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use serde::{Deserialize, Serialize};

use crate::blockchain::abi::{is_read_only, mutability_name};
use crate::blockchain::rpc::ChainRpc;
use crate::blockchain::types::{BlockchainError, BlockchainResult};
use crate::blockchain::units::{parse_amount, GWEI_DECIMALS};
use crate::blockchain::validate::parse_hex_bytes;
use crate::blockchain::wallet::Credential;

/// Caller-supplied gas parameters. Fee fields are decimal gwei strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TxOverrides {
    #[serde(alias = "gasLimit")]
    pub gas_limit: Option<u64>,
    #[serde(alias = "gasPrice")]
    pub gas_price: Option<String>,
    #[serde(alias = "maxFeePerGas")]
    pub max_fee_per_gas: Option<String>,
    #[serde(alias = "maxPriorityFeePerGas")]
    pub max_priority_fee_per_gas: Option<String>,
    pub nonce: Option<u64>,
    /// Accepted for compatibility and ignored; value always comes from the amount.
    pub value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeeOverride {
    None,
    Legacy(u128),
    Eip1559 {
        max_fee: Option<u128>,
        priority_fee: Option<u128>,
    },
}

/// Overrides after shape validation, amounts in wei.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedOverrides {
    gas_limit: Option<u64>,
    fees: FeeOverride,
    nonce: Option<u64>,
}

fn parse_gwei(value: &str, field: &str) -> BlockchainResult<u128> {
    let wei = parse_amount(value, GWEI_DECIMALS)
        .map_err(|e| BlockchainError::Validation(format!("{field}: {e}")))?;
    u128::try_from(wei)
        .map_err(|_| BlockchainError::Validation(format!("{field}: value is too large")))
}

impl TxOverrides {
    /// Validate shapes and convert gwei strings to wei.
    pub fn parse(&self) -> BlockchainResult<ParsedOverrides> {
        if self.value.is_some() {
            tracing::debug!("Ignoring value override; value is derived from the amount");
        }
        if self.gas_limit == Some(0) {
            return Err(BlockchainError::Validation("gasLimit: must be greater than 0".to_string()));
        }

        let gas_price = self
            .gas_price
            .as_deref()
            .map(|v| parse_gwei(v, "gasPrice"))
            .transpose()?;
        let max_fee = self
            .max_fee_per_gas
            .as_deref()
            .map(|v| parse_gwei(v, "maxFeePerGas"))
            .transpose()?;
        let priority_fee = self
            .max_priority_fee_per_gas
            .as_deref()
            .map(|v| parse_gwei(v, "maxPriorityFeePerGas"))
            .transpose()?;

        let fees = match (gas_price, max_fee, priority_fee) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                return Err(BlockchainError::Validation(
                    "overrides: gasPrice cannot be combined with maxFeePerGas or maxPriorityFeePerGas"
                        .to_string(),
                ))
            }
            (Some(price), None, None) => FeeOverride::Legacy(price),
            (None, None, None) => FeeOverride::None,
            (None, max_fee, priority_fee) => {
                if let (Some(max), Some(tip)) = (max_fee, priority_fee) {
                    if tip > max {
                        return Err(BlockchainError::Validation(
                            "overrides: maxPriorityFeePerGas exceeds maxFeePerGas".to_string(),
                        ));
                    }
                }
                FeeOverride::Eip1559 {
                    max_fee,
                    priority_fee,
                }
            }
        };

        Ok(ParsedOverrides {
            gas_limit: self.gas_limit,
            fees,
            nonce: self.nonce,
        })
    }
}

impl ParsedOverrides {
    fn with_gas_limit(gas_limit: u64) -> Self {
        Self {
            gas_limit: Some(gas_limit),
            fees: FeeOverride::None,
            nonce: None,
        }
    }
}

/// A broadcast transaction and the fields it was signed with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionOutcome {
    pub hash: TxHash,
    pub from: Address,
    pub to: Option<Address>,
    /// Wei, decimal.
    pub value: String,
    pub nonce: u64,
    pub gas_limit: u64,
    pub chain_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<String>,
    /// `legacy` or `eip1559`.
    #[serde(rename = "type")]
    pub tx_type: &'static str,
}

/// What to send: destination, payload and value in wei.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

impl Payload {
    pub fn call(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to,
            data: data.into(),
            value: U256::ZERO,
        }
    }

    pub fn transfer(to: Address, value: U256) -> Self {
        Self {
            to,
            data: Bytes::new(),
            value,
        }
    }

    fn request(&self, from: Option<Address>) -> TransactionRequest {
        let mut tx = TransactionRequest::default()
            .with_to(self.to)
            .with_value(self.value)
            .with_input(self.data.clone());
        if let Some(from) = from {
            tx.set_from(from);
        }
        tx
    }
}

/// `eth_call` of a view or pure function; mutable functions are rejected.
pub async fn read_call(
    rpc: &dyn ChainRpc,
    to: Address,
    function: &Function,
    args: &[DynSolValue],
) -> BlockchainResult<Vec<DynSolValue>> {
    if !is_read_only(function) {
        return Err(BlockchainError::WrongCallKind {
            function: function.name.clone(),
            mutability: mutability_name(function.state_mutability).to_string(),
        });
    }
    let calldata = encode_call(function, args)?;
    let output = rpc.call(Payload::call(to, calldata).request(None)).await?;
    function
        .abi_decode_output(&output)
        .map_err(|e| BlockchainError::Abi(format!("cannot decode '{}' output: {e}", function.name)))
}

/// ABI-encode `args` for `function`, selector included.
pub fn encode_call(function: &Function, args: &[DynSolValue]) -> BlockchainResult<Bytes> {
    function
        .abi_encode_input(args)
        .map(Bytes::from)
        .map_err(|e| BlockchainError::Abi(format!("cannot encode '{}' input: {e}", function.name)))
}

/// `eth_call` of a typed interface method.
pub async fn call_typed<C: SolCall>(
    rpc: &dyn ChainRpc,
    to: Address,
    call: &C,
) -> BlockchainResult<C::Return> {
    let output = rpc.call(Payload::call(to, call.abi_encode()).request(None)).await?;
    C::abi_decode_returns(&output)
        .map_err(|e| BlockchainError::Abi(format!("cannot decode {} output: {e}", C::SIGNATURE)))
}

/// Estimate gas for `payload` from the credential's address, then send with
/// exactly that limit.
pub async fn estimate_and_send(
    credential: &Credential,
    payload: Payload,
) -> BlockchainResult<TransactionOutcome> {
    let rpc = credential.connection().rpc();
    let gas_limit = rpc
        .estimate_gas(payload.request(Some(credential.address())))
        .await?;
    tracing::debug!(to = %payload.to, gas_limit, "Gas estimated");
    submit(credential, payload, ParsedOverrides::with_gas_limit(gas_limit)).await
}

/// Merge `overrides` into `payload` and send. `payload.value` always wins over
/// an override value.
pub async fn send_with_overrides(
    credential: &Credential,
    payload: Payload,
    overrides: &TxOverrides,
) -> BlockchainResult<TransactionOutcome> {
    let parsed = overrides.parse()?;
    submit(credential, payload, parsed).await
}

async fn submit(
    credential: &Credential,
    payload: Payload,
    overrides: ParsedOverrides,
) -> BlockchainResult<TransactionOutcome> {
    let connection = credential.connection();
    let rpc = connection.rpc();
    let from = credential.address();
    let chain_id = connection.chain_id().await?;

    let nonce = match overrides.nonce {
        Some(nonce) => nonce,
        None => rpc.pending_nonce(from).await?,
    };

    let mut tx = payload
        .request(Some(from))
        .with_nonce(nonce)
        .with_chain_id(chain_id);

    let (gas_price, max_fee, priority_fee) = match overrides.fees {
        FeeOverride::Legacy(price) => (Some(price), None, None),
        FeeOverride::Eip1559 {
            max_fee: Some(max_fee),
            priority_fee: Some(priority_fee),
        } => (None, Some(max_fee), Some(priority_fee)),
        FeeOverride::Eip1559 {
            max_fee,
            priority_fee,
        } => {
            let estimate = rpc.fee_estimate().await?;
            // The estimated tip must not exceed a caller-supplied cap.
            let priority_fee = match (priority_fee, max_fee) {
                (Some(tip), _) => tip,
                (None, Some(cap)) => estimate.max_priority_fee_per_gas.min(cap),
                (None, None) => estimate.max_priority_fee_per_gas,
            };
            let max_fee = max_fee.unwrap_or(estimate.max_fee_per_gas.max(priority_fee));
            (None, Some(max_fee), Some(priority_fee))
        }
        FeeOverride::None => {
            let estimate = rpc.fee_estimate().await?;
            (
                None,
                Some(estimate.max_fee_per_gas),
                Some(estimate.max_priority_fee_per_gas),
            )
        }
    };
    if let Some(price) = gas_price {
        tx.set_gas_price(price);
    }
    if let (Some(max_fee), Some(priority_fee)) = (max_fee, priority_fee) {
        tx.set_max_fee_per_gas(max_fee);
        tx.set_max_priority_fee_per_gas(priority_fee);
    }

    let gas_limit = match overrides.gas_limit {
        Some(limit) => limit,
        None => rpc.estimate_gas(tx.clone()).await?,
    };
    tx.set_gas_limit(gas_limit);

    let envelope = tx
        .build(&credential.wallet())
        .await
        .map_err(|e| BlockchainError::Wallet(format!("Signing failed: {}", e)))?;
    let raw = Bytes::from(envelope.encoded_2718());

    let hash = rpc.send_raw(raw).await?;
    tracing::info!(
        tx_hash = %hash,
        from = %from,
        to = %payload.to,
        nonce,
        chain_id,
        "Transaction broadcast"
    );

    Ok(TransactionOutcome {
        hash,
        from,
        to: Some(payload.to),
        value: payload.value.to_string(),
        nonce,
        gas_limit,
        chain_id,
        gas_price: gas_price.map(|p| p.to_string()),
        max_fee_per_gas: max_fee.map(|f| f.to_string()),
        max_priority_fee_per_gas: priority_fee.map(|f| f.to_string()),
        tx_type: if gas_price.is_some() { "legacy" } else { "eip1559" },
    })
}

/// Forward a signed transaction; the node's rejection text is kept intact.
pub async fn broadcast_raw(rpc: &dyn ChainRpc, signed_tx: &str) -> BlockchainResult<TxHash> {
    let raw = parse_hex_bytes(signed_tx.trim(), "signedTransaction")?;
    if raw.is_empty() {
        return Err(BlockchainError::Validation(
            "signedTransaction: payload is empty".to_string(),
        ));
    }
    let hash = rpc.send_raw(raw).await?;
    tracing::info!(tx_hash = %hash, "Raw transaction broadcast");
    Ok(hash)
}
