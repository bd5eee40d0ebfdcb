//! ERC1155 multi-tokens.
//!
//! Balances are raw integer unit counts. Batch inputs are length-checked
//! before any network access.

use alloy::primitives::{Address, Bytes, U256};
use alloy::rpc::types::Filter;
use alloy::sol;
use alloy::sol_types::{SolCall, SolEvent};
use std::collections::BTreeSet;

use crate::access::{CallOptions, ChainAccess, ChainResult};
use crate::blockchain::rpc::ChainRpc;
use crate::blockchain::transaction::{call_typed, estimate_and_send, Payload, TransactionOutcome};
use crate::blockchain::types::{BlockchainError, BlockchainResult};
use crate::blockchain::units::parse_amount;
use crate::blockchain::validate::{parse_address, parse_addresses, parse_hex_bytes, parse_uint};
use crate::tokens::metadata::{fetch_metadata, resolve_image, substitute_id};
use crate::tokens::types::{
    MultiTokenHoldings, OwnershipMethod, TokenError, TokenHolding, TokenMetadata,
};
use crate::tokens::{parse_token_ids, scan_window};

sol! {
    interface IERC1155 {
        function balanceOf(address account, uint256 id) external view returns (uint256);
        function balanceOfBatch(address[] accounts, uint256[] ids) external view returns (uint256[]);
        function uri(uint256 id) external view returns (string);
        function isApprovedForAll(address account, address operator) external view returns (bool);
        function safeTransferFrom(address from, address to, uint256 id, uint256 amount, bytes data) external;
        function safeBatchTransferFrom(address from, address to, uint256[] ids, uint256[] amounts, bytes data) external;

        event TransferSingle(address indexed operator, address indexed from, address indexed to, uint256 id, uint256 value);
        event TransferBatch(address indexed operator, address indexed from, address indexed to, uint256[] ids, uint256[] values);
    }
}

fn ensure_same_length(left: (&str, usize), right: (&str, usize)) -> BlockchainResult<()> {
    if left.1 != right.1 {
        return Err(BlockchainError::Validation(format!(
            "{} and {} must have the same length (got {} and {})",
            left.0, right.0, left.1, right.1
        )));
    }
    Ok(())
}

fn parse_unit_amounts(values: &[String], field: &str) -> BlockchainResult<Vec<U256>> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            parse_amount(v, 0).map_err(|e| BlockchainError::Validation(format!("{field}[{i}]: {e}")))
        })
        .collect()
}

fn optional_data(data: Option<&str>) -> BlockchainResult<Bytes> {
    Ok(data
        .map(|d| parse_hex_bytes(d, "data"))
        .transpose()?
        .map(Bytes::from)
        .unwrap_or_default())
}

async fn balances(
    rpc: &dyn ChainRpc,
    contract: Address,
    accounts: Vec<Address>,
    ids: Vec<U256>,
) -> BlockchainResult<Vec<U256>> {
    let expected = accounts.len();
    let balances = call_typed(rpc, contract, &IERC1155::balanceOfBatchCall { accounts, ids }).await?;
    if balances.len() != expected {
        return Err(BlockchainError::Rpc(format!(
            "balanceOfBatch returned {} balances for {expected} queries",
            balances.len()
        )));
    }
    Ok(balances)
}

/// ERC1155 operations bound to one [`ChainAccess`].
#[derive(Debug, Clone, Copy)]
pub struct Erc1155<'a> {
    access: &'a ChainAccess,
}

impl<'a> Erc1155<'a> {
    pub fn new(access: &'a ChainAccess) -> Self {
        Self { access }
    }

    pub async fn balance_of(
        &self,
        contract: &str,
        owner: &str,
        token_id: &str,
        options: &CallOptions,
    ) -> ChainResult<TokenHolding> {
        let result: BlockchainResult<_> = async {
            let address = parse_address(contract, "contractAddress")?;
            let account = parse_address(owner, "ownerAddress")?;
            let id = parse_uint(token_id, "tokenId")?;
            let connection = self.access.connect(options).await?;

            let call = IERC1155::balanceOfCall { account, id };
            let balance = call_typed(connection.rpc(), address, &call).await?;
            Ok(TokenHolding {
                owner: account,
                token_id: id.to_string(),
                balance: balance.to_string(),
            })
        }
        .await;
        self.access.finish(
            "erc1155_balance_of",
            "get ERC1155 balance",
            options,
            &[
                ("contractAddress", contract.to_string()),
                ("ownerAddress", owner.to_string()),
                ("tokenId", token_id.to_string()),
            ],
            result,
        )
    }

    /// Pairwise balances; result `i` is `owners[i]`'s balance of `token_ids[i]`.
    pub async fn batch_balance_of(
        &self,
        contract: &str,
        owners: &[String],
        token_ids: &[String],
        options: &CallOptions,
    ) -> ChainResult<Vec<TokenHolding>> {
        let result: BlockchainResult<_> = async {
            ensure_same_length(("owners", owners.len()), ("tokenIds", token_ids.len()))?;
            let address = parse_address(contract, "contractAddress")?;
            let accounts = parse_addresses(owners, "owners")?;
            let ids = parse_token_ids(token_ids, "tokenIds")?;
            let connection = self.access.connect(options).await?;

            let amounts = balances(connection.rpc(), address, accounts.clone(), ids.clone()).await?;
            let holdings = accounts
                .into_iter()
                .zip(ids)
                .zip(amounts)
                .map(|((owner, id), balance)| TokenHolding {
                    owner,
                    token_id: id.to_string(),
                    balance: balance.to_string(),
                })
                .collect::<Vec<_>>();
            Ok(holdings)
        }
        .await;
        self.access.finish(
            "erc1155_batch_balance_of",
            "get ERC1155 batch balances",
            options,
            &[("contractAddress", contract.to_string())],
            result,
        )
    }

    /// `uri(id)` with `{id}` substituted, then fetched.
    pub async fn get_metadata(
        &self,
        contract: &str,
        token_id: &str,
        options: &CallOptions,
    ) -> ChainResult<TokenMetadata> {
        let result: BlockchainResult<_> = async {
            let address = parse_address(contract, "contractAddress")?;
            let id = parse_uint(token_id, "tokenId")?;
            let connection = self.access.connect(options).await?;
            let template = call_typed(connection.rpc(), address, &IERC1155::uriCall { id })
                .await
                .map_err(|e| {
                    if e.is_revert() {
                        TokenError::not_found(format!("No URI for token {id}")).into()
                    } else {
                        e
                    }
                })?;

            let uri = substitute_id(&template, id);
            let gateway = &self.access.config().tokens.ipfs_gateway;
            let (location, metadata) = fetch_metadata(self.access.http(), &uri, gateway).await?;
            Ok(TokenMetadata {
                contract: address,
                token_id: id.to_string(),
                image_url: resolve_image(&metadata, gateway),
                resolved_uri: location.map(String::from),
                uri,
                metadata,
            })
        }
        .await;
        self.access.finish(
            "erc1155_get_metadata",
            "get ERC1155 metadata",
            options,
            &[("contractAddress", contract.to_string()), ("tokenId", token_id.to_string())],
            result,
        )
    }

    /// Nonzero holdings of `owner`. With `token_ids` only those ids are
    /// checked; otherwise candidate ids come from incoming transfer logs.
    pub async fn get_user_tokens(
        &self,
        contract: &str,
        owner: &str,
        token_ids: Option<&[String]>,
        options: &CallOptions,
    ) -> ChainResult<MultiTokenHoldings> {
        let result: BlockchainResult<_> = async {
            let address = parse_address(contract, "contractAddress")?;
            let holder = parse_address(owner, "ownerAddress")?;
            let explicit = token_ids
                .map(|ids| parse_token_ids(ids, "tokenIds"))
                .transpose()?;
            let connection = self.access.connect(options).await?;
            let rpc = connection.rpc();
            let limits = &self.access.config().tokens;

            let (ids, method, truncated, scanned_from_block) = match explicit {
                Some(ids) => (ids, OwnershipMethod::IdList, false, None),
                None => {
                    let (from_block, latest) = scan_window(rpc, limits.log_scan_block_range).await?;
                    let filter = Filter::new()
                        .address(address)
                        .event_signature(vec![
                            IERC1155::TransferSingle::SIGNATURE_HASH,
                            IERC1155::TransferBatch::SIGNATURE_HASH,
                        ])
                        .topic3(holder.into_word())
                        .from_block(from_block)
                        .to_block(latest);
                    let logs = rpc.logs(&filter).await?;

                    let mut seen = BTreeSet::new();
                    for log in &logs {
                        if let Ok(single) = IERC1155::TransferSingle::decode_log_data(log.data()) {
                            seen.insert(single.id);
                        } else if let Ok(batch) = IERC1155::TransferBatch::decode_log_data(log.data()) {
                            seen.extend(batch.ids);
                        }
                    }
                    let capped = seen.len() > limits.max_scan_candidates;
                    let ids: Vec<U256> = seen.into_iter().take(limits.max_scan_candidates).collect();
                    (ids, OwnershipMethod::LogScan, from_block > 0 || capped, Some(from_block))
                }
            };

            let mut holdings = Vec::new();
            if !ids.is_empty() {
                let amounts = balances(rpc, address, vec![holder; ids.len()], ids.clone()).await?;
                holdings = ids
                    .iter()
                    .zip(amounts)
                    .filter(|(_, balance)| !balance.is_zero())
                    .map(|(id, balance)| TokenHolding {
                        owner: holder,
                        token_id: id.to_string(),
                        balance: balance.to_string(),
                    })
                    .collect();
            }

            Ok(MultiTokenHoldings {
                contract: address,
                owner: holder,
                holdings,
                method,
                truncated,
                scanned_from_block,
            })
        }
        .await;
        self.access.finish(
            "erc1155_get_user_tokens",
            "get user ERC1155 tokens",
            options,
            &[("contractAddress", contract.to_string()), ("ownerAddress", owner.to_string())],
            result,
        )
    }

    /// Transfer `amount` units of `token_id`. `from` defaults to the signer;
    /// any other holder must have approved the signer as operator.
    #[allow(clippy::too_many_arguments)]
    pub async fn safe_transfer_from(
        &self,
        contract: &str,
        from: Option<&str>,
        to: &str,
        token_id: &str,
        amount: &str,
        data: Option<&str>,
        options: &CallOptions,
    ) -> ChainResult<TransactionOutcome> {
        let result: BlockchainResult<_> = async {
            let address = parse_address(contract, "contractAddress")?;
            let source = from.map(|f| parse_address(f, "fromAddress")).transpose()?;
            let recipient = parse_address(to, "recipient")?;
            let id = parse_uint(token_id, "tokenId")?;
            let value = parse_amount(amount, 0)?;
            let extra = optional_data(data)?;

            let credential = self.access.credential(options).await?;
            let rpc = credential.connection().rpc();
            let holder = source.unwrap_or_else(|| credential.address());
            ensure_operator(rpc, address, holder, credential.address()).await?;

            let call = IERC1155::balanceOfCall { account: holder, id };
            let balance = call_typed(rpc, address, &call).await?;
            if balance < value {
                return Err(TokenError::insufficient_balance(format!(
                    "Balance of {holder} for token {id} is {balance}, below the requested {value}"
                ))
                .into());
            }

            let calldata = IERC1155::safeTransferFromCall {
                from: holder,
                to: recipient,
                id,
                amount: value,
                data: extra,
            }
            .abi_encode();
            let outcome = estimate_and_send(&credential, Payload::call(address, calldata)).await?;
            Ok(outcome)
        }
        .await;
        self.access.finish(
            "erc1155_safe_transfer_from",
            "transfer ERC1155 tokens",
            options,
            &[
                ("contractAddress", contract.to_string()),
                ("recipient", to.to_string()),
                ("tokenId", token_id.to_string()),
                ("amount", amount.to_string()),
            ],
            result,
        )
    }

    /// Batch variant of [`Erc1155::safe_transfer_from`]; `token_ids[i]` moves
    /// `amounts[i]` units.
    #[allow(clippy::too_many_arguments)]
    pub async fn safe_batch_transfer_from(
        &self,
        contract: &str,
        from: Option<&str>,
        to: &str,
        token_ids: &[String],
        amounts: &[String],
        data: Option<&str>,
        options: &CallOptions,
    ) -> ChainResult<TransactionOutcome> {
        let result: BlockchainResult<_> = async {
            ensure_same_length(("tokenIds", token_ids.len()), ("amounts", amounts.len()))?;
            if token_ids.is_empty() {
                return Err(BlockchainError::Validation("tokenIds must not be empty".into()));
            }
            let address = parse_address(contract, "contractAddress")?;
            let source = from.map(|f| parse_address(f, "fromAddress")).transpose()?;
            let recipient = parse_address(to, "recipient")?;
            let ids = parse_token_ids(token_ids, "tokenIds")?;
            let values = parse_unit_amounts(amounts, "amounts")?;
            let extra = optional_data(data)?;

            let credential = self.access.credential(options).await?;
            let rpc = credential.connection().rpc();
            let holder = source.unwrap_or_else(|| credential.address());
            ensure_operator(rpc, address, holder, credential.address()).await?;

            let held = balances(rpc, address, vec![holder; ids.len()], ids.clone()).await?;
            if let Some(i) = (0..ids.len()).find(|&i| held[i] < values[i]) {
                return Err(TokenError::insufficient_balance(format!(
                    "Balance of {holder} for token {} is {}, below the requested {}",
                    ids[i], held[i], values[i]
                ))
                .into());
            }

            let calldata = IERC1155::safeBatchTransferFromCall {
                from: holder,
                to: recipient,
                ids,
                amounts: values,
                data: extra,
            }
            .abi_encode();
            let outcome = estimate_and_send(&credential, Payload::call(address, calldata)).await?;
            Ok(outcome)
        }
        .await;
        self.access.finish(
            "erc1155_safe_batch_transfer_from",
            "batch transfer ERC1155 tokens",
            options,
            &[
                ("contractAddress", contract.to_string()),
                ("recipient", to.to_string()),
                ("tokenIds", token_ids.join(",")),
                ("amounts", amounts.join(",")),
            ],
            result,
        )
    }
}

async fn ensure_operator(
    rpc: &dyn ChainRpc,
    contract: Address,
    holder: Address,
    operator: Address,
) -> BlockchainResult<()> {
    if holder == operator {
        return Ok(());
    }
    let call = IERC1155::isApprovedForAllCall {
        account: holder,
        operator,
    };
    if !call_typed(rpc, contract, &call).await? {
        return Err(TokenError::transfer_failed(format!(
            "{operator} is not an approved operator for {holder}"
        ))
        .into());
    }
    Ok(())
}
