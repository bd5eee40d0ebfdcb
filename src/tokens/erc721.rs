//! ERC721 non-fungible tokens.
//!
//! Ownership listings use the enumerable extension when the contract reports
//! it through ERC165. Otherwise incoming `Transfer` logs over the last
//! `tokens.log_scan_block_range` blocks yield candidate ids (at most
//! `tokens.max_scan_candidates`), each confirmed with `ownerOf`.

use alloy::primitives::{Address, Bytes, FixedBytes, U256};
use alloy::rpc::types::Filter;
use alloy::sol;
use alloy::sol_types::{SolCall, SolEvent};
use futures_util::future::try_join_all;
use std::collections::HashSet;

use crate::access::{CallOptions, ChainAccess, ChainResult};
use crate::blockchain::rpc::ChainRpc;
use crate::blockchain::transaction::{call_typed, estimate_and_send, Payload, TransactionOutcome};
use crate::blockchain::types::{BlockchainError, BlockchainResult};
use crate::blockchain::validate::{parse_address, parse_hex_bytes, parse_uint};
use crate::tokens::metadata::{fetch_metadata, resolve_image};
use crate::tokens::types::{
    CollectionInfo, OwnedTokens, OwnershipMethod, TokenError, TokenMetadata, TokenOwner,
};
use crate::tokens::{at_index, ensure_contract, scan_window};

sol! {
    interface IERC721 {
        function name() external view returns (string);
        function symbol() external view returns (string);
        function totalSupply() external view returns (uint256);
        function balanceOf(address owner) external view returns (uint256);
        function ownerOf(uint256 tokenId) external view returns (address);
        function tokenURI(uint256 tokenId) external view returns (string);
        function tokenOfOwnerByIndex(address owner, uint256 index) external view returns (uint256);
        function supportsInterface(bytes4 interfaceId) external view returns (bool);
        function transferFrom(address from, address to, uint256 tokenId) external;
        function safeTransferFrom(address from, address to, uint256 tokenId, bytes data) external;

        event Transfer(address indexed from, address indexed to, uint256 indexed tokenId);
    }
}

/// ERC165 id of the ERC721 enumerable extension.
const ENUMERABLE_INTERFACE_ID: [u8; 4] = [0x78, 0x0e, 0x9d, 0x63];

fn missing_token(error: BlockchainError, token_id: U256) -> BlockchainError {
    if error.is_revert() {
        TokenError::not_found(format!("Token {token_id} does not exist")).into()
    } else {
        error
    }
}

async fn owner_of(rpc: &dyn ChainRpc, contract: Address, token_id: U256) -> BlockchainResult<Address> {
    call_typed(rpc, contract, &IERC721::ownerOfCall { tokenId: token_id })
        .await
        .map_err(|e| missing_token(e, token_id))
}

/// `supportsInterface` failures count as "not supported".
async fn is_enumerable(rpc: &dyn ChainRpc, contract: Address) -> bool {
    let call = IERC721::supportsInterfaceCall {
        interfaceId: FixedBytes(ENUMERABLE_INTERFACE_ID),
    };
    call_typed(rpc, contract, &call).await.unwrap_or(false)
}

/// ERC721 operations bound to one [`ChainAccess`].
#[derive(Debug, Clone, Copy)]
pub struct Erc721<'a> {
    access: &'a ChainAccess,
}

impl<'a> Erc721<'a> {
    pub fn new(access: &'a ChainAccess) -> Self {
        Self { access }
    }

    /// Name, symbol and (when implemented) total supply.
    pub async fn get_collection_info(
        &self,
        contract: &str,
        options: &CallOptions,
    ) -> ChainResult<CollectionInfo> {
        let result: BlockchainResult<_> = async {
            let address = parse_address(contract, "contractAddress")?;
            let connection = self.access.connect(options).await?;
            let rpc = connection.rpc();
            ensure_contract(rpc, address).await?;

            let (name, symbol) = tokio::try_join!(
                call_typed(rpc, address, &IERC721::nameCall {}),
                call_typed(rpc, address, &IERC721::symbolCall {}),
            )
            .map_err(|e| {
                if e.is_revert() {
                    TokenError::invalid_token(format!("{address} does not implement ERC721 metadata"))
                        .into()
                } else {
                    e
                }
            })?;
            let total_supply = call_typed(rpc, address, &IERC721::totalSupplyCall {})
                .await
                .ok()
                .map(|supply| supply.to_string());

            Ok(CollectionInfo {
                address,
                name,
                symbol,
                total_supply,
            })
        }
        .await;
        self.access.finish(
            "erc721_get_collection_info",
            "get NFT collection info",
            options,
            &[("contractAddress", contract.to_string())],
            result,
        )
    }

    /// Current owner; a nonexistent token is `NotFound`.
    pub async fn owner_of(
        &self,
        contract: &str,
        token_id: &str,
        options: &CallOptions,
    ) -> ChainResult<TokenOwner> {
        let result: BlockchainResult<_> = async {
            let address = parse_address(contract, "contractAddress")?;
            let id = parse_uint(token_id, "tokenId")?;
            let connection = self.access.connect(options).await?;
            let owner = owner_of(connection.rpc(), address, id).await?;
            Ok(TokenOwner {
                contract: address,
                token_id: id.to_string(),
                owner,
            })
        }
        .await;
        self.access.finish(
            "erc721_owner_of",
            "get NFT owner",
            options,
            &[("contractAddress", contract.to_string()), ("tokenId", token_id.to_string())],
            result,
        )
    }

    /// `tokenURI` resolved and fetched.
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
            let uri = call_typed(connection.rpc(), address, &IERC721::tokenURICall { tokenId: id })
                .await
                .map_err(|e| missing_token(e, id))?;

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
            "erc721_get_metadata",
            "get NFT metadata",
            options,
            &[("contractAddress", contract.to_string()), ("tokenId", token_id.to_string())],
            result,
        )
    }

    /// Token ids currently held by `owner`.
    pub async fn get_user_tokens(
        &self,
        contract: &str,
        owner: &str,
        options: &CallOptions,
    ) -> ChainResult<OwnedTokens> {
        let result: BlockchainResult<_> = async {
            let address = parse_address(contract, "contractAddress")?;
            let holder = parse_address(owner, "ownerAddress")?;
            let connection = self.access.connect(options).await?;
            let rpc = connection.rpc();
            let limits = &self.access.config().tokens;

            if is_enumerable(rpc, address).await {
                let balance = call_typed(rpc, address, &IERC721::balanceOfCall { owner: holder }).await?;
                let count = balance.saturating_to::<usize>().min(limits.max_scan_candidates);
                let lookups = (0..count).map(|index| async move {
                    let call = IERC721::tokenOfOwnerByIndexCall {
                        owner: holder,
                        index: U256::from(index),
                    };
                    call_typed(rpc, address, &call)
                        .await
                        .map_err(|e| at_index(index, e))
                });
                let ids = try_join_all(lookups).await?;
                return Ok(OwnedTokens {
                    contract: address,
                    owner: holder,
                    token_ids: ids.iter().map(U256::to_string).collect(),
                    method: OwnershipMethod::Enumerable,
                    truncated: balance > U256::from(count),
                    scanned_from_block: None,
                });
            }

            let (from_block, latest) = scan_window(rpc, limits.log_scan_block_range).await?;
            let filter = Filter::new()
                .address(address)
                .event_signature(IERC721::Transfer::SIGNATURE_HASH)
                .topic2(holder.into_word())
                .from_block(from_block)
                .to_block(latest);
            let logs = rpc.logs(&filter).await?;

            let mut seen = HashSet::new();
            let mut candidates = Vec::new();
            let mut truncated = from_block > 0;
            for topic in logs.iter().filter_map(|log| log.topics().get(3)) {
                let id = U256::from_be_bytes(topic.0);
                if seen.insert(id) {
                    if candidates.len() == limits.max_scan_candidates {
                        truncated = true;
                        break;
                    }
                    candidates.push(id);
                }
            }

            let checks = candidates.iter().enumerate().map(|(index, id)| async move {
                match owner_of(rpc, address, *id).await {
                    Ok(current) => Ok((current == holder).then_some(*id)),
                    // Burned since the transfer.
                    Err(BlockchainError::Token(_)) => Ok(None),
                    Err(e) => Err(at_index(index, e)),
                }
            });
            let owned: Vec<U256> = try_join_all(checks).await?.into_iter().flatten().collect();
            tracing::debug!(
                contract = %address,
                candidates = candidates.len(),
                owned = owned.len(),
                from_block,
                "Ownership log scan finished"
            );

            Ok(OwnedTokens {
                contract: address,
                owner: holder,
                token_ids: owned.iter().map(U256::to_string).collect(),
                method: OwnershipMethod::LogScan,
                truncated,
                scanned_from_block: Some(from_block),
            })
        }
        .await;
        self.access.finish(
            "erc721_get_user_tokens",
            "get user NFTs",
            options,
            &[("contractAddress", contract.to_string()), ("ownerAddress", owner.to_string())],
            result,
        )
    }

    /// `transferFrom(signer, to, id)`; the signer must own the token.
    pub async fn transfer(
        &self,
        contract: &str,
        to: &str,
        token_id: &str,
        options: &CallOptions,
    ) -> ChainResult<TransactionOutcome> {
        let result: BlockchainResult<_> = async {
            let address = parse_address(contract, "contractAddress")?;
            let recipient = parse_address(to, "recipient")?;
            let id = parse_uint(token_id, "tokenId")?;
            let credential = self.access.credential(options).await?;
            let from = ensure_owner(credential.connection().rpc(), address, id, credential.address()).await?;

            let data = IERC721::transferFromCall {
                from,
                to: recipient,
                tokenId: id,
            }
            .abi_encode();
            let outcome = estimate_and_send(&credential, Payload::call(address, data)).await?;
            Ok(outcome)
        }
        .await;
        self.access.finish(
            "erc721_transfer",
            "transfer NFT",
            options,
            &[
                ("contractAddress", contract.to_string()),
                ("recipient", to.to_string()),
                ("tokenId", token_id.to_string()),
            ],
            result,
        )
    }

    /// `safeTransferFrom(signer, to, id, data)`; `data` is optional hex.
    pub async fn safe_transfer(
        &self,
        contract: &str,
        to: &str,
        token_id: &str,
        data: Option<&str>,
        options: &CallOptions,
    ) -> ChainResult<TransactionOutcome> {
        let result: BlockchainResult<_> = async {
            let address = parse_address(contract, "contractAddress")?;
            let recipient = parse_address(to, "recipient")?;
            let id = parse_uint(token_id, "tokenId")?;
            let extra = data.map(|d| parse_hex_bytes(d, "data")).transpose()?.unwrap_or_default();
            let credential = self.access.credential(options).await?;
            let from = ensure_owner(credential.connection().rpc(), address, id, credential.address()).await?;

            let calldata = IERC721::safeTransferFromCall {
                from,
                to: recipient,
                tokenId: id,
                data: Bytes::from(extra),
            }
            .abi_encode();
            let outcome = estimate_and_send(&credential, Payload::call(address, calldata)).await?;
            Ok(outcome)
        }
        .await;
        self.access.finish(
            "erc721_safe_transfer",
            "safe transfer NFT",
            options,
            &[
                ("contractAddress", contract.to_string()),
                ("recipient", to.to_string()),
                ("tokenId", token_id.to_string()),
                ("data", data.unwrap_or("0x").to_string()),
            ],
            result,
        )
    }
}

async fn ensure_owner(
    rpc: &dyn ChainRpc,
    contract: Address,
    token_id: U256,
    signer: Address,
) -> BlockchainResult<Address> {
    let owner = owner_of(rpc, contract, token_id).await?;
    if owner != signer {
        return Err(TokenError::transfer_failed(format!(
            "Signer {signer} does not own token {token_id} (owner: {owner})"
        ))
        .into());
    }
    Ok(owner)
}
