//! ERC20 fungible tokens.
//!
//! Amounts are decimal strings in major units, converted with the token's own
//! `decimals()`. Writes check balance (and allowance for `transfer_from`)
//! before estimating gas.

use alloy::primitives::{Address, U256};
use alloy::sol;
use alloy::sol_types::SolCall;

use crate::access::{CallOptions, ChainAccess, ChainResult};
use crate::blockchain::rpc::ChainRpc;
use crate::blockchain::transaction::{call_typed, estimate_and_send, Payload, TransactionOutcome};
use crate::blockchain::types::{BlockchainError, BlockchainResult};
use crate::blockchain::units::{check_amount_shape, format_amount, parse_amount};
use crate::blockchain::validate::parse_address;
use crate::tokens::ensure_contract;
use crate::tokens::types::{FungibleInfo, TokenAllowance, TokenBalance, TokenError};

sol! {
    interface IERC20 {
        function name() external view returns (string);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function totalSupply() external view returns (uint256);
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
        function approve(address spender, uint256 amount) external returns (bool);
        function transferFrom(address from, address to, uint256 amount) external returns (bool);
    }
}

/// A revert or undecodable output on a standard getter means the contract is
/// not an ERC20.
fn not_erc20(token: Address, getter: &str) -> impl FnOnce(BlockchainError) -> BlockchainError + '_ {
    move |error| {
        if error.is_revert() || matches!(error, BlockchainError::Abi(_)) {
            TokenError::invalid_token(format!("{token} does not implement ERC20 {getter}()")).into()
        } else {
            error
        }
    }
}

async fn decimals(rpc: &dyn ChainRpc, token: Address) -> BlockchainResult<u8> {
    call_typed(rpc, token, &IERC20::decimalsCall {})
        .await
        .map_err(not_erc20(token, "decimals"))
}

async fn symbol(rpc: &dyn ChainRpc, token: Address) -> BlockchainResult<String> {
    call_typed(rpc, token, &IERC20::symbolCall {})
        .await
        .map_err(not_erc20(token, "symbol"))
}

/// ERC20 operations bound to one [`ChainAccess`].
#[derive(Debug, Clone, Copy)]
pub struct Erc20<'a> {
    access: &'a ChainAccess,
}

impl<'a> Erc20<'a> {
    pub fn new(access: &'a ChainAccess) -> Self {
        Self { access }
    }

    /// Name, symbol, decimals and total supply.
    pub async fn get_info(&self, token: &str, options: &CallOptions) -> ChainResult<FungibleInfo> {
        let result: BlockchainResult<_> = async {
            let address = parse_address(token, "tokenAddress")?;
            let connection = self.access.connect(options).await?;
            let rpc = connection.rpc();
            ensure_contract(rpc, address).await?;

            let (name, symbol, decimals, total_supply) = tokio::try_join!(
                async {
                    call_typed(rpc, address, &IERC20::nameCall {})
                        .await
                        .map_err(not_erc20(address, "name"))
                },
                symbol(rpc, address),
                decimals(rpc, address),
                async {
                    call_typed(rpc, address, &IERC20::totalSupplyCall {})
                        .await
                        .map_err(not_erc20(address, "totalSupply"))
                },
            )?;

            Ok(FungibleInfo {
                address,
                name,
                symbol,
                decimals,
                total_supply: format_amount(total_supply, decimals),
                total_supply_raw: total_supply.to_string(),
            })
        }
        .await;
        self.access.finish(
            "erc20_get_info",
            "get ERC20 token info",
            options,
            &[("tokenAddress", token.to_string())],
            result,
        )
    }

    pub async fn get_balance(
        &self,
        token: &str,
        owner: &str,
        options: &CallOptions,
    ) -> ChainResult<TokenBalance> {
        let result: BlockchainResult<_> = async {
            let token_address = parse_address(token, "tokenAddress")?;
            let owner_address = parse_address(owner, "ownerAddress")?;
            let connection = self.access.connect(options).await?;
            let rpc = connection.rpc();
            ensure_contract(rpc, token_address).await?;

            let call = IERC20::balanceOfCall { owner: owner_address };
            let (balance, decimals, symbol) = tokio::try_join!(
                async {
                    call_typed(rpc, token_address, &call)
                        .await
                        .map_err(not_erc20(token_address, "balanceOf"))
                },
                decimals(rpc, token_address),
                symbol(rpc, token_address),
            )?;

            Ok(TokenBalance {
                token: token_address,
                owner: owner_address,
                symbol,
                decimals,
                balance: format_amount(balance, decimals),
                balance_raw: balance.to_string(),
            })
        }
        .await;
        self.access.finish(
            "erc20_get_balance",
            "get ERC20 balance",
            options,
            &[("tokenAddress", token.to_string()), ("ownerAddress", owner.to_string())],
            result,
        )
    }

    pub async fn get_allowance(
        &self,
        token: &str,
        owner: &str,
        spender: &str,
        options: &CallOptions,
    ) -> ChainResult<TokenAllowance> {
        let result: BlockchainResult<_> = async {
            let token_address = parse_address(token, "tokenAddress")?;
            let owner_address = parse_address(owner, "ownerAddress")?;
            let spender_address = parse_address(spender, "spenderAddress")?;
            let connection = self.access.connect(options).await?;
            let rpc = connection.rpc();
            ensure_contract(rpc, token_address).await?;

            let call = IERC20::allowanceCall {
                owner: owner_address,
                spender: spender_address,
            };
            let (allowance, decimals, symbol) = tokio::try_join!(
                async {
                    call_typed(rpc, token_address, &call)
                        .await
                        .map_err(not_erc20(token_address, "allowance"))
                },
                decimals(rpc, token_address),
                symbol(rpc, token_address),
            )?;

            Ok(TokenAllowance {
                token: token_address,
                owner: owner_address,
                spender: spender_address,
                symbol,
                decimals,
                allowance: format_amount(allowance, decimals),
                allowance_raw: allowance.to_string(),
            })
        }
        .await;
        self.access.finish(
            "erc20_get_allowance",
            "get ERC20 allowance",
            options,
            &[
                ("tokenAddress", token.to_string()),
                ("ownerAddress", owner.to_string()),
                ("spenderAddress", spender.to_string()),
            ],
            result,
        )
    }

    /// Transfer `amount` from the signer to `to`.
    pub async fn transfer(
        &self,
        token: &str,
        to: &str,
        amount: &str,
        options: &CallOptions,
    ) -> ChainResult<TransactionOutcome> {
        let result: BlockchainResult<_> = async {
            let token_address = parse_address(token, "tokenAddress")?;
            let recipient = parse_address(to, "recipient")?;
            check_amount_shape(amount)?;

            let credential = self.access.credential(options).await?;
            let rpc = credential.connection().rpc();
            ensure_contract(rpc, token_address).await?;
            let decimals = decimals(rpc, token_address).await?;
            let value = parse_amount(amount, decimals)?;
            ensure_balance(rpc, token_address, credential.address(), value, decimals).await?;

            let data = IERC20::transferCall {
                to: recipient,
                amount: value,
            }
            .abi_encode();
            let outcome = estimate_and_send(&credential, Payload::call(token_address, data)).await?;
            Ok(outcome)
        }
        .await;
        self.access.finish(
            "erc20_transfer",
            "transfer ERC20 tokens",
            options,
            &[
                ("tokenAddress", token.to_string()),
                ("recipient", to.to_string()),
                ("amount", amount.to_string()),
            ],
            result,
        )
    }

    /// Allow `spender` to move up to `amount` of the signer's tokens.
    pub async fn approve(
        &self,
        token: &str,
        spender: &str,
        amount: &str,
        options: &CallOptions,
    ) -> ChainResult<TransactionOutcome> {
        let result: BlockchainResult<_> = async {
            let token_address = parse_address(token, "tokenAddress")?;
            let spender_address = parse_address(spender, "spenderAddress")?;
            check_amount_shape(amount)?;

            let credential = self.access.credential(options).await?;
            let rpc = credential.connection().rpc();
            ensure_contract(rpc, token_address).await?;
            let decimals = decimals(rpc, token_address).await?;
            let value = parse_amount(amount, decimals)?;

            let data = IERC20::approveCall {
                spender: spender_address,
                amount: value,
            }
            .abi_encode();
            let outcome = estimate_and_send(&credential, Payload::call(token_address, data)).await?;
            Ok(outcome)
        }
        .await;
        self.access.finish(
            "erc20_approve",
            "approve ERC20 spending",
            options,
            &[
                ("tokenAddress", token.to_string()),
                ("spenderAddress", spender.to_string()),
                ("amount", amount.to_string()),
            ],
            result,
        )
    }

    /// Move `amount` from `from` to `to` using the signer's allowance.
    pub async fn transfer_from(
        &self,
        token: &str,
        from: &str,
        to: &str,
        amount: &str,
        options: &CallOptions,
    ) -> ChainResult<TransactionOutcome> {
        let result: BlockchainResult<_> = async {
            let token_address = parse_address(token, "tokenAddress")?;
            let owner = parse_address(from, "fromAddress")?;
            let recipient = parse_address(to, "recipient")?;
            check_amount_shape(amount)?;

            let credential = self.access.credential(options).await?;
            let rpc = credential.connection().rpc();
            ensure_contract(rpc, token_address).await?;
            let decimals = decimals(rpc, token_address).await?;
            let value = parse_amount(amount, decimals)?;
            ensure_balance(rpc, token_address, owner, value, decimals).await?;

            let spender = credential.address();
            let allowance = call_typed(rpc, token_address, &IERC20::allowanceCall { owner, spender })
                .await
                .map_err(not_erc20(token_address, "allowance"))?;
            if allowance < value {
                return Err(TokenError::insufficient_allowance(format!(
                    "Allowance of {spender} from {owner} is {}, below the requested {amount}",
                    format_amount(allowance, decimals)
                ))
                .into());
            }

            let data = IERC20::transferFromCall {
                from: owner,
                to: recipient,
                amount: value,
            }
            .abi_encode();
            let outcome = estimate_and_send(&credential, Payload::call(token_address, data)).await?;
            Ok(outcome)
        }
        .await;
        self.access.finish(
            "erc20_transfer_from",
            "transfer ERC20 tokens from owner",
            options,
            &[
                ("tokenAddress", token.to_string()),
                ("fromAddress", from.to_string()),
                ("recipient", to.to_string()),
                ("amount", amount.to_string()),
            ],
            result,
        )
    }
}

async fn ensure_balance(
    rpc: &dyn ChainRpc,
    token: Address,
    owner: Address,
    required: U256,
    decimals: u8,
) -> BlockchainResult<()> {
    let balance = call_typed(rpc, token, &IERC20::balanceOfCall { owner })
        .await
        .map_err(not_erc20(token, "balanceOf"))?;
    if balance < required {
        return Err(TokenError::insufficient_balance(format!(
            "Balance of {owner} is {}, below the requested {}",
            format_amount(balance, decimals),
            format_amount(required, decimals)
        ))
        .into());
    }
    Ok(())
}
