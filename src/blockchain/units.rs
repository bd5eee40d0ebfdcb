//! Exact decimal ⇄ minimal-unit conversion.
//!
//! Amounts cross the boundary as decimal strings in major units and are turned
//! into `U256` minimal units by pure integer arithmetic. A fractional part longer
//! than the precision is rejected instead of rounded.

use alloy::primitives::U256;

use crate::blockchain::types::{BlockchainError, BlockchainResult};

/// Precision of the native currency (wei per ether).
pub const NATIVE_DECIMALS: u8 = 18;

/// Precision of gwei-denominated fee fields.
pub const GWEI_DECIMALS: u8 = 9;

fn pow10(exponent: u8) -> Option<U256> {
    let ten = U256::from(10u8);
    (0..exponent).try_fold(U256::from(1u8), |acc, _| acc.checked_mul(ten))
}

fn invalid_amount(amount: &str, reason: &str) -> BlockchainError {
    BlockchainError::Validation(format!("Invalid amount '{amount}': {reason}"))
}

fn split_decimal(amount: &str) -> BlockchainResult<(&str, &str)> {
    let (whole, fraction) = amount.split_once('.').unwrap_or((amount, ""));
    if whole.is_empty()
        || !whole.bytes().all(|b| b.is_ascii_digit())
        || amount.ends_with('.')
        || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid_amount(amount, "expected a non-negative decimal number"));
    }
    Ok((whole, fraction))
}

/// Check that `amount` is a non-negative decimal before its precision is known.
pub fn check_amount_shape(amount: &str) -> BlockchainResult<()> {
    split_decimal(amount).map(|_| ())
}

/// Convert a decimal string in major units to minimal units.
pub fn parse_amount(amount: &str, decimals: u8) -> BlockchainResult<U256> {
    let invalid = |reason: &str| invalid_amount(amount, reason);

    let (whole, fraction) = split_decimal(amount)?;
    if fraction.len() > decimals as usize {
        return Err(invalid(&format!(
            "more than {decimals} decimal places"
        )));
    }

    let scale = pow10(decimals).ok_or_else(|| invalid("precision exceeds 256 bits"))?;
    let whole = U256::from_str_radix(whole, 10).map_err(|_| invalid("value exceeds 256 bits"))?;
    let fraction = if decimals == 0 {
        U256::ZERO
    } else {
        let padded = format!("{fraction:0<width$}", width = decimals as usize);
        U256::from_str_radix(&padded, 10).map_err(|_| invalid("value exceeds 256 bits"))?
    };

    whole
        .checked_mul(scale)
        .and_then(|scaled| scaled.checked_add(fraction))
        .ok_or_else(|| invalid("value exceeds 256 bits"))
}

/// Convert minimal units to a canonical decimal string in major units.
///
/// Trailing fractional zeros are dropped, so `1500000` at 6 decimals renders as
/// `1.5` and whole values carry no decimal point.
pub fn format_amount(value: U256, decimals: u8) -> String {
    let digits = value.to_string();
    if decimals == 0 {
        return digits;
    }
    let places = decimals as usize;
    let padded = if digits.len() <= places {
        format!("{digits:0>width$}", width = places + 1)
    } else {
        digits
    };
    let (whole, fraction) = padded.split_at(padded.len() - places);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{fraction}")
    }
}
