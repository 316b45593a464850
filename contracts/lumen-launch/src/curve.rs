use casper_types::U256;

use crate::error::LaunchError;
use crate::params::BPS_DENOMINATOR;

/// Fixed-point scale for spot prices (12 decimals)
pub const PRICE_SCALE: u64 = 1_000_000_000_000;

/// A tax amount and how it is divided between its three recipients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaxSplit {
    pub total: U256,
    pub platform: U256,
    pub creator: U256,
    pub holders: U256,
}

fn bps_of(amount: U256, bps: u64) -> Result<U256, LaunchError> {
    amount
        .checked_mul(U256::from(bps))
        .map(|scaled| scaled / U256::from(BPS_DENOMINATOR))
        .ok_or(LaunchError::ArithmeticOverflow)
}

fn ceil_div(numerator: U256, denominator: U256) -> Result<U256, LaunchError> {
    if denominator.is_zero() {
        return Err(LaunchError::ArithmeticOverflow);
    }
    let quotient = numerator / denominator;
    if (numerator % denominator).is_zero() {
        Ok(quotient)
    } else {
        quotient
            .checked_add(U256::one())
            .ok_or(LaunchError::ArithmeticOverflow)
    }
}

/// Take `tax_bps` of `amount` and divide it between platform, creator and holders.
///
/// Platform and creator parts are floored; holders receive the remainder so the
/// three parts always add up to `total`.
pub fn split_tax(
    amount: U256,
    tax_bps: u64,
    platform_share_bps: u64,
    creator_share_bps: u64,
) -> Result<TaxSplit, LaunchError> {
    let total = bps_of(amount, tax_bps)?;
    let platform = bps_of(total, platform_share_bps)?;
    let creator = bps_of(total, creator_share_bps)?;
    let holders = total
        .checked_sub(platform)
        .and_then(|rest| rest.checked_sub(creator))
        .ok_or(LaunchError::ArithmeticOverflow)?;

    Ok(TaxSplit {
        total,
        platform,
        creator,
        holders,
    })
}

/// Constant product of the pricing reserves
pub fn invariant(stable_reserve: U256, token_reserve: U256) -> Result<U256, LaunchError> {
    stable_reserve
        .checked_mul(token_reserve)
        .ok_or(LaunchError::ArithmeticOverflow)
}

/// Calculate the tokens released for a (post-tax) stable input
///
/// # Arguments
/// * `stable_reserve` - Virtual plus real stable reserve
/// * `token_reserve` - Project tokens still held by the curve
/// * `stable_in` - Stable amount entering the curve
///
/// # Returns
/// `token_reserve - ceil(k / (stable_reserve + stable_in))`
pub fn tokens_for_stable(
    stable_reserve: U256,
    token_reserve: U256,
    stable_in: U256,
) -> Result<U256, LaunchError> {
    if stable_in.is_zero() {
        return Ok(U256::zero());
    }
    let k = invariant(stable_reserve, token_reserve)?;
    let new_stable = stable_reserve
        .checked_add(stable_in)
        .ok_or(LaunchError::ArithmeticOverflow)?;
    let new_token = ceil_div(k, new_stable)?;
    token_reserve
        .checked_sub(new_token)
        .ok_or(LaunchError::ArithmeticOverflow)
}

/// Calculate the gross stable released for tokens returned to the curve
///
/// # Arguments
/// * `stable_reserve` - Virtual plus real stable reserve
/// * `token_reserve` - Project tokens still held by the curve
/// * `tokens_in` - Tokens returned to the curve
///
/// # Returns
/// `stable_reserve - ceil(k / (token_reserve + tokens_in))`, before tax
pub fn stable_for_tokens(
    stable_reserve: U256,
    token_reserve: U256,
    tokens_in: U256,
) -> Result<U256, LaunchError> {
    if tokens_in.is_zero() {
        return Ok(U256::zero());
    }
    let k = invariant(stable_reserve, token_reserve)?;
    let new_token = token_reserve
        .checked_add(tokens_in)
        .ok_or(LaunchError::ArithmeticOverflow)?;
    let new_stable = ceil_div(k, new_token)?;
    stable_reserve
        .checked_sub(new_stable)
        .ok_or(LaunchError::ArithmeticOverflow)
}

/// Marginal price in stable units per token unit, scaled by `PRICE_SCALE`
pub fn spot_price(stable_reserve: U256, token_reserve: U256) -> Result<U256, LaunchError> {
    if token_reserve.is_zero() {
        return Err(LaunchError::InvalidState);
    }
    stable_reserve
        .checked_mul(U256::from(PRICE_SCALE))
        .map(|scaled| scaled / token_reserve)
        .ok_or(LaunchError::ArithmeticOverflow)
}
