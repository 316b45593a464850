//! Buyer ledgers and the pro-rata profit index.
//!
//! The market keeps one scaled counter, the profit index, that grows by
//! `holders_share * SCALE / supply` on every trade, where `supply` is what
//! everyone but the trader holds. A ledger
//! remembers the index it last settled against; what it is owed is the
//! index delta times its holdings. Trades never touch other ledgers.

use casper_types::U256;

use crate::error::LaunchError;

/// Fixed-point scale of the profit index (12 decimals)
pub const PROFIT_INDEX_SCALE: u64 = 1_000_000_000_000;

/// Per-(market, participant) record for profit distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BuyerLedger {
    /// Tokens attributed to this participant's purchases
    pub held: U256,
    /// Profit index last settled against, never above the market index
    pub checkpoint: U256,
}

impl BuyerLedger {
    /// A fresh ledger: nothing held, no claim on profit accrued before `index`
    pub fn opened_at(index: U256) -> Self {
        BuyerLedger {
            held: U256::zero(),
            checkpoint: index,
        }
    }

    /// Profit accrued since the checkpoint, floored
    pub fn pending(&self, index: U256) -> Result<U256, LaunchError> {
        let delta = index
            .checked_sub(self.checkpoint)
            .ok_or(LaunchError::InvalidState)?;
        delta
            .checked_mul(self.held)
            .map(|scaled| scaled / U256::from(PROFIT_INDEX_SCALE))
            .ok_or(LaunchError::ArithmeticOverflow)
    }

    /// Take what is owed up to `index` and move the checkpoint there
    pub fn settle(&mut self, index: U256) -> Result<U256, LaunchError> {
        let owed = self.pending(index)?;
        self.checkpoint = index;
        Ok(owed)
    }

    pub fn add_tokens(&mut self, amount: U256) -> Result<(), LaunchError> {
        self.held = self
            .held
            .checked_add(amount)
            .ok_or(LaunchError::ArithmeticOverflow)?;
        Ok(())
    }

    pub fn remove_tokens(&mut self, amount: U256) -> Result<(), LaunchError> {
        self.held = self
            .held
            .checked_sub(amount)
            .ok_or(LaunchError::InsufficientFunds)?;
        Ok(())
    }
}

/// Index increase that spreads `amount` over `supply` tokens.
/// Zero when there is nobody to pay.
pub fn index_increment(amount: U256, supply: U256) -> Result<U256, LaunchError> {
    if supply.is_zero() {
        return Ok(U256::zero());
    }
    amount
        .checked_mul(U256::from(PROFIT_INDEX_SCALE))
        .map(|scaled| scaled / supply)
        .ok_or(LaunchError::ArithmeticOverflow)
}
