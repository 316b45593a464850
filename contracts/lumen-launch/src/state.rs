use casper_types::{Key, U256};

use crate::error::LaunchError;

// Status values as stored on chain
pub const STATUS_ACTIVE: u8 = 0;
pub const STATUS_FINALIZED: u8 = 1;
pub const STATUS_MIGRATED: u8 = 2;

/// Lifecycle of a market. Moves only forward:
/// Active -> Finalized -> Migrated, or Active -> Migrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LaunchStatus {
    Active = STATUS_ACTIVE,
    Finalized = STATUS_FINALIZED,
    Migrated = STATUS_MIGRATED,
}

impl LaunchStatus {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            STATUS_ACTIVE => Some(LaunchStatus::Active),
            STATUS_FINALIZED => Some(LaunchStatus::Finalized),
            STATUS_MIGRATED => Some(LaunchStatus::Migrated),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn can_trade(&self) -> bool {
        matches!(self, LaunchStatus::Active)
    }
}

/// Per-market aggregate. Single source of truth for reserves and accumulators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    pub creator: Key,
    pub platform: Key,
    /// Project token; doubles as the market id
    pub token: Key,
    pub stable: Key,
    /// Pricing offset, never changes after create
    pub virtual_stable: U256,
    /// Net stable from trading held by the curve
    pub real_stable: U256,
    /// Project tokens still held by the curve
    pub token_reserve: U256,
    /// Tokens deposited into the curve on create
    pub curve_supply: U256,
    pub platform_fees: U256,
    pub creator_fees: U256,
    /// Stable owed to holders through the profit index
    pub profit_reserve: U256,
    /// Cumulative stable per token, scaled by `PROFIT_INDEX_SCALE`
    pub profit_index: U256,
    pub status: LaunchStatus,
    pub last_platform_withdrawal: u64,
    /// Creator's escrowed seed, refundable
    pub seed_escrow: U256,
    /// Gross stable paid into buys
    pub total_raised: U256,
    pub start_time: u64,
}

impl LaunchConfig {
    pub fn market_id(&self) -> Key {
        self.token
    }

    /// Virtual plus real stable: the stable side of the curve
    pub fn stable_reserve(&self) -> Result<U256, LaunchError> {
        self.virtual_stable
            .checked_add(self.real_stable)
            .ok_or(LaunchError::ArithmeticOverflow)
    }

    /// Tokens in holders' hands
    pub fn circulating_supply(&self) -> Result<U256, LaunchError> {
        self.curve_supply
            .checked_sub(self.token_reserve)
            .ok_or(LaunchError::ArithmeticOverflow)
    }

    /// Everything the stable vault must hold for this config
    pub fn stable_obligations(&self) -> Result<U256, LaunchError> {
        [
            self.platform_fees,
            self.creator_fees,
            self.profit_reserve,
            self.seed_escrow,
        ]
        .iter()
        .try_fold(self.real_stable, |total, amount| total.checked_add(*amount))
        .ok_or(LaunchError::ArithmeticOverflow)
    }

    pub fn is_creator(&self, caller: &Key) -> bool {
        *caller == self.creator
    }

    pub fn is_platform(&self, caller: &Key) -> bool {
        *caller == self.platform
    }
}
