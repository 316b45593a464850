use casper_types::{Key, U256};

use crate::error::LaunchError;
use crate::events::{EventKind, LaunchEvent};
use crate::market::Market;
use crate::state::LaunchStatus;
use crate::vault::Asset;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatorWithdrawal {
    pub creator: Key,
    /// stable vault -> creator
    pub amount: U256,
}

impl CreatorWithdrawal {
    pub fn event(&self) -> LaunchEvent {
        LaunchEvent::new(
            EventKind::CreatorWithdrawn,
            self.creator,
            self.amount,
            U256::zero(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualReclaim {
    pub creator: Key,
    /// stable vault -> creator
    pub stable_refund: U256,
    /// token vault -> creator
    pub token_refund: U256,
}

impl VirtualReclaim {
    pub fn event(&self) -> LaunchEvent {
        LaunchEvent::new(
            EventKind::VirtualReclaimed,
            self.creator,
            self.stable_refund,
            self.token_refund,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformWithdrawal {
    pub platform: Key,
    /// stable vault -> platform
    pub amount: U256,
}

impl PlatformWithdrawal {
    pub fn event(&self) -> LaunchEvent {
        LaunchEvent::new(
            EventKind::PlatformWithdrawn,
            self.platform,
            self.amount,
            U256::zero(),
        )
    }
}

impl Market {
    /// Pay `amount` of accrued creator fees to the creator
    pub fn withdraw_creator_reserve(
        &mut self,
        caller: Key,
        amount: U256,
    ) -> Result<CreatorWithdrawal, LaunchError> {
        if !self.config().is_creator(&caller) {
            return Err(LaunchError::Unauthorized);
        }
        if amount.is_zero() {
            return Err(LaunchError::InvalidParameter);
        }
        self.staged(|market| {
            let config = market.config_mut();
            config.creator_fees = config
                .creator_fees
                .checked_sub(amount)
                .ok_or(LaunchError::InsufficientFunds)?;
            market.pay_out(Asset::Stable, amount)?;
            Ok(CreatorWithdrawal {
                creator: caller,
                amount,
            })
        })
    }

    /// Abandon an untraded market: refund the escrowed seed and the curve
    /// allocation to the creator and close the market to trading.
    pub fn reclaim_virtual_funds(&mut self, caller: Key) -> Result<VirtualReclaim, LaunchError> {
        if !self.config().is_creator(&caller) {
            return Err(LaunchError::Unauthorized);
        }
        if self.config().status != LaunchStatus::Active || !self.config().total_raised.is_zero() {
            return Err(LaunchError::InvalidState);
        }
        self.staged(|market| {
            let stable_refund = market.config().seed_escrow;
            let token_refund = market.config().token_reserve;

            let config = market.config_mut();
            config.seed_escrow = U256::zero();
            config.token_reserve = U256::zero();
            config.status = LaunchStatus::Finalized;

            market.pay_out(Asset::Stable, stable_refund)?;
            market.pay_out(Asset::Token, token_refund)?;
            Ok(VirtualReclaim {
                creator: caller,
                stable_refund,
                token_refund,
            })
        })
    }

    /// Pay the whole platform fee accumulator to the platform, at most once
    /// per cooldown period. While trading is open, balances at or above the
    /// automatic payout threshold are left for the next sell.
    pub fn withdraw_platform_remaining(
        &mut self,
        caller: Key,
        now: u64,
    ) -> Result<PlatformWithdrawal, LaunchError> {
        if !self.config().is_platform(&caller) {
            return Err(LaunchError::Unauthorized);
        }
        let elapsed = now.saturating_sub(self.config().last_platform_withdrawal);
        if elapsed < self.params().platform_cooldown {
            return Err(LaunchError::CooldownNotElapsed);
        }
        let amount = self.config().platform_fees;
        if amount.is_zero() {
            return Err(LaunchError::InsufficientFunds);
        }
        if self.config().status.can_trade() && self.params().above_auto_threshold(amount) {
            return Err(LaunchError::AboveAutoThreshold);
        }
        self.staged(|market| {
            let config = market.config_mut();
            config.platform_fees = U256::zero();
            config.last_platform_withdrawal = now;
            market.pay_out(Asset::Stable, amount)?;
            Ok(PlatformWithdrawal {
                platform: caller,
                amount,
            })
        })
    }
}
