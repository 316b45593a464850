//! Graduation from the curve to an external constant-product pool.

use casper_types::{Key, U256};

use crate::authority::{derive_authority, AuthorityHandle, AuthorityScope};
use crate::error::LaunchError;
use crate::events::{EventKind, LaunchEvent};
use crate::market::Market;
use crate::state::LaunchStatus;
use crate::vault::Asset;

/// Where migrated reserves go. The contract implements this with the DEX
/// factory and pair; tests use an in-memory pool.
pub trait PoolVenue {
    /// Create a pool holding `stable_amount` and `token_amount` and return
    /// its id together with the liquidity minted to this market.
    fn seed_pool(
        &mut self,
        stable_amount: U256,
        token_amount: U256,
    ) -> Result<(Key, U256), LaunchError>;
}

/// Liquidity position taken at migration. Has no release path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LpLock {
    pool: Key,
    liquidity: U256,
    authority: AuthorityHandle,
    locked_at: u64,
}

impl LpLock {
    fn new(market: &Key, pool: Key, liquidity: U256, locked_at: u64) -> Self {
        LpLock {
            pool,
            liquidity,
            authority: derive_authority(AuthorityScope::LpLock, market),
            locked_at,
        }
    }

    /// Rebuild a persisted lock; the authority is re-derived for `market`
    pub fn restore(market: &Key, pool: Key, liquidity: U256, locked_at: u64) -> Self {
        LpLock::new(market, pool, liquidity, locked_at)
    }

    pub fn pool(&self) -> Key {
        self.pool
    }

    pub fn liquidity(&self) -> U256 {
        self.liquidity
    }

    pub fn authority(&self) -> &AuthorityHandle {
        &self.authority
    }

    pub fn locked_at(&self) -> u64 {
        self.locked_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReceipt {
    pub caller: Key,
    pub pool: Key,
    /// stable vault -> pool
    pub stable_moved: U256,
    /// token vault -> pool
    pub tokens_moved: U256,
    pub liquidity: U256,
    /// stable vault -> creator
    pub seed_refund: U256,
}

impl MigrationReceipt {
    pub fn event(&self) -> LaunchEvent {
        LaunchEvent::new(
            EventKind::Migrated,
            self.caller,
            self.stable_moved,
            self.tokens_moved,
        )
    }
}

impl Market {
    /// Move both real reserves into a new pool and lock the position for good.
    ///
    /// Fee accumulators, the profit reserve and every ledger survive; claims
    /// and fee withdrawals keep working afterwards.
    pub fn close_and_migrate<V: PoolVenue>(
        &mut self,
        caller: Key,
        venue: &mut V,
        now: u64,
    ) -> Result<MigrationReceipt, LaunchError> {
        self.require_operator(&caller)?;
        if self.config().status == LaunchStatus::Migrated || self.lp_lock().is_some() {
            return Err(LaunchError::AlreadyMigrated);
        }
        if self.config().real_stable < self.params().graduation_threshold {
            return Err(LaunchError::ThresholdNotMet);
        }

        self.staged(|market| {
            let market_id = market.market_id();
            let stable_moved = market.config().real_stable;
            let tokens_moved = market.config().token_reserve;
            let seed_refund = market.config().seed_escrow;

            market.pay_out(Asset::Stable, stable_moved)?;
            market.pay_out(Asset::Token, tokens_moved)?;
            market.pay_out(Asset::Stable, seed_refund)?;

            let (pool, liquidity) = venue.seed_pool(stable_moved, tokens_moved)?;
            if liquidity.is_zero() {
                return Err(LaunchError::InvalidState);
            }

            let config = market.config_mut();
            config.real_stable = U256::zero();
            config.token_reserve = U256::zero();
            config.seed_escrow = U256::zero();
            config.status = LaunchStatus::Migrated;
            market.set_lp_lock(LpLock::new(&market_id, pool, liquidity, now));

            Ok(MigrationReceipt {
                caller,
                pool,
                stable_moved,
                tokens_moved,
                liquidity,
                seed_refund,
            })
        })
    }
}
