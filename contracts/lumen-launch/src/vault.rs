use casper_types::{Key, U256};

use crate::authority::{derive_authority, AuthorityHandle, AuthorityScope};
use crate::error::LaunchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Asset {
    Stable,
    Token,
}

impl Asset {
    pub fn scope(&self) -> AuthorityScope {
        match self {
            Asset::Stable => AuthorityScope::StableVault,
            Asset::Token => AuthorityScope::TokenVault,
        }
    }
}

/// Balances custodied for one market. Holds no business data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveVault {
    market: Key,
    stable: U256,
    token: U256,
}

impl ReserveVault {
    pub fn new(market: Key) -> Self {
        ReserveVault {
            market,
            stable: U256::zero(),
            token: U256::zero(),
        }
    }

    /// Rebuild a vault from persisted balances
    pub fn restore(market: Key, stable: U256, token: U256) -> Self {
        ReserveVault {
            market,
            stable,
            token,
        }
    }

    pub fn market(&self) -> Key {
        self.market
    }

    pub fn balance(&self, asset: Asset) -> U256 {
        match asset {
            Asset::Stable => self.stable,
            Asset::Token => self.token,
        }
    }

    /// Authority that may move `asset` out of this vault
    pub fn authority(&self, asset: Asset) -> AuthorityHandle {
        derive_authority(asset.scope(), &self.market)
    }

    pub fn deposit(&mut self, asset: Asset, amount: U256) -> Result<(), LaunchError> {
        let slot = self.slot(asset);
        *slot = slot
            .checked_add(amount)
            .ok_or(LaunchError::ArithmeticOverflow)?;
        Ok(())
    }

    pub fn withdraw(
        &mut self,
        asset: Asset,
        amount: U256,
        authority: &AuthorityHandle,
    ) -> Result<(), LaunchError> {
        authority.verify(asset.scope(), &self.market)?;
        let slot = self.slot(asset);
        *slot = slot
            .checked_sub(amount)
            .ok_or(LaunchError::InsufficientFunds)?;
        Ok(())
    }

    fn slot(&mut self, asset: Asset) -> &mut U256 {
        match asset {
            Asset::Stable => &mut self.stable,
            Asset::Token => &mut self.token,
        }
    }
}
