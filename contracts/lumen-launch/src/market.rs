//! One market: config, vault and LP lock, mutated only through operations
//! that either complete fully or leave the market as it was.

use casper_types::{Key, U256};

use crate::curve::{self, split_tax, TaxSplit};
use crate::error::LaunchError;
use crate::events::{EventKind, LaunchEvent};
use crate::ledger::{index_increment, BuyerLedger};
use crate::migration::LpLock;
use crate::params::{ProtocolParams, BPS_DENOMINATOR};
use crate::state::{LaunchConfig, LaunchStatus};
use crate::vault::{Asset, ReserveVault};

/// Inputs of `Market::create`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub creator: Key,
    pub platform: Key,
    pub token: Key,
    pub stable: Key,
    pub virtual_stable: U256,
    /// Creator's stable balance at the time of the call
    pub creator_stable_balance: U256,
}

/// Transfers the host must perform for a successful create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateReceipt {
    pub creator: Key,
    /// creator -> platform
    pub listing_fee: U256,
    /// creator -> stable vault
    pub seed_escrow: U256,
    /// creator -> token vault
    pub curve_tokens: U256,
}

impl CreateReceipt {
    pub fn event(&self) -> LaunchEvent {
        LaunchEvent::new(
            EventKind::Created,
            self.creator,
            self.seed_escrow,
            self.curve_tokens,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeReceipt {
    pub caller: Key,
    pub real_stable: U256,
}

impl FinalizeReceipt {
    pub fn event(&self) -> LaunchEvent {
        LaunchEvent::new(
            EventKind::Finalized,
            self.caller,
            self.real_stable,
            U256::zero(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimReceipt {
    pub holder: Key,
    /// stable vault -> holder
    pub amount: U256,
    pub ledger: BuyerLedger,
}

impl ClaimReceipt {
    pub fn event(&self) -> LaunchEvent {
        LaunchEvent::new(
            EventKind::ProfitClaimed,
            self.holder,
            self.amount,
            U256::zero(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Market {
    params: ProtocolParams,
    config: LaunchConfig,
    vault: ReserveVault,
    lp_lock: Option<LpLock>,
}

impl Market {
    /// Open a market for `request.token`, priced against `request.stable`.
    pub fn create(
        params: ProtocolParams,
        request: &LaunchRequest,
        now: u64,
    ) -> Result<(Market, CreateReceipt), LaunchError> {
        params.validate()?;
        if request.virtual_stable < params.min_virtual_stable {
            return Err(LaunchError::InvalidParameter);
        }
        if request.token == request.stable {
            return Err(LaunchError::InvalidParameter);
        }
        let required = params
            .listing_fee
            .checked_add(request.virtual_stable)
            .ok_or(LaunchError::ArithmeticOverflow)?;
        if request.creator_stable_balance < required {
            return Err(LaunchError::InsufficientFunds);
        }

        let config = LaunchConfig {
            creator: request.creator,
            platform: request.platform,
            token: request.token,
            stable: request.stable,
            virtual_stable: request.virtual_stable,
            real_stable: U256::zero(),
            token_reserve: params.curve_supply,
            curve_supply: params.curve_supply,
            platform_fees: U256::zero(),
            creator_fees: U256::zero(),
            profit_reserve: U256::zero(),
            profit_index: U256::zero(),
            status: LaunchStatus::Active,
            last_platform_withdrawal: 0,
            seed_escrow: request.virtual_stable,
            total_raised: U256::zero(),
            start_time: now,
        };

        let mut vault = ReserveVault::new(config.market_id());
        vault.deposit(Asset::Stable, config.seed_escrow)?;
        vault.deposit(Asset::Token, config.token_reserve)?;

        let receipt = CreateReceipt {
            creator: config.creator,
            listing_fee: params.listing_fee,
            seed_escrow: config.seed_escrow,
            curve_tokens: config.token_reserve,
        };
        let market = Market {
            params,
            config,
            vault,
            lp_lock: None,
        };
        market.check_conservation()?;
        Ok((market, receipt))
    }

    /// Rebuild a market from persisted parts
    pub fn from_parts(
        params: ProtocolParams,
        config: LaunchConfig,
        vault: ReserveVault,
        lp_lock: Option<LpLock>,
    ) -> Result<Market, LaunchError> {
        if vault.market() != config.market_id() {
            return Err(LaunchError::InvalidState);
        }
        let market = Market {
            params,
            config,
            vault,
            lp_lock,
        };
        market.check_conservation()?;
        Ok(market)
    }

    pub fn params(&self) -> &ProtocolParams {
        &self.params
    }

    pub fn config(&self) -> &LaunchConfig {
        &self.config
    }

    pub fn vault(&self) -> &ReserveVault {
        &self.vault
    }

    pub fn lp_lock(&self) -> Option<&LpLock> {
        self.lp_lock.as_ref()
    }

    pub fn market_id(&self) -> Key {
        self.config.market_id()
    }

    /// Freeze trading. Creator or platform only.
    pub fn finalize(&mut self, caller: Key) -> Result<FinalizeReceipt, LaunchError> {
        self.staged(|market| {
            market.require_operator(&caller)?;
            match market.config.status {
                LaunchStatus::Active => {}
                LaunchStatus::Finalized => return Err(LaunchError::AlreadyFinalized),
                LaunchStatus::Migrated => return Err(LaunchError::InvalidState),
            }
            market.config.status = LaunchStatus::Finalized;
            Ok(FinalizeReceipt {
                caller,
                real_stable: market.config.real_stable,
            })
        })
    }

    /// Pay out the holder's share of the profit index. Works in every status.
    pub fn claim_profits(
        &mut self,
        holder: Key,
        ledger: Option<&BuyerLedger>,
    ) -> Result<ClaimReceipt, LaunchError> {
        let mut ledger = *ledger.ok_or(LaunchError::NothingToClaim)?;
        self.staged(|market| {
            let amount = market.settle_ledger(&mut ledger)?;
            if amount.is_zero() {
                return Err(LaunchError::NothingToClaim);
            }
            Ok(ClaimReceipt {
                holder,
                amount,
                ledger,
            })
        })
    }

    /// Tokens out and tax for a buy of `stable_in`, without executing it
    pub fn quote_buy(&self, stable_in: U256) -> Result<(U256, TaxSplit), LaunchError> {
        let tax = self.tax_on(stable_in)?;
        let net = stable_in
            .checked_sub(tax.total)
            .ok_or(LaunchError::ArithmeticOverflow)?;
        let tokens_out =
            curve::tokens_for_stable(self.config.stable_reserve()?, self.config.token_reserve, net)?;
        Ok((tokens_out, tax))
    }

    /// Gross stable released, seller payout and tax for a sell of `tokens_in`
    pub fn quote_sell(&self, tokens_in: U256) -> Result<(U256, U256, TaxSplit), LaunchError> {
        let gross = curve::stable_for_tokens(
            self.config.stable_reserve()?,
            self.config.token_reserve,
            tokens_in,
        )?;
        let tax = self.tax_on(gross)?;
        let net = gross
            .checked_sub(tax.total)
            .ok_or(LaunchError::ArithmeticOverflow)?;
        Ok((gross, net, tax))
    }

    pub fn spot_price(&self) -> Result<U256, LaunchError> {
        curve::spot_price(self.config.stable_reserve()?, self.config.token_reserve)
    }

    /// Real stable toward the graduation threshold, in bps, capped at 100%
    pub fn progress_bps(&self) -> Result<u64, LaunchError> {
        let scaled = self
            .config
            .real_stable
            .checked_mul(U256::from(BPS_DENOMINATOR))
            .ok_or(LaunchError::ArithmeticOverflow)?
            / self.params.graduation_threshold;
        Ok(scaled.min(U256::from(BPS_DENOMINATOR)).as_u64())
    }

    /// What `claim_profits` would pay right now
    pub fn claimable(&self, ledger: Option<&BuyerLedger>) -> Result<U256, LaunchError> {
        match ledger {
            Some(ledger) => Ok(ledger
                .pending(self.config.profit_index)?
                .min(self.config.profit_reserve)),
            None => Ok(U256::zero()),
        }
    }

    /// Vault balances must equal what the config says they hold
    pub fn check_conservation(&self) -> Result<(), LaunchError> {
        if self.vault.balance(Asset::Stable) != self.config.stable_obligations()? {
            return Err(LaunchError::InvalidState);
        }
        if self.vault.balance(Asset::Token) != self.config.token_reserve {
            return Err(LaunchError::InvalidState);
        }
        Ok(())
    }

    /// Run `op` on a copy and commit it only if it succeeds and balances
    pub(crate) fn staged<T>(
        &mut self,
        op: impl FnOnce(&mut Market) -> Result<T, LaunchError>,
    ) -> Result<T, LaunchError> {
        let mut next = self.clone();
        let outcome = op(&mut next)?;
        next.check_conservation()?;
        if next.config.profit_index < self.config.profit_index {
            return Err(LaunchError::InvalidState);
        }
        *self = next;
        Ok(outcome)
    }

    pub(crate) fn require_operator(&self, caller: &Key) -> Result<(), LaunchError> {
        if self.config.is_creator(caller) || self.config.is_platform(caller) {
            Ok(())
        } else {
            Err(LaunchError::Unauthorized)
        }
    }

    pub(crate) fn tax_on(&self, amount: U256) -> Result<TaxSplit, LaunchError> {
        split_tax(
            amount,
            self.params.tax_bps,
            self.params.platform_share_bps,
            self.params.creator_share_bps,
        )
    }

    /// Pay the ledger its pending profit, bounded by the profit reserve.
    pub(crate) fn settle_ledger(&mut self, ledger: &mut BuyerLedger) -> Result<U256, LaunchError> {
        let owed = ledger.settle(self.config.profit_index)?;
        let paid = owed.min(self.config.profit_reserve);
        if !paid.is_zero() {
            self.config.profit_reserve = self
                .config
                .profit_reserve
                .checked_sub(paid)
                .ok_or(LaunchError::ArithmeticOverflow)?;
            self.pay_out(Asset::Stable, paid)?;
        }
        Ok(paid)
    }

    /// Route a trade's tax. The holders' share is spread over everyone
    /// holding tokens except `trader`, whose checkpoint moves past it. With
    /// nobody else holding, the share goes to the platform and the index
    /// still advances so that the trader's checkpoint stays current.
    pub(crate) fn distribute_tax(
        &mut self,
        tax: &TaxSplit,
        trader: &mut BuyerLedger,
    ) -> Result<(), LaunchError> {
        let circulating = self.config.circulating_supply()?;
        let mut platform = tax.platform;
        if circulating.is_zero() {
            platform = platform
                .checked_add(tax.holders)
                .ok_or(LaunchError::ArithmeticOverflow)?;
        } else {
            let others = circulating.saturating_sub(trader.held);
            let increment = if others.is_zero() {
                platform = platform
                    .checked_add(tax.holders)
                    .ok_or(LaunchError::ArithmeticOverflow)?;
                index_increment(tax.holders, circulating)?
            } else {
                self.config.profit_reserve = self
                    .config
                    .profit_reserve
                    .checked_add(tax.holders)
                    .ok_or(LaunchError::ArithmeticOverflow)?;
                index_increment(tax.holders, others)?
            };
            self.config.profit_index = self
                .config
                .profit_index
                .checked_add(increment)
                .ok_or(LaunchError::ArithmeticOverflow)?;
            trader.checkpoint = self.config.profit_index;
        }
        self.config.platform_fees = self
            .config
            .platform_fees
            .checked_add(platform)
            .ok_or(LaunchError::ArithmeticOverflow)?;
        self.config.creator_fees = self
            .config
            .creator_fees
            .checked_add(tax.creator)
            .ok_or(LaunchError::ArithmeticOverflow)?;
        Ok(())
    }

    pub(crate) fn take_in(&mut self, asset: Asset, amount: U256) -> Result<(), LaunchError> {
        self.vault.deposit(asset, amount)
    }

    pub(crate) fn pay_out(&mut self, asset: Asset, amount: U256) -> Result<(), LaunchError> {
        let authority = self.vault.authority(asset);
        self.vault.withdraw(asset, amount, &authority)
    }

    pub(crate) fn config_mut(&mut self) -> &mut LaunchConfig {
        &mut self.config
    }

    pub(crate) fn set_lp_lock(&mut self, lock: LpLock) {
        self.lp_lock = Some(lock);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use casper_types::account::AccountHash;

    pub const SEED: u64 = 10_000_000;

    pub fn creator() -> Key {
        Key::Account(AccountHash::new([0xc1; 32]))
    }

    pub fn platform() -> Key {
        Key::Account(AccountHash::new([0x91; 32]))
    }

    pub fn alice() -> Key {
        Key::Account(AccountHash::new([0xa1; 32]))
    }

    pub fn bob() -> Key {
        Key::Account(AccountHash::new([0xb0; 32]))
    }

    pub fn token() -> Key {
        Key::Hash([0x70; 32])
    }

    pub fn stable() -> Key {
        Key::Hash([0x05; 32])
    }

    pub fn request() -> LaunchRequest {
        LaunchRequest {
            creator: creator(),
            platform: platform(),
            token: token(),
            stable: stable(),
            virtual_stable: U256::from(SEED),
            creator_stable_balance: U256::from(100_000_000u64),
        }
    }

    pub fn new_market() -> Market {
        Market::create(ProtocolParams::default(), &request(), 1_000)
            .unwrap()
            .0
    }

    #[test]
    fn test_create_initial_state() {
        let (market, receipt) = Market::create(ProtocolParams::default(), &request(), 1_000).unwrap();
        let config = market.config();
        assert_eq!(config.status, LaunchStatus::Active);
        assert_eq!(config.virtual_stable, U256::from(SEED));
        assert_eq!(config.real_stable, U256::zero());
        assert_eq!(config.profit_index, U256::zero());
        assert_eq!(config.token_reserve, market.params().curve_supply);
        assert_eq!(config.start_time, 1_000);
        assert_eq!(market.vault().balance(Asset::Stable), U256::from(SEED));
        assert_eq!(receipt.listing_fee, U256::from(5_000_000u64));
        assert_eq!(receipt.curve_tokens, config.curve_supply);
        assert_eq!(receipt.event().kind, EventKind::Created);
        assert!(market.lp_lock().is_none());
    }

    #[test]
    fn test_create_rejects_small_seed() {
        let mut low = request();
        low.virtual_stable = U256::from(SEED - 1);
        assert_eq!(
            Market::create(ProtocolParams::default(), &low, 0).unwrap_err(),
            LaunchError::InvalidParameter
        );
    }

    #[test]
    fn test_create_rejects_same_asset() {
        let mut same = request();
        same.stable = same.token;
        assert_eq!(
            Market::create(ProtocolParams::default(), &same, 0).unwrap_err(),
            LaunchError::InvalidParameter
        );
    }

    #[test]
    fn test_create_requires_fee_plus_seed() {
        let mut poor = request();
        poor.creator_stable_balance = U256::from(SEED + 5_000_000 - 1);
        assert_eq!(
            Market::create(ProtocolParams::default(), &poor, 0).unwrap_err(),
            LaunchError::InsufficientFunds
        );
        poor.creator_stable_balance = U256::from(SEED + 5_000_000);
        assert!(Market::create(ProtocolParams::default(), &poor, 0).is_ok());
    }

    #[test]
    fn test_finalize_transitions() {
        let mut market = new_market();
        assert_eq!(market.finalize(alice()).unwrap_err(), LaunchError::Unauthorized);

        let receipt = market.finalize(creator()).unwrap();
        assert_eq!(receipt.event().kind, EventKind::Finalized);
        assert_eq!(market.config().status, LaunchStatus::Finalized);
        assert_eq!(
            market.finalize(platform()).unwrap_err(),
            LaunchError::AlreadyFinalized
        );
    }

    #[test]
    fn test_claim_without_ledger() {
        let mut market = new_market();
        assert_eq!(
            market.claim_profits(alice(), None).unwrap_err(),
            LaunchError::NothingToClaim
        );
        assert_eq!(market.claimable(None), Ok(U256::zero()));
    }

    #[test]
    fn test_spot_price_and_progress_at_start() {
        let market = new_market();
        // 10 USDC over 500M tokens at 6 decimals each
        assert_eq!(market.spot_price(), Ok(U256::from(20_000u64)));
        assert_eq!(market.progress_bps(), Ok(0));
    }

    #[test]
    fn test_from_parts_rejects_unbalanced_vault() {
        let market = new_market();
        let vault = ReserveVault::restore(market.market_id(), U256::one(), U256::zero());
        assert_eq!(
            Market::from_parts(market.params().clone(), market.config().clone(), vault, None)
                .unwrap_err(),
            LaunchError::InvalidState
        );
        assert!(Market::from_parts(
            market.params().clone(),
            market.config().clone(),
            market.vault().clone(),
            None
        )
        .is_ok());
    }
}
