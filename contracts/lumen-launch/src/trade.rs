use casper_types::{Key, U256};

use crate::curve::TaxSplit;
use crate::error::LaunchError;
use crate::events::{EventKind, LaunchEvent};
use crate::ledger::BuyerLedger;
use crate::market::Market;
use crate::vault::Asset;

/// Caller-supplied bounds for a buy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuyOrder {
    pub stable_in: U256,
    pub min_tokens_out: U256,
    /// Last block time (ms) at which the order may execute
    pub deadline: u64,
}

/// Caller-supplied bounds for a sell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SellOrder {
    pub tokens_in: U256,
    pub min_stable_out: U256,
    pub deadline: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuyReceipt {
    pub buyer: Key,
    /// buyer -> stable vault
    pub stable_in: U256,
    /// token vault -> buyer
    pub tokens_out: U256,
    pub tax: TaxSplit,
    /// stable vault -> buyer, profit accrued before this trade
    pub settled_profit: U256,
    pub ledger: BuyerLedger,
}

impl BuyReceipt {
    pub fn event(&self) -> LaunchEvent {
        LaunchEvent::new(EventKind::Bought, self.buyer, self.stable_in, self.tokens_out)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellReceipt {
    pub seller: Key,
    /// seller -> token vault
    pub tokens_in: U256,
    /// Curve output before tax
    pub gross_out: U256,
    /// stable vault -> seller, after tax
    pub stable_out: U256,
    pub tax: TaxSplit,
    /// stable vault -> seller, profit accrued before this trade
    pub settled_profit: U256,
    /// stable vault -> platform, accrued fees released by this sell
    pub platform_payout: U256,
    pub ledger: BuyerLedger,
}

impl SellReceipt {
    /// Everything the seller receives in stable
    pub fn total_paid(&self) -> Result<U256, LaunchError> {
        self.stable_out
            .checked_add(self.settled_profit)
            .ok_or(LaunchError::ArithmeticOverflow)
    }

    pub fn event(&self) -> LaunchEvent {
        LaunchEvent::new(EventKind::Sold, self.seller, self.tokens_in, self.stable_out)
    }
}

fn check_window(market: &Market, deadline: u64, now: u64) -> Result<(), LaunchError> {
    if now > deadline {
        return Err(LaunchError::DeadlineExpired);
    }
    if !market.config().status.can_trade() {
        return Err(LaunchError::InvalidState);
    }
    Ok(())
}

impl Market {
    /// Swap stable for tokens along the curve.
    ///
    /// `ledger` is the buyer's existing ledger, if any; the updated one is
    /// returned in the receipt and must be persisted by the caller.
    pub fn buy(
        &mut self,
        buyer: Key,
        ledger: Option<&BuyerLedger>,
        order: &BuyOrder,
        now: u64,
    ) -> Result<BuyReceipt, LaunchError> {
        check_window(self, order.deadline, now)?;
        if order.stable_in.is_zero() {
            return Err(LaunchError::InvalidParameter);
        }

        let (tokens_out, tax) = self.quote_buy(order.stable_in)?;
        if tokens_out < order.min_tokens_out {
            return Err(LaunchError::SlippageExceeded);
        }
        if tokens_out.is_zero() {
            return Err(LaunchError::InvalidParameter);
        }
        if self.in_snipe_window(now) && tokens_out > self.params().snipe_cap()? {
            return Err(LaunchError::SnipeLimitExceeded);
        }

        let mut ledger = ledger
            .copied()
            .unwrap_or_else(|| BuyerLedger::opened_at(self.config().profit_index));

        self.staged(|market| {
            let net = order
                .stable_in
                .checked_sub(tax.total)
                .ok_or(LaunchError::ArithmeticOverflow)?;
            market.take_in(Asset::Stable, order.stable_in)?;

            let settled_profit = market.settle_ledger(&mut ledger)?;
            ledger.add_tokens(tokens_out)?;

            market.pay_out(Asset::Token, tokens_out)?;
            let config = market.config_mut();
            config.token_reserve = config
                .token_reserve
                .checked_sub(tokens_out)
                .ok_or(LaunchError::ArithmeticOverflow)?;
            config.real_stable = config
                .real_stable
                .checked_add(net)
                .ok_or(LaunchError::ArithmeticOverflow)?;
            config.total_raised = config
                .total_raised
                .checked_add(order.stable_in)
                .ok_or(LaunchError::ArithmeticOverflow)?;

            market.distribute_tax(&tax, &mut ledger)?;

            Ok(BuyReceipt {
                buyer,
                stable_in: order.stable_in,
                tokens_out,
                tax,
                settled_profit,
                ledger,
            })
        })
    }

    /// Return purchased tokens to the curve for stable.
    pub fn sell(
        &mut self,
        seller: Key,
        ledger: Option<&BuyerLedger>,
        order: &SellOrder,
        now: u64,
    ) -> Result<SellReceipt, LaunchError> {
        check_window(self, order.deadline, now)?;
        if order.tokens_in.is_zero() {
            return Err(LaunchError::InvalidParameter);
        }
        let mut ledger = *ledger.ok_or(LaunchError::InsufficientFunds)?;
        if ledger.held < order.tokens_in {
            return Err(LaunchError::InsufficientFunds);
        }

        let (gross_out, stable_out, tax) = self.quote_sell(order.tokens_in)?;
        if stable_out < order.min_stable_out {
            return Err(LaunchError::SlippageExceeded);
        }
        if gross_out.is_zero() {
            return Err(LaunchError::InvalidParameter);
        }
        if gross_out > self.config().real_stable {
            return Err(LaunchError::InsufficientFunds);
        }

        self.staged(|market| {
            market.take_in(Asset::Token, order.tokens_in)?;

            let settled_profit = market.settle_ledger(&mut ledger)?;
            ledger.remove_tokens(order.tokens_in)?;

            let config = market.config_mut();
            config.token_reserve = config
                .token_reserve
                .checked_add(order.tokens_in)
                .ok_or(LaunchError::ArithmeticOverflow)?;
            config.real_stable = config
                .real_stable
                .checked_sub(gross_out)
                .ok_or(LaunchError::InsufficientFunds)?;

            market.distribute_tax(&tax, &mut ledger)?;
            market.pay_out(Asset::Stable, stable_out)?;
            let platform_payout = market.release_platform_fees()?;

            Ok(SellReceipt {
                seller,
                tokens_in: order.tokens_in,
                gross_out,
                stable_out,
                tax,
                settled_profit,
                platform_payout,
                ledger,
            })
        })
    }

    /// Empty `platform_fees` once they reach the automatic payout threshold.
    fn release_platform_fees(&mut self) -> Result<U256, LaunchError> {
        let fees = self.config().platform_fees;
        if !self.params().above_auto_threshold(fees) {
            return Ok(U256::zero());
        }
        self.config_mut().platform_fees = U256::zero();
        self.pay_out(Asset::Stable, fees)?;
        Ok(fees)
    }

    fn in_snipe_window(&self, now: u64) -> bool {
        let window = self.params().snipe_window;
        window > 0 && now < self.config().start_time.saturating_add(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::tests::{alice, bob, creator, new_market, request, SEED};
    use crate::market::LaunchRequest;
    use crate::params::ProtocolParams;
    use crate::state::LaunchStatus;

    const NOW: u64 = 10_000;

    fn buy_order(stable_in: u64) -> BuyOrder {
        BuyOrder {
            stable_in: U256::from(stable_in),
            min_tokens_out: U256::one(),
            deadline: NOW + 60_000,
        }
    }

    fn sell_order(tokens_in: U256) -> SellOrder {
        SellOrder {
            tokens_in,
            min_stable_out: U256::one(),
            deadline: NOW + 60_000,
        }
    }

    #[test]
    fn test_first_buy() {
        let mut market = new_market();
        let receipt = market.buy(alice(), None, &buy_order(1_000_000), NOW).unwrap();

        assert_eq!(receipt.tokens_out, U256::from(45_040_946_314_831u64));
        assert_eq!(receipt.tax.total, U256::from(10_000u64));
        assert_eq!(receipt.settled_profit, U256::zero());
        assert_eq!(receipt.ledger.held, receipt.tokens_out);

        // nobody else holds yet, so the holders' share goes to the platform
        let config = market.config();
        assert_eq!(config.real_stable, U256::from(990_000u64));
        assert_eq!(config.total_raised, U256::from(1_000_000u64));
        assert_eq!(config.platform_fees, U256::from(7_000u64));
        assert_eq!(config.creator_fees, U256::from(3_000u64));
        assert_eq!(config.profit_reserve, U256::zero());
        assert_eq!(config.profit_index, U256::from(111u64));
        assert_eq!(receipt.ledger.checkpoint, config.profit_index);
        assert_eq!(market.claimable(Some(&receipt.ledger)), Ok(U256::zero()));
        assert_eq!(
            config.token_reserve,
            config.curve_supply - receipt.tokens_out
        );
        assert_eq!(market.check_conservation(), Ok(()));
        assert_eq!(receipt.event().kind, EventKind::Bought);
    }

    #[test]
    fn test_immediate_sell_loses_to_tax() {
        let mut market = new_market();
        let bought = market.buy(alice(), None, &buy_order(1_000_000), NOW).unwrap();
        let sold = market
            .sell(alice(), Some(&bought.ledger), &sell_order(bought.tokens_out), NOW)
            .unwrap();

        assert_eq!(sold.gross_out, U256::from(989_999u64));
        assert_eq!(sold.stable_out, U256::from(980_100u64));
        assert_eq!(sold.settled_profit, U256::zero());
        assert!(sold.total_paid().unwrap() < U256::from(1_000_000u64));
        assert_eq!(sold.ledger.held, U256::zero());

        let config = market.config();
        assert_eq!(config.token_reserve, config.curve_supply);
        assert_eq!(config.real_stable, U256::one());
        assert_eq!(market.check_conservation(), Ok(()));
    }

    #[test]
    fn test_sell_with_no_holders_left_routes_share_to_platform() {
        let mut market = new_market();
        let bought = market.buy(alice(), None, &buy_order(1_000_000), NOW).unwrap();
        let index = market.config().profit_index;
        let platform_fees = market.config().platform_fees;
        let sold = market
            .sell(alice(), Some(&bought.ledger), &sell_order(bought.tokens_out), NOW)
            .unwrap();

        assert_eq!(market.config().profit_index, index);
        assert_eq!(sold.platform_payout, U256::zero());
        assert_eq!(
            market.config().platform_fees,
            platform_fees + sold.tax.platform + sold.tax.holders
        );
    }

    #[test]
    fn test_expired_deadline_always_fails() {
        let mut market = new_market();
        let mut order = buy_order(1_000_000);
        order.deadline = NOW - 1;
        assert_eq!(
            market.buy(alice(), None, &order, NOW).unwrap_err(),
            LaunchError::DeadlineExpired
        );
        // even an order that would also fail slippage
        order.min_tokens_out = U256::MAX;
        assert_eq!(
            market.buy(alice(), None, &order, NOW).unwrap_err(),
            LaunchError::DeadlineExpired
        );
        assert_eq!(market, new_market());
    }

    #[test]
    fn test_slippage_writes_nothing() {
        let mut market = new_market();
        let before = market.clone();
        let mut order = buy_order(1_000_000);
        order.min_tokens_out = U256::from(45_040_946_314_832u64);
        assert_eq!(
            market.buy(alice(), None, &order, NOW).unwrap_err(),
            LaunchError::SlippageExceeded
        );
        assert_eq!(market, before);
    }

    #[test]
    fn test_sell_slippage_and_deadline() {
        let mut market = new_market();
        let bought = market.buy(alice(), None, &buy_order(1_000_000), NOW).unwrap();
        let before = market.clone();

        let mut order = sell_order(bought.tokens_out);
        order.min_stable_out = U256::from(980_101u64);
        assert_eq!(
            market
                .sell(alice(), Some(&bought.ledger), &order, NOW)
                .unwrap_err(),
            LaunchError::SlippageExceeded
        );
        order.deadline = NOW - 1;
        assert_eq!(
            market
                .sell(alice(), Some(&bought.ledger), &order, NOW)
                .unwrap_err(),
            LaunchError::DeadlineExpired
        );
        assert_eq!(market, before);
    }

    #[test]
    fn test_zero_amounts_rejected() {
        let mut market = new_market();
        let mut order = buy_order(0);
        order.min_tokens_out = U256::zero();
        assert_eq!(
            market.buy(alice(), None, &order, NOW).unwrap_err(),
            LaunchError::InvalidParameter
        );
        let ledger = BuyerLedger::default();
        assert_eq!(
            market
                .sell(alice(), Some(&ledger), &sell_order(U256::zero()), NOW)
                .unwrap_err(),
            LaunchError::InvalidParameter
        );
    }

    #[test]
    fn test_cannot_sell_more_than_bought() {
        let mut market = new_market();
        let bought = market.buy(alice(), None, &buy_order(1_000_000), NOW).unwrap();
        assert_eq!(
            market
                .sell(
                    alice(),
                    Some(&bought.ledger),
                    &sell_order(bought.tokens_out + U256::one()),
                    NOW
                )
                .unwrap_err(),
            LaunchError::InsufficientFunds
        );
        assert_eq!(
            market
                .sell(bob(), None, &sell_order(U256::one()), NOW)
                .unwrap_err(),
            LaunchError::InsufficientFunds
        );
    }

    #[test]
    fn test_trading_stops_after_finalize() {
        let mut market = new_market();
        let bought = market.buy(alice(), None, &buy_order(1_000_000), NOW).unwrap();
        market.finalize(request().creator).unwrap();
        assert_eq!(market.config().status, LaunchStatus::Finalized);

        assert_eq!(
            market.buy(bob(), None, &buy_order(1_000_000), NOW).unwrap_err(),
            LaunchError::InvalidState
        );
        assert_eq!(
            market
                .sell(alice(), Some(&bought.ledger), &sell_order(U256::one()), NOW)
                .unwrap_err(),
            LaunchError::InvalidState
        );
    }

    #[test]
    fn test_late_buyer_gets_no_earlier_profit() {
        let mut market = new_market();
        let first = market.buy(alice(), None, &buy_order(1_000_000), NOW).unwrap();
        let second = market.buy(bob(), None, &buy_order(1_000_000), NOW).unwrap();
        assert_eq!(second.ledger.checkpoint, market.config().profit_index);

        let alice_share = market.claimable(Some(&first.ledger)).unwrap();
        let bob_share = market.claimable(Some(&second.ledger)).unwrap();
        assert!(alice_share > U256::zero());
        assert_eq!(bob_share, U256::zero());
        assert!(alice_share <= market.config().profit_reserve);

        // a third buyer pays both earlier holders
        let third = market.buy(creator(), None, &buy_order(1_000_000), NOW).unwrap();
        assert!(market.claimable(Some(&second.ledger)).unwrap() > U256::zero());
        assert_eq!(market.claimable(Some(&third.ledger)), Ok(U256::zero()));
    }

    #[test]
    fn test_claim_is_idempotent() {
        let mut market = new_market();
        let first = market.buy(alice(), None, &buy_order(1_000_000), NOW).unwrap();
        market.buy(bob(), None, &buy_order(2_000_000), NOW).unwrap();

        let claim = market.claim_profits(alice(), Some(&first.ledger)).unwrap();
        assert!(claim.amount > U256::zero());
        assert_eq!(claim.ledger.checkpoint, market.config().profit_index);
        assert_eq!(market.claimable(Some(&claim.ledger)), Ok(U256::zero()));
        assert_eq!(
            market
                .claim_profits(alice(), Some(&claim.ledger))
                .unwrap_err(),
            LaunchError::NothingToClaim
        );
        assert_eq!(market.check_conservation(), Ok(()));
    }

    #[test]
    fn test_repeat_buy_settles_pending_profit() {
        let mut market = new_market();
        let first = market.buy(alice(), None, &buy_order(1_000_000), NOW).unwrap();
        market.buy(bob(), None, &buy_order(1_000_000), NOW).unwrap();
        let owed = market.claimable(Some(&first.ledger)).unwrap();
        assert!(owed > U256::zero());
        let second = market
            .buy(alice(), Some(&first.ledger), &buy_order(1_000_000), NOW)
            .unwrap();
        assert_eq!(second.settled_profit, owed);
        assert_eq!(second.ledger.held, first.tokens_out + second.tokens_out);
    }

    #[test]
    fn test_snipe_window_caps_early_buys() {
        let params = ProtocolParams {
            snipe_window: 20_000,
            ..ProtocolParams::default()
        };
        let (mut market, _) = Market::create(params, &request(), NOW).unwrap();

        // 0.1% of the allocation is 500,000 tokens; 1 USDC buys ~45M
        assert_eq!(
            market.buy(alice(), None, &buy_order(1_000_000), NOW + 1).unwrap_err(),
            LaunchError::SnipeLimitExceeded
        );
        assert!(market.buy(alice(), None, &buy_order(1_000), NOW + 1).is_ok());
        assert!(market
            .buy(alice(), None, &buy_order(1_000_000), NOW + 20_000)
            .is_ok());
    }

    #[test]
    fn test_price_rises_on_buy_and_falls_on_sell() {
        let mut market = new_market();
        let start = market.spot_price().unwrap();
        let bought = market.buy(alice(), None, &buy_order(5_000_000), NOW).unwrap();
        let after_buy = market.spot_price().unwrap();
        assert!(after_buy > start);

        market
            .sell(alice(), Some(&bought.ledger), &sell_order(bought.tokens_out / 2), NOW)
            .unwrap();
        assert!(market.spot_price().unwrap() < after_buy);
        assert!(market.config().virtual_stable == U256::from(SEED));
    }

    #[test]
    fn test_own_tax_is_never_paid_back() {
        let mut market = new_market();
        let small = market.buy(alice(), None, &buy_order(1_000_000), NOW).unwrap();
        let large = market
            .buy(bob(), None, &buy_order(1_000_000_000), NOW)
            .unwrap();

        assert_eq!(market.claimable(Some(&large.ledger)), Ok(U256::zero()));
        let alice_share = market.claimable(Some(&small.ledger)).unwrap();
        assert!(alice_share > U256::zero());
        assert!(alice_share <= large.tax.holders);

        let again = market
            .buy(bob(), Some(&large.ledger), &buy_order(1_000_000), NOW)
            .unwrap();
        assert_eq!(again.settled_profit, U256::zero());
        assert_eq!(market.check_conservation(), Ok(()));
    }

    #[test]
    fn test_oversized_seed_overflows_without_writing() {
        let huge = LaunchRequest {
            virtual_stable: U256::MAX / 2,
            creator_stable_balance: U256::MAX,
            ..request()
        };
        let (mut market, _) = Market::create(ProtocolParams::default(), &huge, NOW).unwrap();
        let before = market.clone();
        assert_eq!(
            market.buy(alice(), None, &buy_order(1_000_000), NOW).unwrap_err(),
            LaunchError::ArithmeticOverflow
        );
        assert_eq!(market, before);
    }

    #[test]
    fn test_sell_releases_platform_fees_above_threshold() {
        let params = ProtocolParams {
            platform_auto_threshold: U256::from(50_000u64),
            ..ProtocolParams::default()
        };
        let (mut market, _) = Market::create(params, &request(), NOW).unwrap();
        let first = market.buy(alice(), None, &buy_order(1_000_000), NOW).unwrap();
        market.buy(bob(), None, &buy_order(30_000_000), NOW).unwrap();
        // 7,000 from the first buy plus 20% of the second buy's 300,000 tax
        let accrued = market.config().platform_fees;
        assert_eq!(accrued, U256::from(67_000u64));

        let vault_before = market.vault().balance(Asset::Stable);
        let sold = market
            .sell(alice(), Some(&first.ledger), &sell_order(first.tokens_out), NOW)
            .unwrap();
        assert_eq!(sold.platform_payout, accrued + sold.tax.platform);
        assert_eq!(market.config().platform_fees, U256::zero());
        assert_eq!(
            market.vault().balance(Asset::Stable),
            vault_before - sold.total_paid().unwrap() - sold.platform_payout
        );
        assert_eq!(market.check_conservation(), Ok(()));
    }
}
