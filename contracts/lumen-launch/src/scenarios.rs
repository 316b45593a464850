//! Multi-participant runs checked against external bookkeeping.

use casper_types::{Key, U256};

use crate::error::LaunchError;
use crate::ledger::BuyerLedger;
use crate::market::tests::{alice, bob, creator, new_market, platform, SEED};
use crate::market::Market;
use crate::params::DEFAULT_PLATFORM_COOLDOWN_MS;
use crate::trade::{BuyOrder, SellOrder};
use crate::vault::Asset;

/// Tracks every stable unit that entered or left the vault.
struct Books {
    market: Market,
    stable_in_vault: U256,
    alice: Option<BuyerLedger>,
    bob: Option<BuyerLedger>,
    last_index: U256,
}

impl Books {
    fn new() -> Self {
        Books {
            market: new_market(),
            stable_in_vault: U256::from(SEED),
            alice: None,
            bob: None,
            last_index: U256::zero(),
        }
    }

    fn ledger(&mut self, who: Key) -> &mut Option<BuyerLedger> {
        if who == alice() {
            &mut self.alice
        } else {
            &mut self.bob
        }
    }

    fn buy(&mut self, who: Key, amount: u64) {
        let order = BuyOrder {
            stable_in: U256::from(amount),
            min_tokens_out: U256::one(),
            deadline: u64::MAX,
        };
        let current = *self.ledger(who);
        let receipt = self.market.buy(who, current.as_ref(), &order, 50_000).unwrap();
        self.stable_in_vault = self.stable_in_vault + receipt.stable_in - receipt.settled_profit;
        *self.ledger(who) = Some(receipt.ledger);
        self.observe();
    }

    fn sell_half(&mut self, who: Key) {
        let current = self.ledger(who).unwrap();
        let order = SellOrder {
            tokens_in: current.held / 2,
            min_stable_out: U256::one(),
            deadline: u64::MAX,
        };
        let receipt = self.market.sell(who, Some(&current), &order, 50_000).unwrap();
        self.stable_in_vault -= receipt.total_paid().unwrap() + receipt.platform_payout;
        *self.ledger(who) = Some(receipt.ledger);
        self.observe();
    }

    fn claim(&mut self, who: Key) {
        let current = *self.ledger(who);
        let receipt = self.market.claim_profits(who, current.as_ref()).unwrap();
        self.stable_in_vault -= receipt.amount;
        *self.ledger(who) = Some(receipt.ledger);
        self.observe();
    }

    fn observe(&mut self) {
        let config = self.market.config();
        assert_eq!(self.market.check_conservation(), Ok(()));
        assert_eq!(self.market.vault().balance(Asset::Stable), self.stable_in_vault);
        assert!(config.profit_index >= self.last_index);
        self.last_index = config.profit_index;

        let held = self.alice.map(|l| l.held).unwrap_or_default()
            + self.bob.map(|l| l.held).unwrap_or_default();
        assert_eq!(held, config.circulating_supply().unwrap());
    }
}

#[test]
fn test_mixed_trading_conserves_stable() {
    let mut books = Books::new();
    books.buy(alice(), 3_000_000);
    books.buy(bob(), 7_500_000);
    books.sell_half(alice());
    books.buy(alice(), 1_234_567);
    books.claim(bob());
    books.sell_half(bob());
    books.claim(alice());
    books.sell_half(alice());
    books.buy(bob(), 250_000);

    let withdrawal = books
        .market
        .withdraw_platform_remaining(platform(), DEFAULT_PLATFORM_COOLDOWN_MS)
        .unwrap();
    books.stable_in_vault -= withdrawal.amount;
    books.observe();

    let fees = books.market.config().creator_fees;
    books
        .market
        .withdraw_creator_reserve(creator(), fees)
        .unwrap();
    books.stable_in_vault -= fees;
    books.observe();
}

#[test]
fn test_failures_leave_no_trace() {
    let mut books = Books::new();
    books.buy(alice(), 2_000_000);
    books.buy(bob(), 2_000_000);
    let snapshot = books.market.clone();

    let greedy = BuyOrder {
        stable_in: U256::from(1_000_000u64),
        min_tokens_out: U256::MAX,
        deadline: u64::MAX,
    };
    assert_eq!(
        books.market.buy(alice(), books.alice.as_ref(), &greedy, 50_000),
        Err(LaunchError::SlippageExceeded)
    );
    assert_eq!(
        books
            .market
            .withdraw_creator_reserve(creator(), U256::MAX),
        Err(LaunchError::InsufficientFunds)
    );
    assert_eq!(
        books
            .market
            .withdraw_platform_remaining(platform(), 1),
        Err(LaunchError::CooldownNotElapsed)
    );
    assert_eq!(
        books.market.reclaim_virtual_funds(creator()),
        Err(LaunchError::InvalidState)
    );

    assert_eq!(books.market, snapshot);
    books.observe();
}

#[test]
fn test_profit_paid_never_exceeds_reserve() {
    let mut books = Books::new();
    books.buy(alice(), 1_000_000);
    for _ in 0..5 {
        books.buy(bob(), 1_000_000);
        books.sell_half(bob());
    }
    let alice_ledger = books.alice;
    let bob_ledger = books.bob;
    let owed = books.market.claimable(alice_ledger.as_ref()).unwrap()
        + books.market.claimable(bob_ledger.as_ref()).unwrap();
    assert!(owed <= books.market.config().profit_reserve);

    books.claim(alice());
    assert_eq!(
        books.market.claim_profits(alice(), books.alice.as_ref()),
        Err(LaunchError::NothingToClaim)
    );
}
