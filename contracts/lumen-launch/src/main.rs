#![no_std]
#![no_main]

extern crate alloc;

mod external;
mod store;

use alloc::boxed::Box;
use alloc::format;
use alloc::vec;
use casper_contract::{
    contract_api::{runtime, storage},
    unwrap_or_revert::UnwrapOrRevert,
};
use casper_types::{
    addressable_entity::{EntityEntryPoint as EntryPoint, EntryPoints},
    runtime_args, CLType, CLValue, EntryPointAccess, EntryPointPayment, EntryPointType, Key,
    Parameter, RuntimeArgs, U256,
};

use lumen_launch::authority::{derive_authority, AuthorityScope};
use lumen_launch::error::LaunchError;
use lumen_launch::governor::PlatformWithdrawal;
use lumen_launch::market::{LaunchRequest, Market};
use lumen_launch::params::{self, ProtocolParams};
use lumen_launch::trade::{BuyOrder, SellOrder};

use external::{call_token_balance_of, call_token_transfer, call_token_transfer_from, DexVenue};
use store::{emit, load_market, lock, require_unlocked, save_market, unlock};

fn get_current_time() -> u64 {
    runtime::get_blocktime().into()
}

fn caller() -> Key {
    Key::Account(runtime::get_caller())
}

fn self_key() -> Key {
    runtime::get_key(store::SELF_KEY).unwrap_or_revert()
}

// ============ Entry Points ============

/// Create dictionaries and store the contract's own key (called by `call`)
#[no_mangle]
pub extern "C" fn init() {
    let self_key: Key = runtime::get_named_arg("self_key");
    store::initialize(self_key);
}

/// Open the market. Pulls the listing fee, the seed and the curve allocation
/// from the creator, who must have approved this contract on both tokens.
#[no_mangle]
pub extern "C" fn create() {
    require_unlocked();
    lock();

    let stable: Key = runtime::get_named_arg("stable");
    let virtual_stable: U256 = runtime::get_named_arg("virtual_stable");

    let creator = caller();
    if creator != store::read_creator() {
        runtime::revert(LaunchError::Unauthorized);
    }
    store::mark_created();

    let now = get_current_time();
    let request = LaunchRequest {
        creator,
        platform: store::read_platform(),
        token: store::read_token(),
        stable,
        virtual_stable,
        creator_stable_balance: call_token_balance_of(stable, creator),
    };
    let (market, receipt) = Market::create(store::load_params(), &request, now).unwrap_or_revert();

    let this = self_key();
    call_token_transfer_from(stable, creator, request.platform, receipt.listing_fee);
    call_token_transfer_from(stable, creator, this, receipt.seed_escrow);
    call_token_transfer_from(request.token, creator, this, receipt.curve_tokens);

    save_market(&market);
    emit(&receipt.event(), now);
    unlock();
}

/// Buy tokens with stable; returns tokens received
#[no_mangle]
pub extern "C" fn buy() {
    require_unlocked();
    lock();

    let order = BuyOrder {
        stable_in: runtime::get_named_arg("stable_in"),
        min_tokens_out: runtime::get_named_arg("min_tokens_out"),
        deadline: runtime::get_named_arg("deadline"),
    };
    let buyer = caller();
    let now = get_current_time();

    let mut market = load_market();
    let ledger = store::read_ledger(&buyer);
    let receipt = market
        .buy(buyer, ledger.as_ref(), &order, now)
        .unwrap_or_revert();

    let config = market.config();
    call_token_transfer_from(config.stable, buyer, self_key(), receipt.stable_in);
    call_token_transfer(config.token, buyer, receipt.tokens_out);
    call_token_transfer(config.stable, buyer, receipt.settled_profit);

    store::write_ledger(&buyer, &receipt.ledger);
    save_market(&market);
    emit(&receipt.event(), now);

    unlock();
    runtime::ret(CLValue::from_t(receipt.tokens_out).unwrap_or_revert());
}

/// Sell purchased tokens back to the curve; returns stable paid after tax
#[no_mangle]
pub extern "C" fn sell() {
    require_unlocked();
    lock();

    let order = SellOrder {
        tokens_in: runtime::get_named_arg("tokens_in"),
        min_stable_out: runtime::get_named_arg("min_stable_out"),
        deadline: runtime::get_named_arg("deadline"),
    };
    let seller = caller();
    let now = get_current_time();

    let mut market = load_market();
    let ledger = store::read_ledger(&seller);
    let receipt = market
        .sell(seller, ledger.as_ref(), &order, now)
        .unwrap_or_revert();

    let config = market.config();
    call_token_transfer_from(config.token, seller, self_key(), receipt.tokens_in);
    call_token_transfer(config.stable, seller, receipt.total_paid().unwrap_or_revert());
    call_token_transfer(config.stable, config.platform, receipt.platform_payout);

    store::write_ledger(&seller, &receipt.ledger);
    save_market(&market);
    emit(&receipt.event(), now);
    if !receipt.platform_payout.is_zero() {
        let payout = PlatformWithdrawal {
            platform: config.platform,
            amount: receipt.platform_payout,
        };
        emit(&payout.event(), now);
    }

    unlock();
    runtime::ret(CLValue::from_t(receipt.stable_out).unwrap_or_revert());
}

#[no_mangle]
pub extern "C" fn claim_profits() {
    require_unlocked();
    lock();

    let holder = caller();
    let mut market = load_market();
    let ledger = store::read_ledger(&holder);
    let receipt = market
        .claim_profits(holder, ledger.as_ref())
        .unwrap_or_revert();

    call_token_transfer(market.config().stable, holder, receipt.amount);

    store::write_ledger(&holder, &receipt.ledger);
    save_market(&market);
    emit(&receipt.event(), get_current_time());

    unlock();
    runtime::ret(CLValue::from_t(receipt.amount).unwrap_or_revert());
}

#[no_mangle]
pub extern "C" fn finalize() {
    require_unlocked();
    lock();

    let mut market = load_market();
    let receipt = market.finalize(caller()).unwrap_or_revert();

    save_market(&market);
    emit(&receipt.event(), get_current_time());
    unlock();
}

#[no_mangle]
pub extern "C" fn withdraw_creator_reserve() {
    require_unlocked();
    lock();

    let amount: U256 = runtime::get_named_arg("amount");
    let mut market = load_market();
    let receipt = market
        .withdraw_creator_reserve(caller(), amount)
        .unwrap_or_revert();

    call_token_transfer(market.config().stable, receipt.creator, receipt.amount);

    save_market(&market);
    emit(&receipt.event(), get_current_time());
    unlock();
}

#[no_mangle]
pub extern "C" fn reclaim_virtual_funds() {
    require_unlocked();
    lock();

    let mut market = load_market();
    let receipt = market.reclaim_virtual_funds(caller()).unwrap_or_revert();

    let config = market.config();
    call_token_transfer(config.stable, receipt.creator, receipt.stable_refund);
    call_token_transfer(config.token, receipt.creator, receipt.token_refund);

    save_market(&market);
    emit(&receipt.event(), get_current_time());
    unlock();
}

/// Graduate to the DEX; returns the pair key
#[no_mangle]
pub extern "C" fn close_and_migrate() {
    require_unlocked();
    lock();

    let now = get_current_time();
    let mut market = load_market();
    let mut venue = DexVenue {
        factory: store::read_from_uref(store::DEX_FACTORY),
        pair: store::read_from_uref(store::POOL_PAIR),
        stable: market.config().stable,
        token: market.config().token,
        self_key: self_key(),
    };
    let receipt = market
        .close_and_migrate(caller(), &mut venue, now)
        .unwrap_or_revert();

    let config = market.config();
    call_token_transfer(config.stable, config.creator, receipt.seed_refund);

    save_market(&market);
    emit(&receipt.event(), now);

    unlock();
    runtime::ret(CLValue::from_t(receipt.pool).unwrap_or_revert());
}

#[no_mangle]
pub extern "C" fn withdraw_platform_remaining() {
    require_unlocked();
    lock();

    let now = get_current_time();
    let mut market = load_market();
    let receipt = market
        .withdraw_platform_remaining(caller(), now)
        .unwrap_or_revert();

    call_token_transfer(market.config().stable, receipt.platform, receipt.amount);

    save_market(&market);
    emit(&receipt.event(), now);
    unlock();
}

// ============ Views ============

/// Tokens received for `stable_in`, after tax
#[no_mangle]
pub extern "C" fn quote_buy() {
    let stable_in: U256 = runtime::get_named_arg("stable_in");
    let (tokens_out, _) = load_market().quote_buy(stable_in).unwrap_or_revert();
    runtime::ret(CLValue::from_t(tokens_out).unwrap_or_revert());
}

/// Stable paid for `tokens_in`, after tax
#[no_mangle]
pub extern "C" fn quote_sell() {
    let tokens_in: U256 = runtime::get_named_arg("tokens_in");
    let (_, stable_out, _) = load_market().quote_sell(tokens_in).unwrap_or_revert();
    runtime::ret(CLValue::from_t(stable_out).unwrap_or_revert());
}

#[no_mangle]
pub extern "C" fn spot_price() {
    let price = load_market().spot_price().unwrap_or_revert();
    runtime::ret(CLValue::from_t(price).unwrap_or_revert());
}

/// (real_stable, graduation_threshold, progress_bps)
#[no_mangle]
pub extern "C" fn get_progress() {
    let market = load_market();
    let progress = market.progress_bps().unwrap_or_revert();
    runtime::ret(
        CLValue::from_t((
            market.config().real_stable,
            market.params().graduation_threshold,
            progress,
        ))
        .unwrap_or_revert(),
    );
}

/// (virtual_stable, real_stable, token_reserve)
#[no_mangle]
pub extern "C" fn get_reserves() {
    let market = load_market();
    let config = market.config();
    runtime::ret(
        CLValue::from_t((config.virtual_stable, config.real_stable, config.token_reserve))
            .unwrap_or_revert(),
    );
}

/// (platform_fees, creator_fees, profit_reserve)
#[no_mangle]
pub extern "C" fn get_accumulators() {
    let market = load_market();
    let config = market.config();
    runtime::ret(
        CLValue::from_t((config.platform_fees, config.creator_fees, config.profit_reserve))
            .unwrap_or_revert(),
    );
}

#[no_mangle]
pub extern "C" fn claimable() {
    let participant: Key = runtime::get_named_arg("participant");
    let ledger = store::read_ledger(&participant);
    let amount = load_market().claimable(ledger.as_ref()).unwrap_or_revert();
    runtime::ret(CLValue::from_t(amount).unwrap_or_revert());
}

/// (held, checkpoint), zeros when the participant never bought
#[no_mangle]
pub extern "C" fn ledger_of() {
    let participant: Key = runtime::get_named_arg("participant");
    let ledger = store::read_ledger(&participant).unwrap_or_default();
    runtime::ret(CLValue::from_t((ledger.held, ledger.checkpoint)).unwrap_or_revert());
}

#[no_mangle]
pub extern "C" fn status() {
    let status = load_market().config().status.as_u8();
    runtime::ret(CLValue::from_t(status).unwrap_or_revert());
}

/// (pool, liquidity, locked_at) once migrated
#[no_mangle]
pub extern "C" fn lp_lock() {
    let lock = load_market()
        .lp_lock()
        .map(|lock| (lock.pool(), lock.liquidity(), lock.locked_at()));
    runtime::ret(CLValue::from_t(lock).unwrap_or_revert());
}

// ============ Contract Installation ============

fn entry_point(name: &str, params: vec::Vec<Parameter>, ret: CLType) -> EntryPoint {
    EntryPoint::new(
        name,
        params,
        ret,
        EntryPointAccess::Public,
        EntryPointType::Called,
        EntryPointPayment::Caller,
    )
}

fn u256_triple() -> CLType {
    CLType::Tuple3([
        Box::new(CLType::U256),
        Box::new(CLType::U256),
        Box::new(CLType::U256),
    ])
}

fn get_entry_points() -> EntryPoints {
    let mut entry_points = EntryPoints::new();

    entry_points.add_entry_point(entry_point(
        "init",
        vec![Parameter::new("self_key", CLType::Key)],
        CLType::Unit,
    ));

    // State-changing entry points
    entry_points.add_entry_point(entry_point(
        "create",
        vec![
            Parameter::new("stable", CLType::Key),
            Parameter::new("virtual_stable", CLType::U256),
        ],
        CLType::Unit,
    ));
    entry_points.add_entry_point(entry_point(
        "buy",
        vec![
            Parameter::new("stable_in", CLType::U256),
            Parameter::new("min_tokens_out", CLType::U256),
            Parameter::new("deadline", CLType::U64),
        ],
        CLType::U256,
    ));
    entry_points.add_entry_point(entry_point(
        "sell",
        vec![
            Parameter::new("tokens_in", CLType::U256),
            Parameter::new("min_stable_out", CLType::U256),
            Parameter::new("deadline", CLType::U64),
        ],
        CLType::U256,
    ));
    entry_points.add_entry_point(entry_point("claim_profits", vec![], CLType::U256));
    entry_points.add_entry_point(entry_point("finalize", vec![], CLType::Unit));
    entry_points.add_entry_point(entry_point(
        "withdraw_creator_reserve",
        vec![Parameter::new("amount", CLType::U256)],
        CLType::Unit,
    ));
    entry_points.add_entry_point(entry_point("reclaim_virtual_funds", vec![], CLType::Unit));
    entry_points.add_entry_point(entry_point("close_and_migrate", vec![], CLType::Key));
    entry_points.add_entry_point(entry_point(
        "withdraw_platform_remaining",
        vec![],
        CLType::Unit,
    ));

    // Read-only entry points
    entry_points.add_entry_point(entry_point(
        "quote_buy",
        vec![Parameter::new("stable_in", CLType::U256)],
        CLType::U256,
    ));
    entry_points.add_entry_point(entry_point(
        "quote_sell",
        vec![Parameter::new("tokens_in", CLType::U256)],
        CLType::U256,
    ));
    entry_points.add_entry_point(entry_point("spot_price", vec![], CLType::U256));
    entry_points.add_entry_point(entry_point(
        "get_progress",
        vec![],
        CLType::Tuple3([
            Box::new(CLType::U256),
            Box::new(CLType::U256),
            Box::new(CLType::U64),
        ]),
    ));
    entry_points.add_entry_point(entry_point("get_reserves", vec![], u256_triple()));
    entry_points.add_entry_point(entry_point("get_accumulators", vec![], u256_triple()));
    entry_points.add_entry_point(entry_point(
        "claimable",
        vec![Parameter::new("participant", CLType::Key)],
        CLType::U256,
    ));
    entry_points.add_entry_point(entry_point(
        "ledger_of",
        vec![Parameter::new("participant", CLType::Key)],
        CLType::Tuple2([Box::new(CLType::U256), Box::new(CLType::U256)]),
    ));
    entry_points.add_entry_point(entry_point("status", vec![], CLType::U8));
    entry_points.add_entry_point(entry_point(
        "lp_lock",
        vec![],
        CLType::Option(Box::new(CLType::Tuple3([
            Box::new(CLType::Key),
            Box::new(CLType::U256),
            Box::new(CLType::U64),
        ]))),
    ));

    entry_points
}

/// Install a market for one project token. The deployer becomes its creator.
#[no_mangle]
pub extern "C" fn call() {
    let token: Key = runtime::get_named_arg("token");
    let platform: Key = runtime::get_named_arg("platform");
    let dex_factory: Key = runtime::get_named_arg("dex_factory");
    let pool_pair: Key = runtime::get_named_arg("pool_pair");

    // Optional protocol parameters with defaults
    let defaults = ProtocolParams::default();
    let protocol = ProtocolParams {
        min_virtual_stable: runtime::get_named_arg::<Option<U256>>("min_virtual_stable")
            .unwrap_or(defaults.min_virtual_stable),
        listing_fee: runtime::get_named_arg::<Option<U256>>("listing_fee")
            .unwrap_or(defaults.listing_fee),
        tax_bps: runtime::get_named_arg::<Option<u64>>("tax_bps").unwrap_or(params::DEFAULT_TAX_BPS),
        platform_share_bps: runtime::get_named_arg::<Option<u64>>("platform_share_bps")
            .unwrap_or(params::DEFAULT_PLATFORM_SHARE_BPS),
        creator_share_bps: runtime::get_named_arg::<Option<u64>>("creator_share_bps")
            .unwrap_or(params::DEFAULT_CREATOR_SHARE_BPS),
        graduation_threshold: runtime::get_named_arg::<Option<U256>>("graduation_threshold")
            .unwrap_or(defaults.graduation_threshold),
        platform_cooldown: runtime::get_named_arg::<Option<u64>>("platform_cooldown")
            .unwrap_or(params::DEFAULT_PLATFORM_COOLDOWN_MS),
        curve_supply: runtime::get_named_arg::<Option<U256>>("curve_supply")
            .unwrap_or(defaults.curve_supply),
        snipe_window: runtime::get_named_arg::<Option<u64>>("snipe_window").unwrap_or(0),
        snipe_max_bps: runtime::get_named_arg::<Option<u64>>("snipe_max_bps")
            .unwrap_or(params::DEFAULT_SNIPE_MAX_BPS),
        platform_auto_threshold: runtime::get_named_arg::<Option<U256>>("platform_auto_threshold")
            .unwrap_or(defaults.platform_auto_threshold),
    };
    protocol.validate().unwrap_or_revert();

    let creator = Key::Account(runtime::get_caller());
    let named_keys =
        store::install_named_keys(&protocol, creator, platform, token, dex_factory, pool_pair);

    // One market per token, addressed by its launch-config seed
    let launch = derive_authority(AuthorityScope::LaunchConfig, &token);
    let (contract_hash, _) = storage::new_contract(
        get_entry_points(),
        Some(named_keys),
        Some(format!("{}_package", launch.seed())),
        Some(format!("{}_access", launch.seed())),
        None,
    );

    runtime::put_key(launch.seed(), contract_hash.into());

    // Initialize (creates dictionaries)
    runtime::call_contract::<()>(
        contract_hash,
        "init",
        runtime_args! {
            "self_key" => Key::Hash(contract_hash.value())
        },
    );
}
