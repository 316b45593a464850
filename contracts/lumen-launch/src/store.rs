//! Contract storage: named keys for the market record, dictionaries for
//! ledgers and the event log.

use alloc::string::{String, ToString};
use casper_contract::{
    contract_api::{runtime, storage},
    unwrap_or_revert::UnwrapOrRevert,
};
use casper_types::{
    bytesrepr::{FromBytes, ToBytes},
    contracts::NamedKeys,
    CLTyped, Key, URef, U256,
};

use lumen_launch::authority::{derive_ledger_address, key_to_str};
use lumen_launch::error::LaunchError;
use lumen_launch::events::LaunchEvent;
use lumen_launch::ledger::BuyerLedger;
use lumen_launch::market::Market;
use lumen_launch::migration::LpLock;
use lumen_launch::params::ProtocolParams;
use lumen_launch::state::{LaunchConfig, LaunchStatus};
use lumen_launch::vault::{Asset, ReserveVault};

// ============ Storage Keys ============

// Protocol parameters, fixed at install
const MIN_VIRTUAL_STABLE: &str = "min_virtual_stable";
const LISTING_FEE: &str = "listing_fee";
const TAX_BPS: &str = "tax_bps";
const PLATFORM_SHARE_BPS: &str = "platform_share_bps";
const CREATOR_SHARE_BPS: &str = "creator_share_bps";
const GRADUATION_THRESHOLD: &str = "graduation_threshold";
const PLATFORM_COOLDOWN: &str = "platform_cooldown";
const CURVE_SUPPLY: &str = "curve_supply";
const SNIPE_WINDOW: &str = "snipe_window";
const SNIPE_MAX_BPS: &str = "snipe_max_bps";
const PLATFORM_AUTO_THRESHOLD: &str = "platform_auto_threshold";

// Launch config
const CREATOR: &str = "creator";
const PLATFORM: &str = "platform";
const TOKEN: &str = "token";
const STABLE: &str = "stable";
const VIRTUAL_STABLE: &str = "virtual_stable";
const REAL_STABLE: &str = "real_stable";
const TOKEN_RESERVE: &str = "token_reserve";
const PLATFORM_FEES: &str = "platform_fees";
const CREATOR_FEES: &str = "creator_fees";
const PROFIT_RESERVE: &str = "profit_reserve";
const PROFIT_INDEX: &str = "profit_index";
const STATUS: &str = "status";
const LAST_PLATFORM_WITHDRAWAL: &str = "last_platform_withdrawal";
const SEED_ESCROW: &str = "seed_escrow";
const TOTAL_RAISED: &str = "total_raised";
const START_TIME: &str = "start_time";

// Vault balances
const VAULT_STABLE: &str = "vault_stable";
const VAULT_TOKEN: &str = "vault_token";

// Migration
pub const DEX_FACTORY: &str = "dex_factory";
pub const POOL_PAIR: &str = "pool_pair";
const LP_LOCK: &str = "lp_lock";

// Contract plumbing
pub const SELF_KEY: &str = "self_key";
const LEDGERS: &str = "ledgers";
const EVENTS: &str = "events";
const EVENT_COUNT: &str = "event_count";
const CREATED: &str = "created";
const LOCKED: &str = "locked";
const INITIALIZED: &str = "initialized";

/// Persisted form of an LP lock: (pool, liquidity, locked_at)
type LockRecord = (Key, U256, u64);

// ============ Helper Functions ============

pub fn read_from_uref<T: CLTyped + FromBytes>(name: &str) -> T {
    let key = runtime::get_key(name).unwrap_or_revert();
    let uref = key.into_uref().unwrap_or_revert();
    storage::read(uref).unwrap_or_revert().unwrap_or_revert()
}

pub fn write_to_uref<T: CLTyped + ToBytes>(name: &str, value: T) {
    let key = runtime::get_key(name).unwrap_or_revert();
    let uref = key.into_uref().unwrap_or_revert();
    storage::write(uref, value);
}

fn get_dictionary_uref(name: &str) -> URef {
    runtime::get_key(name)
        .unwrap_or_revert()
        .into_uref()
        .unwrap_or_revert()
}

// ============ Install ============

/// Named keys of a freshly installed market. The config slots hold
/// placeholders until `create` runs.
pub fn install_named_keys(
    params: &ProtocolParams,
    creator: Key,
    platform: Key,
    token: Key,
    dex_factory: Key,
    pool_pair: Key,
) -> NamedKeys {
    let mut named_keys = NamedKeys::new();
    let mut put = |name: &str, key: Key| {
        named_keys.insert(name.to_string(), key);
    };

    put(MIN_VIRTUAL_STABLE, storage::new_uref(params.min_virtual_stable).into());
    put(LISTING_FEE, storage::new_uref(params.listing_fee).into());
    put(TAX_BPS, storage::new_uref(params.tax_bps).into());
    put(PLATFORM_SHARE_BPS, storage::new_uref(params.platform_share_bps).into());
    put(CREATOR_SHARE_BPS, storage::new_uref(params.creator_share_bps).into());
    put(GRADUATION_THRESHOLD, storage::new_uref(params.graduation_threshold).into());
    put(PLATFORM_COOLDOWN, storage::new_uref(params.platform_cooldown).into());
    put(CURVE_SUPPLY, storage::new_uref(params.curve_supply).into());
    put(SNIPE_WINDOW, storage::new_uref(params.snipe_window).into());
    put(SNIPE_MAX_BPS, storage::new_uref(params.snipe_max_bps).into());
    put(
        PLATFORM_AUTO_THRESHOLD,
        storage::new_uref(params.platform_auto_threshold).into(),
    );

    put(CREATOR, storage::new_uref(creator).into());
    put(PLATFORM, storage::new_uref(platform).into());
    put(TOKEN, storage::new_uref(token).into());
    put(STABLE, storage::new_uref(token).into());
    for name in [
        VIRTUAL_STABLE,
        REAL_STABLE,
        TOKEN_RESERVE,
        PLATFORM_FEES,
        CREATOR_FEES,
        PROFIT_RESERVE,
        PROFIT_INDEX,
        SEED_ESCROW,
        TOTAL_RAISED,
        VAULT_STABLE,
        VAULT_TOKEN,
    ] {
        put(name, storage::new_uref(U256::zero()).into());
    }
    put(STATUS, storage::new_uref(LaunchStatus::Active.as_u8()).into());
    put(LAST_PLATFORM_WITHDRAWAL, storage::new_uref(0u64).into());
    put(START_TIME, storage::new_uref(0u64).into());

    put(DEX_FACTORY, storage::new_uref(dex_factory).into());
    put(POOL_PAIR, storage::new_uref(pool_pair).into());
    put(LP_LOCK, storage::new_uref(Option::<LockRecord>::None).into());

    put(EVENT_COUNT, storage::new_uref(0u64).into());
    put(CREATED, storage::new_uref(false).into());
    put(LOCKED, storage::new_uref(false).into());
    put(INITIALIZED, storage::new_uref(false).into());

    named_keys
}

/// Create the dictionaries and remember the contract's own key. Once only.
pub fn initialize(self_key: Key) {
    let initialized: bool = read_from_uref(INITIALIZED);
    if initialized {
        runtime::revert(LaunchError::AlreadyInitialized);
    }
    storage::new_dictionary(LEDGERS).unwrap_or_revert();
    storage::new_dictionary(EVENTS).unwrap_or_revert();
    runtime::put_key(SELF_KEY, storage::new_uref(self_key).into());
    write_to_uref(INITIALIZED, true);
}

// ============ Reentrancy ============

pub fn require_unlocked() {
    let locked: bool = read_from_uref(LOCKED);
    if locked {
        runtime::revert(LaunchError::Reentrancy);
    }
}

pub fn lock() {
    write_to_uref(LOCKED, true);
}

pub fn unlock() {
    write_to_uref(LOCKED, false);
}

// ============ Market ============

pub fn is_created() -> bool {
    read_from_uref(CREATED)
}

pub fn mark_created() {
    if is_created() {
        runtime::revert(LaunchError::AlreadyInitialized);
    }
    write_to_uref(CREATED, true);
}

pub fn load_params() -> ProtocolParams {
    ProtocolParams {
        min_virtual_stable: read_from_uref(MIN_VIRTUAL_STABLE),
        listing_fee: read_from_uref(LISTING_FEE),
        tax_bps: read_from_uref(TAX_BPS),
        platform_share_bps: read_from_uref(PLATFORM_SHARE_BPS),
        creator_share_bps: read_from_uref(CREATOR_SHARE_BPS),
        graduation_threshold: read_from_uref(GRADUATION_THRESHOLD),
        platform_cooldown: read_from_uref(PLATFORM_COOLDOWN),
        curve_supply: read_from_uref(CURVE_SUPPLY),
        snipe_window: read_from_uref(SNIPE_WINDOW),
        snipe_max_bps: read_from_uref(SNIPE_MAX_BPS),
        platform_auto_threshold: read_from_uref(PLATFORM_AUTO_THRESHOLD),
    }
}

pub fn read_creator() -> Key {
    read_from_uref(CREATOR)
}

pub fn read_platform() -> Key {
    read_from_uref(PLATFORM)
}

pub fn read_token() -> Key {
    read_from_uref(TOKEN)
}

fn load_config() -> LaunchConfig {
    let status: u8 = read_from_uref(STATUS);
    LaunchConfig {
        creator: read_from_uref(CREATOR),
        platform: read_from_uref(PLATFORM),
        token: read_from_uref(TOKEN),
        stable: read_from_uref(STABLE),
        virtual_stable: read_from_uref(VIRTUAL_STABLE),
        real_stable: read_from_uref(REAL_STABLE),
        token_reserve: read_from_uref(TOKEN_RESERVE),
        curve_supply: read_from_uref(CURVE_SUPPLY),
        platform_fees: read_from_uref(PLATFORM_FEES),
        creator_fees: read_from_uref(CREATOR_FEES),
        profit_reserve: read_from_uref(PROFIT_RESERVE),
        profit_index: read_from_uref(PROFIT_INDEX),
        status: LaunchStatus::from_u8(status).unwrap_or_revert_with(LaunchError::InvalidState),
        last_platform_withdrawal: read_from_uref(LAST_PLATFORM_WITHDRAWAL),
        seed_escrow: read_from_uref(SEED_ESCROW),
        total_raised: read_from_uref(TOTAL_RAISED),
        start_time: read_from_uref(START_TIME),
    }
}

/// Load the market; reverts with `InvalidState` before `create`
pub fn load_market() -> Market {
    if !is_created() {
        runtime::revert(LaunchError::InvalidState);
    }
    let config = load_config();
    let vault = ReserveVault::restore(
        config.market_id(),
        read_from_uref(VAULT_STABLE),
        read_from_uref(VAULT_TOKEN),
    );
    let lp_lock = read_from_uref::<Option<LockRecord>>(LP_LOCK).map(
        |(pool, liquidity, locked_at)| {
            LpLock::restore(&config.market_id(), pool, liquidity, locked_at)
        },
    );
    Market::from_parts(load_params(), config, vault, lp_lock).unwrap_or_revert()
}

pub fn save_market(market: &Market) {
    let config = market.config();
    write_to_uref(STABLE, config.stable);
    write_to_uref(VIRTUAL_STABLE, config.virtual_stable);
    write_to_uref(REAL_STABLE, config.real_stable);
    write_to_uref(TOKEN_RESERVE, config.token_reserve);
    write_to_uref(PLATFORM_FEES, config.platform_fees);
    write_to_uref(CREATOR_FEES, config.creator_fees);
    write_to_uref(PROFIT_RESERVE, config.profit_reserve);
    write_to_uref(PROFIT_INDEX, config.profit_index);
    write_to_uref(STATUS, config.status.as_u8());
    write_to_uref(LAST_PLATFORM_WITHDRAWAL, config.last_platform_withdrawal);
    write_to_uref(SEED_ESCROW, config.seed_escrow);
    write_to_uref(TOTAL_RAISED, config.total_raised);
    write_to_uref(START_TIME, config.start_time);

    write_to_uref(VAULT_STABLE, market.vault().balance(Asset::Stable));
    write_to_uref(VAULT_TOKEN, market.vault().balance(Asset::Token));

    let lock: Option<LockRecord> = market
        .lp_lock()
        .map(|lock| (lock.pool(), lock.liquidity(), lock.locked_at()));
    write_to_uref(LP_LOCK, lock);
}

// ============ Buyer Ledgers ============

/// Dictionary item key of a ledger: hex of the blake2b digest of its
/// derived address, which is too long to use directly
fn ledger_item_key(participant: &Key) -> String {
    let market = read_from_uref::<Key>(TOKEN);
    let address = derive_ledger_address(&market, participant);
    key_to_str(&Key::Hash(runtime::blake2b(address.as_bytes())))
}

pub fn read_ledger(participant: &Key) -> Option<BuyerLedger> {
    let ledgers_uref = get_dictionary_uref(LEDGERS);
    storage::dictionary_get::<(U256, U256)>(ledgers_uref, &ledger_item_key(participant))
        .unwrap_or_default()
        .map(|(held, checkpoint)| BuyerLedger { held, checkpoint })
}

pub fn write_ledger(participant: &Key, ledger: &BuyerLedger) {
    let ledgers_uref = get_dictionary_uref(LEDGERS);
    storage::dictionary_put(
        ledgers_uref,
        &ledger_item_key(participant),
        (ledger.held, ledger.checkpoint),
    );
}

// ============ Events ============

pub fn emit(event: &LaunchEvent, timestamp: u64) {
    let count: u64 = read_from_uref(EVENT_COUNT);
    let events_uref = get_dictionary_uref(EVENTS);
    let index: String = count.to_string();
    storage::dictionary_put(events_uref, &index, event.record(timestamp));
    write_to_uref(EVENT_COUNT, count + 1);
}
