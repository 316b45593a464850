//! Calls into CEP-18 tokens and the DEX factory and pair.

use casper_contract::contract_api::runtime;
use casper_types::{contracts::ContractHash, runtime_args, Key, RuntimeArgs, U256};

use lumen_launch::error::LaunchError;
use lumen_launch::migration::PoolVenue;

fn get_contract_hash(key: Key) -> ContractHash {
    match key {
        Key::Hash(hash) => ContractHash::new(hash),
        _ => runtime::revert(LaunchError::InvalidParameter),
    }
}

// ============ CEP-18 ============

pub fn call_token_transfer(token: Key, recipient: Key, amount: U256) {
    if amount.is_zero() {
        return;
    }
    let contract_hash = get_contract_hash(token);
    runtime::call_contract::<()>(
        contract_hash,
        "transfer",
        runtime_args! {
            "recipient" => recipient,
            "amount" => amount
        },
    );
}

pub fn call_token_transfer_from(token: Key, owner: Key, recipient: Key, amount: U256) {
    if amount.is_zero() {
        return;
    }
    let contract_hash = get_contract_hash(token);
    runtime::call_contract::<()>(
        contract_hash,
        "transfer_from",
        runtime_args! {
            "owner" => owner,
            "recipient" => recipient,
            "amount" => amount
        },
    );
}

pub fn call_token_balance_of(token: Key, owner: Key) -> U256 {
    let contract_hash = get_contract_hash(token);
    runtime::call_contract(
        contract_hash,
        "balance_of",
        runtime_args! {
            "owner" => owner
        },
    )
}

// ============ DEX ============

fn call_factory_create_pair(factory: Key, token_a: Key, token_b: Key, pair: Key) -> Key {
    let contract_hash = get_contract_hash(factory);
    runtime::call_contract(
        contract_hash,
        "create_pair",
        runtime_args! {
            "token_a" => token_a,
            "token_b" => token_b,
            "pair" => pair
        },
    )
}

fn call_pair_mint(pair: Key, to: Key) -> U256 {
    let contract_hash = get_contract_hash(pair);
    runtime::call_contract(
        contract_hash,
        "mint",
        runtime_args! {
            "to" => to
        },
    )
}

/// Registers the pre-deployed pair with the factory, funds it and mints
/// LP tokens to this contract, which never transfers them.
pub struct DexVenue {
    pub factory: Key,
    pub pair: Key,
    pub stable: Key,
    pub token: Key,
    pub self_key: Key,
}

impl PoolVenue for DexVenue {
    fn seed_pool(
        &mut self,
        stable_amount: U256,
        token_amount: U256,
    ) -> Result<(Key, U256), LaunchError> {
        let pool = call_factory_create_pair(self.factory, self.stable, self.token, self.pair);
        if pool != self.pair {
            return Err(LaunchError::InvalidState);
        }
        call_token_transfer(self.stable, pool, stable_amount);
        call_token_transfer(self.token, pool, token_amount);
        let liquidity = call_pair_mint(pool, self.self_key);
        Ok((pool, liquidity))
    }
}
