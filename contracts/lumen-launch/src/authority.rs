//! Capability-style addressing for a single market.
//!
//! Nothing in a market is reachable through a private key. Each record and
//! vault is addressed by a seed built from a fixed label and the market's
//! token key, and access is checked by recomputing that seed.

use alloc::string::String;
use casper_types::{bytesrepr::ToBytes, Key};

use crate::error::LaunchError;

const LAUNCH_LABEL: &str = "launch";
const STABLE_VAULT_LABEL: &str = "stable-vault";
const TOKEN_VAULT_LABEL: &str = "token-vault";
const LP_LOCK_LABEL: &str = "lp-lock";
const BUYER_LEDGER_LABEL: &str = "buyer-ledger";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityScope {
    LaunchConfig,
    StableVault,
    TokenVault,
    LpLock,
}

impl AuthorityScope {
    pub fn label(&self) -> &'static str {
        match self {
            AuthorityScope::LaunchConfig => LAUNCH_LABEL,
            AuthorityScope::StableVault => STABLE_VAULT_LABEL,
            AuthorityScope::TokenVault => TOKEN_VAULT_LABEL,
            AuthorityScope::LpLock => LP_LOCK_LABEL,
        }
    }
}

/// Access token bound to one scope of one market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityHandle {
    scope: AuthorityScope,
    market: Key,
    seed: String,
}

impl AuthorityHandle {
    pub fn scope(&self) -> AuthorityScope {
        self.scope
    }

    pub fn market(&self) -> Key {
        self.market
    }

    /// Deterministic seed string, unique per (scope, market)
    pub fn seed(&self) -> &str {
        &self.seed
    }

    /// Recompute the handle for `scope` on `market` and compare.
    pub fn verify(&self, scope: AuthorityScope, market: &Key) -> Result<(), LaunchError> {
        if *self == derive_authority(scope, market) {
            Ok(())
        } else {
            Err(LaunchError::Unauthorized)
        }
    }
}

pub fn derive_authority(scope: AuthorityScope, market: &Key) -> AuthorityHandle {
    let mut seed = String::from(scope.label());
    seed.push(':');
    seed.push_str(&key_to_str(market));
    AuthorityHandle {
        scope,
        market: *market,
        seed,
    }
}

/// Address of the ledger a participant holds in a market
pub fn derive_ledger_address(market: &Key, participant: &Key) -> String {
    let mut address = String::from(BUYER_LEDGER_LABEL);
    address.push(':');
    address.push_str(&key_to_str(market));
    address.push(':');
    address.push_str(&key_to_str(participant));
    address
}

/// Convert a Key to a string for dictionary lookups
/// Hex of the raw hash for accounts and contracts, hex of the full
/// serialization for anything else
pub fn key_to_str(key: &Key) -> String {
    match key {
        Key::Account(account_hash) => hex_encode(account_hash.as_bytes()),
        Key::Hash(hash) => hex_encode(hash),
        _ => hex_encode(&key.to_bytes().unwrap_or_default()),
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut result = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        result.push(hex_char(byte >> 4));
        result.push(hex_char(byte & 0x0f));
    }
    result
}

fn hex_char(nibble: u8) -> char {
    match nibble {
        0..=9 => (b'0' + nibble) as char,
        10..=15 => (b'a' + nibble - 10) as char,
        _ => '0',
    }
}
