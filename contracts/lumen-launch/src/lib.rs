//! Accounting engine of a bonding-curve token launch: pricing, custody,
//! pro-rata fee distribution, graduation and withdrawals for one market.
//!
//! Everything here is pure and host-independent; `main.rs` wires it to
//! Casper storage and CEP-18 transfers.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod authority;
pub mod curve;
pub mod error;
pub mod events;
pub mod governor;
pub mod ledger;
pub mod market;
pub mod migration;
pub mod params;
pub mod state;
pub mod trade;
pub mod vault;

#[cfg(test)]
mod scenarios;
