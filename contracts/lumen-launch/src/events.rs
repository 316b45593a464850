use alloc::string::{String, ToString};
use casper_types::{Key, U256};

/// Stored form of an event: (name, actor, (amount_a, amount_b, timestamp)).
/// Nested to stay within the 3-tuple CLTyped implementations.
pub type EventRecord = (String, Key, (U256, U256, u64));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// seed escrowed, curve tokens deposited
    Created,
    /// stable in, tokens out
    Bought,
    /// tokens in, stable paid
    Sold,
    ProfitClaimed,
    /// real stable at the time of finalization
    Finalized,
    /// stable moved, tokens moved
    Migrated,
    CreatorWithdrawn,
    /// stable refunded, tokens refunded
    VirtualReclaimed,
    PlatformWithdrawn,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::Bought => "bought",
            EventKind::Sold => "sold",
            EventKind::ProfitClaimed => "profit_claimed",
            EventKind::Finalized => "finalized",
            EventKind::Migrated => "migrated",
            EventKind::CreatorWithdrawn => "creator_withdrawn",
            EventKind::VirtualReclaimed => "virtual_reclaimed",
            EventKind::PlatformWithdrawn => "platform_withdrawn",
        }
    }
}

/// One entry of a market's on-chain event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchEvent {
    pub kind: EventKind,
    pub actor: Key,
    pub amount_a: U256,
    pub amount_b: U256,
}

impl LaunchEvent {
    pub fn new(kind: EventKind, actor: Key, amount_a: U256, amount_b: U256) -> Self {
        LaunchEvent {
            kind,
            actor,
            amount_a,
            amount_b,
        }
    }

    pub fn record(&self, timestamp: u64) -> EventRecord {
        (
            self.kind.name().to_string(),
            self.actor,
            (self.amount_a, self.amount_b, timestamp),
        )
    }
}
