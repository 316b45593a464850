use casper_types::U256;

use crate::error::LaunchError;

/// Basis-point denominator used for every rate below.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Maximum trading tax: 10% (1000 basis points)
pub const MAX_TAX_BPS: u64 = 1_000;

// Defaults for a 6-decimal USDC market
pub const DEFAULT_MIN_VIRTUAL_STABLE: u64 = 10_000_000; // 10 USDC
pub const DEFAULT_LISTING_FEE: u64 = 5_000_000; // 5 USDC
pub const DEFAULT_TAX_BPS: u64 = 100; // 1%
pub const DEFAULT_PLATFORM_SHARE_BPS: u64 = 2_000; // 20% of tax
pub const DEFAULT_CREATOR_SHARE_BPS: u64 = 3_000; // 30% of tax
pub const DEFAULT_GRADUATION_THRESHOLD: u64 = 5_000_000_000; // 5,000 USDC
pub const DEFAULT_PLATFORM_COOLDOWN_MS: u64 = 24 * 60 * 60 * 1000;
pub const DEFAULT_CURVE_TOKENS: u64 = 500_000_000; // whole tokens
pub const DEFAULT_TOKEN_DECIMALS: u8 = 6;
pub const DEFAULT_SNIPE_MAX_BPS: u64 = 10; // 0.1% of the curve allocation
pub const DEFAULT_PLATFORM_AUTO_THRESHOLD: u64 = 1_000_000_000; // 1,000 USDC

/// Protocol constants for one market. Fixed at install time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolParams {
    /// Smallest accepted virtual seed
    pub min_virtual_stable: U256,
    /// Paid by the creator straight to the platform on create
    pub listing_fee: U256,
    /// Tax on every buy input and sell output
    pub tax_bps: u64,
    /// Platform part of the tax
    pub platform_share_bps: u64,
    /// Creator part of the tax; holders receive the rest
    pub creator_share_bps: u64,
    /// Real stable reserve required before migration
    pub graduation_threshold: U256,
    /// Minimum time between platform withdrawals (ms)
    pub platform_cooldown: u64,
    /// Project tokens deposited into the curve on create
    pub curve_supply: U256,
    /// Length of the anti-snipe window after create (ms), 0 disables it
    pub snipe_window: u64,
    /// Largest single buy during the window, in bps of `curve_supply`
    pub snipe_max_bps: u64,
    /// Platform fees at or above this are paid out by the next sell instead
    /// of a manual withdrawal; 0 disables it
    pub platform_auto_threshold: U256,
}

impl Default for ProtocolParams {
    fn default() -> Self {
        ProtocolParams {
            min_virtual_stable: U256::from(DEFAULT_MIN_VIRTUAL_STABLE),
            listing_fee: U256::from(DEFAULT_LISTING_FEE),
            tax_bps: DEFAULT_TAX_BPS,
            platform_share_bps: DEFAULT_PLATFORM_SHARE_BPS,
            creator_share_bps: DEFAULT_CREATOR_SHARE_BPS,
            graduation_threshold: U256::from(DEFAULT_GRADUATION_THRESHOLD),
            platform_cooldown: DEFAULT_PLATFORM_COOLDOWN_MS,
            curve_supply: U256::from(DEFAULT_CURVE_TOKENS)
                * U256::exp10(DEFAULT_TOKEN_DECIMALS as usize),
            snipe_window: 0,
            snipe_max_bps: DEFAULT_SNIPE_MAX_BPS,
            platform_auto_threshold: U256::from(DEFAULT_PLATFORM_AUTO_THRESHOLD),
        }
    }
}

impl ProtocolParams {
    pub fn validate(&self) -> Result<(), LaunchError> {
        if self.tax_bps > MAX_TAX_BPS {
            return Err(LaunchError::InvalidParameter);
        }
        let shares = self
            .platform_share_bps
            .checked_add(self.creator_share_bps)
            .ok_or(LaunchError::InvalidParameter)?;
        if shares > BPS_DENOMINATOR || self.snipe_max_bps > BPS_DENOMINATOR {
            return Err(LaunchError::InvalidParameter);
        }
        if self.curve_supply.is_zero() || self.graduation_threshold.is_zero() {
            return Err(LaunchError::InvalidParameter);
        }
        Ok(())
    }

    /// Whether `platform_fees` must go out through the automatic payout
    pub fn above_auto_threshold(&self, platform_fees: U256) -> bool {
        !self.platform_auto_threshold.is_zero() && platform_fees >= self.platform_auto_threshold
    }

    /// Largest buy allowed while the anti-snipe window is open.
    pub fn snipe_cap(&self) -> Result<U256, LaunchError> {
        self.curve_supply
            .checked_mul(U256::from(self.snipe_max_bps))
            .map(|scaled| scaled / U256::from(BPS_DENOMINATOR))
            .ok_or(LaunchError::ArithmeticOverflow)
    }
}
