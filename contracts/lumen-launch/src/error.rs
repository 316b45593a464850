use casper_types::ApiError;

/// Every way a launch operation can fail. Any error aborts the whole
/// operation; the host reverts all writes made before it.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchError {
    InvalidParameter = 1,
    InvalidState = 2,
    Unauthorized = 3,
    InsufficientFunds = 4,
    SlippageExceeded = 5,
    DeadlineExpired = 6,
    ArithmeticOverflow = 7,
    CooldownNotElapsed = 8,
    ThresholdNotMet = 9,
    AlreadyFinalized = 10,
    AlreadyMigrated = 11,
    NothingToClaim = 12,
    Reentrancy = 13,
    SnipeLimitExceeded = 14,
    AlreadyInitialized = 15,
    AboveAutoThreshold = 16,
}

impl From<LaunchError> for ApiError {
    fn from(error: LaunchError) -> Self {
        ApiError::User(error as u16)
    }
}
