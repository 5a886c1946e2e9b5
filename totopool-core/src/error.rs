//! Error types for totopool-core

use thiserror::Error;

use crate::assets::AssetError;
use crate::types::{Address, ClaimId, ConditionId, OutcomeId, Timestamp};

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Failure classes callers can branch on without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AccessControl,
    NotFound,
    Timing,
    StateConflict,
    Validation,
    InsufficientFunds,
}

/// Error types for engine operations.
///
/// Every variant carries the identifier needed to correct and retry the call.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Caller is not the protocol owner
    #[error("Only owner: {0} is not the protocol owner")]
    OnlyOwner(Address),

    /// Caller is not a registered oracle
    #[error("Only oracle: {0} is not an authorized oracle")]
    OnlyOracle(Address),

    /// Caller is an oracle, but not the one that created the condition
    #[error("Only condition oracle: {caller} does not own condition {condition_id}")]
    NotConditionOracle {
        condition_id: ConditionId,
        caller: Address,
    },

    #[error("Condition {0} does not exist")]
    ConditionNotFound(ConditionId),

    /// Betting window with start after end
    #[error("Incorrect betting period: starts at {starts_at}, settles at {settles_at}")]
    IncorrectBettingPeriod {
        starts_at: Timestamp,
        settles_at: Timestamp,
    },

    /// Settlement time closer to now than the configured lead time
    #[error("Condition expired: settles at {settles_at}, earliest allowed {earliest}")]
    LeadTimeTooShort {
        settles_at: Timestamp,
        earliest: Timestamp,
    },

    #[error("Betting on condition {condition_id} opens at {starts_at}")]
    BettingNotStarted {
        condition_id: ConditionId,
        starts_at: Timestamp,
    },

    #[error("Betting on condition {condition_id} closed at {settles_at}")]
    BettingEnded {
        condition_id: ConditionId,
        settles_at: Timestamp,
    },

    /// Resolution attempted before the settlement time
    #[error("Condition {condition_id} settles at {settles_at}")]
    SettlementNotReached {
        condition_id: ConditionId,
        settles_at: Timestamp,
    },

    /// Redemption attempted while the condition can still be resolved
    #[error("Condition {0} is still on")]
    ConditionStillActive(ConditionId),

    #[error("Condition {0} is already resolved")]
    AlreadyResolved(ConditionId),

    #[error("Condition {0} is already canceled")]
    AlreadyCanceled(ConditionId),

    /// Condition is implicitly canceled or will be canceled (one-sided pool, refunds started)
    #[error("Condition {0} is canceled")]
    ConditionCanceled(ConditionId),

    /// Rescheduling after a claim was settled under the current window
    #[error("Condition {0} has redemptions; its schedule is frozen")]
    ScheduleFrozen(ConditionId),

    #[error("Zero balance of claim {0}")]
    ZeroBalance(ClaimId),

    #[error("Outcome {outcome} is not part of condition {condition_id}")]
    WrongOutcome {
        condition_id: ConditionId,
        outcome: OutcomeId,
    },

    #[error("Duplicate outcome {0}")]
    DuplicateOutcome(OutcomeId),

    #[error("A condition needs at least two outcomes, got {0}")]
    TooFewOutcomes(usize),

    #[error("Amount must not be zero")]
    ZeroAmount,

    /// Stake totals would exceed the amount range
    #[error("Stake overflow on claim {0}")]
    AmountOverflow(ClaimId),

    /// (oracle, oracle-local id) pair already used
    #[error("Condition already created: {existing}")]
    DuplicateCondition { existing: ConditionId },

    #[error("Fee rate {0} exceeds the fee multiplier")]
    FeeRateOutOfRange(u64),

    #[error("Redemption batch is empty")]
    EmptyBatch,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Asset adapter refused the transfer
    #[error("Transfer failed: {0}")]
    Transfer(#[from] AssetError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported snapshot schema version {0}")]
    UnsupportedSchema(u32),

    /// Snapshot whose stake totals and claim supplies disagree
    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        use EngineError::*;
        match self {
            OnlyOwner(_) | OnlyOracle(_) | NotConditionOracle { .. } => ErrorKind::AccessControl,
            ConditionNotFound(_) => ErrorKind::NotFound,
            IncorrectBettingPeriod { .. }
            | LeadTimeTooShort { .. }
            | BettingNotStarted { .. }
            | BettingEnded { .. }
            | SettlementNotReached { .. }
            | ConditionStillActive(_) => ErrorKind::Timing,
            AlreadyResolved(_)
            | AlreadyCanceled(_)
            | ConditionCanceled(_)
            | ScheduleFrozen(_)
            | ZeroBalance(_) => ErrorKind::StateConflict,
            Transfer(_) => ErrorKind::InsufficientFunds,
            WrongOutcome { .. }
            | DuplicateOutcome(_)
            | TooFewOutcomes(_)
            | ZeroAmount
            | AmountOverflow(_)
            | DuplicateCondition { .. }
            | FeeRateOutOfRange(_)
            | EmptyBatch
            | InvalidAddress(_)
            | InvalidIdentifier(_)
            | InvalidConfig(_)
            | Json(_)
            | UnsupportedSchema(_)
            | CorruptSnapshot(_)
            | Io(_) => ErrorKind::Validation,
        }
    }
}

/// Lazily builds the overflow error for `Option::ok_or_else`.
pub(crate) fn overflow(claim: ClaimId) -> impl FnOnce() -> EngineError {
    move || EngineError::AmountOverflow(claim)
}
