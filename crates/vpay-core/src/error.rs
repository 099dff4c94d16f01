//! # Error Types — Structured Error Hierarchy
//!
//! Defines the error types shared by every crate in the engine. All errors
//! use `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! ## Taxonomy
//!
//! - [`ValidationError`] rejects malformed primitives at construction time
//!   (month keys, currency codes, identifiers, amounts, percentages, rates).
//!   Never retried: the same input always fails the same way.
//! - [`EngineError`] is what engine operations return. Only
//!   [`EngineError::ConcurrentModification`] is retried, and only by the
//!   balance coordinator, with a fresh read before each attempt.
//!
//! Consistency faults detected after a ledger write are not errors; they are
//! returned as warnings in the operation's validation payload.

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised while constructing or validating domain primitives.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Month key is not of the form `YYYY-MM` with a month in 1..=12.
    #[error("invalid month key: \"{0}\" (expected YYYY-MM)")]
    InvalidMonthKey(String),

    /// Currency code is not three ASCII letters.
    #[error("invalid currency code: \"{0}\" (expected 3 ASCII letters)")]
    InvalidCurrencyCode(String),

    /// An identifier was empty or whitespace only.
    #[error("invalid {kind}: must be non-empty")]
    EmptyIdentifier {
        /// Which identifier type was being constructed.
        kind: &'static str,
    },

    /// An amount was negative where only non-negative values are permitted.
    #[error("{field} must be non-negative, got {value}")]
    NegativeAmount {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: Decimal,
    },

    /// Partial-payment percentage outside (0, 100].
    #[error("invalid percentage {0}: must be greater than 0 and at most 100")]
    InvalidPercentage(Decimal),

    /// A tax rate fell outside [0, 1] after normalization.
    #[error("invalid {kind} rate {value}: must lie in [0, 1] after normalization")]
    InvalidRate {
        /// Which rate was rejected.
        kind: &'static str,
        /// The rejected value (after normalization).
        value: Decimal,
    },

    /// FX rate must be strictly positive when conversion is required.
    #[error("invalid FX rate {0}: must be greater than 0")]
    InvalidFxRate(Decimal),

    /// An intermediate amount exceeded the decimal range.
    #[error("amount out of range while computing {step}")]
    AmountOverflow {
        /// Calculation step that overflowed.
        step: &'static str,
    },

    /// A rollover destination month does not follow its source month.
    #[error("rollover from {from} to {to}: destination must be a later month")]
    RolloverOrder {
        /// Source month.
        from: String,
        /// Destination month.
        to: String,
    },

    /// Budget allocation array did not contain exactly twelve months.
    #[error("expected 12 monthly allocations, got {0}")]
    AllocationLength(usize),

    /// Configuration value out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Errors returned by calculation and ledger operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Caller supplied invalid input. Surfaced immediately, never retried.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    /// A payment id was finalized again with a different amount or month
    /// while its first application is still in effect.
    #[error("payment {payment_id} already applied as {recorded_amount} in {recorded_month}; refusing {amount} in {month}")]
    PaymentMismatch {
        /// The re-delivered payment.
        payment_id: String,
        /// Amount of the recorded application.
        recorded_amount: Decimal,
        /// Month of the recorded application.
        recorded_month: String,
        /// Amount of the refused application.
        amount: Decimal,
        /// Month of the refused application.
        month: String,
    },

    /// Reversal requested for a payment with no history record.
    #[error("payment {payment_id} not found in balance history of budget line {budget_line_id}")]
    PaymentNotFound {
        /// Budget line that was searched.
        budget_line_id: String,
        /// Payment that was not found.
        payment_id: String,
    },

    /// The budget line does not exist in the store.
    #[error("budget line {0} not found")]
    BudgetLineNotFound(String),

    /// The budget line has been soft-deactivated and accepts no mutations.
    #[error("budget line {0} is inactive")]
    BudgetLineInactive(String),

    /// The month is not tracked by the budget line.
    #[error("month {month} is not tracked by budget line {budget_line_id}")]
    UnknownMonth {
        /// Budget line that was searched.
        budget_line_id: String,
        /// The missing month key.
        month: String,
    },

    /// The destination month already received a rollover from a different month.
    #[error("month {to} already received a rollover from {existing}; refusing rollover from {from}")]
    RolloverConflict {
        /// Source month of the refused rollover.
        from: String,
        /// Destination month.
        to: String,
        /// Source month of the rollover already applied.
        existing: String,
    },

    /// The source month was already carried into a different month.
    #[error("month {from} was already rolled over into {existing}; refusing rollover into {to}")]
    SourceAlreadyRolled {
        /// Source month of the refused rollover.
        from: String,
        /// Destination of the refused rollover.
        to: String,
        /// Destination of the rollover already applied.
        existing: String,
    },

    /// Optimistic write conflict. Retried by the coordinator with a fresh read.
    #[error("concurrent modification of budget line {budget_line_id} (expected version {expected}, found {found})")]
    ConcurrentModification {
        /// Budget line that was being written.
        budget_line_id: String,
        /// Version the writer read.
        expected: u64,
        /// Version found in the store at write time.
        found: u64,
    },

    /// Bounded retries exhausted; the budget line was left unmodified.
    #[error("gave up writing budget line {budget_line_id} after {attempts} conflicting attempts")]
    RetriesExhausted {
        /// Budget line that could not be written.
        budget_line_id: String,
        /// Number of attempts made.
        attempts: u32,
    },

    /// The persistence layer failed.
    #[error("store error: {0}")]
    Store(String),
}

impl EngineError {
    /// Whether the coordinator should retry the operation with a fresh read.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification { .. })
    }
}

/// Convenience alias for results carrying an [`EngineError`].
pub type EngineResult<T> = Result<T, EngineError>;
