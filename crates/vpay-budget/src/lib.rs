#![deny(missing_docs)]

//! # vpay-budget — Monthly Budget Balance Ledger
//!
//! Tracks allocation and spend per budget line per calendar month, and
//! applies finalized payments to stored lines.
//!
//! ## Layers
//!
//! - **Pure values and transforms**: [`MonthlyBalanceEntry`] and
//!   [`BudgetLine`]; [`MonthlyBalanceLedger`] (initialize, apply, classify),
//!   [`RolloverProcessor`], [`BudgetPerformanceAggregator`], and the balance
//!   field fallback chain in [`balance`].
//! - **Persistence boundary**: [`LedgerStore`], with [`InMemoryLedgerStore`]
//!   for tests and embedding.
//! - **Coordination**: [`BalanceUpdateCoordinator`] composes the above into
//!   payment application, reversal, and month rollover, each committed with
//!   its history record in one conditional write and retried on conflict.
//!
//! ## Invariant
//!
//! Every persisted monthly entry satisfies `balance == allocated - spent`,
//! and every write through the coordinator sets all of a line's
//! balance-representing fields to the same value.

pub mod balance;
pub mod coordinator;
pub mod entry;
pub mod history;
pub mod ledger;
pub mod line;
pub mod performance;
pub mod rollover;
pub mod store;

pub use balance::{
    resolve_current_balance, validate_line, BalanceConsistencyWarning, BalanceField,
    BalanceValidation, ResolvedBalance, BALANCE_FALLBACK_CHAIN,
};
pub use coordinator::{BalanceUpdateCoordinator, LineRollover, PaymentApplication, ReversalOutcome};
pub use entry::{MonthStatus, MonthlyBalanceEntry};
pub use history::{BalanceHistoryRecord, HistoryKind};
pub use ledger::MonthlyBalanceLedger;
pub use line::{BudgetLine, MONTHS_PER_PERIOD};
pub use performance::{BudgetPerformanceAggregator, PerformanceSummary, RiskLevel, StatusCounts};
pub use rollover::{RolloverOutcome, RolloverProcessor, RolloverType};
pub use store::{InMemoryLedgerStore, LedgerStore, StoreError, Versioned, WriteOutcome};
