//! # Monthly Balance Ledger
//!
//! Pure operations on [`MonthlyBalanceEntry`] values. Each returns an updated
//! copy and leaves its input untouched; persistence is the coordinator's job.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use vpay_core::EngineConfig;

use crate::entry::{MonthStatus, MonthlyBalanceEntry};
use crate::line::BudgetLine;

/// Applies spend to monthly entries and classifies them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthlyBalanceLedger {
    underspend_threshold: Decimal,
}

impl Default for MonthlyBalanceLedger {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl MonthlyBalanceLedger {
    /// Create a ledger with the given underspend threshold (fraction of allocation).
    pub fn new(underspend_threshold: Decimal) -> Self {
        Self {
            underspend_threshold,
        }
    }

    /// Create a ledger from engine configuration.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.underspend_threshold)
    }

    /// The underspend threshold in effect.
    pub fn underspend_threshold(&self) -> Decimal {
        self.underspend_threshold
    }

    /// Populate one entry per month of the budget period.
    ///
    /// Each new entry gets `allocated = |allocation|`, `spent = 0`, and
    /// status `Active`. Months that already have an entry are left as they
    /// are, so re-running initialization never discards recorded spend.
    pub fn initialize(&self, mut line: BudgetLine) -> BudgetLine {
        let months: Vec<_> = line.period_months().collect();
        for (month, allocation) in months.into_iter().zip(line.monthly_allocations) {
            line.monthly_balances
                .entry(month)
                .or_insert_with(|| MonthlyBalanceEntry::new(month, allocation));
        }
        line.allocated_total = line.monthly_allocations.iter().map(|a| a.abs()).sum();
        line
    }

    /// Classify an entry by its current balance.
    pub fn classify(&self, entry: &MonthlyBalanceEntry) -> MonthStatus {
        MonthStatus::classify(entry.allocated, entry.balance, self.underspend_threshold)
    }

    /// Add `amount` to the entry's spend and reclassify it.
    ///
    /// A non-positive amount changes no figures but still records the
    /// reference and timestamp.
    pub fn apply_transaction(
        &self,
        entry: &MonthlyBalanceEntry,
        amount: Decimal,
        reference: &str,
        at: DateTime<Utc>,
    ) -> MonthlyBalanceEntry {
        let mut next = entry.clone();
        next.touch(reference, at);
        if amount <= Decimal::ZERO {
            tracing::debug!(month = %entry.month, %amount, reference, "non-positive amount; entry touched only");
            return next;
        }
        next.spent += amount;
        next.reconcile();
        next.status = self.classify(&next);
        next
    }

    /// Remove `amount` from the entry's spend (reversal) and reclassify it.
    ///
    /// Spend never drops below zero.
    pub fn rollback_transaction(
        &self,
        entry: &MonthlyBalanceEntry,
        amount: Decimal,
        reference: &str,
        at: DateTime<Utc>,
    ) -> MonthlyBalanceEntry {
        let mut next = entry.clone();
        next.touch(reference, at);
        if amount <= Decimal::ZERO {
            return next;
        }
        if amount > next.spent {
            tracing::warn!(
                month = %entry.month,
                spent = %next.spent,
                %amount,
                reference,
                "rollback exceeds recorded spend; clamping spend at zero"
            );
            next.spent = Decimal::ZERO;
        } else {
            next.spent -= amount;
        }
        next.reconcile();
        next.status = self.classify(&next);
        next
    }
}
