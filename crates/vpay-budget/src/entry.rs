//! # Monthly Balance Entries
//!
//! One [`MonthlyBalanceEntry`] per (budget line, calendar month). The
//! `balance` field is stored for consumers that read it directly, but it is
//! only ever written by [`MonthlyBalanceEntry::reconcile`], which derives it
//! from `allocated - spent`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use vpay_core::MonthKey;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Spend classification of a month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthStatus {
    /// Spending is within the expected band.
    #[default]
    Active,
    /// Spend exceeds the allocation.
    Overspent,
    /// Most of the allocation is still unspent.
    Underspent,
    /// The allocation is exactly used up (or carried forward).
    Completed,
}

impl MonthStatus {
    /// Return the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Overspent => "overspent",
            Self::Underspent => "underspent",
            Self::Completed => "completed",
        }
    }

    /// Return all status variants.
    pub fn all() -> &'static [MonthStatus] {
        &[
            Self::Active,
            Self::Overspent,
            Self::Underspent,
            Self::Completed,
        ]
    }

    /// Classify a balance against its allocation.
    ///
    /// Evaluated in priority order: overspent, completed, underspent,
    /// active. A balance of exactly zero is therefore `Completed` even
    /// though zero is below any underspend threshold.
    pub fn classify(allocated: Decimal, balance: Decimal, underspend_threshold: Decimal) -> Self {
        if balance < Decimal::ZERO {
            Self::Overspent
        } else if balance.is_zero() {
            Self::Completed
        } else if balance > allocated * underspend_threshold {
            Self::Underspent
        } else {
            Self::Active
        }
    }
}

impl std::fmt::Display for MonthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// Allocation, spend, and rollover markers for one month of a budget line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyBalanceEntry {
    /// The calendar month.
    pub month: MonthKey,
    /// Amount allocated to the month, including positive carries received.
    pub allocated: Decimal,
    /// Cumulative spend, including negative carries received.
    pub spent: Decimal,
    /// Always `allocated - spent`.
    pub balance: Decimal,
    /// Current classification.
    pub status: MonthStatus,
    /// Month whose closing balance was carried into this one.
    #[serde(default)]
    pub rollover_from: Option<MonthKey>,
    /// Month this one's closing balance was carried into.
    #[serde(default)]
    pub rollover_to: Option<MonthKey>,
    /// Signed amount received from `rollover_from`.
    #[serde(default)]
    pub rollover_amount: Decimal,
    /// Signed amount sent to `rollover_to`.
    #[serde(default)]
    pub carried_forward: Decimal,
    /// Reference of the last transaction applied (payment id or rollover tag).
    #[serde(default)]
    pub last_transaction_ref: Option<String>,
    /// When the last transaction was applied, including no-op applications.
    #[serde(default)]
    pub last_transaction_at: Option<DateTime<Utc>>,
}

impl MonthlyBalanceEntry {
    /// A fresh entry: `spent = 0`, `balance = allocated`, status `Active`.
    /// A negative allocation is taken by magnitude.
    pub fn new(month: MonthKey, allocated: Decimal) -> Self {
        let allocated = allocated.abs();
        Self {
            month,
            allocated,
            spent: Decimal::ZERO,
            balance: allocated,
            status: MonthStatus::Active,
            rollover_from: None,
            rollover_to: None,
            rollover_amount: Decimal::ZERO,
            carried_forward: Decimal::ZERO,
            last_transaction_ref: None,
            last_transaction_at: None,
        }
    }

    /// Recompute `balance` from `allocated - spent`.
    pub fn reconcile(&mut self) {
        self.balance = self.allocated - self.spent;
    }

    /// Whether the stored balance matches `allocated - spent`.
    pub fn is_reconciled(&self) -> bool {
        self.balance == self.allocated - self.spent
    }

    /// Spend as a percentage of allocation; zero when nothing is allocated.
    pub fn utilization_rate(&self) -> Decimal {
        if self.allocated.is_zero() {
            Decimal::ZERO
        } else {
            self.spent / self.allocated * Decimal::ONE_HUNDRED
        }
    }

    /// Record a transaction reference and timestamp without touching amounts.
    pub fn touch(&mut self, reference: &str, at: DateTime<Utc>) {
        self.last_transaction_ref = Some(reference.to_string());
        self.last_transaction_at = Some(at);
    }
}
