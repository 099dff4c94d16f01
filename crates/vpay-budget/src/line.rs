//! # Budget Lines
//!
//! A [`BudgetLine`] is one allocation bucket of a twelve-month budget
//! period. It owns its monthly entries exclusively and is never deleted
//! mid-period; [`BudgetLine::deactivate`] is the only way to retire it.
//!
//! Records written by older versions of the surrounding system carry the
//! line's running balance under several field names (`balance_usd`,
//! `current_balance`, `balance_carried_down`). They are kept as optional
//! fields and reconciled by [`crate::balance`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use vpay_core::{BudgetLineId, MonthKey, ValidationError};

use crate::entry::MonthlyBalanceEntry;
use crate::performance::{BudgetPerformanceAggregator, PerformanceSummary};

/// Number of monthly allocations in a budget period.
pub const MONTHS_PER_PERIOD: usize = 12;

/// One budget line with its monthly ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetLine {
    /// Store identifier.
    pub id: BudgetLineId,
    /// Human-readable name.
    pub name: String,
    /// First month of the budget period.
    pub period_start: MonthKey,
    /// Configured allocation per month, starting at `period_start`.
    pub monthly_allocations: [Decimal; MONTHS_PER_PERIOD],
    /// Ledger entries keyed by month.
    #[serde(default)]
    pub monthly_balances: BTreeMap<MonthKey, MonthlyBalanceEntry>,
    /// Sum of the monthly allocation magnitudes.
    pub allocated_total: Decimal,
    /// Cumulative spend across all months.
    #[serde(default)]
    pub total_spent: Decimal,
    /// Legacy running balance in the reporting currency.
    #[serde(default)]
    pub balance_usd: Option<Decimal>,
    /// Legacy generic running balance.
    #[serde(default)]
    pub current_balance: Option<Decimal>,
    /// Legacy balance-carried-down field.
    #[serde(default)]
    pub balance_carried_down: Option<Decimal>,
    /// Inactive lines accept no ledger mutations.
    pub active: bool,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl BudgetLine {
    /// Create a budget line with no monthly entries yet. Run it through
    /// [`crate::MonthlyBalanceLedger::initialize`] to populate them.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::AllocationLength`] unless exactly twelve
    /// allocations are supplied.
    pub fn new(
        id: BudgetLineId,
        name: impl Into<String>,
        period_start: MonthKey,
        allocations: Vec<Decimal>,
    ) -> Result<Self, ValidationError> {
        let len = allocations.len();
        let monthly_allocations: [Decimal; MONTHS_PER_PERIOD] = allocations
            .try_into()
            .map_err(|_| ValidationError::AllocationLength(len))?;
        let allocated_total = monthly_allocations.iter().map(|a| a.abs()).sum();
        Ok(Self {
            id,
            name: name.into(),
            period_start,
            monthly_allocations,
            monthly_balances: BTreeMap::new(),
            allocated_total,
            total_spent: Decimal::ZERO,
            balance_usd: None,
            current_balance: None,
            balance_carried_down: None,
            active: true,
            updated_at: Utc::now(),
        })
    }

    /// The months of the budget period, in order.
    pub fn period_months(&self) -> impl Iterator<Item = MonthKey> + '_ {
        (0..MONTHS_PER_PERIOD as u32).map(|i| self.period_start.plus_months(i))
    }

    /// The entry for `month`, if tracked.
    pub fn entry(&self, month: MonthKey) -> Option<&MonthlyBalanceEntry> {
        self.monthly_balances.get(&month)
    }

    /// All tracked entries in chronological order.
    pub fn entries(&self) -> impl Iterator<Item = &MonthlyBalanceEntry> {
        self.monthly_balances.values()
    }

    /// `allocated_total - total_spent`.
    pub fn derived_balance(&self) -> Decimal {
        self.allocated_total - self.total_spent
    }

    /// Write `balance` to every balance-representing field.
    pub fn set_balance_fields(&mut self, balance: Decimal) {
        self.balance_usd = Some(balance);
        self.current_balance = Some(balance);
        self.balance_carried_down = Some(balance);
    }

    /// Whether the line accepts mutations.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Soft-deactivate the line. Entries and history are retained.
    pub fn deactivate(&mut self) {
        if self.active {
            tracing::info!(budget_line = %self.id, "budget line deactivated");
        }
        self.active = false;
        self.updated_at = Utc::now();
    }

    /// Performance summary over every tracked month.
    pub fn summary(&self) -> PerformanceSummary {
        BudgetPerformanceAggregator.summarize(self.entries())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line() -> BudgetLine {
        BudgetLine::new(
            BudgetLineId::new("BL-OPS").unwrap(),
            "Operations",
            MonthKey::parse("2025-01").unwrap(),
            vec![dec!(100); 12],
        )
        .unwrap()
    }

    #[test]
    fn new_requires_twelve_allocations() {
        let err = BudgetLine::new(
            BudgetLineId::new("BL-1").unwrap(),
            "x",
            MonthKey::parse("2025-01").unwrap(),
            vec![dec!(1); 11],
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::AllocationLength(11));
    }

    #[test]
    fn allocated_total_uses_magnitudes() {
        let mut allocations = vec![dec!(100); 12];
        allocations[3] = dec!(-50);
        let line = BudgetLine::new(
            BudgetLineId::new("BL-2").unwrap(),
            "x",
            MonthKey::parse("2025-01").unwrap(),
            allocations,
        )
        .unwrap();
        assert_eq!(line.allocated_total, dec!(1150));
        assert_eq!(line.derived_balance(), dec!(1150));
    }

    #[test]
    fn period_months_span_year_boundary() {
        let mut l = line();
        l.period_start = MonthKey::parse("2024-07").unwrap();
        let months: Vec<String> = l.period_months().map(|m| m.to_string()).collect();
        assert_eq!(months.first().unwrap(), "2024-07");
        assert_eq!(months.last().unwrap(), "2025-06");
        assert_eq!(months.len(), 12);
    }

    #[test]
    fn deactivate_is_soft() {
        let mut l = line();
        l.deactivate();
        assert!(!l.is_active());
        assert_eq!(l.allocated_total, dec!(1200));
    }

    #[test]
    fn set_balance_fields_synchronizes_all() {
        let mut l = line();
        l.set_balance_fields(dec!(42));
        assert_eq!(l.balance_usd, Some(dec!(42)));
        assert_eq!(l.current_balance, Some(dec!(42)));
        assert_eq!(l.balance_carried_down, Some(dec!(42)));
    }

    #[test]
    fn summary_of_uninitialized_line_is_empty() {
        assert_eq!(line().summary().months, 0);
    }
}
