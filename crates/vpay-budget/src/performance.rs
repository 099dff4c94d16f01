//! # Budget Performance
//!
//! Reduces a budget line's monthly entries to totals, per-status counts,
//! average utilization, and a risk level derived from how often the line
//! overspent:
//!
//! | Overspent months / tracked months | Risk |
//! |---|---|
//! | > 0.5 | `HIGH` |
//! | > 0.25 | `MEDIUM` |
//! | > 0 | `LOW` |
//! | 0 | `NONE` |
//!
//! Boundaries are exclusive: exactly 3 of 12 months overspent is `LOW`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entry::{MonthStatus, MonthlyBalanceEntry};

/// Coarse classification of overspend frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    /// No overspent months.
    #[default]
    None,
    /// Some overspend, at most a quarter of months.
    Low,
    /// More than a quarter, at most half of months.
    Medium,
    /// More than half of months overspent.
    High,
}

impl RiskLevel {
    /// Return the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }

    /// Classify an overspent-months ratio.
    pub fn from_overspent_ratio(ratio: Decimal) -> Self {
        if ratio > Decimal::new(5, 1) {
            Self::High
        } else if ratio > Decimal::new(25, 2) {
            Self::Medium
        } else if ratio > Decimal::ZERO {
            Self::Low
        } else {
            Self::None
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of months in each status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusCounts {
    /// Months classified `Active`.
    pub active: usize,
    /// Months classified `Overspent`.
    pub overspent: usize,
    /// Months classified `Underspent`.
    pub underspent: usize,
    /// Months classified `Completed`.
    pub completed: usize,
}

impl StatusCounts {
    /// Count for a single status.
    pub fn get(&self, status: MonthStatus) -> usize {
        match status {
            MonthStatus::Active => self.active,
            MonthStatus::Overspent => self.overspent,
            MonthStatus::Underspent => self.underspent,
            MonthStatus::Completed => self.completed,
        }
    }

    fn increment(&mut self, status: MonthStatus) {
        match status {
            MonthStatus::Active => self.active += 1,
            MonthStatus::Overspent => self.overspent += 1,
            MonthStatus::Underspent => self.underspent += 1,
            MonthStatus::Completed => self.completed += 1,
        }
    }
}

/// Summary metrics over a set of monthly entries.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PerformanceSummary {
    /// Number of months summarized.
    pub months: usize,
    /// Sum of the entries' allocations.
    pub total_allocated: Decimal,
    /// Sum of the entries' spend.
    pub total_spent: Decimal,
    /// `total_allocated - total_spent`.
    pub total_remaining: Decimal,
    /// Months per status.
    pub status_counts: StatusCounts,
    /// Mean of the per-month utilization percentages.
    pub average_utilization: Decimal,
    /// Overspent months divided by months summarized.
    pub overspent_ratio: Decimal,
    /// Band of `overspent_ratio`.
    pub risk_level: RiskLevel,
}

/// Stateless reducer from monthly entries to a [`PerformanceSummary`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BudgetPerformanceAggregator;

impl BudgetPerformanceAggregator {
    /// Summarize entries. An empty input yields an all-zero summary with
    /// risk level `NONE`.
    pub fn summarize<'a, I>(&self, entries: I) -> PerformanceSummary
    where
        I: IntoIterator<Item = &'a MonthlyBalanceEntry>,
    {
        let mut summary = PerformanceSummary::default();
        let mut utilization_sum = Decimal::ZERO;

        for entry in entries {
            summary.months += 1;
            summary.total_allocated += entry.allocated;
            summary.total_spent += entry.spent;
            summary.status_counts.increment(entry.status);
            utilization_sum += entry.utilization_rate();
        }

        if summary.months == 0 {
            return summary;
        }

        let months = Decimal::from(summary.months as u64);
        summary.total_remaining = summary.total_allocated - summary.total_spent;
        summary.average_utilization = utilization_sum / months;
        summary.overspent_ratio = Decimal::from(summary.status_counts.overspent as u64) / months;
        summary.risk_level = RiskLevel::from_overspent_ratio(summary.overspent_ratio);
        summary
    }
}
