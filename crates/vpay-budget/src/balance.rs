//! # Current-Balance Resolution and Consistency Checks
//!
//! Budget lines written by earlier versions of the surrounding system hold
//! their running balance under several field names. [`BALANCE_FALLBACK_CHAIN`]
//! is the single place that fixes which one wins: the first field in the
//! chain that is present is the current balance. When none is present the
//! balance is derived as `allocated_total - total_spent`.
//!
//! After a write, [`validate_line`] compares every balance-representing
//! field against the balance that was written and reports each disagreement
//! as a [`BalanceConsistencyWarning`]. Warnings never abort a write.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use vpay_core::MonthKey;

use crate::line::BudgetLine;

/// A balance-representing field of a budget line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceField {
    /// Running balance in the reporting currency.
    BalanceUsd,
    /// Generic running balance.
    CurrentBalance,
    /// Legacy balance carried down.
    BalanceCarriedDown,
    /// `allocated_total - total_spent`.
    Derived,
    /// A monthly entry's stored `balance` against its `allocated - spent`.
    MonthEntry,
    /// Sum of the monthly entries' spend against `total_spent`.
    SpentTotal,
    /// Sum of the monthly entries' allocation against `allocated_total`.
    AllocatedTotal,
}

/// Fields consulted for the current balance, highest priority first.
pub const BALANCE_FALLBACK_CHAIN: &[BalanceField] = &[
    BalanceField::BalanceUsd,
    BalanceField::CurrentBalance,
    BalanceField::BalanceCarriedDown,
];

impl BalanceField {
    /// Return the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BalanceUsd => "balance_usd",
            Self::CurrentBalance => "current_balance",
            Self::BalanceCarriedDown => "balance_carried_down",
            Self::Derived => "derived",
            Self::MonthEntry => "month_entry",
            Self::SpentTotal => "spent_total",
            Self::AllocatedTotal => "allocated_total",
        }
    }

    /// Read this field from a line. Only the balance fields and `Derived`
    /// have a line-level value.
    pub fn read(&self, line: &BudgetLine) -> Option<Decimal> {
        match self {
            Self::BalanceUsd => line.balance_usd,
            Self::CurrentBalance => line.current_balance,
            Self::BalanceCarriedDown => line.balance_carried_down,
            Self::Derived => Some(line.derived_balance()),
            Self::MonthEntry | Self::SpentTotal | Self::AllocatedTotal => None,
        }
    }
}

impl std::fmt::Display for BalanceField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A current balance and the field it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedBalance {
    /// The current balance.
    pub value: Decimal,
    /// Field it was read from, or `Derived`.
    pub source: BalanceField,
}

/// Resolve a line's current balance through [`BALANCE_FALLBACK_CHAIN`].
pub fn resolve_current_balance(line: &BudgetLine) -> ResolvedBalance {
    BALANCE_FALLBACK_CHAIN
        .iter()
        .find_map(|field| field.read(line).map(|value| ResolvedBalance { value, source: *field }))
        .unwrap_or_else(|| ResolvedBalance {
            value: line.derived_balance(),
            source: BalanceField::Derived,
        })
}

/// One balance-representing field that disagrees with the expected balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceConsistencyWarning {
    /// The disagreeing field.
    pub field: BalanceField,
    /// Month of the entry, for `MonthEntry` warnings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<MonthKey>,
    /// Value found.
    pub observed: Decimal,
    /// Value it should equal.
    pub expected: Decimal,
}

impl std::fmt::Display for BalanceConsistencyWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.month {
            Some(month) => write!(
                f,
                "{} {month}: observed {}, expected {}",
                self.field, self.observed, self.expected
            ),
            None => write!(
                f,
                "{}: observed {}, expected {}",
                self.field, self.observed, self.expected
            ),
        }
    }
}

/// Consistency check payload returned alongside a ledger write.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BalanceValidation {
    /// Every disagreement found; empty when consistent.
    pub warnings: Vec<BalanceConsistencyWarning>,
}

impl BalanceValidation {
    /// Whether every field agreed.
    pub fn is_consistent(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Compare every balance-representing field of `line` against `expected`,
/// every monthly entry against its own `allocated - spent`, and the sums of
/// the monthly entries against the line's totals.
pub fn validate_line(line: &BudgetLine, expected: Decimal) -> BalanceValidation {
    let mut warnings: Vec<_> = BALANCE_FALLBACK_CHAIN
        .iter()
        .chain(std::iter::once(&BalanceField::Derived))
        .filter_map(|field| {
            let observed = field.read(line)?;
            (observed != expected).then_some(BalanceConsistencyWarning {
                field: *field,
                month: None,
                observed,
                expected,
            })
        })
        .collect();

    warnings.extend(line.entries().filter(|e| !e.is_reconciled()).map(|e| {
        BalanceConsistencyWarning {
            field: BalanceField::MonthEntry,
            month: Some(e.month),
            observed: e.balance,
            expected: e.allocated - e.spent,
        }
    }));

    let (spent, allocated) = line
        .entries()
        .fold((Decimal::ZERO, Decimal::ZERO), |(s, a), e| (s + e.spent, a + e.allocated));
    for (field, observed, expected) in [
        (BalanceField::SpentTotal, spent, line.total_spent),
        (BalanceField::AllocatedTotal, allocated, line.allocated_total),
    ] {
        if observed != expected {
            warnings.push(BalanceConsistencyWarning {
                field,
                month: None,
                observed,
                expected,
            });
        }
    }

    BalanceValidation { warnings }
}
