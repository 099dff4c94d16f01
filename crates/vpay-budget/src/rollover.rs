//! # Month-to-Month Rollover
//!
//! Carries a month's closing balance into a later month. The carry is a
//! transfer: it leaves the source month and lands in the destination, so
//! line totals are unchanged and every entry keeps
//! `balance == allocated - spent`.
//!
//! | Source balance | Source after | Destination after | Type |
//! |---|---|---|---|
//! | > 0 | `allocated -= carry`, status `Completed` | `allocated += carry` | `Positive` |
//! | < 0 | `spent -= deficit`, status `Overspent` | `spent += deficit` | `Negative` |
//! | 0 | unchanged | unchanged | `None` |
//!
//! The destination is then reclassified under the usual rule.
//!
//! ## Idempotency
//!
//! An applied rollover leaves `rollover_to` on the source and
//! `rollover_from` on the destination. A second invocation for the same
//! pair finds both markers and returns the recorded amount with
//! `already_applied = true`. A destination that already received a carry
//! from a different month is refused with
//! [`EngineError::RolloverConflict`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use vpay_core::{EngineError, EngineResult, ValidationError};

use crate::entry::{MonthStatus, MonthlyBalanceEntry};
use crate::ledger::MonthlyBalanceLedger;

/// Direction of a carried balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloverType {
    /// Unspent allocation carried forward.
    Positive,
    /// Overspend carried forward as a deficit.
    Negative,
    /// Nothing to carry.
    None,
}

impl RolloverType {
    /// Return the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::None => "none",
        }
    }

    /// Type of a signed carry amount.
    pub fn of(amount: Decimal) -> Self {
        if amount > Decimal::ZERO {
            Self::Positive
        } else if amount < Decimal::ZERO {
            Self::Negative
        } else {
            Self::None
        }
    }
}

impl std::fmt::Display for RolloverType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Updated entries and the carry that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloverOutcome {
    /// Source entry after the rollover.
    pub from: MonthlyBalanceEntry,
    /// Destination entry after the rollover.
    pub to: MonthlyBalanceEntry,
    /// Signed amount carried.
    pub amount: Decimal,
    /// Direction of the carry.
    pub rollover_type: RolloverType,
    /// The markers showed this pair had already been rolled over; nothing changed.
    pub already_applied: bool,
}

impl RolloverOutcome {
    /// Whether the entries differ from the inputs.
    pub fn changed(&self) -> bool {
        !self.already_applied && self.rollover_type != RolloverType::None
    }
}

/// Carries closing balances between monthly entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct RolloverProcessor {
    ledger: MonthlyBalanceLedger,
}

impl RolloverProcessor {
    /// Create a processor that reclassifies with `ledger`.
    pub fn new(ledger: MonthlyBalanceLedger) -> Self {
        Self { ledger }
    }

    /// Roll `from`'s closing balance into `to`.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::RolloverOrder`] unless `to` is a later month.
    /// - [`EngineError::RolloverConflict`] if `to` already received a carry
    ///   from another month.
    /// - [`EngineError::SourceAlreadyRolled`] if `from` was already carried
    ///   into another month.
    pub fn rollover(
        &self,
        from: &MonthlyBalanceEntry,
        to: &MonthlyBalanceEntry,
        at: DateTime<Utc>,
    ) -> EngineResult<RolloverOutcome> {
        if to.month <= from.month {
            return Err(ValidationError::RolloverOrder {
                from: from.month.to_string(),
                to: to.month.to_string(),
            }
            .into());
        }

        if from.rollover_to == Some(to.month) && to.rollover_from == Some(from.month) {
            tracing::debug!(from = %from.month, to = %to.month, "rollover already applied");
            return Ok(RolloverOutcome {
                from: from.clone(),
                to: to.clone(),
                amount: to.rollover_amount,
                rollover_type: RolloverType::of(to.rollover_amount),
                already_applied: true,
            });
        }
        if let Some(carried_to) = from.rollover_to {
            if carried_to != to.month {
                return Err(EngineError::SourceAlreadyRolled {
                    from: from.month.to_string(),
                    to: to.month.to_string(),
                    existing: carried_to.to_string(),
                });
            }
        }
        if let Some(existing) = to.rollover_from {
            if existing != from.month {
                return Err(EngineError::RolloverConflict {
                    from: from.month.to_string(),
                    to: to.month.to_string(),
                    existing: existing.to_string(),
                });
            }
        }

        let amount = from.allocated - from.spent;
        let rollover_type = RolloverType::of(amount);
        let mut next_from = from.clone();
        let mut next_to = to.clone();
        let reference = format!("rollover:{}->{}", from.month, to.month);

        match rollover_type {
            RolloverType::None => {
                return Ok(RolloverOutcome {
                    from: next_from,
                    to: next_to,
                    amount,
                    rollover_type,
                    already_applied: false,
                });
            }
            RolloverType::Positive => {
                next_from.allocated -= amount;
                next_to.allocated += amount;
                next_from.status = MonthStatus::Completed;
            }
            RolloverType::Negative => {
                let deficit = -amount;
                next_from.spent -= deficit;
                next_to.spent += deficit;
                next_from.status = MonthStatus::Overspent;
            }
        }

        next_from.reconcile();
        next_from.rollover_to = Some(to.month);
        next_from.carried_forward = amount;
        next_from.touch(&reference, at);

        next_to.reconcile();
        next_to.rollover_from = Some(from.month);
        next_to.rollover_amount = amount;
        next_to.status = self.ledger.classify(&next_to);
        next_to.touch(&reference, at);

        Ok(RolloverOutcome {
            from: next_from,
            to: next_to,
            amount,
            rollover_type,
            already_applied: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use vpay_core::MonthKey;

    fn entry(month: &str, allocated: Decimal, spent: Decimal) -> MonthlyBalanceEntry {
        let mut e = MonthlyBalanceEntry::new(MonthKey::parse(month).unwrap(), allocated);
        e.spent = spent;
        e.reconcile();
        e
    }

    #[test]
    fn positive_balance_carries_forward() {
        let p = RolloverProcessor::default();
        let from = entry("2025-01", dec!(1000), dec!(700));
        let to = entry("2025-02", dec!(1000), dec!(0));
        let out = p.rollover(&from, &to, Utc::now()).unwrap();

        assert_eq!(out.rollover_type, RolloverType::Positive);
        assert_eq!(out.amount, dec!(300));
        assert_eq!(out.from.status, MonthStatus::Completed);
        assert_eq!(out.from.balance, dec!(0));
        assert_eq!(out.to.balance, dec!(1300));
        assert_eq!(out.to.status, MonthStatus::Underspent);
        assert!(out.from.is_reconciled() && out.to.is_reconciled());
        assert_eq!(out.from.rollover_to, Some(to.month));
        assert_eq!(out.to.rollover_from, Some(from.month));
    }

    #[test]
    fn negative_balance_carries_deficit() {
        let p = RolloverProcessor::default();
        let from = entry("2025-01", dec!(1000), dec!(1250));
        let to = entry("2025-02", dec!(1000), dec!(600));
        let out = p.rollover(&from, &to, Utc::now()).unwrap();

        assert_eq!(out.rollover_type, RolloverType::Negative);
        assert_eq!(out.amount, dec!(-250));
        assert_eq!(out.from.status, MonthStatus::Overspent);
        assert_eq!(out.to.balance, dec!(150));
        assert_eq!(out.to.spent, dec!(850));
        assert_eq!(out.to.status, MonthStatus::Active);
        assert_eq!(
            out.from.allocated + out.to.allocated - out.from.spent - out.to.spent,
            from.balance + to.balance
        );
    }

    #[test]
    fn zero_balance_is_no_rollover() {
        let p = RolloverProcessor::default();
        let from = entry("2025-01", dec!(500), dec!(500));
        let to = entry("2025-02", dec!(500), dec!(0));
        let out = p.rollover(&from, &to, Utc::now()).unwrap();
        assert_eq!(out.rollover_type, RolloverType::None);
        assert!(!out.changed());
        assert_eq!(out.to, to);
        assert_eq!(out.from, from);
    }

    #[test]
    fn second_invocation_is_idempotent() {
        let p = RolloverProcessor::default();
        let from = entry("2025-01", dec!(1000), dec!(700));
        let to = entry("2025-02", dec!(1000), dec!(0));
        let once = p.rollover(&from, &to, Utc::now()).unwrap();
        let twice = p.rollover(&once.from, &once.to, Utc::now()).unwrap();
        assert!(twice.already_applied);
        assert_eq!(twice.to.balance, once.to.balance);
        assert_eq!(twice.amount, dec!(300));
    }

    #[test]
    fn conflicting_source_is_refused() {
        let p = RolloverProcessor::default();
        let mut to = entry("2025-03", dec!(100), dec!(0));
        to.rollover_from = Some(MonthKey::parse("2025-01").unwrap());
        let from = entry("2025-02", dec!(100), dec!(10));
        let err = p.rollover(&from, &to, Utc::now()).unwrap_err();
        assert!(matches!(err, EngineError::RolloverConflict { .. }));
    }

    #[test]
    fn destination_must_be_later() {
        let p = RolloverProcessor::default();
        let a = entry("2025-02", dec!(100), dec!(0));
        let b = entry("2025-01", dec!(100), dec!(0));
        let err = p.rollover(&a, &b, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidInput(ValidationError::RolloverOrder { .. })
        ));
    }

    #[test]
    fn source_already_carried_elsewhere_is_refused() {
        let p = RolloverProcessor::default();
        let mut from = entry("2025-01", dec!(100), dec!(40));
        from.rollover_to = Some(MonthKey::parse("2025-02").unwrap());
        let other = entry("2025-03", dec!(100), dec!(0));
        let err = p.rollover(&from, &other, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::SourceAlreadyRolled { ref existing, .. } if existing == "2025-02"
        ));
    }
}
