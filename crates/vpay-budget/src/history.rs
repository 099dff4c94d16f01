//! # Balance History
//!
//! Append-only audit log of ledger mutations, kept per budget line outside
//! the line record itself. Records are never edited or removed: a reversal
//! is a new record pointing at the payment record it undoes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vpay_core::{ActorId, BudgetLineId, MonthKey, PaymentId};

/// What a history record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    /// A finalized payment reduced the balance.
    Payment,
    /// A payment was undone.
    Reversal,
    /// A month's closing balance was carried forward.
    Rollover,
}

impl HistoryKind {
    /// Return the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Payment => "payment",
            Self::Reversal => "reversal",
            Self::Rollover => "rollover",
        }
    }
}

impl std::fmt::Display for HistoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a budget line's balance history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceHistoryRecord {
    /// Unique record identifier.
    pub record_id: Uuid,
    /// Line the record belongs to.
    pub budget_line_id: BudgetLineId,
    /// What kind of mutation was recorded.
    pub kind: HistoryKind,
    /// Payment the record concerns; `None` for rollovers.
    #[serde(default)]
    pub payment_id: Option<PaymentId>,
    /// Month whose entry was mutated (the destination, for rollovers).
    pub month: MonthKey,
    /// Unsigned amount of the payment, reversal, or carry magnitude.
    pub amount: Decimal,
    /// Balance before the mutation.
    pub previous_balance: Decimal,
    /// Signed change: negative for payments, positive for reversals.
    pub delta: Decimal,
    /// Balance after the mutation.
    pub new_balance: Decimal,
    /// Principal that requested the mutation.
    pub actor: ActorId,
    /// When the record was created.
    pub timestamp: DateTime<Utc>,
    /// For reversals, the payment record undone.
    #[serde(default)]
    pub reverses: Option<Uuid>,
    /// For rollovers, the source month.
    #[serde(default)]
    pub rollover_from: Option<MonthKey>,
}

impl BalanceHistoryRecord {
    /// Record a payment of `amount` that moved the line balance from
    /// `previous_balance` to `previous_balance - amount`.
    pub fn payment(
        budget_line_id: BudgetLineId,
        payment_id: PaymentId,
        month: MonthKey,
        amount: Decimal,
        previous_balance: Decimal,
        actor: ActorId,
    ) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            budget_line_id,
            kind: HistoryKind::Payment,
            payment_id: Some(payment_id),
            month,
            amount,
            previous_balance,
            delta: -amount,
            new_balance: previous_balance - amount,
            actor,
            timestamp: Utc::now(),
            reverses: None,
            rollover_from: None,
        }
    }

    /// Record the reversal of `original`, restoring its amount onto
    /// `previous_balance`.
    pub fn reversal(original: &BalanceHistoryRecord, previous_balance: Decimal, actor: ActorId) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            budget_line_id: original.budget_line_id.clone(),
            kind: HistoryKind::Reversal,
            payment_id: original.payment_id.clone(),
            month: original.month,
            amount: original.amount,
            previous_balance,
            delta: original.amount,
            new_balance: previous_balance + original.amount,
            actor,
            timestamp: Utc::now(),
            reverses: Some(original.record_id),
            rollover_from: None,
        }
    }

    /// Record a carry of `amount` (signed) from `from` into `to`, whose
    /// entry balance moved from `previous_balance` to `new_balance`.
    pub fn rollover(
        budget_line_id: BudgetLineId,
        from: MonthKey,
        to: MonthKey,
        amount: Decimal,
        previous_balance: Decimal,
        new_balance: Decimal,
        actor: ActorId,
    ) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            budget_line_id,
            kind: HistoryKind::Rollover,
            payment_id: None,
            month: to,
            amount: amount.abs(),
            previous_balance,
            delta: amount,
            new_balance,
            actor,
            timestamp: Utc::now(),
            reverses: None,
            rollover_from: Some(from),
        }
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Most recent payment record for `payment_id`.
pub fn latest_payment<'a>(
    history: &'a [BalanceHistoryRecord],
    payment_id: &PaymentId,
) -> Option<&'a BalanceHistoryRecord> {
    history
        .iter()
        .rev()
        .find(|r| r.kind == HistoryKind::Payment && r.payment_id.as_ref() == Some(payment_id))
}

/// The reversal record undoing `payment_record`, if any.
pub fn reversal_of(history: &[BalanceHistoryRecord], payment_record: Uuid) -> Option<&BalanceHistoryRecord> {
    history
        .iter()
        .find(|r| r.kind == HistoryKind::Reversal && r.reverses == Some(payment_record))
}

/// The payment record for `payment_id` that has not been reversed, if any.
pub fn unreversed_payment<'a>(
    history: &'a [BalanceHistoryRecord],
    payment_id: &PaymentId,
) -> Option<&'a BalanceHistoryRecord> {
    latest_payment(history, payment_id).filter(|p| reversal_of(history, p.record_id).is_none())
}

/// Every record concerning `payment_id`, in log order.
pub fn for_payment<'a>(
    history: &'a [BalanceHistoryRecord],
    payment_id: &'a PaymentId,
) -> impl Iterator<Item = &'a BalanceHistoryRecord> + 'a {
    history
        .iter()
        .filter(move |r| r.payment_id.as_ref() == Some(payment_id))
}
