//! # Balance Update Coordinator
//!
//! Applies finalized payments, reversals, and month rollovers to stored
//! budget lines. The coordinator keeps no ledger state: each operation
//! reads a line and its history, computes the next version of the line
//! plus the history records to append, and hands both to
//! [`LedgerStore::write`] in one conditional write.
//!
//! ## Concurrency
//!
//! Writers on the same line are serialized optimistically. A write that
//! loses the race gets [`WriteOutcome::Conflict`]; the coordinator re-reads
//! and recomputes from scratch, up to `max_write_attempts` times, then gives
//! up with [`EngineError::RetriesExhausted`]. A failed operation writes
//! nothing.
//!
//! ## Replay
//!
//! Finalization events can be delivered more than once. Re-applying a
//! payment that is recorded and not reversed returns the recorded result
//! with `replayed = true`. Re-reversing a reversed payment does the same.
//! Replays write nothing.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vpay_core::{
    ActorId, BudgetLineId, EngineConfig, EngineError, EngineResult, MonthKey, PaymentId,
    ValidationError,
};
use vpay_tax::TaxCascadeResult;

use crate::balance::{self, BalanceField, BalanceValidation};
use crate::entry::MonthlyBalanceEntry;
use crate::history::{self, BalanceHistoryRecord};
use crate::ledger::MonthlyBalanceLedger;
use crate::line::BudgetLine;
use crate::rollover::{RolloverOutcome, RolloverProcessor};
use crate::store::{LedgerStore, WriteOutcome};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of applying a finalized payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentApplication {
    /// The applied payment.
    pub payment_id: PaymentId,
    /// Month the spend was recorded against.
    pub month: MonthKey,
    /// Amount in the reporting currency.
    pub amount: Decimal,
    /// Balance before the payment.
    pub previous_balance: Decimal,
    /// Balance after the payment.
    pub new_balance: Decimal,
    /// Field the previous balance was resolved from.
    pub balance_source: BalanceField,
    /// Consistency check of the written line. Empty for replays.
    pub validation: BalanceValidation,
    /// History record of the payment.
    pub record_id: Uuid,
    /// The payment was already recorded; nothing was written.
    pub replayed: bool,
}

/// Result of reversing a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReversalOutcome {
    /// The reversed payment.
    pub payment_id: PaymentId,
    /// Month the payment was recorded against.
    pub month: MonthKey,
    /// Amount added back.
    pub amount: Decimal,
    /// Balance before the reversal.
    pub previous_balance: Decimal,
    /// Balance after the payment amount was added back.
    pub restored_balance: Decimal,
    /// Consistency check of the written line. Empty for replays.
    pub validation: BalanceValidation,
    /// History record of the reversal.
    pub record_id: Uuid,
    /// The payment was already reversed; nothing was written.
    pub replayed: bool,
}

/// Result of rolling a month over on a stored line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRollover {
    /// Entries after the rollover.
    pub outcome: RolloverOutcome,
    /// History record of the carry; `None` when nothing was written.
    pub record_id: Option<Uuid>,
}

/// What one attempt of a mutation decided.
enum Plan<T> {
    /// Nothing to write; return `T` as-is.
    Done(T),
    /// Commit `line` and `records`, then return `T`.
    Write {
        line: Box<BudgetLine>,
        records: Vec<BalanceHistoryRecord>,
        result: T,
    },
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Applies ledger mutations to a [`LedgerStore`] under optimistic concurrency.
#[derive(Debug, Clone)]
pub struct BalanceUpdateCoordinator<S> {
    store: S,
    ledger: MonthlyBalanceLedger,
    rollover: RolloverProcessor,
    max_write_attempts: u32,
}

impl<S: LedgerStore> BalanceUpdateCoordinator<S> {
    /// Create a coordinator over `store`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidConfig`] if the configuration is
    /// out of range.
    pub fn new(store: S, config: &EngineConfig) -> Result<Self, ValidationError> {
        config.validate()?;
        let ledger = MonthlyBalanceLedger::from_config(config);
        Ok(Self {
            store,
            ledger,
            rollover: RolloverProcessor::new(ledger),
            max_write_attempts: config.max_write_attempts,
        })
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The ledger used for entry updates.
    pub fn ledger(&self) -> &MonthlyBalanceLedger {
        &self.ledger
    }

    /// Initialize a new budget line's monthly entries and insert it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the line already exists.
    pub fn register_line(&self, line: BudgetLine) -> EngineResult<BudgetLine> {
        let line = self.ledger.initialize(line);
        self.store.insert(line.clone())?;
        tracing::info!(budget_line = %line.id, allocated = %line.allocated_total, "budget line registered");
        Ok(line)
    }

    /// Read a line.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::BudgetLineNotFound`] if it is not stored.
    pub fn budget_line(&self, id: &BudgetLineId) -> EngineResult<BudgetLine> {
        self.store
            .read(id)?
            .map(|v| v.value)
            .ok_or_else(|| EngineError::BudgetLineNotFound(id.to_string()))
    }

    /// The line's balance history in append order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] on storage failure.
    pub fn history(&self, id: &BudgetLineId) -> EngineResult<Vec<BalanceHistoryRecord>> {
        Ok(self.store.history(id)?)
    }

    /// History records concerning one payment, in append order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] on storage failure.
    pub fn payment_history(
        &self,
        id: &BudgetLineId,
        payment_id: &PaymentId,
    ) -> EngineResult<Vec<BalanceHistoryRecord>> {
        let log = self.store.history(id)?;
        Ok(history::for_payment(&log, payment_id).cloned().collect())
    }

    /// Soft-deactivate a line.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::BudgetLineNotFound`] or
    /// [`EngineError::RetriesExhausted`].
    pub fn deactivate(&self, id: &BudgetLineId) -> EngineResult<()> {
        self.mutate(id, |line, _| {
            if !line.is_active() {
                return Ok(Plan::Done(()));
            }
            let mut next = line.clone();
            next.deactivate();
            Ok(Plan::Write {
                line: Box::new(next),
                records: Vec::new(),
                result: (),
            })
        })
    }

    /// Apply a finalized payment of `amount` (reporting currency) to
    /// `month` of the line.
    ///
    /// The current balance is resolved through the balance-field fallback
    /// chain, the new balance is `current - amount`, and every balance
    /// field is written with it. The month entry's spend and the line's
    /// cumulative spend grow by `amount`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidInput`] for a negative amount, or one that
    ///   would take the line's figures out of the decimal range.
    /// - [`EngineError::PaymentMismatch`] if the payment is already applied
    ///   with a different amount or month.
    /// - [`EngineError::BudgetLineNotFound`], [`EngineError::BudgetLineInactive`],
    ///   [`EngineError::UnknownMonth`].
    /// - [`EngineError::RetriesExhausted`] when every write attempt conflicted.
    pub fn apply_finalized_payment(
        &self,
        id: &BudgetLineId,
        amount: Decimal,
        payment_id: &PaymentId,
        actor: &ActorId,
        month: MonthKey,
    ) -> EngineResult<PaymentApplication> {
        if amount < Decimal::ZERO {
            return Err(ValidationError::NegativeAmount {
                field: "payment_amount",
                value: amount,
            }
            .into());
        }

        let applied = self.mutate(id, |line, log| {
            ensure_active(line)?;

            if let Some(recorded) = history::unreversed_payment(log, payment_id) {
                if recorded.amount != amount || recorded.month != month {
                    return Err(EngineError::PaymentMismatch {
                        payment_id: payment_id.to_string(),
                        recorded_amount: recorded.amount,
                        recorded_month: recorded.month.to_string(),
                        amount,
                        month: month.to_string(),
                    });
                }
                tracing::info!(
                    budget_line = %id,
                    payment = %payment_id,
                    "payment already applied; replaying recorded result"
                );
                return Ok(Plan::Done(PaymentApplication {
                    payment_id: payment_id.clone(),
                    month: recorded.month,
                    amount: recorded.amount,
                    previous_balance: recorded.previous_balance,
                    new_balance: recorded.new_balance,
                    balance_source: BalanceField::Derived,
                    validation: BalanceValidation::default(),
                    record_id: recorded.record_id,
                    replayed: true,
                }));
            }

            let entry = month_entry(line, month)?;
            let resolved = balance::resolve_current_balance(line);
            let total_spent = checked_spend(line.total_spent, amount, "total spent")?;
            checked_spend(entry.spent, amount, "month spend")?;
            resolved
                .value
                .checked_sub(amount)
                .ok_or(ValidationError::AmountOverflow { step: "balance" })?;
            let now = Utc::now();

            let mut next = line.clone();
            next.monthly_balances.insert(
                month,
                self.ledger
                    .apply_transaction(entry, amount, payment_id.as_str(), now),
            );
            next.total_spent = total_spent;

            let record = BalanceHistoryRecord::payment(
                line.id.clone(),
                payment_id.clone(),
                month,
                amount,
                resolved.value,
                actor.clone(),
            );
            next.set_balance_fields(record.new_balance);
            next.updated_at = now;
            let validation = balance::validate_line(&next, record.new_balance);

            Ok(Plan::Write {
                line: Box::new(next),
                result: PaymentApplication {
                    payment_id: payment_id.clone(),
                    month,
                    amount,
                    previous_balance: resolved.value,
                    new_balance: record.new_balance,
                    balance_source: resolved.source,
                    validation,
                    record_id: record.record_id,
                    replayed: false,
                },
                records: vec![record],
            })
        })?;

        if !applied.replayed {
            report_validation(id, &applied.validation);
            tracing::info!(
                budget_line = %id,
                payment = %payment_id,
                month = %month,
                %amount,
                previous_balance = %applied.previous_balance,
                new_balance = %applied.new_balance,
                source = %applied.balance_source,
                "payment applied"
            );
        }
        Ok(applied)
    }

    /// Apply the budget impact of a cascade result as a finalized payment.
    ///
    /// # Errors
    ///
    /// As [`apply_finalized_payment`](Self::apply_finalized_payment).
    pub fn apply_cascade_result(
        &self,
        id: &BudgetLineId,
        result: &TaxCascadeResult,
        payment_id: &PaymentId,
        actor: &ActorId,
        month: MonthKey,
    ) -> EngineResult<PaymentApplication> {
        self.apply_finalized_payment(id, result.budget_impact, payment_id, actor, month)
    }

    /// Reverse a previously applied payment.
    ///
    /// Adds the payment amount back onto the current balance, rolls back
    /// the month entry's spend and the line's cumulative spend, and appends
    /// a reversal record. The original payment record is left untouched.
    /// Spend that a negative rollover moved into the next month is rolled
    /// back there.
    ///
    /// # Errors
    ///
    /// - [`EngineError::PaymentNotFound`] if the payment was never applied.
    /// - [`EngineError::BudgetLineNotFound`], [`EngineError::BudgetLineInactive`],
    ///   [`EngineError::UnknownMonth`], [`EngineError::RetriesExhausted`].
    pub fn reverse(
        &self,
        id: &BudgetLineId,
        payment_id: &PaymentId,
        actor: &ActorId,
    ) -> EngineResult<ReversalOutcome> {
        let reversed = self.mutate(id, |line, log| {
            ensure_active(line)?;

            let original = history::latest_payment(log, payment_id).ok_or_else(|| {
                EngineError::PaymentNotFound {
                    budget_line_id: id.to_string(),
                    payment_id: payment_id.to_string(),
                }
            })?;

            if let Some(done) = history::reversal_of(log, original.record_id) {
                tracing::info!(
                    budget_line = %id,
                    payment = %payment_id,
                    "payment already reversed; replaying recorded result"
                );
                return Ok(Plan::Done(ReversalOutcome {
                    payment_id: payment_id.clone(),
                    month: done.month,
                    amount: done.amount,
                    previous_balance: done.previous_balance,
                    restored_balance: done.new_balance,
                    validation: BalanceValidation::default(),
                    record_id: done.record_id,
                    replayed: true,
                }));
            }

            month_entry(line, original.month)?;
            let resolved = balance::resolve_current_balance(line);
            let now = Utc::now();
            let reference = format!("reversal:{payment_id}");

            let mut next = line.clone();
            let removed =
                self.roll_back_spend(&mut next, original.month, original.amount, &reference);
            next.total_spent = (next.total_spent - removed).max(Decimal::ZERO);

            let record = BalanceHistoryRecord::reversal(original, resolved.value, actor.clone());
            next.set_balance_fields(record.new_balance);
            next.updated_at = now;
            let validation = balance::validate_line(&next, record.new_balance);

            Ok(Plan::Write {
                line: Box::new(next),
                result: ReversalOutcome {
                    payment_id: payment_id.clone(),
                    month: original.month,
                    amount: original.amount,
                    previous_balance: resolved.value,
                    restored_balance: record.new_balance,
                    validation,
                    record_id: record.record_id,
                    replayed: false,
                },
                records: vec![record],
            })
        })?;

        if !reversed.replayed {
            report_validation(id, &reversed.validation);
            tracing::info!(
                budget_line = %id,
                payment = %payment_id,
                amount = %reversed.amount,
                restored_balance = %reversed.restored_balance,
                "payment reversed"
            );
        }
        Ok(reversed)
    }

    /// Roll `from`'s closing balance into the following month.
    ///
    /// Safe to repeat: a pair already rolled over is reported with
    /// `already_applied = true` and nothing is written.
    ///
    /// # Errors
    ///
    /// - [`EngineError::UnknownMonth`] if either month is not tracked.
    /// - [`EngineError::RolloverConflict`] if the next month already
    ///   received a carry from elsewhere.
    /// - [`EngineError::SourceAlreadyRolled`] if `from` was already carried
    ///   into a different month.
    /// - [`EngineError::BudgetLineNotFound`], [`EngineError::BudgetLineInactive`],
    ///   [`EngineError::RetriesExhausted`].
    pub fn rollover_month(
        &self,
        id: &BudgetLineId,
        from: MonthKey,
        actor: &ActorId,
    ) -> EngineResult<LineRollover> {
        let to = from.next();
        let rolled = self.mutate(id, |line, _| {
            ensure_active(line)?;
            let from_entry = month_entry(line, from)?;
            let to_entry = month_entry(line, to)?;

            let outcome = self.rollover.rollover(from_entry, to_entry, Utc::now())?;
            if !outcome.changed() {
                return Ok(Plan::Done(LineRollover {
                    outcome,
                    record_id: None,
                }));
            }

            let record = BalanceHistoryRecord::rollover(
                line.id.clone(),
                from,
                to,
                outcome.amount,
                to_entry.balance,
                outcome.to.balance,
                actor.clone(),
            );
            let mut next = line.clone();
            next.monthly_balances.insert(from, outcome.from.clone());
            next.monthly_balances.insert(to, outcome.to.clone());
            next.updated_at = Utc::now();

            Ok(Plan::Write {
                line: Box::new(next),
                result: LineRollover {
                    outcome,
                    record_id: Some(record.record_id),
                },
                records: vec![record],
            })
        })?;

        if rolled.record_id.is_some() {
            tracing::info!(
                budget_line = %id,
                from = %from,
                to = %to,
                amount = %rolled.outcome.amount,
                kind = %rolled.outcome.rollover_type,
                "month rolled over"
            );
        }
        Ok(rolled)
    }

    /// Remove `amount` of spend starting at `month`.
    ///
    /// A negative rollover moves part of a month's spend into the month its
    /// `rollover_to` names. Whatever `month` no longer holds is taken from
    /// that month in turn, and the carry markers on both sides shrink by the
    /// same amount. Returns the spend actually removed.
    fn roll_back_spend(
        &self,
        line: &mut BudgetLine,
        month: MonthKey,
        amount: Decimal,
        reference: &str,
    ) -> Decimal {
        let now = Utc::now();
        let mut remaining = amount;
        let mut cursor = Some(month);
        // Source month and carried deficit when following a carry.
        let mut carry: Option<(MonthKey, Decimal)> = None;

        while let Some(current) = cursor {
            if remaining <= Decimal::ZERO {
                break;
            }
            let Some(entry) = line.entry(current).cloned() else {
                break;
            };
            let mut take = remaining.min(entry.spent);
            if let Some((_, deficit)) = carry {
                take = take.min(deficit);
            }
            let mut updated = self.ledger.rollback_transaction(&entry, take, reference, now);
            remaining -= take;

            if let Some((source, _)) = carry {
                updated.rollover_amount = (updated.rollover_amount + take).min(Decimal::ZERO);
                if let Some(from_entry) = line.monthly_balances.get_mut(&source) {
                    from_entry.carried_forward =
                        (from_entry.carried_forward + take).min(Decimal::ZERO);
                }
            }
            line.monthly_balances.insert(current, updated);

            cursor = match entry.rollover_to {
                Some(to) if entry.carried_forward < Decimal::ZERO => {
                    tracing::debug!(
                        from = %current,
                        to = %to,
                        %remaining,
                        "reversal follows negative carry"
                    );
                    carry = Some((current, -entry.carried_forward));
                    Some(to)
                }
                _ => None,
            };
        }

        if remaining > Decimal::ZERO {
            tracing::warn!(
                budget_line = %line.id,
                month = %month,
                %amount,
                unmatched = %remaining,
                "reversal exceeds recorded spend; remainder not rolled back"
            );
        }
        amount - remaining
    }

    /// Read, plan, and conditionally write, retrying on version conflicts.
    fn mutate<T>(
        &self,
        id: &BudgetLineId,
        plan: impl Fn(&BudgetLine, &[BalanceHistoryRecord]) -> EngineResult<Plan<T>>,
    ) -> EngineResult<T> {
        for attempt in 1..=self.max_write_attempts {
            let current = self
                .store
                .read(id)?
                .ok_or_else(|| EngineError::BudgetLineNotFound(id.to_string()))?;
            let log = self.store.history(id)?;

            let (line, records, result) = match plan(&current.value, &log)? {
                Plan::Done(result) => return Ok(result),
                Plan::Write {
                    line,
                    records,
                    result,
                } => (line, records, result),
            };

            match self.store.write(id, &line, current.version, &records)? {
                WriteOutcome::Written { .. } => return Ok(result),
                WriteOutcome::Conflict { current_version } => {
                    let conflict = EngineError::ConcurrentModification {
                        budget_line_id: id.to_string(),
                        expected: current.version,
                        found: current_version,
                    };
                    tracing::warn!(
                        budget_line = %id,
                        attempt,
                        max_attempts = self.max_write_attempts,
                        error = %conflict,
                        "write conflict; retrying with fresh read"
                    );
                }
            }
        }

        tracing::warn!(
            budget_line = %id,
            attempts = self.max_write_attempts,
            "write retries exhausted; budget line left unmodified"
        );
        Err(EngineError::RetriesExhausted {
            budget_line_id: id.to_string(),
            attempts: self.max_write_attempts,
        })
    }
}

fn ensure_active(line: &BudgetLine) -> EngineResult<()> {
    if line.is_active() {
        Ok(())
    } else {
        Err(EngineError::BudgetLineInactive(line.id.to_string()))
    }
}

fn checked_spend(spent: Decimal, amount: Decimal, step: &'static str) -> EngineResult<Decimal> {
    spent
        .checked_add(amount)
        .ok_or_else(|| ValidationError::AmountOverflow { step }.into())
}

fn month_entry(line: &BudgetLine, month: MonthKey) -> EngineResult<&MonthlyBalanceEntry> {
    line.entry(month).ok_or_else(|| EngineError::UnknownMonth {
        budget_line_id: line.id.to_string(),
        month: month.to_string(),
    })
}

fn report_validation(id: &BudgetLineId, validation: &BalanceValidation) {
    for warning in &validation.warnings {
        tracing::warn!(
            budget_line = %id,
            field = %warning.field,
            observed = %warning.observed,
            expected = %warning.expected,
            month = ?warning.month.map(|m| m.to_string()),
            "balance fields disagree after write; manual reconciliation required"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    use crate::entry::MonthStatus;
    use crate::store::{InMemoryLedgerStore, StoreError, Versioned};

    fn month(s: &str) -> MonthKey {
        MonthKey::parse(s).unwrap()
    }

    fn pid(s: &str) -> PaymentId {
        PaymentId::new(s).unwrap()
    }

    fn clerk() -> ActorId {
        ActorId::new("clerk-01").unwrap()
    }

    fn setup() -> (BalanceUpdateCoordinator<InMemoryLedgerStore>, BudgetLineId) {
        let coord =
            BalanceUpdateCoordinator::new(InMemoryLedgerStore::new(), &EngineConfig::default()).unwrap();
        let line = BudgetLine::new(
            BudgetLineId::new("BL-OPS").unwrap(),
            "Operations",
            month("2025-01"),
            vec![dec!(1000); 12],
        )
        .unwrap();
        let id = line.id.clone();
        coord.register_line(line).unwrap();
        (coord, id)
    }

    #[test]
    fn payment_reduces_balance_and_records_history() {
        let (coord, id) = setup();
        let out = coord
            .apply_finalized_payment(&id, dec!(250), &pid("PV-1"), &clerk(), month("2025-01"))
            .unwrap();
        assert_eq!(out.previous_balance, dec!(12000));
        assert_eq!(out.new_balance, dec!(11750));
        assert_eq!(out.balance_source, BalanceField::Derived);
        assert!(out.validation.is_consistent());
        assert!(!out.replayed);

        let line = coord.budget_line(&id).unwrap();
        assert_eq!(line.balance_usd, Some(dec!(11750)));
        assert_eq!(line.total_spent, dec!(250));
        let jan = line.entry(month("2025-01")).unwrap();
        assert_eq!(jan.spent, dec!(250));
        assert_eq!(jan.status, MonthStatus::Active);
        assert_eq!(coord.history(&id).unwrap().len(), 1);
    }

    #[test]
    fn legacy_field_takes_priority_and_mismatch_is_flagged() {
        let (coord, id) = setup();
        let mut line = coord.budget_line(&id).unwrap();
        line.balance_carried_down = Some(dec!(9000));
        coord.store().write(&id, &line, 1, &[]).unwrap();

        let out = coord
            .apply_finalized_payment(&id, dec!(100), &pid("PV-1"), &clerk(), month("2025-02"))
            .unwrap();
        assert_eq!(out.balance_source, BalanceField::BalanceCarriedDown);
        assert_eq!(out.new_balance, dec!(8900));
        assert!(!out.validation.is_consistent());
        assert_eq!(out.validation.warnings[0].field, BalanceField::Derived);
        assert_eq!(out.validation.warnings[0].observed, dec!(11900));
    }

    #[test]
    fn duplicate_payment_is_replayed() {
        let (coord, id) = setup();
        let first = coord
            .apply_finalized_payment(&id, dec!(100), &pid("PV-1"), &clerk(), month("2025-01"))
            .unwrap();
        let second = coord
            .apply_finalized_payment(&id, dec!(100), &pid("PV-1"), &clerk(), month("2025-01"))
            .unwrap();
        assert!(second.replayed);
        assert_eq!(second.new_balance, first.new_balance);
        assert_eq!(second.record_id, first.record_id);
        assert_eq!(coord.budget_line(&id).unwrap().total_spent, dec!(100));
        assert_eq!(coord.history(&id).unwrap().len(), 1);
    }

    #[test]
    fn redelivery_with_different_figures_is_refused() {
        let (coord, id) = setup();
        coord
            .apply_finalized_payment(&id, dec!(100), &pid("PV-1"), &clerk(), month("2025-01"))
            .unwrap();

        let err = coord
            .apply_finalized_payment(&id, dec!(120), &pid("PV-1"), &clerk(), month("2025-01"))
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::PaymentMismatch { recorded_amount, amount, .. }
                if recorded_amount == dec!(100) && amount == dec!(120)
        ));

        let err = coord
            .apply_finalized_payment(&id, dec!(100), &pid("PV-1"), &clerk(), month("2025-02"))
            .unwrap_err();
        assert!(matches!(err, EngineError::PaymentMismatch { .. }));

        let line = coord.budget_line(&id).unwrap();
        assert_eq!(line.total_spent, dec!(100));
        assert_eq!(coord.history(&id).unwrap().len(), 1);
    }

    #[test]
    fn spend_beyond_decimal_range_is_refused_without_writing() {
        let (coord, id) = setup();
        coord
            .apply_finalized_payment(&id, Decimal::MAX, &pid("PV-1"), &clerk(), month("2025-01"))
            .unwrap();
        let err = coord
            .apply_finalized_payment(&id, dec!(1), &pid("PV-2"), &clerk(), month("2025-02"))
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidInput(ValidationError::AmountOverflow { step: "total spent" })
        ));
        assert_eq!(coord.history(&id).unwrap().len(), 1);
    }

    #[test]
    fn reversal_after_negative_rollover_reaches_next_month() {
        let (coord, id) = setup();
        coord
            .apply_finalized_payment(&id, dec!(1250), &pid("PV-1"), &clerk(), month("2025-01"))
            .unwrap();
        coord
            .apply_finalized_payment(&id, dec!(100), &pid("PV-2"), &clerk(), month("2025-02"))
            .unwrap();
        coord.rollover_month(&id, month("2025-01"), &ActorId::system()).unwrap();

        let rev = coord.reverse(&id, &pid("PV-1"), &clerk()).unwrap();
        assert!(rev.validation.is_consistent(), "{:?}", rev.validation);
        assert_eq!(rev.restored_balance, dec!(11900));

        let line = coord.budget_line(&id).unwrap();
        let jan = line.entry(month("2025-01")).unwrap();
        let feb = line.entry(month("2025-02")).unwrap();
        assert_eq!(jan.spent, dec!(0));
        assert_eq!(jan.carried_forward, dec!(0));
        assert_eq!(feb.spent, dec!(100));
        assert_eq!(feb.rollover_amount, dec!(0));
        assert_eq!(line.total_spent, dec!(100));
        assert_eq!(line.entries().map(|e| e.spent).sum::<Decimal>(), line.total_spent);
    }

    #[test]
    fn reversal_round_trip() {
        let (coord, id) = setup();
        coord
            .apply_finalized_payment(&id, dec!(400), &pid("PV-7"), &clerk(), month("2025-03"))
            .unwrap();
        let rev = coord.reverse(&id, &pid("PV-7"), &clerk()).unwrap();
        assert_eq!(rev.restored_balance, dec!(12000));
        assert!(rev.validation.is_consistent());

        let line = coord.budget_line(&id).unwrap();
        assert_eq!(line.total_spent, dec!(0));
        assert_eq!(line.entry(month("2025-03")).unwrap().spent, dec!(0));
        assert_eq!(coord.history(&id).unwrap().len(), 2);
        assert_eq!(coord.payment_history(&id, &pid("PV-7")).unwrap().len(), 2);

        let again = coord.reverse(&id, &pid("PV-7"), &clerk()).unwrap();
        assert!(again.replayed);
        assert_eq!(again.record_id, rev.record_id);
        assert_eq!(coord.history(&id).unwrap().len(), 2);
    }

    #[test]
    fn reapply_after_reversal_is_a_new_payment() {
        let (coord, id) = setup();
        coord
            .apply_finalized_payment(&id, dec!(50), &pid("PV-1"), &clerk(), month("2025-01"))
            .unwrap();
        coord.reverse(&id, &pid("PV-1"), &clerk()).unwrap();
        let again = coord
            .apply_finalized_payment(&id, dec!(50), &pid("PV-1"), &clerk(), month("2025-01"))
            .unwrap();
        assert!(!again.replayed);
        assert_eq!(coord.history(&id).unwrap().len(), 3);
    }

    #[test]
    fn unknown_payment_reversal_fails() {
        let (coord, id) = setup();
        let err = coord.reverse(&id, &pid("PV-404"), &clerk()).unwrap_err();
        assert!(matches!(err, EngineError::PaymentNotFound { .. }));
    }

    #[test]
    fn guards() {
        let (coord, id) = setup();
        let err = coord
            .apply_finalized_payment(&id, dec!(-1), &pid("PV-1"), &clerk(), month("2025-01"))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));

        let err = coord
            .apply_finalized_payment(&id, dec!(1), &pid("PV-1"), &clerk(), month("2026-01"))
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownMonth { .. }));

        let missing = BudgetLineId::new("BL-NONE").unwrap();
        let err = coord
            .apply_finalized_payment(&missing, dec!(1), &pid("PV-1"), &clerk(), month("2025-01"))
            .unwrap_err();
        assert!(matches!(err, EngineError::BudgetLineNotFound(_)));

        coord.deactivate(&id).unwrap();
        let err = coord
            .apply_finalized_payment(&id, dec!(1), &pid("PV-1"), &clerk(), month("2025-01"))
            .unwrap_err();
        assert!(matches!(err, EngineError::BudgetLineInactive(_)));
        assert!(coord.history(&id).unwrap().is_empty());
    }

    #[test]
    fn rollover_month_is_idempotent_and_recorded() {
        let (coord, id) = setup();
        coord
            .apply_finalized_payment(&id, dec!(600), &pid("PV-1"), &clerk(), month("2025-01"))
            .unwrap();
        let first = coord.rollover_month(&id, month("2025-01"), &ActorId::system()).unwrap();
        assert_eq!(first.outcome.amount, dec!(400));
        assert!(first.record_id.is_some());

        let second = coord.rollover_month(&id, month("2025-01"), &ActorId::system()).unwrap();
        assert!(second.outcome.already_applied);
        assert!(second.record_id.is_none());

        let line = coord.budget_line(&id).unwrap();
        assert_eq!(line.entry(month("2025-02")).unwrap().balance, dec!(1400));
        assert_eq!(line.entry(month("2025-01")).unwrap().status, MonthStatus::Completed);
        assert_eq!(line.derived_balance(), dec!(11400));
        assert_eq!(coord.history(&id).unwrap().len(), 2);
    }

    #[test]
    fn rollover_of_last_tracked_month_is_unknown() {
        let (coord, id) = setup();
        let err = coord
            .rollover_month(&id, month("2025-12"), &clerk())
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownMonth { month, .. } if month == "2026-01"));
    }

    /// Store whose writes always conflict.
    struct AlwaysConflicting(InMemoryLedgerStore);

    impl LedgerStore for AlwaysConflicting {
        fn read(&self, id: &BudgetLineId) -> Result<Option<Versioned<BudgetLine>>, StoreError> {
            self.0.read(id)
        }

        fn write(
            &self,
            _id: &BudgetLineId,
            _line: &BudgetLine,
            expected_version: u64,
            _history: &[BalanceHistoryRecord],
        ) -> Result<WriteOutcome, StoreError> {
            Ok(WriteOutcome::Conflict {
                current_version: expected_version + 1,
            })
        }

        fn history(&self, id: &BudgetLineId) -> Result<Vec<BalanceHistoryRecord>, StoreError> {
            self.0.history(id)
        }

        fn insert(&self, line: BudgetLine) -> Result<u64, StoreError> {
            self.0.insert(line)
        }
    }

    #[test]
    fn exhausted_retries_leave_line_unmodified() {
        let inner = InMemoryLedgerStore::new();
        let coord = BalanceUpdateCoordinator::new(
            AlwaysConflicting(inner.clone()),
            &EngineConfig::default(),
        )
        .unwrap();
        let line = BudgetLine::new(
            BudgetLineId::new("BL-C").unwrap(),
            "Contested",
            month("2025-01"),
            vec![dec!(10); 12],
        )
        .unwrap();
        let id = line.id.clone();
        let before = coord.register_line(line).unwrap();

        let err = coord
            .apply_finalized_payment(&id, dec!(5), &pid("PV-1"), &clerk(), month("2025-01"))
            .unwrap_err();
        assert!(matches!(err, EngineError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(inner.read(&id).unwrap().unwrap().value, before);
        assert!(inner.history(&id).unwrap().is_empty());
    }

    #[test]
    fn invalid_config_rejected() {
        let config = EngineConfig {
            max_write_attempts: 0,
            ..EngineConfig::default()
        };
        assert!(BalanceUpdateCoordinator::new(InMemoryLedgerStore::new(), &config).is_err());
    }
}
