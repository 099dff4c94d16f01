//! Shared fixtures for the cross-crate tests.

#![allow(dead_code)]

use std::sync::Once;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use vpay_budget::{BalanceUpdateCoordinator, BudgetLine, InMemoryLedgerStore};
use vpay_core::{ActorId, BudgetLineId, CurrencyCode, EngineConfig, MonthKey, PaymentId};

static TRACING: Once = Once::new();

/// Route engine logs to the test harness. `RUST_LOG` selects the level.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn month(s: &str) -> MonthKey {
    MonthKey::parse(s).unwrap()
}

pub fn currency(s: &str) -> CurrencyCode {
    CurrencyCode::new(s).unwrap()
}

pub fn pid(s: &str) -> PaymentId {
    PaymentId::new(s).unwrap()
}

pub fn clerk() -> ActorId {
    ActorId::new("accounts-clerk").unwrap()
}

/// A line starting January 2025 with the same allocation every month.
pub fn flat_line(id: &str, monthly: Decimal) -> BudgetLine {
    BudgetLine::new(
        BudgetLineId::new(id).unwrap(),
        format!("{id} line"),
        month("2025-01"),
        vec![monthly; 12],
    )
    .unwrap()
}

/// A coordinator over a fresh in-memory store with one registered line.
pub fn coordinator_with_line(
    config: &EngineConfig,
) -> (BalanceUpdateCoordinator<InMemoryLedgerStore>, BudgetLineId) {
    init_tracing();
    let coordinator = BalanceUpdateCoordinator::new(InMemoryLedgerStore::new(), config).unwrap();
    let line = flat_line("BL-2025-OPS", dec!(1000));
    let id = line.id.clone();
    coordinator.register_line(line).unwrap();
    (coordinator, id)
}
