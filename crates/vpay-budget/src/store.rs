//! # Ledger Persistence
//!
//! The coordinator reaches storage only through [`LedgerStore`]. A store
//! keeps one versioned [`BudgetLine`] per identifier and a separate
//! append-only history log per line. A write names the version it was
//! computed from; if the stored version has moved on, nothing is written
//! and [`WriteOutcome::Conflict`] is returned. The line and its history
//! records are committed together or not at all.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use vpay_core::{BudgetLineId, EngineError};

use crate::history::BalanceHistoryRecord;
use crate::line::BudgetLine;

/// A value together with its store version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    /// Store version, starting at 1 and bumped on every write.
    pub version: u64,
    /// The stored value.
    pub value: T,
}

/// Result of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Committed; the line now has `version`.
    Written {
        /// Version after the write.
        version: u64,
    },
    /// The stored version no longer matches; nothing was written.
    Conflict {
        /// Version currently stored.
        current_version: u64,
    },
}

/// Storage failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Insert of an identifier that is already stored.
    #[error("budget line {0} already exists")]
    AlreadyExists(String),

    /// Write to an identifier that was never inserted.
    #[error("budget line {0} does not exist")]
    Missing(String),

    /// Backend-specific failure.
    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Missing(id) => EngineError::BudgetLineNotFound(id),
            other => EngineError::Store(other.to_string()),
        }
    }
}

/// Synchronous read/write capability over budget lines and their history.
pub trait LedgerStore: Send + Sync {
    /// Read a line and its current version.
    fn read(&self, id: &BudgetLineId) -> Result<Option<Versioned<BudgetLine>>, StoreError>;

    /// Replace the line and append `history` if the stored version equals
    /// `expected_version`.
    fn write(
        &self,
        id: &BudgetLineId,
        line: &BudgetLine,
        expected_version: u64,
        history: &[BalanceHistoryRecord],
    ) -> Result<WriteOutcome, StoreError>;

    /// The line's history log in append order.
    fn history(&self, id: &BudgetLineId) -> Result<Vec<BalanceHistoryRecord>, StoreError>;

    /// Store a newly configured line at version 1.
    fn insert(&self, line: BudgetLine) -> Result<u64, StoreError>;
}

impl<S: LedgerStore + ?Sized> LedgerStore for Arc<S> {
    fn read(&self, id: &BudgetLineId) -> Result<Option<Versioned<BudgetLine>>, StoreError> {
        (**self).read(id)
    }

    fn write(
        &self,
        id: &BudgetLineId,
        line: &BudgetLine,
        expected_version: u64,
        history: &[BalanceHistoryRecord],
    ) -> Result<WriteOutcome, StoreError> {
        (**self).write(id, line, expected_version, history)
    }

    fn history(&self, id: &BudgetLineId) -> Result<Vec<BalanceHistoryRecord>, StoreError> {
        (**self).history(id)
    }

    fn insert(&self, line: BudgetLine) -> Result<u64, StoreError> {
        (**self).insert(line)
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Tables {
    lines: HashMap<BudgetLineId, Versioned<BudgetLine>>,
    history: HashMap<BudgetLineId, Vec<BalanceHistoryRecord>>,
}

/// Thread-safe, cloneable in-memory [`LedgerStore`].
///
/// Clones share the same tables. Lines and history sit behind one
/// `parking_lot::RwLock`, so a write commits both under a single guard.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryLedgerStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored lines.
    pub fn len(&self) -> usize {
        self.tables.read().lines.len()
    }

    /// Whether no lines are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identifiers of every stored line.
    pub fn ids(&self) -> Vec<BudgetLineId> {
        let mut ids: Vec<_> = self.tables.read().lines.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn read(&self, id: &BudgetLineId) -> Result<Option<Versioned<BudgetLine>>, StoreError> {
        Ok(self.tables.read().lines.get(id).cloned())
    }

    fn write(
        &self,
        id: &BudgetLineId,
        line: &BudgetLine,
        expected_version: u64,
        history: &[BalanceHistoryRecord],
    ) -> Result<WriteOutcome, StoreError> {
        let mut tables = self.tables.write();
        let stored = tables
            .lines
            .get_mut(id)
            .ok_or_else(|| StoreError::Missing(id.to_string()))?;
        if stored.version != expected_version {
            return Ok(WriteOutcome::Conflict {
                current_version: stored.version,
            });
        }
        stored.version += 1;
        stored.value = line.clone();
        let version = stored.version;
        tables
            .history
            .entry(id.clone())
            .or_default()
            .extend_from_slice(history);
        Ok(WriteOutcome::Written { version })
    }

    fn history(&self, id: &BudgetLineId) -> Result<Vec<BalanceHistoryRecord>, StoreError> {
        Ok(self
            .tables
            .read()
            .history
            .get(id)
            .cloned()
            .unwrap_or_default())
    }

    fn insert(&self, line: BudgetLine) -> Result<u64, StoreError> {
        let mut tables = self.tables.write();
        if tables.lines.contains_key(&line.id) {
            return Err(StoreError::AlreadyExists(line.id.to_string()));
        }
        tables
            .lines
            .insert(line.id.clone(), Versioned { version: 1, value: line });
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use vpay_core::{ActorId, MonthKey, PaymentId};

    fn line(id: &str) -> BudgetLine {
        BudgetLine::new(
            BudgetLineId::new(id).unwrap(),
            "Fuel",
            MonthKey::parse("2025-01").unwrap(),
            vec![dec!(10); 12],
        )
        .unwrap()
    }

    fn record(line: &BudgetLine) -> BalanceHistoryRecord {
        BalanceHistoryRecord::payment(
            line.id.clone(),
            PaymentId::new("PV-1").unwrap(),
            line.period_start,
            dec!(5),
            dec!(120),
            ActorId::system(),
        )
    }

    #[test]
    fn insert_then_read() {
        let store = InMemoryLedgerStore::new();
        let l = line("BL-1");
        assert_eq!(store.insert(l.clone()).unwrap(), 1);
        let read = store.read(&l.id).unwrap().unwrap();
        assert_eq!(read.version, 1);
        assert_eq!(read.value, l);
        assert!(store.read(&BudgetLineId::new("BL-X").unwrap()).unwrap().is_none());
    }

    #[test]
    fn duplicate_insert_rejected() {
        let store = InMemoryLedgerStore::new();
        store.insert(line("BL-1")).unwrap();
        assert_eq!(
            store.insert(line("BL-1")).unwrap_err(),
            StoreError::AlreadyExists("BL-1".into())
        );
    }

    #[test]
    fn versioned_write_and_conflict() {
        let store = InMemoryLedgerStore::new();
        let l = line("BL-1");
        store.insert(l.clone()).unwrap();

        let rec = record(&l);
        assert_eq!(
            store.write(&l.id, &l, 1, std::slice::from_ref(&rec)).unwrap(),
            WriteOutcome::Written { version: 2 }
        );
        assert_eq!(
            store.write(&l.id, &l, 1, std::slice::from_ref(&rec)).unwrap(),
            WriteOutcome::Conflict { current_version: 2 }
        );
        // The conflicting write appended nothing.
        assert_eq!(store.history(&l.id).unwrap(), vec![rec]);
    }

    #[test]
    fn write_to_missing_line_maps_to_not_found() {
        let store = InMemoryLedgerStore::new();
        let l = line("BL-9");
        let err = store.write(&l.id, &l, 1, &[]).unwrap_err();
        assert!(matches!(
            EngineError::from(err),
            EngineError::BudgetLineNotFound(id) if id == "BL-9"
        ));
    }

    #[test]
    fn clones_share_tables() {
        let a = InMemoryLedgerStore::new();
        let b = a.clone();
        a.insert(line("BL-1")).unwrap();
        a.insert(line("BL-0")).unwrap();
        assert_eq!(b.len(), 2);
        assert_eq!(b.ids()[0].as_str(), "BL-0");
    }
}
