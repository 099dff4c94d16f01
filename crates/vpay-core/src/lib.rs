#![deny(missing_docs)]

//! # vpay-core — Foundational Types for the Payment Engine
//!
//! Leaf crate of the workspace. Defines the primitives every other crate
//! builds on and depends on nothing internal.
//!
//! ## Contents
//!
//! - **Identifiers** (`identity.rs`): [`BudgetLineId`], [`PaymentId`],
//!   [`ActorId`]. Opaque non-empty strings issued by the document store.
//! - **Currencies** (`currency.rs`): [`CurrencyCode`], three letters,
//!   uppercase, historical codes allowed.
//! - **Months** (`temporal.rs`): [`MonthKey`] in `YYYY-MM` form with
//!   chronological ordering and month arithmetic.
//! - **Errors** (`error.rs`): [`ValidationError`] and [`EngineError`].
//! - **Configuration** (`config.rs`): [`EngineConfig`], YAML-loadable.
//!
//! ## Crate Policy
//!
//! - Money and rates are `rust_decimal::Decimal`, never binary floats.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod config;
pub mod currency;
pub mod error;
pub mod identity;
pub mod temporal;

pub use config::{EngineConfig, RatePolicy};
pub use currency::CurrencyCode;
pub use error::{EngineError, EngineResult, ValidationError};
pub use identity::{ActorId, BudgetLineId, PaymentId};
pub use temporal::MonthKey;
