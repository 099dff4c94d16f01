#![deny(missing_docs)]

//! # vpay-tax — Tax Cascade for Vendor Payments
//!
//! Turns a pre-tax invoice amount into the supplier's net payable and the
//! payment's budget impact in the reporting currency.
//!
//! ## Pipeline
//!
//! ```text
//! category name ──► ProcurementCategory ──► RateResolver ──► RateSet
//!                                                              │
//! TransactionInput ─────────────────────────────────────────────┤
//!                                                              ▼
//!                  PartialPaymentProrator ──► TaxCascadeCalculator ──► TaxCascadeResult
//! ```
//!
//! Everything here is pure computation. [`CachedRateResolver`] is the only
//! type with interior state, and its cache belongs to whoever built it.

pub mod cascade;
pub mod category;
pub mod prorate;
pub mod rates;
pub mod resolver;

pub use cascade::{TaxCascadeCalculator, TaxCascadeResult, TransactionInput};
pub use category::{CategoryMatch, PaymentChannel, ProcurementCategory, TaxRegime};
pub use prorate::PartialPaymentProrator;
pub use rates::{normalize_rate, RateKind, RateSet};
pub use resolver::{CachedRateResolver, RateResolver, StaticRateTable};
