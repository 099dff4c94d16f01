//! # Identity Newtypes
//!
//! Identifier newtypes for budget lines, payments, and actors. Each is a
//! distinct type, so a [`PaymentId`] cannot be passed where a
//! [`BudgetLineId`] is expected.
//!
//! Identifiers originate in the surrounding document store and are opaque
//! strings. The only validation is that they are non-empty after trimming;
//! the stored form is the trimmed string.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Deserializes as a plain `String`, then routes through the type's `new()`
/// constructor so invalid values are rejected at deserialization time.
macro_rules! impl_validating_deserialize {
    ($ty:ident) => {
        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                Self::new(raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

fn non_empty(value: String, kind: &'static str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyIdentifier { kind });
    }
    if trimmed.len() == value.len() {
        Ok(value)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Identifier of a budget line (one allocation bucket of a budget period).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BudgetLineId(String);

impl BudgetLineId {
    /// Create a budget line identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyIdentifier`] for an empty string.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        non_empty(value.into(), "budget line id").map(Self)
    }

    /// Access the identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl_validating_deserialize!(BudgetLineId);

impl std::fmt::Display for BudgetLineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a finalized payment (payment voucher reference).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PaymentId(String);

impl PaymentId {
    /// Create a payment identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyIdentifier`] for an empty string.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        non_empty(value.into(), "payment id").map(Self)
    }

    /// Access the identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl_validating_deserialize!(PaymentId);

impl std::fmt::Display for PaymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The user or system principal responsible for a ledger mutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ActorId(String);

impl ActorId {
    /// Create an actor identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyIdentifier`] for an empty string.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        non_empty(value.into(), "actor id").map(Self)
    }

    /// The principal used for mutations the engine performs on its own
    /// behalf (scheduled month-boundary rollovers).
    pub fn system() -> Self {
        Self("system".to_string())
    }

    /// Access the identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl_validating_deserialize!(ActorId);

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_trimmed() {
        let id = BudgetLineId::new("  BL-001 ").unwrap();
        assert_eq!(id.as_str(), "BL-001");
        assert_eq!(PaymentId::new("PV-2024-17").unwrap().to_string(), "PV-2024-17");
    }

    #[test]
    fn empty_identifiers_rejected() {
        assert_eq!(
            PaymentId::new("   ").unwrap_err(),
            ValidationError::EmptyIdentifier { kind: "payment id" }
        );
        assert!(ActorId::new("").is_err());
        assert!(BudgetLineId::new("").is_err());
    }

    #[test]
    fn deserialize_rejects_empty() {
        let ok: PaymentId = serde_json::from_str("\"PV-1\"").unwrap();
        assert_eq!(ok.as_str(), "PV-1");
        assert!(serde_json::from_str::<PaymentId>("\"\"").is_err());
    }
}
