//! # Currency Codes
//!
//! ISO 4217-style three-letter currency codes, stored uppercase. Historical
//! codes that are no longer in ISO 4217 (e.g. `GHC`, the pre-redenomination
//! cedi) are accepted: invoices captured before a redenomination still carry
//! them.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A three-letter currency code, normalized to uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Parse a currency code. Surrounding whitespace is ignored and the
    /// code is uppercased.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidCurrencyCode`] unless the input is
    /// exactly three ASCII letters.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = value.into();
        let code = raw.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::InvalidCurrencyCode(raw));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    /// Wrap a code literal known to be three uppercase ASCII letters.
    pub(crate) fn known(code: &'static str) -> Self {
        debug_assert!(code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase()));
        Self(code.to_string())
    }

    /// Access the code string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for CurrencyCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(CurrencyCode::new(" ghs ").unwrap().as_str(), "GHS");
        assert_eq!("usd".parse::<CurrencyCode>().unwrap().as_str(), "USD");
    }

    #[test]
    fn rejects_malformed_codes() {
        for bad in ["", "US", "USDT", "U$D", "12A"] {
            assert!(CurrencyCode::new(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn serde_uses_plain_string() {
        let code = CurrencyCode::new("GHC").unwrap();
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"GHC\"");
        let back: CurrencyCode = serde_json::from_str("\"ghc\"").unwrap();
        assert_eq!(back, code);
    }
}
