//! # Engine Configuration
//!
//! Policy knobs shared by the tax cascade and the budget ledger. Defaults
//! match the reference deployment (cedi domestic currency, USD reporting).
//! Deployments override them with a YAML document:
//!
//! ```yaml
//! reporting_currency: USD
//! withholding_currencies: [GHS, GHC]
//! underspend_threshold: "0.8"
//! max_write_attempts: 3
//! rate_policy: reject
//! ```
//!
//! Omitted fields keep their defaults.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::currency::CurrencyCode;
use crate::error::ValidationError;

/// How out-of-range tax rates are treated after percentage normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatePolicy {
    /// Reject the rate with [`ValidationError::InvalidRate`].
    #[default]
    Reject,
    /// Clamp the rate into [0, 1] and log a warning.
    Clamp,
}

impl RatePolicy {
    /// Return the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reject => "reject",
            Self::Clamp => "clamp",
        }
    }
}

impl std::fmt::Display for RatePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine-wide configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Currency every budget impact is normalized into.
    pub reporting_currency: CurrencyCode,
    /// Currencies in which withholding tax applies. Any other currency
    /// withholds nothing regardless of rate.
    pub withholding_currencies: Vec<CurrencyCode>,
    /// Fraction of the allocation above which a positive balance classifies
    /// a month as underspent.
    pub underspend_threshold: Decimal,
    /// Upper bound on optimistic write attempts for one ledger mutation.
    pub max_write_attempts: u32,
    /// Treatment of rates outside [0, 1].
    pub rate_policy: RatePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reporting_currency: CurrencyCode::known("USD"),
            withholding_currencies: vec![CurrencyCode::known("GHS"), CurrencyCode::known("GHC")],
            underspend_threshold: Decimal::new(8, 1),
            max_write_attempts: 3,
            rate_policy: RatePolicy::Reject,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a YAML configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidConfig`] if the document does not
    /// parse or a value is out of range.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ValidationError> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| ValidationError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidConfig`] describing the first
    /// violated constraint.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_write_attempts == 0 {
            return Err(ValidationError::InvalidConfig(
                "max_write_attempts must be at least 1".into(),
            ));
        }
        if self.underspend_threshold < Decimal::ZERO || self.underspend_threshold > Decimal::ONE {
            return Err(ValidationError::InvalidConfig(format!(
                "underspend_threshold must lie in [0, 1], got {}",
                self.underspend_threshold
            )));
        }
        Ok(())
    }

    /// Whether withholding applies to amounts in `currency`.
    pub fn withholds_in(&self, currency: &CurrencyCode) -> bool {
        self.withholding_currencies.contains(currency)
    }

    /// Whether `currency` is the reporting currency (no FX conversion).
    pub fn is_reporting_currency(&self, currency: &CurrencyCode) -> bool {
        &self.reporting_currency == currency
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn defaults_match_reference_deployment() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.reporting_currency.as_str(), "USD");
        assert!(cfg.withholds_in(&CurrencyCode::new("GHS").unwrap()));
        assert!(cfg.withholds_in(&CurrencyCode::new("GHC").unwrap()));
        assert!(!cfg.withholds_in(&CurrencyCode::new("USD").unwrap()));
        assert_eq!(cfg.underspend_threshold, dec!(0.8));
        assert_eq!(cfg.max_write_attempts, 3);
        assert_eq!(cfg.rate_policy, RatePolicy::Reject);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn yaml_overrides_selected_fields() {
        let cfg = EngineConfig::from_yaml_str(
            "reporting_currency: eur\nmax_write_attempts: 5\nrate_policy: clamp\n",
        )
        .unwrap();
        assert_eq!(cfg.reporting_currency.as_str(), "EUR");
        assert_eq!(cfg.max_write_attempts, 5);
        assert_eq!(cfg.rate_policy, RatePolicy::Clamp);
        assert_eq!(cfg.withholding_currencies.len(), 2);
    }

    #[test]
    fn yaml_threshold_as_string() {
        let cfg = EngineConfig::from_yaml_str("underspend_threshold: \"0.75\"\n").unwrap();
        assert_eq!(cfg.underspend_threshold, dec!(0.75));
    }

    #[test]
    fn yaml_rejects_zero_attempts() {
        let err = EngineConfig::from_yaml_str("max_write_attempts: 0\n").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidConfig(_)));
    }

    #[test]
    fn yaml_rejects_unknown_fields_and_bad_currency() {
        assert!(EngineConfig::from_yaml_str("reporting_ccy: USD\n").is_err());
        assert!(EngineConfig::from_yaml_str("reporting_currency: DOLLARS\n").is_err());
    }
}
