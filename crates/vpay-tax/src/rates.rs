//! # Rate Sets and Normalization
//!
//! A [`RateSet`] carries the four decimal rates the cascade consumes. Rates
//! arrive from rate tables and form input in two notations: fractions
//! (`0.06`) and percentages (`6`). [`normalize_rate`] maps both onto a
//! fraction in [0, 1]:
//!
//! 1. A value whose magnitude exceeds 1 is read as a percentage and divided
//!    by 100.
//! 2. A value still outside [0, 1] is rejected or clamped per [`RatePolicy`].
//!
//! Step 2 makes the mapping idempotent: every output lies in [0, 1], and
//! step 1 never fires on such a value.
//!
//! A missing rate deserializes as zero ("no tax of that kind applies").

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use vpay_core::{RatePolicy, ValidationError};

/// The four taxes and fees the cascade applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateKind {
    /// Withholding tax deducted at source.
    Withholding,
    /// Levy added to the base before VAT.
    Levy,
    /// Value-added tax on the levy-inclusive base.
    Vat,
    /// Fee charged for mobile-money disbursement.
    MobileMoney,
}

impl RateKind {
    /// Return the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Withholding => "withholding",
            Self::Levy => "levy",
            Self::Vat => "vat",
            Self::MobileMoney => "mobile_money",
        }
    }

    /// Return all rate kinds.
    pub fn all() -> &'static [RateKind] {
        &[Self::Withholding, Self::Levy, Self::Vat, Self::MobileMoney]
    }
}

impl std::fmt::Display for RateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize a single rate to a fraction in [0, 1].
///
/// # Errors
///
/// Under [`RatePolicy::Reject`], returns [`ValidationError::InvalidRate`]
/// when the value is negative or exceeds 100%.
pub fn normalize_rate(
    kind: RateKind,
    value: Decimal,
    policy: RatePolicy,
) -> Result<Decimal, ValidationError> {
    let fraction = if value.abs() > Decimal::ONE {
        value / Decimal::ONE_HUNDRED
    } else {
        value
    };

    if fraction >= Decimal::ZERO && fraction <= Decimal::ONE {
        return Ok(fraction);
    }

    match policy {
        RatePolicy::Reject => Err(ValidationError::InvalidRate {
            kind: kind.as_str(),
            value: fraction,
        }),
        RatePolicy::Clamp => {
            let clamped = fraction.clamp(Decimal::ZERO, Decimal::ONE);
            tracing::warn!(
                rate = %kind,
                original = %value,
                clamped = %clamped,
                "rate outside [0, 1] after normalization; clamped"
            );
            Ok(clamped)
        }
    }
}

/// The decimal rates in effect for one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RateSet {
    /// Withholding tax rate.
    pub withholding: Decimal,
    /// Levy rate.
    pub levy: Decimal,
    /// VAT rate.
    pub vat: Decimal,
    /// Mobile-money fee rate.
    pub mobile_money: Decimal,
}

impl RateSet {
    /// Construct a rate set from raw values (not yet normalized).
    pub fn new(withholding: Decimal, levy: Decimal, vat: Decimal, mobile_money: Decimal) -> Self {
        Self {
            withholding,
            levy,
            vat,
            mobile_money,
        }
    }

    /// A rate set where no tax or fee applies.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Build from optional values; absent rates become zero.
    pub fn from_optional(
        withholding: Option<Decimal>,
        levy: Option<Decimal>,
        vat: Option<Decimal>,
        mobile_money: Option<Decimal>,
    ) -> Self {
        Self::new(
            withholding.unwrap_or_default(),
            levy.unwrap_or_default(),
            vat.unwrap_or_default(),
            mobile_money.unwrap_or_default(),
        )
    }

    /// Return the rate of the given kind.
    pub fn get(&self, kind: RateKind) -> Decimal {
        match kind {
            RateKind::Withholding => self.withholding,
            RateKind::Levy => self.levy,
            RateKind::Vat => self.vat,
            RateKind::MobileMoney => self.mobile_money,
        }
    }

    /// Normalize every rate with [`normalize_rate`].
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError::InvalidRate`] encountered under
    /// [`RatePolicy::Reject`].
    pub fn normalized(&self, policy: RatePolicy) -> Result<Self, ValidationError> {
        Ok(Self {
            withholding: normalize_rate(RateKind::Withholding, self.withholding, policy)?,
            levy: normalize_rate(RateKind::Levy, self.levy, policy)?,
            vat: normalize_rate(RateKind::Vat, self.vat, policy)?,
            mobile_money: normalize_rate(RateKind::MobileMoney, self.mobile_money, policy)?,
        })
    }

    /// Whether every rate already lies in [0, 1].
    pub fn is_normalized(&self) -> bool {
        RateKind::all()
            .iter()
            .all(|k| (Decimal::ZERO..=Decimal::ONE).contains(&self.get(*k)))
    }
}
