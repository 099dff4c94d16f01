//! # Rate Resolution
//!
//! The [`RateResolver`] trait is the seam between the cascade and wherever
//! rates are administered. Its contract:
//!
//! - Every returned rate is a normalized fraction in [0, 1].
//! - Unknown categories or regimes yield zero rates, never an error.
//!
//! [`StaticRateTable`] is the in-process reference table. [`CachedRateResolver`]
//! memoizes any resolver in a cache owned by whoever constructs it; there is
//! no process-wide cache.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use rust_decimal::Decimal;
use vpay_core::{RatePolicy, ValidationError};

use crate::category::{ProcurementCategory, TaxRegime};
use crate::rates::{normalize_rate, RateKind, RateSet};

/// Supplies the rates in effect for a procurement category and tax regime.
pub trait RateResolver: Send + Sync {
    /// Resolve rates. Must return normalized rates; zero when unknown.
    fn resolve(&self, category: ProcurementCategory, regime: TaxRegime) -> RateSet;

    /// Resolve rates for a free-text category name. Names that do not
    /// resolve to a [`ProcurementCategory`] yield [`RateSet::zero`].
    fn resolve_named(&self, category: &str, regime: TaxRegime) -> RateSet {
        match ProcurementCategory::resolve(category) {
            Some((c, _)) => self.resolve(c, regime),
            None => {
                tracing::debug!(category, "unrecognized procurement category; zero rates");
                RateSet::zero()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Static Rate Table
// ---------------------------------------------------------------------------

/// Levy and VAT rates for one regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RegimeRates {
    levy: Decimal,
    vat: Decimal,
}

/// An in-memory rate table.
///
/// Withholding depends on the procurement category; levy and VAT depend on
/// the tax regime; the mobile-money fee is flat. All setters normalize
/// their input, so percentage notation (`7.5`) is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StaticRateTable {
    withholding: BTreeMap<ProcurementCategory, Decimal>,
    regimes: HashMap<TaxRegime, RegimeRates>,
    mobile_money: Decimal,
}

impl StaticRateTable {
    /// Create an empty table (every lookup yields zero rates).
    pub fn new() -> Self {
        Self::default()
    }

    /// The reference deployment's table.
    ///
    /// | Category | Withholding |
    /// |---|---|
    /// | Goods | 3% |
    /// | Works | 5% |
    /// | Services | 7.5% |
    /// | Consultancy | 7.5% |
    /// | Rent | 8% |
    ///
    /// Standard regime: 6% levy, 15% VAT. Flat-rate regime: no levy, 3% VAT.
    /// Exempt: neither. Mobile-money fee: 1%.
    pub fn reference() -> Self {
        let mut table = Self::new();
        table.withholding = BTreeMap::from([
            (ProcurementCategory::Goods, Decimal::new(3, 2)),
            (ProcurementCategory::Works, Decimal::new(5, 2)),
            (ProcurementCategory::Services, Decimal::new(75, 3)),
            (ProcurementCategory::Consultancy, Decimal::new(75, 3)),
            (ProcurementCategory::Rent, Decimal::new(8, 2)),
        ]);
        table.regimes = HashMap::from([
            (
                TaxRegime::Standard,
                RegimeRates {
                    levy: Decimal::new(6, 2),
                    vat: Decimal::new(15, 2),
                },
            ),
            (
                TaxRegime::FlatRate,
                RegimeRates {
                    levy: Decimal::ZERO,
                    vat: Decimal::new(3, 2),
                },
            ),
            (
                TaxRegime::Exempt,
                RegimeRates {
                    levy: Decimal::ZERO,
                    vat: Decimal::ZERO,
                },
            ),
        ]);
        table.mobile_money = Decimal::new(1, 2);
        table
    }

    /// Builder: set the withholding rate for a category.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidRate`] for a rate outside [0, 100%].
    pub fn with_withholding(
        mut self,
        category: ProcurementCategory,
        rate: Decimal,
    ) -> Result<Self, ValidationError> {
        let rate = normalize_rate(RateKind::Withholding, rate, RatePolicy::Reject)?;
        self.withholding.insert(category, rate);
        Ok(self)
    }

    /// Builder: set the levy and VAT rates for a regime.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidRate`] for a rate outside [0, 100%].
    pub fn with_regime(
        mut self,
        regime: TaxRegime,
        levy: Decimal,
        vat: Decimal,
    ) -> Result<Self, ValidationError> {
        let levy = normalize_rate(RateKind::Levy, levy, RatePolicy::Reject)?;
        let vat = normalize_rate(RateKind::Vat, vat, RatePolicy::Reject)?;
        self.regimes.insert(regime, RegimeRates { levy, vat });
        Ok(self)
    }

    /// Builder: set the mobile-money fee rate.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidRate`] for a rate outside [0, 100%].
    pub fn with_mobile_money(mut self, rate: Decimal) -> Result<Self, ValidationError> {
        self.mobile_money = normalize_rate(RateKind::MobileMoney, rate, RatePolicy::Reject)?;
        Ok(self)
    }
}

impl RateResolver for StaticRateTable {
    fn resolve(&self, category: ProcurementCategory, regime: TaxRegime) -> RateSet {
        let regime_rates = self.regimes.get(&regime).copied().unwrap_or(RegimeRates {
            levy: Decimal::ZERO,
            vat: Decimal::ZERO,
        });
        RateSet {
            withholding: self.withholding.get(&category).copied().unwrap_or_default(),
            levy: regime_rates.levy,
            vat: regime_rates.vat,
            mobile_money: self.mobile_money,
        }
    }
}

// ---------------------------------------------------------------------------
// Cached Resolver
// ---------------------------------------------------------------------------

/// Memoizing wrapper around another resolver.
///
/// The cache lives exactly as long as this value. Share it across threads
/// with `Arc<CachedRateResolver<_>>`; call [`clear`](Self::clear) when the
/// underlying rates change.
#[derive(Debug)]
pub struct CachedRateResolver<R> {
    inner: R,
    cache: RwLock<HashMap<(ProcurementCategory, TaxRegime), RateSet>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<R: RateResolver> CachedRateResolver<R> {
    /// Wrap a resolver with an empty cache.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        self.cache.write().clear();
    }

    /// Number of cached (category, regime) pairs.
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lookups served from the cache.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Lookups delegated to the inner resolver.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Access the wrapped resolver.
    pub fn inner(&self) -> &R {
        &self.inner
    }
}

impl<R: RateResolver> RateResolver for CachedRateResolver<R> {
    fn resolve(&self, category: ProcurementCategory, regime: TaxRegime) -> RateSet {
        if let Some(rates) = self.cache.read().get(&(category, regime)) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return *rates;
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let rates = self.inner.resolve(category, regime);
        tracing::debug!(%category, %regime, "rate cache miss");
        self.cache.write().insert((category, regime), rates);
        rates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn reference_table_rates() {
        let table = StaticRateTable::reference();
        let rates = table.resolve(ProcurementCategory::Services, TaxRegime::Standard);
        assert_eq!(rates, RateSet::new(dec!(0.075), dec!(0.06), dec!(0.15), dec!(0.01)));

        let flat = table.resolve(ProcurementCategory::Goods, TaxRegime::FlatRate);
        assert_eq!(flat.withholding, dec!(0.03));
        assert_eq!(flat.levy, Decimal::ZERO);
        assert_eq!(flat.vat, dec!(0.03));

        let exempt = table.resolve(ProcurementCategory::Works, TaxRegime::Exempt);
        assert_eq!(exempt.levy + exempt.vat, Decimal::ZERO);
        assert_eq!(exempt.withholding, dec!(0.05));
    }

    #[test]
    fn reference_table_is_normalized() {
        let table = StaticRateTable::reference();
        for c in ProcurementCategory::all() {
            for r in TaxRegime::all() {
                assert!(table.resolve(*c, *r).is_normalized());
            }
        }
    }

    #[test]
    fn empty_table_yields_zero() {
        let table = StaticRateTable::new();
        assert_eq!(
            table.resolve(ProcurementCategory::Rent, TaxRegime::Standard),
            RateSet::zero()
        );
    }

    #[test]
    fn builders_normalize_percentages() {
        let table = StaticRateTable::new()
            .with_withholding(ProcurementCategory::Goods, dec!(3))
            .unwrap()
            .with_regime(TaxRegime::Standard, dec!(6), dec!(15))
            .unwrap();
        let rates = table.resolve(ProcurementCategory::Goods, TaxRegime::Standard);
        assert_eq!(rates.withholding, dec!(0.03));
        assert_eq!(rates.levy, dec!(0.06));
        assert_eq!(rates.vat, dec!(0.15));
        assert!(StaticRateTable::new().with_mobile_money(dec!(-1)).is_err());
    }

    #[test]
    fn resolve_named_uses_alias_table_and_zero_fallback() {
        let table = StaticRateTable::reference();
        assert_eq!(
            table.resolve_named("Service", TaxRegime::Standard).withholding,
            dec!(0.075)
        );
        assert_eq!(table.resolve_named("catering", TaxRegime::Standard), RateSet::zero());
    }

    #[test]
    fn cache_counts_hits_and_misses() {
        let cached = CachedRateResolver::new(StaticRateTable::reference());
        let a = cached.resolve(ProcurementCategory::Goods, TaxRegime::Standard);
        let b = cached.resolve(ProcurementCategory::Goods, TaxRegime::Standard);
        assert_eq!(a, b);
        assert_eq!(cached.misses(), 1);
        assert_eq!(cached.hits(), 1);
        assert_eq!(cached.len(), 1);

        cached.clear();
        assert!(cached.is_empty());
        cached.resolve(ProcurementCategory::Goods, TaxRegime::Standard);
        assert_eq!(cached.misses(), 2);
    }
}
