//! # Partial-Payment Proration
//!
//! A partial payment settles a percentage of an invoice. The pre-tax base is
//! prorated first and the full cascade is re-run on it. Scaling the output
//! of a full cascade is not equivalent: the withholding base may be an
//! absolute service-charge override, which proration leaves untouched.

use rust_decimal::Decimal;
use vpay_core::{EngineResult, ValidationError};

use crate::cascade::{checked_mul, TaxCascadeCalculator, TaxCascadeResult, TransactionInput};
use crate::rates::RateSet;

/// Runs the cascade on a prorated pre-tax base.
#[derive(Debug, Clone, Default)]
pub struct PartialPaymentProrator {
    calculator: TaxCascadeCalculator,
}

impl PartialPaymentProrator {
    /// Wrap a calculator.
    pub fn new(calculator: TaxCascadeCalculator) -> Self {
        Self { calculator }
    }

    /// The wrapped calculator.
    pub fn calculator(&self) -> &TaxCascadeCalculator {
        &self.calculator
    }

    /// Compute the cascade for `percentage` (in (0, 100]) of the invoice.
    ///
    /// At exactly 100 the input is passed through unchanged, so the result
    /// is identical to [`TaxCascadeCalculator::compute_cascade`].
    ///
    /// # Errors
    ///
    /// Returns [`vpay_core::EngineError::InvalidInput`] wrapping
    /// [`ValidationError::InvalidPercentage`] when `percentage` is not in
    /// (0, 100], [`ValidationError::AmountOverflow`] when the prorated base
    /// leaves the decimal range, plus any error the cascade itself raises.
    pub fn compute_partial(
        &self,
        input: &TransactionInput,
        percentage: Decimal,
        rates: &RateSet,
    ) -> EngineResult<TaxCascadeResult> {
        if percentage <= Decimal::ZERO || percentage > Decimal::ONE_HUNDRED {
            return Err(ValidationError::InvalidPercentage(percentage).into());
        }
        if percentage == Decimal::ONE_HUNDRED {
            return self.calculator.compute_cascade(input, rates);
        }

        let base = checked_mul(input.pre_tax_amount, percentage, "prorated base")?
            .checked_div(Decimal::ONE_HUNDRED)
            .ok_or(ValidationError::AmountOverflow { step: "prorated base" })?;
        let prorated = input.clone().with_pre_tax_amount(base);
        tracing::debug!(
            pre_tax = %input.pre_tax_amount,
            %percentage,
            prorated_base = %base,
            "prorating partial payment"
        );
        self.calculator.compute_cascade(&prorated, rates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use vpay_core::{CurrencyCode, EngineError};

    fn input() -> TransactionInput {
        TransactionInput::new(dec!(1000), CurrencyCode::new("GHS").unwrap()).with_fx_rate(dec!(10))
    }

    fn rates() -> RateSet {
        RateSet::new(dec!(0.075), dec!(0.06), dec!(0.15), Decimal::ZERO)
    }

    #[test]
    fn full_percentage_equals_cascade() {
        let prorator = PartialPaymentProrator::default();
        let partial = prorator.compute_partial(&input(), dec!(100), &rates()).unwrap();
        let full = prorator.calculator().compute_cascade(&input(), &rates()).unwrap();
        assert_eq!(partial, full);
    }

    #[test]
    fn half_payment_recomputes_levy_inclusive_vat() {
        let prorator = PartialPaymentProrator::default();
        let r = prorator.compute_partial(&input(), dec!(50), &rates()).unwrap();
        assert_eq!(r.pre_tax_amount, dec!(500));
        assert_eq!(r.levy_amount, dec!(30));
        assert_eq!(r.vat_amount, dec!(79.5));
        assert_eq!(r.gross_amount, dec!(609.5));
    }

    #[test]
    fn override_is_not_prorated() {
        let prorator = PartialPaymentProrator::default();
        let with_override = input().with_service_charge_override(dec!(400));
        let r = prorator.compute_partial(&with_override, dec!(37), &rates()).unwrap();
        assert_eq!(r.gross_amount, dec!(451.03));
        assert_eq!(r.withholding_amount, dec!(30));
        assert_eq!(r.net_payable_to_supplier, dec!(421.03));

        let full = prorator
            .calculator()
            .compute_cascade(&with_override, &rates())
            .unwrap();
        assert_ne!(
            r.net_payable_to_supplier,
            full.net_payable_to_supplier * dec!(0.37)
        );
    }

    #[test]
    fn out_of_range_percentages_rejected() {
        let prorator = PartialPaymentProrator::default();
        for pct in [dec!(0), dec!(-5), dec!(100.01)] {
            let err = prorator.compute_partial(&input(), pct, &rates()).unwrap_err();
            assert!(matches!(
                err,
                EngineError::InvalidInput(ValidationError::InvalidPercentage(p)) if p == pct
            ));
        }
    }

    #[test]
    fn oversized_base_is_an_error_not_a_panic() {
        let huge = TransactionInput::new(Decimal::MAX, CurrencyCode::new("USD").unwrap());
        let err = PartialPaymentProrator::default()
            .compute_partial(&huge, dec!(99.5), &RateSet::zero())
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidInput(ValidationError::AmountOverflow { step: "prorated base" })
        ));
    }
}
