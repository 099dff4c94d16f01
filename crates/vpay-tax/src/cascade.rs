//! # Tax Cascade
//!
//! Converts a pre-tax invoice amount into the supplier's net payable and the
//! transaction's impact on the budget. Evaluation order is fixed; changing it
//! changes the result:
//!
//! ```text
//! levy        = pre_tax × levy_rate
//! vat         = (pre_tax + levy) × vat_rate          if vat_applicable, else 0
//! gross       = pre_tax + levy + vat
//! withholding = wht_base × wht_rate                  if currency withholds, else 0
//!               (wht_base = service-charge override when > 0, else pre_tax)
//! net         = gross − withholding
//! momo_fee    = net × mobile_money_rate              if channel is mobile money, else 0
//! final       = net + momo_fee
//! impact      = final                                if currency is the reporting currency
//!             = final ÷ fx_rate                      otherwise
//! ```
//!
//! The service-charge override narrows the withholding base only. Levy,
//! VAT, and every later step still run on the full pre-tax amount. This
//! asymmetry is kept as-is pending product sign-off.
//!
//! The calculator is pure: no I/O, no shared mutable state, safe to call
//! from any number of threads. Amounts carry full decimal precision;
//! [`TaxCascadeResult::rounded`] produces a display copy.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use vpay_core::{CurrencyCode, EngineConfig, EngineResult, ValidationError};

use crate::category::{PaymentChannel, ProcurementCategory, TaxRegime};
use crate::rates::RateSet;

// ---------------------------------------------------------------------------
// Transaction Input
// ---------------------------------------------------------------------------

/// A payment draft as captured by the form layer.
///
/// Constructed fresh for each calculation and not mutated while a cascade
/// runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInput {
    /// Invoice amount before any tax.
    pub pre_tax_amount: Decimal,
    /// Kind of supply; determines the withholding rate.
    pub procurement_category: ProcurementCategory,
    /// Supplier's VAT regime; determines levy and VAT rates.
    pub tax_regime: TaxRegime,
    /// Whether VAT is charged on this invoice.
    pub vat_applicable: bool,
    /// Disbursement channel.
    pub payment_channel: PaymentChannel,
    /// Invoice currency.
    pub currency: CurrencyCode,
    /// Units of invoice currency per unit of reporting currency.
    pub fx_rate_to_reporting: Decimal,
    /// When positive, replaces the pre-tax amount as the withholding base.
    #[serde(default)]
    pub service_charge_override: Option<Decimal>,
}

impl TransactionInput {
    /// Create an input with defaults: services, standard regime, VAT
    /// applicable, bank transfer, FX rate 1, no override.
    pub fn new(pre_tax_amount: Decimal, currency: CurrencyCode) -> Self {
        Self {
            pre_tax_amount,
            procurement_category: ProcurementCategory::Services,
            tax_regime: TaxRegime::Standard,
            vat_applicable: true,
            payment_channel: PaymentChannel::BankTransfer,
            currency,
            fx_rate_to_reporting: Decimal::ONE,
            service_charge_override: None,
        }
    }

    /// Builder: set the procurement category.
    pub fn with_category(mut self, category: ProcurementCategory) -> Self {
        self.procurement_category = category;
        self
    }

    /// Builder: set the tax regime.
    pub fn with_regime(mut self, regime: TaxRegime) -> Self {
        self.tax_regime = regime;
        self
    }

    /// Builder: set whether VAT applies.
    pub fn with_vat(mut self, applicable: bool) -> Self {
        self.vat_applicable = applicable;
        self
    }

    /// Builder: set the payment channel.
    pub fn with_channel(mut self, channel: PaymentChannel) -> Self {
        self.payment_channel = channel;
        self
    }

    /// Builder: set the FX rate to the reporting currency.
    pub fn with_fx_rate(mut self, rate: Decimal) -> Self {
        self.fx_rate_to_reporting = rate;
        self
    }

    /// Builder: set the service-charge override.
    pub fn with_service_charge_override(mut self, amount: Decimal) -> Self {
        self.service_charge_override = Some(amount);
        self
    }

    /// Builder: replace the pre-tax amount, keeping every other field.
    pub fn with_pre_tax_amount(mut self, amount: Decimal) -> Self {
        self.pre_tax_amount = amount;
        self
    }

    /// Check field contracts that apply to a non-zero cascade.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::NegativeAmount`] for a negative service-charge override.
    /// - [`ValidationError::InvalidFxRate`] for a non-positive FX rate when the
    ///   currency is not the reporting currency.
    pub fn validate(&self, config: &EngineConfig) -> Result<(), ValidationError> {
        if let Some(sc) = self.service_charge_override {
            if sc < Decimal::ZERO {
                return Err(ValidationError::NegativeAmount {
                    field: "service_charge_override",
                    value: sc,
                });
            }
        }
        if !config.is_reporting_currency(&self.currency) && self.fx_rate_to_reporting <= Decimal::ZERO
        {
            return Err(ValidationError::InvalidFxRate(self.fx_rate_to_reporting));
        }
        Ok(())
    }

    /// The amount withholding is computed on.
    pub fn withholding_base(&self) -> Decimal {
        match self.service_charge_override {
            Some(sc) if sc > Decimal::ZERO => sc,
            _ => self.pre_tax_amount,
        }
    }
}

// ---------------------------------------------------------------------------
// Cascade Result
// ---------------------------------------------------------------------------

/// Output of one cascade evaluation.
///
/// Identities (exact before rounding):
/// - `gross_amount == pre_tax_amount + levy_amount + vat_amount`
/// - `net_payable_to_supplier == gross_amount - withholding_amount`
/// - `final_net_payable == net_payable_to_supplier + mobile_money_fee`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxCascadeResult {
    /// Pre-tax base the cascade ran on.
    pub pre_tax_amount: Decimal,
    /// Base the withholding rate was applied to.
    pub withholding_base: Decimal,
    /// Levy.
    pub levy_amount: Decimal,
    /// VAT on the levy-inclusive base.
    pub vat_amount: Decimal,
    /// Pre-tax amount plus levy and VAT.
    pub gross_amount: Decimal,
    /// Withholding tax deducted at source.
    pub withholding_amount: Decimal,
    /// Gross minus withholding.
    pub net_payable_to_supplier: Decimal,
    /// Mobile-money disbursement fee.
    pub mobile_money_fee: Decimal,
    /// Net payable plus mobile-money fee.
    pub final_net_payable: Decimal,
    /// Final net payable expressed in the reporting currency.
    pub budget_impact: Decimal,
    /// Invoice currency.
    pub currency: CurrencyCode,
    /// Normalized rates used, as a snapshot.
    pub rates_applied: RateSet,
}

impl TaxCascadeResult {
    /// An all-zero result for a non-positive pre-tax amount.
    pub fn zero(currency: CurrencyCode, rates_applied: RateSet) -> Self {
        Self {
            pre_tax_amount: Decimal::ZERO,
            withholding_base: Decimal::ZERO,
            levy_amount: Decimal::ZERO,
            vat_amount: Decimal::ZERO,
            gross_amount: Decimal::ZERO,
            withholding_amount: Decimal::ZERO,
            net_payable_to_supplier: Decimal::ZERO,
            mobile_money_fee: Decimal::ZERO,
            final_net_payable: Decimal::ZERO,
            budget_impact: Decimal::ZERO,
            currency,
            rates_applied,
        }
    }

    /// Whether every amount is zero.
    pub fn is_zero(&self) -> bool {
        self.final_net_payable.is_zero() && self.gross_amount.is_zero()
    }

    /// A copy with every amount rounded to `dp` decimal places, half away
    /// from zero. Rounding is independent per field, so the identities above
    /// may be off by one unit in the last place.
    pub fn rounded(&self, dp: u32) -> Self {
        let r = |v: Decimal| v.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
        Self {
            pre_tax_amount: r(self.pre_tax_amount),
            withholding_base: r(self.withholding_base),
            levy_amount: r(self.levy_amount),
            vat_amount: r(self.vat_amount),
            gross_amount: r(self.gross_amount),
            withholding_amount: r(self.withholding_amount),
            net_payable_to_supplier: r(self.net_payable_to_supplier),
            mobile_money_fee: r(self.mobile_money_fee),
            final_net_payable: r(self.final_net_payable),
            budget_impact: r(self.budget_impact),
            currency: self.currency.clone(),
            rates_applied: self.rates_applied,
        }
    }
}

// ---------------------------------------------------------------------------
// Calculator
// ---------------------------------------------------------------------------

/// Evaluates the tax cascade under an [`EngineConfig`].
#[derive(Debug, Clone, Default)]
pub struct TaxCascadeCalculator {
    config: EngineConfig,
}

impl TaxCascadeCalculator {
    /// Create a calculator with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// The configuration in effect.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run the cascade.
    ///
    /// A non-positive pre-tax amount yields [`TaxCascadeResult::zero`]
    /// without error.
    ///
    /// # Errors
    ///
    /// Returns [`vpay_core::EngineError::InvalidInput`] for a rate rejected
    /// by the configured [`vpay_core::RatePolicy`], a negative service-charge
    /// override, a non-positive FX rate on a foreign-currency input, or
    /// [`ValidationError::AmountOverflow`] when a step leaves the decimal range.
    pub fn compute_cascade(
        &self,
        input: &TransactionInput,
        rates: &RateSet,
    ) -> EngineResult<TaxCascadeResult> {
        let rates = rates.normalized(self.config.rate_policy)?;

        if input.pre_tax_amount <= Decimal::ZERO {
            tracing::debug!(
                pre_tax = %input.pre_tax_amount,
                "non-positive pre-tax amount; zero cascade"
            );
            return Ok(TaxCascadeResult::zero(input.currency.clone(), rates));
        }
        input.validate(&self.config)?;

        let pre_tax = input.pre_tax_amount;

        // 1-3: levy, levy-inclusive VAT, gross.
        let levy = checked_mul(pre_tax, rates.levy, "levy")?;
        let vat = if input.vat_applicable {
            checked_mul(checked_add(pre_tax, levy, "vat base")?, rates.vat, "vat")?
        } else {
            Decimal::ZERO
        };
        let gross = checked_add(checked_add(pre_tax, levy, "gross")?, vat, "gross")?;

        // 4-5: withholding only in eligible currencies.
        let withholding_base = input.withholding_base();
        let withholding = if self.config.withholds_in(&input.currency) {
            checked_mul(withholding_base, rates.withholding, "withholding")?
        } else {
            Decimal::ZERO
        };
        let net = gross
            .checked_sub(withholding)
            .ok_or(ValidationError::AmountOverflow { step: "net payable" })?;

        // 6-7: mobile-money fee on the net.
        let mobile_money_fee = if input.payment_channel.is_mobile_money() {
            checked_mul(net, rates.mobile_money, "mobile money fee")?
        } else {
            Decimal::ZERO
        };
        let final_net = checked_add(net, mobile_money_fee, "final net payable")?;

        // 8: budget impact in the reporting currency.
        let budget_impact = if self.config.is_reporting_currency(&input.currency) {
            final_net
        } else {
            final_net
                .checked_div(input.fx_rate_to_reporting)
                .ok_or(ValidationError::AmountOverflow { step: "budget impact" })?
        };

        tracing::debug!(
            pre_tax = %pre_tax,
            currency = %input.currency,
            gross = %gross,
            withholding = %withholding,
            final_net = %final_net,
            budget_impact = %budget_impact,
            "tax cascade evaluated"
        );

        Ok(TaxCascadeResult {
            pre_tax_amount: pre_tax,
            withholding_base,
            levy_amount: levy,
            vat_amount: vat,
            gross_amount: gross,
            withholding_amount: withholding,
            net_payable_to_supplier: net,
            mobile_money_fee,
            final_net_payable: final_net,
            budget_impact,
            currency: input.currency.clone(),
            rates_applied: rates,
        })
    }
}

/// `a × b`, rejecting results outside the decimal range.
pub(crate) fn checked_mul(a: Decimal, b: Decimal, step: &'static str) -> Result<Decimal, ValidationError> {
    a.checked_mul(b).ok_or(ValidationError::AmountOverflow { step })
}

fn checked_add(a: Decimal, b: Decimal, step: &'static str) -> Result<Decimal, ValidationError> {
    a.checked_add(b).ok_or(ValidationError::AmountOverflow { step })
}
