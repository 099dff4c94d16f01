//! # Procurement Categories, Tax Regimes, and Payment Channels
//!
//! Closed enumerations for the classification fields of a transaction.
//!
//! Historical payment records name procurement categories as free text
//! ("Goods", "supply of goods", "Service", "Consultancy Services", ...).
//! [`ProcurementCategory::resolve`] maps such text onto the enum in two
//! stages:
//!
//! 1. An explicit alias table, matched after case folding and whitespace
//!    collapsing.
//! 2. A compatibility shim for singular/plural drift ("service" vs
//!    "services", "work" vs "works"). Records captured before the alias
//!    table existed depend on it. Every shim match is logged at `warn` so
//!    the alias table can be extended.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Procurement Category
// ---------------------------------------------------------------------------

/// The kind of supply a payment settles. Determines the withholding rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcurementCategory {
    /// Supply of goods.
    Goods,
    /// Works and construction contracts.
    Works,
    /// Non-consultancy services.
    Services,
    /// Consultancy and professional services.
    Consultancy,
    /// Rent and leases.
    Rent,
}

/// Explicit alias table. Keys are case-folded with single spaces.
const CATEGORY_ALIASES: &[(&str, ProcurementCategory)] = &[
    ("goods", ProcurementCategory::Goods),
    ("supply of goods", ProcurementCategory::Goods),
    ("supplies", ProcurementCategory::Goods),
    ("procurement of goods", ProcurementCategory::Goods),
    ("works", ProcurementCategory::Works),
    ("civil works", ProcurementCategory::Works),
    ("construction", ProcurementCategory::Works),
    ("services", ProcurementCategory::Services),
    ("non-consultancy services", ProcurementCategory::Services),
    ("general services", ProcurementCategory::Services),
    ("consultancy", ProcurementCategory::Consultancy),
    ("consulting", ProcurementCategory::Consultancy),
    ("consultancy services", ProcurementCategory::Consultancy),
    ("professional services", ProcurementCategory::Consultancy),
    ("rent", ProcurementCategory::Rent),
    ("rental", ProcurementCategory::Rent),
    ("lease", ProcurementCategory::Rent),
];

/// How a free-text category name was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryMatch {
    /// Found in the alias table.
    Alias,
    /// Found only after singular/plural variation.
    PluralShim,
}

impl ProcurementCategory {
    /// Return the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Goods => "goods",
            Self::Works => "works",
            Self::Services => "services",
            Self::Consultancy => "consultancy",
            Self::Rent => "rent",
        }
    }

    /// Return all category variants.
    pub fn all() -> &'static [ProcurementCategory] {
        &[
            Self::Goods,
            Self::Works,
            Self::Services,
            Self::Consultancy,
            Self::Rent,
        ]
    }

    /// Resolve a free-text category name. Returns `None` when neither the
    /// alias table nor the plural shim recognizes it.
    pub fn resolve(name: &str) -> Option<(Self, CategoryMatch)> {
        let key = fold(name);
        if key.is_empty() {
            return None;
        }
        if let Some(category) = lookup_alias(&key) {
            return Some((category, CategoryMatch::Alias));
        }

        let category = plural_variants(&key)
            .into_iter()
            .find_map(|variant| lookup_alias(&variant))?;
        tracing::warn!(
            input = name,
            resolved = %category,
            "procurement category matched via singular/plural shim; add an alias"
        );
        Some((category, CategoryMatch::PluralShim))
    }
}

impl std::str::FromStr for ProcurementCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::resolve(s)
            .map(|(c, _)| c)
            .ok_or_else(|| format!("unknown procurement category: {s}"))
    }
}

impl std::fmt::Display for ProcurementCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn fold(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn lookup_alias(key: &str) -> Option<ProcurementCategory> {
    CATEGORY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, c)| *c)
}

/// Singular/plural variants of the last word, in the order they are tried.
fn plural_variants(key: &str) -> Vec<String> {
    let mut variants = Vec::with_capacity(3);
    if let Some(stem) = key.strip_suffix("ies") {
        variants.push(format!("{stem}y"));
    }
    if let Some(stem) = key.strip_suffix("es") {
        variants.push(stem.to_string());
    }
    if let Some(stem) = key.strip_suffix('s') {
        variants.push(stem.to_string());
    } else {
        variants.push(format!("{key}s"));
        if let Some(stem) = key.strip_suffix('y') {
            variants.push(format!("{stem}ies"));
        }
    }
    variants
}

// ---------------------------------------------------------------------------
// Tax Regime
// ---------------------------------------------------------------------------

/// The VAT regime the supplier is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxRegime {
    /// Standard scheme: levy plus levy-inclusive VAT.
    #[default]
    Standard,
    /// Flat-rate scheme: a single flat VAT rate, no levy.
    FlatRate,
    /// Exempt or zero-rated supply: neither levy nor VAT.
    Exempt,
}

impl TaxRegime {
    /// Return the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::FlatRate => "flat_rate",
            Self::Exempt => "exempt",
        }
    }

    /// Return all regime variants.
    pub fn all() -> &'static [TaxRegime] {
        &[Self::Standard, Self::FlatRate, Self::Exempt]
    }
}

impl std::str::FromStr for TaxRegime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match fold(s).as_str() {
            "standard" | "vat standard" | "standard rate" => Ok(Self::Standard),
            "flat" | "flat rate" | "flat_rate" | "vfrs" => Ok(Self::FlatRate),
            "exempt" | "zero rated" | "zero-rated" | "none" => Ok(Self::Exempt),
            _ => Err(format!("unknown tax regime: {s}")),
        }
    }
}

impl std::fmt::Display for TaxRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Payment Channel
// ---------------------------------------------------------------------------

/// How the net amount is disbursed to the supplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentChannel {
    /// Bank transfer.
    #[default]
    BankTransfer,
    /// Mobile-money wallet. The only channel that attracts a disbursement fee.
    MobileMoney,
    /// Cheque.
    Cheque,
    /// Cash.
    Cash,
}

impl PaymentChannel {
    /// Return the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BankTransfer => "bank_transfer",
            Self::MobileMoney => "mobile_money",
            Self::Cheque => "cheque",
            Self::Cash => "cash",
        }
    }

    /// Whether a mobile-money fee applies.
    pub fn is_mobile_money(&self) -> bool {
        matches!(self, Self::MobileMoney)
    }
}

impl std::str::FromStr for PaymentChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = fold(s).replace(['_', '-'], " ");
        match key.as_str() {
            "bank" | "bank transfer" | "transfer" | "eft" | "wire" => Ok(Self::BankTransfer),
            "momo" | "mobile money" | "mobile wallet" => Ok(Self::MobileMoney),
            "cheque" | "check" => Ok(Self::Cheque),
            "cash" => Ok(Self::Cash),
            _ => Err(format!("unknown payment channel: {s}")),
        }
    }
}

impl std::fmt::Display for PaymentChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
