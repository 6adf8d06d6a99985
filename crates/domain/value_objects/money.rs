//! Conversion between decimal major-unit amounts and the integer minor units
//! the payment gateway bills in.

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};

pub const DEFAULT_CURRENCY: &str = "usd";

/// ISO 4217 codes the gateway bills without a fractional unit.
pub const ZERO_DECIMAL_CURRENCIES: [&str; 16] = [
    "BIF", "CLP", "DJF", "GNF", "JPY", "KMF", "KRW", "MGA", "PYG", "RWF", "UGX", "VND", "VUV",
    "XAF", "XOF", "XPF",
];

pub fn is_zero_decimal(currency: &str) -> bool {
    let currency = currency.trim();
    ZERO_DECIMAL_CURRENCIES
        .iter()
        .any(|code| code.eq_ignore_ascii_case(currency))
}

pub fn minor_unit_scale(currency: &str) -> u32 {
    if is_zero_decimal(currency) { 0 } else { 2 }
}

/// Converts `amount` into integer minor units of `currency`.
///
/// Zero-decimal currencies keep the major unit, everything else is scaled by
/// 100. The result is rounded half away from zero and saturates at the
/// `i64` bounds.
pub fn normalize(amount: Decimal, currency: &str) -> i64 {
    let scaled = if is_zero_decimal(currency) {
        Some(amount)
    } else {
        amount.checked_mul(Decimal::ONE_HUNDRED)
    };

    let saturated = if amount.is_sign_negative() {
        i64::MIN
    } else {
        i64::MAX
    };

    scaled
        .map(|value| value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|value| value.to_i64())
        .unwrap_or(saturated)
}

/// Inverse of [`normalize`] for amounts persisted as minor units.
pub fn from_minor_units(minor: i64, currency: &str) -> Decimal {
    Decimal::new(minor, minor_unit_scale(currency))
}

/// Lower-cased currency code, or `fallback` when none is set.
pub fn resolve_currency(currency: &str, fallback: &str) -> String {
    let trimmed = currency.trim();
    if trimmed.is_empty() {
        fallback.trim().to_ascii_lowercase()
    } else {
        trimmed.to_ascii_lowercase()
    }
}
