use rust_decimal::Decimal;

/// All wallet, price and commission figures are USD with two fractional
/// digits.
pub type Amount = Decimal;

/// Quantize to two fractional digits (banker's rounding).
pub fn round2(value: Amount) -> Amount {
    value.round_dp(2)
}

/// Percentage application: `base * pct / 100`, quantized.
pub fn apply_percentage(base: Amount, pct: Amount) -> Amount {
    round2(base * pct / Decimal::ONE_HUNDRED)
}
