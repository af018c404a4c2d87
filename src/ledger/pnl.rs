use rust_decimal::Decimal;

/// Fractional digits of the account currency.
pub const CURRENCY_DP: u32 = 2;

/// Copier's monetary result for a trade outcome.
///
/// `capital_base * profit_loss_percent / 100`, rounded to cents with
/// banker's rounding. A missing or zero capital base yields zero rather than
/// an error; callers decide whether a zero result is worth applying.
pub fn profit_loss(profit_loss_percent: Decimal, capital_base: Option<Decimal>) -> Decimal {
    let Some(base) = capital_base else {
        return Decimal::ZERO;
    };
    if base.is_zero() {
        return Decimal::ZERO;
    }

    (base * profit_loss_percent / Decimal::ONE_HUNDRED).round_dp(CURRENCY_DP)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
