//! Fixed-precision money and calendar helpers
//!
//! Money is carried at 2 fractional digits and intermediate rates at 10,
//! always rounded half-up. No binary floating point is involved.

use chrono::{Months, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};

/// Fractional digits for monetary amounts
pub const MONEY_SCALE: u32 = 2;

/// Fractional digits for intermediate rates
pub const RATE_SCALE: u32 = 10;

const HALF_UP: RoundingStrategy = RoundingStrategy::MidpointAwayFromZero;

/// Round half-up to `scale` digits and pin the scale, so `1000` becomes `1000.00`.
pub fn round_to(value: Decimal, scale: u32) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(scale, HALF_UP);
    rounded.rescale(scale);
    rounded
}

pub fn round_money(value: Decimal) -> Decimal {
    round_to(value, MONEY_SCALE)
}

/// Division with an explicit result scale. `None` on a zero divisor or overflow.
pub fn div_round(numerator: Decimal, denominator: Decimal, scale: u32) -> Option<Decimal> {
    numerator
        .checked_div(denominator)
        .map(|quotient| round_to(quotient, scale))
}

/// Integer power by repeated multiplication. `None` on overflow.
pub fn checked_pow(base: Decimal, exponent: u32) -> Option<Decimal> {
    (0..exponent).try_fold(Decimal::ONE, |acc, _| acc.checked_mul(base))
}

/// Monthly rate as a fraction: `annual / 12 / 100` at rate scale.
pub fn monthly_rate(annual_rate_percent: Decimal) -> Option<Decimal> {
    let per_month = div_round(annual_rate_percent, Decimal::from(12), RATE_SCALE)?;
    div_round(per_month, Decimal::ONE_HUNDRED, RATE_SCALE)
}

/// Add calendar months, clamping to the last day of a shorter target month.
pub fn add_months(date: NaiveDate, months: u32) -> Option<NaiveDate> {
    date.checked_add_months(Months::new(months))
}
