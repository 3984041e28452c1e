//! Amortization and loan arithmetic engine
//!
//! Pure functions over [`Decimal`]: EMI with its repayment schedule, simple and
//! compound interest, processing fees, late-payment penalties and LTV.

use chrono::{NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use super::money::{
    add_months, checked_pow, div_round, monthly_rate, round_money, MONEY_SCALE,
};

/// Longest repayment schedule the engine will build
pub const MAX_TENURE_MONTHS: u32 = 600;

/// Longest compounding period in whole years
pub const MAX_COMPOUNDING_YEARS: u32 = 100;

/// Grace period before the daily late fee starts accruing
const PENALTY_GRACE_DAYS: i64 = 30;

/// Fixed daily late fee when no overdue amount is known
const FLAT_DAILY_PENALTY: Decimal = Decimal::from_parts(5, 0, 0, false, 0);

/// Daily late fee rate on the overdue amount (0.05%)
const DAILY_PENALTY_RATE: Decimal = Decimal::from_parts(5, 0, 0, false, 4);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalculationError {
    #[error("Principal amount must be greater than zero")]
    InvalidPrincipal,

    #[error("Interest rate cannot be negative")]
    InvalidRate,

    #[error("Tenure must be between 1 and 600 months")]
    InvalidTenure,

    #[error("Time period must be between 0 and 100 years")]
    InvalidTime,

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Property value must be greater than zero")]
    InvalidPropertyValue,

    #[error("Days late cannot be negative")]
    InvalidDaysLate,

    #[error("Calculation overflow")]
    Overflow,
}

/// One row of a repayment schedule
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub installment_number: u32,
    pub payment_date: NaiveDate,
    pub emi: Decimal,
    pub principal_component: Decimal,
    pub interest_component: Decimal,
    pub remaining_balance: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmiCalculation {
    pub principal: Decimal,
    pub annual_interest_rate: Decimal,
    pub tenure_months: u32,
    pub emi: Decimal,
    pub total_payment: Decimal,
    pub total_interest: Decimal,
    pub schedule: Vec<ScheduleEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterestCalculation {
    pub principal: Decimal,
    pub annual_interest_rate: Decimal,
    pub time_years: Decimal,
    pub interest: Decimal,
    pub total_amount: Decimal,
}

/// Equated monthly instalment with its full schedule.
///
/// The first payment falls on `first_payment_date`, or one month from today.
pub fn calculate_emi(
    principal: Decimal,
    annual_rate: Decimal,
    tenure_months: u32,
    first_payment_date: Option<NaiveDate>,
) -> Result<EmiCalculation, CalculationError> {
    if principal <= Decimal::ZERO {
        return Err(CalculationError::InvalidPrincipal);
    }
    if annual_rate < Decimal::ZERO {
        return Err(CalculationError::InvalidRate);
    }
    if tenure_months == 0 || tenure_months > MAX_TENURE_MONTHS {
        return Err(CalculationError::InvalidTenure);
    }

    let rate = monthly_rate(annual_rate).ok_or(CalculationError::Overflow)?;
    let emi = emi_amount(principal, rate, tenure_months)?;

    let total_payment = round_money(
        emi.checked_mul(Decimal::from(tenure_months))
            .ok_or(CalculationError::Overflow)?,
    );
    let total_interest = round_money(total_payment - principal);

    let first_payment_date = match first_payment_date {
        Some(date) => date,
        None => add_months(Utc::now().date_naive(), 1).ok_or(CalculationError::Overflow)?,
    };
    let schedule = build_schedule(principal, rate, emi, tenure_months, first_payment_date)?;

    Ok(EmiCalculation {
        principal: round_money(principal),
        annual_interest_rate: annual_rate,
        tenure_months,
        emi,
        total_payment,
        total_interest,
        schedule,
    })
}

/// `P·r·(1+r)^N / ((1+r)^N − 1)`, or `P / N` when the rate is zero.
fn emi_amount(principal: Decimal, rate: Decimal, tenure_months: u32) -> Result<Decimal, CalculationError> {
    if rate.is_zero() {
        return div_round(principal, Decimal::from(tenure_months), MONEY_SCALE)
            .ok_or(CalculationError::Overflow);
    }

    let growth = checked_pow(Decimal::ONE + rate, tenure_months).ok_or(CalculationError::Overflow)?;
    let numerator = principal
        .checked_mul(rate)
        .and_then(|v| v.checked_mul(growth))
        .ok_or(CalculationError::Overflow)?;
    div_round(numerator, growth - Decimal::ONE, MONEY_SCALE).ok_or(CalculationError::Overflow)
}

/// The final instalment takes whatever principal remains, absorbing rounding drift.
fn build_schedule(
    principal: Decimal,
    rate: Decimal,
    emi: Decimal,
    tenure_months: u32,
    first_payment_date: NaiveDate,
) -> Result<Vec<ScheduleEntry>, CalculationError> {
    let mut schedule = Vec::with_capacity(tenure_months as usize);
    let mut remaining = round_money(principal);
    let mut payment_date = first_payment_date;

    for installment_number in 1..=tenure_months {
        let interest = round_money(remaining.checked_mul(rate).ok_or(CalculationError::Overflow)?);
        let principal_component = if installment_number == tenure_months {
            remaining
        } else {
            (emi - interest).min(remaining)
        };
        let instalment = principal_component + interest;

        remaining = (remaining - principal_component).max(Decimal::ZERO);
        schedule.push(ScheduleEntry {
            installment_number,
            payment_date,
            emi: round_money(instalment),
            principal_component: round_money(principal_component),
            interest_component: interest,
            remaining_balance: round_money(remaining),
        });

        payment_date = add_months(payment_date, 1).ok_or(CalculationError::Overflow)?;
    }

    Ok(schedule)
}

/// `interest = P·R·T / 100`
pub fn calculate_simple_interest(
    principal: Decimal,
    annual_rate: Decimal,
    time_years: Decimal,
) -> Result<InterestCalculation, CalculationError> {
    validate_interest_inputs(principal, annual_rate, time_years)?;

    let interest = principal
        .checked_mul(annual_rate)
        .and_then(|v| v.checked_mul(time_years))
        .and_then(|v| div_round(v, Decimal::ONE_HUNDRED, MONEY_SCALE))
        .ok_or(CalculationError::Overflow)?;

    Ok(InterestCalculation {
        principal,
        annual_interest_rate: annual_rate,
        time_years,
        interest,
        total_amount: round_money(principal + interest),
    })
}

/// `total = P·(1 + R/100)^⌊T⌋`, compounded annually over whole years only.
pub fn calculate_compound_interest(
    principal: Decimal,
    annual_rate: Decimal,
    time_years: Decimal,
) -> Result<InterestCalculation, CalculationError> {
    validate_interest_inputs(principal, annual_rate, time_years)?;

    let whole_years = time_years
        .floor()
        .to_u32()
        .filter(|years| *years <= MAX_COMPOUNDING_YEARS)
        .ok_or(CalculationError::InvalidTime)?;
    let factor = Decimal::ONE
        + annual_rate
            .checked_div(Decimal::ONE_HUNDRED)
            .ok_or(CalculationError::Overflow)?;
    let total = checked_pow(factor, whole_years)
        .and_then(|growth| principal.checked_mul(growth))
        .map(round_money)
        .ok_or(CalculationError::Overflow)?;

    Ok(InterestCalculation {
        principal,
        annual_interest_rate: annual_rate,
        time_years,
        interest: round_money(total - principal),
        total_amount: total,
    })
}

fn validate_interest_inputs(
    principal: Decimal,
    annual_rate: Decimal,
    time_years: Decimal,
) -> Result<(), CalculationError> {
    if principal <= Decimal::ZERO {
        return Err(CalculationError::InvalidPrincipal);
    }
    if annual_rate < Decimal::ZERO {
        return Err(CalculationError::InvalidRate);
    }
    if time_years < Decimal::ZERO {
        return Err(CalculationError::InvalidTime);
    }
    Ok(())
}

/// `max(min_fee, amount · percentage / 100)`
pub fn calculate_processing_fee(
    amount: Decimal,
    percentage: Decimal,
    min_fee: Decimal,
) -> Result<Decimal, CalculationError> {
    if amount <= Decimal::ZERO {
        return Err(CalculationError::InvalidAmount);
    }
    if percentage < Decimal::ZERO {
        return Err(CalculationError::InvalidRate);
    }

    let fee = amount
        .checked_mul(percentage)
        .and_then(|v| div_round(v, Decimal::ONE_HUNDRED, MONEY_SCALE))
        .ok_or(CalculationError::Overflow)?;
    Ok(round_money(fee.max(min_fee)))
}

/// Fixed part, percentage part and a daily part once the grace period has passed.
pub fn calculate_late_payment_penalty(
    overdue_amount: Option<Decimal>,
    fixed_penalty: Option<Decimal>,
    percentage_penalty: Option<Decimal>,
    days_late: Option<i64>,
) -> Result<Decimal, CalculationError> {
    let mut penalty = Decimal::ZERO;

    if let Some(fixed) = fixed_penalty {
        penalty += fixed;
    }

    if let (Some(overdue), Some(percentage)) = (overdue_amount, percentage_penalty) {
        penalty += overdue
            .checked_mul(percentage)
            .and_then(|v| div_round(v, Decimal::ONE_HUNDRED, MONEY_SCALE))
            .ok_or(CalculationError::Overflow)?;
    }

    if let Some(days) = days_late {
        if days < 0 {
            return Err(CalculationError::InvalidDaysLate);
        }
        if days > PENALTY_GRACE_DAYS {
            let chargeable_days = Decimal::from(days - PENALTY_GRACE_DAYS);
            let per_day = match overdue_amount {
                Some(overdue) => overdue
                    .checked_mul(DAILY_PENALTY_RATE)
                    .ok_or(CalculationError::Overflow)?,
                None => FLAT_DAILY_PENALTY,
            };
            penalty += round_money(
                per_day
                    .checked_mul(chargeable_days)
                    .ok_or(CalculationError::Overflow)?,
            );
        }
    }

    Ok(round_money(penalty))
}

/// Loan-to-value as a percentage
pub fn calculate_ltv(loan_amount: Decimal, property_value: Decimal) -> Result<Decimal, CalculationError> {
    if property_value <= Decimal::ZERO {
        return Err(CalculationError::InvalidPropertyValue);
    }

    loan_amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|v| div_round(v, property_value, MONEY_SCALE))
        .ok_or(CalculationError::Overflow)
}
