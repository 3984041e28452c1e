//! Amortization engine scenarios and schedule invariants

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use los_server::services::{calculate_emi, EmiCalculation};

fn first_payment() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(2024, 1, 15)
}

// ============================================================================
// Reference scenarios
// ============================================================================

#[test]
fn test_emi_100k_at_10_percent_for_12_months() {
    let calc = calculate_emi(dec!(100000), dec!(10), 12, first_payment()).unwrap();

    assert!((calc.emi - dec!(8791.59)).abs() <= dec!(0.01), "emi was {}", calc.emi);
    assert!((calc.total_payment - dec!(105499.08)).abs() <= dec!(0.12));
    assert!((calc.total_interest - dec!(5499.08)).abs() <= dec!(0.12));
    assert_eq!(calc.schedule.len(), 12);

    let last = calc.schedule.last().unwrap();
    assert_eq!(last.remaining_balance, dec!(0.00));
    assert_eq!(last.installment_number, 12);
}

#[test]
fn test_zero_rate_emi() {
    let calc = calculate_emi(dec!(12000), Decimal::ZERO, 12, first_payment()).unwrap();

    assert_eq!(calc.emi, dec!(1000.00));
    assert!(calc.schedule.iter().all(|e| e.interest_component.is_zero()));
    let total: Decimal = calc.schedule.iter().map(|e| e.principal_component).sum();
    assert_eq!(total, dec!(12000));
}

#[test]
fn test_schedule_dates_are_monthly() {
    let calc = calculate_emi(dec!(5000), dec!(12), 3, first_payment()).unwrap();
    let dates: Vec<NaiveDate> = calc.schedule.iter().map(|e| e.payment_date).collect();

    assert_eq!(
        dates,
        vec![
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 15).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
        ]
    );
}

#[test]
fn test_single_month_tenure_repays_everything() {
    let calc = calculate_emi(dec!(1000), dec!(12), 1, first_payment()).unwrap();

    assert_eq!(calc.schedule.len(), 1);
    let only = &calc.schedule[0];
    assert_eq!(only.principal_component, dec!(1000.00));
    assert_eq!(only.interest_component, dec!(10.00));
    assert_eq!(only.emi, dec!(1010.00));
    assert_eq!(only.remaining_balance, dec!(0.00));
}

#[test]
fn test_invalid_inputs_rejected() {
    assert!(calculate_emi(Decimal::ZERO, dec!(10), 12, first_payment()).is_err());
    assert!(calculate_emi(dec!(1000), dec!(-1), 12, first_payment()).is_err());
    assert!(calculate_emi(dec!(1000), dec!(10), 0, first_payment()).is_err());
}

// ============================================================================
// Schedule invariants
// ============================================================================

/// Rounding drift the final instalment may absorb: one cent per period,
/// compounded at the loan rate.
fn drift_allowance(calc: &EmiCalculation) -> f64 {
    let r = calc.annual_interest_rate.to_f64().unwrap_or(0.0) / 1200.0;
    let n = calc.tenure_months as f64;
    0.01 * n * (1.0 + r).powf(n) + 0.01
}

fn assert_schedule_invariants(calc: &EmiCalculation) {
    let n = calc.tenure_months as usize;
    assert_eq!(calc.schedule.len(), n);

    let principal_sum: Decimal = calc.schedule.iter().map(|e| e.principal_component).sum();
    assert_eq!(principal_sum, calc.principal, "principal components must repay exactly");

    let last = &calc.schedule[n - 1];
    assert_eq!(last.remaining_balance, dec!(0.00));

    for entry in &calc.schedule {
        assert_eq!(
            entry.principal_component + entry.interest_component,
            entry.emi,
            "instalment {} does not add up",
            entry.installment_number
        );
        assert!(entry.principal_component >= Decimal::ZERO);
        assert!(entry.interest_component >= Decimal::ZERO);
    }

    for entry in &calc.schedule[..n - 1] {
        assert!(
            entry.emi == calc.emi || entry.remaining_balance.is_zero(),
            "instalment {} emi {} differs from {}",
            entry.installment_number,
            entry.emi,
            calc.emi
        );
    }

    let drift = (last.emi - calc.emi).abs().to_f64().unwrap_or(f64::MAX);
    assert!(
        drift <= drift_allowance(calc),
        "last instalment drifted by {}",
        drift
    );
}

#[test]
fn test_invariants_on_known_loans() {
    let cases = [
        (dec!(100000), dec!(10), 12),
        (dec!(1000), dec!(5), 6),
        (dec!(250000), dec!(12), 240),
        (dec!(500000), dec!(30), 360),
        (dec!(12000), Decimal::ZERO, 12),
        (dec!(10000), Decimal::ZERO, 3),
    ];

    for (principal, rate, months) in cases {
        let calc = calculate_emi(principal, rate, months, first_payment()).unwrap();
        assert_schedule_invariants(&calc);
    }
}

#[test]
fn test_zero_rate_remainder_lands_on_last_instalment() {
    let calc = calculate_emi(dec!(10000), Decimal::ZERO, 3, first_payment()).unwrap();

    assert_eq!(calc.emi, dec!(3333.33));
    assert_eq!(calc.schedule[2].principal_component, dec!(3333.34));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_schedule_repays_principal(
        cents in 100_000i64..100_000_000i64,
        rate_bp in 0i64..=3600i64,
        months in 1u32..=360u32,
    ) {
        let principal = Decimal::new(cents, 2);
        let rate = Decimal::new(rate_bp, 2);

        let calc = calculate_emi(principal, rate, months, first_payment()).unwrap();
        assert_schedule_invariants(&calc);
    }
}
