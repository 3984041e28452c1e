//! Pure computation services: money primitives and the amortization engine

pub mod amortization;
pub mod money;

pub use amortization::{
    calculate_compound_interest, calculate_emi, calculate_late_payment_penalty, calculate_ltv,
    calculate_processing_fee, calculate_simple_interest, CalculationError, EmiCalculation,
    InterestCalculation, ScheduleEntry,
};
