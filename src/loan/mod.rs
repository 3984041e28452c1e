//! Loan applications and their status lifecycle

pub mod model;
pub mod service;

pub use model::*;
pub use service::{generate_application_no, LoanService};
