//! Loan origination back-end
//!
//! Customers, loan products, loan applications with a tiered approval
//! chain, and the amortization engine behind repayment schedules, served
//! over a JSON API with bearer-token authentication.

pub mod approval;
pub mod auth;
pub mod config;
pub mod customer;
pub mod db;
pub mod error;
pub mod handlers;
pub mod loan;
pub mod middleware;
pub mod models;
pub mod product;
pub mod routes;
pub mod services;
pub mod state;
