//! HaulQuote — library crate for integration testing.
//!
//! Re-exports modules needed by integration tests in `tests/`.

pub mod audit;
pub mod cache;
pub mod config;
pub mod errors;
pub mod jobs;
pub mod metrics;
pub mod models;
pub mod pricing;
pub mod quote;
pub mod rates;
pub mod resolve;
