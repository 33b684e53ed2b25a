//! Quote orchestration: fingerprint-keyed caching plus the request
//! state machine that ties resolvers and calculators together.

pub mod fingerprint;
pub mod orchestrator;

pub use orchestrator::{LocationInfo, QuoteService};
