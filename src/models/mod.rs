pub mod location;
pub mod quote;
pub mod rate_table;
