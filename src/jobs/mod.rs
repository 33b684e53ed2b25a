//! Background tasks, spawned once at startup.

pub mod cache_sweep;
pub mod rates_refresh;
