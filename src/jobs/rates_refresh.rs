//! Background job: periodic rate-table refresh from the sheet-sync source.
//!
//! A failed refresh keeps the current snapshot in place; readers never
//! see a missing or partially-applied table.

use std::sync::Arc;
use std::time::Duration;
use tokio::time;

use crate::rates::{loader::RatesLoader, RateTableHandle};

/// Spawn the refresh task. Call this once at startup.
pub fn spawn(loader: Arc<RatesLoader>, handle: RateTableHandle, refresh_secs: u64) {
    tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_secs(refresh_secs.max(1)));
        // First tick fires immediately; the initial load already happened.
        interval.tick().await;
        loop {
            interval.tick().await;
            match loader.load().await {
                Ok(table) => {
                    let current = handle.version().await;
                    if table.version != current {
                        handle.swap(table).await;
                    }
                }
                Err(e) => {
                    tracing::error!("rate-table refresh failed, keeping current snapshot: {e:#}");
                }
            }
        }
    });
}
