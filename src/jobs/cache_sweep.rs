//! Background job: drop expired local cache entries.
//!
//! Expired entries are already invisible to readers; the sweep just
//! reclaims their memory between organic evictions.

use std::sync::Arc;
use std::time::Duration;
use tokio::time;

use crate::cache::TieredCache;

const SWEEP_INTERVAL_SECS: u64 = 60;

/// Spawn the sweep task. Call this once at startup.
pub fn spawn(cache: Arc<TieredCache>) {
    tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
        loop {
            interval.tick().await;
            let removed = cache.evict_expired();
            if removed > 0 {
                tracing::debug!(removed, "swept expired cache entries");
            }
        }
    });
}
