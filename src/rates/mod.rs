//! Shared rate-table snapshot.
//!
//! All requests read through `RateTableHandle`; a refresh builds a complete
//! new `RateTable` off to the side and swaps a single `Arc`, so in-flight
//! calculations always see either the old or the new snapshot in full.

pub mod loader;

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::rate_table::RateTable;

/// Cheaply-cloneable handle to the current pricing snapshot.
#[derive(Clone)]
pub struct RateTableHandle(Arc<RwLock<Arc<RateTable>>>);

impl RateTableHandle {
    pub fn new(initial: RateTable) -> Self {
        Self(Arc::new(RwLock::new(Arc::new(initial))))
    }

    /// Grab the current snapshot. The returned `Arc` stays valid for the
    /// whole calculation even if a swap happens mid-request.
    pub async fn current(&self) -> Arc<RateTable> {
        self.0.read().await.clone()
    }

    /// Replace the snapshot wholesale.
    pub async fn swap(&self, next: RateTable) {
        let version = next.version.clone();
        *self.0.write().await = Arc::new(next);
        crate::metrics::rates_reloaded();
        tracing::info!(%version, "rate table snapshot swapped");
    }

    pub async fn version(&self) -> String {
        self.0.read().await.version.clone()
    }
}
