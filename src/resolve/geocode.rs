//! Address-to-coordinates resolution with a provider fallback chain.
//!
//! Strategies are tried in order until one yields coordinates; each
//! external provider already does one bounded retry internally, so a
//! strategy error here means "give up on this provider and move on".

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::{Tier, TieredCache};
use crate::errors::AppError;
use crate::models::location::GeocodeResult;
use crate::models::quote::CacheOutcome;
use crate::resolve::centroids;
use crate::resolve::providers::{OpenGeocoder, PrimaryGeocoder, ProviderFailure};

/// Lowercase, trim, and collapse internal whitespace so cosmetic
/// variants of the same address share one cache entry.
pub fn normalize_address(address: &str) -> String {
    address
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn geocode_cache_key(normalized: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
pub trait GeocodeStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Offline strategies answer from a sparse local table; a miss there
    /// says nothing about whether the address exists.
    fn offline(&self) -> bool {
        false
    }

    async fn resolve(&self, address: &str) -> Result<GeocodeResult, ProviderFailure>;
}

#[async_trait]
impl GeocodeStrategy for PrimaryGeocoder {
    fn name(&self) -> &'static str {
        "primary_geocoder"
    }

    async fn resolve(&self, address: &str) -> Result<GeocodeResult, ProviderFailure> {
        self.geocode(address).await
    }
}

#[async_trait]
impl GeocodeStrategy for OpenGeocoder {
    fn name(&self) -> &'static str {
        "open_geocoder"
    }

    async fn resolve(&self, address: &str) -> Result<GeocodeResult, ProviderFailure> {
        self.geocode(address).await
    }
}

/// Offline terminal strategy backed by the built-in centroid table.
pub struct CentroidLookup;

#[async_trait]
impl GeocodeStrategy for CentroidLookup {
    fn name(&self) -> &'static str {
        "centroid_table"
    }

    fn offline(&self) -> bool {
        true
    }

    async fn resolve(&self, address: &str) -> Result<GeocodeResult, ProviderFailure> {
        centroids::lookup(address).ok_or(ProviderFailure::NotFound)
    }
}

pub struct GeocodeResolver {
    cache: Arc<TieredCache>,
    chain: Vec<Arc<dyn GeocodeStrategy>>,
}

impl GeocodeResolver {
    pub fn new(cache: Arc<TieredCache>, chain: Vec<Arc<dyn GeocodeStrategy>>) -> Self {
        Self { cache, chain }
    }

    /// Resolve an address through cache, then the strategy chain.
    /// Fails only when every strategy has been exhausted.
    pub async fn resolve(&self, address: &str) -> Result<(GeocodeResult, CacheOutcome), AppError> {
        let normalized = normalize_address(address);
        if normalized.is_empty() {
            return Err(AppError::validation("empty_address", "address must not be empty"));
        }
        let key = geocode_cache_key(&normalized);

        if let Some(cached) = self.cache.get::<GeocodeResult>(Tier::Geocode, &key).await {
            debug!(source = cached.coords.source.as_str(), "geocode cache hit");
            return Ok((cached, CacheOutcome::Hit));
        }

        let mut outage: Option<(&'static str, ProviderFailure)> = None;
        let mut definitive_miss = false;
        for (i, strategy) in self.chain.iter().enumerate() {
            match strategy.resolve(&normalized).await {
                Ok(result) => {
                    if i > 0 {
                        crate::metrics::provider_fallback(strategy.name());
                    }
                    debug!(
                        provider = strategy.name(),
                        lat = result.coords.lat,
                        lon = result.coords.lon,
                        "address resolved"
                    );
                    self.cache.put(Tier::Geocode, &key, &result).await;
                    return Ok((result, CacheOutcome::Miss));
                }
                Err(failure) => {
                    warn!(
                        provider = strategy.name(),
                        error = %failure,
                        "geocode strategy failed, falling through"
                    );
                    match failure {
                        ProviderFailure::NotFound => {
                            if !strategy.offline() {
                                definitive_miss = true;
                            }
                        }
                        other => outage = Some((strategy.name(), other)),
                    }
                }
            }
        }

        // A provider that positively answered "no such address" settles it.
        // Only a chain that died purely of outages surfaces as a provider
        // failure (HTTP 502 rather than 422).
        if !definitive_miss {
            if let Some((provider, failure)) = outage {
                return Err(match failure {
                    ProviderFailure::Timeout => AppError::ProviderTimeout {
                        provider: provider.to_string(),
                    },
                    other => AppError::ProviderError {
                        provider: provider.to_string(),
                        detail: other.to_string(),
                    },
                });
            }
        }
        Err(AppError::LocationUnresolvable {
            address: address.to_string(),
        })
    }
}
