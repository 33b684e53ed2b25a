//! Driving-distance resolution with a great-circle fallback.

use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::{Tier, TieredCache};
use crate::models::location::{Coordinates, DistanceEstimate};
use crate::models::quote::CacheOutcome;
use crate::resolve::providers::RoutingProvider;

const EARTH_RADIUS_MILES: f64 = 3958.8;

/// Great-circle distance in statute miles.
pub fn haversine_miles(a: Coordinates, b: Coordinates) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_MILES * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Symmetric cache key: coordinates rounded to 4dp, endpoint pair
/// ordered lexicographically so A→B and B→A land on one entry.
pub fn distance_cache_key(a: Coordinates, b: Coordinates) -> String {
    let pa = format!("{:.4},{:.4}", a.lat, a.lon);
    let pb = format!("{:.4},{:.4}", b.lat, b.lon);
    let (lo, hi) = if pa <= pb { (pa, pb) } else { (pb, pa) };

    let mut hasher = Sha256::new();
    hasher.update(lo.as_bytes());
    hasher.update(b"|");
    hasher.update(hi.as_bytes());
    hex::encode(hasher.finalize())
}

pub struct DistanceResolver {
    cache: Arc<TieredCache>,
    routing: Option<RoutingProvider>,
}

impl DistanceResolver {
    pub fn new(cache: Arc<TieredCache>, routing: Option<RoutingProvider>) -> Self {
        Self { cache, routing }
    }

    /// Resolve the distance between two points. Never fails: when the
    /// routing provider is down or absent the great-circle estimate is
    /// returned with `estimated` set.
    pub async fn resolve(
        &self,
        from: Coordinates,
        to: Coordinates,
    ) -> (DistanceEstimate, CacheOutcome) {
        let key = distance_cache_key(from, to);
        if let Some(cached) = self.cache.get::<DistanceEstimate>(Tier::Distance, &key).await {
            return (cached, CacheOutcome::Hit);
        }

        let estimate = match &self.routing {
            Some(provider) => match provider.route(from, to).await {
                Ok(route) => DistanceEstimate {
                    miles: route.miles,
                    drive_time_minutes: Some(route.drive_time_minutes),
                    estimated: false,
                },
                Err(failure) => {
                    warn!(error = %failure, "routing provider failed, using great-circle estimate");
                    crate::metrics::provider_fallback("haversine");
                    DistanceEstimate::great_circle(haversine_miles(from, to))
                }
            },
            None => DistanceEstimate::great_circle(haversine_miles(from, to)),
        };

        debug!(
            miles = estimate.miles,
            estimated = estimate.estimated,
            "distance resolved"
        );
        self.cache.put(Tier::Distance, &key, &estimate).await;
        (estimate, CacheOutcome::Miss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::location::CoordinateSource;

    fn point(lat: f64, lon: f64) -> Coordinates {
        Coordinates::new(lat, lon, CoordinateSource::Branch)
    }

    #[test]
    fn test_haversine_known_pair() {
        // Dallas to Oklahoma City, roughly 190 miles great-circle.
        let d = haversine_miles(point(32.7767, -96.797), point(35.4676, -97.5164));
        assert!((d - 190.0).abs() < 5.0, "got {d}");
    }

    #[test]
    fn test_haversine_zero_for_same_point() {
        let p = point(31.0, -100.0);
        assert!(haversine_miles(p, p) < 1e-9);
    }

    #[test]
    fn test_cache_key_symmetric() {
        let a = point(32.7767, -96.797);
        let b = point(35.4676, -97.5164);
        assert_eq!(distance_cache_key(a, b), distance_cache_key(b, a));
    }

    #[test]
    fn test_cache_key_rounds_to_four_decimals() {
        let a = point(32.77671, -96.79699);
        let a_jittered = point(32.776712, -96.796991);
        let b = point(35.4676, -97.5164);
        assert_eq!(distance_cache_key(a, b), distance_cache_key(a_jittered, b));
        // A real move is a different key.
        let moved = point(32.79, -96.79);
        assert_ne!(distance_cache_key(a, b), distance_cache_key(moved, b));
    }

    #[tokio::test]
    async fn test_no_provider_falls_back_to_great_circle() {
        let cache = Arc::new(TieredCache::with_defaults(None));
        let resolver = DistanceResolver::new(cache, None);
        let (estimate, outcome) = resolver
            .resolve(point(32.7767, -96.797), point(35.4676, -97.5164))
            .await;
        assert_eq!(outcome, CacheOutcome::Miss);
        assert!(estimate.estimated);
        assert!(estimate.drive_time_minutes.is_none());
        assert!((estimate.miles - 190.0).abs() < 5.0);
    }

    #[tokio::test]
    async fn test_second_lookup_hits_cache_in_either_direction() {
        let cache = Arc::new(TieredCache::with_defaults(None));
        let resolver = DistanceResolver::new(cache, None);
        let a = point(32.7767, -96.797);
        let b = point(35.4676, -97.5164);
        let (_, first) = resolver.resolve(a, b).await;
        assert_eq!(first, CacheOutcome::Miss);
        let (_, reversed) = resolver.resolve(b, a).await;
        assert_eq!(reversed, CacheOutcome::Hit);
    }
}
