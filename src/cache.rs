use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::metrics;

/// Logical cache tier. Each tier has its own TTL and capacity; a miss in
/// one tier never touches another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Geocode,
    Distance,
    Zone,
    Quote,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Geocode => "geocode",
            Tier::Distance => "distance",
            Tier::Zone => "zone",
            Tier::Quote => "quote",
        }
    }

    fn index(&self) -> usize {
        match self {
            Tier::Geocode => 0,
            Tier::Distance => 1,
            Tier::Zone => 2,
            Tier::Quote => 3,
        }
    }

    pub const ALL: [Tier; 4] = [Tier::Geocode, Tier::Distance, Tier::Zone, Tier::Quote];
}

#[derive(Debug, Clone, Copy)]
pub struct TierSettings {
    pub ttl: Duration,
    pub capacity: usize,
}

/// Entry stored in the local DashMap with expiry and recency stamps.
#[derive(Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
    last_used: Instant,
}

/// Two-level tiered cache: in-memory DashMap (level 1) backed by optional
/// Redis (level 2). The cache is an optimization, never a dependency for
/// correctness: every Redis failure is swallowed and treated as a miss,
/// and running without Redis at all is a supported configuration.
#[derive(Clone)]
pub struct TieredCache {
    local: Arc<DashMap<String, CacheEntry>>,
    redis: Option<ConnectionManager>,
    settings: [TierSettings; 4],
}

impl TieredCache {
    pub fn new(redis: Option<ConnectionManager>, settings: [TierSettings; 4]) -> Self {
        Self {
            local: Arc::new(DashMap::new()),
            redis,
            settings,
        }
    }

    /// Defaults matching the documented TTLs: geocode 24h, distance 1h,
    /// zone 30min, quote 5min, 10k entries per tier.
    pub fn with_defaults(redis: Option<ConnectionManager>) -> Self {
        let cap = 10_000;
        Self::new(
            redis,
            [
                TierSettings { ttl: Duration::from_secs(86_400), capacity: cap },
                TierSettings { ttl: Duration::from_secs(3_600), capacity: cap },
                TierSettings { ttl: Duration::from_secs(1_800), capacity: cap },
                TierSettings { ttl: Duration::from_secs(300), capacity: cap },
            ],
        )
    }

    pub fn ttl(&self, tier: Tier) -> Duration {
        self.settings[tier.index()].ttl
    }

    fn full_key(tier: Tier, key: &str) -> String {
        format!("{}:{}", tier.as_str(), key)
    }

    pub async fn get<T: DeserializeOwned>(&self, tier: Tier, key: &str) -> Option<T> {
        let full = Self::full_key(tier, key);

        // level 1: in-memory (with TTL check and recency touch)
        if let Some(mut entry) = self.local.get_mut(&full) {
            if Instant::now() < entry.expires_at {
                entry.last_used = Instant::now();
                let parsed = serde_json::from_str(&entry.value).ok();
                if parsed.is_some() {
                    metrics::cache_hit(tier);
                    return parsed;
                }
            } else {
                drop(entry);
                self.local.remove(&full);
            }
        }

        // level 2: redis, errors swallowed
        if let Some(redis) = &self.redis {
            let mut conn = redis.clone();
            match conn.get::<_, Option<String>>(&full).await {
                Ok(Some(v)) => {
                    let ttl_secs: i64 = conn.ttl(&full).await.unwrap_or(60);
                    let ttl = if ttl_secs > 0 {
                        Duration::from_secs(ttl_secs as u64)
                    } else {
                        Duration::from_secs(60)
                    };
                    self.insert_local(tier, full, v.clone(), ttl);
                    if let Ok(parsed) = serde_json::from_str(&v) {
                        metrics::cache_hit(tier);
                        return Some(parsed);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(tier = tier.as_str(), "redis get failed, treating as miss: {}", e);
                }
            }
        }

        metrics::cache_miss(tier);
        None
    }

    /// Store with the tier's configured TTL.
    pub async fn put<T: Serialize>(&self, tier: Tier, key: &str, value: &T) {
        self.put_with_ttl(tier, key, value, self.ttl(tier)).await;
    }

    pub async fn put_with_ttl<T: Serialize>(&self, tier: Tier, key: &str, value: &T, ttl: Duration) {
        let json = match serde_json::to_string(value) {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!(tier = tier.as_str(), "failed to serialize cache entry: {}", e);
                return;
            }
        };

        let full = Self::full_key(tier, key);
        self.insert_local(tier, full.clone(), json.clone(), ttl);

        if let Some(redis) = &self.redis {
            let mut conn = redis.clone();
            if let Err(e) = conn
                .set_ex::<_, _, ()>(&full, json, ttl.as_secs().max(1))
                .await
            {
                tracing::debug!(tier = tier.as_str(), "redis set failed, local-only entry: {}", e);
            }
        }
    }

    fn insert_local(&self, tier: Tier, full_key: String, value: String, ttl: Duration) {
        let capacity = self.settings[tier.index()].capacity;
        let prefix = format!("{}:", tier.as_str());
        let tier_len = self
            .local
            .iter()
            .filter(|e| e.key().starts_with(&prefix))
            .count();
        if tier_len >= capacity {
            self.evict_lru(&prefix);
        }

        self.local.insert(
            full_key,
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
                last_used: Instant::now(),
            },
        );
    }

    /// Drop the least-recently-used entry within one tier.
    fn evict_lru(&self, prefix: &str) {
        let oldest = self
            .local
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .min_by_key(|e| e.value().last_used)
            .map(|e| e.key().clone());
        if let Some(key) = oldest {
            self.local.remove(&key);
        }
    }

    pub async fn invalidate(&self, tier: Tier, key: &str) {
        let full = Self::full_key(tier, key);
        self.local.remove(&full);
        if let Some(redis) = &self.redis {
            let mut conn = redis.clone();
            if let Err(e) = conn.del::<_, ()>(&full).await {
                tracing::debug!(tier = tier.as_str(), "redis del failed: {}", e);
            }
        }
    }

    /// Drop every local entry in a tier. Redis entries age out via TTL.
    pub fn invalidate_tier(&self, tier: Tier) {
        let prefix = format!("{}:", tier.as_str());
        self.local.retain(|k, _| !k.starts_with(&prefix));
    }

    /// Remove all locally-expired entries. Called periodically from a
    /// background task to bound memory usage.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.local.len();
        self.local.retain(|_, entry| entry.expires_at > now);
        // A put can land between the len() read and retain().
        before.saturating_sub(self.local.len())
    }

    /// Current number of local entries (for metrics / debugging).
    pub fn local_len(&self) -> usize {
        self.local.len()
    }
}
