use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// Optional. When unset or unreachable the cache runs local-only.
    pub redis_url: Option<String>,

    /// Rate-table source: a sheet-sync JSON export, by URL or local file.
    /// Exactly one should be set; the file wins when both are.
    pub rates_url: Option<String>,
    pub rates_file: Option<String>,
    pub rates_refresh_secs: u64,

    /// Geocoding / routing providers.
    pub geocode_primary_url: String,
    pub geocode_primary_api_key: Option<String>,
    pub geocode_fallback_url: String,
    pub routing_url: String,
    pub provider_timeout_ms: u64,

    /// Per-tier cache TTLs, seconds.
    pub geocode_ttl_secs: u64,
    pub distance_ttl_secs: u64,
    pub zone_ttl_secs: u64,
    pub quote_ttl_secs: u64,
    /// Per-tier local entry cap before LRU eviction.
    pub cache_tier_capacity: usize,

    pub max_address_len: usize,

    /// Comma-separated audit webhook URLs; empty disables the sink.
    pub audit_webhook_urls: Vec<String>,
    pub audit_webhook_secret: Option<String>,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let rates_url = std::env::var("HAULQUOTE_RATES_URL").ok();
    let rates_file = std::env::var("HAULQUOTE_RATES_FILE").ok();
    if rates_url.is_none() && rates_file.is_none() {
        anyhow::bail!(
            "no rate-table source configured: set HAULQUOTE_RATES_URL or HAULQUOTE_RATES_FILE"
        );
    }

    Ok(Config {
        port: env_or("HAULQUOTE_PORT", 8090),
        redis_url: std::env::var("HAULQUOTE_REDIS_URL").ok(),
        rates_url,
        rates_file,
        rates_refresh_secs: env_or("HAULQUOTE_RATES_REFRESH_SECS", 300),
        geocode_primary_url: std::env::var("HAULQUOTE_GEOCODE_PRIMARY_URL")
            .unwrap_or_else(|_| "https://maps.googleapis.com/maps/api/geocode/json".into()),
        geocode_primary_api_key: std::env::var("HAULQUOTE_GEOCODE_API_KEY").ok(),
        geocode_fallback_url: std::env::var("HAULQUOTE_GEOCODE_FALLBACK_URL")
            .unwrap_or_else(|_| "https://nominatim.openstreetmap.org/search".into()),
        routing_url: std::env::var("HAULQUOTE_ROUTING_URL")
            .unwrap_or_else(|_| "https://router.project-osrm.org/route/v1/driving".into()),
        provider_timeout_ms: env_or("HAULQUOTE_PROVIDER_TIMEOUT_MS", 2500),
        geocode_ttl_secs: env_or("HAULQUOTE_GEOCODE_TTL_SECS", 86_400),
        distance_ttl_secs: env_or("HAULQUOTE_DISTANCE_TTL_SECS", 3_600),
        zone_ttl_secs: env_or("HAULQUOTE_ZONE_TTL_SECS", 1_800),
        quote_ttl_secs: env_or("HAULQUOTE_QUOTE_TTL_SECS", 300),
        cache_tier_capacity: env_or("HAULQUOTE_CACHE_TIER_CAPACITY", 10_000),
        max_address_len: env_or("HAULQUOTE_MAX_ADDRESS_LEN", 512),
        audit_webhook_urls: std::env::var("HAULQUOTE_AUDIT_WEBHOOK_URLS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        audit_webhook_secret: std::env::var("HAULQUOTE_AUDIT_WEBHOOK_SECRET").ok(),
    })
}
