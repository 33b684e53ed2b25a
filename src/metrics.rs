//! Prometheus counters for the quoting core.
//!
//! Registered lazily against the default registry; `render()` backs the
//! `GET /metrics` endpoint.

use once_cell::sync::Lazy;
use prometheus::{register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec, TextEncoder};

use crate::cache::Tier;

static QUOTES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "haulquote_quotes_total",
        "Quote requests by outcome (priced, out_of_area, cached, failed)",
        &["outcome"]
    )
    .expect("register haulquote_quotes_total")
});

static CACHE_HITS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "haulquote_cache_hits_total",
        "Cache hits by tier",
        &["tier"]
    )
    .expect("register haulquote_cache_hits_total")
});

static CACHE_MISSES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "haulquote_cache_misses_total",
        "Cache misses by tier",
        &["tier"]
    )
    .expect("register haulquote_cache_misses_total")
});

static PROVIDER_FALLBACKS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "haulquote_provider_fallbacks_total",
        "Times a provider failed and a fallback strategy was used",
        &["provider"]
    )
    .expect("register haulquote_provider_fallbacks_total")
});

static RATES_RELOADS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "haulquote_rates_reloads_total",
        "Successful rate-table snapshot swaps"
    )
    .expect("register haulquote_rates_reloads_total")
});

pub fn quote_outcome(outcome: &str) {
    QUOTES_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn cache_hit(tier: Tier) {
    CACHE_HITS.with_label_values(&[tier.as_str()]).inc();
}

pub fn cache_miss(tier: Tier) {
    CACHE_MISSES.with_label_values(&[tier.as_str()]).inc();
}

pub fn provider_fallback(provider: &str) {
    PROVIDER_FALLBACKS.with_label_values(&[provider]).inc();
}

pub fn rates_reloaded() {
    RATES_RELOADS.inc();
}

/// Render the default registry in the Prometheus text format.
pub fn render() -> String {
    let metric_families = prometheus::gather();
    let mut buf = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buf) {
        tracing::warn!("failed to encode metrics: {}", e);
    }
    String::from_utf8(buf).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_render() {
        quote_outcome("priced");
        cache_hit(Tier::Geocode);
        cache_miss(Tier::Quote);
        provider_fallback("primary_geocoder");
        let text = render();
        assert!(text.contains("haulquote_quotes_total"));
        assert!(text.contains("haulquote_cache_hits_total"));
    }
}
