//! Audit sink for calculation traces.
//!
//! Every assembled quote (and every out-of-area outcome) produces one audit
//! event carrying the full breakdown, discounts applied, provider sources
//! used, and cache hits/misses. Delivery is fire-and-forget: the webhook
//! write never blocks the quote response.

use anyhow::Result;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::quote::{CalculationTrace, QuoteOutcome};

/// A structured audit payload sent to the configured sink endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    /// "quote_priced", "quote_cached", "out_of_service_area".
    pub event_type: String,
    pub timestamp: String,
    pub request_id: String,
    pub pricing_version: Option<String>,
    pub trace: CalculationTrace,
    /// Breakdown summary (totals, zone, distance) for quick inspection.
    pub details: serde_json::Value,
}

impl AuditEvent {
    pub fn for_outcome(
        request_id: &str,
        outcome: &QuoteOutcome,
        cached: bool,
        trace: CalculationTrace,
    ) -> Self {
        match outcome {
            QuoteOutcome::Priced(result) => Self {
                event_type: if cached { "quote_cached" } else { "quote_priced" }.to_string(),
                timestamp: chrono::Utc::now().to_rfc3339(),
                request_id: request_id.to_string(),
                pricing_version: Some(result.pricing_version.clone()),
                trace,
                details: serde_json::json!({
                    "quote_id": result.quote_id,
                    "zone": result.zone,
                    "distance_miles": result.distance_miles,
                    "base_cost": result.base_cost,
                    "delivery_cost": result.delivery_cost,
                    "extras_cost": result.extras_cost,
                    "discounts": result.discounts,
                    "subtotal": result.subtotal,
                    "tax_amount": result.tax_amount,
                    "total": result.total,
                    "expires_at": result.expires_at,
                }),
            },
            QuoteOutcome::OutOfServiceArea {
                distance_miles,
                max_zone_boundary,
                nearest_branch,
            } => Self {
                event_type: "out_of_service_area".to_string(),
                timestamp: chrono::Utc::now().to_rfc3339(),
                request_id: request_id.to_string(),
                pricing_version: None,
                trace,
                details: serde_json::json!({
                    "distance_miles": distance_miles,
                    "max_zone_boundary": max_zone_boundary,
                    "nearest_branch": nearest_branch,
                }),
            },
        }
    }
}

/// Compute HMAC-SHA256 of `payload` using `secret`, "sha256=<hex>".
fn hmac_sha256_hex(secret: &str, payload: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(payload);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Dispatches audit events to the configured URLs with bounded retry and
/// optional HMAC-SHA256 signing (`x-haulquote-signature` header).
#[derive(Clone)]
pub struct AuditSink {
    client: reqwest::Client,
    urls: Vec<String>,
    secret: Option<String>,
}

impl AuditSink {
    pub fn new(urls: Vec<String>, secret: Option<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .user_agent("HaulQuote-Audit/1.0")
                .build()
                .expect("failed to build audit HTTP client"),
            urls,
            secret,
        }
    }

    /// Fire-and-forget: spawns the delivery task and returns immediately.
    pub fn dispatch(&self, event: AuditEvent) {
        if self.urls.is_empty() {
            debug!(event_type = %event.event_type, "audit sink disabled, trace logged only");
            tracing::info!(
                event_type = %event.event_type,
                request_id = %event.request_id,
                trace_steps = event.trace.steps.len(),
                "audit event"
            );
            return;
        }

        let sink = self.clone();
        tokio::spawn(async move {
            for url in &sink.urls {
                if let Err(e) = sink.send(url, &event).await {
                    warn!(url, error = %e, "audit delivery ultimately failed");
                }
            }
        });
    }

    /// Deliver one event to one URL, retrying with jittered backoff
    /// (roughly 1s then 5s) so a burst of quotes does not re-hit a
    /// struggling sink in lockstep.
    async fn send(&self, url: &str, event: &AuditEvent) -> Result<()> {
        let payload = serde_json::to_vec(event)?;
        let signature = self.secret.as_deref().map(|s| hmac_sha256_hex(s, &payload));

        let backoff_secs: &[u64] = &[0, 1, 5];
        for (attempt, &delay) in backoff_secs.iter().enumerate() {
            if delay > 0 {
                let jitter_ms = rand::Rng::gen_range(&mut rand::thread_rng(), 0..250);
                tokio::time::sleep(Duration::from_millis(delay * 1000 + jitter_ms)).await;
            }

            let mut req = self
                .client
                .post(url)
                .header("content-type", "application/json")
                .header("x-haulquote-event", &event.event_type);
            if let Some(ref sig) = signature {
                req = req.header("x-haulquote-signature", sig.as_str());
            }

            match req.body(payload.clone()).send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!(url, event_type = %event.event_type, attempt, "audit event delivered");
                    return Ok(());
                }
                Ok(resp) => {
                    warn!(url, status = %resp.status(), attempt, "audit delivery failed, will retry");
                }
                Err(e) => {
                    warn!(url, error = %e, attempt, "audit request error, will retry");
                }
            }
        }

        Err(anyhow::anyhow!("audit delivery failed after retries: {}", url))
    }
}
