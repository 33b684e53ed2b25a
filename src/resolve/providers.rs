//! HTTP clients for the external geocoding and routing providers.
//!
//! Every client carries a hard request timeout and at most ONE transient
//! retry (exponential backoff via reqwest-retry), keeping the end-to-end
//! latency budget intact. Fallback beyond that is the caller's job.

use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::models::location::{CoordinateSource, Coordinates, GeocodeResult};

#[derive(Debug, Error)]
pub enum ProviderFailure {
    #[error("provider timed out")]
    Timeout,
    #[error("provider rate-limited the request")]
    RateLimited,
    #[error("no result for the input")]
    NotFound,
    #[error("provider error: {0}")]
    Http(String),
}

impl ProviderFailure {
    fn from_middleware(e: reqwest_middleware::Error) -> Self {
        match e {
            reqwest_middleware::Error::Reqwest(re) if re.is_timeout() => ProviderFailure::Timeout,
            other => ProviderFailure::Http(other.to_string()),
        }
    }
}

fn build_client(timeout_ms: u64) -> ClientWithMiddleware {
    let reqwest_client = reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(Duration::from_millis(timeout_ms))
        .connect_timeout(Duration::from_millis(timeout_ms.min(1_500)))
        .user_agent("HaulQuote/1.0")
        .build()
        .expect("failed to build provider HTTP client");

    // Bounded resilience: exactly one retry per external call.
    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(1);
    ClientBuilder::new(reqwest_client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build()
}

fn check_status(status: reqwest::StatusCode) -> Result<(), ProviderFailure> {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(ProviderFailure::RateLimited);
    }
    if !status.is_success() {
        return Err(ProviderFailure::Http(format!("status {}", status)));
    }
    Ok(())
}

// ── Primary geocoder (Google-style JSON shape) ───────────────

#[derive(Clone)]
pub struct PrimaryGeocoder {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: Option<String>,
}

impl PrimaryGeocoder {
    pub fn new(base_url: String, api_key: Option<String>, timeout_ms: u64) -> Self {
        Self {
            client: build_client(timeout_ms),
            base_url,
            api_key,
        }
    }

    pub async fn geocode(&self, address: &str) -> Result<GeocodeResult, ProviderFailure> {
        let mut query: Vec<(&str, String)> = vec![("address", address.to_string())];
        if let Some(key) = &self.api_key {
            query.push(("key", key.clone()));
        }

        let resp = self
            .client
            .get(&self.base_url)
            .query(&query)
            .send()
            .await
            .map_err(ProviderFailure::from_middleware)?;
        check_status(resp.status())?;

        let body: Value = resp
            .json()
            .await
            .map_err(|e| ProviderFailure::Http(e.to_string()))?;
        parse_primary_response(&body)
    }
}

/// Pull coordinates and locality components out of the first result.
fn parse_primary_response(body: &Value) -> Result<GeocodeResult, ProviderFailure> {
    if body.get("status").and_then(|s| s.as_str()) == Some("OVER_QUERY_LIMIT") {
        return Err(ProviderFailure::RateLimited);
    }

    let first = body
        .get("results")
        .and_then(|r| r.as_array())
        .and_then(|arr| arr.first())
        .ok_or(ProviderFailure::NotFound)?;

    let location = first
        .pointer("/geometry/location")
        .ok_or(ProviderFailure::NotFound)?;
    let lat = location.get("lat").and_then(|v| v.as_f64());
    let lon = location.get("lng").and_then(|v| v.as_f64());
    let (lat, lon) = match (lat, lon) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => return Err(ProviderFailure::NotFound),
    };

    let mut city = None;
    let mut state = None;
    let mut postal_code = None;
    if let Some(components) = first.get("address_components").and_then(|c| c.as_array()) {
        for comp in components {
            let types: Vec<&str> = comp
                .get("types")
                .and_then(|t| t.as_array())
                .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
                .unwrap_or_default();
            let long = comp.get("long_name").and_then(|v| v.as_str());
            let short = comp.get("short_name").and_then(|v| v.as_str());
            if types.contains(&"locality") {
                city = long.map(String::from);
            } else if types.contains(&"administrative_area_level_1") {
                state = short.map(String::from);
            } else if types.contains(&"postal_code") {
                postal_code = long.map(String::from);
            }
        }
    }

    Ok(GeocodeResult {
        coords: Coordinates::new(lat, lon, CoordinateSource::PrimaryGeocoder),
        city,
        state,
        postal_code,
    })
}

// ── Secondary open geocoder (Nominatim-style JSON shape) ─────

#[derive(Clone)]
pub struct OpenGeocoder {
    client: ClientWithMiddleware,
    base_url: String,
}

impl OpenGeocoder {
    pub fn new(base_url: String, timeout_ms: u64) -> Self {
        Self {
            client: build_client(timeout_ms),
            base_url,
        }
    }

    pub async fn geocode(&self, address: &str) -> Result<GeocodeResult, ProviderFailure> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", address),
                ("format", "json"),
                ("addressdetails", "1"),
                ("limit", "1"),
            ])
            .send()
            .await
            .map_err(ProviderFailure::from_middleware)?;
        check_status(resp.status())?;

        let body: Value = resp
            .json()
            .await
            .map_err(|e| ProviderFailure::Http(e.to_string()))?;
        parse_open_response(&body)
    }
}

fn parse_open_response(body: &Value) -> Result<GeocodeResult, ProviderFailure> {
    let first = body
        .as_array()
        .and_then(|arr| arr.first())
        .ok_or(ProviderFailure::NotFound)?;

    // Open providers return lat/lon as strings.
    let lat = first
        .get("lat")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<f64>().ok());
    let lon = first
        .get("lon")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<f64>().ok());
    let (lat, lon) = match (lat, lon) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => return Err(ProviderFailure::NotFound),
    };

    let address = first.get("address");
    let pick = |keys: &[&str]| -> Option<String> {
        let addr = address?;
        keys.iter()
            .find_map(|k| addr.get(*k).and_then(|v| v.as_str()))
            .map(String::from)
    };

    Ok(GeocodeResult {
        coords: Coordinates::new(lat, lon, CoordinateSource::OpenGeocoder),
        city: pick(&["city", "town", "village"]),
        state: pick(&["state_code", "state"]),
        postal_code: pick(&["postcode"]),
    })
}

// ── Routing provider (OSRM-style JSON shape) ─────────────────

const METERS_PER_MILE: f64 = 1609.344;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteEstimate {
    pub miles: f64,
    pub drive_time_minutes: f64,
}

#[derive(Clone)]
pub struct RoutingProvider {
    client: ClientWithMiddleware,
    base_url: String,
}

impl RoutingProvider {
    pub fn new(base_url: String, timeout_ms: u64) -> Self {
        Self {
            client: build_client(timeout_ms),
            base_url,
        }
    }

    pub async fn route(
        &self,
        from: Coordinates,
        to: Coordinates,
    ) -> Result<RouteEstimate, ProviderFailure> {
        let url = format!(
            "{}/{:.6},{:.6};{:.6},{:.6}",
            self.base_url, from.lon, from.lat, to.lon, to.lat
        );
        let resp = self
            .client
            .get(&url)
            .query(&[("overview", "false")])
            .send()
            .await
            .map_err(ProviderFailure::from_middleware)?;
        check_status(resp.status())?;

        let body: Value = resp
            .json()
            .await
            .map_err(|e| ProviderFailure::Http(e.to_string()))?;
        parse_route_response(&body)
    }
}

fn parse_route_response(body: &Value) -> Result<RouteEstimate, ProviderFailure> {
    let first = body
        .get("routes")
        .and_then(|r| r.as_array())
        .and_then(|arr| arr.first())
        .ok_or(ProviderFailure::NotFound)?;

    let meters = first.get("distance").and_then(|v| v.as_f64());
    let seconds = first.get("duration").and_then(|v| v.as_f64());
    match (meters, seconds) {
        (Some(m), Some(s)) => Ok(RouteEstimate {
            miles: m / METERS_PER_MILE,
            drive_time_minutes: s / 60.0,
        }),
        _ => Err(ProviderFailure::NotFound),
    }
}
