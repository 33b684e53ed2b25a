use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::quote::{QuoteOutcome, QuoteRequest};
use crate::quote::LocationInfo;
use crate::AppState;

// ── Request / Response DTOs ──────────────────────────────────

#[derive(Deserialize)]
pub struct LocationParams {
    pub address: String,
}

#[derive(Serialize)]
pub struct RatesSnapshotResponse {
    pub version: String,
    pub effective_date: String,
    pub trailer_types: usize,
    pub usage_types: usize,
    pub extras: usize,
    pub zones: usize,
    pub branches: usize,
    pub discount_rules: usize,
}

#[derive(Serialize)]
pub struct ReloadResponse {
    pub version: String,
    pub reloaded: bool,
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

// ── Handlers ─────────────────────────────────────────────────

/// POST /api/v1/quotes — run the full quote pipeline.
pub async fn create_quote(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<QuoteOutcome>, AppError> {
    let request_id = request_id(&headers);
    let outcome = state.service.quote(&request, &request_id).await?;
    Ok(Json(outcome))
}

/// GET /api/v1/location?address=… — location-only lookup. Resolving it
/// pre-warms the geocode/distance/zone cache tiers for a later quote.
pub async fn get_location(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LocationParams>,
) -> Result<Json<LocationInfo>, AppError> {
    let info = state.service.locate(&params.address).await?;
    Ok(Json(info))
}

/// GET /api/v1/rates — current snapshot summary (admin).
pub async fn get_rates(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RatesSnapshotResponse>, AppError> {
    let table = state.rates.current().await;
    Ok(Json(RatesSnapshotResponse {
        version: table.version.clone(),
        effective_date: table.effective_date.to_string(),
        trailer_types: table.trailer_rates.len(),
        usage_types: table.usage_multipliers.len(),
        extras: table.extras_catalog.len(),
        zones: table.delivery_zones.len(),
        branches: table.branches.len(),
        discount_rules: table.discount_rules.len(),
    }))
}

/// POST /api/v1/rates/reload — force a refresh from the source (admin).
/// A failed load keeps the current snapshot.
pub async fn reload_rates(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReloadResponse>, AppError> {
    let table = state.loader.load().await.map_err(AppError::Internal)?;
    let version = table.version.clone();
    state.rates.swap(table).await;
    Ok(Json(ReloadResponse {
        version,
        reloaded: true,
    }))
}
