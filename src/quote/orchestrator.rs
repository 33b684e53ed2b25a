//! The quote state machine.
//!
//! `Validating -> ResolvingLocation -> Pricing -> Assembling -> Done`,
//! with `Failed` reachable from any state. A fresh fingerprint hit in
//! the quote tier jumps straight to `Done` with the cached result.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditSink};
use crate::cache::{Tier, TieredCache};
use crate::errors::AppError;
use crate::models::location::{Coordinates, GeocodeResult};
use crate::models::quote::{
    CacheOutcome, CalculationTrace, QuoteOutcome, QuoteRequest, QuoteResult,
};
use crate::models::rate_table::RateTable;
use crate::quote::fingerprint::fingerprint;
use crate::rates::RateTableHandle;
use crate::resolve::zone::{classify, nearest_branch, ZoneAssignment};
use crate::resolve::{DistanceResolver, GeocodeResolver};

/// Zone-tier cache payload: the classified assignment plus the distance
/// it was derived from. Keyed by rounded coordinates and the rate-table
/// version, so a table swap invalidates it implicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ZoneResolution {
    assignment: ZoneAssignment,
    distance_miles: f64,
    drive_time_minutes: Option<f64>,
    estimated: bool,
}

fn zone_cache_key(coords: Coordinates, version: &str) -> String {
    format!("{:.4},{:.4}|{}", coords.lat, coords.lon, version)
}

/// Response for the location-only lookup endpoint. Resolving it warms
/// the geocode, distance, and zone tiers for a later quote.
#[derive(Debug, Clone, Serialize)]
pub struct LocationInfo {
    pub coords: Coordinates,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub branch_id: Option<String>,
    pub distance_miles: f64,
    pub zone: Option<String>,
    pub in_service_area: bool,
}

pub struct QuoteService {
    cache: Arc<TieredCache>,
    rates: RateTableHandle,
    geocoder: GeocodeResolver,
    distance: DistanceResolver,
    audit: AuditSink,
    max_address_len: usize,
}

impl QuoteService {
    pub fn new(
        cache: Arc<TieredCache>,
        rates: RateTableHandle,
        geocoder: GeocodeResolver,
        distance: DistanceResolver,
        audit: AuditSink,
        max_address_len: usize,
    ) -> Self {
        Self {
            cache,
            rates,
            geocoder,
            distance,
            audit,
            max_address_len,
        }
    }

    pub fn rates(&self) -> &RateTableHandle {
        &self.rates
    }

    /// Produce a quote (or the out-of-area outcome) for a request.
    #[instrument(skip(self, request), fields(trailer_type = %request.trailer_type))]
    pub async fn quote(
        &self,
        request: &QuoteRequest,
        request_id: &str,
    ) -> Result<QuoteOutcome, AppError> {
        let table = self.rates.current().await;
        let mut trace = CalculationTrace::default();

        // Validating: reject before any resolution or calculation.
        self.validate(request, &table)?;
        trace.push("validating", "request accepted");

        let key = fingerprint(request, &table.version);
        if let Some(cached) = self.cache.get::<QuoteResult>(Tier::Quote, &key).await {
            if cached.expires_at > Utc::now() {
                trace.push_cached("done", "served from quote cache", CacheOutcome::Hit, None);
                let outcome = QuoteOutcome::Priced(cached);
                crate::metrics::quote_outcome("cached");
                self.audit
                    .dispatch(AuditEvent::for_outcome(request_id, &outcome, true, trace));
                return Ok(outcome);
            }
        }

        // ResolvingLocation.
        let (location, geo_cache) = self.geocoder.resolve(&request.delivery_address).await?;
        trace.push_cached(
            "resolving_location",
            format!("({:.4}, {:.4})", location.coords.lat, location.coords.lon),
            geo_cache,
            Some(location.coords.source.as_str().to_string()),
        );

        let resolution = self.resolve_zone(&table, &location, &mut trace).await?;
        let (zone, branch_id) = match resolution.assignment {
            ZoneAssignment::InZone { zone, branch_id } => (zone, branch_id),
            ZoneAssignment::OutOfArea {
                max_zone_boundary,
                nearest_branch,
            } => {
                trace.push(
                    "failed",
                    format!("out of service area at {:.1} mi", resolution.distance_miles),
                );
                let outcome = QuoteOutcome::OutOfServiceArea {
                    distance_miles: resolution.distance_miles,
                    max_zone_boundary,
                    nearest_branch: nearest_branch.unwrap_or_default(),
                };
                crate::metrics::quote_outcome("out_of_service_area");
                self.audit
                    .dispatch(AuditEvent::for_outcome(request_id, &outcome, false, trace));
                return Ok(outcome);
            }
        };

        // Pricing.
        let amounts = crate::pricing::price(
            &table,
            request,
            &zone,
            resolution.distance_miles,
            &location,
            &mut trace,
        )?;

        // Assembling.
        let result = QuoteResult {
            quote_id: Uuid::new_v4(),
            base_cost: amounts.base_cost,
            delivery_cost: amounts.delivery_cost,
            extras_cost: amounts.extras_cost,
            extras: amounts.extras,
            discounts: amounts.discounts,
            subtotal: amounts.subtotal,
            tax_amount: amounts.tax_amount,
            tax_reason: amounts.tax_reason,
            total: amounts.total,
            currency: "USD".to_string(),
            zone: zone.name,
            distance_miles: resolution.distance_miles,
            branch_id,
            delivery_coords: location.coords,
            trace: trace.clone(),
            pricing_version: table.version.clone(),
            expires_at: Utc::now()
                + chrono::Duration::from_std(self.cache.ttl(Tier::Quote))
                    .unwrap_or_else(|_| chrono::Duration::minutes(5)),
        };
        self.cache.put(Tier::Quote, &key, &result).await;

        info!(
            quote_id = %result.quote_id,
            total = %result.total,
            zone = %result.zone,
            "quote issued"
        );
        let outcome = QuoteOutcome::Priced(result);
        crate::metrics::quote_outcome("priced");
        self.audit
            .dispatch(AuditEvent::for_outcome(request_id, &outcome, false, trace));
        Ok(outcome)
    }

    /// Location-only lookup, shares every cache tier with quoting.
    pub async fn locate(&self, address: &str) -> Result<LocationInfo, AppError> {
        let table = self.rates.current().await;
        if address.trim().is_empty() || address.len() > self.max_address_len {
            return Err(AppError::validation(
                "invalid_address",
                format!("address must be 1-{} characters", self.max_address_len),
            ));
        }

        let (location, _) = self.geocoder.resolve(address).await?;
        let mut trace = CalculationTrace::default();
        let resolution = self.resolve_zone(&table, &location, &mut trace).await?;

        let (zone, branch_id, in_area) = match &resolution.assignment {
            ZoneAssignment::InZone { zone, branch_id } => {
                (Some(zone.name.clone()), Some(branch_id.clone()), true)
            }
            ZoneAssignment::OutOfArea { nearest_branch, .. } => {
                (None, nearest_branch.clone(), false)
            }
        };

        Ok(LocationInfo {
            coords: location.coords,
            city: location.city,
            state: location.state,
            postal_code: location.postal_code,
            branch_id,
            distance_miles: resolution.distance_miles,
            zone,
            in_service_area: in_area,
        })
    }

    fn validate(&self, request: &QuoteRequest, table: &RateTable) -> Result<(), AppError> {
        let address = request.delivery_address.trim();
        if address.is_empty() || address.len() > self.max_address_len {
            return Err(AppError::validation(
                "invalid_address",
                format!("delivery address must be 1-{} characters", self.max_address_len),
            ));
        }
        if request.rental_days == 0 {
            return Err(AppError::validation(
                "invalid_rental_days",
                "rental_days must be at least 1",
            ));
        }
        if table.trailer_rate(&request.trailer_type).is_none() {
            return Err(AppError::validation(
                "unknown_trailer_type",
                format!("trailer type '{}' is not configured", request.trailer_type),
            ));
        }
        if table.usage_multiplier(&request.usage_type).is_none() {
            return Err(AppError::validation(
                "unknown_usage_type",
                format!("usage type '{}' is not configured", request.usage_type),
            ));
        }
        Ok(())
    }

    /// Branch selection, distance, and zone classification, cached as a
    /// unit in the zone tier.
    async fn resolve_zone(
        &self,
        table: &RateTable,
        location: &GeocodeResult,
        trace: &mut CalculationTrace,
    ) -> Result<ZoneResolution, AppError> {
        let key = zone_cache_key(location.coords, &table.version);
        if let Some(cached) = self.cache.get::<ZoneResolution>(Tier::Zone, &key).await {
            trace.push_cached(
                "resolving_location",
                format!("zone at {:.1} mi", cached.distance_miles),
                CacheOutcome::Hit,
                None,
            );
            return Ok(cached);
        }

        let (branch, _) = nearest_branch(&table.branches, location.coords).ok_or_else(|| {
            AppError::Configuration("rate table has no branches".to_string())
        })?;
        let (estimate, dist_cache) = self
            .distance
            .resolve(branch.coordinates, location.coords)
            .await;
        let assignment = classify(table, branch, estimate.miles);

        let resolution = ZoneResolution {
            assignment,
            distance_miles: estimate.miles,
            drive_time_minutes: estimate.drive_time_minutes,
            estimated: estimate.estimated,
        };
        trace.push_cached(
            "resolving_location",
            format!(
                "branch {} at {:.1} mi{}",
                branch.id,
                estimate.miles,
                if estimate.estimated { " (estimated)" } else { "" }
            ),
            dist_cache,
            None,
        );
        self.cache.put(Tier::Zone, &key, &resolution).await;
        Ok(resolution)
    }
}
