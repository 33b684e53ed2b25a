//! Branch selection and delivery-zone classification.
//!
//! Both functions are pure; the quote pipeline caches their combined
//! result keyed by rounded coordinates plus the rate-table version, so
//! a rate-table swap naturally invalidates stale assignments.

use serde::{Deserialize, Serialize};

use crate::models::location::Coordinates;
use crate::models::rate_table::{Branch, RateTable, ServiceZone};
use crate::resolve::distance::haversine_miles;

/// Outcome of classifying a delivery point against the rate table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "assignment")]
pub enum ZoneAssignment {
    InZone {
        zone: ServiceZone,
        branch_id: String,
    },
    OutOfArea {
        max_zone_boundary: Option<f64>,
        nearest_branch: Option<String>,
    },
}

/// Pick the serving branch: minimum great-circle distance, priority
/// breaking ties. Returns the branch with its distance to the point.
pub fn nearest_branch(branches: &[Branch], point: Coordinates) -> Option<(&Branch, f64)> {
    branches
        .iter()
        .map(|b| (b, haversine_miles(b.coordinates, point)))
        .min_by(|(a, da), (b, db)| {
            da.partial_cmp(db)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.priority.cmp(&b.priority))
        })
}

/// Classify a resolved driving distance into the narrowest zone whose
/// boundary covers it. Zones are pre-sorted ascending at load time, so
/// the first match wins.
pub fn classify(table: &RateTable, branch: &Branch, distance_miles: f64) -> ZoneAssignment {
    for zone in &table.delivery_zones {
        if distance_miles <= zone.max_distance {
            return ZoneAssignment::InZone {
                zone: zone.clone(),
                branch_id: branch.id.clone(),
            };
        }
    }
    ZoneAssignment::OutOfArea {
        max_zone_boundary: table.max_zone_boundary(),
        nearest_branch: Some(branch.id.clone()),
    }
}
