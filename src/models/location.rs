use serde::{Deserialize, Serialize};

/// Where a coordinate pair came from. Provenance only — never used in
/// calculation, but always recorded in the trace for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSource {
    PrimaryGeocoder,
    OpenGeocoder,
    CentroidTable,
    Branch,
}

impl CoordinateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoordinateSource::PrimaryGeocoder => "primary_geocoder",
            CoordinateSource::OpenGeocoder => "open_geocoder",
            CoordinateSource::CentroidTable => "centroid_table",
            CoordinateSource::Branch => "branch",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
    /// Approximate accuracy radius in miles, when the provider reports one.
    pub accuracy: Option<f64>,
    pub source: CoordinateSource,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64, source: CoordinateSource) -> Self {
        Self {
            lat,
            lon,
            accuracy: None,
            source,
        }
    }
}

/// A resolved address: coordinates plus whatever locality components the
/// provider returned. City/state feed tax-rate resolution when present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub coords: Coordinates,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
}

impl GeocodeResult {
    pub fn bare(coords: Coordinates) -> Self {
        Self {
            coords,
            city: None,
            state: None,
            postal_code: None,
        }
    }
}

/// Distance between two points, in statute miles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceEstimate {
    pub miles: f64,
    /// None when the routing provider was unavailable and we fell back
    /// to great-circle distance.
    pub drive_time_minutes: Option<f64>,
    /// True for the haversine fallback path.
    pub estimated: bool,
}

impl DistanceEstimate {
    pub fn great_circle(miles: f64) -> Self {
        Self {
            miles,
            drive_time_minutes: None,
            estimated: true,
        }
    }
}
