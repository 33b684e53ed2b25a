//! Location resolution: geocoding, driving distance, and zone
//! classification, each with its own cache tier.

pub mod centroids;
pub mod distance;
pub mod geocode;
pub mod providers;
pub mod zone;

pub use distance::DistanceResolver;
pub use geocode::GeocodeResolver;
