//! Last-resort geocoding from a built-in centroid table.
//!
//! Lookup order: 5-digit ZIP found anywhere in the address, then ZIP
//! 3-digit prefix, then a "city, st" match. Coordinates are city or
//! prefix-area centroids, so results are tagged as low accuracy.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::models::location::{CoordinateSource, Coordinates, GeocodeResult};

struct Centroid {
    lat: f64,
    lon: f64,
    city: &'static str,
    state: &'static str,
}

static ZIP_PREFIXES: Lazy<HashMap<&'static str, Centroid>> = Lazy::new(|| {
    let mut m = HashMap::new();
    // (prefix, lat, lon, city, state)
    let rows: &[(&str, f64, f64, &str, &str)] = &[
        ("750", 32.9126, -96.6389, "Richardson", "TX"),
        ("751", 32.7157, -96.5888, "Mesquite", "TX"),
        ("752", 32.7767, -96.7970, "Dallas", "TX"),
        ("753", 32.7767, -96.7970, "Dallas", "TX"),
        ("760", 32.7555, -97.3308, "Fort Worth", "TX"),
        ("761", 32.7555, -97.3308, "Fort Worth", "TX"),
        ("762", 33.2148, -97.1331, "Denton", "TX"),
        ("765", 31.5493, -97.1467, "Waco", "TX"),
        ("770", 29.7604, -95.3698, "Houston", "TX"),
        ("773", 30.3119, -95.4561, "Conroe", "TX"),
        ("782", 29.4241, -98.4936, "San Antonio", "TX"),
        ("787", 30.2672, -97.7431, "Austin", "TX"),
        ("790", 35.2220, -101.8313, "Amarillo", "TX"),
        ("794", 33.5779, -101.8552, "Lubbock", "TX"),
        ("797", 31.9973, -102.0779, "Midland", "TX"),
        ("799", 31.7619, -106.4850, "El Paso", "TX"),
        ("730", 35.4676, -97.5164, "Oklahoma City", "OK"),
        ("731", 35.4676, -97.5164, "Oklahoma City", "OK"),
        ("735", 34.6087, -98.3903, "Lawton", "OK"),
        ("740", 36.1540, -95.9928, "Tulsa", "OK"),
        ("741", 36.1540, -95.9928, "Tulsa", "OK"),
        ("744", 35.7479, -95.3697, "Muskogee", "OK"),
        ("746", 36.3956, -97.8784, "Enid", "OK"),
        ("716", 34.2232, -92.0032, "Pine Bluff", "AR"),
        ("718", 33.4418, -94.0377, "Texarkana", "TX"),
        ("710", 32.5252, -93.7502, "Shreveport", "LA"),
        ("871", 35.0844, -106.6504, "Albuquerque", "NM"),
        ("880", 32.3199, -106.7637, "Las Cruces", "NM"),
        ("670", 37.6872, -97.3301, "Wichita", "KS"),
    ];
    for &(prefix, lat, lon, city, state) in rows {
        m.insert(prefix, Centroid { lat, lon, city, state });
    }
    m
});

static CITIES: Lazy<HashMap<&'static str, Centroid>> = Lazy::new(|| {
    let mut m = HashMap::new();
    let rows: &[(&str, f64, f64, &str, &str)] = &[
        ("dallas, tx", 32.7767, -96.7970, "Dallas", "TX"),
        ("fort worth, tx", 32.7555, -97.3308, "Fort Worth", "TX"),
        ("arlington, tx", 32.7357, -97.1081, "Arlington", "TX"),
        ("plano, tx", 33.0198, -96.6989, "Plano", "TX"),
        ("denton, tx", 33.2148, -97.1331, "Denton", "TX"),
        ("waco, tx", 31.5493, -97.1467, "Waco", "TX"),
        ("austin, tx", 30.2672, -97.7431, "Austin", "TX"),
        ("houston, tx", 29.7604, -95.3698, "Houston", "TX"),
        ("san antonio, tx", 29.4241, -98.4936, "San Antonio", "TX"),
        ("lubbock, tx", 33.5779, -101.8552, "Lubbock", "TX"),
        ("amarillo, tx", 35.2220, -101.8313, "Amarillo", "TX"),
        ("el paso, tx", 31.7619, -106.4850, "El Paso", "TX"),
        ("tyler, tx", 32.3513, -95.3011, "Tyler", "TX"),
        ("abilene, tx", 32.4487, -99.7331, "Abilene", "TX"),
        ("wichita falls, tx", 33.9137, -98.4934, "Wichita Falls", "TX"),
        ("oklahoma city, ok", 35.4676, -97.5164, "Oklahoma City", "OK"),
        ("tulsa, ok", 36.1540, -95.9928, "Tulsa", "OK"),
        ("norman, ok", 35.2226, -97.4395, "Norman", "OK"),
        ("lawton, ok", 34.6087, -98.3903, "Lawton", "OK"),
        ("shreveport, la", 32.5252, -93.7502, "Shreveport", "LA"),
        ("little rock, ar", 34.7465, -92.2896, "Little Rock", "AR"),
        ("wichita, ks", 37.6872, -97.3301, "Wichita", "KS"),
        ("albuquerque, nm", 35.0844, -106.6504, "Albuquerque", "NM"),
    ];
    for &(key, lat, lon, city, state) in rows {
        m.insert(key, Centroid { lat, lon, city, state });
    }
    m
});

/// Centroid accuracy is on the order of a city radius.
const CENTROID_ACCURACY_MILES: f64 = 15.0;

fn result_from(c: &Centroid, postal_code: Option<String>) -> GeocodeResult {
    let mut coords = Coordinates::new(c.lat, c.lon, CoordinateSource::CentroidTable);
    coords.accuracy = Some(CENTROID_ACCURACY_MILES);
    GeocodeResult {
        coords,
        city: Some(c.city.to_string()),
        state: Some(c.state.to_string()),
        postal_code,
    }
}

fn find_zip(address: &str) -> Option<String> {
    let bytes = address.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i - start == 5 {
                return Some(address[start..i].to_string());
            }
        } else {
            i += 1;
        }
    }
    None
}

/// Resolve an already-normalized (lowercased, single-spaced) address
/// against the built-in table.
pub fn lookup(normalized_address: &str) -> Option<GeocodeResult> {
    if let Some(zip) = find_zip(normalized_address) {
        if let Some(c) = ZIP_PREFIXES.get(&zip[..3]) {
            return Some(result_from(c, Some(zip)));
        }
    }
    // Scan for any known "city, st" pair inside the address.
    for (key, c) in CITIES.iter() {
        if normalized_address.contains(key) {
            return Some(result_from(c, None));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zip_hit_beats_city() {
        let r = lookup("123 main st, dallas, tx 75201").unwrap();
        assert_eq!(r.postal_code.as_deref(), Some("75201"));
        assert_eq!(r.city.as_deref(), Some("Dallas"));
        assert_eq!(r.coords.source, CoordinateSource::CentroidTable);
        assert!(r.coords.accuracy.is_some());
    }

    #[test]
    fn test_city_state_fallback_without_zip() {
        let r = lookup("somewhere on route 66, tulsa, ok").unwrap();
        assert_eq!(r.state.as_deref(), Some("OK"));
        assert!((r.coords.lat - 36.1540).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_address_misses() {
        assert!(lookup("1600 pennsylvania ave, washington, dc 20500").is_none());
        assert!(lookup("gibberish with no location").is_none());
    }

    #[test]
    fn test_house_number_is_not_a_zip() {
        // 4-digit street numbers must not be mistaken for ZIPs.
        let r = lookup("4821 elm st, waco, tx").unwrap();
        assert!(r.postal_code.is_none());
        assert_eq!(r.city.as_deref(), Some("Waco"));
    }
}
