//! Whole-quote cache key: a hash over every normalized request field
//! plus the pricing version, so a rate-table swap can never serve a
//! price computed under the old table.

use sha2::{Digest, Sha256};

use crate::models::quote::QuoteRequest;
use crate::resolve::geocode::normalize_address;

pub fn fingerprint(request: &QuoteRequest, pricing_version: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_address(&request.delivery_address).as_bytes());
    hasher.update(b"|");
    hasher.update(request.trailer_type.trim().to_lowercase().as_bytes());
    hasher.update(b"|");
    hasher.update(request.rental_days.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(request.usage_type.trim().to_lowercase().as_bytes());
    hasher.update(b"|");
    hasher.update(request.rental_start_date.to_string().as_bytes());
    hasher.update(b"|");
    // Extras are order-insensitive for caching purposes.
    let mut extras: Vec<String> = request
        .extras
        .iter()
        .map(|e| format!("{}:{}:{}", e.extra_id, e.quantity, e.hours.unwrap_or(0)))
        .collect();
    extras.sort();
    hasher.update(extras.join(",").as_bytes());
    hasher.update(b"|");
    hasher.update(if request.tax_exempt { b"1" } else { b"0" });
    hasher.update(b"|");
    hasher.update(pricing_version.as_bytes());
    hex::encode(hasher.finalize())
}
