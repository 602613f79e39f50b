//! Domain types shared between the scraping pipeline and its callers.
//!
//! ## Wire format
//!
//! `PlaceRecord` and `ScrapeReport` serialize with snake_case field names
//! matching the public scrape API. Records are fixed-width: every field is
//! always present, with `"N/A"` / `"0"` / empty-list sentinels instead of
//! omitted keys, so downstream consumers never branch on key existence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel for string fields with no extracted value.
pub const UNKNOWN: &str = "N/A";

/// A WGS-84 coordinate pair, immutable once resolved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    /// Builds a coordinate pair, rejecting out-of-range values.
    #[must_use]
    pub fn new(lat: f64, lng: f64) -> Option<Self> {
        if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng) {
            Some(Self { lat, lng })
        } else {
            None
        }
    }
}

/// One discovered point of interest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceRecord {
    pub business_name: String,
    pub address: String,
    pub category: String,
    /// Rating in string form; `"N/A"` when not found.
    pub rating: String,
    /// Review count in string form, commas stripped; defaults to `"0"`.
    pub reviews_count: String,
    /// The result link this record was extracted from.
    pub google_maps_url: String,
    /// External (non-map) site for the place.
    pub company_url: String,
    pub phone: String,
    pub opening_hours: Vec<String>,
    pub price_level: String,
    /// Deduplicated, first-seen order, capped at 12 entries.
    pub attributes: Vec<String>,
    /// Capped at 10 entries.
    pub images: Vec<String>,
    pub description: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Present iff coordinates are present; haversine from the search center,
    /// rounded to 2 decimals.
    pub distance_km: Option<f64>,
    /// Flattened visible page text, truncated to 800 characters. Diagnostic
    /// fallback payload captured even when field extraction fails.
    pub raw_page_text_snippet: String,
}

impl PlaceRecord {
    /// A record with every field at its sentinel, tied to a source link.
    #[must_use]
    pub fn unknown(google_maps_url: &str) -> Self {
        Self {
            business_name: UNKNOWN.to_owned(),
            address: UNKNOWN.to_owned(),
            category: UNKNOWN.to_owned(),
            rating: UNKNOWN.to_owned(),
            reviews_count: "0".to_owned(),
            google_maps_url: google_maps_url.to_owned(),
            company_url: UNKNOWN.to_owned(),
            phone: UNKNOWN.to_owned(),
            opening_hours: Vec::new(),
            price_level: UNKNOWN.to_owned(),
            attributes: Vec::new(),
            images: Vec::new(),
            description: UNKNOWN.to_owned(),
            latitude: None,
            longitude: None,
            distance_km: None,
            raw_page_text_snippet: String::new(),
        }
    }

    /// The record's coordinates when both components were extracted.
    #[must_use]
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Coordinates::new(lat, lng),
            _ => None,
        }
    }
}

/// Final report for one scrape run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeReport {
    pub input_url: String,
    pub resolved_url: String,
    pub search_url: String,
    pub radius_km: f64,
    pub coordinates: Coordinates,
    pub zoom_level: u8,
    pub timestamp: DateTime<Utc>,
    pub desired_results: usize,
    /// Links handed to the extractor, successful or not.
    pub total_processed: usize,
    pub within_radius: usize,
    pub excluded_outside_radius: usize,
    /// Records within the radius, sorted ascending by distance; records with
    /// unknown distance sort last.
    pub data: Vec<PlaceRecord>,
    /// Records outside the radius, in discovery order.
    pub excluded_data: Vec<PlaceRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_reject_out_of_range() {
        assert!(Coordinates::new(91.0, 0.0).is_none());
        assert!(Coordinates::new(-91.0, 0.0).is_none());
        assert!(Coordinates::new(0.0, 181.0).is_none());
        assert!(Coordinates::new(0.0, -181.0).is_none());
        assert!(Coordinates::new(90.0, 180.0).is_some());
    }

    #[test]
    fn unknown_record_carries_sentinels() {
        let rec = PlaceRecord::unknown("https://maps.example/place/x");
        assert_eq!(rec.business_name, UNKNOWN);
        assert_eq!(rec.reviews_count, "0");
        assert_eq!(rec.google_maps_url, "https://maps.example/place/x");
        assert!(rec.opening_hours.is_empty());
        assert!(rec.distance_km.is_none());
        assert!(rec.coordinates().is_none());
    }

    #[test]
    fn record_coordinates_require_both_components() {
        let mut rec = PlaceRecord::unknown("x");
        rec.latitude = Some(25.2);
        assert!(rec.coordinates().is_none());
        rec.longitude = Some(55.3);
        let c = rec.coordinates().expect("both components set");
        assert!((c.lat - 25.2).abs() < f64::EPSILON);
    }
}
