//! Distance routing and final report assembly.

use chrono::Utc;

use nearby_core::{Coordinates, PlaceRecord, ScrapeReport};

/// Records split by whether they fall inside the search radius.
#[derive(Debug, Default)]
pub(crate) struct Partition {
    pub within: Vec<PlaceRecord>,
    pub outside: Vec<PlaceRecord>,
}

impl Partition {
    /// Route a record by its distance from the center. The radius boundary
    /// itself is inside. A record whose distance could not be established is
    /// kept rather than silently dropped, with a warning.
    pub fn route(&mut self, record: PlaceRecord, radius_km: f64) {
        match record.distance_km {
            Some(distance) if distance > radius_km => {
                tracing::debug!(
                    name = %record.business_name,
                    distance_km = distance,
                    radius_km,
                    "place outside radius, excluding"
                );
                self.outside.push(record);
            }
            Some(_) => self.within.push(record),
            None => {
                tracing::warn!(
                    url = %record.google_maps_url,
                    "place distance unknown, keeping it in results"
                );
                self.within.push(record);
            }
        }
    }
}

/// Sort ascending by distance; records without one go last, original order
/// preserved among equals.
pub(crate) fn sort_by_distance(records: &mut [PlaceRecord]) {
    records.sort_by(|a, b| {
        let da = a.distance_km.unwrap_or(f64::INFINITY);
        let db = b.distance_km.unwrap_or(f64::INFINITY);
        da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
    });
}

pub(crate) struct ReportContext {
    pub input_url: String,
    pub resolved_url: String,
    pub search_url: String,
    pub radius_km: f64,
    pub center: Coordinates,
    pub zoom_level: u8,
    pub desired_results: usize,
    pub total_processed: usize,
}

pub(crate) fn build_report(ctx: ReportContext, mut partition: Partition) -> ScrapeReport {
    sort_by_distance(&mut partition.within);
    ScrapeReport {
        input_url: ctx.input_url,
        resolved_url: ctx.resolved_url,
        search_url: ctx.search_url,
        radius_km: ctx.radius_km,
        coordinates: ctx.center,
        zoom_level: ctx.zoom_level,
        timestamp: Utc::now(),
        desired_results: ctx.desired_results,
        total_processed: ctx.total_processed,
        within_radius: partition.within.len(),
        excluded_outside_radius: partition.outside.len(),
        data: partition.within,
        excluded_data: partition.outside,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(distance_km: Option<f64>) -> PlaceRecord {
        let mut rec = PlaceRecord::unknown("https://maps.example/place/x");
        rec.distance_km = distance_km;
        rec
    }

    #[test]
    fn boundary_distance_is_within() {
        let mut partition = Partition::default();
        partition.route(record(Some(5.0)), 5.0);
        partition.route(record(Some(5.01)), 5.0);
        assert_eq!(partition.within.len(), 1);
        assert_eq!(partition.outside.len(), 1);
    }

    #[test]
    fn unknown_distance_is_kept() {
        let mut partition = Partition::default();
        partition.route(record(None), 5.0);
        assert_eq!(partition.within.len(), 1);
        assert!(partition.outside.is_empty());
    }

    #[test]
    fn sort_places_unknown_distance_last() {
        let mut records = vec![
            record(Some(3.2)),
            record(None),
            record(Some(0.4)),
            record(Some(1.1)),
        ];
        sort_by_distance(&mut records);
        let order: Vec<Option<f64>> = records.iter().map(|r| r.distance_km).collect();
        assert_eq!(order, vec![Some(0.4), Some(1.1), Some(3.2), None]);
    }

    #[test]
    fn report_counts_match_partition_sizes() {
        let mut partition = Partition::default();
        partition.route(record(Some(1.0)), 5.0);
        partition.route(record(Some(9.0)), 5.0);
        partition.route(record(Some(0.5)), 5.0);

        let report = build_report(
            ReportContext {
                input_url: "in".to_owned(),
                resolved_url: "resolved".to_owned(),
                search_url: "search".to_owned(),
                radius_km: 5.0,
                center: Coordinates {
                    lat: 25.0,
                    lng: 55.0,
                },
                zoom_level: 13,
                desired_results: 10,
                total_processed: 3,
            },
            partition,
        );

        assert_eq!(report.within_radius, 2);
        assert_eq!(report.excluded_outside_radius, 1);
        assert_eq!(report.data.len(), 2);
        assert_eq!(report.data[0].distance_km, Some(0.5));
        assert_eq!(report.excluded_data.len(), 1);
    }
}
