//! Embedded structured metadata extraction.
//!
//! Place pages often carry schema.org JSON-LD with a geo sub-object, a
//! canonical site URL, opening hours, and a price range. This is the highest
//! precedence source in every field fallback chain.

use regex::Regex;

/// Structured fields pulled from `<script type="application/ld+json">` blocks.
#[derive(Debug, Default, Clone)]
pub(crate) struct PlaceMeta {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub site_url: Option<String>,
    pub opening_hours: Vec<String>,
    pub price_level: Option<String>,
}

impl PlaceMeta {
    fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

/// Scan the markup for JSON-LD blocks and merge them into one `PlaceMeta`.
///
/// Blocks and items are visited in document order; for each field the first
/// non-empty value wins. Scanning stops early once coordinates plus either a
/// site URL or opening hours are known.
pub(crate) fn extract_place_meta(markup: &str) -> PlaceMeta {
    let script_re = Regex::new(
        r#"(?is)<script[^>]+type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#,
    )
    .expect("valid regex");

    let mut meta = PlaceMeta::default();

    for cap in script_re.captures_iter(markup) {
        let Some(json_text) = cap.get(1) else { continue };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(json_text.as_str()) else {
            continue;
        };

        let mut items: Vec<serde_json::Value> = if let Some(arr) = value.as_array() {
            arr.clone()
        } else {
            vec![value]
        };

        // Expand @graph containers: sites commonly wrap structured data
        // inside {"@graph": [...]} at the top level.
        let mut expanded = Vec::new();
        for item in &items {
            if let Some(graph) = item.get("@graph").and_then(serde_json::Value::as_array) {
                expanded.extend(graph.iter().cloned());
            }
        }
        items.extend(expanded);

        for item in &items {
            if item.is_object() {
                merge_item(&mut meta, item);
            }
        }

        if meta.has_coordinates() && (meta.site_url.is_some() || !meta.opening_hours.is_empty()) {
            break;
        }
    }

    meta
}

fn merge_item(meta: &mut PlaceMeta, item: &serde_json::Value) {
    if !meta.has_coordinates() {
        // geo may sit at the top level or under a location object.
        let geo = item
            .get("geo")
            .or_else(|| item.get("location").and_then(|l| l.get("geo")));
        if let Some(geo) = geo.filter(|g| g.is_object()) {
            let lat = number_field(geo, &["latitude", "lat"]);
            let lng = number_field(geo, &["longitude", "lng"]);
            if let (Some(lat), Some(lng)) = (lat, lng) {
                meta.latitude = Some(lat);
                meta.longitude = Some(lng);
            }
        }
    }

    if meta.site_url.is_none() {
        let url_field = item
            .get("url")
            .or_else(|| item.get("mainEntityOfPage"))
            .or_else(|| item.get("sameAs"));
        meta.site_url = match url_field {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(serde_json::Value::Array(arr)) => arr
                .iter()
                .find_map(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned),
            _ => None,
        };
    }

    if meta.opening_hours.is_empty() {
        let hours_field = item
            .get("openingHoursSpecification")
            .or_else(|| item.get("openingHours"));
        match hours_field {
            Some(serde_json::Value::Array(specs)) => {
                let mut hours = Vec::new();
                for spec in specs {
                    if let Some(line) = hours_line(spec) {
                        hours.push(line);
                    } else if let Some(s) = spec.as_str() {
                        hours.push(s.to_owned());
                    }
                }
                meta.opening_hours = hours;
            }
            // openingHours is sometimes a single string.
            Some(serde_json::Value::String(s)) if !s.is_empty() => {
                meta.opening_hours = vec![s.clone()];
            }
            _ => {}
        }
    }

    if meta.price_level.is_none() {
        let price = item.get("priceRange").or_else(|| item.get("price"));
        meta.price_level = match price {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
    }
}

/// Format one `openingHoursSpecification` object as `"Day: opens - closes"`.
fn hours_line(spec: &serde_json::Value) -> Option<String> {
    let day = spec
        .get("dayOfWeek")
        .or_else(|| spec.get("day"))
        .and_then(day_name)?;
    let opens = spec
        .get("opens")
        .or_else(|| spec.get("openingTime"))
        .and_then(|v| v.as_str())?;
    let closes = spec
        .get("closes")
        .or_else(|| spec.get("closingTime"))
        .and_then(|v| v.as_str())?;
    Some(format!("{day}: {opens} - {closes}"))
}

fn day_name(value: &serde_json::Value) -> Option<String> {
    let raw = match value {
        serde_json::Value::String(s) => s.as_str(),
        serde_json::Value::Array(arr) => arr.first()?.as_str()?,
        _ => return None,
    };
    // schema.org day values may be full URLs like https://schema.org/Monday.
    Some(raw.rsplit('/').next().unwrap_or(raw).to_owned())
}

/// Numeric field that may arrive as a JSON number or a string.
fn number_field(obj: &serde_json::Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| {
        obj.get(*key).and_then(|v| {
            v.as_f64()
                .or_else(|| v.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(json: &str) -> String {
        format!(r#"<html><head><script type="application/ld+json">{json}</script></head></html>"#)
    }

    #[test]
    fn extracts_geo_site_hours_and_price() {
        let markup = wrap(
            r#"{
                "@type": "Restaurant",
                "name": "Marina Grill",
                "geo": {"latitude": "25.0772", "longitude": "55.1392"},
                "url": "https://marinagrill.example",
                "openingHoursSpecification": [
                    {"dayOfWeek": "Monday", "opens": "09:00", "closes": "22:00"},
                    {"dayOfWeek": "https://schema.org/Tuesday", "opens": "09:00", "closes": "22:00"}
                ],
                "priceRange": "$$"
            }"#,
        );
        let meta = extract_place_meta(&markup);
        assert!((meta.latitude.unwrap() - 25.0772).abs() < 1e-9);
        assert!((meta.longitude.unwrap() - 55.1392).abs() < 1e-9);
        assert_eq!(meta.site_url.as_deref(), Some("https://marinagrill.example"));
        assert_eq!(meta.opening_hours[0], "Monday: 09:00 - 22:00");
        assert_eq!(meta.opening_hours[1], "Tuesday: 09:00 - 22:00");
        assert_eq!(meta.price_level.as_deref(), Some("$$"));
    }

    #[test]
    fn geo_under_location_object_is_found() {
        let markup = wrap(
            r#"{"@type": "LocalBusiness", "location": {"geo": {"lat": 25.1, "lng": 55.2}}}"#,
        );
        let meta = extract_place_meta(&markup);
        assert!((meta.latitude.unwrap() - 25.1).abs() < 1e-9);
    }

    #[test]
    fn same_as_array_yields_first_url() {
        let markup = wrap(r#"{"@type": "Store", "sameAs": ["https://a.example", "https://b.example"]}"#);
        let meta = extract_place_meta(&markup);
        assert_eq!(meta.site_url.as_deref(), Some("https://a.example"));
    }

    #[test]
    fn opening_hours_single_string_is_accepted() {
        let markup = wrap(r#"{"@type": "Store", "openingHours": "Mo-Fr 09:00-18:00"}"#);
        let meta = extract_place_meta(&markup);
        assert_eq!(meta.opening_hours, vec!["Mo-Fr 09:00-18:00".to_owned()]);
    }

    #[test]
    fn graph_container_is_expanded() {
        let markup = wrap(
            r#"{"@graph": [{"@type": "LocalBusiness", "geo": {"latitude": 1.5, "longitude": 2.5}}]}"#,
        );
        let meta = extract_place_meta(&markup);
        assert!((meta.latitude.unwrap() - 1.5).abs() < 1e-9);
        assert!((meta.longitude.unwrap() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn malformed_blocks_are_skipped() {
        let markup = format!(
            "{}{}",
            wrap("{not json"),
            wrap(r#"{"@type": "Store", "priceRange": "$$$"}"#)
        );
        let meta = extract_place_meta(&markup);
        assert_eq!(meta.price_level.as_deref(), Some("$$$"));
    }

    #[test]
    fn empty_markup_yields_empty_meta() {
        let meta = extract_place_meta("<html><body></body></html>");
        assert!(meta.latitude.is_none());
        assert!(meta.site_url.is_none());
        assert!(meta.opening_hours.is_empty());
        assert!(meta.price_level.is_none());
    }
}
