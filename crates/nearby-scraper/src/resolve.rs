//! Coordinate resolution from heterogeneous map URL shapes.
//!
//! Map links encode a center in several ways: a `!3d<lat>!4d<lng>` place
//! marker deep in the path, an `@lat,lng,<zoom>z` viewport marker, or an
//! `ll=lat,lng` query parameter. Shortened links carry none of these until
//! expanded through their redirect chain.

use std::time::Duration;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use regex::Regex;
use url::Url;

use nearby_core::Coordinates;

/// Hosts that serve shortened map links and must be expanded first.
const SHORT_DOMAINS: &[&str] = &["maps.app.goo.gl", "goo.gl", "maps.fi"];

const DEFAULT_SEARCH_TERM: &str = "businesses";

/// Extract a coordinate pair from a location reference.
///
/// Strategies in order, first success wins: place marker (`!3d..!4d..`),
/// viewport marker (`@lat,lng`), `ll` query parameter. Out-of-range pairs
/// are rejected.
#[must_use]
pub fn parse_coordinates(reference: &str) -> Option<Coordinates> {
    let place_re =
        Regex::new(r"!3d(-?\d+(?:\.\d+)?)!4d(-?\d+(?:\.\d+)?)").expect("valid regex");
    if let Some(cap) = place_re.captures(reference) {
        if let Some(c) = capture_pair(&cap) {
            return Some(c);
        }
    }

    let at_re = Regex::new(r"@(-?\d+(?:\.\d+)?),(-?\d+(?:\.\d+)?)").expect("valid regex");
    if let Some(cap) = at_re.captures(reference) {
        if let Some(c) = capture_pair(&cap) {
            return Some(c);
        }
    }

    if let Ok(parsed) = Url::parse(reference) {
        for (key, value) in parsed.query_pairs() {
            if key == "ll" {
                let mut parts = value.splitn(3, ',');
                let lat = parts.next()?.trim().parse::<f64>().ok()?;
                let lng = parts.next()?.trim().parse::<f64>().ok()?;
                return Coordinates::new(lat, lng);
            }
        }
    }

    None
}

fn capture_pair(cap: &regex::Captures<'_>) -> Option<Coordinates> {
    let lat = cap.get(1)?.as_str().parse::<f64>().ok()?;
    let lng = cap.get(2)?.as_str().parse::<f64>().ok()?;
    Coordinates::new(lat, lng)
}

/// Whether the reference points at a known short-link host.
#[must_use]
pub fn is_short_link(reference: &str) -> bool {
    let Ok(parsed) = Url::parse(reference) else {
        return false;
    };
    parsed
        .host_str()
        .is_some_and(|host| SHORT_DOMAINS.iter().any(|d| host.eq_ignore_ascii_case(d)))
}

/// Expand a shortened link by following its redirect chain.
///
/// Returns the final URL, or `None` on any fetch failure — expansion is
/// best-effort and the caller falls back to the original reference.
pub async fn expand_short_link(
    client: &reqwest::Client,
    url: &str,
    timeout_secs: u64,
) -> Option<String> {
    tracing::info!(url, "expanding short link");
    match client
        .get(url)
        .timeout(Duration::from_secs(timeout_secs))
        .send()
        .await
    {
        Ok(response) => {
            let expanded = response.url().to_string();
            tracing::info!(url, expanded, "short link expanded");
            Some(expanded)
        }
        Err(err) => {
            tracing::debug!(url, error = %err, "short link expansion failed");
            None
        }
    }
}

/// Build a map search URL for a center, zoom, and optional keyword.
///
/// The keyword is percent-encoded; without one the default term is used.
#[must_use]
pub fn make_search_url(center: Coordinates, zoom: u8, keyword: Option<&str>) -> String {
    let term = keyword
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map_or_else(
            || DEFAULT_SEARCH_TERM.to_owned(),
            |k| utf8_percent_encode(k, NON_ALPHANUMERIC).to_string(),
        );
    format!(
        "https://www.google.com/maps/search/{term}/@{lat},{lng},{zoom}z",
        lat = center.lat,
        lng = center.lng
    )
}

/// Choose the search surface address for a run.
///
/// A resolved reference that already encodes a search or viewport is reused
/// verbatim when no keyword was supplied; place links and bare references get
/// a freshly built search URL.
#[must_use]
pub fn choose_search_url(
    resolved: &str,
    center: Coordinates,
    zoom: u8,
    keyword: Option<&str>,
) -> String {
    let has_keyword = keyword.map(str::trim).is_some_and(|k| !k.is_empty());
    if has_keyword || resolved.contains("/place/") {
        return make_search_url(center, zoom, keyword);
    }
    if resolved.contains("/search/") || resolved.contains('@') {
        return resolved.to_owned();
    }
    make_search_url(center, zoom, None)
}

#[cfg(test)]
#[path = "resolve_test.rs"]
mod tests;
