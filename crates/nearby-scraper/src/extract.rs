//! Per-place field extraction with ordered fallback chains.
//!
//! Each result link is opened in an isolated tab and mined through three
//! information sources in fixed precedence: embedded JSON-LD metadata,
//! URL-encoded coordinates, and free-text pattern scans of the rendered
//! markup. Once a strategy fills a field, later strategies for that field
//! are skipped. The selector lists target the markup shapes observed on the
//! live search surface; the regex scans are the schema-free last resort.

use regex::Regex;

use nearby_core::{Coordinates, PlaceRecord, UNKNOWN};

use crate::browser::{js_string, BrowserSession};
use crate::error::ScrapeError;
use crate::jsonld;
use crate::{geo, pacing, resolve};

const SNIPPET_MAX_CHARS: usize = 800;
const MAX_ATTRIBUTES: usize = 12;
const MAX_IMAGES: usize = 10;
const MAX_HOURS_LINES: usize = 7;
const BODY_WAIT_CONDITION: &str = "body";

const CHALLENGE_MARKERS: &[&str] = &["unusual traffic", "are you a robot"];

const ADDRESS_SELECTORS: &[&str] = &[
    "button[data-item-id='address']",
    "span[data-item-id='address']",
    "div[aria-label*='Address']",
    "div[data-tooltip='Copy address']",
    "div[data-item-id='address']",
];

const CATEGORY_SELECTORS: &[&str] = &[
    "button[jsaction*='category']",
    "button[data-item-id='entity-category']",
    "div[data-item-id='subtitle']",
    "span.fontBodySmall",
];

const AUTHORITY_SELECTORS: &[&str] = &["a[data-item-id='authority']", "a[aria-label*='Website']"];

const PHONE_SELECTORS: &[&str] = &[
    "button[aria-label*='Call']",
    "a[aria-label*='Call']",
    "button[data-item-id='phone']",
    "button[data-tooltip*='phone']",
];

const DESCRIPTION_SELECTORS: &[&str] = &[
    "div[data-section-id='overview']",
    "div[data-item-id='description']",
];

const HOURS_ROW_SELECTOR: &str =
    "table[class*='WgFkxc'] tr, div[aria-label*='Hours'] tr, div[data-item-id='hours'] tr";

const ATTRIBUTE_SELECTOR: &str =
    "button[jsaction*='placeActions'], span[class*='ucwH6d'], div.fontBodySmall";

/// Whether the markup is a bot-mitigation interstitial instead of content.
pub(crate) fn is_challenge(markup: &str) -> bool {
    let lowered = markup.to_lowercase();
    CHALLENGE_MARKERS.iter().any(|m| lowered.contains(m))
}

/// Extract one place record from a result link.
///
/// Opens the link in a fresh tab, leaving the discovery tab's scroll state
/// untouched, and restores focus on every exit path. A detected challenge
/// surfaces as [`ScrapeError::ChallengeDetected`]; every other failure is
/// wrapped as [`ScrapeError::Extraction`].
pub(crate) async fn extract_place(
    browser: &dyn BrowserSession,
    link: &str,
    center: Coordinates,
    wait_timeout_ms: u64,
) -> Result<PlaceRecord, ScrapeError> {
    let mut record = PlaceRecord::unknown(link);

    // The link itself often carries the place position; seed it before the
    // tab even opens so a later page failure still yields a distance.
    if let Some(c) = resolve::parse_coordinates(link) {
        set_coordinates(&mut record, c, center);
    }

    let origin = browser.active_tab().await.map_err(|e| wrap(link, &e))?;
    let tab = browser.open_tab().await.map_err(|e| wrap(link, &e))?;
    if let Err(e) = browser.switch_tab(&tab).await {
        if let Err(close_err) = browser.close_tab(&tab).await {
            tracing::warn!(link, error = %close_err, "failed to close extraction tab");
        }
        return Err(wrap(link, &e));
    }

    let outcome = populate_record(browser, link, center, wait_timeout_ms, &mut record).await;

    // Tab cleanup runs regardless of the extraction outcome to prevent
    // handle leaks across the run.
    if let Err(err) = browser.close_tab(&tab).await {
        tracing::warn!(link, error = %err, "failed to close extraction tab");
    }
    if let Err(err) = browser.switch_tab(&origin).await {
        tracing::warn!(link, error = %err, "failed to restore discovery tab");
    }

    match outcome {
        Ok(()) => Ok(record),
        Err(challenge @ ScrapeError::ChallengeDetected { .. }) => Err(challenge),
        Err(other) => Err(ScrapeError::Extraction {
            link: link.to_owned(),
            reason: other.to_string(),
        }),
    }
}

fn wrap(link: &str, err: &crate::browser::BrowserError) -> ScrapeError {
    ScrapeError::Extraction {
        link: link.to_owned(),
        reason: err.to_string(),
    }
}

async fn populate_record(
    browser: &dyn BrowserSession,
    link: &str,
    center: Coordinates,
    wait_timeout_ms: u64,
    record: &mut PlaceRecord,
) -> Result<(), ScrapeError> {
    browser.navigate(link).await?;
    browser
        .wait_for_selector(BODY_WAIT_CONDITION, wait_timeout_ms)
        .await?;
    pacing::jitter_sleep(1000, 2000).await;

    let markup = browser.page_markup().await?;
    if is_challenge(&markup) {
        tracing::error!(link, "challenge page during extraction");
        return Err(ScrapeError::ChallengeDetected {
            url: link.to_owned(),
        });
    }

    // Diagnostic payload first so partial extraction still carries context.
    let flat_text = match browser
        .evaluate("document.body ? document.body.innerText : ''")
        .await
    {
        Ok(value) => value
            .as_str()
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| strip_tags(&markup)),
        Err(_) => strip_tags(&markup),
    };
    record.raw_page_text_snippet = truncate_chars(&flat_text, SNIPPET_MAX_CHARS);

    let meta = jsonld::extract_place_meta(&markup);

    // Coordinates: JSON-LD geo, then the tab's resolved address, then raw
    // markup scans.
    if record.coordinates().is_none() {
        if let (Some(lat), Some(lng)) = (meta.latitude, meta.longitude) {
            if let Some(c) = Coordinates::new(lat, lng) {
                set_coordinates(record, c, center);
            }
        }
    }
    if record.coordinates().is_none() {
        if let Ok(current) = browser.current_url().await {
            if let Some(c) = resolve::parse_coordinates(&current) {
                set_coordinates(record, c, center);
            }
        }
    }
    if record.coordinates().is_none() {
        if let Some(c) = coords_from_markup(&markup) {
            set_coordinates(record, c, center);
        }
    }

    if let Some(url) = meta.site_url {
        record.company_url = url;
    }
    if record.company_url == UNKNOWN {
        for selector in AUTHORITY_SELECTORS {
            if let Some(href) = browser.query_attr(selector, "href").await? {
                if let Some(url) = normalize_external_href(&href) {
                    record.company_url = url;
                    break;
                }
            }
        }
    }
    if record.company_url == UNKNOWN {
        if let Some(url) = external_url_from_markup(&markup) {
            record.company_url = url;
        }
    }

    if !meta.opening_hours.is_empty() {
        record.opening_hours = meta.opening_hours;
    }
    if record.opening_hours.is_empty() {
        record.opening_hours = query_texts(browser, HOURS_ROW_SELECTOR).await?;
    }
    if record.opening_hours.is_empty() {
        record.opening_hours = hours_from_text(&flat_text);
    }

    if let Some(price) = meta.price_level {
        record.price_level = price;
    }
    if record.price_level == UNKNOWN {
        if let Some(price) = price_from_text(&flat_text) {
            record.price_level = price;
        }
    }

    if let Some(name) = browser.query_text("h1").await? {
        record.business_name = name;
    } else if let Some(name) = name_from_markup(&markup) {
        record.business_name = name;
    }

    for selector in ADDRESS_SELECTORS {
        if let Some(address) = browser.query_text(selector).await? {
            record.address = address;
            break;
        }
    }

    for selector in CATEGORY_SELECTORS {
        if let Some(category) = browser.query_text(selector).await? {
            // Relative timestamps ("2 days ago") share these slots with the
            // real category text and must never be taken for one.
            if !is_relative_timestamp(&category) {
                record.category = category;
                break;
            }
        }
    }
    if record.category == UNKNOWN {
        if let Some(category) = category_from_text(&flat_text) {
            record.category = category;
        }
    }

    if let Some(rating) = rating_from_markup(&markup) {
        record.rating = rating;
    }
    if let Some(reviews) = reviews_from_markup(&markup) {
        record.reviews_count = reviews;
    }

    for selector in PHONE_SELECTORS {
        if let Some(text) = browser.query_text(selector).await? {
            if let Some(phone) = phone_from_text(&text) {
                record.phone = phone;
                break;
            }
        }
    }
    if record.phone == UNKNOWN {
        if let Some(phone) = phone_from_text(&flat_text) {
            record.phone = phone;
        }
    }

    let raw_attributes = query_texts(browser, ATTRIBUTE_SELECTOR).await?;
    record.attributes = dedupe_capped(
        raw_attributes.into_iter().filter(|t| t.len() < 60),
        MAX_ATTRIBUTES,
    );

    record.images = images_from_markup(&markup);

    for selector in DESCRIPTION_SELECTORS {
        if let Some(description) = browser.query_text(selector).await? {
            record.description = description;
            break;
        }
    }
    if record.description == UNKNOWN {
        if let Some(description) = description_from_markup(&markup) {
            record.description = description;
        }
    }

    Ok(())
}

fn set_coordinates(record: &mut PlaceRecord, c: Coordinates, center: Coordinates) {
    record.latitude = Some(c.lat);
    record.longitude = Some(c.lng);
    record.distance_km = Some(geo::haversine_km(center, c));
}

/// Collect trimmed text from every element matching `selector`.
async fn query_texts(
    browser: &dyn BrowserSession,
    selector: &str,
) -> Result<Vec<String>, ScrapeError> {
    let script = format!(
        "Array.from(document.querySelectorAll({sel})).map(el => el.textContent.trim()).filter(t => t.length > 0)",
        sel = js_string(selector)
    );
    let value = browser.evaluate(&script).await?;
    Ok(value
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str())
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Pure fallback strategies over markup / flattened text
// ---------------------------------------------------------------------------

/// Last-resort coordinate scan over raw markup: `"latitude"/"longitude"`
/// key-value pairs, then `"lat"/"lng"` pairs, then a `center:[lat,lng]`
/// array literal.
pub(crate) fn coords_from_markup(markup: &str) -> Option<Coordinates> {
    let lat_re = Regex::new(r#""latitude"\s*[:=]\s*"?(-?\d+(?:\.\d+)?)"#).expect("valid regex");
    let lng_re = Regex::new(r#""longitude"\s*[:=]\s*"?(-?\d+(?:\.\d+)?)"#).expect("valid regex");
    if let (Some(lat), Some(lng)) = (first_number(&lat_re, markup), first_number(&lng_re, markup))
    {
        if let Some(c) = Coordinates::new(lat, lng) {
            return Some(c);
        }
    }

    let pair_re =
        Regex::new(r#"(?s)"lat"\s*[:=]\s*"?(-?\d+(?:\.\d+)?).*?"lng"\s*[:=]\s*"?(-?\d+(?:\.\d+)?)"#)
            .expect("valid regex");
    if let Some(cap) = pair_re.captures(markup) {
        let lat = cap.get(1)?.as_str().parse::<f64>().ok()?;
        let lng = cap.get(2)?.as_str().parse::<f64>().ok()?;
        if let Some(c) = Coordinates::new(lat, lng) {
            return Some(c);
        }
    }

    let center_re =
        Regex::new(r#""?center"?\s*[:=]\s*\[\s*(-?\d+(?:\.\d+)?)\s*,\s*(-?\d+(?:\.\d+)?)\s*\]"#)
            .expect("valid regex");
    if let Some(cap) = center_re.captures(markup) {
        let lat = cap.get(1)?.as_str().parse::<f64>().ok()?;
        let lng = cap.get(2)?.as_str().parse::<f64>().ok()?;
        return Coordinates::new(lat, lng);
    }

    None
}

fn first_number(re: &Regex, haystack: &str) -> Option<f64> {
    re.captures(haystack)?.get(1)?.as_str().parse::<f64>().ok()
}

/// Free-text opening hours: lines where a day name and a time pattern
/// co-occur, deduplicated and capped at one line per weekday.
pub(crate) fn hours_from_text(text: &str) -> Vec<String> {
    let line_re = Regex::new(r"([A-Za-z]{3,9}[^<>\n\r]{0,80})").expect("valid regex");
    let day_re = Regex::new(
        r"(?i)\b(Mon|Tue|Wed|Thu|Fri|Sat|Sun|Monday|Tuesday|Wednesday|Thursday|Friday|Saturday|Sunday)",
    )
    .expect("valid regex");
    let time_re = Regex::new(r"(?i)\d{1,2}:\d{2}|\bam\b|\bpm\b").expect("valid regex");

    let lines = line_re
        .find_iter(text)
        .map(|m| m.as_str().trim().to_owned())
        .filter(|t| day_re.is_match(t) && time_re.is_match(t));
    dedupe_capped(lines, MAX_HOURS_LINES)
}

/// Price from currency symbols with amounts, then shorthand runs like `$$`.
pub(crate) fn price_from_text(text: &str) -> Option<String> {
    let explicit = Regex::new(r"(?i)(£|\$|€|AED)\s*\d+[\s–\-]*\d*").expect("valid regex");
    if let Some(m) = explicit.find(text) {
        return Some(m.as_str().trim().to_owned());
    }
    let shorthand =
        Regex::new(r"(?i)(\${1,4}|£{1,4}|€{1,4}|AED\s*\d+|\bAED\b)").expect("valid regex");
    shorthand.find(text).map(|m| m.as_str().trim().to_owned())
}

pub(crate) fn name_from_markup(markup: &str) -> Option<String> {
    let h1_re = Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>").expect("valid regex");
    let inner = h1_re.captures(markup)?.get(1)?.as_str();
    let name = strip_tags(inner).trim().to_owned();
    (!name.is_empty()).then_some(name)
}

/// Text that is a "time since review" phrase, not a category.
pub(crate) fn is_relative_timestamp(text: &str) -> bool {
    let re = Regex::new(r"\b(today|yesterday|\d+\s+(?:day|days|hour|hours|minute|minutes)\s+ago)\b")
        .expect("valid regex");
    re.is_match(&text.to_lowercase())
}

/// Category from the flattened header line: the segment between a
/// `N.N (reviews)` rating block and the following separator dot.
pub(crate) fn category_from_text(text: &str) -> Option<String> {
    let re = Regex::new(r"\b\d\.\d\b\s*\(\s*[\d,]+\s*\)\s*([^·•]{2,60})\s*[·•]")
        .expect("valid regex");
    let candidate = re.captures(text)?.get(1)?.as_str().trim().to_owned();
    let lowered = candidate.to_lowercase();
    (candidate.len() <= 60 && !lowered.contains("review") && !lowered.contains("rating"))
        .then_some(candidate)
}

/// Rating from aria-label star/rating annotations, else a bare decimal in an
/// aria-hidden span.
pub(crate) fn rating_from_markup(markup: &str) -> Option<String> {
    let aria_re = Regex::new(r#"(?i)aria-label\s*=\s*["']([^"']*(?:star|rating)[^"']*)["']"#)
        .expect("valid regex");
    let value_re = Regex::new(r"(\d+\.?\d*)\s*(?:star|out)").expect("valid regex");
    for cap in aria_re.captures_iter(markup) {
        if let Some(label) = cap.get(1) {
            if let Some(value) = value_re.captures(&label.as_str().to_lowercase()) {
                return value.get(1).map(|m| m.as_str().to_owned());
            }
        }
    }

    let span_re = Regex::new(r#"(?is)<span[^>]*aria-hidden=["']true["'][^>]*>(\d+\.\d+)</span>"#)
        .expect("valid regex");
    span_re
        .captures(markup)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_owned())
}

/// Review count near the word "review", commas stripped.
pub(crate) fn reviews_from_markup(markup: &str) -> Option<String> {
    let re = Regex::new(r"(?i)(\d[\d,]*)\s*review").expect("valid regex");
    re.captures(markup)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().replace(',', ""))
}

pub(crate) fn phone_from_text(text: &str) -> Option<String> {
    let re = Regex::new(r"(\+?\d[\d\-\s()]{6,}\d)").expect("valid regex");
    re.captures(text)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().trim().to_owned())
}

/// First external (non-map, non-Google) link in the markup, unwrapping
/// `/url?q=` redirect wrappers.
pub(crate) fn external_url_from_markup(markup: &str) -> Option<String> {
    let anchor_re = Regex::new(r#"(?is)<a[^>]+href\s*=\s*["']([^"']+)["']"#).expect("valid regex");
    let hrefs: Vec<String> = anchor_re
        .captures_iter(markup)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_owned()))
        .collect();
    hrefs
        .into_iter()
        .find_map(|href| normalize_external_href(&href))
}

/// Resolve an anchor href to an external site URL, or `None` when it points
/// back into the map surface.
pub(crate) fn normalize_external_href(href: &str) -> Option<String> {
    let target = if href.starts_with("/url") || href.contains("google.com/url") {
        let q_re = Regex::new(r"[?&]q=([^&]+)").expect("valid regex");
        let encoded = q_re.captures(href)?.get(1)?.as_str();
        percent_encoding::percent_decode_str(encoded)
            .decode_utf8()
            .ok()?
            .into_owned()
    } else {
        href.to_owned()
    };

    (target.starts_with("http") && !target.contains("google") && !target.contains("/maps"))
        .then_some(target)
}

/// Image sources from the markup; very short srcs are tracking pixels and
/// data stubs, skipped by length.
pub(crate) fn images_from_markup(markup: &str) -> Vec<String> {
    let img_re = Regex::new(r#"(?is)<img[^>]+src\s*=\s*["']([^"']{30,}?)["']"#)
        .expect("valid regex");
    img_re
        .captures_iter(markup)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_owned()))
        .take(MAX_IMAGES)
        .collect()
}

/// First free-standing text block of plausible description length.
pub(crate) fn description_from_markup(markup: &str) -> Option<String> {
    let block_re = Regex::new(r"(?is)<(?:div|p)[^>]*>([^<]{40,600})</(?:div|p)>")
        .expect("valid regex");
    block_re
        .captures(markup)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().trim().to_owned())
        .filter(|t| !t.is_empty())
}

pub(crate) fn strip_tags(markup: &str) -> String {
    let tag_re = Regex::new(r"<[^>]+>").expect("valid regex");
    tag_re.replace_all(markup, " ").trim().to_owned()
}

/// Truncate on a character boundary, never mid-codepoint.
pub(crate) fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Deduplicate preserving first-seen order, capped at `cap` entries.
pub(crate) fn dedupe_capped<I>(items: I, cap: usize) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for item in items {
        if out.len() >= cap {
            break;
        }
        if seen.insert(item.clone()) {
            out.push(item);
        }
    }
    out
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;
