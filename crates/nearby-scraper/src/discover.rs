//! Incremental discovery over the scrollable results panel.
//!
//! The search surface loads results lazily: each scroll of the feed panel
//! appends a batch of place links. The loop alternates link sweeps with
//! scroll steps, feeding unseen links to the extractor, until enough places
//! land inside the radius, the feed stops yielding new links, or the scroll
//! cap is hit.

use std::collections::HashSet;

use nearby_core::Coordinates;

use crate::browser::{js_string, BrowserSession};
use crate::error::ScrapeError;
use crate::report::Partition;
use crate::{extract, pacing};

const MAX_SCROLL_ATTEMPTS: u32 = 100;
/// Consecutive sweeps without a new link before the feed counts as drained.
const MAX_STALE_ROUNDS: u32 = 5;

const PANEL_SELECTORS: &[&str] = &[
    "div[role='feed']",
    "div[aria-label*='Results for']",
    "div[aria-label*='Results']",
    "div[role='region']",
];

const RESULT_LINK_SELECTOR: &str = "a[href*='/maps/place/']";

#[derive(Debug)]
pub(crate) struct Discovery {
    pub partition: Partition,
    /// Links handed to the extractor, successful or not.
    pub total_processed: usize,
}

/// Drive the results feed until `desired_results` places are confirmed
/// within `radius_km` of `center`, or the feed is exhausted.
///
/// Individual extraction failures are logged and skipped; a challenge page
/// aborts the whole run.
pub(crate) async fn run_discovery(
    browser: &dyn BrowserSession,
    center: Coordinates,
    radius_km: f64,
    desired_results: usize,
    wait_timeout_ms: u64,
) -> Result<Discovery, ScrapeError> {
    let panel = find_results_panel(browser, wait_timeout_ms).await;
    if panel.is_none() {
        tracing::warn!("no results panel found, falling back to window scrolling");
    }

    let mut processed: HashSet<String> = HashSet::new();
    let mut partition = Partition::default();
    let mut total_processed = 0usize;
    // Only stalled sweeps consume the scroll budget; productive sweeps loop
    // straight back into the feed.
    let mut scroll_attempts = 0u32;
    let mut stale_rounds = 0u32;

    while partition.within.len() < desired_results && scroll_attempts < MAX_SCROLL_ATTEMPTS {
        let links = collect_result_links(browser).await?;
        let fresh: Vec<String> = links
            .into_iter()
            .filter(|l| !processed.contains(l))
            .collect();

        tracing::debug!(
            scroll_attempts,
            fresh = fresh.len(),
            within = partition.within.len(),
            "discovery sweep"
        );

        if fresh.is_empty() {
            scroll_step(browser, panel.as_deref()).await?;
            pacing::jitter_sleep(1000, 1500).await;
            scroll_attempts += 1;
            stale_rounds += 1;
            if stale_rounds >= MAX_STALE_ROUNDS {
                tracing::info!(
                    within = partition.within.len(),
                    "results feed exhausted before reaching the target"
                );
                break;
            }
            continue;
        }
        stale_rounds = 0;

        for link in &fresh {
            if partition.within.len() >= desired_results {
                break;
            }
            processed.insert(link.clone());
            total_processed += 1;

            match extract::extract_place(browser, link, center, wait_timeout_ms).await {
                Ok(record) => partition.route(record, radius_km),
                Err(challenge @ ScrapeError::ChallengeDetected { .. }) => return Err(challenge),
                Err(err) => {
                    tracing::warn!(link, error = %err, "extraction failed, skipping place");
                }
            }
        }
    }

    Ok(Discovery {
        partition,
        total_processed,
    })
}

/// First panel selector that appears within the shared wait budget.
async fn find_results_panel(browser: &dyn BrowserSession, wait_timeout_ms: u64) -> Option<String> {
    let per_selector = wait_timeout_ms / PANEL_SELECTORS.len() as u64;
    for selector in PANEL_SELECTORS {
        match browser.wait_for_selector(selector, per_selector.max(1)).await {
            Ok(()) => return Some((*selector).to_owned()),
            Err(err) => tracing::debug!(selector, error = %err, "panel selector not found"),
        }
    }
    None
}

/// Sweep the document for place links, deduplicated in first-seen order.
async fn collect_result_links(
    browser: &dyn BrowserSession,
) -> Result<Vec<String>, ScrapeError> {
    let script = format!(
        "Array.from(document.querySelectorAll({sel})).map(a => a.href)",
        sel = js_string(RESULT_LINK_SELECTOR)
    );
    let value = browser.evaluate(&script).await?;
    let mut seen = HashSet::new();
    Ok(value
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str())
                .filter(|href| href.contains("/maps/place/"))
                .filter(|href| seen.insert((*href).to_owned()))
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default())
}

/// Scroll the feed panel to its bottom, or the window when no panel exists.
async fn scroll_step(
    browser: &dyn BrowserSession,
    panel: Option<&str>,
) -> Result<(), ScrapeError> {
    let script = match panel {
        Some(selector) => format!(
            "(() => {{ const el = document.querySelector({sel}); \
             if (el) {{ el.scrollTop = el.scrollHeight; }} }})()",
            sel = js_string(selector)
        ),
        None => "window.scrollBy(0, 800)".to_owned(),
    };
    browser.evaluate(&script).await?;
    Ok(())
}

#[cfg(test)]
#[path = "discover_test.rs"]
mod tests;
