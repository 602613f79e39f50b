//! End-to-end scrape orchestration.
//!
//! A run resolves the input reference to a center, opens the search surface,
//! drives discovery, and assembles the report. The caller owns the browser
//! session and is responsible for tearing it down afterwards.

use nearby_core::ScrapeReport;

use crate::browser::BrowserSession;
use crate::error::ScrapeError;
use crate::report::{build_report, ReportContext};
use crate::{discover, extract, geo, pacing, resolve};

/// Inputs for one scrape run.
#[derive(Debug, Clone)]
pub struct ScrapeParams {
    /// Map link, short link, or any reference carrying coordinates.
    pub input_url: String,
    pub radius_km: f64,
    /// Search term; the generic default is used when absent.
    pub keyword: Option<String>,
    /// Target count of places inside the radius.
    pub desired_results: usize,
    pub wait_timeout_ms: u64,
    pub shortlink_timeout_secs: u64,
}

/// Run a full scrape against an open browser session.
///
/// # Errors
///
/// [`ScrapeError::CoordinatesUnresolved`] when no center can be derived from
/// the input even after browser-assisted resolution, and
/// [`ScrapeError::ChallengeDetected`] when the surface serves a
/// bot-mitigation page.
pub async fn run_scrape(
    browser: &dyn BrowserSession,
    params: &ScrapeParams,
) -> Result<ScrapeReport, ScrapeError> {
    let input = params.input_url.trim();

    let mut resolved = if resolve::is_short_link(input) {
        let client = reqwest::Client::new();
        resolve::expand_short_link(&client, input, params.shortlink_timeout_secs)
            .await
            .unwrap_or_else(|| input.to_owned())
    } else {
        input.to_owned()
    };

    let mut center = resolve::parse_coordinates(&resolved);

    // Some references only reveal their position after the map surface
    // rewrites the address bar; load them once and re-read the URL.
    if center.is_none() {
        tracing::info!(url = %resolved, "no coordinates in reference, loading it to resolve");
        browser.navigate(&resolved).await?;
        browser.wait_for_selector("body", params.wait_timeout_ms).await?;
        pacing::jitter_sleep(1000, 2000).await;
        let current = browser.current_url().await?;
        if let Some(c) = resolve::parse_coordinates(&current) {
            center = Some(c);
            resolved = current;
        }
    }

    let Some(center) = center else {
        return Err(ScrapeError::CoordinatesUnresolved {
            reference: input.to_owned(),
        });
    };

    let zoom = geo::radius_to_zoom(params.radius_km);
    let search_url =
        resolve::choose_search_url(&resolved, center, zoom, params.keyword.as_deref());

    tracing::info!(
        lat = center.lat,
        lng = center.lng,
        zoom,
        radius_km = params.radius_km,
        search_url = %search_url,
        "starting discovery"
    );

    browser.navigate(&search_url).await?;
    browser
        .wait_for_selector("body", params.wait_timeout_ms)
        .await?;
    pacing::jitter_sleep(1500, 2500).await;

    let markup = browser.page_markup().await?;
    if extract::is_challenge(&markup) {
        tracing::error!(url = %search_url, "challenge page on the search surface");
        return Err(ScrapeError::ChallengeDetected { url: search_url });
    }

    let discovery = discover::run_discovery(
        browser,
        center,
        params.radius_km,
        params.desired_results,
        params.wait_timeout_ms,
    )
    .await?;

    Ok(build_report(
        ReportContext {
            input_url: input.to_owned(),
            resolved_url: resolved,
            search_url,
            radius_km: params.radius_km,
            center,
            zoom_level: zoom,
            desired_results: params.desired_results,
            total_processed: discovery.total_processed,
        },
        discovery.partition,
    ))
}

#[cfg(test)]
#[path = "run_test.rs"]
mod tests;
