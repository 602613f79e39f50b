use std::time::Duration;

use axum::{extract::State, Extension, Json};
use serde::Deserialize;

use nearby_core::ScrapeReport;
use nearby_scraper::chromium::{ChromiumLaunchOptions, ChromiumSession};
use nearby_scraper::{run_scrape, BrowserSession, ScrapeError, ScrapeParams};

use crate::middleware::RequestId;

use super::{ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct ScrapeRequest {
    pub input_url: String,
    #[serde(default = "default_radius_km")]
    pub radius_km: u32,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default = "default_desired_results")]
    pub desired_results: usize,
    /// Falls back to `NEARBY_HEADLESS` when absent.
    #[serde(default)]
    pub headless: Option<bool>,
}

fn default_radius_km() -> u32 {
    5
}

fn default_desired_results() -> usize {
    10
}

/// Run one full scrape with a browser session owned by this request.
pub(super) async fn run_scrape_handler(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<ScrapeRequest>,
) -> Result<Json<ApiResponse<ScrapeReport>>, ApiError> {
    validate(&body).map_err(|message| {
        ApiError::new(req_id.0.clone(), "validation_error", message)
    })?;

    let options = ChromiumLaunchOptions {
        headless: body.headless.unwrap_or(state.config.headless),
        chrome_path: state.config.chrome_path.clone(),
        nav_timeout_ms: state.config.nav_timeout_ms,
    };
    let session = ChromiumSession::launch(&options).await.map_err(|e| {
        tracing::error!(error = %e, "browser launch failed");
        ApiError::new(
            req_id.0.clone(),
            "internal_error",
            "failed to start a browser session",
        )
    })?;

    let params = ScrapeParams {
        input_url: body.input_url,
        radius_km: f64::from(body.radius_km),
        keyword: body.keyword,
        desired_results: body.desired_results,
        wait_timeout_ms: state.config.wait_timeout_ms,
        shortlink_timeout_secs: state.config.shortlink_timeout_secs,
    };

    let deadline = Duration::from_secs(state.config.scrape_deadline_secs);
    let outcome = tokio::time::timeout(deadline, run_scrape(&session, &params)).await;

    // The session is torn down before the response leaves, whatever happened.
    if let Err(err) = session.close().await {
        tracing::warn!(error = %err, "browser teardown failed");
    }

    match outcome {
        Ok(Ok(report)) => Ok(Json(ApiResponse {
            data: report,
            meta: ResponseMeta::new(req_id.0),
        })),
        Ok(Err(err)) => Err(map_scrape_error(req_id.0, &err)),
        Err(_) => {
            tracing::error!(
                deadline_secs = state.config.scrape_deadline_secs,
                "scrape exceeded the configured deadline"
            );
            Err(ApiError::new(
                req_id.0,
                "internal_error",
                "scrape exceeded the configured deadline",
            ))
        }
    }
}

fn validate(body: &ScrapeRequest) -> Result<(), String> {
    if body.input_url.trim().is_empty() {
        return Err("input_url must not be empty".to_owned());
    }
    if body.radius_km < 1 {
        return Err("radius_km must be at least 1".to_owned());
    }
    if body.desired_results < 1 {
        return Err("desired_results must be at least 1".to_owned());
    }
    Ok(())
}

fn map_scrape_error(request_id: String, err: &ScrapeError) -> ApiError {
    match err {
        ScrapeError::CoordinatesUnresolved { .. } => {
            tracing::warn!(error = %err, "scrape rejected");
            ApiError::new(
                request_id,
                "bad_request",
                "could not resolve coordinates from the input URL",
            )
        }
        ScrapeError::ChallengeDetected { .. } => {
            tracing::warn!(error = %err, "scrape blocked by challenge");
            ApiError::new(
                request_id,
                "challenge_detected",
                "the map surface served a bot challenge; retry later",
            )
        }
        other => {
            tracing::error!(error = %other, "scrape failed");
            ApiError::new(request_id, "internal_error", "scrape failed")
        }
    }
}
