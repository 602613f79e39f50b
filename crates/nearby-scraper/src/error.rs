use thiserror::Error;

use crate::browser::BrowserError;

/// Failure taxonomy for one scrape run.
///
/// `Extraction` is recovered locally by the discovery loop (the link is
/// skipped); every other variant aborts the run.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("could not resolve coordinates from \"{reference}\"")]
    CoordinatesUnresolved { reference: String },

    #[error("bot challenge detected at {url}")]
    ChallengeDetected { url: String },

    #[error("extraction failed for {link}: {reason}")]
    Extraction { link: String, reason: String },

    #[error("browser session error: {0}")]
    Browser(#[from] BrowserError),
}
