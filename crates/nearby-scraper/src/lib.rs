pub mod browser;
pub mod chromium;
mod discover;
pub mod error;
pub mod geo;
mod jsonld;
mod extract;
mod pacing;
mod report;
pub mod resolve;
mod run;

#[cfg(test)]
mod testing;

pub use browser::{BrowserError, BrowserSession, TabHandle};
pub use chromium::ChromiumSession;
pub use error::ScrapeError;
pub use run::{run_scrape, ScrapeParams};
