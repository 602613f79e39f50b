use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    /// Explicit Chromium binary path; discovery falls back to `$PATH` lookup.
    pub chrome_path: Option<PathBuf>,
    /// Upper bound for a single page navigation.
    pub nav_timeout_ms: u64,
    /// Upper bound for DOM-readiness waits (results panel, body presence).
    pub wait_timeout_ms: u64,
    /// Timeout for the redirect-following short-link expansion fetch.
    pub shortlink_timeout_secs: u64,
    /// Deadline wrapping one whole scrape run; on expiry the browser session
    /// is force-closed and partial results are discarded.
    pub scrape_deadline_secs: u64,
    /// Default headless setting when the request does not specify one.
    pub headless: bool,
}
