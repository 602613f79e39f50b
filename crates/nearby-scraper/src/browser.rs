//! The browser capability consumed by the pipeline.
//!
//! The scraper drives an automated browser through this trait only, so the
//! discovery loop and extractor never depend on a concrete engine. The
//! production implementation is [`crate::chromium::ChromiumSession`]; tests
//! substitute an in-memory stub.

use async_trait::async_trait;
use thiserror::Error;

/// Opaque identifier for an open tab within a session.
pub type TabHandle = String;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("script evaluation failed: {reason}")]
    Evaluate { reason: String },

    #[error("wait for \"{condition}\" timed out after {timeout_ms}ms")]
    WaitTimeout { condition: String, timeout_ms: u64 },

    #[error("tab error: {0}")]
    Tab(String),

    #[error("session error: {0}")]
    Session(String),
}

/// One live browser session owned by a single scrape run.
///
/// All calls act on the currently active tab unless they take a handle.
/// Implementations are not required to support concurrent callers; the
/// pipeline is strictly sequential within a run.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate the active tab and wait for the load to settle.
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    /// Evaluate a script in the active tab, returning its JSON value.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError>;

    /// Block until `selector` matches an element, up to `timeout_ms`.
    async fn wait_for_selector(&self, selector: &str, timeout_ms: u64) -> Result<(), BrowserError>;

    /// Address-bar URL of the active tab.
    async fn current_url(&self) -> Result<String, BrowserError>;

    /// Serialized markup of the active tab's document.
    async fn page_markup(&self) -> Result<String, BrowserError>;

    /// Open a new blank tab without activating it.
    async fn open_tab(&self) -> Result<TabHandle, BrowserError>;

    /// Close the given tab. Closing the active tab leaves no tab active
    /// until the caller switches.
    async fn close_tab(&self, tab: &TabHandle) -> Result<(), BrowserError>;

    /// Make the given tab active.
    async fn switch_tab(&self, tab: &TabHandle) -> Result<(), BrowserError>;

    /// Handle of the currently active tab.
    async fn active_tab(&self) -> Result<TabHandle, BrowserError>;

    /// Tear down every tab and the underlying browser process.
    async fn close(&self) -> Result<(), BrowserError>;

    /// Trimmed text content of the first element matching `selector`, or
    /// `None` when nothing matches or the text is empty.
    async fn query_text(&self, selector: &str) -> Result<Option<String>, BrowserError> {
        let script = format!(
            "(() => {{ const el = document.querySelector({sel}); \
             return el ? el.textContent.trim() : null; }})()",
            sel = js_string(selector)
        );
        Ok(non_empty_string(self.evaluate(&script).await?))
    }

    /// Attribute value of the first element matching `selector`.
    async fn query_attr(
        &self,
        selector: &str,
        attr: &str,
    ) -> Result<Option<String>, BrowserError> {
        let script = format!(
            "(() => {{ const el = document.querySelector({sel}); \
             return el ? el.getAttribute({attr}) : null; }})()",
            sel = js_string(selector),
            attr = js_string(attr)
        );
        Ok(non_empty_string(self.evaluate(&script).await?))
    }
}

/// Embed a Rust string as a JS string literal, escaping via JSON.
pub(crate) fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_owned())
}

fn non_empty_string(value: serde_json::Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn js_string_escapes_quotes_and_backslashes() {
        assert_eq!(js_string(r#"a"b\c"#), r#""a\"b\\c""#);
        assert_eq!(js_string("div[role='feed']"), r#""div[role='feed']""#);
    }

    #[test]
    fn non_empty_string_filters_blank_and_non_string() {
        assert_eq!(non_empty_string(serde_json::json!("  hi  ")), Some("hi".to_owned()));
        assert_eq!(non_empty_string(serde_json::json!("   ")), None);
        assert_eq!(non_empty_string(serde_json::json!(null)), None);
        assert_eq!(non_empty_string(serde_json::json!(42)), None);
    }
}
