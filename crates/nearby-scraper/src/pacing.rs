//! Randomized pacing between browser actions.
//!
//! Jitter keeps the action cadence irregular; it is not a correctness
//! mechanism and callers must never rely on a minimum elapsed time.

use std::time::Duration;

pub(crate) async fn jitter_sleep(min_ms: u64, max_ms: u64) {
    let span = max_ms.saturating_sub(min_ms);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let ms = min_ms + (rand::random::<f64>() * span as f64) as u64;
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
