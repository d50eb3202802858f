//! Common utilities shared by the finder and the resilience layer
//!
//! Polling loops and XPath text helpers.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

// ============================================================================
// Polling Utilities
// ============================================================================

/// Configuration for polling operations
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub timeout_ms: u64,
    pub interval_ms: u64,
}

impl PollConfig {
    pub fn new(timeout_ms: u64, interval_ms: u64) -> Self {
        Self {
            timeout_ms,
            interval_ms,
        }
    }
}

/// Poll `check_fn` until it yields a value or the timeout elapses
///
/// The check always runs at least once, and once more at the deadline, so a
/// zero timeout is a single probe.
pub async fn poll_until<T, F, Fut>(mut check_fn: F, config: PollConfig) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + Duration::from_millis(config.timeout_ms);
    let interval = Duration::from_millis(config.interval_ms.max(1));

    loop {
        if let Some(value) = check_fn().await {
            return Some(value);
        }

        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}

/// Boolean flavor of [`poll_until`]
///
/// Returns `true` if the condition was met, `false` if timed out.
pub async fn wait_until<F, Fut>(mut check_fn: F, config: PollConfig) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    poll_until(
        || {
            let fut = check_fn();
            async move { fut.await.then_some(()) }
        },
        config,
    )
    .await
    .is_some()
}

// ============================================================================
// Text Utilities
// ============================================================================

/// Quote text as an XPath string literal
///
/// XPath 1.0 has no escape sequences, so text containing both quote kinds
/// is stitched together with `concat()`.
pub fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        return format!("'{}'", text);
    }
    if !text.contains('"') {
        return format!("\"{}\"", text);
    }
    let parts: Vec<String> = text
        .split('\'')
        .map(|part| format!("'{}'", part))
        .collect();
    format!("concat({})", parts.join(", \"'\", "))
}

/// XPath expression that upper-cases an attribute for case-insensitive matching
pub fn xpath_upper(attribute: &str) -> String {
    format!(
        "translate({}, 'abcdefghijklmnopqrstuvwxyz', 'ABCDEFGHIJKLMNOPQRSTUVWXYZ')",
        attribute
    )
}
