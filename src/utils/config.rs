use crate::parser::types::GlobalSettings;
use std::path::PathBuf;

/// Runner tunables
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Interval between element lookups while waiting (ms)
    pub poll_interval_ms: u64,

    /// Default timeout for element waiting (ms)
    pub default_timeout_ms: u64,

    /// Visibility probe per scroll-search iteration (ms)
    pub probe_timeout_ms: u64,

    /// Wait budget for each fallback selector (ms)
    pub fallback_timeout_ms: u64,

    /// Clickability wait before the native click tier (ms)
    pub click_settle_ms: u64,

    /// Upper bound for the post-click navigation wait (ms)
    pub post_click_timeout_ms: u64,

    /// Pause after terminating the app during reset (ms)
    pub reset_terminate_delay_ms: u64,

    /// Pause after activating the app during reset (ms)
    pub reset_activate_delay_ms: u64,

    /// Finger travel time of scroll gestures (ms)
    pub scroll_duration_ms: u64,

    /// Upper bound for coordinate scrolls after label search fails
    pub coordinate_scroll_attempts: u32,

    /// Capture page source and screenshot when a suite fails
    pub capture_diagnostics: bool,

    /// Output directory for reports and diagnostics
    pub output_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            default_timeout_ms: 10_000,
            probe_timeout_ms: 2000,
            fallback_timeout_ms: 2000,
            click_settle_ms: 2000,
            post_click_timeout_ms: 2000,
            reset_terminate_delay_ms: 2000,
            reset_activate_delay_ms: 3000,
            scroll_duration_ms: 600,
            coordinate_scroll_attempts: 2,
            capture_diagnostics: true,
            output_dir: PathBuf::from("test-reports"),
        }
    }
}

impl RunnerConfig {
    /// Apply `globalSettings.timeouts`
    ///
    /// `explicit` (seconds) sets the default element timeout, `implicit`
    /// (seconds) is used when `explicit` is absent, `polling` is in ms.
    pub fn apply_timeouts(mut self, settings: &GlobalSettings) -> Self {
        if let Some(secs) = settings
            .timeout("explicit")
            .or_else(|| settings.timeout("implicit"))
        {
            if secs > 0 {
                self.default_timeout_ms = secs * 1000;
            }
        }
        if let Some(ms) = settings.timeout("polling") {
            if ms > 0 {
                self.poll_interval_ms = ms;
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.default_timeout_ms, 10_000);
        assert_eq!(config.output_dir, PathBuf::from("test-reports"));
    }

    #[test]
    fn test_timeouts_from_settings() {
        let settings: GlobalSettings =
            serde_json::from_str(r#"{"timeouts": {"implicit": 5, "explicit": 15, "polling": 250}}"#)
                .unwrap();
        let config = RunnerConfig::default().apply_timeouts(&settings);
        assert_eq!(config.default_timeout_ms, 15_000);
        assert_eq!(config.poll_interval_ms, 250);
    }

    #[test]
    fn test_zero_values_ignored() {
        let settings: GlobalSettings =
            serde_json::from_str(r#"{"timeouts": {"implicit": 0, "polling": 0}}"#).unwrap();
        let config = RunnerConfig::default().apply_timeouts(&settings);
        assert_eq!(config.default_timeout_ms, 10_000);
        assert_eq!(config.poll_interval_ms, 500);
    }
}
