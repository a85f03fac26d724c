use std::time::Duration;

use crate::logging::LogFormat;

/// Default log filter expression.
///
/// Lifecycle milestones from the orchestrator are shown while everything
/// else in an embedding process stays at warnings.
pub const DEFAULT_LOG_FILTER: &str = "warn,stagehand_lifecycle=info";

/// Upper bound on a single wait for a lifecycle notification, in seconds.
///
/// The remote side can take a long time to finish distributing large
/// archives, so the bound is one day rather than minutes.
pub const DEFAULT_NOTIFICATION_TIMEOUT_SECS: u64 = 86_400;

/// Delay between distribution readiness polls, in milliseconds.
pub const DEFAULT_DISTRIBUTION_POLL_INTERVAL_MS: u64 = 1_000;

/// Default log filter expression.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default notification wait bound in seconds.
#[must_use]
pub const fn default_notification_timeout_secs() -> u64 {
    DEFAULT_NOTIFICATION_TIMEOUT_SECS
}

/// Default distribution poll interval in milliseconds.
#[must_use]
pub const fn default_distribution_poll_interval_ms() -> u64 {
    DEFAULT_DISTRIBUTION_POLL_INTERVAL_MS
}

/// Default notification wait bound.
#[must_use]
pub const fn default_notification_timeout() -> Duration {
    Duration::from_secs(DEFAULT_NOTIFICATION_TIMEOUT_SECS)
}

/// Default distribution poll interval.
#[must_use]
pub const fn default_distribution_poll_interval() -> Duration {
    Duration::from_millis(DEFAULT_DISTRIBUTION_POLL_INTERVAL_MS)
}
