//! Shared configuration for the stagehand lifecycle orchestrator.
//!
//! The [`Config`] structure carries the handful of knobs the orchestrator
//! needs at runtime: how verbose logging is, how it is rendered, how long a
//! caller may block waiting for a lifecycle notification, and how often
//! distribution readiness is polled during a deployment. Every field has a
//! serde default so partial documents deserialise into a usable value.

mod defaults;
mod logging;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{
    DEFAULT_DISTRIBUTION_POLL_INTERVAL_MS, DEFAULT_LOG_FILTER, DEFAULT_NOTIFICATION_TIMEOUT_SECS,
    default_distribution_poll_interval, default_distribution_poll_interval_ms,
    default_log_filter, default_log_filter_string, default_log_format,
    default_notification_timeout, default_notification_timeout_secs,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Runtime configuration consumed by the lifecycle crate.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Config {
    /// `tracing-subscriber` filter expression.
    #[serde(default = "defaults::default_log_filter_string")]
    pub log_filter: String,
    /// Output format for log lines.
    #[serde(default = "defaults::default_log_format")]
    pub log_format: LogFormat,
    /// Bound on a single wait for a terminal lifecycle notification.
    #[serde(default = "defaults::default_notification_timeout_secs")]
    pub notification_timeout_secs: u64,
    /// Delay between distribution readiness polls.
    #[serde(default = "defaults::default_distribution_poll_interval_ms")]
    pub distribution_poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            notification_timeout_secs: DEFAULT_NOTIFICATION_TIMEOUT_SECS,
            distribution_poll_interval_ms: DEFAULT_DISTRIBUTION_POLL_INTERVAL_MS,
        }
    }
}

impl Config {
    /// Filter expression applied to the telemetry subscriber.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Output format applied to the telemetry subscriber.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Bound on a single notification wait.
    #[must_use]
    pub const fn notification_timeout(&self) -> Duration {
        Duration::from_secs(self.notification_timeout_secs)
    }

    /// Delay between distribution readiness polls.
    #[must_use]
    pub const fn distribution_poll_interval(&self) -> Duration {
        Duration::from_millis(self.distribution_poll_interval_ms)
    }

    /// Replaces the log filter expression.
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Replaces the log format.
    #[must_use]
    pub const fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    /// Replaces the notification wait bound.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Imprecise`] when `timeout` is not a whole
    /// number of seconds.
    pub fn with_notification_timeout(mut self, timeout: Duration) -> Result<Self, ConfigError> {
        if timeout.subsec_nanos() != 0 {
            return Err(ConfigError::Imprecise {
                field: "notification_timeout_secs",
                unit: "second",
            });
        }
        self.notification_timeout_secs = timeout.as_secs();
        Ok(self)
    }

    /// Replaces the distribution poll interval.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Imprecise`] when `interval` is not a whole
    /// number of milliseconds or does not fit the field.
    pub fn with_distribution_poll_interval(mut self, interval: Duration) -> Result<Self, ConfigError> {
        let millis = u64::try_from(interval.as_millis())
            .ok()
            .filter(|whole| Duration::from_millis(*whole) == interval)
            .ok_or(ConfigError::Imprecise {
                field: "distribution_poll_interval_ms",
                unit: "millisecond",
            })?;
        self.distribution_poll_interval_ms = millis;
        Ok(self)
    }

    /// Checks that the configuration can drive the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the log filter is blank or either
    /// duration is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_filter.trim().is_empty() {
            return Err(ConfigError::EmptyLogFilter);
        }
        if self.notification_timeout_secs == 0 {
            return Err(ConfigError::ZeroDuration {
                field: "notification_timeout_secs",
            });
        }
        if self.distribution_poll_interval_ms == 0 {
            return Err(ConfigError::ZeroDuration {
                field: "distribution_poll_interval_ms",
            });
        }
        Ok(())
    }
}

/// Errors reported by [`Config::validate`] and the duration setters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The log filter expression was blank.
    #[error("log filter must not be empty")]
    EmptyLogFilter,
    /// A duration field was set to zero.
    #[error("{field} must be greater than zero")]
    ZeroDuration {
        /// Name of the offending field.
        field: &'static str,
    },
    /// A duration could not be stored without losing precision.
    #[error("{field} only holds whole multiples of a {unit}")]
    Imprecise {
        /// Name of the offending field.
        field: &'static str,
        /// Smallest unit the field can represent.
        unit: &'static str,
    },
}
