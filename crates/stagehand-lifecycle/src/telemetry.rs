//! Log output for the lifecycle crate.
//!
//! Every event is emitted through `tracing` under targets prefixed with
//! [`CRATE_TARGET`], so an embedding application that already owns a
//! subscriber needs nothing from this module. [`dispatch`] builds a
//! subscriber from [`Config`] without touching global state; [`initialise`]
//! installs one process-wide for callers that have none.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use stagehand_config::{Config, LogFormat};
use thiserror::Error;
use tracing::Dispatch;
use tracing::dispatcher::{self, SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::fmt::{self, time::UtcTime};

/// Prefix shared by every log target in this crate.
pub const CRATE_TARGET: &str = "stagehand_lifecycle";

static GLOBAL: OnceCell<Dispatch> = OnceCell::new();

/// Failures while building or installing a subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The configured filter expression did not parse.
    #[error("invalid log filter '{filter}': {source}")]
    Filter {
        /// Expression that was rejected.
        filter: String,
        /// Parser diagnostic.
        #[source]
        source: ParseError,
    },
    /// Another global subscriber was installed first.
    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled(#[source] SetGlobalDefaultError),
}

/// Builds a stderr subscriber for the configured filter and format.
///
/// ANSI colours are only used for the text formats and only when stderr is a
/// terminal. Use it with [`tracing::dispatcher::with_default`] to scope
/// orchestrator logging to one call.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] when the filter expression is invalid.
pub fn dispatch(config: &Config) -> Result<Dispatch, TelemetryError> {
    let filter =
        EnvFilter::try_new(config.log_filter()).map_err(|source| TelemetryError::Filter {
            filter: config.log_filter().to_owned(),
            source,
        })?;
    let format = config.log_format();
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(!format.is_structured() && io::stderr().is_terminal())
        .with_timer(UtcTime::rfc_3339());

    Ok(match format {
        LogFormat::Json => Dispatch::new(builder.json().flatten_event(true).finish()),
        LogFormat::Compact => Dispatch::new(builder.compact().finish()),
        LogFormat::Pretty => Dispatch::new(
            builder
                .pretty()
                .with_file(true)
                .with_line_number(true)
                .finish(),
        ),
    })
}

/// Installs the configured subscriber as the process-wide default.
///
/// Only the first successful call installs anything; later calls keep the
/// subscriber already in place and ignore `config`.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter is invalid or a subscriber
/// from elsewhere was installed first.
pub fn initialise(config: &Config) -> Result<(), TelemetryError> {
    GLOBAL
        .get_or_try_init(|| {
            let built = dispatch(config)?;
            dispatcher::set_global_default(built.clone())
                .map_err(TelemetryError::AlreadyInstalled)?;
            Ok(built)
        })
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use tracing::info;

    use super::*;

    #[rstest]
    #[case(LogFormat::Json)]
    #[case(LogFormat::Compact)]
    #[case(LogFormat::Pretty)]
    fn dispatch_scopes_logging_without_global_state(#[case] format: LogFormat) {
        let config = Config::default().with_log_format(format);
        let scoped = dispatch(&config).expect("default filter parses");

        dispatcher::with_default(&scoped, || {
            info!(target: CRATE_TARGET, "scoped event");
        });
    }

    #[rstest]
    fn invalid_filter_names_the_expression() {
        let config = Config::default().with_log_filter("stagehand_lifecycle=[");

        let error = dispatch(&config).expect_err("unbalanced bracket");

        assert!(matches!(
            &error,
            TelemetryError::Filter { filter, .. } if filter == "stagehand_lifecycle=["
        ));
    }

    #[rstest]
    fn initialise_is_idempotent() {
        let config = Config::default();
        assert!(initialise(&config).is_ok());
        assert!(initialise(&config.with_log_filter("stagehand_lifecycle=[")).is_ok());
    }

    #[rstest]
    fn crate_targets_share_the_prefix() {
        for target in [
            crate::client::CLIENT_TARGET,
            crate::manager::MANAGER_TARGET,
            crate::channel::NOTIFICATION_TARGET,
            crate::target::RESOLVER_TARGET,
        ] {
            assert!(target.starts_with(CRATE_TARGET), "{target}");
        }
    }
}
