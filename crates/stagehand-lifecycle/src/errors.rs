//! Error types surfaced by the lifecycle orchestrator.

use std::fmt;
use std::time::Duration;

use stagehand_config::ConfigError;
use thiserror::Error;

use crate::channel::ChannelError;
use crate::correlator::CorrelationError;
use crate::descriptor::DescriptorError;
use crate::distribution::DistributionParseError;
use crate::names::NameParseError;
use crate::notification::TaskName;

/// Remote operation being executed when an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Managed-object query.
    Query,
    /// Cluster member enumeration.
    ClusterMembers,
    /// Listener registration.
    Subscribe,
    /// Install or redeploy.
    Install,
    /// Uninstall.
    Uninstall,
    /// Application start.
    Start,
    /// Application stop.
    Stop,
    /// Distribution status request.
    DistributionStatus,
    /// Existence check.
    CheckExists,
    /// Module-to-server mapping lookup.
    ApplicationInfo,
}

impl fmt::Display for Operation {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Query => "query",
            Self::ClusterMembers => "cluster member lookup",
            Self::Subscribe => "notification subscription",
            Self::Install => "install",
            Self::Uninstall => "uninstall",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::DistributionStatus => "distribution status",
            Self::CheckExists => "existence check",
            Self::ApplicationInfo => "application info",
        };
        formatter.write_str(label)
    }
}

/// Zero or several candidates where exactly one was required.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TopologyError {
    /// Automatic target selection found no unique candidate.
    #[error(
        "no unambiguous server/cluster target: found {clusters} clusters, {managed_servers} \
         managed servers and {unmanaged_servers} unmanaged servers; specify a target"
    )]
    AmbiguousTarget {
        /// Clusters in the cell.
        clusters: usize,
        /// Servers with a node agent.
        managed_servers: usize,
        /// Stand-alone servers.
        unmanaged_servers: usize,
    },

    /// No cluster carries the requested name.
    #[error("cluster '{name}' not found")]
    ClusterNotFound {
        /// Requested cluster name.
        name: String,
    },

    /// A cluster name matched an unexpected number of clusters.
    #[error("expected exactly one cluster named '{name}', found {found}")]
    ClusterCount {
        /// Requested cluster name.
        name: String,
        /// Number of matches.
        found: usize,
    },
}

/// Coarse classification of [`LifecycleError`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Topology ambiguity.
    Topology,
    /// Remote communication failure.
    Remote,
    /// The remote side reported the task as failed.
    TaskFailed,
    /// No terminal notification arrived in time.
    Timeout,
    /// The notification stream produced no conclusive outcome.
    Inconclusive,
    /// More running instances than deployment targets.
    StateAnomaly,
    /// Distribution status could not be interpreted.
    DistributionStatus,
    /// A start or stop returned no acknowledgement.
    MissingAcknowledgement,
    /// A name returned by the remote side could not be interpreted.
    MalformedName,
    /// The package descriptor could not be read.
    Descriptor,
    /// The initial connection probe failed.
    ConnectionCheck,
    /// The supplied configuration was unusable.
    Config,
}

/// Errors returned by the client and orchestrator.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Zero or several candidates where exactly one was required.
    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// The remote channel could not be reached or rejected a call.
    #[error("{operation} failed for '{subject}': {source}")]
    Remote {
        /// Operation that failed.
        operation: Operation,
        /// Application, cluster or query the call was about.
        subject: String,
        /// Underlying channel failure.
        #[source]
        source: ChannelError,
    },

    /// The remote side reported the task as failed.
    #[error("{task} of '{subject}' failed: {message}")]
    TaskFailed {
        /// Task that failed.
        task: TaskName,
        /// Application or archive the task was about.
        subject: String,
        /// Message carried by the failure notification.
        message: String,
    },

    /// No terminal notification arrived within the wait bound.
    #[error("no conclusive {task} status for '{subject}' after {}s", waited.as_secs())]
    Timeout {
        /// Task being waited for.
        task: TaskName,
        /// Application or archive the task was about.
        subject: String,
        /// How long the caller waited.
        waited: Duration,
    },

    /// The notification stream ended the wait without a usable outcome.
    #[error("received no conclusive {task} status for '{subject}': {source}")]
    Inconclusive {
        /// Task being waited for.
        task: TaskName,
        /// Application or archive the task was about.
        subject: String,
        /// Why the wait ended.
        #[source]
        source: CorrelationError,
    },

    /// More running instances than known deployment targets.
    #[error(
        "application '{app_name}' reports {running} running instances but only {targets} \
         deployment targets"
    )]
    StateAnomaly {
        /// Application inspected.
        app_name: String,
        /// Running instances found.
        running: usize,
        /// Deployment targets found.
        targets: usize,
    },

    /// Composite distribution status could not be interpreted.
    #[error("distribution status for '{app_name}' is unreadable: {source}")]
    DistributionStatus {
        /// Application inspected.
        app_name: String,
        /// Parse failure.
        #[source]
        source: DistributionParseError,
    },

    /// A start or stop call returned no acknowledgement.
    #[error("could not {operation} application '{app_name}'; consult the server logs")]
    MissingAcknowledgement {
        /// Operation issued.
        operation: Operation,
        /// Application addressed.
        app_name: String,
    },

    /// A name returned by the remote side could not be interpreted.
    #[error("unusable managed object name for '{subject}': {source}")]
    MalformedName {
        /// Application, cluster or query the name was about.
        subject: String,
        /// Parse failure.
        #[source]
        source: NameParseError,
    },

    /// The package descriptor could not be read.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    /// The initial probe against the management server failed.
    #[error(
        "failed to reach the management server; check the address, credentials and that the \
         user holds at least the monitor role"
    )]
    ConnectionCheck {
        /// Failure raised by the probe.
        #[source]
        source: Box<LifecycleError>,
    },

    /// The supplied configuration failed validation.
    #[error("unusable configuration: {0}")]
    Config(#[from] ConfigError),
}

impl LifecycleError {
    /// Classifies the error.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Topology(_) => FailureKind::Topology,
            Self::Remote { .. } => FailureKind::Remote,
            Self::TaskFailed { .. } => FailureKind::TaskFailed,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::Inconclusive { .. } => FailureKind::Inconclusive,
            Self::StateAnomaly { .. } => FailureKind::StateAnomaly,
            Self::DistributionStatus { .. } => FailureKind::DistributionStatus,
            Self::MissingAcknowledgement { .. } => FailureKind::MissingAcknowledgement,
            Self::MalformedName { .. } => FailureKind::MalformedName,
            Self::Descriptor(_) => FailureKind::Descriptor,
            Self::ConnectionCheck { .. } => FailureKind::ConnectionCheck,
            Self::Config(_) => FailureKind::Config,
        }
    }

    /// Wraps a channel failure.
    pub(crate) fn remote(
        operation: Operation,
        subject: impl Into<String>,
        source: ChannelError,
    ) -> Self {
        Self::Remote {
            operation,
            subject: subject.into(),
            source,
        }
    }

    /// Wraps a name that could not be interpreted.
    pub(crate) fn malformed(subject: impl Into<String>, source: NameParseError) -> Self {
        Self::MalformedName {
            subject: subject.into(),
            source,
        }
    }

    /// Translates a failed wait into the matching taxonomy entry.
    pub(crate) fn from_correlation(subject: impl Into<String>, source: CorrelationError) -> Self {
        match source {
            CorrelationError::Timeout { task, waited } => Self::Timeout {
                task,
                subject: subject.into(),
                waited,
            },
            other => Self::Inconclusive {
                task: other.task(),
                subject: subject.into(),
                source: other,
            },
        }
    }
}
