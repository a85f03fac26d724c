//! Lifecycle notifications emitted by the remote side after a command.

use std::collections::BTreeMap;
use std::fmt;

/// Property holding the `+`-joined per-node distribution tokens.
pub const DISTRIBUTION_STATUS_COMPOSITE: &str = "compositeStatus";

/// Key property inside each composite token carrying the node's state.
pub const DISTRIBUTION_STATUS_KEY: &str = "distribution";

/// Token value for a node that has finished receiving the application.
pub const DISTRIBUTION_DONE: &str = "true";

/// Token value for a node that is still receiving the application.
pub const DISTRIBUTION_NOT_DONE: &str = "false";

/// Token value for a node whose state could not be determined.
pub const DISTRIBUTION_UNKNOWN: &str = "unknown";

/// Long-running remote task a notification reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskName {
    /// Install or redeploy of an application archive.
    Install,
    /// Removal of an application.
    Uninstall,
    /// Per-node distribution status query.
    DistributionStatusQuery,
}

impl TaskName {
    /// Stable identifier used in log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Uninstall => "uninstall",
            Self::DistributionStatusQuery => "distribution-status",
        }
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Progress reported for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// The task is still running.
    InProgress,
    /// The task finished successfully.
    Completed,
    /// The task reported a non-fatal problem and keeps running.
    Warning,
    /// The task finished unsuccessfully.
    Failed,
}

impl TaskStatus {
    /// Whether the status ends the task.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InProgress => "in progress",
            Self::Completed => "completed",
            Self::Warning => "warning",
            Self::Failed => "failed",
        };
        formatter.write_str(label)
    }
}

/// Asynchronous progress report for a remote task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleNotification {
    /// Task the notification belongs to.
    pub task: TaskName,
    /// Progress of the task.
    pub status: TaskStatus,
    /// Human-readable message supplied by the remote side.
    pub message: String,
    /// Additional task-specific properties.
    pub properties: BTreeMap<String, String>,
}

impl LifecycleNotification {
    /// Builds a notification without properties.
    #[must_use]
    pub fn new(task: TaskName, status: TaskStatus, message: impl Into<String>) -> Self {
        Self {
            task,
            status,
            message: message.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Attaches a property to the notification.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Looks up a property by key.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Whether this notification ends a wait for `expected`.
    #[must_use]
    pub fn concludes(&self, expected: TaskName) -> bool {
        self.task == expected && self.status.is_terminal()
    }
}
