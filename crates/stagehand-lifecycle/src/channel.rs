//! Boundary to the remote management channel.
//!
//! The orchestrator never talks to the wire directly. Connection set-up,
//! transport and marshalling live behind [`ManagementChannel`], which exposes
//! one strongly typed method per remote operation. Asynchronous task progress
//! flows back through a [`NotificationSink`] registered with
//! [`ManagementChannel::subscribe`].

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Sender;

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::names::{ManagedObjectId, ObjectQuery};
use crate::notification::{LifecycleNotification, TaskStatus};
use crate::target::DeploymentTarget;

/// Log target for notification delivery.
pub(crate) const NOTIFICATION_TARGET: &str = "stagehand_lifecycle::notification";

/// Module pattern mapping every module of an archive to one target.
pub const ALL_MODULES: &str = "*";

static NEXT_SINK_ID: AtomicU64 = AtomicU64::new(1);

/// Errors reported by channel implementations.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ChannelError {
    message: String,
    #[source]
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl ChannelError {
    /// Builds an error without an underlying source.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Builds an error that wraps an underlying source.
    #[must_use]
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Human-friendly description without the optional source.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

/// Whether an install command creates or replaces the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMode {
    /// First installation of the application.
    Install,
    /// Replace an application that already exists.
    Redeploy,
}

impl InstallMode {
    /// Picks the mode from whether the application already exists.
    #[must_use]
    pub const fn for_existing(exists: bool) -> Self {
        if exists { Self::Redeploy } else { Self::Install }
    }
}

/// Fully resolved install or redeploy request handed to the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallCommand {
    archive: PathBuf,
    app_name: String,
    target: DeploymentTarget,
    mode: InstallMode,
}

impl InstallCommand {
    /// Builds a command deploying every module of `archive` to `target`.
    #[must_use]
    pub fn new(
        archive: impl Into<PathBuf>,
        app_name: impl Into<String>,
        target: DeploymentTarget,
        mode: InstallMode,
    ) -> Self {
        Self {
            archive: archive.into(),
            app_name: app_name.into(),
            target,
            mode,
        }
    }

    /// Local path of the archive to upload.
    #[must_use]
    pub fn archive(&self) -> &Path {
        self.archive.as_path()
    }

    /// Application name on the remote side.
    #[must_use]
    pub fn app_name(&self) -> &str {
        self.app_name.as_str()
    }

    /// Target receiving every module.
    #[must_use]
    pub const fn target(&self) -> &DeploymentTarget {
        &self.target
    }

    /// Install or redeploy.
    #[must_use]
    pub const fn mode(&self) -> InstallMode {
        self.mode
    }

    /// Module-to-target map sent with the command: `{"*": target}`.
    #[must_use]
    pub fn module_to_target(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(ALL_MODULES.to_owned(), self.target.canonical())])
    }
}

/// One row of an application's module-to-server mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleMapping {
    /// Display name of the module.
    pub module: String,
    /// Archive-relative URI of the module.
    pub uri: String,
    /// Target names, several joined with `+`.
    pub targets: String,
}

impl ModuleMapping {
    /// Builds a mapping row.
    #[must_use]
    pub fn new(
        module: impl Into<String>,
        uri: impl Into<String>,
        targets: impl Into<String>,
    ) -> Self {
        Self {
            module: module.into(),
            uri: uri.into(),
            targets: targets.into(),
        }
    }

    /// Individual target names, skipping empty segments.
    pub fn target_names(&self) -> impl Iterator<Item = &str> {
        self.targets
            .split('+')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
    }
}

/// Listener handle through which the channel reports task progress.
///
/// Each sink has a unique identity so a channel can remove exactly the
/// listener it was given when [`ManagementChannel::unsubscribe`] is called.
#[derive(Clone)]
pub struct NotificationSink {
    id: u64,
    sender: Sender<LifecycleNotification>,
}

impl NotificationSink {
    pub(crate) fn new(sender: Sender<LifecycleNotification>) -> Self {
        Self {
            id: NEXT_SINK_ID.fetch_add(1, Ordering::Relaxed),
            sender,
        }
    }

    /// Identity used to match subscriptions.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Hands a notification to the waiting caller.
    ///
    /// Called from the channel's dispatch thread. Delivery never blocks; if
    /// the waiting side has gone away the notification is dropped.
    pub fn deliver(&self, notification: LifecycleNotification) {
        match notification.status {
            TaskStatus::InProgress | TaskStatus::Completed => debug!(
                target: NOTIFICATION_TARGET,
                task = %notification.task,
                status = %notification.status,
                detail = %notification.message,
                "lifecycle notification"
            ),
            TaskStatus::Warning => warn!(
                target: NOTIFICATION_TARGET,
                task = %notification.task,
                detail = %notification.message,
                "lifecycle notification warning"
            ),
            TaskStatus::Failed => error!(
                target: NOTIFICATION_TARGET,
                task = %notification.task,
                detail = %notification.message,
                "lifecycle task failed"
            ),
        }

        if self.sender.send(notification).is_err() {
            debug!(
                target: NOTIFICATION_TARGET,
                sink = self.id,
                "no waiter for notification, dropping"
            );
        }
    }
}

impl PartialEq for NotificationSink {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for NotificationSink {}

impl fmt::Debug for NotificationSink {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("NotificationSink")
            .field("id", &self.id)
            .finish()
    }
}

/// Operations the orchestrator needs from the remote management server.
///
/// Implementations are shared between the caller's thread and whatever
/// thread delivers notifications, hence the `Send + Sync` bound. Lifecycle
/// proxy methods return the synchronous acknowledgement text, or `None` when
/// the remote side accepted the call without producing one.
pub trait ManagementChannel: Send + Sync {
    /// Lists managed objects matching a property pattern.
    fn query(&self, query: &ObjectQuery) -> Result<Vec<ManagedObjectId>, ChannelError>;

    /// Lists the member servers of a cluster object.
    fn cluster_members(&self, cluster: &ManagedObjectId)
    -> Result<Vec<ManagedObjectId>, ChannelError>;

    /// Registers a listener for notifications emitted by `emitter`.
    fn subscribe(
        &self,
        emitter: &ManagedObjectId,
        sink: NotificationSink,
    ) -> Result<(), ChannelError>;

    /// Removes a listener previously passed to [`Self::subscribe`].
    fn unsubscribe(
        &self,
        emitter: &ManagedObjectId,
        sink: &NotificationSink,
    ) -> Result<(), ChannelError>;

    /// Starts an install or redeploy task.
    fn install_application(&self, command: &InstallCommand)
    -> Result<Option<String>, ChannelError>;

    /// Starts an uninstall task.
    fn uninstall_application(&self, app_name: &str) -> Result<Option<String>, ChannelError>;

    /// Starts the application on every target it is mapped to.
    fn start_application(&self, app_name: &str) -> Result<Option<String>, ChannelError>;

    /// Stops the application on every target it is mapped to.
    fn stop_application(&self, app_name: &str) -> Result<Option<String>, ChannelError>;

    /// Starts a distribution status task; the answer arrives as a notification.
    fn request_distribution_status(&self, app_name: &str) -> Result<(), ChannelError>;

    /// Whether an application with this name is installed in the cell.
    fn check_if_app_exists(&self, app_name: &str) -> Result<bool, ChannelError>;

    /// Module-to-server mapping of an installed application.
    fn application_info(&self, app_name: &str) -> Result<Vec<ModuleMapping>, ChannelError>;
}
