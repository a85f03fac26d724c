//! Application Management Client: one blocking call per lifecycle verb.
//!
//! Long-running verbs (install, uninstall, distribution status) are issued as
//! tracked commands: under the client's lock the correlator is cleared, a
//! listener is registered on the application-management emitter, the command
//! is issued and the caller blocks until a terminal notification arrives. The
//! listener is removed afterwards whatever the outcome.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use stagehand_config::Config;
use tracing::{debug, info, warn};

use crate::channel::{ChannelError, InstallCommand, InstallMode, ManagementChannel};
use crate::correlator::NotificationCorrelator;
use crate::distribution::parse_distribution_status;
use crate::errors::{LifecycleError, Operation};
use crate::names::{ManagedObjectId, ObjectQuery};
use crate::notification::{
    DISTRIBUTION_STATUS_COMPOSITE, LifecycleNotification, TaskName, TaskStatus,
};
use crate::target::{AssociationSet, DeploymentTarget, MappedTarget, TargetResolver};

/// Log target for client operations.
pub(crate) const CLIENT_TARGET: &str = "stagehand_lifecycle::client";

/// Parameters of an install or redeploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    /// Archive to upload.
    pub archive: PathBuf,
    /// Name the application installs under.
    pub app_name: String,
    /// Replace an existing installation.
    pub redeploy: bool,
    /// Explicit target; resolved automatically when absent.
    pub target: Option<DeploymentTarget>,
}

impl InstallRequest {
    /// Builds a first-time install with automatic target resolution.
    #[must_use]
    pub fn new(archive: impl Into<PathBuf>, app_name: impl Into<String>) -> Self {
        Self {
            archive: archive.into(),
            app_name: app_name.into(),
            redeploy: false,
            target: None,
        }
    }

    /// Marks the request as a redeploy.
    #[must_use]
    pub const fn with_redeploy(mut self, redeploy: bool) -> Self {
        self.redeploy = redeploy;
        self
    }

    /// Pins the deployment target.
    #[must_use]
    pub fn with_target(mut self, target: Option<DeploymentTarget>) -> Self {
        self.target = target;
        self
    }
}

/// Lifecycle verbs the orchestrator builds on.
pub trait ApplicationManagement {
    /// Whether the application is installed.
    ///
    /// # Errors
    ///
    /// Returns a remote error when the query fails.
    fn exists(&self, app_name: &str) -> Result<bool, LifecycleError>;

    /// Starts the application on every mapped target.
    ///
    /// # Errors
    ///
    /// Fails when the call fails or returns no acknowledgement.
    fn start(&self, app_name: &str) -> Result<(), LifecycleError>;

    /// Stops the application on every mapped target.
    ///
    /// # Errors
    ///
    /// Fails when the call fails or returns no acknowledgement.
    fn stop(&self, app_name: &str) -> Result<(), LifecycleError>;

    /// Installs or redeploys an archive and waits for the task to finish.
    ///
    /// # Errors
    ///
    /// Fails on target ambiguity, remote failure, a failed task or a
    /// non-conclusive wait.
    fn install(&self, request: &InstallRequest) -> Result<(), LifecycleError>;

    /// Uninstalls the application and waits for the task to finish.
    ///
    /// # Errors
    ///
    /// Fails on remote failure, a failed task or a non-conclusive wait.
    fn uninstall(&self, app_name: &str) -> Result<(), LifecycleError>;

    /// Whether every node has received the application.
    ///
    /// # Errors
    ///
    /// Fails on remote failure, a non-conclusive wait or an unreadable status.
    fn is_distribution_ready(&self, app_name: &str) -> Result<bool, LifecycleError>;

    /// Concrete servers the application's modules are mapped to.
    ///
    /// # Errors
    ///
    /// Fails on remote failure, a malformed mapping or cluster ambiguity.
    fn association(&self, app_name: &str) -> Result<AssociationSet, LifecycleError>;

    /// Number of servers currently running the application.
    ///
    /// # Errors
    ///
    /// Returns a remote error when the query fails.
    fn running_instances(&self, app_name: &str) -> Result<usize, LifecycleError>;

    /// Cluster target with the given name.
    ///
    /// # Errors
    ///
    /// Fails when no cluster matches or the query fails.
    fn lookup_cluster(&self, name: &str) -> Result<DeploymentTarget, LifecycleError>;
}

/// Blocking lifecycle client over a [`ManagementChannel`].
///
/// Calls on one client are serialised; use one client per connection.
#[derive(Debug)]
pub struct AppManagementClient<C> {
    channel: C,
    correlator: Mutex<NotificationCorrelator>,
}

impl<C: ManagementChannel> AppManagementClient<C> {
    /// Builds a client waiting at most `wait_bound` for each tracked task.
    #[must_use]
    pub fn new(channel: C, wait_bound: Duration) -> Self {
        Self {
            channel,
            correlator: Mutex::new(NotificationCorrelator::new(wait_bound)),
        }
    }

    /// Builds a client using the configured notification timeout.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Config`] when `config` fails validation.
    pub fn from_config(channel: C, config: &Config) -> Result<Self, LifecycleError> {
        config.validate()?;
        Ok(Self::new(channel, config.notification_timeout()))
    }

    /// Underlying channel.
    #[must_use]
    pub const fn channel(&self) -> &C {
        &self.channel
    }

    fn resolver(&self) -> TargetResolver<'_, C> {
        TargetResolver::new(&self.channel)
    }

    fn emitter(&self, subject: &str) -> Result<ManagedObjectId, LifecycleError> {
        let query = ObjectQuery::app_management();
        self.channel
            .query(&query)
            .map_err(|source| LifecycleError::remote(Operation::Query, query.to_string(), source))?
            .into_iter()
            .next()
            .ok_or_else(|| {
                LifecycleError::remote(
                    Operation::Subscribe,
                    subject,
                    ChannelError::new(format!("no notification emitter matches {query}")),
                )
            })
    }

    /// Issues a command and blocks until its task reaches a terminal status.
    fn run_tracked<F>(
        &self,
        task: TaskName,
        subject: &str,
        operation: Operation,
        issue: F,
    ) -> Result<LifecycleNotification, LifecycleError>
    where
        F: FnOnce(&C) -> Result<(), ChannelError>,
    {
        let correlator = self
            .correlator
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());

        let emitter = self.emitter(subject)?;
        correlator.reset();
        let sink = correlator.sink();
        self.channel
            .subscribe(&emitter, sink.clone())
            .map_err(|source| LifecycleError::remote(Operation::Subscribe, subject, source))?;

        let outcome = issue(&self.channel)
            .map_err(|source| LifecycleError::remote(operation, subject, source))
            .and_then(|()| {
                correlator
                    .await_terminal(task)
                    .map_err(|source| LifecycleError::from_correlation(subject, source))
            });

        if let Err(error) = self.channel.unsubscribe(&emitter, &sink) {
            warn!(
                target: CLIENT_TARGET,
                task = %task,
                subject,
                error = %error,
                "failed to remove notification listener"
            );
        }

        let notification = outcome?;
        if notification.status == TaskStatus::Failed {
            return Err(LifecycleError::TaskFailed {
                task,
                subject: subject.to_owned(),
                message: notification.message,
            });
        }
        Ok(notification)
    }

    fn acknowledge(
        &self,
        operation: Operation,
        app_name: &str,
        call: impl FnOnce(&C) -> Result<Option<String>, ChannelError>,
    ) -> Result<(), LifecycleError> {
        let _single_flight = self
            .correlator
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());

        let ack = call(&self.channel)
            .map_err(|source| LifecycleError::remote(operation, app_name, source))?
            .ok_or_else(|| LifecycleError::MissingAcknowledgement {
                operation,
                app_name: app_name.to_owned(),
            })?;
        info!(
            target: CLIENT_TARGET,
            app = app_name,
            operation = %operation,
            ack = %ack,
            "application lifecycle call acknowledged"
        );
        Ok(())
    }
}

impl<C: ManagementChannel> ApplicationManagement for AppManagementClient<C> {
    fn exists(&self, app_name: &str) -> Result<bool, LifecycleError> {
        self.channel
            .check_if_app_exists(app_name)
            .map_err(|source| LifecycleError::remote(Operation::CheckExists, app_name, source))
    }

    fn start(&self, app_name: &str) -> Result<(), LifecycleError> {
        self.acknowledge(Operation::Start, app_name, |channel| {
            channel.start_application(app_name)
        })
    }

    fn stop(&self, app_name: &str) -> Result<(), LifecycleError> {
        self.acknowledge(Operation::Stop, app_name, |channel| {
            channel.stop_application(app_name)
        })
    }

    fn install(&self, request: &InstallRequest) -> Result<(), LifecycleError> {
        let target = request
            .target
            .clone()
            .map_or_else(|| self.resolver().resolve_unique_target(), Ok)?;
        let command = InstallCommand::new(
            request.archive.as_path(),
            request.app_name.as_str(),
            target,
            InstallMode::for_existing(request.redeploy),
        );
        info!(
            target: CLIENT_TARGET,
            app = %request.app_name,
            archive = %command.archive().display(),
            deployment_target = %command.target(),
            mode = ?command.mode(),
            "installing application"
        );

        self.run_tracked(
            TaskName::Install,
            &request.app_name,
            Operation::Install,
            |channel| {
                let ack = channel.install_application(&command)?;
                debug!(target: CLIENT_TARGET, app = %request.app_name, ack = ?ack, "install issued");
                Ok(())
            },
        )?;
        info!(target: CLIENT_TARGET, app = %request.app_name, "application installed");
        Ok(())
    }

    fn uninstall(&self, app_name: &str) -> Result<(), LifecycleError> {
        info!(target: CLIENT_TARGET, app = app_name, "uninstalling application");
        self.run_tracked(
            TaskName::Uninstall,
            app_name,
            Operation::Uninstall,
            |channel| {
                let ack = channel.uninstall_application(app_name)?;
                debug!(target: CLIENT_TARGET, app = app_name, ack = ?ack, "uninstall issued");
                Ok(())
            },
        )?;
        info!(target: CLIENT_TARGET, app = app_name, "application uninstalled");
        Ok(())
    }

    fn is_distribution_ready(&self, app_name: &str) -> Result<bool, LifecycleError> {
        let notification = self.run_tracked(
            TaskName::DistributionStatusQuery,
            app_name,
            Operation::DistributionStatus,
            |channel| channel.request_distribution_status(app_name),
        )?;

        let composite = notification
            .property(DISTRIBUTION_STATUS_COMPOSITE)
            .unwrap_or_default();
        let ready = parse_distribution_status(composite).map_err(|source| {
            LifecycleError::DistributionStatus {
                app_name: app_name.to_owned(),
                source,
            }
        })?;
        debug!(
            target: CLIENT_TARGET,
            app = app_name,
            composite,
            ready,
            "distribution status"
        );
        Ok(ready)
    }

    fn association(&self, app_name: &str) -> Result<AssociationSet, LifecycleError> {
        let mappings = self
            .channel
            .application_info(app_name)
            .map_err(|source| LifecycleError::remote(Operation::ApplicationInfo, app_name, source))?;

        let resolver = self.resolver();
        let mut servers = AssociationSet::new();
        for mapping in &mappings {
            for name in mapping.target_names() {
                match MappedTarget::parse(name)
                    .map_err(|source| LifecycleError::malformed(app_name, source))?
                {
                    MappedTarget::Cluster(cluster) => {
                        servers.extend(resolver.expand_cluster(&cluster)?);
                    }
                    MappedTarget::Server(server) => {
                        servers.insert(server);
                    }
                }
            }
        }
        debug!(
            target: CLIENT_TARGET,
            app = app_name,
            modules = mappings.len(),
            servers = servers.len(),
            "computed association"
        );
        Ok(servers)
    }

    fn running_instances(&self, app_name: &str) -> Result<usize, LifecycleError> {
        let query = ObjectQuery::running_application(app_name)
            .map_err(|source| LifecycleError::malformed(app_name, source))?;
        self.channel
            .query(&query)
            .map(|instances| instances.len())
            .map_err(|source| LifecycleError::remote(Operation::Query, app_name, source))
    }

    fn lookup_cluster(&self, name: &str) -> Result<DeploymentTarget, LifecycleError> {
        let cluster = self.resolver().lookup_cluster(name)?;
        DeploymentTarget::from_cluster_object(&cluster)
            .map_err(|source| LifecycleError::malformed(name, source))
    }
}
