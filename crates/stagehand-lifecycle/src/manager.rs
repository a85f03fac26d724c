//! Lifecycle Orchestrator: idempotent decisions over the client's verbs.

use std::fmt;
use std::path::Path;
use std::thread;
use std::time::Duration;

use stagehand_config::{Config, default_distribution_poll_interval};
use tracing::{debug, info, warn};

use crate::client::{ApplicationManagement, InstallRequest};
use crate::descriptor::PackageDescriptor;
use crate::errors::LifecycleError;

/// Log target for orchestrator decisions.
pub(crate) const MANAGER_TARGET: &str = "stagehand_lifecycle::manager";

/// Application probed when checking that the connection is usable.
pub const PROBE_APP_NAME: &str = "non_existent_app";

/// Observed run state of an installed application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationState {
    /// No server runs the application.
    NotStarted,
    /// Some, but not all, mapped servers run the application.
    PartiallyStarted {
        /// Servers running the application.
        running: usize,
        /// Servers the application is mapped to.
        targets: usize,
    },
    /// Every mapped server runs the application.
    Started,
}

impl ApplicationState {
    /// Whether every mapped server runs the application.
    #[must_use]
    pub const fn is_started(self) -> bool {
        matches!(self, Self::Started)
    }
}

impl fmt::Display for ApplicationState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => formatter.write_str("not started"),
            Self::PartiallyStarted { running, targets } => {
                write!(formatter, "partially started ({running}/{targets})")
            }
            Self::Started => formatter.write_str("started"),
        }
    }
}

/// Drives applications to the requested state, skipping redundant commands.
pub struct AppManager<A> {
    client: A,
    descriptor: Box<dyn PackageDescriptor>,
    poll_interval: Duration,
}

impl<A: ApplicationManagement> AppManager<A> {
    /// Builds an orchestrator polling distribution status once a second.
    #[must_use]
    pub fn new(client: A, descriptor: Box<dyn PackageDescriptor>) -> Self {
        Self {
            client,
            descriptor,
            poll_interval: default_distribution_poll_interval(),
        }
    }

    /// Builds an orchestrator using the configured poll interval.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Config`] when `config` fails validation.
    pub fn from_config(
        client: A,
        descriptor: Box<dyn PackageDescriptor>,
        config: &Config,
    ) -> Result<Self, LifecycleError> {
        config.validate()?;
        Ok(Self::new(client, descriptor).with_poll_interval(config.distribution_poll_interval()))
    }

    /// Builds an orchestrator after probing the management server.
    ///
    /// The probe asks whether [`PROBE_APP_NAME`] exists, which only needs
    /// monitor rights.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Config`] when `config` fails validation,
    /// before anything is sent, and [`LifecycleError::ConnectionCheck`] when
    /// the probe fails.
    pub fn connect(
        client: A,
        descriptor: Box<dyn PackageDescriptor>,
        config: &Config,
    ) -> Result<Self, LifecycleError> {
        config.validate()?;
        client
            .exists(PROBE_APP_NAME)
            .map_err(|source| LifecycleError::ConnectionCheck {
                source: Box::new(source),
            })?;
        debug!(target: MANAGER_TARGET, "management connection verified");
        Self::from_config(client, descriptor, config)
    }

    /// Overrides the distribution poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Client the orchestrator delegates to.
    #[must_use]
    pub const fn client(&self) -> &A {
        &self.client
    }

    /// Compares running instances against the association.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::StateAnomaly`] when more instances run than
    /// there are mapped servers, or any error raised by the client.
    pub fn application_state(&self, app_name: &str) -> Result<ApplicationState, LifecycleError> {
        let running = self.client.running_instances(app_name)?;
        if running == 0 {
            return Ok(ApplicationState::NotStarted);
        }

        let targets = self.client.association(app_name)?.len();
        match running.cmp(&targets) {
            std::cmp::Ordering::Equal => Ok(ApplicationState::Started),
            std::cmp::Ordering::Less => Ok(ApplicationState::PartiallyStarted { running, targets }),
            std::cmp::Ordering::Greater => {
                warn!(
                    target: MANAGER_TARGET,
                    app = app_name,
                    running,
                    targets,
                    "more running instances than deployment targets"
                );
                Err(LifecycleError::StateAnomaly {
                    app_name: app_name.to_owned(),
                    running,
                    targets,
                })
            }
        }
    }

    /// Whether every mapped server runs the application.
    ///
    /// # Errors
    ///
    /// See [`Self::application_state`].
    pub fn is_started(&self, app_name: &str) -> Result<bool, LifecycleError> {
        self.application_state(app_name).map(ApplicationState::is_started)
    }

    /// Starts the application unless it already runs everywhere.
    ///
    /// # Errors
    ///
    /// Propagates state and start failures.
    pub fn start_app(&self, app_name: &str) -> Result<(), LifecycleError> {
        if self.is_started(app_name)? {
            info!(target: MANAGER_TARGET, app = app_name, "application already started");
            return Ok(());
        }
        info!(target: MANAGER_TARGET, app = app_name, "starting application");
        self.client.start(app_name)
    }

    /// Stops the application when it runs on every mapped server.
    ///
    /// Partially started applications are left alone.
    ///
    /// # Errors
    ///
    /// Propagates state and stop failures.
    pub fn stop_app(&self, app_name: &str) -> Result<(), LifecycleError> {
        match self.application_state(app_name)? {
            ApplicationState::Started => {
                info!(target: MANAGER_TARGET, app = app_name, "stopping application");
                self.client.stop(app_name)
            }
            ApplicationState::PartiallyStarted { running, targets } => {
                info!(
                    target: MANAGER_TARGET,
                    app = app_name,
                    running,
                    targets,
                    "application not fully started, not stopping"
                );
                Ok(())
            }
            ApplicationState::NotStarted => {
                info!(target: MANAGER_TARGET, app = app_name, "application already stopped");
                Ok(())
            }
        }
    }

    /// Installs or redeploys an archive, then starts it once distributed.
    ///
    /// The application name defaults to the one declared by the archive. A
    /// named cluster pins the target; otherwise the client resolves it.
    ///
    /// # Errors
    ///
    /// Propagates descriptor, lookup, install, status and start failures.
    pub fn deploy(
        &self,
        archive: &Path,
        app_name: Option<&str>,
        cluster: Option<&str>,
    ) -> Result<(), LifecycleError> {
        let name = app_name.map_or_else(
            || self.descriptor.application_name(archive),
            |given| Ok(given.to_owned()),
        )?;
        let redeploy = self.client.exists(&name)?;
        let target = cluster
            .map(|cluster_name| self.client.lookup_cluster(cluster_name))
            .transpose()?;

        let request = InstallRequest::new(archive, name.as_str())
            .with_redeploy(redeploy)
            .with_target(target);
        self.client.install(&request)?;

        if self.is_started(&name)? {
            info!(
                target: MANAGER_TARGET,
                app = %name,
                "application already started after install"
            );
            return Ok(());
        }

        self.await_distribution(&name)?;
        info!(target: MANAGER_TARGET, app = %name, "starting application");
        self.client.start(&name)
    }

    /// Uninstalls the application when it is installed.
    ///
    /// # Errors
    ///
    /// Propagates existence and uninstall failures.
    pub fn undeploy(&self, app_name: &str) -> Result<(), LifecycleError> {
        if !self.client.exists(app_name)? {
            info!(target: MANAGER_TARGET, app = app_name, "application not installed");
            return Ok(());
        }
        self.client.uninstall(app_name)
    }

    /// Starts the application declared by an archive.
    ///
    /// # Errors
    ///
    /// Propagates descriptor failures and those of [`Self::start_app`].
    pub fn start_package(&self, archive: &Path) -> Result<(), LifecycleError> {
        let app_name = self.descriptor.application_name(archive)?;
        self.start_app(&app_name)
    }

    /// Stops the application declared by an archive.
    ///
    /// # Errors
    ///
    /// Propagates descriptor failures and those of [`Self::stop_app`].
    pub fn stop_package(&self, archive: &Path) -> Result<(), LifecycleError> {
        let app_name = self.descriptor.application_name(archive)?;
        self.stop_app(&app_name)
    }

    /// Uninstalls the application declared by an archive.
    ///
    /// # Errors
    ///
    /// Propagates descriptor failures and those of [`Self::undeploy`].
    pub fn undeploy_package(&self, archive: &Path) -> Result<(), LifecycleError> {
        let app_name = self.descriptor.application_name(archive)?;
        self.undeploy(&app_name)
    }

    fn await_distribution(&self, app_name: &str) -> Result<(), LifecycleError> {
        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            if self.client.is_distribution_ready(app_name)? {
                debug!(target: MANAGER_TARGET, app = app_name, attempt, "application distributed");
                return Ok(());
            }
            debug!(
                target: MANAGER_TARGET,
                app = app_name,
                attempt,
                "application not yet distributed"
            );
            thread::sleep(self.poll_interval);
        }
    }
}

impl<A: fmt::Debug> fmt::Debug for AppManager<A> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AppManager")
            .field("client", &self.client)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}
