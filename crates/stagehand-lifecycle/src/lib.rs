//! Application lifecycle orchestration against a remote management server.
//!
//! The crate drives an application package through install, start, stop,
//! redeploy and uninstall without anyone polling a console. Remote access
//! sits behind the [`ManagementChannel`] trait; everything above it is plain
//! blocking code:
//!
//! - [`TargetResolver`] picks a deployment target when none is given and
//!   expands cluster references into member servers.
//! - [`NotificationCorrelator`] hands terminal task notifications from the
//!   channel's dispatch thread to the waiting caller.
//! - [`AppManagementClient`] turns each lifecycle verb into one call with a
//!   deterministic outcome.
//! - [`AppManager`] skips redundant commands and runs the
//!   install, wait-for-distribution, start workflow.

mod channel;
mod client;
mod correlator;
mod descriptor;
mod distribution;
mod errors;
mod manager;
mod names;
mod notification;
mod target;
pub mod telemetry;

#[cfg(test)]
mod tests;

pub use channel::{
    ALL_MODULES, ChannelError, InstallCommand, InstallMode, ManagementChannel, ModuleMapping,
    NotificationSink,
};
pub use client::{AppManagementClient, ApplicationManagement, InstallRequest};
pub use correlator::{CorrelationError, NotificationCorrelator};
pub use descriptor::{ArchiveStem, DescriptorError, FixedName, PackageDescriptor};
pub use distribution::{DistributionParseError, parse_distribution_status};
pub use errors::{FailureKind, LifecycleError, Operation, TopologyError};
pub use manager::{AppManager, ApplicationState, PROBE_APP_NAME};
pub use names::{MANAGEMENT_DOMAIN, ManagedObjectId, NameParseError, ObjectQuery};
pub use notification::{
    DISTRIBUTION_DONE, DISTRIBUTION_NOT_DONE, DISTRIBUTION_STATUS_COMPOSITE,
    DISTRIBUTION_STATUS_KEY, DISTRIBUTION_UNKNOWN, LifecycleNotification, TaskName, TaskStatus,
};
pub use target::{
    AssociationSet, DeploymentTarget, TargetCandidates, TargetCategory, TargetResolver,
    choose_unique_target,
};
