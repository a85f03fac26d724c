//! In-memory management channel that records every call.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::channel::{
    ChannelError, InstallCommand, InstallMode, ManagementChannel, ModuleMapping,
    NotificationSink,
};
use crate::names::{MANAGEMENT_DOMAIN, ManagedObjectId, ObjectQuery};
use crate::notification::{
    DISTRIBUTION_STATUS_COMPOSITE, LifecycleNotification, TaskName, TaskStatus,
};

/// Cell every fake topology lives in.
pub const CELL: &str = "cell01";

/// Call observed by the fake channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelCall {
    /// `query` with the rendered pattern.
    Query(String),
    /// `cluster_members` with the rendered cluster name.
    ClusterMembers(String),
    /// `subscribe` with the sink identity.
    Subscribe(u64),
    /// `unsubscribe` with the sink identity.
    Unsubscribe(u64),
    /// `install_application`.
    Install {
        /// Application name.
        app: String,
        /// Module-to-target map sent with the command.
        modules: BTreeMap<String, String>,
        /// Install or redeploy.
        mode: InstallMode,
    },
    /// `uninstall_application`.
    Uninstall(String),
    /// `start_application`.
    Start(String),
    /// `stop_application`.
    Stop(String),
    /// `request_distribution_status`.
    DistributionStatus(String),
    /// `check_if_app_exists`.
    CheckExists(String),
    /// `application_info`.
    ApplicationInfo(String),
}

/// Channel operation that can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    /// Every `query`.
    Query,
    /// `subscribe`.
    Subscribe,
    /// `unsubscribe`.
    Unsubscribe,
    /// `install_application`.
    Install,
    /// `check_if_app_exists`.
    CheckExists,
}

/// How scripted notifications reach the subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Delivered inside the issuing call, before the caller starts waiting.
    Inline,
    /// Delivered from another thread after a delay.
    Threaded(Duration),
}

struct FakeState {
    objects: Vec<ManagedObjectId>,
    members: BTreeMap<ManagedObjectId, Vec<ManagedObjectId>>,
    subscribers: Vec<NotificationSink>,
    scripts: HashMap<TaskName, VecDeque<Vec<LifecycleNotification>>>,
    installed: BTreeSet<String>,
    mappings: BTreeMap<String, Vec<ModuleMapping>>,
    acknowledgement: Option<String>,
    failures: HashSet<FailPoint>,
    delivery: Delivery,
    calls: Vec<ChannelCall>,
}

/// Recording [`ManagementChannel`] backed by a scripted topology.
#[derive(Clone)]
pub struct FakeChannel {
    shared: Arc<Mutex<FakeState>>,
}

impl Default for FakeChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeChannel {
    /// Builds a channel exposing only the notification emitter.
    pub fn new() -> Self {
        let emitter = ManagedObjectId::new(
            MANAGEMENT_DOMAIN,
            [("type", "AppManagement"), ("cell", CELL), ("name", "AppManagement")],
        );
        Self {
            shared: Arc::new(Mutex::new(FakeState {
                objects: vec![emitter],
                members: BTreeMap::new(),
                subscribers: Vec::new(),
                scripts: HashMap::new(),
                installed: BTreeSet::new(),
                mappings: BTreeMap::new(),
                acknowledgement: Some(String::from("ADMA5011I")),
                failures: HashSet::new(),
                delivery: Delivery::Inline,
                calls: Vec::new(),
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.shared
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    /// Removes the notification emitter from the topology.
    pub fn without_emitter(self) -> Self {
        let matcher = ObjectQuery::app_management();
        self.state().objects.retain(|object| !matcher.matches(object));
        self
    }

    /// Adds a cluster whose members are managed servers on `node01`.
    pub fn with_cluster(self, name: &str, servers: &[&str]) -> Self {
        let cluster = ManagedObjectId::new(
            MANAGEMENT_DOMAIN,
            [("type", "Cluster"), ("cell", CELL), ("name", name)],
        );
        let members: Vec<_> = servers
            .iter()
            .map(|server| managed_server(CELL, "node01", server))
            .collect();
        {
            let mut state = self.state();
            state.objects.push(cluster.clone());
            state.objects.extend(members.iter().cloned());
            state.members.insert(cluster, members);
        }
        self
    }

    /// Adds a managed server outside any cluster.
    pub fn with_managed_server(self, node: &str, name: &str) -> Self {
        self.state().objects.push(managed_server(CELL, node, name));
        self
    }

    /// Adds a stand-alone server.
    pub fn with_unmanaged_server(self, node: &str, name: &str) -> Self {
        self.state().objects.push(ManagedObjectId::new(
            MANAGEMENT_DOMAIN,
            [
                ("type", "Server"),
                ("processType", "UnManagedProcess"),
                ("cell", CELL),
                ("node", node),
                ("name", name),
            ],
        ));
        self
    }

    /// Marks `app` as installed and mapped to `targets` (`+`-joined text).
    pub fn with_installed_app(self, app: &str, targets: &str) -> Self {
        {
            let mut state = self.state();
            state.installed.insert(app.to_owned());
            state.mappings.insert(
                app.to_owned(),
                vec![ModuleMapping::new("web", "web.war,WEB-INF/web.xml", targets)],
            );
        }
        self
    }

    /// Adds an explicit module mapping row for `app`.
    pub fn with_mapping(self, app: &str, mapping: ModuleMapping) -> Self {
        self.state()
            .mappings
            .entry(app.to_owned())
            .or_default()
            .push(mapping);
        self
    }

    /// Reports `count` running instances of `app`.
    pub fn with_running_instances(self, app: &str, count: usize) -> Self {
        {
            let mut state = self.state();
            for index in 0..count {
                let server = format!("server{index}");
                state.objects.push(ManagedObjectId::new(
                    MANAGEMENT_DOMAIN,
                    [
                        ("type", "Application"),
                        ("name", app),
                        ("process", server.as_str()),
                    ],
                ));
            }
        }
        self
    }

    /// Queues the notifications emitted the next time `task` is issued.
    pub fn script(self, task: TaskName, burst: Vec<LifecycleNotification>) -> Self {
        self.state()
            .scripts
            .entry(task)
            .or_default()
            .push_back(burst);
        self
    }

    /// Sets the acknowledgement returned by start and stop.
    pub fn with_acknowledgement(self, acknowledgement: Option<&str>) -> Self {
        self.state().acknowledgement = acknowledgement.map(str::to_owned);
        self
    }

    /// Makes an operation fail.
    pub fn failing(self, point: FailPoint) -> Self {
        self.state().failures.insert(point);
        self
    }

    /// Chooses how scripted notifications are delivered.
    pub fn with_delivery(self, delivery: Delivery) -> Self {
        self.state().delivery = delivery;
        self
    }

    /// Every call observed so far.
    pub fn calls(&self) -> Vec<ChannelCall> {
        self.state().calls.clone()
    }

    /// Number of calls satisfying `predicate`.
    pub fn count(&self, predicate: impl Fn(&ChannelCall) -> bool) -> usize {
        self.state().calls.iter().filter(|call| predicate(call)).count()
    }

    /// Listeners still registered.
    pub fn subscriber_count(&self) -> usize {
        self.state().subscribers.len()
    }

    fn record(&self, call: ChannelCall) {
        self.state().calls.push(call);
    }

    fn check(&self, point: FailPoint) -> Result<(), ChannelError> {
        if self.state().failures.contains(&point) {
            return Err(ChannelError::new(format!("injected {point:?} failure")));
        }
        Ok(())
    }

    fn emit(&self, task: TaskName, default: LifecycleNotification) {
        let (burst, sinks, delivery) = {
            let mut state = self.state();
            let burst = state
                .scripts
                .get_mut(&task)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| vec![default]);
            (burst, state.subscribers.clone(), state.delivery)
        };
        let send = move || {
            for notification in burst {
                for sink in &sinks {
                    sink.deliver(notification.clone());
                }
            }
        };
        match delivery {
            Delivery::Inline => send(),
            Delivery::Threaded(delay) => {
                thread::spawn(move || {
                    thread::sleep(delay);
                    send();
                });
            }
        }
    }
}

impl ManagementChannel for FakeChannel {
    fn query(&self, query: &ObjectQuery) -> Result<Vec<ManagedObjectId>, ChannelError> {
        self.record(ChannelCall::Query(query.to_string()));
        self.check(FailPoint::Query)?;
        Ok(self
            .state()
            .objects
            .iter()
            .filter(|object| query.matches(object))
            .cloned()
            .collect())
    }

    fn cluster_members(
        &self,
        cluster: &ManagedObjectId,
    ) -> Result<Vec<ManagedObjectId>, ChannelError> {
        self.record(ChannelCall::ClusterMembers(cluster.to_string()));
        Ok(self
            .state()
            .members
            .get(cluster)
            .cloned()
            .unwrap_or_default())
    }

    fn subscribe(
        &self,
        _emitter: &ManagedObjectId,
        sink: NotificationSink,
    ) -> Result<(), ChannelError> {
        self.record(ChannelCall::Subscribe(sink.id()));
        self.check(FailPoint::Subscribe)?;
        self.state().subscribers.push(sink);
        Ok(())
    }

    fn unsubscribe(
        &self,
        _emitter: &ManagedObjectId,
        sink: &NotificationSink,
    ) -> Result<(), ChannelError> {
        self.record(ChannelCall::Unsubscribe(sink.id()));
        self.state().subscribers.retain(|registered| registered != sink);
        self.check(FailPoint::Unsubscribe)
    }

    fn install_application(
        &self,
        command: &InstallCommand,
    ) -> Result<Option<String>, ChannelError> {
        self.record(ChannelCall::Install {
            app: command.app_name().to_owned(),
            modules: command.module_to_target(),
            mode: command.mode(),
        });
        self.check(FailPoint::Install)?;
        self.state().installed.insert(command.app_name().to_owned());
        self.emit(
            TaskName::Install,
            LifecycleNotification::new(TaskName::Install, TaskStatus::Completed, "installed"),
        );
        Ok(Some(String::from("ADMA5016I")))
    }

    fn uninstall_application(&self, app_name: &str) -> Result<Option<String>, ChannelError> {
        self.record(ChannelCall::Uninstall(app_name.to_owned()));
        self.state().installed.remove(app_name);
        self.emit(
            TaskName::Uninstall,
            LifecycleNotification::new(TaskName::Uninstall, TaskStatus::Completed, "removed"),
        );
        Ok(None)
    }

    fn start_application(&self, app_name: &str) -> Result<Option<String>, ChannelError> {
        self.record(ChannelCall::Start(app_name.to_owned()));
        Ok(self.state().acknowledgement.clone())
    }

    fn stop_application(&self, app_name: &str) -> Result<Option<String>, ChannelError> {
        self.record(ChannelCall::Stop(app_name.to_owned()));
        Ok(self.state().acknowledgement.clone())
    }

    fn request_distribution_status(&self, app_name: &str) -> Result<(), ChannelError> {
        self.record(ChannelCall::DistributionStatus(app_name.to_owned()));
        self.emit(
            TaskName::DistributionStatusQuery,
            distribution_notification(&["true"]),
        );
        Ok(())
    }

    fn check_if_app_exists(&self, app_name: &str) -> Result<bool, ChannelError> {
        self.record(ChannelCall::CheckExists(app_name.to_owned()));
        self.check(FailPoint::CheckExists)?;
        Ok(self.state().installed.contains(app_name))
    }

    fn application_info(&self, app_name: &str) -> Result<Vec<ModuleMapping>, ChannelError> {
        self.record(ChannelCall::ApplicationInfo(app_name.to_owned()));
        Ok(self
            .state()
            .mappings
            .get(app_name)
            .cloned()
            .unwrap_or_default())
    }
}

/// Managed server object with the key properties the resolver reads.
pub fn managed_server(cell: &str, node: &str, name: &str) -> ManagedObjectId {
    ManagedObjectId::new(
        MANAGEMENT_DOMAIN,
        [
            ("type", "Server"),
            ("processType", "ManagedProcess"),
            ("cell", cell),
            ("node", node),
            ("name", name),
        ],
    )
}

/// Completed distribution status notification with one token per state.
pub fn distribution_notification(states: &[&str]) -> LifecycleNotification {
    let composite = states
        .iter()
        .enumerate()
        .map(|(index, state)| {
            format!("{MANAGEMENT_DOMAIN}:cell={CELL},node=node{index},distribution={state}")
        })
        .collect::<Vec<_>>()
        .join("+");
    LifecycleNotification::new(
        TaskName::DistributionStatusQuery,
        TaskStatus::Completed,
        "status gathered",
    )
    .with_property(DISTRIBUTION_STATUS_COMPOSITE, composite)
}
