//! Deployment targets and their resolution from the remote topology.

use std::collections::BTreeSet;
use std::collections::btree_set;
use std::fmt;

use tracing::debug;

use crate::channel::ManagementChannel;
use crate::errors::{LifecycleError, Operation, TopologyError};
use crate::names::{MANAGEMENT_DOMAIN, ManagedObjectId, NameParseError, ObjectQuery};

/// Log target for target resolution.
pub(crate) const RESOLVER_TARGET: &str = "stagehand_lifecycle::target";

/// Where an application's modules are mapped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeploymentTarget {
    /// Every member of a cluster.
    Cluster {
        /// Cell the cluster belongs to.
        cell: String,
        /// Cluster name.
        name: String,
    },
    /// A single server.
    Server {
        /// Cell the server belongs to.
        cell: String,
        /// Node hosting the server.
        node: String,
        /// Server name.
        name: String,
    },
}

impl DeploymentTarget {
    /// Builds a cluster target.
    #[must_use]
    pub fn cluster(cell: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Cluster {
            cell: cell.into(),
            name: name.into(),
        }
    }

    /// Builds a server target.
    #[must_use]
    pub fn server(cell: impl Into<String>, node: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Server {
            cell: cell.into(),
            node: node.into(),
            name: name.into(),
        }
    }

    /// Builds a cluster target from a cluster object (`cell` and `name` keys).
    ///
    /// # Errors
    ///
    /// Returns [`NameParseError::MissingKey`] when a key is absent.
    pub fn from_cluster_object(object: &ManagedObjectId) -> Result<Self, NameParseError> {
        Ok(Self::cluster(object.require("cell")?, object.require("name")?))
    }

    /// Builds a server target from a server object (`cell`, `node`, `name`).
    ///
    /// # Errors
    ///
    /// Returns [`NameParseError::MissingKey`] when a key is absent.
    pub fn from_server_object(object: &ManagedObjectId) -> Result<Self, NameParseError> {
        Ok(Self::server(
            object.require("cell")?,
            object.require("node")?,
            object.require("name")?,
        ))
    }

    /// Canonical text used on the wire and as a map key.
    #[must_use]
    pub fn canonical(&self) -> String {
        match self {
            Self::Cluster { cell, name } => {
                format!("{MANAGEMENT_DOMAIN}:cell={cell},cluster={name}")
            }
            Self::Server { cell, node, name } => {
                format!("{MANAGEMENT_DOMAIN}:cell={cell},node={node},server={name}")
            }
        }
    }
}

impl fmt::Display for DeploymentTarget {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.canonical())
    }
}

/// A target as written in an application's module mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MappedTarget {
    /// Reference to a cluster by name; must be expanded to its members.
    Cluster(String),
    /// A concrete server.
    Server(DeploymentTarget),
}

impl MappedTarget {
    /// Parses `WebSphere:cell=..,cluster=..` or `WebSphere:cell=..,node=..,server=..`.
    pub(crate) fn parse(text: &str) -> Result<Self, NameParseError> {
        let object: ManagedObjectId = text.parse()?;
        if let Some(cluster) = object.key_property("cluster") {
            return Ok(Self::Cluster(cluster.to_owned()));
        }
        Ok(Self::Server(DeploymentTarget::server(
            object.require("cell")?,
            object.require("node")?,
            object.require("server")?,
        )))
    }
}

/// Concrete servers an application's modules resolve to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssociationSet {
    servers: BTreeSet<DeploymentTarget>,
}

impl AssociationSet {
    /// Builds an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            servers: BTreeSet::new(),
        }
    }

    /// Adds a server; returns `false` when it was already present.
    pub fn insert(&mut self, server: DeploymentTarget) -> bool {
        self.servers.insert(server)
    }

    /// Number of distinct servers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Whether no server is associated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Iterates over the servers in canonical order.
    pub fn iter(&self) -> btree_set::Iter<'_, DeploymentTarget> {
        self.servers.iter()
    }
}

impl Extend<DeploymentTarget> for AssociationSet {
    fn extend<I: IntoIterator<Item = DeploymentTarget>>(&mut self, iter: I) {
        self.servers.extend(iter);
    }
}

impl FromIterator<DeploymentTarget> for AssociationSet {
    fn from_iter<I: IntoIterator<Item = DeploymentTarget>>(iter: I) -> Self {
        Self {
            servers: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for AssociationSet {
    type Item = DeploymentTarget;
    type IntoIter = btree_set::IntoIter<DeploymentTarget>;

    fn into_iter(self) -> Self::IntoIter {
        self.servers.into_iter()
    }
}

impl<'a> IntoIterator for &'a AssociationSet {
    type Item = &'a DeploymentTarget;
    type IntoIter = btree_set::Iter<'a, DeploymentTarget>;

    fn into_iter(self) -> Self::IntoIter {
        self.servers.iter()
    }
}

/// Number of candidates found in each category of the topology.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TargetCandidates {
    /// Clusters.
    pub clusters: usize,
    /// Servers with a node agent.
    pub managed_servers: usize,
    /// Stand-alone servers.
    pub unmanaged_servers: usize,
}

impl TargetCandidates {
    /// Builds a candidate summary.
    #[must_use]
    pub const fn new(clusters: usize, managed_servers: usize, unmanaged_servers: usize) -> Self {
        Self {
            clusters,
            managed_servers,
            unmanaged_servers,
        }
    }

    const fn ambiguous(self) -> TopologyError {
        TopologyError::AmbiguousTarget {
            clusters: self.clusters,
            managed_servers: self.managed_servers,
            unmanaged_servers: self.unmanaged_servers,
        }
    }
}

/// Category chosen by [`choose_unique_target`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetCategory {
    /// The single cluster.
    Cluster,
    /// The single managed server.
    ManagedServer,
    /// The single unmanaged server.
    UnmanagedServer,
}

/// Picks the deployment category when the caller named no target.
///
/// Categories are inspected in priority order (clusters, managed servers,
/// unmanaged servers) and the first holding exactly one candidate wins. A
/// category with several candidates is passed over, so two clusters and one
/// managed server still resolve to that server.
///
/// # Errors
///
/// Returns [`TopologyError::AmbiguousTarget`] carrying all three counts when
/// no category has exactly one candidate.
pub fn choose_unique_target(candidates: TargetCandidates) -> Result<TargetCategory, TopologyError> {
    let ordered = [
        (TargetCategory::Cluster, candidates.clusters),
        (TargetCategory::ManagedServer, candidates.managed_servers),
        (TargetCategory::UnmanagedServer, candidates.unmanaged_servers),
    ];
    ordered
        .into_iter()
        .find_map(|(category, count)| (count == 1).then_some(category))
        .ok_or_else(|| candidates.ambiguous())
}

/// Resolves deployment targets by querying the remote topology.
#[derive(Debug)]
pub struct TargetResolver<'a, C: ?Sized> {
    channel: &'a C,
}

impl<'a, C: ManagementChannel + ?Sized> TargetResolver<'a, C> {
    /// Builds a resolver over a channel.
    #[must_use]
    pub const fn new(channel: &'a C) -> Self {
        Self { channel }
    }

    /// Finds the only sensible target when the caller named none.
    ///
    /// # Errors
    ///
    /// Returns a topology error when no category has exactly one candidate,
    /// or a remote error when a query fails.
    pub fn resolve_unique_target(&self) -> Result<DeploymentTarget, LifecycleError> {
        let clusters = self.query(&ObjectQuery::clusters())?;
        let managed = self.query(&ObjectQuery::managed_servers())?;
        let unmanaged = self.query(&ObjectQuery::unmanaged_servers())?;
        let candidates = TargetCandidates::new(clusters.len(), managed.len(), unmanaged.len());

        let (objects, as_target): (&[ManagedObjectId], fn(&ManagedObjectId) -> _) =
            match choose_unique_target(candidates)? {
                TargetCategory::Cluster => (&clusters, DeploymentTarget::from_cluster_object),
                TargetCategory::ManagedServer => (&managed, DeploymentTarget::from_server_object),
                TargetCategory::UnmanagedServer => {
                    (&unmanaged, DeploymentTarget::from_server_object)
                }
            };
        let object = objects.first().ok_or_else(|| candidates.ambiguous())?;
        let target =
            as_target(object).map_err(|source| LifecycleError::malformed(object.to_string(), source))?;

        debug!(
            target: RESOLVER_TARGET,
            deployment_target = %target,
            clusters = candidates.clusters,
            managed_servers = candidates.managed_servers,
            unmanaged_servers = candidates.unmanaged_servers,
            "resolved unique deployment target"
        );
        Ok(target)
    }

    /// Finds the first cluster with the given name.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::ClusterNotFound`] when nothing matches.
    pub fn lookup_cluster(&self, name: &str) -> Result<ManagedObjectId, LifecycleError> {
        self.query(&Self::cluster_query(name)?)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                TopologyError::ClusterNotFound {
                    name: name.to_owned(),
                }
                .into()
            })
    }

    /// Expands a cluster reference into its member servers.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::ClusterCount`] unless exactly one cluster
    /// carries the name, or a remote error when a call fails.
    pub fn expand_cluster(&self, name: &str) -> Result<AssociationSet, LifecycleError> {
        let matches = self.query(&Self::cluster_query(name)?)?;
        let [cluster] = matches.as_slice() else {
            return Err(TopologyError::ClusterCount {
                name: name.to_owned(),
                found: matches.len(),
            }
            .into());
        };

        let members = self
            .channel
            .cluster_members(cluster)
            .map_err(|source| LifecycleError::remote(Operation::ClusterMembers, name, source))?;
        let servers = members
            .iter()
            .map(|member| {
                DeploymentTarget::from_server_object(member)
                    .map_err(|source| LifecycleError::malformed(member.to_string(), source))
            })
            .collect::<Result<AssociationSet, _>>()?;

        debug!(
            target: RESOLVER_TARGET,
            cluster = name,
            members = servers.len(),
            "expanded cluster"
        );
        Ok(servers)
    }

    fn cluster_query(name: &str) -> Result<ObjectQuery, LifecycleError> {
        ObjectQuery::cluster_named(name).map_err(|source| LifecycleError::malformed(name, source))
    }

    fn query(&self, query: &ObjectQuery) -> Result<Vec<ManagedObjectId>, LifecycleError> {
        self.channel
            .query(query)
            .map_err(|source| LifecycleError::remote(Operation::Query, query.to_string(), source))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(TargetCandidates::new(1, 0, 0))]
    #[case(TargetCandidates::new(1, 1, 0))]
    #[case(TargetCandidates::new(1, 4, 2))]
    fn single_cluster_wins_regardless_of_servers(#[case] candidates: TargetCandidates) {
        assert_eq!(
            choose_unique_target(candidates),
            Ok(TargetCategory::Cluster)
        );
    }

    #[rstest]
    #[case(TargetCandidates::new(0, 1, 0), TargetCategory::ManagedServer)]
    #[case(TargetCandidates::new(0, 1, 3), TargetCategory::ManagedServer)]
    #[case(TargetCandidates::new(0, 0, 1), TargetCategory::UnmanagedServer)]
    #[case(TargetCandidates::new(2, 1, 0), TargetCategory::ManagedServer)]
    #[case(TargetCandidates::new(3, 1, 1), TargetCategory::ManagedServer)]
    #[case(TargetCandidates::new(0, 2, 1), TargetCategory::UnmanagedServer)]
    #[case(TargetCandidates::new(2, 2, 1), TargetCategory::UnmanagedServer)]
    fn falls_back_to_servers(#[case] candidates: TargetCandidates, #[case] expected: TargetCategory) {
        assert_eq!(choose_unique_target(candidates), Ok(expected));
    }

    #[rstest]
    #[case(TargetCandidates::new(0, 0, 0))]
    #[case(TargetCandidates::new(2, 0, 0))]
    #[case(TargetCandidates::new(0, 2, 0))]
    #[case(TargetCandidates::new(2, 3, 2))]
    #[case(TargetCandidates::new(0, 0, 3))]
    fn no_single_candidate_anywhere_fails(#[case] candidates: TargetCandidates) {
        assert_eq!(
            choose_unique_target(candidates),
            Err(TopologyError::AmbiguousTarget {
                clusters: candidates.clusters,
                managed_servers: candidates.managed_servers,
                unmanaged_servers: candidates.unmanaged_servers,
            })
        );
    }

    #[rstest]
    fn canonical_forms() {
        assert_eq!(
            DeploymentTarget::cluster("cell01", "blue").canonical(),
            "WebSphere:cell=cell01,cluster=blue"
        );
        assert_eq!(
            DeploymentTarget::server("cell01", "node01", "server1").to_string(),
            "WebSphere:cell=cell01,node=node01,server=server1"
        );
    }

    #[rstest]
    fn mapped_target_distinguishes_clusters() {
        assert_eq!(
            MappedTarget::parse("WebSphere:cell=c1,cluster=blue"),
            Ok(MappedTarget::Cluster(String::from("blue")))
        );
        assert_eq!(
            MappedTarget::parse("WebSphere:cell=c1,node=n1,server=s1"),
            Ok(MappedTarget::Server(DeploymentTarget::server("c1", "n1", "s1")))
        );
        assert!(MappedTarget::parse("WebSphere:cell=c1,node=n1").is_err());
    }
}
