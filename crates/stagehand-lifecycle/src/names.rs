//! Managed-object names and property-pattern queries.
//!
//! Remote entities are addressed by a domain plus a set of key properties,
//! written as `Domain:key=value,key=value`. Properties are stored sorted so two
//! names that list the same keys in a different order compare equal.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Management domain used by every name the orchestrator builds.
pub const MANAGEMENT_DOMAIN: &str = "WebSphere";

/// Characters that change the meaning of a property pattern.
const RESERVED: [char; 6] = [',', '=', ':', '*', '?', '"'];

/// Identifier of a remote managed entity (server, cluster, application, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ManagedObjectId {
    domain: String,
    properties: BTreeMap<String, String>,
}

impl ManagedObjectId {
    /// Builds an identifier from a domain and key properties.
    #[must_use]
    pub fn new<K, V>(domain: impl Into<String>, properties: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            domain: domain.into(),
            properties: properties
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    /// Domain part of the name.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.domain.as_str()
    }

    /// Looks up a single key property.
    #[must_use]
    pub fn key_property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Iterates over the key properties in canonical (sorted) order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Looks up a key property that must be present.
    ///
    /// # Errors
    ///
    /// Returns [`NameParseError::MissingKey`] when the key is absent.
    pub fn require(&self, key: &str) -> Result<&str, NameParseError> {
        self.key_property(key)
            .ok_or_else(|| NameParseError::MissingKey {
                name: self.to_string(),
                key: key.to_owned(),
            })
    }
}

impl fmt::Display for ManagedObjectId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:", self.domain)?;
        write_properties(formatter, &self.properties)
    }
}

impl FromStr for ManagedObjectId {
    type Err = NameParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let (domain, rest) = trimmed
            .split_once(':')
            .ok_or_else(|| NameParseError::MissingDomainSeparator(trimmed.to_owned()))?;
        if domain.is_empty() {
            return Err(NameParseError::EmptyDomain(trimmed.to_owned()));
        }

        let mut properties = BTreeMap::new();
        for pair in rest.split(',') {
            let (raw_key, value) = pair
                .split_once('=')
                .ok_or_else(|| NameParseError::MalformedProperty(pair.to_owned()))?;
            let key = raw_key.trim();
            if key.is_empty() {
                return Err(NameParseError::MalformedProperty(pair.to_owned()));
            }
            if properties
                .insert(key.to_owned(), value.trim().to_owned())
                .is_some()
            {
                return Err(NameParseError::DuplicateKey(key.to_owned()));
            }
        }

        Ok(Self {
            domain: domain.to_owned(),
            properties,
        })
    }
}

/// Property-pattern query matching every object that carries the listed keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectQuery {
    domain: String,
    properties: BTreeMap<String, String>,
}

impl ObjectQuery {
    /// Builds a query in the management domain.
    #[must_use]
    pub fn new<K, V>(properties: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            domain: MANAGEMENT_DOMAIN.to_owned(),
            properties: properties
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    /// All clusters known to the cell.
    #[must_use]
    pub fn clusters() -> Self {
        Self::new([("type", "Cluster")])
    }

    /// The cluster with the given name.
    ///
    /// # Errors
    ///
    /// Returns [`NameParseError::ReservedCharacter`] when `name` would alter
    /// the pattern.
    pub fn cluster_named(name: &str) -> Result<Self, NameParseError> {
        Ok(Self::new([("type", "Cluster"), ("name", pattern_value(name)?)]))
    }

    /// Servers managed by a node agent.
    #[must_use]
    pub fn managed_servers() -> Self {
        Self::new([("type", "Server"), ("processType", "ManagedProcess")])
    }

    /// Stand-alone servers without a node agent.
    #[must_use]
    pub fn unmanaged_servers() -> Self {
        Self::new([("type", "Server"), ("processType", "UnManagedProcess")])
    }

    /// Running instances of an application, one per server it runs on.
    ///
    /// # Errors
    ///
    /// Returns [`NameParseError::ReservedCharacter`] when `app_name` would
    /// alter the pattern.
    pub fn running_application(app_name: &str) -> Result<Self, NameParseError> {
        Ok(Self::new([
            ("type", "Application"),
            ("name", pattern_value(app_name)?),
        ]))
    }

    /// The object that emits application-management notifications.
    #[must_use]
    pub fn app_management() -> Self {
        Self::new([("type", "AppManagement")])
    }

    /// Domain the query is restricted to.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.domain.as_str()
    }

    /// Whether `object` satisfies every property in the pattern.
    #[must_use]
    pub fn matches(&self, object: &ManagedObjectId) -> bool {
        object.domain() == self.domain
            && self
                .properties
                .iter()
                .all(|(key, value)| object.key_property(key) == Some(value.as_str()))
    }
}

impl fmt::Display for ObjectQuery {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:", self.domain)?;
        write_properties(formatter, &self.properties)?;
        if self.properties.is_empty() {
            formatter.write_str("*")
        } else {
            formatter.write_str(",*")
        }
    }
}

fn pattern_value(value: &str) -> Result<&str, NameParseError> {
    value
        .chars()
        .find(|candidate| RESERVED.contains(candidate))
        .map_or(Ok(value), |character| {
            Err(NameParseError::ReservedCharacter {
                value: value.to_owned(),
                character,
            })
        })
}

fn write_properties(
    formatter: &mut fmt::Formatter<'_>,
    properties: &BTreeMap<String, String>,
) -> fmt::Result {
    for (index, (key, value)) in properties.iter().enumerate() {
        if index > 0 {
            formatter.write_str(",")?;
        }
        write!(formatter, "{key}={value}")?;
    }
    Ok(())
}

/// Errors raised while parsing or inspecting managed-object names.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NameParseError {
    /// The text had no `domain:` prefix.
    #[error("managed object name '{0}' has no domain separator")]
    MissingDomainSeparator(String),
    /// The domain before `:` was empty.
    #[error("managed object name '{0}' has an empty domain")]
    EmptyDomain(String),
    /// A property was not of the form `key=value`.
    #[error("malformed key property '{0}'")]
    MalformedProperty(String),
    /// The same key appeared twice.
    #[error("duplicate key property '{0}'")]
    DuplicateKey(String),
    /// A value spliced into a pattern contained a reserved character.
    #[error("'{value}' contains '{character}', which is reserved in object name patterns")]
    ReservedCharacter {
        /// Value that was rejected.
        value: String,
        /// First reserved character found.
        character: char,
    },
    /// A key required by the caller was absent.
    #[error("managed object '{name}' has no '{key}' key property")]
    MissingKey {
        /// Rendered name that was inspected.
        name: String,
        /// Key that was expected.
        key: String,
    },
}
