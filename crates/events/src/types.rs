//! Core types for the events crate.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Condition type consumed by the transition detector.
pub const READY_CONDITION: &str = "Ready";

/// Event type emitted when an environment becomes ready.
pub const ENVIRONMENT_CREATED_V1: &str = "cd.environment.created.v1";

/// Event type emitted when an environment is modified.
pub const ENVIRONMENT_MODIFIED_V1: &str = "cd.environment.modified.v1";

/// Identity of an externally managed resource.
///
/// Immutable once constructed. Rendered as `"<namespace>/<name>"`, which is
/// both the registry key and the event source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "IdentityParts")]
pub struct ResourceIdentity {
    namespace: String,
    name: String,
}

#[derive(Deserialize)]
struct IdentityParts {
    namespace: String,
    name: String,
}

impl TryFrom<IdentityParts> for ResourceIdentity {
    type Error = Error;

    fn try_from(parts: IdentityParts) -> Result<Self> {
        Self::new(parts.namespace, parts.name)
    }
}

impl ResourceIdentity {
    /// Create a resource identity.
    ///
    /// # Errors
    ///
    /// Returns `InvalidIdentity` if the namespace or name is empty.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let namespace = namespace.into();
        let name = name.into();

        if namespace.trim().is_empty() {
            return Err(Error::invalid_identity("namespace must not be empty"));
        }
        if name.trim().is_empty() {
            return Err(Error::invalid_identity("name must not be empty"));
        }

        Ok(Self { namespace, name })
    }

    /// Namespace of the resource.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Name of the resource.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registry key and event source: `"<namespace>/<name>"`.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Status of a single condition, following the Kubernetes convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

/// A named status condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: ConditionStatus,
}

impl Condition {
    /// Create a condition.
    pub fn new(condition_type: impl Into<String>, status: ConditionStatus) -> Self {
        Self {
            condition_type: condition_type.into(),
            status,
        }
    }

    /// A `Ready` condition with the given status.
    #[must_use]
    pub fn ready(status: ConditionStatus) -> Self {
        Self::new(READY_CONDITION, status)
    }
}

/// Observed status of a resource, supplied on every reconcile invocation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ObservedStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl ObservedStatus {
    /// Create a status from a set of conditions.
    #[must_use]
    pub const fn new(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }

    /// Status carrying only a `Ready` condition.
    #[must_use]
    pub fn with_ready(status: ConditionStatus) -> Self {
        Self::new(vec![Condition::ready(status)])
    }

    /// True if some `Ready` condition has status `True`.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.conditions
            .iter()
            .any(|c| c.condition_type == READY_CONDITION && c.status == ConditionStatus::True)
    }
}

/// The resource object handed over by the operator runtime.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "ResourceDocument")]
pub struct ManagedResource {
    pub identity: ResourceIdentity,
    pub status: ObservedStatus,
}

impl ManagedResource {
    /// Create a managed resource.
    #[must_use]
    pub const fn new(identity: ResourceIdentity, status: ObservedStatus) -> Self {
        Self { identity, status }
    }
}

/// Kubernetes-shaped document: `metadata` plus `status.conditions`.
#[derive(Deserialize)]
struct ResourceDocument {
    metadata: DocumentMetadata,
    #[serde(default)]
    status: ObservedStatus,
}

#[derive(Deserialize)]
struct DocumentMetadata {
    name: String,
    #[serde(default = "default_namespace")]
    namespace: String,
}

fn default_namespace() -> String {
    "default".to_string()
}

impl TryFrom<ResourceDocument> for ManagedResource {
    type Error = Error;

    fn try_from(doc: ResourceDocument) -> Result<Self> {
        let identity = ResourceIdentity::new(doc.metadata.namespace, doc.metadata.name)?;
        Ok(Self::new(identity, doc.status))
    }
}

/// Lifecycle transitions eligible for notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    /// The resource became ready for the first time.
    Created,
    /// The resource was observed ready again after it was handled.
    Modified,
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Modified => write!(f, "modified"),
        }
    }
}

/// Finite mapping from transition kind to the external event type string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTypeMap {
    types: BTreeMap<TransitionKind, String>,
}

impl EventTypeMap {
    /// An empty table. Every lookup fails until kinds are added.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            types: BTreeMap::new(),
        }
    }

    /// Add or replace the mapping for a kind.
    #[must_use]
    pub fn with(mut self, kind: TransitionKind, event_type: impl Into<String>) -> Self {
        self.types.insert(kind, event_type.into());
        self
    }

    /// Look up the event type for a kind.
    ///
    /// # Errors
    ///
    /// Returns `UnmappedTransition` if the kind is not in the table.
    pub fn event_type(&self, kind: TransitionKind) -> Result<&str> {
        self.types
            .get(&kind)
            .map(String::as_str)
            .ok_or(Error::unmapped_transition(kind))
    }

    /// Number of mapped kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for EventTypeMap {
    fn default() -> Self {
        Self::empty()
            .with(TransitionKind::Created, ENVIRONMENT_CREATED_V1)
            .with(TransitionKind::Modified, ENVIRONMENT_MODIFIED_V1)
    }
}

/// Unique identifier for a domain event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Create a new random event ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}
