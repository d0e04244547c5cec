//! Persisted document shape
//!
//! A `Document` wraps a `Resource`. A document without an `id` is a
//! candidate that has not been written yet.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-form, type-specific resource fields
pub type ResourceFields = serde_json::Map<String, Value>;

/// Structural relation names
pub mod relation {
    /// Resource → owning operation
    pub const RECORDED_IN: &str = "recordedIn";
    /// Resource → direct containment parent
    pub const LIES_WITHIN: &str = "liesWithin";
    /// Synthetic inverse of the containment hierarchy
    pub const INCLUDES: &str = "includes";
    /// Legacy singular alias of `liesWithin`, accepted on input only
    pub const PARENT: &str = "parent";

    /// Relations that are computed by the import core rather than authored.
    pub const HIERARCHY: [&str; 2] = [RECORDED_IN, LIES_WITHIN];

    /// Whether `name` is one of the hierarchy relations.
    pub fn is_hierarchy(name: &str) -> bool {
        HIERARCHY.contains(&name)
    }
}

/// Relation name → ordered list of target ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Relations(BTreeMap<String, Vec<String>>);

impl Relations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Targets of `name`, empty when the relation is absent.
    pub fn targets(&self, name: &str) -> &[String] {
        self.0.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First target of `name`.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.targets(name).first().map(String::as_str)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Vec<String>> {
        self.0.get(name)
    }

    /// Replace the whole target list of `name`.
    pub fn set(&mut self, name: impl Into<String>, targets: Vec<String>) {
        self.0.insert(name.into(), targets);
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.0.remove(name)
    }

    /// Append `target` to `name` unless already present.
    ///
    /// Returns `true` when the list changed.
    pub fn insert_target(&mut self, name: &str, target: &str) -> bool {
        let targets = self.0.entry(name.to_string()).or_default();
        if targets.iter().any(|t| t == target) {
            return false;
        }
        targets.push(target.to_string());
        true
    }

    /// Remove `target` from `name`, dropping the relation once it is empty.
    ///
    /// Returns `true` when the list changed.
    pub fn remove_target(&mut self, name: &str, target: &str) -> bool {
        let Some(targets) = self.0.get_mut(name) else {
            return false;
        };
        let before = targets.len();
        targets.retain(|t| t != target);
        let changed = targets.len() != before;
        if targets.is_empty() {
            self.0.remove(name);
        }
        changed
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Every target id across all relations, deduplicated.
    pub fn all_targets(&self) -> BTreeSet<&str> {
        self.0
            .values()
            .flat_map(|targets| targets.iter().map(String::as_str))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Vec<String>)> for Relations {
    fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
        Relations(iter.into_iter().collect())
    }
}

/// A record's content: identifier, type, relations and type-specific fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub identifier: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub relations: Relations,
    #[serde(flatten)]
    pub fields: ResourceFields,
}

impl Resource {
    pub fn new(identifier: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            id: None,
            identifier: identifier.into(),
            resource_type: resource_type.into(),
            relations: Relations::new(),
            fields: ResourceFields::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Builder-style relation setter.
    pub fn with_relation(mut self, name: impl Into<String>, targets: Vec<String>) -> Self {
        self.relations.set(name, targets);
        self
    }

    /// The operation this resource is recorded in, if any.
    pub fn recorded_in(&self) -> Option<&str> {
        self.relations.first(relation::RECORDED_IN)
    }

    /// The direct containment parent, if any.
    pub fn lies_within(&self) -> Option<&str> {
        self.relations.first(relation::LIES_WITHIN)
    }
}

/// Who touched a document and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub user: String,
    pub date: DateTime<Utc>,
}

impl Action {
    pub fn now(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            date: Utc::now(),
        }
    }
}

/// A stored (or candidate) record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub resource: Resource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<Action>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modified: Vec<Action>,
}

impl Document {
    /// Wrap a resource as a candidate document.
    pub fn new(resource: Resource) -> Self {
        Self {
            id: resource.id.clone(),
            resource,
            created: None,
            modified: Vec::new(),
        }
    }

    /// Set both the document id and the resource id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        self.resource.id = Some(id.clone());
        self.id = Some(id);
        self
    }

    /// The document id, or an empty string for candidates.
    pub fn id_str(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    pub fn identifier(&self) -> &str {
        &self.resource.identifier
    }

    pub fn resource_type(&self) -> &str {
        &self.resource.resource_type
    }
}
