//! Project schema: which types exist, which fields and relations they carry.
//!
//! The schema is data, not code. It is queried by type-name strings through
//! [`SchemaProvider`]; [`ProjectSchema`] is the serde-loaded implementation.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Abstract root of all operation types.
pub const OPERATION_TYPE: &str = "Operation";
/// Project document type.
pub const PROJECT_TYPE: &str = "Project";
/// Abstract root of all image types.
pub const IMAGE_TYPE: &str = "Image";

/// Input kind of a configured field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InputType {
    #[default]
    Input,
    Text,
    Int,
    UnsignedInt,
    Float,
    UnsignedFloat,
    Boolean,
    Date,
    Dropdown,
    DropdownRange,
    Radio,
    Checkboxes,
    Dating,
    Dimension,
}

impl InputType {
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            InputType::Int | InputType::UnsignedInt | InputType::Float | InputType::UnsignedFloat
        )
    }
}

/// One configured field of a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub name: String,
    #[serde(default)]
    pub input_type: InputType,
    #[serde(default)]
    pub mandatory: bool,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, input_type: InputType) -> Self {
        Self {
            name: name.into(),
            input_type,
            mandatory: false,
        }
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    /// Name of the companion end-value key of a dropdown range.
    pub fn range_end_name(&self) -> String {
        format!("{}End", self.name)
    }
}

/// A relation declared between domain and range types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inverse: Option<String>,
    pub domain: Vec<String>,
    pub range: Vec<String>,
}

/// One resource type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

/// Schema queries the import core depends on.
pub trait SchemaProvider: Send + Sync {
    /// Field definitions of `type_name` (inherited ones included), `None`
    /// when the type is unknown.
    fn type_fields(&self, type_name: &str) -> Option<Vec<FieldDefinition>>;

    /// Relation definitions whose domain includes `type_name`.
    fn relation_defs(&self, type_name: &str) -> Vec<RelationDefinition>;

    /// Declared inverse of `relation`, if any.
    fn inverse_relation_name(&self, relation: &str) -> Option<String>;

    /// Whether `type_name` is the root of a containment hierarchy.
    fn is_operation_type(&self, type_name: &str) -> bool;

    /// Whether `type_name` is an image type (abstract or concrete).
    fn is_image_type(&self, type_name: &str) -> bool;

    /// Whether `relation` may point from `resource_type` to `target_type`.
    fn is_allowed_relation_domain(
        &self,
        resource_type: &str,
        target_type: &str,
        relation: &str,
    ) -> bool;
}

/// Serde-loaded project configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSchema {
    #[serde(default)]
    pub types: Vec<TypeDefinition>,
    #[serde(default)]
    pub relations: Vec<RelationDefinition>,
}

impl ProjectSchema {
    pub fn new(types: Vec<TypeDefinition>, relations: Vec<RelationDefinition>) -> Self {
        Self { types, relations }
    }

    /// Parse a schema from its JSON representation.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    fn find_type(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.iter().find(|t| t.name == name)
    }

    /// `type_name` followed by its ancestors, nearest first.
    fn lineage(&self, type_name: &str) -> Vec<&TypeDefinition> {
        let mut lineage = Vec::new();
        let mut seen = BTreeSet::new();
        let mut current = self.find_type(type_name);
        while let Some(def) = current {
            if !seen.insert(def.name.as_str()) {
                break;
            }
            lineage.push(def);
            current = def.parent.as_deref().and_then(|p| self.find_type(p));
        }
        lineage
    }

    /// Whether `type_name` is `ancestor` or descends from it.
    fn is_a(&self, type_name: &str, ancestor: &str) -> bool {
        type_name == ancestor || self.lineage(type_name).iter().any(|t| t.name == ancestor)
    }

    fn matches_any(&self, type_name: &str, names: &[String]) -> bool {
        names.iter().any(|n| self.is_a(type_name, n))
    }
}

impl SchemaProvider for ProjectSchema {
    fn type_fields(&self, type_name: &str) -> Option<Vec<FieldDefinition>> {
        let lineage = self.lineage(type_name);
        if lineage.is_empty() {
            return None;
        }
        // Nearest definition wins when a child redeclares a parent field.
        let mut fields: BTreeMap<&str, &FieldDefinition> = BTreeMap::new();
        for def in lineage.iter().rev() {
            for field in &def.fields {
                fields.insert(field.name.as_str(), field);
            }
        }
        Some(fields.into_values().cloned().collect())
    }

    fn relation_defs(&self, type_name: &str) -> Vec<RelationDefinition> {
        self.relations
            .iter()
            .filter(|r| self.matches_any(type_name, &r.domain))
            .cloned()
            .collect()
    }

    fn inverse_relation_name(&self, relation: &str) -> Option<String> {
        self.relations
            .iter()
            .find(|r| r.name == relation && r.inverse.is_some())
            .and_then(|r| r.inverse.clone())
    }

    fn is_operation_type(&self, type_name: &str) -> bool {
        type_name != OPERATION_TYPE && self.is_a(type_name, OPERATION_TYPE)
    }

    fn is_image_type(&self, type_name: &str) -> bool {
        self.is_a(type_name, IMAGE_TYPE)
    }

    fn is_allowed_relation_domain(
        &self,
        resource_type: &str,
        target_type: &str,
        relation: &str,
    ) -> bool {
        self.relations.iter().any(|r| {
            r.name == relation
                && self.matches_any(resource_type, &r.domain)
                && self.matches_any(target_type, &r.range)
        })
    }
}
