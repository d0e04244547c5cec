//! Conversion of parsed records into candidate documents.
//!
//! Accepts either a document (`{ "id"?, "resource": {...} }`) or a bare
//! resource object. Structural relation checks happen here because the
//! typed [`Relations`] map cannot represent malformed values.

use serde_json::{Map, Value};
use stratum_store::{relation, Document, Relations, Resource, ResourceFields};

use crate::error::{ImportError, Result};
use crate::options::ImportOptions;

/// Relations the import computes itself.
const FORBIDDEN_RELATIONS: [&str; 3] = [relation::RECORDED_IN, relation::LIES_WITHIN, relation::INCLUDES];

/// Turn one parsed record into a candidate document.
///
/// With relation overwrite enabled, `null` field and relation values are
/// kept as deletion markers (`Value::Null` fields, empty relation lists).
/// Otherwise `null` fields are dropped.
pub fn preprocess(raw: Value, options: &ImportOptions) -> Result<Document> {
    let Value::Object(mut outer) = raw else {
        return Err(ImportError::MalformedDocument(
            "record is not an object".to_string(),
        ));
    };

    let (document_id, mut map) = match outer.remove("resource") {
        Some(Value::Object(resource)) => (take_string(&mut outer, "id"), resource),
        Some(_) => {
            return Err(ImportError::MalformedDocument(
                "resource is not an object".to_string(),
            ))
        }
        None => (None, outer),
    };

    let resource_type = match map.remove("type") {
        Some(Value::String(t)) if !t.is_empty() => t,
        _ => {
            return Err(ImportError::MalformedDocument(
                "resource has no type".to_string(),
            ))
        }
    };
    let identifier = match map.remove("identifier") {
        Some(Value::String(i)) if !i.is_empty() => i,
        _ => {
            return Err(ImportError::MissingProperty {
                resource_type,
                fields: vec!["identifier".to_string()],
            })
        }
    };
    let id = take_string(&mut map, "id").or(document_id);

    let relations = match map.remove("relations") {
        None | Some(Value::Null) => Relations::new(),
        Some(Value::Object(raw_relations)) => read_relations(&identifier, raw_relations, options)?,
        Some(_) => {
            return Err(ImportError::MalformedDocument(format!(
                "relations of {identifier} are not an object"
            )))
        }
    };

    let fields = read_fields(&identifier, map, options)?;

    let mut resource = Resource::new(identifier, resource_type);
    resource.relations = relations;
    resource.fields = fields;

    let document = Document::new(resource);
    Ok(match id {
        Some(id) => document.with_id(id),
        None => document,
    })
}

/// Identifier of a raw record, read without converting it.
pub fn raw_identifier(raw: &Value) -> Option<&str> {
    let resource = raw.get("resource").filter(|r| r.is_object()).unwrap_or(raw);
    resource
        .get("identifier")
        .and_then(Value::as_str)
        .filter(|identifier| !identifier.is_empty())
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    }
}

fn read_fields(
    identifier: &str,
    map: Map<String, Value>,
    options: &ImportOptions,
) -> Result<ResourceFields> {
    let mut fields = ResourceFields::new();
    for (name, value) in map {
        match value {
            Value::Null if options.may_overwrite_relations() => {
                fields.insert(name, Value::Null);
            }
            Value::Null => {}
            Value::String(ref s) if s.is_empty() => {
                return Err(ImportError::MustNotBeEmptyString {
                    identifier: identifier.to_string(),
                    field: name,
                })
            }
            value => {
                fields.insert(name, value);
            }
        }
    }
    Ok(fields)
}

fn read_relations(
    identifier: &str,
    raw: Map<String, Value>,
    options: &ImportOptions,
) -> Result<Relations> {
    let overwrite = options.may_overwrite_relations();
    let mut relations = Relations::new();
    let mut parent: Option<Vec<String>> = None;

    for (name, value) in raw {
        if FORBIDDEN_RELATIONS.contains(&name.as_str()) && !overwrite {
            return Err(ImportError::ForbiddenRelation {
                identifier: identifier.to_string(),
                relation: name,
            });
        }

        if name == relation::PARENT {
            parent = Some(match value {
                Value::String(target) if !target.is_empty() => vec![target],
                Value::Null if overwrite => Vec::new(),
                _ => return Err(ImportError::ParentMustNotBeArray(identifier.to_string())),
            });
            continue;
        }

        let targets = match value {
            Value::Null if overwrite => Vec::new(),
            Value::Array(items) => {
                if name == relation::LIES_WITHIN && items.iter().any(Value::is_array) {
                    return Err(ImportError::ParentMustNotBeArray(identifier.to_string()));
                }
                if items.is_empty() {
                    return Err(ImportError::EmptyRelation(identifier.to_string()));
                }
                read_targets(identifier, items)?
            }
            _ => return Err(ImportError::MustBeArray(identifier.to_string())),
        };
        relations.set(name, targets);
    }

    if let Some(parent) = parent {
        relations.set(relation::LIES_WITHIN, parent);
    }
    Ok(relations)
}

fn read_targets(identifier: &str, items: Vec<Value>) -> Result<Vec<String>> {
    items
        .into_iter()
        .map(|item| match item {
            Value::String(target) if !target.is_empty() => Ok(target),
            _ => Err(ImportError::MustBeArray(identifier.to_string())),
        })
        .collect()
}
