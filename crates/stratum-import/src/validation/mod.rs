//! Stateless checks of a single candidate against the project schema.
//!
//! Checks (in order):
//! 1. The type is known and importable.
//! 2. Every field and relation is configured for the type.
//! 3. Dropdown ranges with an end value also carry a start value.
//! 4. Mandatory fields are present (create mode; merge mode checks the
//!    merged document instead).
//! 5. Numeric, dating and dimension values are well-formed.
//! 6. The geometry, if any, is structurally valid.
//!
//! The first violation is returned.

pub mod geometry;
pub mod values;

use serde_json::Value;
use stratum_store::{relation, Document, Resource};

use crate::error::{ImportError, Result};
use crate::options::ImportOptions;
use crate::schema::{FieldDefinition, InputType, SchemaProvider, IMAGE_TYPE, OPERATION_TYPE, PROJECT_TYPE};

/// Field holding the resource geometry; never declared in the schema.
pub const GEOMETRY_FIELD: &str = "geometry";

/// Validator bound to one schema.
pub struct Validator<'a, P: SchemaProvider + ?Sized> {
    schema: &'a P,
}

impl<'a, P: SchemaProvider + ?Sized> Validator<'a, P> {
    pub fn new(schema: &'a P) -> Self {
        Self { schema }
    }

    /// Run every per-document check and hand the document back.
    pub fn validate(&self, document: Document, options: &ImportOptions) -> Result<Document> {
        let resource = &document.resource;
        let fields = self.assert_type_importable(resource, options)?;
        self.assert_fields_defined(resource, &fields)?;
        self.assert_relations_defined(resource)?;
        assert_dropdown_ranges_complete(resource, &fields)?;
        if !options.merge_mode {
            assert_mandatory_fields(resource, &fields)?;
        }
        assert_values_well_formed(resource, &fields)?;
        if let Some(geometry) = resource.fields.get(GEOMETRY_FIELD).filter(|g| !g.is_null()) {
            geometry::validate_geometry(&resource.identifier, geometry)?;
        }
        Ok(document)
    }

    /// Mandatory-field check for documents produced by a merge.
    pub fn validate_merged(&self, document: &Document) -> Result<()> {
        let resource = &document.resource;
        let fields = self
            .schema
            .type_fields(&resource.resource_type)
            .ok_or_else(|| ImportError::UnknownType(resource.resource_type.clone()))?;
        assert_mandatory_fields(resource, &fields)
    }

    fn assert_type_importable(
        &self,
        resource: &Resource,
        options: &ImportOptions,
    ) -> Result<Vec<FieldDefinition>> {
        let type_name = resource.resource_type.as_str();
        let fields = self
            .schema
            .type_fields(type_name)
            .ok_or_else(|| ImportError::UnknownType(type_name.to_string()))?;

        if [OPERATION_TYPE, PROJECT_TYPE, IMAGE_TYPE].contains(&type_name) {
            return Err(ImportError::TypeNotAllowed(type_name.to_string()));
        }
        // Images can only have their metadata updated.
        if self.schema.is_image_type(type_name) && !options.merge_mode {
            return Err(ImportError::TypeNotAllowed(type_name.to_string()));
        }
        if options.operation_id.is_some() && self.schema.is_operation_type(type_name) {
            return Err(ImportError::OperationsNotAllowed(
                resource.identifier.clone(),
            ));
        }
        Ok(fields)
    }

    fn assert_fields_defined(&self, resource: &Resource, fields: &[FieldDefinition]) -> Result<()> {
        let undefined: Vec<String> = resource
            .fields
            .keys()
            .filter(|name| name.as_str() != GEOMETRY_FIELD)
            .filter(|name| !field_configured(fields, name))
            .cloned()
            .collect();

        if undefined.is_empty() {
            Ok(())
        } else {
            Err(ImportError::InvalidFields {
                resource_type: resource.resource_type.clone(),
                fields: undefined,
            })
        }
    }

    fn assert_relations_defined(&self, resource: &Resource) -> Result<()> {
        let defs = self.schema.relation_defs(&resource.resource_type);
        let undefined: Vec<String> = resource
            .relations
            .names()
            .filter(|name| name.as_str() != relation::RECORDED_IN)
            .filter(|name| !defs.iter().any(|d| &d.name == *name))
            .cloned()
            .collect();

        if undefined.is_empty() {
            Ok(())
        } else {
            Err(ImportError::InvalidRelations {
                resource_type: resource.resource_type.clone(),
                relations: undefined,
            })
        }
    }
}

fn field_configured(fields: &[FieldDefinition], name: &str) -> bool {
    fields.iter().any(|f| {
        f.name == name || (f.input_type == InputType::DropdownRange && f.range_end_name() == name)
    })
}

fn has_value(resource: &Resource, name: &str) -> bool {
    resource.fields.get(name).is_some_and(|v| !v.is_null())
}

fn assert_dropdown_ranges_complete(resource: &Resource, fields: &[FieldDefinition]) -> Result<()> {
    for field in fields
        .iter()
        .filter(|f| f.input_type == InputType::DropdownRange)
    {
        if has_value(resource, &field.range_end_name()) && !has_value(resource, &field.name) {
            return Err(ImportError::IncompleteDropdownRange {
                resource_type: resource.resource_type.clone(),
                field: field.name.clone(),
            });
        }
    }
    Ok(())
}

fn assert_mandatory_fields(resource: &Resource, fields: &[FieldDefinition]) -> Result<()> {
    let missing: Vec<String> = fields
        .iter()
        .filter(|f| f.mandatory && !has_value(resource, &f.name))
        .map(|f| f.name.clone())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ImportError::MissingProperty {
            resource_type: resource.resource_type.clone(),
            fields: missing,
        })
    }
}

/// Names of present fields of the given input kinds failing `valid`.
fn invalid_fields(
    resource: &Resource,
    fields: &[FieldDefinition],
    kinds: impl Fn(InputType) -> bool,
    valid: impl Fn(InputType, &Value) -> bool,
) -> Vec<String> {
    fields
        .iter()
        .filter(|f| kinds(f.input_type))
        .filter_map(|f| {
            let value = resource.fields.get(&f.name).filter(|v| !v.is_null())?;
            (!valid(f.input_type, value)).then(|| f.name.clone())
        })
        .collect()
}

fn assert_values_well_formed(resource: &Resource, fields: &[FieldDefinition]) -> Result<()> {
    let resource_type = || resource.resource_type.clone();

    let numeric = invalid_fields(resource, fields, |k| k.is_numeric(), values::is_valid_number);
    if !numeric.is_empty() {
        return Err(ImportError::InvalidNumericValues {
            resource_type: resource_type(),
            fields: numeric,
        });
    }

    let dating = invalid_fields(
        resource,
        fields,
        |k| k == InputType::Dating,
        |_, v| values::is_valid_dating_list(v),
    );
    if !dating.is_empty() {
        return Err(ImportError::InvalidDatingValues {
            resource_type: resource_type(),
            fields: dating,
        });
    }

    let dimension = invalid_fields(
        resource,
        fields,
        |k| k == InputType::Dimension,
        |_, v| values::is_valid_dimension_list(v),
    );
    if !dimension.is_empty() {
        return Err(ImportError::InvalidDimensionValues {
            resource_type: resource_type(),
            fields: dimension,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::schema::{ProjectSchema, RelationDefinition, TypeDefinition};
    use serde_json::json;

    fn schema() -> ProjectSchema {
        let find_fields = vec![
            FieldDefinition::new("shortDescription", InputType::Input),
            FieldDefinition::new("amount", InputType::UnsignedInt),
            FieldDefinition::new("weight", InputType::UnsignedFloat),
            FieldDefinition::new("dating", InputType::Dating),
            FieldDefinition::new("dimensionLength", InputType::Dimension),
            FieldDefinition::new("period", InputType::DropdownRange),
            FieldDefinition::new("material", InputType::Input).mandatory(),
        ];
        ProjectSchema::new(
            vec![
                TypeDefinition {
                    name: "Operation".to_string(),
                    parent: None,
                    fields: vec![],
                },
                TypeDefinition {
                    name: "Trench".to_string(),
                    parent: Some("Operation".to_string()),
                    fields: vec![],
                },
                TypeDefinition {
                    name: "Find".to_string(),
                    parent: None,
                    fields: find_fields,
                },
                TypeDefinition {
                    name: "Image".to_string(),
                    parent: None,
                    fields: vec![],
                },
                TypeDefinition {
                    name: "Photo".to_string(),
                    parent: Some("Image".to_string()),
                    fields: vec![],
                },
            ],
            vec![RelationDefinition {
                name: "liesWithin".to_string(),
                inverse: None,
                domain: vec!["Find".to_string()],
                range: vec!["Trench".to_string()],
            }],
        )
    }

    fn find(extra: serde_json::Value) -> Document {
        let mut resource = Resource::new("find1", "Find").with_field("material", json!("bone"));
        if let Some(map) = extra.as_object() {
            for (k, v) in map {
                resource.fields.insert(k.clone(), v.clone());
            }
        }
        Document::new(resource)
    }

    fn kind_of(result: Result<Document>) -> ErrorKind {
        result.unwrap_err().kind()
    }

    #[test]
    fn valid_find_passes() {
        let s = schema();
        let doc = find(json!({
            "amount": 3,
            "weight": 1.5,
            "period": "Iron Age",
            "periodEnd": "Roman",
            "geometry": {"type": "Point", "coordinates": [1, 2]}
        }));
        assert!(Validator::new(&s).validate(doc, &ImportOptions::new()).is_ok());
    }

    #[test]
    fn unknown_and_disallowed_types() {
        let s = schema();
        let v = Validator::new(&s);
        let opts = ImportOptions::new();

        let unknown = Document::new(Resource::new("x", "Spaceship"));
        assert_eq!(kind_of(v.validate(unknown, &opts)), ErrorKind::UnknownType);

        let abstract_op = Document::new(Resource::new("x", "Operation"));
        assert_eq!(kind_of(v.validate(abstract_op, &opts)), ErrorKind::TypeNotAllowed);

        let photo = Document::new(Resource::new("p", "Photo"));
        assert_eq!(kind_of(v.validate(photo.clone(), &opts)), ErrorKind::TypeNotAllowed);
        assert!(v.validate(photo, &ImportOptions::new().merge()).is_ok());
    }

    #[test]
    fn operations_rejected_when_importing_into_operation() {
        let s = schema();
        let trench = Document::new(Resource::new("t1", "Trench"));
        let err = Validator::new(&s)
            .validate(trench, &ImportOptions::new().into_operation("op-1"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OperationsNotAllowed);
    }

    #[test]
    fn unconfigured_fields_are_joined() {
        let s = schema();
        let err = Validator::new(&s)
            .validate(find(json!({"color": "red", "smell": "bad"})), &ImportOptions::new())
            .unwrap_err();
        assert_eq!(err.params(), vec!["Find", "color, smell"]);
    }

    #[test]
    fn unconfigured_relation_but_recorded_in_exempt() {
        let s = schema();
        let v = Validator::new(&s);
        let mut doc = find(json!({}));
        doc.resource.relations.set("recordedIn", vec!["op".to_string()]);
        assert!(v.validate(doc.clone(), &ImportOptions::new()).is_ok());

        doc.resource.relations.set("isAfter", vec!["x".to_string()]);
        let err = v.validate(doc, &ImportOptions::new()).unwrap_err();
        assert_eq!(err.params(), vec!["Find", "isAfter"]);
    }

    #[test]
    fn dropdown_range_end_without_start() {
        let s = schema();
        let err = Validator::new(&s)
            .validate(find(json!({"periodEnd": "Roman"})), &ImportOptions::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IncompleteDropdownRange);
        assert_eq!(err.params(), vec!["Find", "period"]);
    }

    #[test]
    fn mandatory_checked_only_outside_merge() {
        let s = schema();
        let v = Validator::new(&s);
        let doc = Document::new(Resource::new("find1", "Find"));
        assert_eq!(
            kind_of(v.validate(doc.clone(), &ImportOptions::new())),
            ErrorKind::MissingProperty
        );
        assert!(v.validate(doc.clone(), &ImportOptions::new().merge()).is_ok());
        assert!(v.validate_merged(&doc).is_err());
    }

    #[test]
    fn invalid_values() {
        let s = schema();
        let v = Validator::new(&s);
        let opts = ImportOptions::new();
        assert_eq!(
            kind_of(v.validate(find(json!({"amount": -2})), &opts)),
            ErrorKind::InvalidNumericValues
        );
        assert_eq!(
            kind_of(v.validate(find(json!({"dating": [{"type": "exact"}]})), &opts)),
            ErrorKind::InvalidDatingValues
        );
        assert_eq!(
            kind_of(v.validate(find(json!({"dimensionLength": [{"inputValue": 1}]})), &opts)),
            ErrorKind::InvalidDimensionValues
        );
    }

    #[test]
    fn unsupported_geometry() {
        let s = schema();
        let err = Validator::new(&s)
            .validate(
                find(json!({"geometry": {"type": "UnsupportedGeometryType", "coordinates": [1, 2]}})),
                &ImportOptions::new(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedGeometryType);
    }
}
