//! Collection schema definitions used to bootstrap new collections.
//!
//! A definition can be built in code or read from YAML:
//!
//! ```yaml
//! name: products
//! fields:
//!   - name: embedding
//!     type: 101
//!     elements:
//!       - name: IVFFLAT
//!         type: 2
//! ```

use std::collections::HashSet;

use serde::Deserialize;

use crate::error::{CatalogError, Result};

/// Name of the element every field gets implicitly.
pub const RAW_ELEMENT_NAME: &str = "RAW";

/// Element type of the implicit raw element.
pub const RAW_ELEMENT_TYPE: i32 = 1;

/// Name of the partition every new collection starts with.
pub const DEFAULT_PARTITION_NAME: &str = "_default";

/// Definition of a new collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

/// Definition of one field and its extra elements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: i32,
    #[serde(default)]
    pub elements: Vec<FieldElementSchema>,
}

/// Definition of one field element besides the implicit raw element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FieldElementSchema {
    pub name: String,
    #[serde(rename = "type", default)]
    pub element_type: i32,
}

impl CollectionSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let schema: CollectionSchema = serde_yaml::from_str(yaml)?;
        schema.validate()?;
        Ok(schema)
    }

    /// Reject empty names, duplicate field names and duplicate or reserved element names.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CatalogError::InvalidSchema(
                "collection name is empty".to_string(),
            ));
        }
        let mut field_names = HashSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(CatalogError::InvalidSchema(format!(
                    "collection {} has a field with an empty name",
                    self.name
                )));
            }
            if !field_names.insert(field.name.as_str()) {
                return Err(CatalogError::InvalidSchema(format!(
                    "duplicate field {}",
                    field.name
                )));
            }
            let mut element_names = HashSet::new();
            for element in &field.elements {
                if element.name == RAW_ELEMENT_NAME {
                    return Err(CatalogError::InvalidSchema(format!(
                        "field {} declares reserved element {}",
                        field.name, RAW_ELEMENT_NAME
                    )));
                }
                if !element_names.insert(element.name.as_str()) {
                    return Err(CatalogError::InvalidSchema(format!(
                        "field {} declares element {} twice",
                        field.name, element.name
                    )));
                }
            }
        }
        Ok(())
    }
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, field_type: i32) -> Self {
        Self {
            name: name.into(),
            field_type,
            elements: Vec::new(),
        }
    }

    pub fn with_element(mut self, name: impl Into<String>, element_type: i32) -> Self {
        self.elements.push(FieldElementSchema {
            name: name.into(),
            element_type,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
name: products
fields:
  - name: embedding
    type: 101
    elements:
      - name: IVFFLAT
        type: 2
  - name: price
"#;
        let schema = CollectionSchema::from_yaml(yaml).unwrap();
        assert_eq!(schema.name, "products");
        assert_eq!(schema.fields.len(), 2);
        assert_eq!(schema.fields[0].field_type, 101);
        assert_eq!(schema.fields[0].elements[0].name, "IVFFLAT");
        assert!(schema.fields[1].elements.is_empty());
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let err = CollectionSchema::new("  ").validate().unwrap_err();
        assert!(matches!(err, CatalogError::InvalidSchema(_)));
    }

    #[test]
    fn test_validate_rejects_duplicate_fields() {
        let schema = CollectionSchema::new("c")
            .with_field(FieldSchema::new("f", 1))
            .with_field(FieldSchema::new("f", 2));
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_reserved_element() {
        let schema = CollectionSchema::new("c")
            .with_field(FieldSchema::new("f", 1).with_element(RAW_ELEMENT_NAME, 3));
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_elements() {
        let schema = CollectionSchema::new("c").with_field(
            FieldSchema::new("f", 1)
                .with_element("IDX", 2)
                .with_element("IDX", 2),
        );
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_malformed_yaml_is_a_decode_error() {
        let err = CollectionSchema::from_yaml("name: [").unwrap_err();
        assert!(matches!(err, CatalogError::SchemaDecode(_)));
    }
}
