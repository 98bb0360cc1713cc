//! The template document: the schema+value tree describing one edit form.
//!
//! A document is three levels of grouping: super blocks own blocks, blocks
//! own fields. Depth beyond that comes from dotted schema paths, not from
//! nesting. Byte-level JSON belongs to the caller; this module checks an
//! in-memory [`serde_json::Value`] into the typed model and back.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Render hint that marks a field as not user-editable. A readonly field
/// with a default participates in strict matching.
pub const RENDER_READONLY: &str = "readonly";

/// Errors raised while checking a JSON value into a template document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("{at}: expected an object")]
    NotAnObject { at: String },

    #[error("{at}: expected an array for `{field}`")]
    NotAnArray { at: String, field: String },

    #[error("{at}: missing field `{field}`")]
    MissingField { at: String, field: String },

    #[error("{at}: field `{field}` must be a {expected}")]
    InvalidField {
        at: String,
        field: String,
        expected: &'static str,
    },
}

/// One metadata edit form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDocument {
    #[serde(default)]
    pub super_blocks: Vec<SuperBlock>,
}

/// Top-level schema group of a form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperBlock {
    pub name: String,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

/// One schema group: a positioned instance of a path within the form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Dot-separated schema path, possibly numerated or appendable.
    pub path: String,
    /// Identity of the group; defaults to the last path segment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_name: Option<String>,
    /// Declared runtime-type hint.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    /// Whether matching this group requires a full recursive predicate match.
    #[serde(default)]
    pub strict: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplicity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render: Option<String>,
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Block {
    /// The group identity used to disambiguate siblings sharing one path.
    pub fn block_name(&self) -> String {
        self.block_name
            .clone()
            .unwrap_or_else(|| crate::path::leaf_name(&self.path))
    }
}

/// One leaf of the form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(default)]
    pub strict: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplicity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub predefined_values: Vec<String>,
    /// Completion tier this field contributes to: `elementary`, `extended`
    /// or `complete`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Field {
    pub fn field_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| crate::path::leaf_name(&self.path))
    }

    pub fn is_readonly(&self) -> bool {
        self.render.as_deref() == Some(RENDER_READONLY)
    }
}

impl TemplateDocument {
    /// Check a JSON value into a typed document.
    ///
    /// Unlike plain deserialization this names the offending location on
    /// every failure, which is what edit-form tooling reports to users.
    pub fn from_value(raw: &Value) -> Result<Self, DocumentError> {
        let root = as_object(raw, "document")?;
        let mut super_blocks = Vec::new();
        for (index, raw_super) in as_array(root, "superBlocks", "document")?.iter().enumerate() {
            let at = format!("superBlocks[{index}]");
            let super_object = as_object(raw_super, &at)?;
            let mut blocks = Vec::new();
            for (block_index, raw_block) in
                as_array(super_object, "blocks", &at)?.iter().enumerate()
            {
                blocks.push(check_block(raw_block, &format!("{at}.blocks[{block_index}]"))?);
            }
            super_blocks.push(SuperBlock {
                name: required_string(super_object, "name", &at)?,
                blocks,
            });
        }
        Ok(Self { super_blocks })
    }

    /// The document as a JSON value, the inverse of [`Self::from_value`].
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// All fields of the form in document order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.super_blocks
            .iter()
            .flat_map(|super_block| super_block.blocks.iter())
            .flat_map(|block| block.fields.iter())
    }
}

fn check_block(raw: &Value, at: &str) -> Result<Block, DocumentError> {
    let object = as_object(raw, at)?;
    let mut fields = Vec::new();
    if let Some(raw_fields) = object.get("fields") {
        let items = raw_fields.as_array().ok_or_else(|| DocumentError::NotAnArray {
            at: at.to_string(),
            field: "fields".to_string(),
        })?;
        for (index, raw_field) in items.iter().enumerate() {
            fields.push(check_field(raw_field, &format!("{at}.fields[{index}]"))?);
        }
    }
    Ok(Block {
        path: required_string(object, "path", at)?,
        block_name: optional_string(object, "blockName", at)?,
        node_type: optional_string(object, "type", at)?,
        strict: optional_bool(object, "strict", at)?,
        multiplicity: optional_string(object, "multiplicity", at)?,
        render: optional_string(object, "render", at)?,
        fields,
    })
}

fn check_field(raw: &Value, at: &str) -> Result<Field, DocumentError> {
    let object = as_object(raw, at)?;
    let mut predefined_values = Vec::new();
    if let Some(raw_predefined) = object.get("predefinedValues") {
        let items = raw_predefined
            .as_array()
            .ok_or_else(|| DocumentError::NotAnArray {
                at: at.to_string(),
                field: "predefinedValues".to_string(),
            })?;
        for item in items {
            match item.as_str() {
                Some(text) => predefined_values.push(text.to_string()),
                None => {
                    return Err(DocumentError::InvalidField {
                        at: at.to_string(),
                        field: "predefinedValues".to_string(),
                        expected: "array of strings",
                    });
                }
            }
        }
    }
    Ok(Field {
        path: required_string(object, "path", at)?,
        name: optional_string(object, "name", at)?,
        node_type: optional_string(object, "type", at)?,
        strict: optional_bool(object, "strict", at)?,
        multiplicity: optional_string(object, "multiplicity", at)?,
        render: optional_string(object, "render", at)?,
        default_value: optional_string(object, "defaultValue", at)?,
        predefined_values,
        completion: optional_string(object, "completion", at)?,
        value: optional_string(object, "value", at)?,
    })
}

fn as_object<'a>(raw: &'a Value, at: &str) -> Result<&'a Map<String, Value>, DocumentError> {
    raw.as_object().ok_or_else(|| DocumentError::NotAnObject {
        at: at.to_string(),
    })
}

fn as_array<'a>(
    object: &'a Map<String, Value>,
    field: &str,
    at: &str,
) -> Result<&'a Vec<Value>, DocumentError> {
    match object.get(field) {
        Some(value) => value.as_array().ok_or_else(|| DocumentError::NotAnArray {
            at: at.to_string(),
            field: field.to_string(),
        }),
        None => Err(DocumentError::MissingField {
            at: at.to_string(),
            field: field.to_string(),
        }),
    }
}

fn required_string(
    object: &Map<String, Value>,
    field: &str,
    at: &str,
) -> Result<String, DocumentError> {
    match object.get(field) {
        Some(Value::String(text)) => Ok(text.clone()),
        Some(_) => Err(DocumentError::InvalidField {
            at: at.to_string(),
            field: field.to_string(),
            expected: "string",
        }),
        None => Err(DocumentError::MissingField {
            at: at.to_string(),
            field: field.to_string(),
        }),
    }
}

fn optional_string(
    object: &Map<String, Value>,
    field: &str,
    at: &str,
) -> Result<Option<String>, DocumentError> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.clone())),
        Some(_) => Err(DocumentError::InvalidField {
            at: at.to_string(),
            field: field.to_string(),
            expected: "string",
        }),
    }
}

fn optional_bool(object: &Map<String, Value>, field: &str, at: &str) -> Result<bool, DocumentError> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(_) => Err(DocumentError::InvalidField {
            at: at.to_string(),
            field: field.to_string(),
            expected: "boolean",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "superBlocks": [
                {
                    "name": "Identification",
                    "blocks": [
                        {
                            "path": "identification.pointOfContact",
                            "blockName": "pointOfContact",
                            "type": "CI_Responsibility",
                            "strict": true,
                            "fields": [
                                {
                                    "path": "identification.pointOfContact.individualName",
                                    "value": "Ada Lovelace",
                                    "completion": "elementary"
                                },
                                {
                                    "path": "identification.pointOfContact.role",
                                    "render": "readonly",
                                    "defaultValue": "pointOfContact"
                                }
                            ]
                        }
                    ]
                }
            ]
        })
    }

    #[test]
    fn checks_a_well_formed_document() {
        let document = TemplateDocument::from_value(&sample()).unwrap();
        assert_eq!(document.super_blocks.len(), 1);
        let block = &document.super_blocks[0].blocks[0];
        assert_eq!(block.block_name(), "pointOfContact");
        assert!(block.strict);
        assert_eq!(block.fields.len(), 2);
        assert!(block.fields[1].is_readonly());
        assert_eq!(
            block.fields[0].value.as_deref(),
            Some("Ada Lovelace")
        );
    }

    #[test]
    fn block_name_defaults_to_the_last_path_segment() {
        let block = Block {
            path: "identification.extent[2]".to_string(),
            ..Block::default()
        };
        assert_eq!(block.block_name(), "extent");
    }

    #[test]
    fn errors_name_the_offending_location() {
        let raw = json!({
            "superBlocks": [
                { "name": "Identification", "blocks": [ { "strict": true } ] }
            ]
        });
        let err = TemplateDocument::from_value(&raw).unwrap_err();
        assert_eq!(
            err.to_string(),
            "superBlocks[0].blocks[0]: missing field `path`"
        );
    }

    #[test]
    fn round_trips_through_json() {
        let document = TemplateDocument::from_value(&sample()).unwrap();
        let again = TemplateDocument::from_value(&document.to_value()).unwrap();
        assert_eq!(document, again);
    }
}
