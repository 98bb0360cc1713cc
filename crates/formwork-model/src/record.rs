//! Records: the generic multi-valued property bag.
//!
//! A record is the interior node of the domain object graph. Properties
//! are unordered from the standards model's point of view but stored in a
//! vector per name so the reconciliation engine can address elements
//! positionally. Scalar properties are simply vectors of length one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::registry::TypeId;
use crate::value::Value;

/// A standards metadata bean: a type identifier plus a property bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    type_id: TypeId,
    #[serde(default)]
    properties: BTreeMap<String, Vec<Value>>,
}

impl Record {
    /// A record of the given type with no initial properties.
    pub fn new(type_id: TypeId) -> Self {
        Self {
            type_id,
            properties: BTreeMap::new(),
        }
    }

    pub fn type_id(&self) -> &TypeId {
        &self.type_id
    }

    /// The values of a property; empty when the property is unset.
    pub fn get(&self, name: &str) -> &[Value] {
        self.properties.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Mutable access to a property's backing vector, creating the slot.
    pub fn get_mut(&mut self, name: &str) -> &mut Vec<Value> {
        self.properties.entry(name.to_string()).or_default()
    }

    /// Replace the property with a single value.
    pub fn set(&mut self, name: &str, value: Value) {
        self.properties.insert(name.to_string(), vec![value]);
    }

    /// Append a value to the property.
    pub fn push(&mut self, name: &str, value: Value) {
        self.get_mut(name).push(value);
    }

    pub fn first(&self, name: &str) -> Option<&Value> {
        self.get(name).first()
    }

    pub fn first_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.properties.get_mut(name).and_then(|values| values.first_mut())
    }

    /// Whether the property holds at least one non-empty value.
    pub fn has(&self, name: &str) -> bool {
        self.get(name).iter().any(|value| !value.is_empty())
    }

    /// The non-empty properties of this record, in name order.
    pub fn property_map(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.properties
            .iter()
            .filter(|(_, values)| values.iter().any(|value| !value.is_empty()))
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Builder-style property assignment, for fixtures and defaults.
    pub fn with(mut self, name: &str, value: Value) -> Self {
        self.push(name, value);
        self
    }
}
