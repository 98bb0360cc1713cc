//! Type registry: stable string identifiers resolved to types and factories.
//!
//! The registry is the single semantic authority for what a type identifier
//! written in a template means. It is populated at startup and never probed
//! dynamically: an identifier that is not registered is a first-class
//! [`ModelError::UnknownType`], not a class-load failure.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::ModelError;
use crate::record::Record;
use crate::value::{NameKind, Value};

/// Stable identifier of a record type, e.g. `CI_Responsibility`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeId(String);

impl TypeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TypeId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for TypeId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resolved type: either a built-in leaf kind, a controlled vocabulary,
/// or a registered record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TypeRef {
    Str,
    Int,
    Long,
    Double,
    Bool,
    Date,
    Instant,
    Period,
    Duration,
    I18n,
    Locale,
    Charset,
    ReferenceSystem,
    MultiplicityRange,
    NumericRange,
    Measure,
    Name(NameKind),
    CodeList(String),
    Record(TypeId),
}

impl TypeRef {
    /// Whether the target is a character sequence; such targets take string
    /// literals verbatim and never carry nil placeholders.
    pub fn is_character_sequence(&self) -> bool {
        matches!(self, TypeRef::Str)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::CodeList(list) => write!(f, "codeList:{list}"),
            TypeRef::Record(id) => f.write_str(id.as_str()),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Declared type of one record property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySpec {
    /// Element type, with one level of collection unwrapping already done.
    pub type_ref: TypeRef,
    /// Whether the property is multi-valued in the standards model.
    pub multiple: bool,
}

/// Declared shape of one record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeSpec {
    pub id: TypeId,
    pub properties: BTreeMap<String, PropertySpec>,
}

impl TypeSpec {
    pub fn new(id: impl Into<TypeId>) -> Self {
        Self {
            id: id.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Declare a single-valued property.
    pub fn property(mut self, name: &str, type_ref: TypeRef) -> Self {
        self.properties.insert(
            name.to_string(),
            PropertySpec {
                type_ref,
                multiple: false,
            },
        );
        self
    }

    /// Declare a multi-valued property.
    pub fn property_list(mut self, name: &str, type_ref: TypeRef) -> Self {
        self.properties.insert(
            name.to_string(),
            PropertySpec {
                type_ref,
                multiple: true,
            },
        );
        self
    }
}

/// The registry: identifiers, record shapes, specializations, vocabularies.
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    types: BTreeMap<TypeId, TypeSpec>,
    aliases: BTreeMap<String, TypeRef>,
    specializations: BTreeMap<TypeId, TypeId>,
    code_lists: BTreeMap<String, BTreeSet<String>>,
    units: BTreeSet<String>,
}

impl TypeRegistry {
    /// An empty registry carrying only the built-in leaf identifiers.
    pub fn new() -> Self {
        let mut registry = Self::default();
        for (identifier, type_ref) in builtin_identifiers() {
            registry.aliases.insert(identifier.to_string(), type_ref);
        }
        registry
    }

    /// Register a record type.
    pub fn register(&mut self, spec: TypeSpec) {
        self.types.insert(spec.id.clone(), spec);
    }

    /// Map an abstract capability to its preferred concrete implementation,
    /// so freshly created sub-objects are directly usable.
    pub fn specialize(&mut self, abstract_id: impl Into<TypeId>, concrete_id: impl Into<TypeId>) {
        self.specializations
            .insert(abstract_id.into(), concrete_id.into());
    }

    /// Register a controlled vocabulary.
    pub fn register_code_list(
        &mut self,
        name: &str,
        entries: impl IntoIterator<Item = impl Into<String>>,
    ) {
        self.code_lists
            .insert(name.to_string(), entries.into_iter().map(Into::into).collect());
    }

    /// Register the known unit-of-measure codes.
    pub fn register_units(&mut self, codes: impl IntoIterator<Item = impl Into<String>>) {
        self.units.extend(codes.into_iter().map(Into::into));
    }

    /// Resolve a template type identifier.
    pub fn resolve(&self, identifier: &str) -> Result<TypeRef, ModelError> {
        if let Some(type_ref) = self.aliases.get(identifier) {
            return Ok(type_ref.clone());
        }
        if self.code_lists.contains_key(identifier) {
            return Ok(TypeRef::CodeList(identifier.to_string()));
        }
        let id = TypeId::from(identifier);
        if self.types.contains_key(&id) || self.specializations.contains_key(&id) {
            return Ok(TypeRef::Record(id));
        }
        Err(ModelError::UnknownType {
            identifier: identifier.to_string(),
        })
    }

    /// Substitute an abstract record type through the specialization table.
    pub fn specialized(&self, type_ref: &TypeRef) -> TypeRef {
        match type_ref {
            TypeRef::Record(id) => match self.specializations.get(id) {
                Some(concrete) => TypeRef::Record(concrete.clone()),
                None => type_ref.clone(),
            },
            other => other.clone(),
        }
    }

    /// Declared type of a record property, collection-element unwrapped.
    pub fn property_type(&self, type_id: &TypeId, name: &str) -> Option<&PropertySpec> {
        self.types.get(type_id)?.properties.get(name)
    }

    /// Whether the registry knows the shape of this record type at all.
    /// An unregistered type is treated as open: any property may be set.
    pub fn knows(&self, type_id: &TypeId) -> bool {
        self.types.contains_key(type_id)
    }

    /// Whether a code belongs to the given vocabulary.
    pub fn code_entry(&self, list: &str, code: &str) -> bool {
        self.code_lists
            .get(list)
            .is_some_and(|entries| entries.contains(code))
    }

    /// Whether a unit-of-measure code is registered.
    pub fn unit(&self, code: &str) -> bool {
        self.units.contains(code)
    }

    /// Create a default instance of the resolved type.
    ///
    /// Built-in leaf kinds are constructed directly with empty defaults;
    /// record kinds go through the specialization table and come back with
    /// no initial properties. A record identifier with no registered spec
    /// and no specialization cannot be materialized.
    pub fn create(&self, type_ref: &TypeRef) -> Result<Value, ModelError> {
        Ok(match type_ref {
            TypeRef::Str => Value::Str(String::new()),
            TypeRef::Int | TypeRef::Long => Value::Int(0),
            TypeRef::Double => Value::Real(0.0),
            TypeRef::Bool => Value::Bool(false),
            TypeRef::Date | TypeRef::Instant => Value::Null,
            TypeRef::Period => Value::Period {
                begin: None,
                end: None,
            },
            TypeRef::Duration => Value::Duration(String::new()),
            TypeRef::I18n => Value::I18n {
                text: String::new(),
            },
            TypeRef::Locale => Value::Locale(String::new()),
            TypeRef::Charset => Value::Charset(String::new()),
            TypeRef::ReferenceSystem => Value::ReferenceSystem { code: None },
            TypeRef::MultiplicityRange => Value::MultiplicityRange {
                lower: 0,
                upper: None,
            },
            TypeRef::NumericRange => Value::NumericRange {
                minimum: None,
                maximum: None,
            },
            TypeRef::Measure => Value::Measure {
                value: None,
                unit: String::new(),
            },
            TypeRef::Name(kind) => Value::Name {
                kind: *kind,
                text: String::new(),
            },
            TypeRef::CodeList(list) => Value::CodeEntry {
                list: list.clone(),
                code: String::new(),
            },
            TypeRef::Record(id) => {
                let concrete = match self.specializations.get(id) {
                    Some(concrete) => concrete.clone(),
                    None => id.clone(),
                };
                if !self.types.contains_key(&concrete) {
                    return Err(ModelError::Factory {
                        type_id: concrete.to_string(),
                        message: "no registered type spec".to_string(),
                    });
                }
                Value::Record(Record::new(concrete))
            }
        })
    }
}

fn builtin_identifiers() -> Vec<(&'static str, TypeRef)> {
    vec![
        ("CharacterString", TypeRef::Str),
        ("String", TypeRef::Str),
        ("Integer", TypeRef::Int),
        ("Long", TypeRef::Long),
        ("Real", TypeRef::Double),
        ("Decimal", TypeRef::Double),
        ("Boolean", TypeRef::Bool),
        ("Date", TypeRef::Date),
        ("DateTime", TypeRef::Instant),
        ("TM_Instant", TypeRef::Instant),
        ("TM_Position", TypeRef::Instant),
        ("TM_Period", TypeRef::Period),
        ("TM_PeriodDuration", TypeRef::Duration),
        ("PT_FreeText", TypeRef::I18n),
        ("PT_Locale", TypeRef::Locale),
        ("MD_CharacterSetCode", TypeRef::Charset),
        ("MD_ReferenceSystem", TypeRef::ReferenceSystem),
        ("MultiplicityRange", TypeRef::MultiplicityRange),
        ("RS_NumericRange", TypeRef::NumericRange),
        ("Measure", TypeRef::Measure),
        ("LocalName", TypeRef::Name(NameKind::Local)),
        ("TypeName", TypeRef::Name(NameKind::Type)),
        ("ScopedName", TypeRef::Name(NameKind::Scoped)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry.register(
            TypeSpec::new("CI_Responsibility")
                .property("individualName", TypeRef::Str)
                .property("role", TypeRef::CodeList("CI_RoleCode".to_string()))
                .property_list("extent", TypeRef::Record(TypeId::from("EX_Extent"))),
        );
        registry.register(TypeSpec::new("CI_Organisation"));
        registry.specialize("AbstractCI_Party", "CI_Organisation");
        registry.register_code_list("CI_RoleCode", ["pointOfContact", "author"]);
        registry.register_units(["m", "deg"]);
        registry
    }

    #[test]
    fn resolves_builtins_records_and_code_lists() {
        let registry = registry();
        assert_eq!(registry.resolve("Date").unwrap(), TypeRef::Date);
        assert_eq!(
            registry.resolve("CI_Responsibility").unwrap(),
            TypeRef::Record(TypeId::from("CI_Responsibility"))
        );
        assert_eq!(
            registry.resolve("CI_RoleCode").unwrap(),
            TypeRef::CodeList("CI_RoleCode".to_string())
        );
        assert!(matches!(
            registry.resolve("MD_Bogus"),
            Err(ModelError::UnknownType { identifier }) if identifier == "MD_Bogus"
        ));
    }

    #[test]
    fn specialization_substitutes_abstract_capabilities() {
        let registry = registry();
        let abstract_ref = TypeRef::Record(TypeId::from("AbstractCI_Party"));
        assert_eq!(
            registry.specialized(&abstract_ref),
            TypeRef::Record(TypeId::from("CI_Organisation"))
        );
        let created = registry.create(&abstract_ref).unwrap();
        assert_eq!(
            created.as_record().unwrap().type_id(),
            &TypeId::from("CI_Organisation")
        );
    }

    #[test]
    fn create_fails_on_unregistered_record_types() {
        let registry = registry();
        let err = registry
            .create(&TypeRef::Record(TypeId::from("MD_Bogus")))
            .unwrap_err();
        assert!(matches!(err, ModelError::Factory { .. }));
    }

    #[test]
    fn property_type_reports_element_type_and_arity() {
        let registry = registry();
        let spec = registry
            .property_type(&TypeId::from("CI_Responsibility"), "extent")
            .unwrap();
        assert!(spec.multiple);
        assert_eq!(spec.type_ref, TypeRef::Record(TypeId::from("EX_Extent")));
        assert!(
            registry
                .property_type(&TypeId::from("CI_Responsibility"), "shoeSize")
                .is_none()
        );
    }
}
