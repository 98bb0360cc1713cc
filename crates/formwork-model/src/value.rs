//! Domain values: the dynamic tree the reconciliation engine edits.
//!
//! A metadata record is a graph of [`Value`]s. Interior nodes are
//! [`Record`]s (generic property bags); leaves are the built-in wrapper
//! kinds the standards model uses (dates, instants, periods, code entries,
//! nil placeholders, …).
//!
//! Everything that is not a [`Value::Record`] counts as *primitive-like*:
//! it is addressed through named parts (`begin`, `end`, `code`, …) rather
//! than through a property map.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::record::Record;
use crate::registry::TypeRef;

/// Reason carried by a nil placeholder standing in for an absent value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NilReason {
    Inapplicable,
    Missing,
    Template,
    Unknown,
    Withheld,
    Other(String),
}

impl NilReason {
    /// Parse the reason token of a `nilReason:<reason>` literal.
    ///
    /// Accepts the five well-known reasons plus `other:<text>` with a
    /// non-empty text. Anything else is malformed.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "inapplicable" => Some(Self::Inapplicable),
            "missing" => Some(Self::Missing),
            "template" => Some(Self::Template),
            "unknown" => Some(Self::Unknown),
            "withheld" => Some(Self::Withheld),
            _ => match raw.split_once(':') {
                Some(("other", text)) if !text.is_empty() => {
                    Some(Self::Other(text.to_string()))
                }
                _ => None,
            },
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Inapplicable => "inapplicable",
            Self::Missing => "missing",
            Self::Template => "template",
            Self::Unknown => "unknown",
            Self::Withheld => "withheld",
            Self::Other(text) => text,
        }
    }
}

impl fmt::Display for NilReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(text) => write!(f, "other:{text}"),
            _ => f.write_str(self.as_str()),
        }
    }
}

/// Flavour of a namespace-free name value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameKind {
    Local,
    Type,
    Scoped,
}

/// One value in the domain object graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    Null,
    Str(String),
    Int(i64),
    Real(f64),
    Bool(bool),
    /// Calendar date, carried at midnight UTC.
    Date(DateTime<Utc>),
    /// Time position / instant wrapper.
    Instant(DateTime<Utc>),
    /// Time period wrapper with named parts `begin` and `end`.
    Period {
        begin: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    },
    /// Geodetic reference system wrapper with named part `code`.
    ReferenceSystem { code: Option<String> },
    /// Internationalized string.
    I18n { text: String },
    Locale(String),
    Charset(String),
    /// Controlled-vocabulary entry.
    CodeEntry { list: String, code: String },
    /// Namespace-free local / type / scoped name.
    Name { kind: NameKind, text: String },
    /// ISO-8601 period-duration, stored as written.
    Duration(String),
    /// Unit-of-measure quantity.
    Measure { value: Option<f64>, unit: String },
    MultiplicityRange { lower: u64, upper: Option<u64> },
    NumericRange {
        minimum: Option<f64>,
        maximum: Option<f64>,
    },
    /// Typed nil placeholder.
    Nil { reason: NilReason },
    /// A standards metadata bean.
    Record(Record),
}

impl Value {
    pub fn is_record(&self) -> bool {
        matches!(self, Value::Record(_))
    }

    /// Anything that is not a metadata bean is primitive-like and is
    /// addressed through named parts instead of a property map.
    pub fn is_primitive_like(&self) -> bool {
        !self.is_record()
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_record_mut(&mut self) -> Option<&mut Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Whether the value carries no usable content.
    ///
    /// A nil placeholder is a deliberate statement of absence and therefore
    /// counts as non-empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Str(s) => s.is_empty(),
            Value::I18n { text } => text.is_empty(),
            Value::Locale(s) | Value::Charset(s) | Value::Duration(s) => s.is_empty(),
            Value::Name { text, .. } => text.is_empty(),
            Value::CodeEntry { code, .. } => code.is_empty(),
            Value::Period { begin, end } => begin.is_none() && end.is_none(),
            Value::ReferenceSystem { code } => code.is_none(),
            Value::Measure { value, unit } => value.is_none() && unit.is_empty(),
            Value::Record(record) => record.property_map().next().is_none(),
            _ => false,
        }
    }

    /// The runtime type this value inhabits, if it has one.
    ///
    /// `Null` and nil placeholders are typeless.
    pub fn runtime_type(&self) -> Option<TypeRef> {
        Some(match self {
            Value::Null | Value::Nil { .. } => return None,
            Value::Str(_) => TypeRef::Str,
            Value::Int(_) => TypeRef::Int,
            Value::Real(_) => TypeRef::Double,
            Value::Bool(_) => TypeRef::Bool,
            Value::Date(_) => TypeRef::Date,
            Value::Instant(_) => TypeRef::Instant,
            Value::Period { .. } => TypeRef::Period,
            Value::ReferenceSystem { .. } => TypeRef::ReferenceSystem,
            Value::I18n { .. } => TypeRef::I18n,
            Value::Locale(_) => TypeRef::Locale,
            Value::Charset(_) => TypeRef::Charset,
            Value::CodeEntry { list, .. } => TypeRef::CodeList(list.clone()),
            Value::Name { kind, .. } => TypeRef::Name(*kind),
            Value::Duration(_) => TypeRef::Duration,
            Value::Measure { .. } => TypeRef::Measure,
            Value::MultiplicityRange { .. } => TypeRef::MultiplicityRange,
            Value::NumericRange { .. } => TypeRef::NumericRange,
            Value::Record(record) => TypeRef::Record(record.type_id().clone()),
        })
    }

    /// Named part lookup on primitive-like wrappers.
    ///
    /// Returns `None` when the receiver has no part of that name; a part
    /// that exists but is unset comes back as `Some(Value::Null)`.
    pub fn part(&self, name: &str) -> Option<Value> {
        match self {
            Value::Period { begin, end } => match name {
                "begin" | "beginPosition" => {
                    Some(begin.map(Value::Instant).unwrap_or(Value::Null))
                }
                "end" | "endPosition" => Some(end.map(Value::Instant).unwrap_or(Value::Null)),
                _ => None,
            },
            Value::ReferenceSystem { code } => match name {
                "code" => Some(
                    code.as_ref()
                        .map(|c| Value::Str(c.clone()))
                        .unwrap_or(Value::Null),
                ),
                _ => None,
            },
            Value::Instant(at) => match name {
                "position" => Some(Value::Instant(*at)),
                _ => None,
            },
            _ => None,
        }
    }

    /// Named part mutation on primitive-like wrappers.
    ///
    /// Returns false when the receiver has no such part or the value kind
    /// does not fit it.
    pub fn set_part(&mut self, name: &str, value: Value) -> bool {
        fn as_time(value: &Value) -> Option<Option<DateTime<Utc>>> {
            match value {
                Value::Null => Some(None),
                Value::Instant(at) | Value::Date(at) => Some(Some(*at)),
                _ => None,
            }
        }

        match self {
            Value::Period { begin, end } => match name {
                "begin" | "beginPosition" => match as_time(&value) {
                    Some(at) => {
                        *begin = at;
                        true
                    }
                    None => false,
                },
                "end" | "endPosition" => match as_time(&value) {
                    Some(at) => {
                        *end = at;
                        true
                    }
                    None => false,
                },
                _ => false,
            },
            Value::ReferenceSystem { code } => match (name, value) {
                ("code", Value::Str(text)) => {
                    *code = Some(text);
                    true
                }
                ("code", Value::Null) => {
                    *code = None;
                    true
                }
                _ => false,
            },
            Value::Instant(at) => match (name, value) {
                ("position", Value::Instant(new_at) | Value::Date(new_at)) => {
                    *at = new_at;
                    true
                }
                _ => false,
            },
            _ => false,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}
