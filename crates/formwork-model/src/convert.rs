//! Literal conversion: untyped template strings into domain value kinds.
//!
//! A converter is built once per reconciliation pass and owns its parsing
//! configuration, so no formatter state is ever shared between passes.
//!
//! Failure policy follows the error-handling design: malformed dates,
//! numbers, unit codes and nil reasons abort the pass; a malformed
//! period-duration is downgraded to a dropped value by default. The
//! downgrade is an explicit [`LiteralPolicy`] knob rather than a hard-wired
//! special case.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tracing::warn;

use crate::error::ModelError;
use crate::registry::{TypeRef, TypeRegistry};
use crate::value::{NilReason, Value};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Fallback offset pattern tried when a literal is not valid RFC 3339.
const OFFSET_FALLBACK_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

const NIL_PREFIX: &str = "nilReason:";

/// What to do when a literal of a given kind does not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureMode {
    /// Raise a mapping error and abort the pass.
    Abort,
    /// Log a warning, drop the value, continue the pass.
    #[default]
    DropAndWarn,
}

/// Per-kind failure policy for literal conversion.
#[derive(Debug, Clone, Default)]
pub struct LiteralPolicy {
    /// Policy for malformed ISO-8601 period-durations. Defaults to
    /// [`FailureMode::DropAndWarn`], matching the behaviour metadata
    /// editors have historically relied on.
    pub on_malformed_duration: FailureMode,
}

/// Converts untyped string literals into typed domain values.
pub struct LiteralConverter<'a> {
    registry: &'a TypeRegistry,
    policy: LiteralPolicy,
}

impl<'a> LiteralConverter<'a> {
    pub fn new(registry: &'a TypeRegistry, policy: LiteralPolicy) -> Self {
        Self { registry, policy }
    }

    /// Convert `literal` to the `target` kind.
    ///
    /// `Ok(None)` means the value was deliberately dropped (malformed
    /// duration under [`FailureMode::DropAndWarn`], or a nil placeholder
    /// requested for a kind that cannot carry one).
    pub fn convert(
        &self,
        property: &str,
        target: &TypeRef,
        literal: &str,
    ) -> Result<Option<Value>, ModelError> {
        match target {
            TypeRef::Str => Ok(Some(Value::Str(literal.to_string()))),
            TypeRef::Date => self.parse_date(property, literal).map(|at| Some(Value::Date(at))),
            // Temporal targets share the instant grammar; a period's own
            // begin and end are addressed as named parts, not converted here.
            TypeRef::Instant | TypeRef::Period => self
                .parse_instant(property, literal)
                .map(|at| Some(Value::Instant(at))),
            TypeRef::Int | TypeRef::Long => literal
                .trim()
                .parse::<i64>()
                .map(|n| Some(Value::Int(n)))
                .map_err(|_| malformed(property, literal, "an integer")),
            TypeRef::Double => literal
                .trim()
                .parse::<f64>()
                .map(|n| Some(Value::Real(n)))
                .map_err(|_| malformed(property, literal, "a number")),
            TypeRef::Bool => match literal.trim() {
                "true" | "1" => Ok(Some(Value::Bool(true))),
                "false" | "0" => Ok(Some(Value::Bool(false))),
                _ => Err(malformed(property, literal, "a boolean")),
            },
            TypeRef::Name(kind) => Ok(Some(Value::Name {
                kind: *kind,
                text: literal.to_string(),
            })),
            TypeRef::Duration => self.parse_duration(property, literal),
            TypeRef::I18n => Ok(Some(Value::I18n {
                text: literal.to_string(),
            })),
            TypeRef::Charset => Ok(Some(Value::Charset(literal.to_string()))),
            TypeRef::Locale => Ok(Some(Value::Locale(strip_scope(literal).to_string()))),
            TypeRef::Measure => self.parse_measure(property, literal),
            TypeRef::CodeList(_)
            | TypeRef::ReferenceSystem
            | TypeRef::MultiplicityRange
            | TypeRef::NumericRange
            | TypeRef::Record(_) => self.convert_other(property, target, literal),
        }
    }

    /// The catch-all branch for non-character-sequence targets: nil
    /// placeholders, controlled vocabularies, and literals that stay
    /// unconverted.
    fn convert_other(
        &self,
        property: &str,
        target: &TypeRef,
        literal: &str,
    ) -> Result<Option<Value>, ModelError> {
        if let Some(raw_reason) = literal.strip_prefix(NIL_PREFIX) {
            let Some(reason) = NilReason::parse(raw_reason) else {
                return Err(ModelError::BadNilReason {
                    property: property.to_string(),
                    reason: raw_reason.to_string(),
                });
            };
            if !supports_nil(target) {
                warn!(property, %target, "nil placeholder unsupported for target kind, dropping value");
                return Ok(None);
            }
            return Ok(Some(Value::Nil { reason }));
        }
        match target {
            TypeRef::CodeList(list) => {
                let code = strip_scope(literal);
                if self.registry.code_entry(list, code) {
                    Ok(Some(Value::CodeEntry {
                        list: list.clone(),
                        code: code.to_string(),
                    }))
                } else {
                    Err(malformed(property, literal, "an entry of the code list"))
                }
            }
            TypeRef::ReferenceSystem => Ok(Some(Value::ReferenceSystem {
                code: Some(literal.to_string()),
            })),
            // No conversion applies; the literal is handed over as-is.
            _ => Ok(Some(Value::Str(literal.to_string()))),
        }
    }

    fn parse_date(&self, property: &str, literal: &str) -> Result<DateTime<Utc>, ModelError> {
        let literal = literal.trim();
        if let Some(millis) = epoch_millis(literal) {
            return DateTime::from_timestamp_millis(millis)
                .ok_or_else(|| malformed(property, literal, "an epoch-millisecond date"));
        }
        if literal.contains(':') {
            return NaiveDateTime::parse_from_str(literal, DATE_TIME_FORMAT)
                .map(|at| at.and_utc())
                .map_err(|_| malformed(property, literal, "a yyyy-MM-dd HH:mm:ss date"));
        }
        NaiveDate::parse_from_str(literal, DATE_FORMAT)
            .map(|date| date.and_time(NaiveTime::MIN).and_utc())
            .map_err(|_| malformed(property, literal, "a yyyy-MM-dd date"))
    }

    fn parse_instant(&self, property: &str, literal: &str) -> Result<DateTime<Utc>, ModelError> {
        let literal = literal.trim();
        if let Some(millis) = epoch_millis(literal) {
            return DateTime::from_timestamp_millis(millis)
                .ok_or_else(|| malformed(property, literal, "an epoch-millisecond instant"));
        }
        if let Ok(date) = NaiveDate::parse_from_str(literal, DATE_FORMAT) {
            return Ok(date.and_time(NaiveTime::MIN).and_utc());
        }
        if let Ok(at) = DateTime::parse_from_rfc3339(literal) {
            return Ok(at.with_timezone(&Utc));
        }
        DateTime::parse_from_str(literal, OFFSET_FALLBACK_FORMAT)
            .map(|at| at.with_timezone(&Utc))
            .map_err(|_| malformed(property, literal, "an offset date-time"))
    }

    fn parse_duration(&self, property: &str, literal: &str) -> Result<Option<Value>, ModelError> {
        if valid_iso_duration(literal) {
            return Ok(Some(Value::Duration(literal.to_string())));
        }
        match self.policy.on_malformed_duration {
            FailureMode::Abort => Err(malformed(property, literal, "an ISO-8601 duration")),
            FailureMode::DropAndWarn => {
                warn!(property, literal, "malformed period-duration, dropping value");
                Ok(None)
            }
        }
    }

    /// A measure literal is `<number> <unit>` or a bare unit code.
    fn parse_measure(&self, property: &str, literal: &str) -> Result<Option<Value>, ModelError> {
        if literal.starts_with(NIL_PREFIX) {
            return self.convert_other(property, &TypeRef::Measure, literal);
        }
        let mut tokens = literal.split_whitespace();
        let (value, unit) = match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(first), None, _) => (None, first),
            (Some(first), Some(second), None) => {
                let number = first
                    .parse::<f64>()
                    .map_err(|_| malformed(property, literal, "a measure: <number> <unit>"))?;
                (Some(number), second)
            }
            _ => return Err(malformed(property, literal, "a measure: <number> <unit>")),
        };
        if !self.registry.unit(unit) {
            return Err(ModelError::UnknownUnit {
                property: property.to_string(),
                code: unit.to_string(),
            });
        }
        Ok(Some(Value::Measure {
            value,
            unit: unit.to_string(),
        }))
    }
}

/// Which target kinds can carry a reason-typed nil placeholder.
fn supports_nil(target: &TypeRef) -> bool {
    matches!(
        target,
        TypeRef::Record(_) | TypeRef::CodeList(_) | TypeRef::ReferenceSystem | TypeRef::Measure
    )
}

fn malformed(property: &str, literal: &str, expected: &'static str) -> ModelError {
    ModelError::MalformedLiteral {
        property: property.to_string(),
        literal: literal.to_string(),
        expected,
    }
}

/// Strip one leading `<scope>.` qualifier, as UIs prefix locale and code
/// list entries with the owning schema scope.
fn strip_scope(literal: &str) -> &str {
    match literal.split_once('.') {
        Some((scope, rest)) if !scope.is_empty() && !rest.is_empty() => rest,
        _ => literal,
    }
}

fn epoch_millis(literal: &str) -> Option<i64> {
    let digits = literal.strip_prefix('-').unwrap_or(literal);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    literal.parse::<i64>().ok()
}

/// Minimal ISO-8601 period-duration grammar: `[-]P` followed by ordered
/// `nY nM nW nD` components and an optional `T nH nM nS` time part, with
/// at least one component overall.
fn valid_iso_duration(raw: &str) -> bool {
    let rest = raw.strip_prefix('-').unwrap_or(raw);
    let Some(rest) = rest.strip_prefix('P') else {
        return false;
    };
    if rest.is_empty() {
        return false;
    }
    let (date_part, time_part) = match rest.split_once('T') {
        Some((date, time)) => (date, Some(time)),
        None => (rest, None),
    };
    if date_part.is_empty() && time_part.is_none_or(str::is_empty) {
        return false;
    }
    if time_part.is_some_and(str::is_empty) {
        return false;
    }
    valid_components(date_part, &['Y', 'M', 'W', 'D'])
        && time_part.is_none_or(|time| valid_components(time, &['H', 'M', 'S']))
}

fn valid_components(mut part: &str, designators: &[char]) -> bool {
    let mut next_designator = 0;
    while !part.is_empty() {
        let Some(number_end) = part.find(|c: char| !c.is_ascii_digit() && c != '.') else {
            return false;
        };
        if number_end == 0 || part[..number_end].parse::<f64>().is_err() {
            return false;
        }
        let designator = part[number_end..].chars().next().unwrap_or_default();
        let Some(offset) = designators[next_designator..]
            .iter()
            .position(|&d| d == designator)
        else {
            return false;
        };
        next_designator += offset + 1;
        part = &part[number_end + designator.len_utf8()..];
    }
    true
}
