//! Error types for domain model operations.

use thiserror::Error;

/// Errors raised while resolving types or converting literals.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A template names a type identifier the registry cannot materialize.
    #[error("unknown type identifier `{identifier}`")]
    UnknownType { identifier: String },

    /// A literal cannot be converted to its target kind.
    #[error("cannot convert `{literal}` for property `{property}`: expected {expected}")]
    MalformedLiteral {
        property: String,
        literal: String,
        expected: &'static str,
    },

    /// A unit-of-measure code that is not in the registered vocabulary.
    /// Surfaced verbatim to the user, naming the bad code.
    #[error("unknown unit of measure `{code}` for property `{property}`")]
    UnknownUnit { property: String, code: String },

    /// A `nilReason:` literal whose reason token is malformed.
    #[error("malformed nil reason `{reason}` for property `{property}`")]
    BadNilReason { property: String, reason: String },

    /// A factory could not produce a default instance.
    #[error("cannot create an instance of `{type_id}`: {message}")]
    Factory { type_id: String, message: String },
}
