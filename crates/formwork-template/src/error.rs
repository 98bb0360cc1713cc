//! Error types for template reconciliation.

use formwork_model::ModelError;
use thiserror::Error;

use crate::document::DocumentError;

/// The single error kind a reconciliation pass surfaces to its caller.
///
/// Unresolved types, malformed literals and factory failures abort the
/// pass synchronously; recoverable conditions (missing accessors, dropped
/// durations) are logged and skipped instead and never appear here.
#[derive(Debug, Error)]
pub enum MappingError {
    /// Type resolution, literal conversion or instantiation failed.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The template document itself is malformed.
    #[error(transparent)]
    Document(#[from] DocumentError),
}
