//! The writer collaborator contract.
//!
//! The reverse direction — projecting a domain object graph back into a
//! filled template document — is owned by an external collaborator. This
//! crate only depends on its contract: the engine hands it the blank form
//! and the record, and scores whatever comes back.

use formwork_model::Record;

use crate::document::TemplateDocument;
use crate::error::MappingError;

/// Projects a domain object graph into a filled template document.
pub trait TemplateWriter {
    /// Fill `document`'s fields from `record`.
    ///
    /// With `prune` set, empty nodes are omitted from the result; with
    /// `overwrite` set, values already present in the document are
    /// replaced rather than kept.
    fn write(
        &self,
        document: &TemplateDocument,
        record: &Record,
        prune: bool,
        overwrite: bool,
    ) -> Result<TemplateDocument, MappingError>;
}
