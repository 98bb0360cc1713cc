//! The orchestrating façade: one entry point per direction.

use formwork_model::{Record, TypeRegistry};

use crate::completion::{CompletionSummary, completion_of};
use crate::document::TemplateDocument;
use crate::error::MappingError;
use crate::reader::{ReaderOptions, TemplateReader};
use crate::tree::TemplateTree;
use crate::writer::TemplateWriter;

/// Edits metadata records through a schema-driven form.
///
/// Each call builds a private tree and claim ledger and discards them on
/// return, so concurrent calls on *different* records are independent;
/// calls sharing one record must be serialized by the caller.
pub struct Template<'a> {
    registry: &'a TypeRegistry,
    options: ReaderOptions,
}

impl<'a> Template<'a> {
    pub fn new(registry: &'a TypeRegistry) -> Self {
        Self {
            registry,
            options: ReaderOptions::default(),
        }
    }

    pub fn with_options(registry: &'a TypeRegistry, options: ReaderOptions) -> Self {
        Self { registry, options }
    }

    /// Push the document's values into `record`, mutating it in place.
    ///
    /// Beyond writing values, reconciliation intentionally mutates the
    /// record two more ways: polymorphic sibling collections are reordered
    /// into template ordinal order, and collection elements beyond the
    /// template's sibling count are discarded.
    pub fn reconcile(
        &self,
        document: &TemplateDocument,
        record: &mut Record,
    ) -> Result<(), MappingError> {
        let tree = TemplateTree::build(document);
        let mut reader = TemplateReader::new(self.registry, self.options.clone());
        reader.reconcile(&tree, record)
    }

    /// Project `record` into the form via the writer collaborator and
    /// score the filled document.
    pub fn fill(
        &self,
        writer: &dyn TemplateWriter,
        document: &TemplateDocument,
        record: &Record,
        prune: bool,
        overwrite: bool,
    ) -> Result<(TemplateDocument, CompletionSummary), MappingError> {
        let filled = writer.write(document, record, prune, overwrite)?;
        let summary = completion_of(&filled);
        Ok((filled, summary))
    }

    /// Score an already-filled document.
    pub fn completion(&self, document: &TemplateDocument) -> CompletionSummary {
        completion_of(document)
    }
}
