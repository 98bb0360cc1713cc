//! # formwork-template
//!
//! The template reconciliation engine: bidirectional mapping between a
//! schema-driven template document (super blocks → blocks → fields) and a
//! dynamically-typed domain object graph.
//!
//! This crate provides:
//! - `TemplateDocument`: the typed form model and its checked JSON loader
//! - `TemplateTree` / `ValueNode`: the arena-indexed node forest with
//!   ordinal addressing, renumbering and ancestor synthesis
//! - `TemplateReader`: the depth-first read/merge pass pushing template
//!   values into the record
//! - `NumeratedCollection` / `ReservedObjects`: positional views and the
//!   per-pass claim ledger
//! - completion scoring and the `Template` façade
//!
//! Trees, ledgers and converters live for exactly one pass. The record
//! is supplied by the caller and outlives every pass; the engine only
//! mutates it.

pub mod completion;
pub mod document;
pub mod error;
pub mod facade;
pub mod node;
pub mod numerated;
pub mod path;
pub mod reader;
pub mod reserved;
pub mod tree;
pub mod writer;

pub use completion::{CompletionLevel, CompletionSummary, completion_of};
pub use document::{Block, DocumentError, Field, SuperBlock, TemplateDocument};
pub use error::MappingError;
pub use facade::Template;
pub use node::{NodeId, ValueNode};
pub use numerated::NumeratedCollection;
pub use reader::{ReaderOptions, TemplateReader};
pub use reserved::ReservedObjects;
pub use tree::TemplateTree;
pub use writer::TemplateWriter;
