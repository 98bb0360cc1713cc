//! Completion scoring for filled template documents.
//!
//! Walks every leaf field of a filled form once and derives a numeric
//! percentage plus a tiered level. Tiers nest: a form cannot be COMPLETE
//! without also satisfying EXTENDED and ELEMENTARY.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::document::TemplateDocument;

pub const TAG_ELEMENTARY: &str = "elementary";
pub const TAG_EXTENDED: &str = "extended";
pub const TAG_COMPLETE: &str = "complete";

/// Coarse field-coverage classification of a filled form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionLevel {
    None,
    Elementary,
    Extended,
    Complete,
}

/// Completion of one filled document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionSummary {
    /// `round(100 * filled / total)`, 0 for a form without fields.
    pub percentage: u8,
    pub level: CompletionLevel,
}

/// Score a filled document.
pub fn completion_of(document: &TemplateDocument) -> CompletionSummary {
    let mut elementary = true;
    let mut extended = true;
    let mut complete = true;
    let mut total = 0usize;
    let mut filled = 0usize;

    for field in document.fields() {
        total += 1;
        let is_filled = field.value.as_deref().is_some_and(|value| !value.is_empty());
        if is_filled {
            filled += 1;
        }
        let Some(tag) = field.completion.as_deref() else {
            continue;
        };
        if is_filled {
            continue;
        }
        match tag {
            TAG_ELEMENTARY => elementary = false,
            TAG_EXTENDED => extended = false,
            TAG_COMPLETE => complete = false,
            other => warn!(tag = other, path = %field.path, "unrecognized completion tag, ignoring"),
        }
    }

    let percentage = if total == 0 {
        0
    } else {
        (100.0 * filled as f64 / total as f64).round() as u8
    };

    // An empty form is never considered complete, whatever its tags say.
    let level = if filled == 0 {
        CompletionLevel::None
    } else if elementary && extended && complete {
        CompletionLevel::Complete
    } else if elementary && extended {
        CompletionLevel::Extended
    } else if elementary {
        CompletionLevel::Elementary
    } else {
        CompletionLevel::None
    };

    CompletionSummary { percentage, level }
}
