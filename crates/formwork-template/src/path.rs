//! Schema path handling.
//!
//! A template path is a dot-separated chain of property names. Documents
//! that went through a UI round trip may carry *numerated* segments
//! (`contact[1]`) stating where an instance sits among its siblings, or an
//! *appendable* last segment (`contact[+]`) asking for a fresh instance.

use serde::{Deserialize, Serialize};

/// Stated position of one path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stated {
    /// The UI claims this instance sits at the given ordinal.
    At(usize),
    /// The UI asks for a new instance appended after its siblings.
    Append,
}

/// One parsed path segment: plain name plus an optional stated position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub name: String,
    pub stated: Option<Stated>,
}

/// Split a path into parsed segments.
///
/// A malformed suffix (unbalanced bracket, non-numeric ordinal) is kept as
/// part of the name rather than rejected: paths are schema identifiers and
/// the schema, not this parser, is the authority on what names exist.
pub fn segments(path: &str) -> Vec<Segment> {
    path.split('.')
        .filter(|part| !part.is_empty())
        .map(|part| match parse_suffix(part) {
            Some((name, stated)) => Segment {
                name: name.to_string(),
                stated: Some(stated),
            },
            None => Segment {
                name: part.to_string(),
                stated: None,
            },
        })
        .collect()
}

/// The path with all stated positions removed.
pub fn plain(path: &str) -> String {
    segments(path)
        .iter()
        .map(|segment| segment.name.as_str())
        .collect::<Vec<_>>()
        .join(".")
}

/// Last plain segment of a path; the node name.
pub fn leaf_name(path: &str) -> String {
    segments(path)
        .last()
        .map(|segment| segment.name.clone())
        .unwrap_or_default()
}

/// Append one `name[ordinal]` step to a numerated path.
pub fn join_numerated(base: &str, name: &str, ordinal: usize) -> String {
    if base.is_empty() {
        format!("{name}[{ordinal}]")
    } else {
        format!("{base}.{name}[{ordinal}]")
    }
}

fn parse_suffix(part: &str) -> Option<(&str, Stated)> {
    let open = part.rfind('[')?;
    let inner = part.get(open + 1..part.len().checked_sub(1)?)?;
    if !part.ends_with(']') || open == 0 {
        return None;
    }
    if inner == "+" {
        return Some((&part[..open], Stated::Append));
    }
    inner
        .parse::<usize>()
        .ok()
        .map(|ordinal| (&part[..open], Stated::At(ordinal)))
}
