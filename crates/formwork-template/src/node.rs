//! Form nodes: the addressable units of a template tree.
//!
//! Nodes are arena-indexed: a [`TemplateTree`](crate::tree::TemplateTree)
//! owns them all in one vector and hands out copyable [`NodeId`]s, so
//! positions stay valid while domain elements are mutated in place.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a node within its owning tree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct NodeId(pub(crate) usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One schema position, one ordinal instance: a field or a group of the
/// parsed template tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueNode {
    /// Plain dot-separated schema path.
    pub path: String,
    /// Last path segment.
    pub name: String,
    /// Identity of the enclosing schema group; disambiguates siblings
    /// sharing one path.
    pub block_name: String,
    /// 0-based position among siblings sharing `(path, block_name)`.
    pub ordinal: usize,
    /// Declared runtime-type hint.
    pub node_type: Option<String>,
    /// Whether matching requires a full recursive predicate match.
    pub strict: bool,
    pub multiplicity: Option<String>,
    pub render: Option<String>,
    /// Leaf-only metadata.
    pub value: Option<String>,
    pub default_value: Option<String>,
    pub predefined_values: Vec<String>,
    pub completion: Option<String>,
    /// Super block this node was declared under, for block-level nodes.
    pub super_block: Option<String>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub(crate) removed: bool,
}

impl ValueNode {
    pub(crate) fn new(path: String, name: String, block_name: String, ordinal: usize) -> Self {
        Self {
            path,
            name,
            block_name,
            ordinal,
            node_type: None,
            strict: false,
            multiplicity: None,
            render: None,
            value: None,
            default_value: None,
            predefined_values: Vec::new(),
            completion: None,
            super_block: None,
            parent: None,
            children: Vec::new(),
            removed: false,
        }
    }

    /// A node is a field iff it has no children.
    pub fn is_field(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_readonly(&self) -> bool {
        self.render.as_deref() == Some(crate::document::RENDER_READONLY)
    }

    /// Whether this node constrains what a domain element may look like.
    /// Constraint-free nodes match vacuously during strict matching.
    pub fn has_own_constraints(&self) -> bool {
        self.node_type.is_some()
            || !self.predefined_values.is_empty()
            || (self.is_readonly() && self.default_value.is_some())
    }
}
