//! The template tree: owns every form node of one reconciliation pass.
//!
//! Built from a template document by walking super blocks, blocks and
//! fields in document order. Ancestor nodes missing between the root and a
//! declared path are synthesized on demand and shared by numerated-path
//! equality; blocks renumbered by the UI are re-slotted with a
//! "move following" shift of their siblings.
//!
//! A tree lives for exactly one pass and is discarded afterwards.

use crate::document::{Block, Field, SuperBlock, TemplateDocument};
use crate::node::{NodeId, ValueNode};
use crate::path::{self, Segment, Stated};

#[derive(Debug, Clone)]
pub struct TemplateTree {
    nodes: Vec<ValueNode>,
    root: NodeId,
}

impl Default for TemplateTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateTree {
    pub fn new() -> Self {
        let root = ValueNode::new(String::new(), String::new(), String::new(), 0);
        Self {
            nodes: vec![root],
            root: NodeId(0),
        }
    }

    /// Build the node forest for one template document.
    pub fn build(document: &TemplateDocument) -> Self {
        let mut tree = Self::new();
        for super_block in &document.super_blocks {
            for block in &super_block.blocks {
                tree.add_block(&super_block.name, block);
            }
        }
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &ValueNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut ValueNode {
        &mut self.nodes[id.0]
    }

    /// Live nodes (root excluded) in document order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &ValueNode)> {
        self.dfs()
            .into_iter()
            .filter(move |id| *id != self.root)
            .map(move |id| (id, self.node(id)))
    }

    /// Live children of a node, in document order.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id)
            .children
            .iter()
            .copied()
            .filter(|child| !self.node(*child).removed)
            .collect()
    }

    /// `path` with each segment suffixed by its ordinal, unique within the
    /// tree together with the block name.
    pub fn numerated_path(&self, id: NodeId) -> String {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == self.root {
                break;
            }
            let node = self.node(current);
            chain.push((node.name.clone(), node.ordinal));
            cursor = node.parent;
        }
        chain.reverse();
        let mut numerated = String::new();
        for (name, ordinal) in chain {
            numerated = path::join_numerated(&numerated, &name, ordinal);
        }
        numerated
    }

    /// First node with the given plain path, in document order.
    pub fn node_at_path(&self, plain_path: &str) -> Option<NodeId> {
        self.nodes()
            .find(|(_, node)| node.path == plain_path)
            .map(|(id, _)| id)
    }

    /// All nodes with the given plain path, in document order.
    pub fn nodes_at_path(&self, plain_path: &str) -> Vec<NodeId> {
        self.nodes()
            .filter(|(_, node)| node.path == plain_path)
            .map(|(id, _)| id)
            .collect()
    }

    /// Node with the given numerated path, optionally qualified by block
    /// name.
    pub fn node_at_numerated_path(
        &self,
        numerated: &str,
        block_name: Option<&str>,
    ) -> Option<NodeId> {
        self.nodes()
            .find(|(id, node)| {
                block_name.is_none_or(|wanted| node.block_name == wanted)
                    && self.numerated_path(*id) == numerated
            })
            .map(|(id, _)| id)
    }

    /// All nodes carrying the given block name, in document order.
    pub fn nodes_for_block_name(&self, block_name: &str) -> Vec<NodeId> {
        self.nodes()
            .filter(|(_, node)| node.block_name == block_name)
            .map(|(id, _)| id)
            .collect()
    }

    /// Tree nodes a document block maps to, used by the writer direction.
    pub fn nodes_for_block(&self, block: &Block) -> Vec<NodeId> {
        let plain = path::plain(&block.path);
        let block_name = block.block_name();
        self.nodes()
            .filter(|(_, node)| node.path == plain && node.block_name == block_name)
            .map(|(id, _)| id)
            .collect()
    }

    /// Tree nodes a document field maps to underneath a given parent.
    pub fn nodes_for_field(&self, field: &Field, parent: NodeId) -> Vec<NodeId> {
        let plain = path::plain(&field.path);
        let field_name = field.field_name();
        self.subtree(parent)
            .into_iter()
            .filter(|id| {
                let node = self.node(*id);
                node.is_field() && node.path == plain && node.block_name == field_name
            })
            .collect()
    }

    /// Live siblings sharing this node's `(path, block_name)`, itself
    /// included, sorted by ordinal.
    pub fn siblings(&self, id: NodeId) -> Vec<NodeId> {
        let node = self.node(id);
        let Some(parent) = node.parent else {
            return vec![id];
        };
        let (name, block_name) = (node.name.clone(), node.block_name.clone());
        let mut siblings: Vec<NodeId> = self
            .children(parent)
            .into_iter()
            .filter(|sibling| {
                let candidate = self.node(*sibling);
                candidate.name == name && candidate.block_name == block_name
            })
            .collect();
        siblings.sort_by_key(|sibling| self.node(*sibling).ordinal);
        siblings
    }

    pub fn sibling_count(&self, id: NodeId) -> usize {
        self.siblings(id).len()
    }

    /// Whether an earlier sibling with the same path but a different block
    /// name exists; such a sibling already supplies the property, so this
    /// node's field value is suppressed.
    pub fn earlier_sibling_other_block(&self, id: NodeId) -> bool {
        let node = self.node(id);
        let Some(parent) = node.parent else {
            return false;
        };
        for sibling in self.children(parent) {
            if sibling == id {
                return false;
            }
            let candidate = self.node(sibling);
            if candidate.name == node.name && candidate.block_name != node.block_name {
                return true;
            }
        }
        false
    }

    /// The merged template document reconstructed from this tree, with
    /// every path numerated to its final ordinal.
    pub fn merged_document(&self) -> TemplateDocument {
        let mut super_blocks: Vec<SuperBlock> = Vec::new();
        for (id, node) in self.nodes() {
            let Some(super_name) = node.super_block.clone() else {
                continue;
            };
            let fields = self
                .subtree(id)
                .into_iter()
                .filter(|descendant| *descendant != id && self.node(*descendant).is_field())
                .map(|field_id| {
                    let field = self.node(field_id);
                    Field {
                        path: self.numerated_path(field_id),
                        name: Some(field.block_name.clone()),
                        node_type: field.node_type.clone(),
                        strict: field.strict,
                        multiplicity: field.multiplicity.clone(),
                        render: field.render.clone(),
                        default_value: field.default_value.clone(),
                        predefined_values: field.predefined_values.clone(),
                        completion: field.completion.clone(),
                        value: field.value.clone(),
                    }
                })
                .collect();
            let block = Block {
                path: self.numerated_path(id),
                block_name: Some(node.block_name.clone()),
                node_type: node.node_type.clone(),
                strict: node.strict,
                multiplicity: node.multiplicity.clone(),
                render: node.render.clone(),
                fields,
            };
            match super_blocks.iter_mut().find(|sb| sb.name == super_name) {
                Some(existing) => existing.blocks.push(block),
                None => super_blocks.push(SuperBlock {
                    name: super_name,
                    blocks: vec![block],
                }),
            }
        }
        TemplateDocument { super_blocks }
    }

    /// Remove field nodes with empty values, then now-empty ancestors,
    /// bottom-up. Used when the caller asks for omission of empty nodes.
    pub fn prune(&mut self) {
        for child in self.children(self.root) {
            self.prune_rec(child);
        }
        let retained = self.retained_children(self.root);
        self.node_mut(self.root).children = retained;
    }

    fn prune_rec(&mut self, id: NodeId) -> bool {
        let children = self.children(id);
        if children.is_empty() {
            let keep = self
                .node(id)
                .value
                .as_deref()
                .is_some_and(|value| !value.is_empty());
            if !keep {
                self.node_mut(id).removed = true;
            }
            return keep;
        }
        let mut any_kept = false;
        for child in children {
            if self.prune_rec(child) {
                any_kept = true;
            }
        }
        let retained = self.retained_children(id);
        self.node_mut(id).children = retained;
        if !any_kept {
            self.node_mut(id).removed = true;
        }
        any_kept
    }

    fn retained_children(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id)
            .children
            .iter()
            .copied()
            .filter(|child| !self.node(*child).removed)
            .collect()
    }

    fn add_block(&mut self, super_block: &str, block: &Block) {
        let segments = path::segments(&block.path);
        let Some((last, ancestors)) = segments.split_last() else {
            return;
        };
        let parent = self.ensure_chain(self.root, ancestors);
        let parent_path = self.node(parent).path.clone();
        let mut node = ValueNode::new(
            child_path(&parent_path, &last.name),
            last.name.clone(),
            block.block_name(),
            0,
        );
        node.node_type = block.node_type.clone();
        node.strict = block.strict;
        node.multiplicity = block.multiplicity.clone();
        node.render = block.render.clone();
        node.super_block = Some(super_block.to_string());
        let block_id = self.insert_numbered(parent, node, last.stated);
        for field in &block.fields {
            self.add_field(block_id, field);
        }
    }

    fn add_field(&mut self, block_id: NodeId, field: &Field) {
        let block_path = self.node(block_id).path.clone();
        let field_segments = path::segments(&field.path);
        let plain_field = path::plain(&field.path);
        let block_segment_count = path::segments(&block_path).len();

        // A field addressing the block's own path makes the block a leaf:
        // its metadata lands on the block node itself.
        if plain_field == block_path {
            let node = self.node_mut(block_id);
            node.value = field.value.clone();
            node.default_value = field.default_value.clone();
            node.predefined_values = field.predefined_values.clone();
            node.completion = field.completion.clone();
            if node.node_type.is_none() {
                node.node_type = field.node_type.clone();
            }
            if node.render.is_none() {
                node.render = field.render.clone();
            }
            return;
        }

        let (base, relative): (NodeId, &[Segment]) = if plain_field
            .strip_prefix(block_path.as_str())
            .is_some_and(|rest| rest.starts_with('.'))
        {
            (block_id, &field_segments[block_segment_count..])
        } else {
            (self.root, &field_segments[..])
        };
        let Some((last, ancestors)) = relative.split_last() else {
            return;
        };
        let parent = self.ensure_chain(base, ancestors);
        let parent_path = self.node(parent).path.clone();
        let mut node = ValueNode::new(
            child_path(&parent_path, &last.name),
            last.name.clone(),
            field.field_name(),
            0,
        );
        node.node_type = field.node_type.clone();
        node.strict = field.strict;
        node.multiplicity = field.multiplicity.clone();
        node.render = field.render.clone();
        node.value = field.value.clone();
        node.default_value = field.default_value.clone();
        node.predefined_values = field.predefined_values.clone();
        node.completion = field.completion.clone();
        self.insert_numbered(parent, node, last.stated);
    }

    /// Walk (and synthesize where missing) the ancestor chain below `from`.
    ///
    /// An existing node is shared when its name and stated ordinal line up
    /// with the requested segment — numerated-path equality, since the walk
    /// already pins the lineage above it.
    fn ensure_chain(&mut self, from: NodeId, chain: &[Segment]) -> NodeId {
        let mut cursor = from;
        for segment in chain {
            let wanted_ordinal = match segment.stated {
                Some(Stated::At(ordinal)) => Some(ordinal),
                _ => None,
            };
            let found = self.children(cursor).into_iter().find(|child| {
                let candidate = self.node(*child);
                candidate.name == segment.name
                    && wanted_ordinal.is_none_or(|ordinal| candidate.ordinal == ordinal)
            });
            cursor = match found {
                Some(existing) => existing,
                None => {
                    let parent_path = self.node(cursor).path.clone();
                    let ordinal = wanted_ordinal.unwrap_or_else(|| {
                        self.count_siblings(cursor, &segment.name, &segment.name)
                    });
                    let node = ValueNode::new(
                        child_path(&parent_path, &segment.name),
                        segment.name.clone(),
                        segment.name.clone(),
                        ordinal,
                    );
                    self.attach(cursor, node)
                }
            };
        }
        cursor
    }

    /// Insert a node at its computed ordinal, renumbering when the document
    /// states a different position or asks for an appended instance.
    fn insert_numbered(
        &mut self,
        parent: NodeId,
        mut node: ValueNode,
        stated: Option<Stated>,
    ) -> NodeId {
        let computed = self.count_siblings(parent, &node.name, &node.block_name);
        let ordinal = match stated {
            Some(Stated::At(stated_ordinal)) if stated_ordinal != computed => {
                self.shift_following(parent, &node.name, &node.block_name, stated_ordinal);
                stated_ordinal
            }
            // An appendable block is always a fresh instance after every
            // existing sibling.
            Some(Stated::Append) | Some(Stated::At(_)) | None => computed,
        };
        node.ordinal = ordinal;
        self.attach(parent, node)
    }

    /// Move following: make room at `from` by shifting every sibling at or
    /// after it one ordinal up.
    fn shift_following(&mut self, parent: NodeId, name: &str, block_name: &str, from: usize) {
        for child in self.children(parent) {
            let candidate = self.node_mut(child);
            if candidate.name == name
                && candidate.block_name == block_name
                && candidate.ordinal >= from
            {
                candidate.ordinal += 1;
            }
        }
    }

    fn count_siblings(&self, parent: NodeId, name: &str, block_name: &str) -> usize {
        self.children(parent)
            .into_iter()
            .filter(|child| {
                let candidate = self.node(*child);
                candidate.name == name && candidate.block_name == block_name
            })
            .count()
    }

    fn attach(&mut self, parent: NodeId, mut node: ValueNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.parent = Some(parent);
        self.nodes.push(node);
        self.node_mut(parent).children.push(id);
        id
    }

    fn dfs(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if self.node(id).removed {
                continue;
            }
            order.push(id);
            for child in self.node(id).children.iter().rev() {
                stack.push(*child);
            }
        }
        order
    }

    fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if self.node(current).removed {
                continue;
            }
            order.push(current);
            for child in self.node(current).children.iter().rev() {
                stack.push(*child);
            }
        }
        order
    }
}

fn child_path(parent_path: &str, name: &str) -> String {
    if parent_path.is_empty() {
        name.to_string()
    } else {
        format!("{parent_path}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::TemplateDocument;
    use serde_json::json;

    fn document(raw: serde_json::Value) -> TemplateDocument {
        TemplateDocument::from_value(&raw).unwrap()
    }

    fn contact_form() -> TemplateDocument {
        document(json!({
            "superBlocks": [
                {
                    "name": "Identification",
                    "blocks": [
                        {
                            "path": "identification.pointOfContact",
                            "fields": [
                                { "path": "identification.pointOfContact.individualName", "value": "Ada" }
                            ]
                        },
                        {
                            "path": "identification.pointOfContact",
                            "fields": [
                                { "path": "identification.pointOfContact.individualName", "value": "Grace" }
                            ]
                        }
                    ]
                }
            ]
        }))
    }

    #[test]
    fn sibling_blocks_get_running_ordinals_and_share_ancestors() {
        let tree = TemplateTree::build(&contact_form());
        let contacts = tree.nodes_at_path("identification.pointOfContact");
        assert_eq!(contacts.len(), 2);
        assert_eq!(tree.node(contacts[0]).ordinal, 0);
        assert_eq!(tree.node(contacts[1]).ordinal, 1);
        // One synthesized identification ancestor, shared by both blocks.
        assert_eq!(tree.nodes_at_path("identification").len(), 1);
        assert_eq!(
            tree.numerated_path(contacts[1]),
            "identification[0].pointOfContact[1]"
        );
    }

    #[test]
    fn exactly_one_root_exists() {
        let tree = TemplateTree::build(&contact_form());
        let roots = tree
            .nodes()
            .filter(|(_, node)| node.parent.is_none())
            .count();
        assert_eq!(roots, 0);
        assert!(tree.node(tree.root()).parent.is_none());
    }

    #[test]
    fn stated_ordinal_mismatch_renumbers_with_move_following() {
        let doc = document(json!({
            "superBlocks": [
                {
                    "name": "Identification",
                    "blocks": [
                        { "path": "identification.extent", "fields": [] },
                        { "path": "identification.extent[0]", "fields": [] }
                    ]
                }
            ]
        }));
        let tree = TemplateTree::build(&doc);
        let extents = tree.nodes_at_path("identification.extent");
        assert_eq!(extents.len(), 2);
        // The second block claimed slot 0; the first one moved up.
        assert_eq!(tree.node(extents[0]).ordinal, 1);
        assert_eq!(tree.node(extents[1]).ordinal, 0);
    }

    #[test]
    fn appendable_blocks_become_fresh_trailing_instances() {
        let doc = document(json!({
            "superBlocks": [
                {
                    "name": "Identification",
                    "blocks": [
                        { "path": "identification.extent", "fields": [] },
                        { "path": "identification.extent[+]", "fields": [] }
                    ]
                }
            ]
        }));
        let tree = TemplateTree::build(&doc);
        let extents = tree.nodes_at_path("identification.extent");
        assert_eq!(extents.len(), 2);
        assert_eq!(tree.node(extents[1]).ordinal, 1);
    }

    #[test]
    fn numerated_lookup_honours_block_name_qualifier() {
        let doc = document(json!({
            "superBlocks": [
                {
                    "name": "Extent",
                    "blocks": [
                        { "path": "identification.extent", "blockName": "temporal", "fields": [] },
                        { "path": "identification.extent", "blockName": "spatial", "fields": [] }
                    ]
                }
            ]
        }));
        let tree = TemplateTree::build(&doc);
        let temporal = tree
            .node_at_numerated_path("identification[0].extent[0]", Some("temporal"))
            .unwrap();
        assert_eq!(tree.node(temporal).block_name, "temporal");
        // Both block names sit at ordinal 0 of their own group.
        let spatial = tree
            .node_at_numerated_path("identification[0].extent[0]", Some("spatial"))
            .unwrap();
        assert_ne!(temporal, spatial);
        assert!(
            tree.node_at_numerated_path("identification[0].extent[0]", Some("vertical"))
                .is_none()
        );
    }

    #[test]
    fn fields_nest_under_their_block_via_path_extension() {
        let tree = TemplateTree::build(&contact_form());
        let contact = tree.nodes_at_path("identification.pointOfContact")[0];
        let children = tree.children(contact);
        assert_eq!(children.len(), 1);
        let field = tree.node(children[0]);
        assert!(field.is_field());
        assert_eq!(field.value.as_deref(), Some("Ada"));
        assert_eq!(field.path, "identification.pointOfContact.individualName");
    }

    #[test]
    fn prune_removes_empty_fields_then_empty_ancestors() {
        let doc = document(json!({
            "superBlocks": [
                {
                    "name": "Identification",
                    "blocks": [
                        {
                            "path": "identification.citation",
                            "fields": [
                                { "path": "identification.citation.title", "value": "" },
                                { "path": "identification.citation.edition" }
                            ]
                        },
                        {
                            "path": "identification.pointOfContact",
                            "fields": [
                                { "path": "identification.pointOfContact.individualName", "value": "Ada" }
                            ]
                        }
                    ]
                }
            ]
        }));
        let mut tree = TemplateTree::build(&doc);
        tree.prune();
        assert!(tree.node_at_path("identification.citation.title").is_none());
        assert!(tree.node_at_path("identification.citation").is_none());
        let kept = tree
            .node_at_path("identification.pointOfContact.individualName")
            .unwrap();
        assert_eq!(tree.node(kept).value.as_deref(), Some("Ada"));
    }

    #[test]
    fn merged_document_reports_final_numerated_paths() {
        let tree = TemplateTree::build(&contact_form());
        let merged = tree.merged_document();
        assert_eq!(merged.super_blocks.len(), 1);
        let blocks = &merged.super_blocks[0].blocks;
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].path, "identification[0].pointOfContact[0]");
        assert_eq!(blocks[1].path, "identification[0].pointOfContact[1]");
        assert_eq!(
            blocks[1].fields[0].path,
            "identification[0].pointOfContact[1].individualName[0]"
        );
        assert_eq!(blocks[1].fields[0].value.as_deref(), Some("Grace"));
    }

    #[test]
    fn nodes_for_block_and_field_support_the_writer_direction() {
        let tree = TemplateTree::build(&contact_form());
        let block = Block {
            path: "identification.pointOfContact".to_string(),
            ..Block::default()
        };
        let block_nodes = tree.nodes_for_block(&block);
        assert_eq!(block_nodes.len(), 2);
        let field = Field {
            path: "identification.pointOfContact.individualName".to_string(),
            ..Field::default()
        };
        let field_nodes = tree.nodes_for_field(&field, block_nodes[0]);
        assert_eq!(field_nodes.len(), 1);
        assert_eq!(tree.node(field_nodes[0]).value.as_deref(), Some("Ada"));
    }
}
