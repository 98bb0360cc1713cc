//! The reconciliation algorithm: pushes template values into the domain
//! object graph.
//!
//! The pass walks the form tree depth-first. At each group level it first
//! reorders polymorphic sibling collections so ordinal addressing works
//! (an intentional mutation of the domain graph, see
//! [`TemplateReader::reconcile`]), then resolves every child node against
//! the live value, strips stale surplus elements, and writes or recurses.
//!
//! A reader owns its claim ledger and literal converter; both live for one
//! pass only.

use formwork_model::{LiteralConverter, LiteralPolicy, Record, TypeRef, TypeRegistry, Value};
use tracing::{debug, warn};

use crate::error::MappingError;
use crate::node::{NodeId, ValueNode};
use crate::numerated::NumeratedCollection;
use crate::path;
use crate::reserved::ReservedObjects;
use crate::tree::TemplateTree;

/// Per-pass configuration.
#[derive(Debug, Clone, Default)]
pub struct ReaderOptions {
    pub literal_policy: LiteralPolicy,
}

/// One reconciliation pass over one domain object graph.
pub struct TemplateReader<'a> {
    registry: &'a TypeRegistry,
    converter: LiteralConverter<'a>,
    reserved: ReservedObjects,
}

impl<'a> TemplateReader<'a> {
    pub fn new(registry: &'a TypeRegistry, options: ReaderOptions) -> Self {
        Self {
            registry,
            converter: LiteralConverter::new(registry, options.literal_policy),
            reserved: ReservedObjects::new(),
        }
    }

    /// Reconcile the template tree into `root`, mutating it in place.
    ///
    /// Side effect: sibling groups that disambiguate one property by type
    /// or strict predicate have that property's collection reordered (and
    /// narrowed to the matched elements) before values are applied. This
    /// happens even for parts of the form that carry no values.
    pub fn reconcile(
        &mut self,
        tree: &TemplateTree,
        root: &mut Record,
    ) -> Result<(), MappingError> {
        let type_id = root.type_id().clone();
        let mut value = Value::Record(std::mem::replace(root, Record::new(type_id)));
        let result = self.apply_group(tree, tree.root(), &mut value, "");
        if let Value::Record(record) = value {
            *root = record;
        }
        result
    }

    fn apply_group(
        &mut self,
        tree: &TemplateTree,
        group_id: NodeId,
        receiver: &mut Value,
        group_numerated: &str,
    ) -> Result<(), MappingError> {
        self.reorder_sibling_groups(tree, group_id, receiver, group_numerated)?;
        for child in tree.children(group_id) {
            self.apply_node(tree, child, receiver, group_numerated)?;
        }
        Ok(())
    }

    /// Merge polymorphic sibling collections into ordinal order before any
    /// value is applied at this level.
    fn reorder_sibling_groups(
        &mut self,
        tree: &TemplateTree,
        group_id: NodeId,
        receiver: &mut Value,
        group_numerated: &str,
    ) -> Result<(), MappingError> {
        let Some(record) = receiver.as_record_mut() else {
            return Ok(());
        };
        let children = tree.children(group_id);
        let mut handled: Vec<String> = Vec::new();
        for &child in &children {
            let name = tree.node(child).name.clone();
            if handled.contains(&name) {
                continue;
            }
            handled.push(name.clone());

            let group_nodes: Vec<NodeId> = children
                .iter()
                .copied()
                .filter(|id| {
                    let node = tree.node(*id);
                    node.name == name
                        && !node.is_field()
                        && (node.strict || node.node_type.is_some())
                })
                .collect();
            let mut block_names: Vec<&str> = group_nodes
                .iter()
                .map(|id| tree.node(*id).block_name.as_str())
                .collect();
            block_names.sort_unstable();
            block_names.dedup();
            if group_nodes.len() < 2 || block_names.len() < 2 {
                continue;
            }

            // Resolution against a throwaway scope: claims made here must
            // not leak into the real pass.
            let mut scratch = ReservedObjects::new();
            let owner = owner_key(group_numerated, &name);
            let mut merged: Vec<usize> = Vec::new();
            for node_id in &group_nodes {
                let accepted = Self::resolve_collection(
                    self.registry,
                    &self.converter,
                    tree,
                    *node_id,
                    record,
                    &owner,
                    &mut scratch,
                )?;
                for &position in accepted.positions() {
                    if !merged.contains(&position) {
                        merged.push(position);
                    }
                }
            }
            let values = record.get_mut(&name);
            let old = std::mem::take(values);
            *values = merged.iter().filter_map(|&idx| old.get(idx).cloned()).collect();
        }
        Ok(())
    }

    fn apply_node(
        &mut self,
        tree: &TemplateTree,
        n_id: NodeId,
        receiver: &mut Value,
        owner_numerated: &str,
    ) -> Result<(), MappingError> {
        let n = tree.node(n_id).clone();
        if receiver.is_primitive_like() {
            return self.apply_to_part(&n, receiver);
        }
        let numerated = path::join_numerated(owner_numerated, &n.name, n.ordinal);
        let Some(record) = receiver.as_record_mut() else {
            return Ok(());
        };

        // A registered type that does not declare the property has no
        // accessor for it: skip this single node, keep the pass alive.
        let property = self.registry.property_type(record.type_id(), &n.name).cloned();
        if self.registry.knows(record.type_id()) && property.is_none() {
            warn!(
                property = %n.name,
                type_id = %record.type_id(),
                "no accessor for property, skipping node"
            );
            return Ok(());
        }

        let sibling_count = tree.sibling_count(n_id);
        let is_collection = property.as_ref().is_some_and(|spec| spec.multiple)
            || sibling_count > 1
            || record.get(&n.name).len() > 1;
        let owner = owner_key(owner_numerated, &n.name);

        if is_collection {
            self.apply_to_collection(tree, n_id, &n, record, &owner, &numerated, sibling_count)
        } else {
            self.apply_to_scalar(tree, n_id, &n, record, &numerated)
        }
    }

    /// Apply one node to a multi-valued property: strip to the sibling
    /// count, then write or recurse at this node's ordinal.
    #[allow(clippy::too_many_arguments)]
    fn apply_to_collection(
        &mut self,
        tree: &TemplateTree,
        n_id: NodeId,
        n: &ValueNode,
        record: &mut Record,
        owner: &str,
        numerated: &str,
        sibling_count: usize,
    ) -> Result<(), MappingError> {
        let mut accepted = Self::resolve_collection(
            self.registry,
            &self.converter,
            tree,
            n_id,
            record,
            owner,
            &mut self.reserved,
        )?;

        // Surplus elements from a previous state of the record are
        // discarded; ordinals 0..sibling_count stay addressable because
        // accepted positions are in increasing backing order.
        for position in accepted.truncate(sibling_count) {
            let values = record.get_mut(&n.name);
            if position < values.len() {
                values.remove(position);
            }
            self.reserved.shift_after_removal(owner, position);
        }

        match accepted.position(n.ordinal) {
            Some(position) if n.is_field() => {
                let Some(literal) = n.value.clone() else {
                    return Ok(());
                };
                let existing = record.get(&n.name).get(position).cloned();
                let target = existing
                    .as_ref()
                    .and_then(Value::runtime_type)
                    .map(Ok)
                    .or_else(|| self.resolve_node_type(n, record).transpose())
                    .transpose()?;
                let converted = self.convert_literal(n, target.as_ref(), &literal)?;
                if let Some(value) = converted {
                    accepted.replace(record.get_mut(&n.name), n.ordinal, value);
                }
                Ok(())
            }
            Some(position) => {
                let values = record.get_mut(&n.name);
                if let Some(element) = values.get_mut(position) {
                    self.apply_group(tree, n_id, element, numerated)?;
                }
                Ok(())
            }
            None if n.is_field() => {
                // Duplicate-field suppression: of several same-named,
                // differently-typed fields only the first is written.
                if tree.earlier_sibling_other_block(n_id) {
                    return Ok(());
                }
                let Some(literal) = n.value.clone() else {
                    return Ok(());
                };
                let target = self.resolve_node_type(n, record)?;
                if let Some(value) = self.convert_literal(n, target.as_ref(), &literal)? {
                    let values = record.get_mut(&n.name);
                    values.push(value);
                    self.reserved.reserve(owner, &n.block_name, values.len() - 1);
                }
                Ok(())
            }
            None => {
                let Some(type_ref) = self.resolve_node_type(n, record)? else {
                    debug!(path = %n.path, "no resolvable type for template group, skipping subtree");
                    return Ok(());
                };
                let instance = self.registry.create(&type_ref)?;
                let values = record.get_mut(&n.name);
                values.push(instance);
                let position = values.len() - 1;
                self.reserved.reserve(owner, &n.block_name, position);
                if let Some(element) = record.get_mut(&n.name).get_mut(position) {
                    self.apply_group(tree, n_id, element, numerated)?;
                }
                Ok(())
            }
        }
    }

    /// Apply one node to a single-valued property.
    fn apply_to_scalar(
        &mut self,
        tree: &TemplateTree,
        n_id: NodeId,
        n: &ValueNode,
        record: &mut Record,
        numerated: &str,
    ) -> Result<(), MappingError> {
        if n.is_field() {
            if tree.earlier_sibling_other_block(n_id) {
                return Ok(());
            }
            let Some(literal) = n.value.clone() else {
                return Ok(());
            };
            let target = record
                .first(&n.name)
                .and_then(Value::runtime_type)
                .map(Ok)
                .or_else(|| self.resolve_node_type(n, record).transpose())
                .transpose()?;
            if let Some(value) = self.convert_literal(n, target.as_ref(), &literal)? {
                record.set(&n.name, value);
            }
            return Ok(());
        }

        let present = record
            .first(&n.name)
            .is_some_and(|value| !matches!(value, Value::Null));
        if present {
            if let Some(existing) = record.first_mut(&n.name) {
                // Split the borrow: recursing needs the element and self.
                let mut taken = std::mem::take(existing);
                let result = self.apply_group(tree, n_id, &mut taken, numerated);
                if let Some(slot) = record.first_mut(&n.name) {
                    *slot = taken;
                }
                return result;
            }
        }
        let Some(type_ref) = self.resolve_node_type(n, record)? else {
            debug!(path = %n.path, "no resolvable type for template group, skipping subtree");
            return Ok(());
        };
        let mut instance = self.registry.create(&type_ref)?;
        self.apply_group(tree, n_id, &mut instance, numerated)?;
        record.set(&n.name, instance);
        Ok(())
    }

    /// Fields addressed on primitive-like wrappers go through named parts.
    fn apply_to_part(&mut self, n: &ValueNode, receiver: &mut Value) -> Result<(), MappingError> {
        if !n.is_field() {
            debug!(path = %n.path, "group node under a primitive-like value, skipping");
            return Ok(());
        }
        let Some(literal) = n.value.clone() else {
            return Ok(());
        };
        let Some(target) = part_target(receiver, &n.name) else {
            warn!(property = %n.name, "no accessor for part, skipping node");
            return Ok(());
        };
        if let Some(converted) = self.converter.convert(&n.path, &target, &literal)? {
            if !receiver.set_part(&n.name, converted) {
                warn!(property = %n.name, "no mutator for part, skipping node");
            }
        }
        Ok(())
    }

    /// Resolve the elements of `record.{n.name}` this node accepts.
    ///
    /// Strict nodes take only full recursive predicate matches; typed nodes
    /// take runtime-type equals; plain nodes take whatever no other block
    /// has claimed. Accepted elements are claimed in `reserved`.
    fn resolve_collection(
        registry: &TypeRegistry,
        converter: &LiteralConverter<'_>,
        tree: &TemplateTree,
        n_id: NodeId,
        record: &Record,
        owner: &str,
        reserved: &mut ReservedObjects,
    ) -> Result<NumeratedCollection, MappingError> {
        let n = tree.node(n_id);
        let mut accepted = Vec::new();
        for (index, element) in record.get(&n.name).iter().enumerate() {
            if reserved.reserved_by_other(owner, &n.block_name, index) {
                continue;
            }
            let matches = if n.strict {
                Self::matches_strict(registry, converter, tree, n_id, element)?
            } else if let Some(type_name) = &n.node_type {
                Self::type_compatible(registry, type_name, element)?
            } else {
                true
            };
            if matches {
                accepted.push(index);
                reserved.reserve(owner, &n.block_name, index);
            }
        }
        Ok(NumeratedCollection::new(accepted))
    }

    /// Full recursive predicate match for strict nodes.
    fn matches_strict(
        registry: &TypeRegistry,
        converter: &LiteralConverter<'_>,
        tree: &TemplateTree,
        n_id: NodeId,
        element: &Value,
    ) -> Result<bool, MappingError> {
        let n = tree.node(n_id);
        if let Some(type_name) = &n.node_type {
            if !Self::type_compatible(registry, type_name, element)? {
                return Ok(false);
            }
        }
        if n.is_field() && n.is_readonly() {
            if let Some(default) = &n.default_value {
                if !Self::equals_converted(converter, &n.path, element, default) {
                    return Ok(false);
                }
            }
        }
        if !n.predefined_values.is_empty()
            && !n
                .predefined_values
                .iter()
                .any(|candidate| Self::equals_converted(converter, &n.path, element, candidate))
        {
            return Ok(false);
        }
        for child in tree.children(n_id) {
            // A constraint-free subtree matches vacuously; requiring its
            // presence would reject every not-yet-filled record.
            if !Self::subtree_has_constraints(tree, child) {
                continue;
            }
            if !Self::child_matches(registry, converter, tree, child, element)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Resolve one child node against the corresponding property of a
    /// candidate element and match it recursively.
    fn child_matches(
        registry: &TypeRegistry,
        converter: &LiteralConverter<'_>,
        tree: &TemplateTree,
        child_id: NodeId,
        element: &Value,
    ) -> Result<bool, MappingError> {
        let child = tree.node(child_id);
        match element {
            Value::Record(record) => {
                let candidates = record.get(&child.name);
                if candidates.is_empty() {
                    return Ok(false);
                }
                for candidate in candidates {
                    if Self::matches_strict(registry, converter, tree, child_id, candidate)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            primitive => match primitive.part(&child.name) {
                Some(part) if !matches!(part, Value::Null) => {
                    Self::matches_strict(registry, converter, tree, child_id, &part)
                }
                _ => Ok(false),
            },
        }
    }

    fn subtree_has_constraints(tree: &TemplateTree, id: NodeId) -> bool {
        if tree.node(id).has_own_constraints() {
            return true;
        }
        tree.children(id)
            .into_iter()
            .any(|child| Self::subtree_has_constraints(tree, child))
    }

    fn type_compatible(
        registry: &TypeRegistry,
        type_name: &str,
        element: &Value,
    ) -> Result<bool, MappingError> {
        let declared = registry.resolve(type_name)?;
        let preferred = registry.specialized(&declared);
        Ok(element
            .runtime_type()
            .is_some_and(|runtime| runtime == declared || runtime == preferred))
    }

    /// Compare a domain element against a literal converted to the
    /// element's own type. A candidate that cannot represent the literal
    /// is not a match; matching is a predicate and never aborts the pass.
    fn equals_converted(
        converter: &LiteralConverter<'_>,
        property: &str,
        element: &Value,
        literal: &str,
    ) -> bool {
        let Some(target) = element.runtime_type() else {
            return false;
        };
        matches!(
            converter.convert(property, &target, literal),
            Ok(Some(converted)) if converted == *element
        )
    }

    /// The expected type of this node's value: the declared hint first,
    /// then the receiver's property type, both substituted through the
    /// specialization table.
    fn resolve_node_type(
        &self,
        n: &ValueNode,
        record: &Record,
    ) -> Result<Option<TypeRef>, MappingError> {
        if let Some(type_name) = &n.node_type {
            let resolved = self.registry.resolve(type_name)?;
            return Ok(Some(self.registry.specialized(&resolved)));
        }
        if let Some(spec) = self.registry.property_type(record.type_id(), &n.name) {
            return Ok(Some(self.registry.specialized(&spec.type_ref)));
        }
        Ok(None)
    }

    /// Convert a field literal, falling back to the raw string when no
    /// target type is resolvable.
    fn convert_literal(
        &self,
        n: &ValueNode,
        target: Option<&TypeRef>,
        literal: &str,
    ) -> Result<Option<Value>, MappingError> {
        match target {
            Some(type_ref) => Ok(self.converter.convert(&n.path, type_ref, literal)?),
            None => Ok(Some(Value::Str(literal.to_string()))),
        }
    }
}

fn owner_key(owner_numerated: &str, name: &str) -> String {
    if owner_numerated.is_empty() {
        name.to_string()
    } else {
        format!("{owner_numerated}.{name}")
    }
}

fn part_target(receiver: &Value, name: &str) -> Option<TypeRef> {
    match receiver {
        Value::Period { .. }
            if matches!(name, "begin" | "beginPosition" | "end" | "endPosition") =>
        {
            Some(TypeRef::Instant)
        }
        Value::ReferenceSystem { .. } if name == "code" => Some(TypeRef::Str),
        Value::Instant(_) if name == "position" => Some(TypeRef::Instant),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::TemplateDocument;
    use formwork_model::{TypeId, TypeSpec};
    use serde_json::json;

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry.register(
            TypeSpec::new("MD_Metadata")
                .property_list("contact", TypeRef::Record(TypeId::from("CI_Responsibility")))
                .property("dateStamp", TypeRef::Date)
                .property("referenceSystemInfo", TypeRef::ReferenceSystem),
        );
        registry.register(
            TypeSpec::new("CI_Responsibility")
                .property("individualName", TypeRef::Str)
                .property("role", TypeRef::CodeList("CI_RoleCode".to_string())),
        );
        registry.register_code_list("CI_RoleCode", ["pointOfContact", "author"]);
        registry
    }

    fn reconcile(raw: serde_json::Value, record: &mut Record) -> Result<(), MappingError> {
        let document = TemplateDocument::from_value(&raw).unwrap();
        let tree = TemplateTree::build(&document);
        let registry = registry();
        let mut reader = TemplateReader::new(&registry, ReaderOptions::default());
        reader.reconcile(&tree, record)
    }

    #[test]
    fn writes_a_scalar_field_through_conversion() {
        let mut record = Record::new(TypeId::from("MD_Metadata"));
        reconcile(
            json!({
                "superBlocks": [{
                    "name": "Metadata",
                    "blocks": [{
                        "path": "dateStamp",
                        "fields": [{ "path": "dateStamp", "value": "2021-07-01" }]
                    }]
                }]
            }),
            &mut record,
        )
        .unwrap();
        match record.first("dateStamp") {
            Some(Value::Date(at)) => assert_eq!(at.to_rfc3339(), "2021-07-01T00:00:00+00:00"),
            other => panic!("unexpected dateStamp: {other:?}"),
        }
    }

    #[test]
    fn creates_missing_groups_from_property_types() {
        let mut record = Record::new(TypeId::from("MD_Metadata"));
        reconcile(
            json!({
                "superBlocks": [{
                    "name": "Contacts",
                    "blocks": [{
                        "path": "contact",
                        "fields": [
                            { "path": "contact.individualName", "value": "Ada" },
                            { "path": "contact.role", "value": "role.author" }
                        ]
                    }]
                }]
            }),
            &mut record,
        )
        .unwrap();
        let contacts = record.get("contact");
        assert_eq!(contacts.len(), 1);
        let contact = contacts[0].as_record().unwrap();
        assert_eq!(contact.type_id(), &TypeId::from("CI_Responsibility"));
        assert_eq!(
            contact.first("individualName"),
            Some(&Value::Str("Ada".to_string()))
        );
        assert_eq!(
            contact.first("role"),
            Some(&Value::CodeEntry {
                list: "CI_RoleCode".to_string(),
                code: "author".to_string(),
            })
        );
    }

    #[test]
    fn unknown_properties_on_known_types_are_skipped_not_fatal() {
        let mut record = Record::new(TypeId::from("MD_Metadata"));
        reconcile(
            json!({
                "superBlocks": [{
                    "name": "Metadata",
                    "blocks": [{
                        "path": "shoeSize",
                        "fields": [{ "path": "shoeSize", "value": "47" }]
                    }]
                }]
            }),
            &mut record,
        )
        .unwrap();
        assert!(record.get("shoeSize").is_empty());
    }

    #[test]
    fn unknown_type_identifiers_abort_the_pass() {
        let mut record = Record::new(TypeId::from("MD_Metadata"));
        let err = reconcile(
            json!({
                "superBlocks": [{
                    "name": "Metadata",
                    "blocks": [{
                        "path": "contact",
                        "type": "CI_TimeTraveller",
                        "fields": [{ "path": "contact.individualName", "value": "Ada" }]
                    }]
                }]
            }),
            &mut record,
        )
        .unwrap_err();
        assert!(err.to_string().contains("CI_TimeTraveller"));
    }

    #[test]
    fn strict_nodes_claim_only_predicate_matching_elements() {
        let mut record = Record::new(TypeId::from("MD_Metadata"));
        for code in ["pointOfContact", "author"] {
            record.push(
                "contact",
                Value::Record(
                    Record::new(TypeId::from("CI_Responsibility"))
                        .with("individualName", Value::Str(format!("old-{code}")))
                        .with(
                            "role",
                            Value::CodeEntry {
                                list: "CI_RoleCode".to_string(),
                                code: code.to_string(),
                            },
                        ),
                ),
            );
        }
        reconcile(
            json!({
                "superBlocks": [{
                    "name": "Contacts",
                    "blocks": [{
                        "path": "contact",
                        "blockName": "authorContact",
                        "strict": true,
                        "fields": [
                            {
                                "path": "contact.role",
                                "render": "readonly",
                                "defaultValue": "author"
                            },
                            { "path": "contact.individualName", "value": "Grace" }
                        ]
                    }]
                }]
            }),
            &mut record,
        )
        .unwrap();
        let contacts = record.get("contact");
        assert_eq!(contacts.len(), 2, "the unmatched contact survives");
        let untouched = contacts[0].as_record().unwrap();
        let claimed = contacts[1].as_record().unwrap();
        assert_eq!(
            untouched.first("individualName"),
            Some(&Value::Str("old-pointOfContact".to_string()))
        );
        assert_eq!(
            claimed.first("individualName"),
            Some(&Value::Str("Grace".to_string()))
        );
    }

    #[test]
    fn parts_of_primitive_wrappers_are_written_by_name() {
        let mut record = Record::new(TypeId::from("MD_Metadata"));
        record.set("referenceSystemInfo", Value::ReferenceSystem { code: None });
        reconcile(
            json!({
                "superBlocks": [{
                    "name": "Reference",
                    "blocks": [{
                        "path": "referenceSystemInfo",
                        "fields": [{ "path": "referenceSystemInfo.code", "value": "EPSG:4326" }]
                    }]
                }]
            }),
            &mut record,
        )
        .unwrap();
        assert_eq!(
            record.first("referenceSystemInfo"),
            Some(&Value::ReferenceSystem {
                code: Some("EPSG:4326".to_string())
            })
        );
    }
}
