//! Per-pass claim ledger.
//!
//! Prevents two sibling form groups from claiming the same domain
//! sub-object. Claims are addressed by `(owner path, slot index)` — the
//! numerated path of the owning collection plus the element's backing
//! position — rather than by object identity, so a claim survives in-place
//! mutation of the element it covers.
//!
//! One ledger lives for exactly one reconciliation pass.

use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Default, Clone)]
pub struct ReservedObjects {
    claims: BTreeMap<String, BTreeMap<String, BTreeSet<usize>>>,
}

impl ReservedObjects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a slot of `owner` for the given block name.
    pub fn reserve(&mut self, owner: &str, block_name: &str, slot: usize) {
        self.claims
            .entry(owner.to_string())
            .or_default()
            .entry(block_name.to_string())
            .or_default()
            .insert(slot);
    }

    /// Whether a slot is already claimed by a block other than this one.
    pub fn reserved_by_other(&self, owner: &str, block_name: &str, slot: usize) -> bool {
        let Some(by_block) = self.claims.get(owner) else {
            return false;
        };
        by_block
            .iter()
            .any(|(claimant, slots)| claimant != block_name && slots.contains(&slot))
    }

    /// Slots claimed by one block of an owner.
    pub fn claims(&self, owner: &str, block_name: &str) -> BTreeSet<usize> {
        self.claims
            .get(owner)
            .and_then(|by_block| by_block.get(block_name))
            .cloned()
            .unwrap_or_default()
    }

    /// Keep claims valid after the backing collection dropped the element
    /// at `removed`: claims on it disappear, later slots shift down.
    pub fn shift_after_removal(&mut self, owner: &str, removed: usize) {
        let Some(by_block) = self.claims.get_mut(owner) else {
            return;
        };
        for slots in by_block.values_mut() {
            *slots = slots
                .iter()
                .filter(|&&slot| slot != removed)
                .map(|&slot| if slot > removed { slot - 1 } else { slot })
                .collect();
        }
    }
}
