//! Tri-state checkbox conduction.
//!
//! Given the keys a user wants fully checked, [`conduct`] computes the
//! complete, consistent checkbox state for the whole tree:
//!
//! 1. **Downward fill.** Every checkable descendant of a checked, checkable
//!    node becomes checked. Conduction stops at check-disabled nodes (see
//!    [`TreeNode::is_check_disabled`]); they keep whatever state they were
//!    seeded with.
//! 2. **Upward aggregation.** Deepest level first, each parent becomes
//!    checked when all of its checkable children are checked, and
//!    half-checked when any child (checkable or not) is checked or
//!    half-checked without the parent being fully checked. A check-disabled
//!    parent is never re-derived but still reports half-checked so its own
//!    ancestors see the mixed state.
//!
//! Unchecking is not a local patch. [`toggle`] first fills with the key
//! added, then re-runs conduction in [`ConductMode::Clean`] with the key
//! removed so every ancestor is recomputed against the full remaining set.
//!
//! # Invariants
//!
//! After every call:
//! - `checked` and `half_checked` are disjoint.
//! - Every ancestor of a checked node is checked or half-checked.
//! - A leaf is never half-checked.
//! - Re-conducting the resulting `checked` set yields the same result.
//!
//! Keys absent from the index are dropped with a warning.
//!
//! [`TreeNode::is_check_disabled`]: crate::node::TreeNode::is_check_disabled

use ahash::AHashSet;

use crate::entity::{EntityId, EntityIndex};
use crate::key::{KeyList, TreeKey};

/// How requested keys are applied.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConductMode {
    /// Requested keys are checked and their subtrees filled.
    #[default]
    Fill,
    /// Requested keys are the desired final checked set after one key was
    /// removed from a previous result. `half_checked` is that previous
    /// result's half-checked set; nodes outside both sets have their
    /// checkable children cleared.
    Clean { half_checked: KeyList },
}

/// Checkbox state of a whole tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckState {
    pub checked: KeyList,
    pub half_checked: KeyList,
}

impl CheckState {
    #[must_use]
    pub fn is_checked(&self, key: &TreeKey) -> bool {
        self.checked.contains(key)
    }

    #[must_use]
    pub fn is_half_checked(&self, key: &TreeKey) -> bool {
        self.half_checked.contains(key)
    }
}

/// Run conduction over `requested`.
#[must_use]
pub fn conduct(requested: &KeyList, mode: &ConductMode, index: &EntityIndex) -> CheckState {
    let mut checked = resolve(requested, index);
    let previous_half = match mode {
        ConductMode::Fill => None,
        ConductMode::Clean { half_checked } => Some(resolve(half_checked, index)),
    };

    // Top-down.
    for level in index.levels() {
        for &id in level {
            if index.node(id).is_check_disabled() {
                continue;
            }
            let children = index.entity(id).children().iter().copied();
            let conductible = children.filter(|&c| !index.node(c).is_check_disabled());
            match &previous_half {
                None if checked.contains(&id) => checked.extend(conductible),
                Some(half) if !checked.contains(&id) && !half.contains(&id) => {
                    for child in conductible {
                        checked.remove(&child);
                    }
                }
                _ => {}
            }
        }
    }

    // Bottom-up.
    let mut half = AHashSet::new();
    for level in index.levels().iter().rev() {
        for &id in level {
            let entity = index.entity(id);
            if !entity.has_children() {
                continue;
            }

            let mut any_checkable = false;
            let mut all_checked = true;
            let mut partial = false;
            for &child in entity.children() {
                let child_checked = checked.contains(&child);
                if !index.node(child).is_check_disabled() {
                    any_checkable = true;
                    all_checked &= child_checked;
                }
                partial |= child_checked || half.contains(&child);
            }

            if any_checkable && !index.node(id).is_check_disabled() {
                if all_checked {
                    checked.insert(id);
                } else if previous_half.is_some() {
                    checked.remove(&id);
                }
            }
            if partial && !checked.contains(&id) {
                half.insert(id);
            }
        }
    }

    let state = CheckState {
        checked: collect(index, &checked),
        half_checked: collect(index, &half),
    };
    tracing::debug!(
        message = "tree.conduct",
        requested = requested.len(),
        checked = state.checked.len(),
        half_checked = state.half_checked.len(),
    );
    state
}

/// Apply one checkbox click in propagating mode.
///
/// Checking fills from `current.checked` plus `key`. Unchecking runs the
/// same fill, then removes `key` and re-conducts in clean mode.
#[must_use]
pub fn toggle(
    current: &CheckState,
    key: &TreeKey,
    checked: bool,
    index: &EntityIndex,
) -> CheckState {
    let filled = conduct(&current.checked.with(key.clone()), &ConductMode::Fill, index);
    if checked {
        return filled;
    }
    conduct(
        &filled.checked.without(key),
        &ConductMode::Clean {
            half_checked: filled.half_checked,
        },
        index,
    )
}

/// Apply one checkbox click in strict mode: no propagation at all.
#[must_use]
pub fn toggle_strict(current: &CheckState, key: &TreeKey, checked: bool) -> CheckState {
    let checked_keys = if checked {
        current.checked.with(key.clone())
    } else {
        current.checked.without(key)
    };
    CheckState {
        checked: checked_keys,
        half_checked: current.half_checked.without(key),
    }
}

fn resolve(keys: &KeyList, index: &EntityIndex) -> AHashSet<EntityId> {
    let mut ids = AHashSet::with_capacity(keys.len());
    for key in keys {
        match index.id_of(key) {
            Some(id) => {
                ids.insert(id);
            }
            None => tracing::warn!(message = "tree.unknown_key", key = %key),
        }
    }
    ids
}

fn collect(index: &EntityIndex, ids: &AHashSet<EntityId>) -> KeyList {
    let mut sorted: Vec<EntityId> = ids.iter().copied().collect();
    sorted.sort_unstable();
    sorted
        .into_iter()
        .map(|id| index.entity(id).key().clone())
        .collect()
}
