//! Controlled/uncontrolled state reconciliation.
//!
//! The tree keeps five logical state slices: expanded keys, selected keys,
//! checked (plus half-checked) keys, loaded keys, and the active key. Each
//! slice is independently either
//!
//! - **controlled**: the host supplies its value in [`TreeProps`] every
//!   cycle. Gestures still compute the new value (it goes out in the
//!   notification) but never store it; the slice keeps the host's value
//!   until the host sends another.
//! - **uncontrolled**: the tree owns the value. Gestures store their result
//!   immediately.
//!
//! [`StateReconciler::update`] runs once per host update cycle and applies
//! the derivation chain in dependency order:
//!
//! 1. tree data changed (by pointer identity) → rebuild the entity index
//! 2. index or expansion changed → re-flatten the visible rows
//! 3. index or checked input changed → re-run checkbox conduction
//! 4. selection input changed → re-derive the selection, truncated to one
//!    key in single-select mode
//!
//! An input is only re-derived when it differs from the previous cycle's, so
//! a host re-sending the same value every frame costs nothing.
//!
//! Gestures write through [`StateReconciler::commit`]. An atomic commit
//! stores all of its slices or none: if any slice it touches is controlled,
//! nothing is written.

use std::sync::Arc;

use crate::conduct::{self, CheckState, ConductMode};
use crate::config::TreeOptions;
use crate::entity::{EntityIndex, SharedIndex};
use crate::flatten::{self, FlattenRow};
use crate::key::{KeyList, TreeKey};
use crate::node::TreeNode;

/// One logical state slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slice<T> {
    /// Host-owned; the value is whatever the host last supplied.
    Controlled(T),
    /// Tree-owned; the value is the last locally computed one.
    Uncontrolled(T),
}

impl<T: Default> Default for Slice<T> {
    fn default() -> Self {
        Self::Uncontrolled(T::default())
    }
}

impl<T> Slice<T> {
    #[must_use]
    pub const fn value(&self) -> &T {
        match self {
            Self::Controlled(v) | Self::Uncontrolled(v) => v,
        }
    }

    #[must_use]
    pub const fn is_controlled(&self) -> bool {
        matches!(self, Self::Controlled(_))
    }

    /// Store a locally computed value. Controlled slices keep the host value.
    fn write(&mut self, value: T) -> bool {
        match self {
            Self::Controlled(_) => false,
            Self::Uncontrolled(v) => {
                *v = value;
                true
            }
        }
    }

    fn control(&mut self, value: T) {
        *self = Self::Controlled(value);
    }

    /// Hand the slice back to the tree, keeping the last host value.
    fn release(&mut self)
    where
        T: Default,
    {
        if let Self::Controlled(v) = self {
            let v = std::mem::take(v);
            *self = Self::Uncontrolled(v);
        }
    }
}

/// Externally supplied checked state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckedInput {
    /// Keys to check. Half-checked keys are derived.
    Keys(KeyList),
    /// Checked and half-checked keys. In propagating mode the half-checked
    /// part is ignored and re-derived.
    Split(CheckState),
}

impl CheckedInput {
    #[must_use]
    pub fn checked(&self) -> &KeyList {
        match self {
            Self::Keys(keys) => keys,
            Self::Split(state) => &state.checked,
        }
    }
}

impl From<KeyList> for CheckedInput {
    fn from(keys: KeyList) -> Self {
        Self::Keys(keys)
    }
}

impl From<CheckState> for CheckedInput {
    fn from(state: CheckState) -> Self {
        Self::Split(state)
    }
}

/// Host configuration for one update cycle.
///
/// `Some` on a state field makes that slice controlled for the cycle.
/// The `default_*` fields only matter on the first cycle.
#[derive(Debug, Clone, Default)]
pub struct TreeProps {
    pub tree_data: Arc<[TreeNode]>,
    pub expanded_keys: Option<KeyList>,
    pub selected_keys: Option<KeyList>,
    pub checked_keys: Option<CheckedInput>,
    pub loaded_keys: Option<KeyList>,
    /// Controlled cursor. `Some(None)` means "no active row".
    pub active_key: Option<Option<TreeKey>>,
    pub default_expanded_keys: KeyList,
    pub default_selected_keys: KeyList,
    pub default_checked_keys: KeyList,
}

impl TreeProps {
    #[must_use]
    pub fn new(tree_data: impl Into<Arc<[TreeNode]>>) -> Self {
        Self {
            tree_data: tree_data.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_expanded_keys(mut self, keys: KeyList) -> Self {
        self.expanded_keys = Some(keys);
        self
    }

    #[must_use]
    pub fn with_selected_keys(mut self, keys: KeyList) -> Self {
        self.selected_keys = Some(keys);
        self
    }

    #[must_use]
    pub fn with_checked_keys(mut self, input: impl Into<CheckedInput>) -> Self {
        self.checked_keys = Some(input.into());
        self
    }

    #[must_use]
    pub fn with_loaded_keys(mut self, keys: KeyList) -> Self {
        self.loaded_keys = Some(keys);
        self
    }

    #[must_use]
    pub fn with_active_key(mut self, key: Option<TreeKey>) -> Self {
        self.active_key = Some(key);
        self
    }

    #[must_use]
    pub fn with_default_expanded_keys(mut self, keys: KeyList) -> Self {
        self.default_expanded_keys = keys;
        self
    }

    #[must_use]
    pub fn with_default_selected_keys(mut self, keys: KeyList) -> Self {
        self.default_selected_keys = keys;
        self
    }

    #[must_use]
    pub fn with_default_checked_keys(mut self, keys: KeyList) -> Self {
        self.default_checked_keys = keys;
        self
    }
}

/// What one update cycle changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateReport {
    pub index_rebuilt: bool,
    pub rows_rebuilt: bool,
    pub checked_rederived: bool,
    pub selection_rederived: bool,
}

/// Locally computed slice values from one gesture.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub expanded: Option<KeyList>,
    pub selected: Option<KeyList>,
    pub checked: Option<CheckState>,
    pub loaded: Option<KeyList>,
    /// Loading markers are always tree-owned.
    pub loading: Option<KeyList>,
    pub active: Option<Option<TreeKey>>,
    /// Re-flatten even if expansion did not change.
    pub refresh_rows: bool,
}

impl StateUpdate {
    fn touches_controlled(&self, r: &StateReconciler) -> bool {
        (self.expanded.is_some() && r.expanded.is_controlled())
            || (self.selected.is_some() && r.selected.is_controlled())
            || (self.checked.is_some() && r.checked.is_controlled())
            || (self.loaded.is_some() && r.loaded.is_controlled())
            || (self.active.is_some() && r.active.is_controlled())
    }
}

/// Owner of the entity index, the five state slices, and the visible rows.
#[derive(Debug, Default)]
pub struct StateReconciler {
    index: SharedIndex,
    expanded: Slice<KeyList>,
    selected: Slice<KeyList>,
    checked: Slice<CheckState>,
    loaded: Slice<KeyList>,
    loading: KeyList,
    active: Slice<Option<TreeKey>>,
    rows: Vec<FlattenRow>,
    prev: Option<TreeProps>,
}

/// `next` if supplied and different from the previous cycle's value.
fn incoming<'a, T: PartialEq>(prev: Option<&Option<T>>, next: &'a Option<T>) -> Option<&'a T> {
    let value = next.as_ref()?;
    match prev {
        Some(Some(old)) if old == value => None,
        _ => Some(value),
    }
}

/// Single-select mode keeps only the first key.
#[must_use]
pub fn calc_selected_keys(keys: &KeyList, multiple: bool) -> KeyList {
    let mut out = keys.clone();
    if !multiple {
        out.truncate(1);
    }
    out
}

impl StateReconciler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one update cycle.
    pub fn update(&mut self, props: TreeProps, options: &TreeOptions) -> UpdateReport {
        let prev = self.prev.take();
        let first = prev.is_none();
        let mut report = UpdateReport::default();
        let _span = tracing::debug_span!("tree.update", first).entered();

        // 1. Entity index.
        if first || !self.index.load().is_built_from(&props.tree_data) {
            self.index.replace(EntityIndex::build(Arc::clone(&props.tree_data)));
            report.index_rebuilt = true;
        }
        let index = self.index.load();

        // 2. Expansion and rows.
        let mut expanded_changed = false;
        let expanded_in = incoming(prev.as_ref().map(|p| &p.expanded_keys), &props.expanded_keys);
        if let Some(keys) = expanded_in {
            let value = if options.auto_expand_parent {
                flatten::conduct_expand_parent(keys, &index)
            } else {
                keys.clone()
            };
            self.expanded.control(value);
            expanded_changed = true;
        } else if props.expanded_keys.is_none() {
            self.expanded.release();
            if first {
                let value = if options.default_expand_all {
                    flatten::all_keys(&index)
                } else if options.auto_expand_parent || options.default_expand_parent {
                    flatten::conduct_expand_parent(&props.default_expanded_keys, &index)
                } else {
                    props.default_expanded_keys.clone()
                };
                self.expanded.write(value);
                expanded_changed = true;
            }
        }
        if report.index_rebuilt || expanded_changed {
            self.rows = flatten::flatten(&index, self.expanded.value());
            report.rows_rebuilt = true;
        }

        // 3. Checkbox conduction.
        if options.checkable {
            let supplied = incoming(prev.as_ref().map(|p| &p.checked_keys), &props.checked_keys);
            // A new tree re-conducts the host's value when there is one,
            // otherwise the previous derived state.
            let input = match (supplied, &props.checked_keys) {
                (Some(input), _) => Some(input.clone()),
                (None, Some(host)) if report.index_rebuilt => Some(host.clone()),
                (None, _) if first => Some(CheckedInput::Keys(props.default_checked_keys.clone())),
                (None, None) if report.index_rebuilt => {
                    Some(CheckedInput::Split(self.checked.value().clone()))
                }
                _ => None,
            };
            if let Some(input) = input {
                let derived = derive_checked(&input, options, &index);
                if props.checked_keys.is_some() {
                    self.checked.control(derived);
                } else {
                    self.checked.release();
                    self.checked.write(derived);
                }
                report.checked_rederived = true;
            }
        }
        if props.checked_keys.is_none() {
            self.checked.release();
        }

        // 4. Selection.
        if options.selectable {
            let selected_in =
                incoming(prev.as_ref().map(|p| &p.selected_keys), &props.selected_keys);
            if let Some(keys) = selected_in {
                self.selected
                    .control(calc_selected_keys(keys, options.is_multiple()));
                report.selection_rederived = true;
            } else if first && props.selected_keys.is_none() {
                self.selected.write(calc_selected_keys(
                    &props.default_selected_keys,
                    options.is_multiple(),
                ));
                report.selection_rederived = true;
            }
        }
        if props.selected_keys.is_none() {
            self.selected.release();
        }

        // Loaded keys and the cursor are taken as given.
        if let Some(keys) = incoming(prev.as_ref().map(|p| &p.loaded_keys), &props.loaded_keys) {
            self.loaded.control(keys.clone());
        } else if props.loaded_keys.is_none() {
            self.loaded.release();
        }
        if let Some(key) = incoming(prev.as_ref().map(|p| &p.active_key), &props.active_key) {
            self.active.control(key.clone());
        } else if props.active_key.is_none() {
            self.active.release();
        }

        tracing::debug!(
            message = "tree.update",
            index_rebuilt = report.index_rebuilt,
            rows_rebuilt = report.rows_rebuilt,
            checked_rederived = report.checked_rederived,
            selection_rederived = report.selection_rederived,
        );
        self.prev = Some(props);
        report
    }

    /// Store locally computed values into uncontrolled slices.
    ///
    /// With `atomic`, nothing is stored if any touched slice is controlled.
    /// Returns `true` if anything was stored.
    pub fn commit(&mut self, update: StateUpdate, atomic: bool) -> bool {
        if atomic && update.touches_controlled(self) {
            return false;
        }
        let mut stored = false;
        let mut reflatten = update.refresh_rows;
        if let Some(keys) = update.expanded {
            let wrote = self.expanded.write(keys);
            reflatten |= wrote;
            stored |= wrote;
        }
        if let Some(keys) = update.selected {
            stored |= self.selected.write(keys);
        }
        if let Some(state) = update.checked {
            stored |= self.checked.write(state);
        }
        if let Some(keys) = update.loaded {
            stored |= self.loaded.write(keys);
        }
        if let Some(keys) = update.loading {
            self.loading = keys;
            stored = true;
        }
        if let Some(key) = update.active {
            stored |= self.active.write(key);
        }
        if reflatten {
            self.rows = flatten::flatten(&self.index.load(), self.expanded.value());
            stored = true;
        }
        stored
    }

    /// Snapshot of the current entity index.
    #[must_use]
    pub fn index(&self) -> Arc<EntityIndex> {
        self.index.load()
    }

    #[must_use]
    pub fn shared_index(&self) -> &SharedIndex {
        &self.index
    }

    #[must_use]
    pub fn rows(&self) -> &[FlattenRow] {
        &self.rows
    }

    #[must_use]
    pub fn expanded(&self) -> &Slice<KeyList> {
        &self.expanded
    }

    #[must_use]
    pub fn selected(&self) -> &Slice<KeyList> {
        &self.selected
    }

    #[must_use]
    pub fn checked(&self) -> &Slice<CheckState> {
        &self.checked
    }

    #[must_use]
    pub fn loaded(&self) -> &Slice<KeyList> {
        &self.loaded
    }

    #[must_use]
    pub fn loading(&self) -> &KeyList {
        &self.loading
    }

    #[must_use]
    pub fn active(&self) -> &Slice<Option<TreeKey>> {
        &self.active
    }
}

fn derive_checked(input: &CheckedInput, options: &TreeOptions, index: &EntityIndex) -> CheckState {
    if options.is_strict() {
        return match input {
            CheckedInput::Keys(keys) => CheckState {
                checked: keys.clone(),
                half_checked: KeyList::new(),
            },
            CheckedInput::Split(state) => state.clone(),
        };
    }
    conduct::conduct(input.checked(), &ConductMode::Fill, index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> Arc<[TreeNode]> {
        vec![
            TreeNode::new("A", "A")
                .child(TreeNode::new("B", "B"))
                .child(
                    TreeNode::new("C", "C")
                        .child(TreeNode::new("D", "D"))
                        .child(TreeNode::new("E", "E")),
                ),
        ]
        .into()
    }

    fn list(keys: &[&str]) -> KeyList {
        keys.iter().copied().collect()
    }

    fn row_keys(r: &StateReconciler) -> Vec<String> {
        r.rows().iter().map(|row| row.key().to_string()).collect()
    }

    fn checkable() -> TreeOptions {
        TreeOptions {
            checkable: true,
            ..TreeOptions::default()
        }
    }

    #[test]
    fn first_cycle_builds_index_and_rows() {
        let mut r = StateReconciler::new();
        let report = r.update(TreeProps::new(data()), &TreeOptions::default());
        assert!(report.index_rebuilt);
        assert!(report.rows_rebuilt);
        assert_eq!(row_keys(&r), ["A"]);
        assert!(!r.expanded().is_controlled());
    }

    #[test]
    fn same_data_pointer_skips_rebuild() {
        let mut r = StateReconciler::new();
        let d = data();
        r.update(TreeProps::new(Arc::clone(&d)), &TreeOptions::default());
        let report = r.update(TreeProps::new(d), &TreeOptions::default());
        assert!(!report.index_rebuilt);
        assert!(!report.rows_rebuilt);
    }

    #[test]
    fn default_expanded_keys_pull_in_parents() {
        let mut r = StateReconciler::new();
        r.update(
            TreeProps::new(data()).with_default_expanded_keys(list(&["C"])),
            &TreeOptions::default(),
        );
        assert_eq!(r.expanded().value(), &list(&["C", "A"]));
        assert_eq!(row_keys(&r), ["A", "B", "C", "D", "E"]);
    }

    #[test]
    fn default_expand_all() {
        let mut r = StateReconciler::new();
        let options = TreeOptions {
            default_expand_all: true,
            ..TreeOptions::default()
        };
        r.update(TreeProps::new(data()), &options);
        assert_eq!(row_keys(&r).len(), 5);
    }

    #[test]
    fn controlled_expansion_is_stored_as_given() {
        let mut r = StateReconciler::new();
        r.update(
            TreeProps::new(data()).with_expanded_keys(list(&["C"])),
            &TreeOptions::default(),
        );
        assert!(r.expanded().is_controlled());
        assert_eq!(r.expanded().value(), &list(&["C"]));
        assert_eq!(row_keys(&r), ["A"], "C is hidden under collapsed A");
    }

    #[test]
    fn auto_expand_parent_applies_to_controlled_input() {
        let mut r = StateReconciler::new();
        let options = TreeOptions {
            auto_expand_parent: true,
            ..TreeOptions::default()
        };
        r.update(TreeProps::new(data()).with_expanded_keys(list(&["D"])), &options);
        assert_eq!(r.expanded().value(), &list(&["D", "C", "A"]));
    }

    #[test]
    fn controlled_slice_rejects_commit() {
        let mut r = StateReconciler::new();
        r.update(
            TreeProps::new(data()).with_expanded_keys(list(&["A"])),
            &TreeOptions::default(),
        );
        let stored = r.commit(
            StateUpdate {
                expanded: Some(KeyList::new()),
                ..StateUpdate::default()
            },
            true,
        );
        assert!(!stored);
        assert_eq!(r.expanded().value(), &list(&["A"]));
        assert_eq!(row_keys(&r), ["A", "B", "C"]);
    }

    #[test]
    fn atomic_commit_is_all_or_nothing() {
        let mut r = StateReconciler::new();
        r.update(
            TreeProps::new(data()).with_selected_keys(list(&["B"])),
            &TreeOptions::default(),
        );
        let update = StateUpdate {
            expanded: Some(list(&["A"])),
            selected: Some(list(&["C"])),
            ..StateUpdate::default()
        };
        assert!(!r.commit(update.clone(), true));
        assert!(r.expanded().value().is_empty());

        assert!(r.commit(update, false));
        assert_eq!(r.expanded().value(), &list(&["A"]));
        assert_eq!(r.selected().value(), &list(&["B"]));
    }

    #[test]
    fn releasing_control_keeps_last_value() {
        let mut r = StateReconciler::new();
        let d = data();
        r.update(
            TreeProps::new(Arc::clone(&d)).with_expanded_keys(list(&["A"])),
            &TreeOptions::default(),
        );
        r.update(TreeProps::new(d), &TreeOptions::default());
        assert!(!r.expanded().is_controlled());
        assert_eq!(r.expanded().value(), &list(&["A"]));
        assert!(r.commit(
            StateUpdate {
                expanded: Some(KeyList::new()),
                ..StateUpdate::default()
            },
            true,
        ));
    }

    #[test]
    fn single_select_truncates_supplied_selection() {
        let mut r = StateReconciler::new();
        r.update(
            TreeProps::new(data()).with_selected_keys(list(&["B", "C"])),
            &TreeOptions::default(),
        );
        assert_eq!(r.selected().value(), &list(&["B"]));
    }

    #[test]
    fn checked_input_is_conducted() {
        let mut r = StateReconciler::new();
        r.update(
            TreeProps::new(data()).with_checked_keys(list(&["D", "E"])),
            &checkable(),
        );
        let state = r.checked().value();
        assert_eq!(state.checked, list(&["C", "D", "E"]));
        assert_eq!(state.half_checked, list(&["A"]));
    }

    #[test]
    fn strict_split_input_is_kept() {
        let mut r = StateReconciler::new();
        let options = TreeOptions {
            check_mode: crate::config::CheckMode::Strict,
            ..checkable()
        };
        let input = CheckState {
            checked: list(&["D"]),
            half_checked: list(&["A"]),
        };
        r.update(TreeProps::new(data()).with_checked_keys(input.clone()), &options);
        assert_eq!(r.checked().value(), &input);
    }

    #[test]
    fn tree_change_reconducts_previous_checked() {
        let mut r = StateReconciler::new();
        r.update(
            TreeProps::new(data()).with_default_checked_keys(list(&["D"])),
            &checkable(),
        );
        assert_eq!(r.checked().value().half_checked, list(&["A", "C"]));

        let smaller: Arc<[TreeNode]> =
            vec![TreeNode::new("C", "C").child(TreeNode::new("D", "D"))].into();
        let report = r.update(TreeProps::new(smaller), &checkable());
        assert!(report.checked_rederived);
        assert_eq!(r.checked().value().checked, list(&["C", "D"]));
        assert!(r.checked().value().half_checked.is_empty());
    }

    #[test]
    fn tree_change_reconducts_host_checked_value() {
        let mut r = StateReconciler::new();
        r.update(
            TreeProps::new(data()).with_checked_keys(list(&["C"])),
            &checkable(),
        );
        assert_eq!(r.checked().value().checked, list(&["A", "B", "C", "D", "E"]));

        // A(B(D), C(E))
        let reshaped: Arc<[TreeNode]> = vec![
            TreeNode::new("A", "A")
                .child(TreeNode::new("B", "B").child(TreeNode::new("D", "D")))
                .child(TreeNode::new("C", "C").child(TreeNode::new("E", "E"))),
        ]
        .into();
        let report = r.update(
            TreeProps::new(reshaped).with_checked_keys(list(&["C"])),
            &checkable(),
        );
        assert!(report.checked_rederived);
        assert!(r.checked().is_controlled());
        assert_eq!(r.checked().value().checked, list(&["C", "E"]));
        assert_eq!(r.checked().value().half_checked, list(&["A"]));
    }

    #[test]
    fn unchanged_controlled_input_is_not_rederived() {
        let mut r = StateReconciler::new();
        let d = data();
        let props = TreeProps::new(Arc::clone(&d)).with_checked_keys(list(&["D"]));
        r.update(props.clone(), &checkable());
        let report = r.update(props, &checkable());
        assert!(!report.checked_rederived);
        assert!(r.checked().is_controlled());
    }

    #[test]
    fn loading_is_never_controlled() {
        let mut r = StateReconciler::new();
        r.update(
            TreeProps::new(data()).with_loaded_keys(KeyList::new()),
            &TreeOptions::default(),
        );
        let stored = r.commit(
            StateUpdate {
                loaded: Some(list(&["A"])),
                loading: Some(KeyList::new()),
                ..StateUpdate::default()
            },
            false,
        );
        assert!(stored);
        assert!(r.loaded().value().is_empty());
    }
}
