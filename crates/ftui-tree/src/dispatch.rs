//! The [`Tree`] façade: gestures, notifications, and derived reads.
//!
//! Every gesture follows the same shape: look the key up in the current
//! index (unknown keys are a silent no-op), check the per-node gates,
//! compute the next slice values, commit them (controlled slices keep the
//! host's value), then notify the listener with the computed values. The
//! listener always sees what the gesture *would* store, even when the slice
//! is controlled and nothing was stored.
//!
//! Notification order per gesture:
//!
//! | gesture        | order                                                        |
//! |----------------|--------------------------------------------------------------|
//! | expand toggle  | commit expanded + rows (atomic) → `Expand` → start lazy load |
//! | select         | commit selected → `Select`                                   |
//! | check          | commit checked + half-checked → `Check`                      |
//! | load success   | `Load` → commit loaded, clear loading, re-flatten            |
//! | cursor move    | commit active → queue scroll → `ActiveChange`                |

use std::sync::Arc;

use crate::conduct::{self, CheckState};
use crate::config::TreeConfig;
use crate::entity::{EntityId, EntityIndex};
use crate::event::{
    CheckInfo, CheckedKeys, EventNode, ExpandInfo, LoadInfo, NodeRef, NoopListener, SelectInfo,
    TreeEvent, TreeListener,
};
use crate::flatten::{self, DisplayRow, FlattenRow, TransitionOverlay};
use crate::key::{KeyList, TreeKey};
use crate::load::{self, LoadCompletion, LoadStatus, PendingLoad};
use crate::node::{RowStatus, TreeNode};
use crate::reconcile::{StateReconciler, StateUpdate, TreeProps, UpdateReport};
use crate::viewport::{ScrollTo, VirtualList};

/// Result of an expand toggle.
#[derive(Debug)]
pub struct ExpandOutcome {
    /// The expansion the gesture requested.
    pub expanded: bool,
    /// Lazy load started by this expand, for the host to drive.
    pub load: Option<PendingLoad>,
}

/// Keyboard navigation input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavKey {
    Up,
    Down,
    Left,
    Right,
    Enter,
    Space,
}

/// Result of [`Tree::handle_key`].
#[derive(Debug)]
pub enum KeyOutcome {
    Ignored,
    Handled,
    /// Handled, and the key started a lazy load.
    Load(PendingLoad),
}

impl KeyOutcome {
    #[must_use]
    pub const fn is_handled(&self) -> bool {
        !matches!(self, Self::Ignored)
    }
}

/// Hierarchical list state machine.
pub struct Tree {
    config: TreeConfig,
    state: StateReconciler,
    listener: Box<dyn TreeListener>,
    scroll: Vec<ScrollTo>,
    transition: Option<TransitionOverlay>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new(TreeConfig::default())
    }
}

impl Tree {
    #[must_use]
    pub fn new(config: TreeConfig) -> Self {
        Self {
            config,
            state: StateReconciler::new(),
            listener: Box::new(NoopListener),
            scroll: Vec::new(),
            transition: None,
        }
    }

    /// Set the notification sink.
    #[must_use]
    pub fn with_listener(mut self, listener: impl TreeListener + 'static) -> Self {
        self.listener = Box::new(listener);
        self
    }

    pub fn set_listener(&mut self, listener: impl TreeListener + 'static) {
        self.listener = Box::new(listener);
    }

    #[must_use]
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Run one host update cycle.
    pub fn update(&mut self, props: TreeProps) -> UpdateReport {
        let before = self.snapshot_for_transition();
        let report = self.state.update(props, self.config.options());
        if report.rows_rebuilt {
            self.track_transition(before);
        }
        report
    }

    // -----------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------

    /// Current entity index. Cheap to clone and safe to keep across updates.
    #[must_use]
    pub fn index(&self) -> Arc<EntityIndex> {
        self.state.index()
    }

    /// Visible rows in display order.
    #[must_use]
    pub fn rows(&self) -> &[FlattenRow] {
        self.state.rows()
    }

    #[must_use]
    pub fn expanded_keys(&self) -> &KeyList {
        self.state.expanded().value()
    }

    #[must_use]
    pub fn selected_keys(&self) -> &KeyList {
        self.state.selected().value()
    }

    #[must_use]
    pub fn checked_keys(&self) -> &KeyList {
        &self.state.checked().value().checked
    }

    #[must_use]
    pub fn half_checked_keys(&self) -> &KeyList {
        &self.state.checked().value().half_checked
    }

    #[must_use]
    pub fn loaded_keys(&self) -> &KeyList {
        self.state.loaded().value()
    }

    #[must_use]
    pub fn loading_keys(&self) -> &KeyList {
        self.state.loading()
    }

    #[must_use]
    pub fn active_key(&self) -> Option<&TreeKey> {
        self.state.active().value().as_ref()
    }

    /// Slice ownership and values.
    #[must_use]
    pub fn state(&self) -> &StateReconciler {
        &self.state
    }

    /// Derived state of one visible row.
    #[must_use]
    pub fn row_status(&self, row: &FlattenRow) -> RowStatus {
        self.status_of(&self.index(), row.id())
    }

    /// Derived state of any indexed node.
    #[must_use]
    pub fn status(&self, key: &TreeKey) -> Option<RowStatus> {
        let index = self.index();
        let id = index.id_of(key)?;
        Some(self.status_of(&index, id))
    }

    /// Icon for a row: the node's own, else the tree-wide one.
    #[must_use]
    pub fn icon(&self, row: &FlattenRow) -> Option<String> {
        let index = self.index();
        let hook = index.node(row.id()).icon().or(self.config.icon())?;
        Some(hook.resolve(&self.status_of(&index, row.id())))
    }

    /// Switcher icon for a row: the node's own, else the tree-wide one.
    #[must_use]
    pub fn switcher_icon(&self, row: &FlattenRow) -> Option<String> {
        let index = self.index();
        let hook = index
            .node(row.id())
            .switcher_icon()
            .or(self.config.switcher_icon())?;
        Some(hook.resolve(&self.status_of(&index, row.id())))
    }

    /// Rows to draw: the core rows, or the transition overlay while one runs.
    #[must_use]
    pub fn display_rows(&self) -> Vec<DisplayRow<'_>> {
        match &self.transition {
            Some(overlay) => overlay.rows(),
            None => self.rows().iter().map(DisplayRow::Node).collect(),
        }
    }

    /// Rows animated by the running transition, trimmed to the viewport.
    #[must_use]
    pub fn transition_range(&self) -> &[FlattenRow] {
        match &self.transition {
            Some(overlay) => self.config.options().viewport().transition_range(overlay.range()),
            None => &[],
        }
    }

    #[must_use]
    pub fn is_transitioning(&self) -> bool {
        self.transition.is_some()
    }

    /// The presentation layer finished animating.
    pub fn finish_transition(&mut self) {
        self.transition = None;
    }

    /// Take queued scroll requests.
    pub fn take_scroll(&mut self) -> Vec<ScrollTo> {
        std::mem::take(&mut self.scroll)
    }

    /// Apply queued scroll requests to `list`.
    pub fn drain_scroll(&mut self, list: &mut dyn VirtualList) {
        for target in self.take_scroll() {
            list.scroll_to(&target);
        }
    }

    // -----------------------------------------------------------------
    // Gestures
    // -----------------------------------------------------------------

    /// Flip the expansion of `key`.
    ///
    /// Returns `None` for keys not in the index. Expanding a lazy node that
    /// has not been loaded starts its load.
    pub fn toggle_expand(&mut self, key: &TreeKey) -> Option<ExpandOutcome> {
        let index = self.index();
        let Some(id) = index.id_of(key) else {
            tracing::debug!(message = "tree.toggle", key = %key, outcome = "unknown_key");
            return None;
        };
        let node = self.event_node(&index, id);
        let expanded = !self.expanded_keys().contains(key);
        let expanded_keys = if expanded {
            self.expanded_keys().with(key.clone())
        } else {
            self.expanded_keys().without(key)
        };

        let before = self.snapshot_for_transition();
        let stored = self.state.commit(
            StateUpdate {
                expanded: Some(expanded_keys.clone()),
                ..StateUpdate::default()
            },
            true,
        );
        if stored {
            self.track_transition(before);
        }
        tracing::debug!(
            message = "tree.toggle",
            key = %key,
            expanded,
            stored,
            visible_rows = self.rows().len(),
        );

        self.listener.notify(TreeEvent::Expand(ExpandInfo {
            expanded_keys,
            node: node.clone(),
            expanded,
        }));

        let load = if expanded {
            self.start_load(&index, id, &node)
        } else {
            None
        };
        Some(ExpandOutcome { expanded, load })
    }

    /// Toggle selection of `key`.
    ///
    /// Returns `false` when the key is unknown, disabled, or not selectable.
    pub fn select(&mut self, key: &TreeKey) -> bool {
        let index = self.index();
        let Some(id) = index.id_of(key) else {
            return false;
        };
        let target = index.node(id);
        if self.is_disabled(target) || !self.is_selectable(target) {
            tracing::debug!(message = "tree.select", key = %key, outcome = "gated");
            return false;
        }
        let node = self.event_node(&index, id);
        let selected = !self.selected_keys().contains(key);
        let selected_keys = if !selected {
            self.selected_keys().without(key)
        } else if self.config.options().is_multiple() {
            self.selected_keys().with(key.clone())
        } else {
            KeyList::new().with(key.clone())
        };
        let selected_nodes = node_refs(&index, &selected_keys);

        let stored = self.state.commit(
            StateUpdate {
                selected: Some(selected_keys.clone()),
                ..StateUpdate::default()
            },
            false,
        );
        tracing::debug!(
            message = "tree.select",
            key = %key,
            selected,
            stored,
            selected_count = selected_keys.len(),
        );
        self.listener.notify(TreeEvent::Select(SelectInfo {
            selected_keys,
            node,
            selected,
            selected_nodes,
        }));
        true
    }

    /// Toggle the checkbox of `key`.
    ///
    /// Returns `false` when the key is unknown, the tree is not checkable, or
    /// the node is disabled or check-disabled.
    pub fn check(&mut self, key: &TreeKey) -> bool {
        let index = self.index();
        let Some(id) = index.id_of(key) else {
            return false;
        };
        let target = index.node(id);
        if self.is_disabled(target) || !self.is_checkable(target) || target.is_checkbox_disabled() {
            tracing::debug!(message = "tree.check", key = %key, outcome = "gated");
            return false;
        }
        let node = self.event_node(&index, id);
        let current = self.state.checked().value().clone();
        let checked = !current.is_checked(key);

        let (next, checked_keys) = if self.config.options().is_strict() {
            let next = conduct::toggle_strict(&current, key, checked);
            let payload = CheckedKeys::Split(next.clone());
            (next, payload)
        } else {
            let next = conduct::toggle(&current, key, checked, &index);
            let payload = CheckedKeys::Keys(next.checked.clone());
            (next, payload)
        };
        let checked_nodes = node_refs(&index, &next.checked);
        let half_checked_keys = next.half_checked.clone();

        let stored = self.state.commit(
            StateUpdate {
                checked: Some(next),
                ..StateUpdate::default()
            },
            false,
        );
        tracing::debug!(
            message = "tree.check",
            key = %key,
            checked,
            stored,
            checked_count = checked_keys.checked().len(),
            half_checked_count = half_checked_keys.len(),
        );
        self.listener.notify(TreeEvent::Check(CheckInfo {
            checked_keys,
            node,
            checked,
            checked_nodes,
            half_checked_keys,
        }));
        true
    }

    /// Row click: select if the node is selectable, otherwise check it.
    pub fn click(&mut self, key: &TreeKey) -> bool {
        let index = self.index();
        let Some(id) = index.id_of(key) else {
            return false;
        };
        if self.is_selectable(index.node(id)) {
            self.select(key)
        } else {
            self.check(key)
        }
    }

    /// Move the keyboard cursor to `key` (or clear it).
    pub fn set_active(&mut self, key: Option<TreeKey>) {
        self.state.commit(
            StateUpdate {
                active: Some(key.clone()),
                ..StateUpdate::default()
            },
            false,
        );
        if let Some(key) = &key {
            self.scroll.push(ScrollTo::Key(key.clone()));
        }
        tracing::trace!(message = "tree.active", key = ?key);
        self.listener.notify(TreeEvent::ActiveChange(key));
    }

    /// Move the cursor `offset` rows, wrapping at both ends.
    ///
    /// With no current cursor, a forward move lands on the first row and a
    /// backward move on the last. With no rows, the cursor is cleared.
    pub fn offset_active(&mut self, offset: isize) {
        let rows = self.rows();
        if rows.is_empty() {
            self.set_active(None);
            return;
        }
        let len = rows.len() as isize;
        let current = self
            .active_key()
            .and_then(|key| rows.iter().position(|row| row.key() == key));
        let base = match current {
            Some(i) => i as isize,
            None if offset < 0 => len,
            None => -1,
        };
        let next = (base + offset).rem_euclid(len) as usize;
        let key = rows[next].key().clone();
        self.set_active(Some(key));
    }

    /// Keyboard navigation on the active row.
    ///
    /// Up/Down move the cursor. Left collapses an expanded node or moves to
    /// the parent. Right expands a collapsed node or moves to the first
    /// child. Enter/Space check a checkable node, otherwise select it.
    pub fn handle_key(&mut self, key: NavKey) -> KeyOutcome {
        match key {
            NavKey::Up => {
                self.offset_active(-1);
                return KeyOutcome::Handled;
            }
            NavKey::Down => {
                self.offset_active(1);
                return KeyOutcome::Handled;
            }
            _ => {}
        }

        let index = self.index();
        let Some(active) = self.active_key().cloned() else {
            return KeyOutcome::Ignored;
        };
        let Some(id) = index.id_of(&active) else {
            return KeyOutcome::Ignored;
        };
        let status = self.status_of(&index, id);
        let entity = index.entity(id);

        match key {
            NavKey::Left if status.expanded && !status.leaf => {
                self.toggle_expand(&active);
                KeyOutcome::Handled
            }
            NavKey::Left => match entity.parent() {
                Some(parent) => {
                    self.set_active(Some(index.entity(parent).key().clone()));
                    KeyOutcome::Handled
                }
                None => KeyOutcome::Ignored,
            },
            NavKey::Right if !status.leaf && !status.expanded => {
                match self.toggle_expand(&active).and_then(|o| o.load) {
                    Some(pending) => KeyOutcome::Load(pending),
                    None => KeyOutcome::Handled,
                }
            }
            NavKey::Right => match entity.children().first() {
                Some(&child) if status.expanded => {
                    self.set_active(Some(index.entity(child).key().clone()));
                    KeyOutcome::Handled
                }
                _ => KeyOutcome::Ignored,
            },
            NavKey::Enter | NavKey::Space => {
                let toggles_checkbox = status.checkable
                    && !status.disabled
                    && !index.node(id).is_checkbox_disabled();
                let handled = if toggles_checkbox {
                    self.check(&active)
                } else {
                    self.select(&active)
                };
                if handled {
                    KeyOutcome::Handled
                } else {
                    KeyOutcome::Ignored
                }
            }
            NavKey::Up | NavKey::Down => KeyOutcome::Ignored,
        }
    }

    /// Record the outcome of a lazy load.
    ///
    /// On success the `Load` notification fires first, then the key is
    /// stored as loaded and the rows are rebuilt. On failure the key goes
    /// back to unloaded and will be retried on the next expand. A completion
    /// for a key no longer in the index only clears its loading marker.
    /// Returns `true` if the key is now loaded.
    pub fn complete_load(&mut self, done: LoadCompletion) -> bool {
        let LoadCompletion { key, result } = done;
        let loading = self.loading_keys().without(&key);
        let index = self.index();

        let Some(id) = index.id_of(&key) else {
            tracing::debug!(
                message = "tree.load",
                key = %key,
                phase = "complete",
                outcome = "vanished"
            );
            self.state.commit(
                StateUpdate {
                    loading: Some(loading),
                    ..StateUpdate::default()
                },
                false,
            );
            return false;
        };

        if let Err(err) = result {
            tracing::debug!(
                message = "tree.load",
                key = %key,
                phase = "complete",
                outcome = "failed",
                error = %err
            );
            self.state.commit(
                StateUpdate {
                    loading: Some(loading),
                    ..StateUpdate::default()
                },
                false,
            );
            return false;
        }

        let loaded_keys = self.loaded_keys().with(key.clone());
        let node = self.event_node(&index, id);
        self.listener.notify(TreeEvent::Load(LoadInfo {
            loaded_keys: loaded_keys.clone(),
            node,
        }));
        self.state.commit(
            StateUpdate {
                loaded: Some(loaded_keys),
                loading: Some(loading),
                refresh_rows: true,
                ..StateUpdate::default()
            },
            false,
        );
        tracing::debug!(message = "tree.load", key = %key, phase = "complete", outcome = "loaded");
        self.loaded_keys().contains(&key)
    }

    /// Start loads for expanded, visible lazy nodes that have none yet.
    ///
    /// Covers nodes expanded by the host rather than by a gesture.
    pub fn sync_loads(&mut self) -> Vec<PendingLoad> {
        if !self.config.is_lazy() {
            return Vec::new();
        }
        let index = self.index();
        let candidates: Vec<EntityId> = self
            .rows()
            .iter()
            .filter(|row| self.expanded_keys().contains(row.key()))
            .map(FlattenRow::id)
            .collect();
        let mut pending = Vec::new();
        for id in candidates {
            let node = self.event_node(&index, id);
            if let Some(load) = self.start_load(&index, id, &node) {
                pending.push(load);
            }
        }
        pending
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    fn start_load(
        &mut self,
        index: &EntityIndex,
        id: EntityId,
        node: &EventNode,
    ) -> Option<PendingLoad> {
        let loader = Arc::clone(self.config.loader()?);
        let entity = index.entity(id);
        if index.node(id).leaf() == Some(true) || entity.has_children() {
            return None;
        }
        let key = entity.key();
        if load::status(key, self.loaded_keys(), self.loading_keys()) != LoadStatus::Unloaded {
            tracing::trace!(message = "tree.load", key = %key, phase = "skip");
            return None;
        }
        let future = loader.load(node);
        let loading = self.loading_keys().with(key.clone());
        self.state.commit(
            StateUpdate {
                loading: Some(loading),
                ..StateUpdate::default()
            },
            false,
        );
        tracing::debug!(message = "tree.load", key = %key, phase = "start");
        Some(PendingLoad::new(key.clone(), future))
    }

    fn is_disabled(&self, node: &TreeNode) -> bool {
        self.config.options().disabled || node.is_disabled()
    }

    fn is_selectable(&self, node: &TreeNode) -> bool {
        node.selectable().unwrap_or(self.config.options().selectable)
    }

    fn is_checkable(&self, node: &TreeNode) -> bool {
        self.config.options().checkable && node.checkable() != Some(false)
    }

    fn status_of(&self, index: &EntityIndex, id: EntityId) -> RowStatus {
        let entity = index.entity(id);
        let node = index.node(id);
        let key = entity.key();
        let checked: &CheckState = self.state.checked().value();
        let mut status = RowStatus {
            key: key.clone(),
            pos: entity.pos().to_string(),
            depth: entity.depth(),
            expanded: self.expanded_keys().contains(key),
            selected: self.selected_keys().contains(key),
            checked: checked.is_checked(key),
            half_checked: checked.is_half_checked(key),
            loaded: self.loaded_keys().contains(key),
            loading: self.loading_keys().contains(key),
            active: self.active_key() == Some(key),
            leaf: flatten::is_leaf(index, id, self.config.is_lazy(), self.loaded_keys()),
            disabled: self.is_disabled(node),
            checkable: self.is_checkable(node),
            filter_match: false,
        };
        if let Some(filter) = self.config.filter() {
            status.filter_match = filter(&status);
        }
        status
    }

    fn event_node(&self, index: &EntityIndex, id: EntityId) -> EventNode {
        let node = index.node(id);
        EventNode {
            key: index.entity(id).key().clone(),
            title: node.title().to_string(),
            flags: node.flags(),
            status: self.status_of(index, id),
        }
    }

    fn snapshot_for_transition(&self) -> Option<(KeyList, Vec<FlattenRow>)> {
        self.config
            .options()
            .motion
            .then(|| (self.expanded_keys().clone(), self.rows().to_vec()))
    }

    fn track_transition(&mut self, before: Option<(KeyList, Vec<FlattenRow>)>) {
        let Some((prev_expanded, prev_rows)) = before else {
            return;
        };
        self.transition = flatten::find_expanded_diff(&prev_expanded, self.expanded_keys())
            .and_then(|diff| TransitionOverlay::begin(&prev_rows, self.state.rows(), diff));
    }
}

impl std::fmt::Debug for Tree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tree")
            .field("config", &self.config)
            .field("rows", &self.rows().len())
            .field("expanded", self.expanded_keys())
            .field("selected", self.selected_keys())
            .field("checked", self.checked_keys())
            .field("active", &self.active_key())
            .field("transition", &self.transition.is_some())
            .finish_non_exhaustive()
    }
}

fn node_refs(index: &EntityIndex, keys: &KeyList) -> Vec<NodeRef> {
    keys.iter()
        .filter_map(|key| index.get(key))
        .map(|entity| NodeRef {
            key: entity.key().clone(),
            title: index.node(entity.id()).title().to_string(),
            pos: entity.pos().to_string(),
        })
        .collect()
}
