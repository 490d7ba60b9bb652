//! Outward notifications.
//!
//! Each gesture reports to the host through a [`TreeListener`] at a fixed
//! point in its processing (see [`Tree`](crate::Tree)). Payloads are owned
//! snapshots, so a listener may keep them after the call returns.
//!
//! Any `FnMut(TreeEvent)` closure is a listener.

use crate::conduct::CheckState;
use crate::key::{KeyList, TreeKey};
use crate::node::{NodeFlags, RowStatus};

/// Snapshot of the node a gesture targeted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventNode {
    pub key: TreeKey,
    pub title: String,
    pub flags: NodeFlags,
    /// Row state at the moment of the gesture, before it was applied.
    pub status: RowStatus,
}

/// Checked keys as reported to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckedKeys {
    /// Propagating mode: the full checked set.
    Keys(KeyList),
    /// Strict mode: checked and half-checked sets are independent.
    Split(CheckState),
}

impl CheckedKeys {
    /// The checked set, whichever shape.
    #[must_use]
    pub fn checked(&self) -> &KeyList {
        match self {
            Self::Keys(keys) => keys,
            Self::Split(state) => &state.checked,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandInfo {
    pub expanded_keys: KeyList,
    pub node: EventNode,
    pub expanded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectInfo {
    pub selected_keys: KeyList,
    pub node: EventNode,
    pub selected: bool,
    /// Titles and keys of every selected node still in the index.
    pub selected_nodes: Vec<NodeRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckInfo {
    pub checked_keys: CheckedKeys,
    pub node: EventNode,
    pub checked: bool,
    pub checked_nodes: Vec<NodeRef>,
    pub half_checked_keys: KeyList,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadInfo {
    pub loaded_keys: KeyList,
    pub node: EventNode,
}

/// Light reference to an indexed node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRef {
    pub key: TreeKey,
    pub title: String,
    pub pos: String,
}

/// Notification delivered to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent {
    Expand(ExpandInfo),
    Select(SelectInfo),
    Check(CheckInfo),
    Load(LoadInfo),
    /// Keyboard cursor moved. `None` when there is no active row.
    ActiveChange(Option<TreeKey>),
}

impl TreeEvent {
    /// Short name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Expand(_) => "expand",
            Self::Select(_) => "select",
            Self::Check(_) => "check",
            Self::Load(_) => "load",
            Self::ActiveChange(_) => "active_change",
        }
    }
}

/// Receives tree notifications synchronously.
pub trait TreeListener {
    fn notify(&mut self, event: TreeEvent);
}

impl<F: FnMut(TreeEvent)> TreeListener for F {
    fn notify(&mut self, event: TreeEvent) {
        self(event);
    }
}

/// Listener that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl TreeListener for NoopListener {
    fn notify(&mut self, _event: TreeEvent) {}
}
