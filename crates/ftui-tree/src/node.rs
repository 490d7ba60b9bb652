//! Source tree data supplied by the host.
//!
//! A tree is a forest: an ordered slice of root [`TreeNode`]s. Nodes are
//! immutable once handed to a [`Tree`](crate::Tree); to change the tree the
//! host builds a new slice and passes it in the next update cycle.
//!
//! # Example
//!
//! ```
//! use ftui_tree::node::TreeNode;
//!
//! let root = TreeNode::new("src", "src")
//!     .child(TreeNode::new("main", "main.rs"))
//!     .child(TreeNode::new("lib", "lib.rs").disabled());
//!
//! assert_eq!(root.title(), "src");
//! assert_eq!(root.children().len(), 2);
//! assert!(root.children()[1].is_disabled());
//! ```

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;

use crate::key::TreeKey;

bitflags! {
    /// Boolean per-node flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NodeFlags: u8 {
        /// Node cannot be selected or checked. It can still be expanded.
        const DISABLED = 1 << 0;
        /// Node's checkbox is shown but cannot be toggled.
        const DISABLE_CHECKBOX = 1 << 1;
    }
}

/// A node in the source tree.
#[derive(Debug, Clone)]
pub struct TreeNode {
    key: Option<TreeKey>,
    title: String,
    children: Vec<TreeNode>,
    flags: NodeFlags,
    leaf: Option<bool>,
    checkable: Option<bool>,
    selectable: Option<bool>,
    icon: Option<RenderHook<String>>,
    switcher_icon: Option<RenderHook<String>>,
}

impl TreeNode {
    /// Create a node with a key and a title.
    #[must_use]
    pub fn new(key: impl Into<TreeKey>, title: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::without_key(title)
        }
    }

    /// Create a node without a key.
    ///
    /// The entity index falls back to the node's position path as its key
    /// and records a diagnostic.
    #[must_use]
    pub fn without_key(title: impl Into<String>) -> Self {
        Self {
            key: None,
            title: title.into(),
            children: Vec::new(),
            flags: NodeFlags::empty(),
            leaf: None,
            checkable: None,
            selectable: None,
            icon: None,
            switcher_icon: None,
        }
    }

    /// Add a child node.
    #[must_use]
    pub fn child(mut self, node: TreeNode) -> Self {
        self.children.push(node);
        self
    }

    /// Set children from a vec.
    #[must_use]
    pub fn with_children(mut self, nodes: Vec<TreeNode>) -> Self {
        self.children = nodes;
        self
    }

    /// Mark the node disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.flags |= NodeFlags::DISABLED;
        self
    }

    /// Disable only the checkbox.
    #[must_use]
    pub fn disable_checkbox(mut self) -> Self {
        self.flags |= NodeFlags::DISABLE_CHECKBOX;
        self
    }

    /// Force leaf (`true`) or non-leaf (`false`) rendering.
    #[must_use]
    pub fn with_leaf(mut self, leaf: bool) -> Self {
        self.leaf = Some(leaf);
        self
    }

    /// Override whether this node shows a checkbox.
    #[must_use]
    pub fn with_checkable(mut self, checkable: bool) -> Self {
        self.checkable = Some(checkable);
        self
    }

    /// Override the tree-wide selectable setting for this node.
    #[must_use]
    pub fn with_selectable(mut self, selectable: bool) -> Self {
        self.selectable = Some(selectable);
        self
    }

    /// Set the node icon.
    #[must_use]
    pub fn with_icon(mut self, icon: RenderHook<String>) -> Self {
        self.icon = Some(icon);
        self
    }

    /// Set the expand/collapse switcher icon.
    #[must_use]
    pub fn with_switcher_icon(mut self, icon: RenderHook<String>) -> Self {
        self.switcher_icon = Some(icon);
        self
    }

    /// Key, if one was supplied.
    #[must_use]
    pub fn key(&self) -> Option<&TreeKey> {
        self.key.as_ref()
    }

    /// Title text.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Children in order.
    #[must_use]
    pub fn children(&self) -> &[TreeNode] {
        &self.children
    }

    /// Raw flags.
    #[must_use]
    pub const fn flags(&self) -> NodeFlags {
        self.flags
    }

    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.flags.contains(NodeFlags::DISABLED)
    }

    #[must_use]
    pub fn is_checkbox_disabled(&self) -> bool {
        self.flags.contains(NodeFlags::DISABLE_CHECKBOX)
    }

    /// Explicit leaf override.
    #[must_use]
    pub const fn leaf(&self) -> Option<bool> {
        self.leaf
    }

    /// Explicit checkable override.
    #[must_use]
    pub const fn checkable(&self) -> Option<bool> {
        self.checkable
    }

    /// Explicit selectable override.
    #[must_use]
    pub const fn selectable(&self) -> Option<bool> {
        self.selectable
    }

    /// Icon override.
    #[must_use]
    pub fn icon(&self) -> Option<&RenderHook<String>> {
        self.icon.as_ref()
    }

    /// Switcher icon override.
    #[must_use]
    pub fn switcher_icon(&self) -> Option<&RenderHook<String>> {
        self.switcher_icon.as_ref()
    }

    /// Whether checkbox conduction must skip this node.
    ///
    /// Disabled nodes, nodes with a disabled checkbox, and nodes that opt out
    /// of checking keep whatever state they were given.
    #[must_use]
    pub fn is_check_disabled(&self) -> bool {
        self.is_disabled() || self.is_checkbox_disabled() || self.checkable == Some(false)
    }

    /// Total number of nodes in this subtree, including this one.
    #[must_use]
    pub fn subtree_len(&self) -> usize {
        self.children
            .iter()
            .fold(1usize, |acc, child| acc.saturating_add(child.subtree_len()))
    }
}

// ---------------------------------------------------------------------------
// Render hooks
// ---------------------------------------------------------------------------

/// Derived per-row state handed to render hooks and the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowStatus {
    pub key: TreeKey,
    pub pos: String,
    pub depth: usize,
    pub expanded: bool,
    pub selected: bool,
    pub checked: bool,
    pub half_checked: bool,
    pub loaded: bool,
    pub loading: bool,
    pub active: bool,
    pub leaf: bool,
    pub disabled: bool,
    /// Whether a checkbox is shown for this row.
    pub checkable: bool,
    /// Highlight from the host filter predicate. Never affects flattening.
    pub filter_match: bool,
}

/// A value that is either fixed or computed from the row being rendered.
///
/// Resolution happens in the presentation layer; the core only carries it.
#[derive(Clone)]
pub enum RenderHook<T> {
    /// Same value for every row.
    Static(T),
    /// Computed from the row state at render time.
    Computed(Arc<dyn Fn(&RowStatus) -> T + Send + Sync>),
}

impl<T: Clone> RenderHook<T> {
    /// Wrap a closure.
    pub fn computed(f: impl Fn(&RowStatus) -> T + Send + Sync + 'static) -> Self {
        Self::Computed(Arc::new(f))
    }

    /// Resolve the value for a row.
    #[must_use]
    pub fn resolve(&self, status: &RowStatus) -> T {
        match self {
            Self::Static(value) => value.clone(),
            Self::Computed(f) => f(status),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for RenderHook<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}
