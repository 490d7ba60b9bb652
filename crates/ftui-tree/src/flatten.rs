//! Visible-row flattening.
//!
//! [`flatten`] turns the entity index plus the expanded-key set into the
//! ordered sequence of rows the presentation layer draws. The result is a
//! pure function of its inputs and is rebuilt from scratch on every
//! expansion change; it is never patched in place.
//!
//! Only visible nodes are visited: a collapsed node's subtree is skipped
//! without being walked, so the cost is proportional to the number of rows
//! produced, not to the size of the tree.
//!
//! The module also holds the expansion helpers used by state derivation
//! ([`conduct_expand_parent`], [`all_keys`]) and the expand/collapse
//! transition overlay ([`TransitionOverlay`]).

use smallvec::SmallVec;

use crate::entity::{EntityId, EntityIndex};
use crate::key::{KeyList, TreeKey};

/// One visible row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenRow {
    id: EntityId,
    key: TreeKey,
    depth: usize,
    parent: Option<EntityId>,
    /// For each depth from the root down to this row, whether the node on
    /// the path is the first of its siblings.
    is_start: SmallVec<[bool; 8]>,
    /// For each depth from the root down to this row, whether the node on
    /// the path is the last of its siblings.
    is_end: SmallVec<[bool; 8]>,
}

impl FlattenRow {
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    #[must_use]
    pub fn key(&self) -> &TreeKey {
        &self.key
    }

    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    #[must_use]
    pub const fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    /// First-among-siblings flags, one per depth.
    #[must_use]
    pub fn is_start(&self) -> &[bool] {
        &self.is_start
    }

    /// Last-among-siblings flags, one per depth. Used to choose between a
    /// branch and a last-child connector, and to decide whether an ancestor
    /// column still needs a vertical line.
    #[must_use]
    pub fn is_end(&self) -> &[bool] {
        &self.is_end
    }

    /// Whether this row is the last child of its parent.
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.is_end.last().copied().unwrap_or(true)
    }
}

/// Produce the visible rows in pre-order.
///
/// A node's children follow it iff its key is in `expanded`.
#[must_use]
pub fn flatten(index: &EntityIndex, expanded: &KeyList) -> Vec<FlattenRow> {
    let mut rows = Vec::new();
    let roots = index.roots();
    let mut starts = SmallVec::<[bool; 8]>::new();
    let mut ends = SmallVec::<[bool; 8]>::new();
    for (i, &id) in roots.iter().enumerate() {
        walk(
            index,
            expanded,
            id,
            i == 0,
            i + 1 == roots.len(),
            &mut starts,
            &mut ends,
            &mut rows,
        );
    }
    tracing::trace!(message = "tree.flatten", visible_rows = rows.len());
    rows
}

#[allow(clippy::too_many_arguments)]
fn walk(
    index: &EntityIndex,
    expanded: &KeyList,
    id: EntityId,
    first: bool,
    last: bool,
    starts: &mut SmallVec<[bool; 8]>,
    ends: &mut SmallVec<[bool; 8]>,
    out: &mut Vec<FlattenRow>,
) {
    let entity = index.entity(id);
    starts.push(first);
    ends.push(last);
    out.push(FlattenRow {
        id,
        key: entity.key().clone(),
        depth: entity.depth(),
        parent: entity.parent(),
        is_start: starts.clone(),
        is_end: ends.clone(),
    });

    if expanded.contains(entity.key()) {
        let children = entity.children();
        for (i, &child) in children.iter().enumerate() {
            walk(
                index,
                expanded,
                child,
                i == 0,
                i + 1 == children.len(),
                starts,
                ends,
                out,
            );
        }
    }

    starts.pop();
    ends.pop();
}

/// Whether a node renders as a leaf (no expand switcher).
///
/// An explicit leaf flag wins. Otherwise a node without children is a leaf,
/// except under lazy loading, where a childless node only becomes a leaf
/// once its load has completed.
#[must_use]
pub fn is_leaf(index: &EntityIndex, id: EntityId, lazy: bool, loaded: &KeyList) -> bool {
    let entity = index.entity(id);
    match index.node(id).leaf() {
        Some(leaf) => leaf,
        None if !lazy => !entity.has_children(),
        None => loaded.contains(entity.key()) && !entity.has_children(),
    }
}

/// Add every ancestor of each key. Keys missing from the index are dropped.
#[must_use]
pub fn conduct_expand_parent(keys: &KeyList, index: &EntityIndex) -> KeyList {
    let mut out = KeyList::with_capacity(keys.len());
    for key in keys {
        let Some(id) = index.id_of(key) else {
            continue;
        };
        if !out.insert(key.clone()) {
            continue;
        }
        for ancestor in index.ancestors(id) {
            if !out.insert(ancestor.key().clone()) {
                break;
            }
        }
    }
    out
}

/// Every key in the index, in depth-first order.
#[must_use]
pub fn all_keys(index: &EntityIndex) -> KeyList {
    index.keys().cloned().collect()
}

// ---------------------------------------------------------------------------
// Transition overlay
// ---------------------------------------------------------------------------

/// The single key whose expansion changed between two expanded sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandDiff {
    pub key: TreeKey,
    /// `true` when the key was expanded, `false` when collapsed.
    pub added: bool,
}

/// Find the key toggled between `prev` and `next`.
///
/// Returns `None` unless the sets differ by exactly one key.
#[must_use]
pub fn find_expanded_diff(prev: &KeyList, next: &KeyList) -> Option<ExpandDiff> {
    let (shorter, longer, added) = if next.len() == prev.len() + 1 {
        (prev, next, true)
    } else if prev.len() == next.len() + 1 {
        (next, prev, false)
    } else {
        return None;
    };
    let mut extra = longer.iter().filter(|k| !shorter.contains(k));
    let key = extra.next()?.clone();
    if extra.next().is_some() {
        return None;
    }
    Some(ExpandDiff { key, added })
}

/// Row yielded by [`TransitionOverlay::rows`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayRow<'a> {
    Node(&'a FlattenRow),
    /// Placeholder the presentation layer animates open or closed.
    Transition,
}

/// Display-only row sequence with one synthetic transition row.
///
/// On expand the placeholder sits after the toggled key in the rows from
/// before the change; on collapse it sits after the key in the rows from
/// after the change. The overlay lives until the animation completes and
/// never affects the core row sequence.
#[derive(Debug, Clone)]
pub struct TransitionOverlay {
    diff: ExpandDiff,
    base: Vec<FlattenRow>,
    insert_at: usize,
    /// Rows shown or hidden under the toggled key.
    range: Vec<FlattenRow>,
}

impl TransitionOverlay {
    /// Start a transition between two row sequences.
    ///
    /// Returns `None` when the toggled key is not visible in the base rows.
    #[must_use]
    pub fn begin(
        prev_rows: &[FlattenRow],
        next_rows: &[FlattenRow],
        diff: ExpandDiff,
    ) -> Option<Self> {
        let (base, longer) = if diff.added {
            (prev_rows, next_rows)
        } else {
            (next_rows, prev_rows)
        };
        let at = base.iter().position(|row| row.key == diff.key)?;
        let range = match longer.iter().position(|row| row.key == diff.key) {
            Some(parent) => {
                let depth = longer[parent].depth;
                longer[parent + 1..]
                    .iter()
                    .take_while(|row| row.depth > depth)
                    .cloned()
                    .collect()
            }
            None => Vec::new(),
        };
        Some(Self {
            diff,
            base: base.to_vec(),
            insert_at: at + 1,
            range,
        })
    }

    /// Rows revealed (on expand) or hidden (on collapse) by the transition.
    #[must_use]
    pub fn range(&self) -> &[FlattenRow] {
        &self.range
    }

    #[must_use]
    pub fn diff(&self) -> &ExpandDiff {
        &self.diff
    }

    /// Base rows with the placeholder inserted.
    #[must_use]
    pub fn rows(&self) -> Vec<DisplayRow<'_>> {
        let mut out = Vec::with_capacity(self.base.len() + 1);
        out.extend(self.base[..self.insert_at].iter().map(DisplayRow::Node));
        out.push(DisplayRow::Transition);
        out.extend(self.base[self.insert_at..].iter().map(DisplayRow::Node));
        out
    }
}
