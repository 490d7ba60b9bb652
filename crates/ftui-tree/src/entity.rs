//! Entity index: flat, key-addressed metadata for every node in a tree.
//!
//! [`EntityIndex::build`] walks the forest once in depth-first pre-order and
//! records, for every node, its depth, flat position, position path, parent
//! and children. Every other subsystem (flattening, checkbox conduction,
//! gesture dispatch) reads from this index rather than from the nested data.
//!
//! The index is immutable. A tree change produces a brand new index that is
//! published through [`SharedIndex`] with a single atomic swap, so readers
//! either see the old index or the new one, never a partial rebuild.
//!
//! # Position paths
//!
//! Roots are `"0-<i>"`, children `"<parent>-<i>"`. A node without a key is
//! indexed under its position path.
//!
//! # Duplicate keys
//!
//! Duplicate keys are a host bug. [`EntityIndex::build`] logs a warning,
//! records an [`IndexDiagnostic`], and lets the later node win the key
//! lookup. Both nodes keep their own entity in the ordered list, so
//! conduction results for that key are unreliable. Use
//! [`EntityIndex::try_build`] to reject such trees instead.

use std::sync::Arc;

use ahash::AHashMap;
use arc_swap::ArcSwap;
use smallvec::SmallVec;

use crate::error::IndexError;
use crate::key::TreeKey;
use crate::node::TreeNode;

/// Position of an entity in depth-first order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(usize);

impl EntityId {
    /// Flat depth-first index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Derived metadata for one node.
#[derive(Debug, Clone)]
pub struct Entity {
    key: TreeKey,
    id: EntityId,
    depth: usize,
    pos: String,
    path: SmallVec<[usize; 8]>,
    parent: Option<EntityId>,
    children: Vec<EntityId>,
}

impl Entity {
    #[must_use]
    pub fn key(&self) -> &TreeKey {
        &self.key
    }

    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Depth below the roots (roots are 0).
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Position path such as `"0-1-0"`.
    #[must_use]
    pub fn pos(&self) -> &str {
        &self.pos
    }

    /// Sibling indices from the root down to this node.
    #[must_use]
    pub fn path(&self) -> &[usize] {
        &self.path
    }

    #[must_use]
    pub const fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    #[must_use]
    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    #[must_use]
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

/// Non-fatal problem found while indexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexDiagnostic {
    /// Two nodes share a key; the later one (`second_pos`) owns the lookup.
    DuplicateKey {
        key: TreeKey,
        first_pos: String,
        second_pos: String,
    },
    /// A node has no key and was indexed under its position path.
    MissingKey { pos: String },
}

/// Key-addressed, depth-first index over a forest of [`TreeNode`]s.
#[derive(Debug, Clone)]
pub struct EntityIndex {
    data: Arc<[TreeNode]>,
    entities: Vec<Entity>,
    by_key: AHashMap<TreeKey, EntityId>,
    roots: Vec<EntityId>,
    levels: Vec<Vec<EntityId>>,
    diagnostics: Vec<IndexDiagnostic>,
}

impl Default for EntityIndex {
    fn default() -> Self {
        Self::build(Arc::<[TreeNode]>::from(Vec::new()))
    }
}

impl EntityIndex {
    /// Index a forest, recording duplicates and missing keys as diagnostics.
    #[must_use]
    pub fn build(data: impl Into<Arc<[TreeNode]>>) -> Self {
        let data = data.into();
        let total = data
            .iter()
            .fold(0usize, |acc, node| acc.saturating_add(node.subtree_len()));
        let span = tracing::debug_span!(
            "tree.index",
            total_nodes = total,
            duplicates = tracing::field::Empty,
        );
        let _guard = span.enter();

        let mut builder = Builder {
            entities: Vec::with_capacity(total),
            by_key: AHashMap::with_capacity(total),
            levels: Vec::new(),
            diagnostics: Vec::new(),
            path: SmallVec::new(),
        };
        let mut roots = Vec::with_capacity(data.len());
        for (i, node) in data.iter().enumerate() {
            roots.push(builder.visit(node, i, None, "0"));
        }

        let duplicates = builder
            .diagnostics
            .iter()
            .filter(|d| matches!(d, IndexDiagnostic::DuplicateKey { .. }))
            .count();
        span.record("duplicates", duplicates);

        Self {
            data,
            entities: builder.entities,
            by_key: builder.by_key,
            roots,
            levels: builder.levels,
            diagnostics: builder.diagnostics,
        }
    }

    /// Index a forest, failing on the first duplicate key.
    pub fn try_build(data: impl Into<Arc<[TreeNode]>>) -> Result<Self, IndexError> {
        let index = Self::build(data);
        let duplicate = index.diagnostics.iter().find_map(|d| match d {
            IndexDiagnostic::DuplicateKey {
                key,
                first_pos,
                second_pos,
            } => Some(IndexError::DuplicateKey {
                key: key.clone(),
                first_pos: first_pos.clone(),
                second_pos: second_pos.clone(),
            }),
            IndexDiagnostic::MissingKey { .. } => None,
        });
        match duplicate {
            Some(err) => Err(err),
            None => Ok(index),
        }
    }

    /// Source data this index was built from.
    #[must_use]
    pub fn data(&self) -> &Arc<[TreeNode]> {
        &self.data
    }

    /// Whether `data` is the same allocation this index was built from.
    #[must_use]
    pub fn is_built_from(&self, data: &Arc<[TreeNode]>) -> bool {
        Arc::ptr_eq(&self.data, data)
    }

    /// All entities in depth-first pre-order.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    #[must_use]
    pub fn roots(&self) -> &[EntityId] {
        &self.roots
    }

    /// Entities grouped by depth, each group in depth-first order.
    #[must_use]
    pub fn levels(&self) -> &[Vec<EntityId>] {
        &self.levels
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[IndexDiagnostic] {
        &self.diagnostics
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    #[must_use]
    pub fn contains(&self, key: &TreeKey) -> bool {
        self.by_key.contains_key(key)
    }

    /// Look up an entity by key.
    #[must_use]
    pub fn get(&self, key: &TreeKey) -> Option<&Entity> {
        self.by_key.get(key).map(|id| &self.entities[id.0])
    }

    /// Look up an entity id by key.
    #[must_use]
    pub fn id_of(&self, key: &TreeKey) -> Option<EntityId> {
        self.by_key.get(key).copied()
    }

    /// Entity for an id produced by this index.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> &Entity {
        &self.entities[id.0]
    }

    /// Source node for an id produced by this index.
    #[must_use]
    pub fn node(&self, id: EntityId) -> &TreeNode {
        // Paths were recorded while walking `data`, so every step is in range.
        let path = &self.entities[id.0].path;
        let mut node = &self.data[path[0]];
        for &i in &path[1..] {
            node = &node.children()[i];
        }
        node
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: EntityId) -> impl Iterator<Item = &Entity> + '_ {
        std::iter::successors(self.entities[id.0].parent, move |p| {
            self.entities[p.0].parent
        })
        .map(move |p| &self.entities[p.0])
    }

    /// Keys of all entities in depth-first order.
    pub fn keys(&self) -> impl Iterator<Item = &TreeKey> + '_ {
        self.entities.iter().map(|e| &e.key)
    }
}

struct Builder {
    entities: Vec<Entity>,
    by_key: AHashMap<TreeKey, EntityId>,
    levels: Vec<Vec<EntityId>>,
    diagnostics: Vec<IndexDiagnostic>,
    path: SmallVec<[usize; 8]>,
}

impl Builder {
    fn visit(
        &mut self,
        node: &TreeNode,
        sibling: usize,
        parent: Option<EntityId>,
        parent_pos: &str,
    ) -> EntityId {
        let id = EntityId(self.entities.len());
        let depth = self.path.len();
        let pos = format!("{parent_pos}-{sibling}");
        self.path.push(sibling);

        let key = match node.key() {
            Some(key) => key.clone(),
            None => {
                tracing::warn!(message = "tree.missing_key", pos = %pos);
                self.diagnostics
                    .push(IndexDiagnostic::MissingKey { pos: pos.clone() });
                TreeKey::from(pos.as_str())
            }
        };
        if let Some(prev) = self.by_key.insert(key.clone(), id) {
            let first_pos = self.entities[prev.0].pos.clone();
            tracing::warn!(
                message = "tree.duplicate_key",
                key = %key,
                first_pos = %first_pos,
                second_pos = %pos,
            );
            self.diagnostics.push(IndexDiagnostic::DuplicateKey {
                key: key.clone(),
                first_pos,
                second_pos: pos.clone(),
            });
        }

        if self.levels.len() <= depth {
            self.levels.push(Vec::new());
        }
        self.levels[depth].push(id);

        self.entities.push(Entity {
            key,
            id,
            depth,
            pos,
            path: self.path.clone(),
            parent,
            children: Vec::with_capacity(node.children().len()),
        });

        if let Some(parent) = parent {
            self.entities[parent.0].children.push(id);
        }

        let own_pos = self.entities[id.0].pos.clone();
        for (i, child) in node.children().iter().enumerate() {
            self.visit(child, i, Some(id), &own_pos);
        }

        self.path.pop();
        id
    }
}

// ---------------------------------------------------------------------------
// SharedIndex
// ---------------------------------------------------------------------------

/// Atomically replaceable handle to the current [`EntityIndex`].
///
/// Readers take an `Arc` snapshot with [`load`](Self::load) and keep using it
/// even if the index is replaced meanwhile.
#[derive(Debug)]
pub struct SharedIndex {
    inner: ArcSwap<EntityIndex>,
}

impl Default for SharedIndex {
    fn default() -> Self {
        Self::new(EntityIndex::default())
    }
}

impl SharedIndex {
    #[must_use]
    pub fn new(index: EntityIndex) -> Self {
        Self {
            inner: ArcSwap::from_pointee(index),
        }
    }

    /// Snapshot of the current index.
    #[must_use]
    pub fn load(&self) -> Arc<EntityIndex> {
        self.inner.load_full()
    }

    /// Publish a new index in one swap.
    pub fn replace(&self, index: EntityIndex) {
        self.inner.store(Arc::new(index));
    }
}
