//! Node keys and ordered key sets.
//!
//! Every node in a tree is addressed by a [`TreeKey`]. Keys are either
//! strings or integers; the two never compare equal (`"1"` and `1` are
//! distinct keys).
//!
//! [`KeyList`] is the set type used for every logical state slice. It keeps
//! insertion order, because host notifications report keys in the order the
//! user produced them, and offers O(1) membership checks.

use std::fmt;
use std::sync::Arc;

use ahash::AHashSet;

/// Unique identifier of a tree node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TreeKey {
    /// Integer key.
    Int(i64),
    /// String key.
    Str(Arc<str>),
}

impl TreeKey {
    /// String view of a string key.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Int(_) => None,
        }
    }

    /// Integer view of an integer key.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Str(_) => None,
        }
    }
}

impl fmt::Display for TreeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for TreeKey {
    fn from(value: &str) -> Self {
        Self::Str(Arc::from(value))
    }
}

impl From<String> for TreeKey {
    fn from(value: String) -> Self {
        Self::Str(Arc::from(value))
    }
}

impl From<Arc<str>> for TreeKey {
    fn from(value: Arc<str>) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for TreeKey {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for TreeKey {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for TreeKey {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

// ---------------------------------------------------------------------------
// KeyList
// ---------------------------------------------------------------------------

/// Insertion-ordered set of keys.
///
/// Equality compares order as well as membership, matching how a host would
/// compare two key arrays between update cycles.
#[derive(Debug, Clone, Default)]
pub struct KeyList {
    order: Vec<TreeKey>,
    lookup: AHashSet<TreeKey>,
}

impl KeyList {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty list with room for `capacity` keys.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            order: Vec::with_capacity(capacity),
            lookup: AHashSet::with_capacity(capacity),
        }
    }

    /// Number of keys.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the list holds no keys.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Membership check.
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &TreeKey) -> bool {
        self.lookup.contains(key)
    }

    /// Append `key` unless already present. Returns `true` when added.
    pub fn insert(&mut self, key: TreeKey) -> bool {
        if !self.lookup.insert(key.clone()) {
            return false;
        }
        self.order.push(key);
        true
    }

    /// Remove `key`, preserving the order of the rest. Returns `true` when removed.
    pub fn remove(&mut self, key: &TreeKey) -> bool {
        if !self.lookup.remove(key) {
            return false;
        }
        self.order.retain(|k| k != key);
        true
    }

    /// Copy with `key` appended.
    #[must_use]
    pub fn with(&self, key: TreeKey) -> Self {
        let mut next = self.clone();
        next.insert(key);
        next
    }

    /// Copy with `key` removed.
    #[must_use]
    pub fn without(&self, key: &TreeKey) -> Self {
        let mut next = self.clone();
        next.remove(key);
        next
    }

    /// Keep at most the first `len` keys.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.order.len() {
            return;
        }
        for key in self.order.drain(len..) {
            self.lookup.remove(&key);
        }
    }

    /// Keep only keys matching `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&TreeKey) -> bool) {
        let lookup = &mut self.lookup;
        self.order.retain(|key| {
            let kept = keep(key);
            if !kept {
                lookup.remove(key);
            }
            kept
        });
    }

    /// First key in insertion order.
    #[must_use]
    pub fn first(&self) -> Option<&TreeKey> {
        self.order.first()
    }

    /// Keys in insertion order.
    #[must_use]
    pub fn as_slice(&self) -> &[TreeKey] {
        &self.order
    }

    /// Iterate keys in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, TreeKey> {
        self.order.iter()
    }

    /// Whether both lists hold the same keys, ignoring order.
    #[must_use]
    pub fn same_members(&self, other: &Self) -> bool {
        self.lookup == other.lookup
    }
}

impl PartialEq for KeyList {
    fn eq(&self, other: &Self) -> bool {
        self.order == other.order
    }
}

impl Eq for KeyList {}

impl<K: Into<TreeKey>> FromIterator<K> for KeyList {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut list = Self::new();
        list.extend(iter);
        list
    }
}

impl<K: Into<TreeKey>> Extend<K> for KeyList {
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        for key in iter {
            self.insert(key.into());
        }
    }
}

impl<'a> IntoIterator for &'a KeyList {
    type Item = &'a TreeKey;
    type IntoIter = std::slice::Iter<'a, TreeKey>;

    fn into_iter(self) -> Self::IntoIter {
        self.order.iter()
    }
}

impl IntoIterator for KeyList {
    type Item = TreeKey;
    type IntoIter = std::vec::IntoIter<TreeKey>;

    fn into_iter(self) -> Self::IntoIter {
        self.order.into_iter()
    }
}
