//! Lazy per-node loading.
//!
//! Each node moves through `Unloaded -> Loading -> Loaded`, or back to
//! `Unloaded` when the loader fails. A failed node is retried on the next
//! expand; there is no retry cap.
//!
//! The tree never blocks on a load. Expanding a lazy node marks it loading
//! and hands the host a [`PendingLoad`]: a future that resolves to a
//! [`LoadCompletion`]. The host drives it on whatever executor it uses and
//! passes the completion back to [`Tree::complete_load`]. Several loads may
//! be in flight at once; each completes independently, and a completion for
//! a key that has since left the tree is a no-op.
//!
//! ```
//! use ftui_tree::load::{self, LoadFuture};
//! use ftui_tree::event::EventNode;
//! use ftui_tree::{Tree, TreeConfig, TreeNode, TreeProps};
//!
//! let config = TreeConfig::default().with_loader(|_node: &EventNode| -> LoadFuture {
//!     load::ready(Ok(()))
//! });
//! let mut tree = Tree::new(config);
//! tree.update(TreeProps::new(vec![TreeNode::new("dir", "dir")]));
//!
//! let pending = tree.toggle_expand(&"dir".into()).and_then(|o| o.load).expect("load started");
//! let done = pollster::block_on(pending);
//! tree.complete_load(done);
//! assert!(tree.loaded_keys().contains(&"dir".into()));
//! ```
//!
//! [`Tree::complete_load`]: crate::Tree::complete_load

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::LoadError;
use crate::event::EventNode;
use crate::key::{KeyList, TreeKey};

/// Future returned by a loader.
pub type LoadFuture = Pin<Box<dyn Future<Output = Result<(), LoadError>>>>;

/// Host-supplied loader for a node's children.
///
/// The loader typically fetches data and later feeds a new tree to
/// [`Tree::update`](crate::Tree::update). It must not call back into the tree.
pub trait LoadData {
    fn load(&self, node: &EventNode) -> LoadFuture;
}

impl<F> LoadData for F
where
    F: Fn(&EventNode) -> LoadFuture,
{
    fn load(&self, node: &EventNode) -> LoadFuture {
        self(node)
    }
}

/// An already-resolved loader future.
#[must_use]
pub fn ready(result: Result<(), LoadError>) -> LoadFuture {
    Box::pin(std::future::ready(result))
}

/// Per-node load state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Unloaded,
    Loading,
    Loaded,
}

/// Load state of `key` given the loaded and loading sets.
#[must_use]
pub fn status(key: &TreeKey, loaded: &KeyList, loading: &KeyList) -> LoadStatus {
    if loaded.contains(key) {
        LoadStatus::Loaded
    } else if loading.contains(key) {
        LoadStatus::Loading
    } else {
        LoadStatus::Unloaded
    }
}

/// Outcome of one load, to be handed back to the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadCompletion {
    pub key: TreeKey,
    pub result: Result<(), LoadError>,
}

/// In-flight load for one node.
pub struct PendingLoad {
    key: TreeKey,
    future: LoadFuture,
}

impl PendingLoad {
    pub(crate) fn new(key: TreeKey, future: LoadFuture) -> Self {
        Self { key, future }
    }

    #[must_use]
    pub fn key(&self) -> &TreeKey {
        &self.key
    }
}

impl Future for PendingLoad {
    type Output = LoadCompletion;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<LoadCompletion> {
        match self.future.as_mut().poll(cx) {
            Poll::Ready(result) => Poll::Ready(LoadCompletion {
                key: self.key.clone(),
                result,
            }),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl fmt::Debug for PendingLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingLoad").field("key", &self.key).finish()
    }
}
