#![forbid(unsafe_code)]

//! Headless hierarchical list core for FrankenTUI.
//!
//! `ftui-tree` owns everything a tree view needs except drawing:
//!
//! - an entity index over the host's nested node data ([`entity`]),
//! - the flattened sequence of visible rows ([`flatten`]),
//! - tri-state checkbox conduction ([`conduct`]),
//! - controlled/uncontrolled reconciliation of the five state slices
//!   ([`reconcile`]),
//! - gesture handling, keyboard navigation and host notifications
//!   ([`Tree`]),
//! - lazy per-node loading ([`load`]).
//!
//! ```
//! use ftui_tree::{Tree, TreeConfig, TreeEvent, TreeNode, TreeProps};
//!
//! let mut tree = Tree::new(TreeConfig::default().with_checkable(true))
//!     .with_listener(|event: TreeEvent| println!("{}", event.name()));
//! tree.update(TreeProps::new(vec![
//!     TreeNode::new("src", "src")
//!         .child(TreeNode::new("lib.rs", "lib.rs"))
//!         .child(TreeNode::new("main.rs", "main.rs")),
//! ]));
//!
//! tree.toggle_expand(&"src".into());
//! assert_eq!(tree.rows().len(), 3);
//!
//! tree.check(&"lib.rs".into());
//! tree.check(&"main.rs".into());
//! assert!(tree.checked_keys().contains(&"src".into()));
//! ```

pub mod conduct;
pub mod config;
pub mod dispatch;
pub mod entity;
pub mod error;
pub mod event;
pub mod flatten;
pub mod key;
pub mod load;
pub mod node;
pub mod reconcile;
pub mod viewport;

pub use conduct::{CheckState, ConductMode};
pub use config::{CheckMode, SelectionMode, TreeConfig, TreeOptions};
pub use dispatch::{ExpandOutcome, KeyOutcome, NavKey, Tree};
pub use entity::{EntityId, EntityIndex};
pub use error::{IndexError, LoadError, OptionsError};
pub use event::{CheckedKeys, TreeEvent, TreeListener};
pub use flatten::{DisplayRow, FlattenRow};
pub use key::{KeyList, TreeKey};
pub use load::{LoadCompletion, LoadData, PendingLoad};
pub use node::{NodeFlags, RenderHook, RowStatus, TreeNode};
pub use reconcile::{CheckedInput, Slice, TreeProps};
pub use viewport::{ScrollTo, VirtualList};
