#![forbid(unsafe_code)]

//! End-to-end gesture scenarios for the tree core.
//!
//! Proves that:
//! 1. Checkbox conduction, flattening and single-select behave as documented
//! 2. Controlled slices keep the host value while notifications carry the
//!    computed one
//! 3. Lazy loads start once per loading episode, retry after failure, and
//!    tolerate vanished keys
//! 4. Keyboard navigation scrolls the list to the active row
//!
//! Run:
//!   cargo test -p ftui-tree --test tree_scenarios

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ftui_tree::event::EventNode;
use ftui_tree::load::{self, LoadFuture};
use ftui_tree::{
    CheckMode, CheckState, CheckedKeys, KeyList, KeyOutcome, LoadError, NavKey, SelectionMode,
    Tree, TreeConfig, TreeEvent, TreeKey, TreeNode, TreeProps, VirtualList,
};

// ============================================================================
// Helpers
// ============================================================================

fn sample() -> Vec<TreeNode> {
    vec![
        TreeNode::new("A", "A")
            .child(TreeNode::new("B", "B"))
            .child(
                TreeNode::new("C", "C")
                    .child(TreeNode::new("D", "D"))
                    .child(TreeNode::new("E", "E")),
            ),
    ]
}

fn list(keys: &[&str]) -> KeyList {
    keys.iter().copied().collect()
}

fn sorted(keys: &KeyList) -> Vec<String> {
    let mut out: Vec<String> = keys.iter().map(ToString::to_string).collect();
    out.sort();
    out
}

fn row_keys(tree: &Tree) -> Vec<String> {
    tree.rows().iter().map(|r| r.key().to_string()).collect()
}

fn key(s: &str) -> TreeKey {
    TreeKey::from(s)
}

type Events = Rc<RefCell<Vec<TreeEvent>>>;

fn with_events(config: TreeConfig) -> (Tree, Events) {
    let events: Events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    let tree = Tree::new(config).with_listener(move |e: TreeEvent| sink.borrow_mut().push(e));
    (tree, events)
}

fn expand_events(events: &Events) -> Vec<(String, bool)> {
    events
        .borrow()
        .iter()
        .filter_map(|e| match e {
            TreeEvent::Expand(info) => Some((info.node.key.to_string(), info.expanded)),
            _ => None,
        })
        .collect()
}

/// Loader that counts calls and fails the first `failures` of them.
fn counting_loader(calls: Rc<Cell<usize>>, failures: usize) -> TreeConfig {
    TreeConfig::default().with_loader(move |_node: &EventNode| -> LoadFuture {
        calls.set(calls.get() + 1);
        if calls.get() <= failures {
            load::ready(Err(LoadError::new("backend unavailable")))
        } else {
            load::ready(Ok(()))
        }
    })
}

fn lazy_data() -> Vec<TreeNode> {
    vec![TreeNode::new("X", "X"), TreeNode::new("Y", "Y")]
}

// ============================================================================
// 1. Documented scenarios
// ============================================================================

#[test]
fn checking_both_grandchildren_checks_parent_and_half_checks_root() {
    let (mut tree, _) = with_events(TreeConfig::default().with_checkable(true));
    tree.update(TreeProps::new(sample()));

    assert!(tree.check(&key("D")));
    assert!(tree.check(&key("E")));

    assert_eq!(sorted(tree.checked_keys()), ["C", "D", "E"]);
    assert_eq!(sorted(tree.half_checked_keys()), ["A"]);
}

#[test]
fn empty_expansion_shows_only_roots() {
    let mut tree = Tree::default();
    tree.update(TreeProps::new(vec![
        TreeNode::new("A", "A")
            .child(TreeNode::new("B", "B"))
            .child(TreeNode::new("C", "C")),
    ]));
    assert_eq!(row_keys(&tree), ["A"]);
}

#[test]
fn single_select_click_replaces_previous_selection() {
    let (mut tree, events) = with_events(TreeConfig::default().with_default_expand_all(true));
    tree.update(TreeProps::new(sample()));

    assert!(tree.click(&key("B")));
    assert!(tree.click(&key("C")));
    assert_eq!(sorted(tree.selected_keys()), ["C"]);

    match events.borrow().last() {
        Some(TreeEvent::Select(info)) => {
            assert!(info.selected);
            assert_eq!(info.selected_nodes.len(), 1);
            assert_eq!(info.selected_nodes[0].title, "C");
        }
        other => panic!("expected select event, got {other:?}"),
    }
}

#[test]
fn repeated_expand_before_resolution_loads_once() {
    let calls = Rc::new(Cell::new(0));
    let (mut tree, events) = with_events(counting_loader(Rc::clone(&calls), 0));
    tree.update(TreeProps::new(lazy_data()));

    let first = tree.toggle_expand(&key("X")).expect("known key");
    let pending = first.load.expect("first expand starts a load");
    assert!(tree.loading_keys().contains(&key("X")));

    // Collapse and expand again while the first load is still in flight.
    assert!(tree.toggle_expand(&key("X")).expect("known").load.is_none());
    let again = tree.toggle_expand(&key("X")).expect("known key");
    assert!(again.expanded);
    assert!(again.load.is_none());

    assert_eq!(calls.get(), 1);
    assert_eq!(
        expand_events(&events),
        [
            ("X".to_string(), true),
            ("X".to_string(), false),
            ("X".to_string(), true)
        ]
    );

    assert!(tree.complete_load(pollster::block_on(pending)));
    assert!(tree.loaded_keys().contains(&key("X")));
    assert!(tree.loading_keys().is_empty());
}

// ============================================================================
// 2. Controlled slices
// ============================================================================

#[test]
fn controlled_expansion_ignores_gestures_but_notifies() {
    let (mut tree, events) = with_events(TreeConfig::default());
    tree.update(TreeProps::new(sample()).with_expanded_keys(list(&["A"])));
    assert_eq!(row_keys(&tree), ["A", "B", "C"]);

    let outcome = tree.toggle_expand(&key("C")).expect("known key");
    assert!(outcome.expanded);
    assert_eq!(tree.expanded_keys(), &list(&["A"]));
    assert_eq!(row_keys(&tree), ["A", "B", "C"]);
    match events.borrow().last() {
        Some(TreeEvent::Expand(info)) => assert_eq!(info.expanded_keys, list(&["A", "C"])),
        other => panic!("expected expand event, got {other:?}"),
    }
}

#[test]
fn host_echoing_notification_drives_controlled_expansion() {
    let data: std::sync::Arc<[TreeNode]> = sample().into();
    let (mut tree, events) = with_events(TreeConfig::default());
    tree.update(TreeProps::new(data.clone()).with_expanded_keys(list(&["A"])));

    tree.toggle_expand(&key("C"));
    let echoed = match events.borrow().last() {
        Some(TreeEvent::Expand(info)) => info.expanded_keys.clone(),
        other => panic!("expected expand event, got {other:?}"),
    };
    tree.update(TreeProps::new(data).with_expanded_keys(echoed));
    assert_eq!(row_keys(&tree), ["A", "B", "C", "D", "E"]);
}

#[test]
fn controlled_checked_keys_stay_put() {
    let (mut tree, events) = with_events(TreeConfig::default().with_checkable(true));
    tree.update(TreeProps::new(sample()).with_checked_keys(list(&["B"])));
    assert_eq!(sorted(tree.checked_keys()), ["B"]);

    assert!(tree.check(&key("C")));
    assert_eq!(sorted(tree.checked_keys()), ["B"]);
    match events.borrow().last() {
        Some(TreeEvent::Check(info)) => {
            assert!(info.checked);
            assert_eq!(sorted(info.checked_keys.checked()), ["A", "B", "C", "D", "E"]);
            assert!(info.half_checked_keys.is_empty());
        }
        other => panic!("expected check event, got {other:?}"),
    }
}

#[test]
fn controlled_selection_in_multiple_mode_is_exact() {
    let config = TreeConfig::default().with_selection(SelectionMode::Multiple);
    let (mut tree, _) = with_events(config);
    tree.update(TreeProps::new(sample()).with_selected_keys(list(&["C", "A"])));

    tree.select(&key("A"));
    tree.select(&key("B"));
    assert_eq!(tree.selected_keys(), &list(&["C", "A"]));
}

#[test]
fn default_selection_seeds_uncontrolled_state() {
    let mut tree = Tree::default();
    tree.update(TreeProps::new(sample()).with_default_selected_keys(list(&["B", "C"])));
    assert_eq!(sorted(tree.selected_keys()), ["B"], "single mode keeps the first");

    tree.select(&key("A"));
    assert_eq!(sorted(tree.selected_keys()), ["A"]);
}

#[test]
fn strict_mode_checks_independently() {
    let config = TreeConfig::default()
        .with_checkable(true)
        .with_check_mode(CheckMode::Strict);
    let (mut tree, events) = with_events(config);
    tree.update(TreeProps::new(sample()));

    tree.check(&key("C"));
    assert_eq!(sorted(tree.checked_keys()), ["C"]);
    assert!(tree.half_checked_keys().is_empty());
    match events.borrow().last() {
        Some(TreeEvent::Check(info)) => assert!(matches!(
            &info.checked_keys,
            CheckedKeys::Split(CheckState { checked, .. }) if checked == &list(&["C"])
        )),
        other => panic!("expected check event, got {other:?}"),
    }
}

#[test]
fn check_disabled_child_blocks_fill() {
    let mut tree = Tree::new(TreeConfig::default().with_checkable(true));
    tree.update(TreeProps::new(vec![
        TreeNode::new("p", "p")
            .child(TreeNode::new("a", "a"))
            .child(TreeNode::new("b", "b").disable_checkbox()),
    ]));
    assert!(!tree.check(&key("b")));
    assert!(tree.check(&key("p")));
    assert_eq!(sorted(tree.checked_keys()), ["a", "p"]);
}

#[test]
fn tree_replacement_keeps_checked_state_consistent() {
    let mut tree = Tree::new(TreeConfig::default().with_checkable(true));
    tree.update(TreeProps::new(sample()));
    tree.check(&key("D"));
    assert_eq!(sorted(tree.half_checked_keys()), ["A", "C"]);

    // E disappears: C now has only checked children.
    tree.update(TreeProps::new(vec![
        TreeNode::new("A", "A")
            .child(TreeNode::new("B", "B"))
            .child(TreeNode::new("C", "C").child(TreeNode::new("D", "D"))),
    ]));
    assert_eq!(sorted(tree.checked_keys()), ["C", "D"]);
    assert_eq!(sorted(tree.half_checked_keys()), ["A"]);
}

// ============================================================================
// 3. Lazy loading
// ============================================================================

#[test]
fn failed_load_is_retried_on_next_expand() {
    let calls = Rc::new(Cell::new(0));
    let (mut tree, events) = with_events(counting_loader(Rc::clone(&calls), 1));
    tree.update(TreeProps::new(lazy_data()));

    let pending = tree
        .toggle_expand(&key("X"))
        .and_then(|o| o.load)
        .expect("load started");
    let done = pollster::block_on(pending);
    assert!(done.result.is_err());
    assert!(!tree.complete_load(done));
    assert!(tree.loading_keys().is_empty());
    assert!(tree.loaded_keys().is_empty());

    tree.toggle_expand(&key("X"));
    let retry = tree
        .toggle_expand(&key("X"))
        .and_then(|o| o.load)
        .expect("retry after failure");
    assert!(tree.complete_load(pollster::block_on(retry)));
    assert_eq!(calls.get(), 2);
    assert_eq!(
        events
            .borrow()
            .iter()
            .filter(|e| matches!(e, TreeEvent::Load(_)))
            .count(),
        1
    );
}

#[test]
fn load_notification_precedes_loaded_state() {
    let calls = Rc::new(Cell::new(0));
    let loaded_at_notify = Rc::new(Cell::new(None));
    let seen = Rc::clone(&loaded_at_notify);
    let mut tree = Tree::new(counting_loader(calls, 0)).with_listener(move |e: TreeEvent| {
        if let TreeEvent::Load(info) = e {
            seen.set(Some((info.node.status.loaded, info.loaded_keys.len())));
        }
    });
    tree.update(TreeProps::new(lazy_data()));

    let pending = tree
        .toggle_expand(&key("X"))
        .and_then(|o| o.load)
        .expect("load started");
    tree.complete_load(pollster::block_on(pending));
    assert_eq!(loaded_at_notify.get(), Some((false, 1)));
}

#[test]
fn loaded_childless_node_becomes_leaf() {
    let calls = Rc::new(Cell::new(0));
    let mut tree = Tree::new(counting_loader(calls, 0));
    tree.update(TreeProps::new(lazy_data()));

    let status = tree.status(&key("X")).expect("indexed");
    assert!(!status.leaf, "unloaded lazy node shows a switcher");

    let pending = tree
        .toggle_expand(&key("X"))
        .and_then(|o| o.load)
        .expect("load started");
    assert!(tree.status(&key("X")).expect("indexed").loading);
    tree.complete_load(pollster::block_on(pending));
    assert!(tree.status(&key("X")).expect("indexed").leaf);
}

#[test]
fn host_supplied_children_appear_after_load() {
    let calls = Rc::new(Cell::new(0));
    let mut tree = Tree::new(counting_loader(calls, 0));
    tree.update(TreeProps::new(lazy_data()));

    let pending = tree
        .toggle_expand(&key("X"))
        .and_then(|o| o.load)
        .expect("load started");
    tree.complete_load(pollster::block_on(pending));

    tree.update(TreeProps::new(vec![
        TreeNode::new("X", "X").child(TreeNode::new("X1", "X1")),
        TreeNode::new("Y", "Y"),
    ]));
    assert_eq!(row_keys(&tree), ["X", "X1", "Y"]);
}

#[test]
fn concurrent_loads_complete_independently() {
    let calls = Rc::new(Cell::new(0));
    let mut tree = Tree::new(counting_loader(Rc::clone(&calls), 0));
    tree.update(TreeProps::new(lazy_data()));

    let x = tree.toggle_expand(&key("X")).and_then(|o| o.load).expect("x");
    let y = tree.toggle_expand(&key("Y")).and_then(|o| o.load).expect("y");
    assert_eq!(sorted(tree.loading_keys()), ["X", "Y"]);

    tree.complete_load(pollster::block_on(y));
    assert_eq!(sorted(tree.loading_keys()), ["X"]);
    assert_eq!(sorted(tree.loaded_keys()), ["Y"]);

    tree.complete_load(pollster::block_on(x));
    assert!(tree.loading_keys().is_empty());
    assert_eq!(sorted(tree.loaded_keys()), ["X", "Y"]);
    assert_eq!(calls.get(), 2);
}

#[test]
fn completion_for_vanished_key_is_a_noop() {
    let calls = Rc::new(Cell::new(0));
    let (mut tree, events) = with_events(counting_loader(calls, 0));
    tree.update(TreeProps::new(lazy_data()));

    let pending = tree
        .toggle_expand(&key("X"))
        .and_then(|o| o.load)
        .expect("load started");
    tree.update(TreeProps::new(vec![TreeNode::new("Y", "Y")]));

    assert!(!tree.complete_load(pollster::block_on(pending)));
    assert!(tree.loading_keys().is_empty());
    assert!(tree.loaded_keys().is_empty());
    assert!(!events.borrow().iter().any(|e| matches!(e, TreeEvent::Load(_))));
}

#[test]
fn explicit_leaf_never_loads() {
    let calls = Rc::new(Cell::new(0));
    let mut tree = Tree::new(counting_loader(Rc::clone(&calls), 0));
    tree.update(TreeProps::new(vec![TreeNode::new("L", "L").with_leaf(true)]));
    assert!(tree.toggle_expand(&key("L")).expect("known").load.is_none());
    assert_eq!(calls.get(), 0);
}

#[test]
fn host_expanded_lazy_nodes_sync_their_loads() {
    let calls = Rc::new(Cell::new(0));
    let mut tree = Tree::new(counting_loader(Rc::clone(&calls), 0));
    tree.update(TreeProps::new(lazy_data()).with_expanded_keys(list(&["Y"])));

    let pending = tree.sync_loads();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].key(), &key("Y"));
    assert!(tree.sync_loads().is_empty(), "already loading");
    assert_eq!(calls.get(), 1);
}

#[test]
fn controlled_loaded_keys_still_clear_loading() {
    let calls = Rc::new(Cell::new(0));
    let (mut tree, events) = with_events(counting_loader(calls, 0));
    tree.update(TreeProps::new(lazy_data()).with_loaded_keys(KeyList::new()));

    let pending = tree
        .toggle_expand(&key("X"))
        .and_then(|o| o.load)
        .expect("load started");
    tree.complete_load(pollster::block_on(pending));

    assert!(tree.loaded_keys().is_empty());
    assert!(tree.loading_keys().is_empty());
    match events.borrow().last() {
        Some(TreeEvent::Load(info)) => assert_eq!(info.loaded_keys, list(&["X"])),
        other => panic!("expected load event, got {other:?}"),
    }
}

// ============================================================================
// 4. Keyboard and scrolling
// ============================================================================

#[derive(Default)]
struct ScrollLog {
    keys: Vec<TreeKey>,
}

impl VirtualList for ScrollLog {
    fn scroll_to_key(&mut self, key: &TreeKey) {
        self.keys.push(key.clone());
    }

    fn scroll_to_index(&mut self, _index: usize) {}
}

#[test]
fn cursor_moves_scroll_the_list() {
    let mut tree = Tree::new(TreeConfig::default().with_default_expand_all(true));
    tree.update(TreeProps::new(sample()));

    tree.handle_key(NavKey::Up);
    tree.handle_key(NavKey::Up);
    let mut log = ScrollLog::default();
    tree.drain_scroll(&mut log);
    assert_eq!(log.keys, [key("E"), key("D")]);
    assert!(tree.take_scroll().is_empty());
}

#[test]
fn right_arrow_on_lazy_node_returns_pending_load() {
    let calls = Rc::new(Cell::new(0));
    let mut tree = Tree::new(counting_loader(calls, 0));
    tree.update(TreeProps::new(lazy_data()));

    tree.handle_key(NavKey::Down);
    match tree.handle_key(NavKey::Right) {
        KeyOutcome::Load(pending) => assert_eq!(pending.key(), &key("X")),
        other => panic!("expected a load, got {other:?}"),
    }
}

#[test]
fn controlled_active_key_is_not_moved_by_keys() {
    let (mut tree, events) = with_events(TreeConfig::default().with_default_expand_all(true));
    tree.update(TreeProps::new(sample()).with_active_key(Some(key("A"))));

    tree.handle_key(NavKey::Down);
    assert_eq!(tree.active_key(), Some(&key("A")));
    assert!(matches!(
        events.borrow().last(),
        Some(TreeEvent::ActiveChange(Some(k))) if k == &key("B")
    ));
}
