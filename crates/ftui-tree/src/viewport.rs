//! Interface to the virtualized list that draws the rows.
//!
//! The tree does not scroll anything itself. It queues [`ScrollTo`]
//! requests (for example when the keyboard cursor moves) and the host drains
//! them into its list with [`Tree::drain_scroll`](crate::Tree::drain_scroll).

use crate::key::TreeKey;

/// Scroll request for the list renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrollTo {
    Key(TreeKey),
    Index(usize),
}

/// A fixed-row-height virtualized list.
pub trait VirtualList {
    /// Scroll so the row with `key` is visible.
    fn scroll_to_key(&mut self, key: &TreeKey);

    /// Scroll so the row at `index` is visible.
    fn scroll_to_index(&mut self, index: usize);

    /// Dispatch a queued request.
    fn scroll_to(&mut self, target: &ScrollTo) {
        match target {
            ScrollTo::Key(key) => self.scroll_to_key(key),
            ScrollTo::Index(index) => self.scroll_to_index(*index),
        }
    }
}

/// Row height and viewport height, in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    height: Option<u16>,
    row_height: Option<u16>,
    enabled: bool,
}

impl Viewport {
    #[must_use]
    pub const fn new(height: Option<u16>, row_height: Option<u16>, enabled: bool) -> Self {
        Self {
            height,
            row_height,
            enabled,
        }
    }

    /// Virtualization applies only with both heights and the switch on.
    #[must_use]
    pub const fn is_virtual(&self) -> bool {
        self.enabled && self.height.is_some() && matches!(self.row_height, Some(h) if h > 0)
    }

    /// Rows that fit in the viewport, rounded up.
    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        let height = usize::from(self.height?);
        let row = usize::from(self.row_height?);
        (row > 0).then(|| height.div_ceil(row))
    }

    /// Leading slice of `rows` worth animating: one viewport plus a row.
    #[must_use]
    pub fn transition_range<'a, T>(&self, rows: &'a [T]) -> &'a [T] {
        match self.capacity() {
            Some(capacity) => &rows[..rows.len().min(capacity + 1)],
            None => rows,
        }
    }
}
