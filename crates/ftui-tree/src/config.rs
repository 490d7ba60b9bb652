//! Host configuration surface.
//!
//! [`TreeOptions`] holds the plain, serializable options. With the `config`
//! feature they can be loaded from TOML or JSON:
//!
//! ```toml
//! selection = "multiple"
//! checkable = true
//! check_mode = "propagate"
//! default_expand_all = true
//! row_height = 1
//! height = 20
//! ```
//!
//! [`TreeConfig`] wraps the options together with the parts that cannot be
//! serialized: the lazy loader, the filter predicate, and tree-wide icons.
//! It is passed explicitly to [`Tree::new`](crate::Tree::new); nothing is
//! looked up from ambient state.

#[cfg(feature = "config")]
use std::path::Path;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::error::OptionsError;
use crate::load::LoadData;
use crate::node::{RenderHook, RowStatus};
use crate::viewport::Viewport;

/// Whether more than one node may be selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
pub enum SelectionMode {
    #[default]
    Single,
    Multiple,
}

/// Checkbox behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
pub enum CheckMode {
    /// Tri-state propagation between parents and children.
    #[default]
    Propagate,
    /// Each checkbox is independent.
    Strict,
}

/// Plain tree options.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct TreeOptions {
    /// Nodes can be selected (per-node override wins).
    pub selectable: bool,
    /// Nodes show checkboxes.
    pub checkable: bool,
    /// Every node is disabled.
    pub disabled: bool,
    pub selection: SelectionMode,
    pub check_mode: CheckMode,
    /// Expand every node on the first update when no expansion is supplied.
    pub default_expand_all: bool,
    /// Expand ancestors of the initial expanded keys.
    pub default_expand_parent: bool,
    /// Expand ancestors of every externally supplied expanded set.
    pub auto_expand_parent: bool,
    /// Fixed row height in cells. Virtualization needs both heights.
    pub row_height: Option<u16>,
    /// Viewport height in cells.
    pub height: Option<u16>,
    /// Allow virtualization when both heights are set.
    pub virtual_list: bool,
    /// Keep a transition overlay on expand/collapse.
    pub motion: bool,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            selectable: true,
            checkable: false,
            disabled: false,
            selection: SelectionMode::Single,
            check_mode: CheckMode::Propagate,
            default_expand_all: false,
            default_expand_parent: true,
            auto_expand_parent: false,
            row_height: None,
            height: None,
            virtual_list: true,
            motion: false,
        }
    }
}

impl TreeOptions {
    /// Load from a TOML string.
    #[cfg(feature = "config")]
    pub fn from_toml_str(s: &str) -> Result<Self, OptionsError> {
        let options: Self = toml::from_str(s).map_err(OptionsError::Toml)?;
        options.validated()
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "config")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, OptionsError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    #[cfg(feature = "config")]
    pub fn from_json_str(s: &str) -> Result<Self, OptionsError> {
        let options: Self = serde_json::from_str(s).map_err(OptionsError::Json)?;
        options.validated()
    }

    /// Validate option combinations.
    ///
    /// Returns a list of problems. An empty list means the options are valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.row_height == Some(0) {
            errors.push("row_height must be > 0".to_string());
        }
        if self.height.is_some() != self.row_height.is_some() {
            errors.push("height and row_height must be set together".to_string());
        }
        errors
    }

    /// `self` if valid, otherwise the validation errors.
    pub fn validated(self) -> Result<Self, OptionsError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(OptionsError::Validation(errors))
        }
    }

    #[must_use]
    pub const fn is_multiple(&self) -> bool {
        matches!(self.selection, SelectionMode::Multiple)
    }

    #[must_use]
    pub const fn is_strict(&self) -> bool {
        matches!(self.check_mode, CheckMode::Strict)
    }

    /// Viewport described by the height options.
    #[must_use]
    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.height, self.row_height, self.virtual_list)
    }
}

/// Visual-only row predicate.
pub type FilterFn = Arc<dyn Fn(&RowStatus) -> bool + Send + Sync>;

/// Full tree configuration.
#[derive(Clone, Default)]
pub struct TreeConfig {
    options: TreeOptions,
    loader: Option<Arc<dyn LoadData>>,
    filter: Option<FilterFn>,
    icon: Option<RenderHook<String>>,
    switcher_icon: Option<RenderHook<String>>,
}

impl TreeConfig {
    #[must_use]
    pub fn new(options: TreeOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Enable lazy loading with the given loader.
    #[must_use]
    pub fn with_loader(mut self, loader: impl LoadData + 'static) -> Self {
        self.loader = Some(Arc::new(loader));
        self
    }

    /// Highlight rows matching `filter`. Does not hide rows.
    #[must_use]
    pub fn with_filter(
        mut self,
        filter: impl Fn(&RowStatus) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Tree-wide icon, used when a node has none.
    #[must_use]
    pub fn with_icon(mut self, icon: RenderHook<String>) -> Self {
        self.icon = Some(icon);
        self
    }

    /// Tree-wide switcher icon, used when a node has none.
    #[must_use]
    pub fn with_switcher_icon(mut self, icon: RenderHook<String>) -> Self {
        self.switcher_icon = Some(icon);
        self
    }

    #[must_use]
    pub fn with_selection(mut self, mode: SelectionMode) -> Self {
        self.options.selection = mode;
        self
    }

    #[must_use]
    pub fn with_check_mode(mut self, mode: CheckMode) -> Self {
        self.options.check_mode = mode;
        self
    }

    #[must_use]
    pub fn with_checkable(mut self, checkable: bool) -> Self {
        self.options.checkable = checkable;
        self
    }

    #[must_use]
    pub fn with_selectable(mut self, selectable: bool) -> Self {
        self.options.selectable = selectable;
        self
    }

    #[must_use]
    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.options.disabled = disabled;
        self
    }

    #[must_use]
    pub fn with_default_expand_all(mut self, expand_all: bool) -> Self {
        self.options.default_expand_all = expand_all;
        self
    }

    #[must_use]
    pub fn with_default_expand_parent(mut self, expand_parent: bool) -> Self {
        self.options.default_expand_parent = expand_parent;
        self
    }

    #[must_use]
    pub fn with_auto_expand_parent(mut self, auto: bool) -> Self {
        self.options.auto_expand_parent = auto;
        self
    }

    /// Fixed row height and viewport height, enabling virtualization.
    #[must_use]
    pub fn with_heights(mut self, row_height: u16, height: u16) -> Self {
        self.options.row_height = Some(row_height);
        self.options.height = Some(height);
        self
    }

    #[must_use]
    pub fn with_motion(mut self, motion: bool) -> Self {
        self.options.motion = motion;
        self
    }

    #[must_use]
    pub fn options(&self) -> &TreeOptions {
        &self.options
    }

    #[must_use]
    pub fn loader(&self) -> Option<&Arc<dyn LoadData>> {
        self.loader.as_ref()
    }

    /// Whether lazy loading is configured.
    #[must_use]
    pub fn is_lazy(&self) -> bool {
        self.loader.is_some()
    }

    #[must_use]
    pub fn filter(&self) -> Option<&FilterFn> {
        self.filter.as_ref()
    }

    #[must_use]
    pub fn icon(&self) -> Option<&RenderHook<String>> {
        self.icon.as_ref()
    }

    #[must_use]
    pub fn switcher_icon(&self) -> Option<&RenderHook<String>> {
        self.switcher_icon.as_ref()
    }
}

impl fmt::Debug for TreeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeConfig")
            .field("options", &self.options)
            .field("lazy", &self.loader.is_some())
            .field("filter", &self.filter.is_some())
            .field("icon", &self.icon)
            .field("switcher_icon", &self.switcher_icon)
            .finish()
    }
}
