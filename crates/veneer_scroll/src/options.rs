//! Instance options
//!
//! Options are fully typed; anything that reaches the engine has already been
//! shaped by construction, so there is no runtime validation layer. Callers
//! apply changes through [`PartialOptions`], which deep-merges over the
//! current values, and the engine consumes an [`OptionsDiff`] to find out
//! what actually changed in a cycle.

use std::rc::Rc;

use crate::tree::MutationRecord;

// ============================================================================
// Overflow
// ============================================================================

/// Per-axis overflow behavior. The `Visible*` variants keep content visible
/// while there is no overflow and degrade to their fallback once content
/// overflows; an axis with a visible variant never computes to `scroll`
/// while the paired axis forces one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowBehavior {
    Hidden,
    #[default]
    Scroll,
    Visible,
    VisibleHidden,
    VisibleScroll,
}

impl OverflowBehavior {
    pub fn is_visible(self) -> bool {
        matches!(
            self,
            OverflowBehavior::Visible
                | OverflowBehavior::VisibleHidden
                | OverflowBehavior::VisibleScroll
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverflowOptions {
    pub x: OverflowBehavior,
    pub y: OverflowBehavior,
}

// ============================================================================
// Scrollbars
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollbarsVisibility {
    Visible,
    Hidden,
    #[default]
    Auto,
}

/// When scrollbars are hidden after inactivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoHide {
    #[default]
    Never,
    Scroll,
    Leave,
    Move,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScrollbarsOptions {
    /// Theme class applied to scrollbar roots.
    pub theme: Option<String>,
    pub visibility: ScrollbarsVisibility,
    pub auto_hide: AutoHide,
    /// Idle delay before hiding, in milliseconds.
    pub auto_hide_delay: u64,
    pub drag_scroll: bool,
    pub click_scroll: bool,
}

impl Default for ScrollbarsOptions {
    fn default() -> Self {
        Self {
            theme: Some("vn-theme-dark".to_string()),
            visibility: ScrollbarsVisibility::default(),
            auto_hide: AutoHide::default(),
            auto_hide_delay: 1300,
            drag_scroll: true,
            click_scroll: false,
        }
    }
}

// ============================================================================
// Update behavior
// ============================================================================

/// Predicate deciding whether a mutation record is ignored by the observation
/// layer. Compared by pointer identity.
#[derive(Clone)]
pub struct IgnoreMutation(pub Rc<dyn Fn(&MutationRecord) -> bool>);

impl IgnoreMutation {
    pub fn new(f: impl Fn(&MutationRecord) -> bool + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn ignores(&self, record: &MutationRecord) -> bool {
        (self.0)(record)
    }
}

impl PartialEq for IgnoreMutation {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for IgnoreMutation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("IgnoreMutation(..)")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOptions {
    /// Content element events that trigger an update, as (tag, event) pairs.
    pub element_events: Option<Vec<(String, String)>>,
    /// Observation debounce as (delay, max wait); `None` disables debouncing.
    pub debounce: Option<(u64, Option<u64>)>,
    /// Extra host attributes (beyond the built-in set) that trigger updates.
    pub attributes: Option<Vec<String>>,
    pub ignore_mutation: Option<IgnoreMutation>,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            element_events: Some(vec![("img".to_string(), "load".to_string())]),
            debounce: Some((0, Some(33))),
            attributes: None,
            ignore_mutation: None,
        }
    }
}

// ============================================================================
// Options root
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Options {
    /// Reapply host padding on the padding element instead of the viewport.
    pub padding_absolute: bool,
    /// Keep native overlay scrollbars visible instead of the custom ones.
    pub show_native_overlaid_scrollbars: bool,
    pub update: UpdateOptions,
    pub overflow: OverflowOptions,
    pub scrollbars: ScrollbarsOptions,
}

/// Sparse options overlay; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct PartialOptions {
    pub padding_absolute: Option<bool>,
    pub show_native_overlaid_scrollbars: Option<bool>,
    pub update_element_events: Option<Option<Vec<(String, String)>>>,
    pub update_debounce: Option<Option<(u64, Option<u64>)>>,
    pub update_attributes: Option<Option<Vec<String>>>,
    pub update_ignore_mutation: Option<Option<IgnoreMutation>>,
    pub overflow_x: Option<OverflowBehavior>,
    pub overflow_y: Option<OverflowBehavior>,
    pub scrollbars_theme: Option<Option<String>>,
    pub scrollbars_visibility: Option<ScrollbarsVisibility>,
    pub scrollbars_auto_hide: Option<AutoHide>,
    pub scrollbars_auto_hide_delay: Option<u64>,
    pub scrollbars_drag_scroll: Option<bool>,
    pub scrollbars_click_scroll: Option<bool>,
}

impl Options {
    /// Deep-merge `partial` over `self`, returning the merged options.
    pub fn merged(&self, partial: &PartialOptions) -> Options {
        let mut next = self.clone();
        if let Some(v) = partial.padding_absolute {
            next.padding_absolute = v;
        }
        if let Some(v) = partial.show_native_overlaid_scrollbars {
            next.show_native_overlaid_scrollbars = v;
        }
        if let Some(v) = &partial.update_element_events {
            next.update.element_events = v.clone();
        }
        if let Some(v) = partial.update_debounce {
            next.update.debounce = v;
        }
        if let Some(v) = &partial.update_attributes {
            next.update.attributes = v.clone();
        }
        if let Some(v) = &partial.update_ignore_mutation {
            next.update.ignore_mutation = v.clone();
        }
        if let Some(v) = partial.overflow_x {
            next.overflow.x = v;
        }
        if let Some(v) = partial.overflow_y {
            next.overflow.y = v;
        }
        if let Some(v) = &partial.scrollbars_theme {
            next.scrollbars.theme = v.clone();
        }
        if let Some(v) = partial.scrollbars_visibility {
            next.scrollbars.visibility = v;
        }
        if let Some(v) = partial.scrollbars_auto_hide {
            next.scrollbars.auto_hide = v;
        }
        if let Some(v) = partial.scrollbars_auto_hide_delay {
            next.scrollbars.auto_hide_delay = v;
        }
        if let Some(v) = partial.scrollbars_drag_scroll {
            next.scrollbars.drag_scroll = v;
        }
        if let Some(v) = partial.scrollbars_click_scroll {
            next.scrollbars.click_scroll = v;
        }
        next
    }

    /// Field-wise change report against a previous snapshot.
    pub fn diff(&self, previous: &Options) -> OptionsDiff {
        OptionsDiff {
            padding_absolute: self.padding_absolute != previous.padding_absolute,
            show_native_overlaid_scrollbars: self.show_native_overlaid_scrollbars
                != previous.show_native_overlaid_scrollbars,
            update: self.update != previous.update,
            overflow: self.overflow != previous.overflow,
            scrollbars_theme: self.scrollbars.theme != previous.scrollbars.theme,
            scrollbars_visibility: self.scrollbars.visibility != previous.scrollbars.visibility,
            scrollbars_auto_hide: self.scrollbars.auto_hide != previous.scrollbars.auto_hide
                || self.scrollbars.auto_hide_delay != previous.scrollbars.auto_hide_delay,
            scrollbars_interaction: self.scrollbars.drag_scroll != previous.scrollbars.drag_scroll
                || self.scrollbars.click_scroll != previous.scrollbars.click_scroll,
        }
    }
}

/// What changed between two options snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OptionsDiff {
    pub padding_absolute: bool,
    pub show_native_overlaid_scrollbars: bool,
    pub update: bool,
    pub overflow: bool,
    pub scrollbars_theme: bool,
    pub scrollbars_visibility: bool,
    pub scrollbars_auto_hide: bool,
    pub scrollbars_interaction: bool,
}

impl OptionsDiff {
    pub fn any(&self) -> bool {
        self.padding_absolute
            || self.show_native_overlaid_scrollbars
            || self.update
            || self.overflow
            || self.scrollbars_theme
            || self.scrollbars_visibility
            || self.scrollbars_auto_hide
            || self.scrollbars_interaction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_unset_fields() {
        let base = Options::default();
        let merged = base.merged(&PartialOptions {
            overflow_x: Some(OverflowBehavior::VisibleHidden),
            scrollbars_auto_hide: Some(AutoHide::Scroll),
            ..Default::default()
        });
        assert_eq!(merged.overflow.x, OverflowBehavior::VisibleHidden);
        assert_eq!(merged.overflow.y, OverflowBehavior::Scroll);
        assert_eq!(merged.scrollbars.auto_hide, AutoHide::Scroll);
        assert_eq!(merged.scrollbars.auto_hide_delay, 1300);
    }

    #[test]
    fn diff_reports_only_changed_sections() {
        let base = Options::default();
        let next = base.merged(&PartialOptions {
            scrollbars_visibility: Some(ScrollbarsVisibility::Hidden),
            ..Default::default()
        });
        let diff = next.diff(&base);
        assert!(diff.scrollbars_visibility);
        assert!(!diff.overflow);
        assert!(!diff.update);
        assert!(diff.any());
        assert!(!base.diff(&base).any());
    }

    #[test]
    fn ignore_mutation_compares_by_identity() {
        let a = IgnoreMutation::new(|_| true);
        let b = IgnoreMutation::new(|_| true);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn merge_can_clear_nested_options() {
        let base = Options::default();
        let merged = base.merged(&PartialOptions {
            update_element_events: Some(None),
            scrollbars_theme: Some(None),
            ..Default::default()
        });
        assert_eq!(merged.update.element_events, None);
        assert_eq!(merged.scrollbars.theme, None);
    }
}
