//! Reserved attribute and class names
//!
//! Generated structure carries a `data-veneer*` attribute namespace so the
//! observation layer can tell its own mutations apart from user content, and
//! so destruction can find exactly what construction added.

/// Marker attribute on the host element. Its value is a space-separated flag
/// list (`host`, `viewport`, `noInternalConsume`, ...).
pub const DATA_ATTR_HOST: &str = "data-veneer";

/// Marker attribute on the viewport element, also a flag list
/// (`scrollbarHidden`, `arrange`, `measuring`, ...).
pub const DATA_ATTR_VIEWPORT: &str = "data-veneer-viewport";

/// Marker attribute on the padding element.
pub const DATA_ATTR_PADDING: &str = "data-veneer-padding";

/// Marker attribute on the content element.
pub const DATA_ATTR_CONTENT: &str = "data-veneer-content";

/// Set on the target while an update cycle rewrites styles, so the mutation
/// observer can attribute those records to the system itself.
pub const DATA_ATTR_HOST_UPDATING: &str = "data-veneer-updating";

/// Flag value on [`DATA_ATTR_HOST`] when the target doubles as the viewport.
pub const FLAG_VIEWPORT_IS_TARGET: &str = "viewport";

/// Flag value on [`DATA_ATTR_HOST`] marking the host role.
pub const FLAG_HOST: &str = "host";

/// Flag value on [`DATA_ATTR_VIEWPORT`] while native scrollbars are hidden.
pub const FLAG_VIEWPORT_SCROLLBAR_HIDDEN: &str = "scrollbarHidden";

/// Flag value on [`DATA_ATTR_VIEWPORT`] while arrange compensation is active.
pub const FLAG_VIEWPORT_ARRANGE: &str = "arrange";

/// Root class of the scrollbar structure.
pub const CLASS_SCROLLBAR: &str = "vn-scrollbar";
/// Axis classes on the scrollbar root.
pub const CLASS_SCROLLBAR_HORIZONTAL: &str = "vn-scrollbar-horizontal";
pub const CLASS_SCROLLBAR_VERTICAL: &str = "vn-scrollbar-vertical";
/// Track and handle classes inside the scrollbar structure.
pub const CLASS_SCROLLBAR_TRACK: &str = "vn-scrollbar-track";
pub const CLASS_SCROLLBAR_HANDLE: &str = "vn-scrollbar-handle";
/// Toggled by the auto-hide state machine.
pub const CLASS_SCROLLBAR_AUTO_HIDE_HIDDEN: &str = "vn-scrollbar-auto-hide-hidden";
/// Set when the scrollbar cannot be interacted with (no overflow).
pub const CLASS_SCROLLBAR_UNUSABLE: &str = "vn-scrollbar-unusable";
/// Set when the corresponding axis actually overflows.
pub const CLASS_SCROLLBAR_VISIBLE: &str = "vn-scrollbar-visible";
/// RTL direction class on the scrollbar root.
pub const CLASS_SCROLLBAR_RTL: &str = "vn-scrollbar-rtl";
/// Interaction capability classes.
pub const CLASS_SCROLLBAR_CLICK_SCROLL: &str = "vn-scrollbar-click-scroll";
pub const CLASS_SCROLLBAR_DRAG_SCROLL: &str = "vn-scrollbar-drag-scroll";
/// Transitionless class applied during construction and theme swaps.
pub const CLASS_SCROLLBAR_NO_TRANSITION: &str = "vn-scrollbar-no-transition";

/// Applied to the viewport to hide native scrollbars where supported.
pub const CLASS_SCROLLBAR_HIDDEN: &str = "vn-native-scrollbar-hidden";

/// Flexbox-glue class pair used by the environment probe and the trinsic
/// observer: `max` pins children to the full extent, `min` releases them to
/// their intrinsic size.
pub const CLASS_SIZE_FRACTION_MAX: &str = "vn-size-fraction-max";
pub const CLASS_SIZE_FRACTION_MIN: &str = "vn-size-fraction-min";
