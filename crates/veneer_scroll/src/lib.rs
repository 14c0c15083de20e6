//! Retained scroll-area engine
//!
//! Replaces an element's native scrolling surface with a managed structure:
//! a viewport that owns the scroll state, generated scrollbars bound to it,
//! and an observation layer that keeps everything consistent as content,
//! options and environment change.
//!
//! The moving parts, bottom up:
//!
//! - [`tree`]: the retained element tree with typed inline styles, layout,
//!   mutation and resize observation, and scroll state
//! - [`platform`]: the capability seam (scrollbar thickness, hiding support,
//!   RTL scroll convention)
//! - [`environment`]: probe-measured platform facts shared by all instances
//! - [`structure`]: skeleton construction, the observation funnel and the
//!   overflow/update engine
//! - [`scrollbars`]: the generated scrollbar surface and auto-hide machine
//! - [`instance`]: the [`ScrollArea`] facade tying it all together
//!
//! Everything is single-threaded and driven by a virtual-time scheduler, so
//! debounce and auto-hide behavior is fully deterministic under test.

pub mod context;
pub mod environment;
pub mod initialization;
pub mod instance;
pub mod markers;
pub mod options;
pub mod platform;
pub mod plugins;
pub mod scrollbars;
pub mod structure;
pub mod tree;

pub use context::Context;
pub use environment::{Environment, EnvironmentEvent, RtlBehavior};
pub use initialization::{CancelInitialization, Initialization, Slot, SlotResolution};
pub use instance::{ScrollArea, ScrollAreaEvent, ScrollAreaState};
pub use options::{
    AutoHide, Options, OptionsDiff, OverflowBehavior, PartialOptions, ScrollbarsVisibility,
};
pub use platform::{DesktopPlatform, Platform, RtlScrollConvention, TestPlatform};
pub use plugins::{PluginRegistry, ViewportArrangePlugin, VIEWPORT_ARRANGE_PLUGIN};
pub use scrollbars::{ScrollbarElements, Scrollbars};
pub use structure::{StructureElements, UpdateHints};
pub use tree::{ElementId, StyleOverflow, StyleUnit, Tag, Tree};

pub use veneer_core::Error;
