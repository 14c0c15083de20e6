//! Environment probe
//!
//! Measured once per context at construction: native scrollbar geometry, RTL
//! scroll coordinate behavior, intrinsic-size glue and scrollbar-hiding
//! support. Nothing is taken on faith from the platform where it can be
//! measured: probes are built in a scratch tree, laid out and read back, so
//! the numbers downstream consumers use are the numbers layout will actually
//! produce.
//!
//! The environment handle is identity-stable: zoom re-measurement mutates the
//! shared state in place, so every holder of the handle observes the new
//! scrollbar size without re-subscribing.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::debug;

use veneer_core::{Debouncer, EventHub, ListenerKey, Scheduler, Wh, Xy};

use crate::initialization::Initialization;
use crate::markers;
use crate::options::{Options, PartialOptions};
use crate::platform::Platform;
use crate::tree::{StyleOverflow, StyleUnit, Tree};

/// Window size must move more than this on both axes before a resize is
/// considered a zoom candidate. Recalibrate if hosts report sub-pixel
/// window deltas during zoom.
pub const ZOOM_WINDOW_DELTA_PX: f32 = 2.0;

/// Zoom scales both axes together; the per-axis delta ratio may drift from
/// 1 by at most this much.
pub const ZOOM_AXIS_RATIO_DELTA: f32 = 1.0;

/// Window resize debounce window.
pub const WINDOW_RESIZE_DEBOUNCE_MS: u64 = 100;

/// Ceiling for continuous window resizing.
pub const WINDOW_RESIZE_DEBOUNCE_MAX_MS: u64 = 300;

/// Measured RTL horizontal scroll behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RtlBehavior {
    /// Offsets grow positive toward the left (origin at the right edge).
    pub invert: bool,
    /// Offsets grow negative toward the left.
    pub negate: bool,
}

/// Payload for environment listeners.
#[derive(Debug, Clone, Copy)]
pub struct EnvironmentEvent {
    /// The measured scrollbar size changed (zoom re-measurement).
    pub scrollbar_size_changed: bool,
}

struct Measured {
    scrollbar_size: Xy<f32>,
    scrollbar_hiding: bool,
    rtl_behavior: RtlBehavior,
    flexbox_glue: bool,
}

struct EnvironmentInner {
    platform: Rc<dyn Platform>,
    scheduler: Scheduler,
    /// Horizontal bar height (`x`), vertical bar width (`y`). In-place
    /// mutation keeps the handle identity-stable across zoom.
    scrollbar_size: Cell<Xy<f32>>,
    scrollbar_hiding: bool,
    rtl_behavior: RtlBehavior,
    flexbox_glue: bool,
    window_size: Cell<Wh>,
    dpr: Cell<f32>,
    default_options: RefCell<Options>,
    default_initialization: RefCell<Initialization>,
    listeners: RefCell<EventHub<EnvironmentEvent>>,
}

/// Shared environment handle. Cheap to clone; all clones observe in-place
/// re-measurements.
#[derive(Clone)]
pub struct Environment {
    inner: Rc<EnvironmentInner>,
    window_resize: Debouncer<()>,
}

fn measure(platform: &Rc<dyn Platform>, scheduler: &Scheduler) -> Measured {
    // Restricted hosts cannot be probed; degrade to the safe defaults.
    if platform.restricted() {
        return Measured {
            scrollbar_size: Xy::splat(0.0),
            scrollbar_hiding: false,
            rtl_behavior: RtlBehavior::default(),
            flexbox_glue: false,
        };
    }

    let tree = Tree::new(scheduler, Rc::clone(platform));
    let probe = tree.create_div();
    tree.edit_style(probe, |s| {
        s.width = StyleUnit::Px(200.0);
        s.height = StyleUnit::Px(200.0);
        s.overflow_x = StyleOverflow::Scroll;
        s.overflow_y = StyleOverflow::Scroll;
    });
    let child = tree.create_div();
    tree.edit_style(child, |s| {
        s.width = StyleUnit::Px(500.0);
        s.height = StyleUnit::Px(500.0);
    });
    tree.append_child(tree.root(), probe);
    tree.append_child(probe, child);
    tree.layout(Wh::new(400.0, 400.0));

    // Scrollbar geometry: border box minus client box, plus the sub-pixel
    // remainder the border box hides.
    let offset = tree.offset_size(probe);
    let client = tree.client_size(probe);
    let fractional = tree.fractional_size(probe);
    let scrollbar_size = Xy::new(
        offset.h - client.h + fractional.h,
        offset.w - client.w + fractional.w,
    );

    // Hiding support: the hiding class removes the gutter entirely.
    tree.add_class(probe, markers::CLASS_SCROLLBAR_HIDDEN);
    tree.layout(Wh::new(400.0, 400.0));
    let hidden_client = tree.client_size(probe);
    let scrollbar_hiding =
        scrollbar_size != Xy::splat(0.0) && hidden_client == tree.offset_size(probe);
    tree.remove_class(probe, markers::CLASS_SCROLLBAR_HIDDEN);
    tree.layout(Wh::new(400.0, 400.0));

    // RTL behavior: assign offsets past both ends and see what sticks.
    tree.edit_style(probe, |s| s.direction_rtl = Some(true));
    tree.set_scroll_left(probe, -999.0);
    let negate = tree.scroll_left(probe) < 0.0;
    tree.set_scroll_left(probe, 999.0);
    let invert = tree.scroll_left(probe) > 0.0;
    let rtl_behavior = RtlBehavior { invert, negate };

    // Intrinsic-size glue: the max class must pin a child to the exact
    // parent extent.
    let glue_parent = tree.create_div();
    tree.edit_style(glue_parent, |s| {
        s.width = StyleUnit::Px(100.0);
        s.height = StyleUnit::Px(100.0);
    });
    let glue_child = tree.create_div();
    tree.add_class(glue_child, markers::CLASS_SIZE_FRACTION_MAX);
    tree.append_child(tree.root(), glue_parent);
    tree.append_child(glue_parent, glue_child);
    tree.layout(Wh::new(400.0, 400.0));
    let flexbox_glue = tree.offset_size(glue_child) == tree.client_size(glue_parent);

    Measured {
        scrollbar_size,
        scrollbar_hiding,
        rtl_behavior,
        flexbox_glue,
    }
}

fn apply_window_resize(inner: &Rc<EnvironmentInner>) {
    let new_window = inner.platform.window_size();
    let new_dpr = inner.platform.device_pixel_ratio();
    let old_window = inner.window_size.get();
    let old_dpr = inner.dpr.get();
    inner.window_size.set(new_window);
    inner.dpr.set(new_dpr);

    let delta = Wh::new(
        (new_window.w - old_window.w).abs(),
        (new_window.h - old_window.h).abs(),
    );
    let both_axes_moved = delta.w > ZOOM_WINDOW_DELTA_PX && delta.h > ZOOM_WINDOW_DELTA_PX;
    let ratio_ok = delta.h > 0.0 && (delta.w / delta.h - 1.0).abs() <= ZOOM_AXIS_RATIO_DELTA;
    let zoomed = new_dpr != old_dpr && both_axes_moved && ratio_ok;
    if !zoomed {
        return;
    }

    // Zoom changes effective scrollbar geometry; re-measure in place so the
    // shared handle stays valid.
    let measured = measure(&inner.platform, &inner.scheduler);
    let changed = measured.scrollbar_size != inner.scrollbar_size.get();
    inner.scrollbar_size.set(measured.scrollbar_size);
    debug!(?delta, changed, "zoom detected, scrollbar size re-measured");
    if changed {
        let listeners = inner.listeners.borrow().snapshot();
        let event = EnvironmentEvent {
            scrollbar_size_changed: true,
        };
        for listener in listeners {
            listener(&event);
        }
    }
}

impl Environment {
    pub fn new(scheduler: &Scheduler, platform: Rc<dyn Platform>) -> Self {
        let measured = measure(&platform, scheduler);
        debug!(
            scrollbar_size = ?measured.scrollbar_size,
            hiding = measured.scrollbar_hiding,
            glue = measured.flexbox_glue,
            "environment probed"
        );
        let inner = Rc::new(EnvironmentInner {
            window_size: Cell::new(platform.window_size()),
            dpr: Cell::new(platform.device_pixel_ratio()),
            scrollbar_size: Cell::new(measured.scrollbar_size),
            scrollbar_hiding: measured.scrollbar_hiding,
            rtl_behavior: measured.rtl_behavior,
            flexbox_glue: measured.flexbox_glue,
            default_options: RefCell::new(Options::default()),
            default_initialization: RefCell::new(Initialization::default()),
            listeners: RefCell::new(EventHub::new()),
            platform,
            scheduler: scheduler.clone(),
        });
        let sink_inner = Rc::clone(&inner);
        let window_resize = Debouncer::new(scheduler, |_, b| b, move |()| {
            apply_window_resize(&sink_inner);
        });
        window_resize.set_delay(
            WINDOW_RESIZE_DEBOUNCE_MS,
            Some(WINDOW_RESIZE_DEBOUNCE_MAX_MS),
        );
        Self {
            inner,
            window_resize,
        }
    }

    /// Measured native scrollbar size: horizontal bar height (`x`), vertical
    /// bar width (`y`). Reads are live; zoom re-measurement is visible here.
    pub fn scrollbar_size(&self) -> Xy<f32> {
        self.inner.scrollbar_size.get()
    }

    /// Per-axis overlay flags (zero measured thickness).
    pub fn scrollbars_overlaid(&self) -> Xy<bool> {
        self.scrollbar_size().map(|v| v == 0.0)
    }

    pub fn scrollbar_hiding_supported(&self) -> bool {
        self.inner.scrollbar_hiding
    }

    pub fn flexbox_glue(&self) -> bool {
        self.inner.flexbox_glue
    }

    pub fn rtl_behavior(&self) -> RtlBehavior {
        self.inner.rtl_behavior
    }

    pub fn platform(&self) -> &Rc<dyn Platform> {
        &self.inner.platform
    }

    /// Register an environment listener.
    pub fn on(&self, listener: impl Fn(&EnvironmentEvent) + 'static) -> ListenerKey {
        self.inner.listeners.borrow_mut().on(listener)
    }

    pub fn off(&self, key: ListenerKey) {
        self.inner.listeners.borrow_mut().off(key);
    }

    /// Report a host window resize. Coalesced; zoom detection and scrollbar
    /// re-measurement run after the debounce window closes.
    pub fn notify_window_resize(&self) {
        self.window_resize.request(());
    }

    /// Snapshot of the current default options.
    pub fn default_options(&self) -> Options {
        self.inner.default_options.borrow().clone()
    }

    /// Deep-merge new defaults. Existing instances keep their snapshot; only
    /// instances constructed afterwards observe the change.
    pub fn set_default_options(&self, partial: &PartialOptions) {
        let mut defaults = self.inner.default_options.borrow_mut();
        *defaults = defaults.merged(partial);
    }

    pub fn default_initialization(&self) -> Initialization {
        self.inner.default_initialization.borrow().clone()
    }

    /// Merge new default initialization over the current one.
    pub fn set_default_initialization(&self, init: Initialization) {
        let mut defaults = self.inner.default_initialization.borrow_mut();
        *defaults = init.merged_over(&defaults);
    }
}
