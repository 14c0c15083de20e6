//! Scrollbar binding surface
//!
//! Builds the generated scrollbar structure (root > track > handle, one per
//! axis), keeps handle geometry bound to the viewport's scroll state, and
//! runs the auto-hide state machine. All visual state is expressed through
//! the reserved class names; themes and host styling hang off those.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{debug, trace};

use veneer_core::TimerKey;

use crate::context::Context;
use crate::markers;
use crate::options::{AutoHide, Options, OptionsDiff, ScrollbarsVisibility};
use crate::structure::elements::StructureElements;
use crate::structure::update::{OverflowState, UpdateHints};
use crate::tree::{events, ElementId, EventBinding, StyleUnit, Tree};

/// Generated elements of one scrollbar.
#[derive(Debug, Clone, Copy)]
pub struct ScrollbarElements {
    pub root: ElementId,
    pub track: ElementId,
    pub handle: ElementId,
}

/// One generated root>track>handle structure per axis. The first pair is
/// the primary; clones registered later follow every refresh.
struct ScrollbarPair {
    horizontal: ScrollbarElements,
    vertical: ScrollbarElements,
}

struct ScrollbarsInner {
    ctx: Context,
    elements: StructureElements,
    pairs: RefCell<Vec<ScrollbarPair>>,
    auto_hide: Cell<AutoHide>,
    auto_hide_delay: Cell<u64>,
    hide_timer: Cell<Option<TimerKey>>,
    theme: RefCell<Option<String>>,
    bindings: RefCell<Vec<EventBinding>>,
    destroyed: Cell<bool>,
}

/// Owns the scrollbar structure for one scroll area. Cheap to clone.
#[derive(Clone)]
pub struct Scrollbars {
    inner: Rc<ScrollbarsInner>,
}

fn build_scrollbar(tree: &Tree, host: ElementId, axis_class: &str) -> ScrollbarElements {
    let root = tree.create_div();
    tree.add_class(root, markers::CLASS_SCROLLBAR);
    tree.add_class(root, axis_class);
    let track = tree.create_div();
    tree.add_class(track, markers::CLASS_SCROLLBAR_TRACK);
    let handle = tree.create_div();
    tree.add_class(handle, markers::CLASS_SCROLLBAR_HANDLE);
    tree.append_child(track, handle);
    tree.append_child(root, track);
    tree.append_child(host, root);
    ScrollbarElements { root, track, handle }
}

fn each_root(inner: &ScrollbarsInner, f: impl Fn(ElementId)) {
    for pair in inner.pairs.borrow().iter() {
        f(pair.horizontal.root);
        f(pair.vertical.root);
    }
}

// ============================================================================
// Auto-hide state machine
// ============================================================================

fn show(inner: &ScrollbarsInner) {
    if let Some(timer) = inner.hide_timer.take() {
        inner.ctx.scheduler().cancel(timer);
    }
    let tree = inner.ctx.tree();
    each_root(inner, |root| {
        tree.remove_class(root, markers::CLASS_SCROLLBAR_AUTO_HIDE_HIDDEN);
    });
}

fn hide_now(inner: &ScrollbarsInner) {
    let tree = inner.ctx.tree();
    each_root(inner, |root| {
        tree.add_class(root, markers::CLASS_SCROLLBAR_AUTO_HIDE_HIDDEN);
    });
}

fn schedule_hide(inner: &Rc<ScrollbarsInner>) {
    if let Some(timer) = inner.hide_timer.take() {
        inner.ctx.scheduler().cancel(timer);
    }
    let timer_inner = Rc::clone(inner);
    let timer = inner
        .ctx
        .scheduler()
        .set_timeout(inner.auto_hide_delay.get(), move || {
            trace!("auto-hide timeout");
            timer_inner.hide_timer.set(None);
            hide_now(&timer_inner);
        });
    inner.hide_timer.set(Some(timer));
}

/// (Re-)enter the behavior's resting state. `Never` pins the scrollbars
/// shown; every other behavior lets them idle out after the delay.
fn apply_auto_hide(inner: &Rc<ScrollbarsInner>, behavior: AutoHide) {
    inner.auto_hide.set(behavior);
    match behavior {
        AutoHide::Never => show(inner),
        AutoHide::Scroll | AutoHide::Leave | AutoHide::Move => {
            show(inner);
            schedule_hide(inner);
        }
    }
}

fn on_scroll(inner: &Rc<ScrollbarsInner>) {
    refresh_handle_geometry(inner);
    if inner.auto_hide.get() == AutoHide::Scroll {
        show(inner);
        schedule_hide(inner);
    }
}

fn on_pointer_enter(inner: &Rc<ScrollbarsInner>) {
    if matches!(inner.auto_hide.get(), AutoHide::Leave | AutoHide::Move) {
        show(inner);
    }
}

fn on_pointer_leave(inner: &Rc<ScrollbarsInner>) {
    if matches!(inner.auto_hide.get(), AutoHide::Leave | AutoHide::Move) {
        schedule_hide(inner);
    }
}

fn on_pointer_move(inner: &Rc<ScrollbarsInner>) {
    if inner.auto_hide.get() == AutoHide::Move {
        show(inner);
        schedule_hide(inner);
    }
}

// ============================================================================
// Handle geometry
// ============================================================================

/// Bind handle length and offset to the current scroll state. Length is
/// `client / scroll` of the axis clamped into `[0, 1]`; offset distributes
/// the remaining track space by scroll progress, flipped for RTL.
fn refresh_handle_geometry(inner: &ScrollbarsInner) {
    let tree = inner.ctx.tree();
    let vp = inner.elements.viewport;
    let metrics = tree.metrics(vp);
    let max = tree.max_scroll(vp);
    let scroll = tree.scroll_position(vp);
    let rtl = tree
        .style(inner.elements.host)
        .direction_rtl
        .unwrap_or_else(|| tree.direction_rtl());

    let ratio = |client: f32, scroll_size: f32| {
        if scroll_size > 0.0 {
            (client / scroll_size).clamp(0.0, 1.0)
        } else {
            1.0
        }
    };
    let progress = |position: f32, max: f32| {
        if max > 0.0 {
            (position / max).abs().clamp(0.0, 1.0)
        } else {
            0.0
        }
    };

    let h_len = ratio(metrics.client.w, metrics.scroll_size.w);
    let mut h_progress = progress(scroll.x, max.x);
    if rtl {
        h_progress = 1.0 - h_progress;
    }
    let h_handle_px = h_len * metrics.client.w;
    let h_margin = h_progress * (metrics.client.w - h_handle_px);

    let v_len = ratio(metrics.client.h, metrics.scroll_size.h);
    let v_progress = progress(scroll.y, max.y);
    let v_handle_px = v_len * metrics.client.h;
    let v_margin = v_progress * (metrics.client.h - v_handle_px);

    for pair in inner.pairs.borrow().iter() {
        tree.edit_style(pair.horizontal.handle, |s| {
            s.width = StyleUnit::Px(h_handle_px);
            s.margin.l = h_margin;
        });
        tree.edit_style(pair.vertical.handle, |s| {
            s.height = StyleUnit::Px(v_handle_px);
            s.margin.t = v_margin;
        });
        tree.toggle_class(
            pair.horizontal.root,
            markers::CLASS_SCROLLBAR_UNUSABLE,
            h_len >= 1.0,
        );
        tree.toggle_class(
            pair.vertical.root,
            markers::CLASS_SCROLLBAR_UNUSABLE,
            v_len >= 1.0,
        );
        tree.toggle_class(pair.horizontal.root, markers::CLASS_SCROLLBAR_RTL, rtl);
        tree.toggle_class(pair.vertical.root, markers::CLASS_SCROLLBAR_RTL, rtl);
    }
}

impl Scrollbars {
    /// Build the scrollbar structure and wire up the auto-hide inputs.
    pub fn new(ctx: &Context, elements: StructureElements, options: &Options) -> Self {
        let tree = ctx.tree();
        let horizontal = build_scrollbar(tree, elements.host, markers::CLASS_SCROLLBAR_HORIZONTAL);
        let vertical = build_scrollbar(tree, elements.host, markers::CLASS_SCROLLBAR_VERTICAL);

        let inner = Rc::new(ScrollbarsInner {
            ctx: ctx.clone(),
            elements,
            pairs: RefCell::new(vec![ScrollbarPair {
                horizontal,
                vertical,
            }]),
            auto_hide: Cell::new(options.scrollbars.auto_hide),
            auto_hide_delay: Cell::new(options.scrollbars.auto_hide_delay),
            hide_timer: Cell::new(None),
            theme: RefCell::new(None),
            bindings: RefCell::new(Vec::new()),
            destroyed: Cell::new(false),
        });

        let mut bindings = Vec::new();
        let scroll_inner = Rc::clone(&inner);
        bindings.push(tree.on(elements.scroll_event_element(), events::SCROLL, move |_| {
            on_scroll(&scroll_inner);
        }));
        let enter_inner = Rc::clone(&inner);
        bindings.push(tree.on(elements.host, events::POINTER_ENTER, move |_| {
            on_pointer_enter(&enter_inner);
        }));
        let leave_inner = Rc::clone(&inner);
        bindings.push(tree.on(elements.host, events::POINTER_LEAVE, move |_| {
            on_pointer_leave(&leave_inner);
        }));
        let move_inner = Rc::clone(&inner);
        bindings.push(tree.on(elements.host, events::POINTER_MOVE, move |_| {
            on_pointer_move(&move_inner);
        }));
        *inner.bindings.borrow_mut() = bindings;

        let scrollbars = Self { inner };
        scrollbars.apply_options(options, true);
        apply_auto_hide(&scrollbars.inner, options.scrollbars.auto_hide);
        debug!("scrollbars constructed");
        scrollbars
    }

    pub fn horizontal(&self) -> ScrollbarElements {
        self.inner.pairs.borrow()[0].horizontal
    }

    pub fn vertical(&self) -> ScrollbarElements {
        self.inner.pairs.borrow()[0].vertical
    }

    /// Generate an additional scrollbar pair bound to the same viewport,
    /// appended under `parent`. The clone mirrors the primary pair's class
    /// and geometry state immediately and follows every later refresh.
    pub fn clone_scrollbars(&self, parent: ElementId) -> (ScrollbarElements, ScrollbarElements) {
        let inner = &self.inner;
        let tree = inner.ctx.tree();
        let horizontal = build_scrollbar(tree, parent, markers::CLASS_SCROLLBAR_HORIZONTAL);
        let vertical = build_scrollbar(tree, parent, markers::CLASS_SCROLLBAR_VERTICAL);
        {
            let pairs = inner.pairs.borrow();
            let primary = &pairs[0];
            let mirror = |from: &ScrollbarElements, to: &ScrollbarElements| {
                let classes = tree.attr(from.root, "class").unwrap_or_default();
                tree.set_attr(to.root, "class", &classes);
                tree.set_style(to.handle, tree.style(from.handle));
            };
            mirror(&primary.horizontal, &horizontal);
            mirror(&primary.vertical, &vertical);
        }
        inner.pairs.borrow_mut().push(ScrollbarPair {
            horizontal,
            vertical,
        });
        debug!("scrollbar pair cloned");
        (horizontal, vertical)
    }

    /// React to one finished update cycle.
    pub fn refresh(
        &self,
        options: &Options,
        state: &OverflowState,
        hints: &UpdateHints,
        diff: &OptionsDiff,
    ) {
        let inner = &self.inner;
        let tree = inner.ctx.tree();

        if hints.overflow_amount_changed
            || hints.overflow_edge_changed
            || hints.size_changed
            || hints.direction_changed
            || hints.forced
        {
            refresh_handle_geometry(inner);
        }

        let visible = |axis_overflows: bool| match options.scrollbars.visibility {
            ScrollbarsVisibility::Visible => true,
            ScrollbarsVisibility::Hidden => false,
            ScrollbarsVisibility::Auto => axis_overflows,
        };
        let visible_x = visible(state.has_overflow.x);
        let visible_y = visible(state.has_overflow.y);
        for pair in inner.pairs.borrow().iter() {
            tree.toggle_class(pair.horizontal.root, markers::CLASS_SCROLLBAR_VISIBLE, visible_x);
            tree.toggle_class(pair.vertical.root, markers::CLASS_SCROLLBAR_VISIBLE, visible_y);
        }

        if diff.scrollbars_theme || diff.scrollbars_interaction || hints.forced {
            self.apply_options(options, false);
        }
        if diff.scrollbars_auto_hide {
            inner.auto_hide_delay.set(options.scrollbars.auto_hide_delay);
            apply_auto_hide(inner, options.scrollbars.auto_hide);
        }
    }

    /// Theme and interaction classes. `initial` suppresses transitions while
    /// the structure first appears.
    fn apply_options(&self, options: &Options, initial: bool) {
        let inner = &self.inner;
        let tree = inner.ctx.tree();
        let mut theme = inner.theme.borrow_mut();
        if *theme != options.scrollbars.theme {
            if let Some(old) = theme.as_deref() {
                each_root(inner, |root| tree.remove_class(root, old));
            }
            if let Some(new) = options.scrollbars.theme.as_deref() {
                each_root(inner, |root| tree.add_class(root, new));
            }
            *theme = options.scrollbars.theme.clone();
        }
        each_root(inner, |root| {
            tree.toggle_class(
                root,
                markers::CLASS_SCROLLBAR_DRAG_SCROLL,
                options.scrollbars.drag_scroll,
            );
            tree.toggle_class(
                root,
                markers::CLASS_SCROLLBAR_CLICK_SCROLL,
                options.scrollbars.click_scroll,
            );
        });
        if initial {
            each_root(inner, |root| {
                tree.add_class(root, markers::CLASS_SCROLLBAR_NO_TRANSITION);
            });
            let release = Rc::clone(inner);
            inner.ctx.scheduler().set_timeout(0, move || {
                let tree = release.ctx.tree();
                each_root(&release, |root| {
                    tree.remove_class(root, markers::CLASS_SCROLLBAR_NO_TRANSITION);
                });
            });
        }
    }

    /// Remove the generated structure and release listeners. Safe to call
    /// repeatedly.
    pub fn destroy(&self) {
        let inner = &self.inner;
        if inner.destroyed.replace(true) {
            return;
        }
        if let Some(timer) = inner.hide_timer.take() {
            inner.ctx.scheduler().cancel(timer);
        }
        let tree = inner.ctx.tree();
        for binding in inner.bindings.borrow_mut().drain(..) {
            tree.off(&binding);
        }
        for pair in inner.pairs.borrow_mut().drain(..) {
            tree.remove(pair.horizontal.root);
            tree.remove(pair.vertical.root);
        }
        debug!("scrollbars destroyed");
    }
}
