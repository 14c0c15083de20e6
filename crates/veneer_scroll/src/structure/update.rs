//! Overflow/update engine
//!
//! One update cycle runs a fixed phase order:
//!
//! 1. freeze the scroll position and set the updating marker
//! 2. intrinsic-height fix for the content slot
//! 3. cached padding re-derivation (plain vs absolute)
//! 4. overflow measurement with a DPR-aware epsilon clamp
//! 5. per-axis overflow style resolution (visible-variant guard, cross-axis
//!    coupling, no `scroll` on a non-overflowing axis without hiding support)
//! 6. scrollbar-hiding / arrange compensation
//! 7. one batched style write, scroll restore, marker removal
//! 8. the structured hint record
//!
//! Every measured quantity goes through its own cache cell, so hints report
//! a change exactly when the value actually moved.

use std::cell::{Cell, RefCell};

use tracing::debug;

use veneer_core::{Cache, Trbl, Xy};

use crate::context::Context;
use crate::markers;
use crate::options::{Options, OptionsDiff, OverflowBehavior};
use crate::plugins::{ViewportArrangePlugin, VIEWPORT_ARRANGE_PLUGIN};
use crate::structure::elements::StructureElements;
use crate::structure::observers::ObserversUpdateHints;
use crate::tree::{ElementId, StyleOverflow, StyleUnit, Tree};

/// Sub-pixel overflow below one device pixel is measurement noise, not
/// overflow. Integer ratios keep a small guard against float drift.
fn overflow_epsilon(dpr: f32) -> f32 {
    if dpr.fract() != 0.0 {
        1.0
    } else {
        0.001
    }
}

/// Why an update cycle runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateReason {
    pub observers: ObserversUpdateHints,
    pub changed_options: OptionsDiff,
    pub force: bool,
}

/// What one update cycle changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateHints {
    pub size_changed: bool,
    pub direction_changed: bool,
    pub height_intrinsic_changed: bool,
    pub overflow_edge_changed: bool,
    pub overflow_amount_changed: bool,
    pub overflow_style_changed: bool,
    pub host_mutated: bool,
    pub content_mutated: bool,
    pub forced: bool,
}

/// Full-replacement snapshot of the measured overflow state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OverflowState {
    /// Maximum scroll offset per axis.
    pub overflow_edge: Xy<f32>,
    /// Clipped overflow in pixels per axis; never negative.
    pub overflow_amount: Xy<f32>,
    /// Applied overflow keyword per axis.
    pub overflow_style: Xy<StyleOverflow>,
    pub has_overflow: Xy<bool>,
    pub padding: Trbl,
    pub padding_absolute: bool,
    pub direction_rtl: bool,
}

fn visible_behavior(behavior: OverflowBehavior) -> bool {
    matches!(
        behavior,
        OverflowBehavior::Visible
            | OverflowBehavior::VisibleHidden
            | OverflowBehavior::VisibleScroll
    )
}

/// Per-axis overflow style resolution.
///
/// A visible-variant axis keeps its native `visible` overflow; it only
/// degrades to `hidden` when it overflows while the paired axis carries
/// non-visible overflow of its own (double scrollbar pressure), and it
/// never computes to `scroll`. Without hiding support an axis that does
/// not overflow never asks for `scroll` either (spurious native
/// scrollbar flicker).
fn resolve_axis(
    behavior: OverflowBehavior,
    has_overflow: bool,
    paired_non_visible_overflow: bool,
    hiding_supported: bool,
) -> StyleOverflow {
    match behavior {
        OverflowBehavior::Hidden => StyleOverflow::Hidden,
        OverflowBehavior::Scroll => {
            if has_overflow || hiding_supported {
                StyleOverflow::Scroll
            } else {
                StyleOverflow::Hidden
            }
        }
        OverflowBehavior::Visible
        | OverflowBehavior::VisibleHidden
        | OverflowBehavior::VisibleScroll => {
            if has_overflow && paired_non_visible_overflow {
                StyleOverflow::Hidden
            } else {
                StyleOverflow::Visible
            }
        }
    }
}

/// Add or remove one flag in the viewport marker attribute without
/// disturbing the other flags.
fn set_viewport_flag(tree: &Tree, vp: ElementId, flag: &str, on: bool) {
    let current = tree.attr(vp, markers::DATA_ATTR_VIEWPORT).unwrap_or_default();
    let mut flags: Vec<&str> = current.split_whitespace().filter(|f| *f != flag).collect();
    if on {
        flags.push(flag);
    }
    tree.set_attr(vp, markers::DATA_ATTR_VIEWPORT, &flags.join(" "));
}

pub struct StructureUpdater {
    ctx: Context,
    elements: StructureElements,
    padding_cache: RefCell<Cache<(Trbl, bool)>>,
    amount_cache: RefCell<Cache<Xy<f32>>>,
    style_cache: RefCell<Cache<Xy<StyleOverflow>>>,
    edge_cache: RefCell<Cache<Xy<f32>>>,
    direction_cache: RefCell<Cache<bool>>,
    hiding_applied: Cell<bool>,
    arrange_active: Cell<bool>,
    state: RefCell<OverflowState>,
}

impl StructureUpdater {
    pub fn new(ctx: &Context, elements: StructureElements) -> Self {
        Self {
            ctx: ctx.clone(),
            elements,
            padding_cache: RefCell::new(Cache::new((Trbl::ZERO, false)).always_changed()),
            amount_cache: RefCell::new(Cache::new(Xy::splat(0.0))),
            style_cache: RefCell::new(Cache::new(Xy::splat(StyleOverflow::Visible))),
            edge_cache: RefCell::new(Cache::new(Xy::splat(0.0))),
            direction_cache: RefCell::new(Cache::new(false)),
            hiding_applied: Cell::new(false),
            arrange_active: Cell::new(false),
            state: RefCell::new(OverflowState::default()),
        }
    }

    /// Snapshot of the state produced by the last cycle.
    pub fn state(&self) -> OverflowState {
        *self.state.borrow()
    }

    /// Run one full update cycle.
    pub fn update(&self, options: &Options, reason: &UpdateReason) -> UpdateHints {
        let tree = self.ctx.tree();
        let env = self.ctx.environment();
        let e = self.elements;
        let vp = e.viewport;
        let force = reason.force;

        // 1. Freeze scroll, mark the cycle so observers can attribute churn.
        let frozen_scroll = tree.scroll_position(vp);
        tree.set_attr(e.host, markers::DATA_ATTR_HOST_UPDATING, "");

        let rtl = tree
            .style(e.host)
            .direction_rtl
            .unwrap_or_else(|| tree.direction_rtl());
        let direction = self.direction_cache.borrow_mut().update_forced(rtl, force);

        // 2. Intrinsic height fix: without fraction-class glue the content
        // slot's `min` class cannot release children to their intrinsic
        // height, so the style is pinned directly each cycle.
        if !env.flexbox_glue() {
            if let Some(content) = e.content {
                tree.edit_style(content, |s| s.height = StyleUnit::Auto);
            }
        }

        // 3. Padding: plain mode extends the viewport under the host padding
        // with negative margins and re-applies it inside, so scrollbars span
        // the full host box. Absolute mode leaves the padding outside the
        // scroll bounds.
        let author_padding = tree.style(e.target).padding;
        self.padding_cache.borrow_mut().update_forced(
            (author_padding, options.padding_absolute),
            force || reason.changed_options.padding_absolute,
        );
        let (vp_margin, vp_padding) = if options.padding_absolute || e.viewport_is_target {
            (Trbl::ZERO, Trbl::ZERO)
        } else {
            (
                Trbl::new(
                    -author_padding.t,
                    -author_padding.r,
                    -author_padding.b,
                    -author_padding.l,
                ),
                author_padding,
            )
        };

        // 6 (part one). Hiding / arrange decisions change the gutter, so they
        // land before measurement.
        let overlaid = env.scrollbars_overlaid();
        let keep_native_overlaid =
            options.show_native_overlaid_scrollbars && overlaid.x && overlaid.y;
        let use_hiding = env.scrollbar_hiding_supported() && !keep_native_overlaid;
        if use_hiding != self.hiding_applied.replace(use_hiding) {
            tree.toggle_class(vp, markers::CLASS_SCROLLBAR_HIDDEN, use_hiding);
            set_viewport_flag(tree, vp, markers::FLAG_VIEWPORT_SCROLLBAR_HIDDEN, use_hiding);
        }
        let arrange_plugin = self
            .ctx
            .plugins()
            .get::<ViewportArrangePlugin>(VIEWPORT_ARRANGE_PLUGIN);
        let want_arrange = !env.scrollbar_hiding_supported()
            && !keep_native_overlaid
            && !(overlaid.x && overlaid.y)
            && !e.viewport_is_target
            && arrange_plugin
                .as_ref()
                .is_some_and(|p| p.applies(env.scrollbar_size()));

        // 2 + 4. Measure with both axes forced scrollable so potential
        // overflow is observable regardless of the final style.
        tree.edit_style(vp, |s| {
            s.overflow_x = StyleOverflow::Scroll;
            s.overflow_y = StyleOverflow::Scroll;
            s.margin = vp_margin;
            s.padding = vp_padding;
        });
        if want_arrange != self.arrange_active.replace(want_arrange) {
            tree.set_gutter_suppressed(vp, want_arrange);
            set_viewport_flag(tree, vp, markers::FLAG_VIEWPORT_ARRANGE, want_arrange);
        }
        self.ctx.relayout();

        let metrics = tree.metrics(vp);
        let epsilon = overflow_epsilon(env.platform().device_pixel_ratio());
        let clamp = |v: f32| if v < epsilon { 0.0 } else { v };
        let raw_amount = Xy::new(
            clamp((metrics.scroll_size.w - metrics.client.w).max(0.0)),
            clamp((metrics.scroll_size.h - metrics.client.h).max(0.0)),
        );
        let amount = self
            .amount_cache
            .borrow_mut()
            .update_forced(raw_amount, force);
        let has_overflow = Xy::new(amount.value.x > 0.0, amount.value.y > 0.0);

        // 5. Final overflow keywords. Coupling evaluates each axis against
        // the paired axis's measured non-visible overflow, so two visible
        // variants never suppress each other.
        let hiding = env.scrollbar_hiding_supported();
        let non_visible_overflow_x = !visible_behavior(options.overflow.x) && has_overflow.x;
        let non_visible_overflow_y = !visible_behavior(options.overflow.y) && has_overflow.y;
        let style_x = resolve_axis(
            options.overflow.x,
            has_overflow.x,
            non_visible_overflow_y,
            hiding,
        );
        let style_y = resolve_axis(
            options.overflow.y,
            has_overflow.y,
            non_visible_overflow_x,
            hiding,
        );
        let style = self
            .style_cache
            .borrow_mut()
            .update_forced(Xy::new(style_x, style_y), force);

        // 6 (part two). Arrange compensation sized to the measured thickness.
        let (arrange_margin, arrange_padding) = match (&arrange_plugin, want_arrange) {
            (Some(plugin), true) => plugin.compensation(
                env.scrollbar_size(),
                Xy::new(
                    style_x == StyleOverflow::Scroll,
                    style_y == StyleOverflow::Scroll,
                ),
                rtl,
            ),
            _ => (Trbl::ZERO, Trbl::ZERO),
        };

        // 7. One batched style write, then restore what the cycle froze.
        tree.edit_style(vp, |s| {
            s.overflow_x = style_x;
            s.overflow_y = style_y;
            s.margin = Trbl::new(
                vp_margin.t + arrange_margin.t,
                vp_margin.r + arrange_margin.r,
                vp_margin.b + arrange_margin.b,
                vp_margin.l + arrange_margin.l,
            );
            s.padding = Trbl::new(
                vp_padding.t + arrange_padding.t,
                vp_padding.r + arrange_padding.r,
                vp_padding.b + arrange_padding.b,
                vp_padding.l + arrange_padding.l,
            );
        });
        self.ctx.relayout();
        let edge = self
            .edge_cache
            .borrow_mut()
            .update_forced(tree.max_scroll(vp), force);
        tree.set_scroll_position(vp, frozen_scroll);
        tree.remove_attr(e.host, markers::DATA_ATTR_HOST_UPDATING);

        *self.state.borrow_mut() = OverflowState {
            overflow_edge: edge.value,
            overflow_amount: amount.value,
            overflow_style: style.value,
            has_overflow,
            padding: author_padding,
            padding_absolute: options.padding_absolute,
            direction_rtl: rtl,
        };

        let hints = UpdateHints {
            size_changed: reason.observers.size_changed || force,
            direction_changed: direction.changed,
            height_intrinsic_changed: reason.observers.content_size_changed,
            overflow_edge_changed: edge.changed,
            overflow_amount_changed: amount.changed,
            overflow_style_changed: style.changed,
            host_mutated: reason.observers.host_mutation,
            content_mutated: reason.observers.content_mutation,
            forced: force,
        };
        debug!(?hints, "update cycle complete");
        hints
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::initialization::Initialization;
    use crate::platform::TestPlatform;
    use crate::structure::elements::StructureSetup;
    use std::rc::Rc;

    fn fixture_with(
        platform: TestPlatform,
        content_size: (f32, f32),
    ) -> (Context, StructureSetup, StructureUpdater, ElementId) {
        let ctx = Context::new(Rc::new(platform));
        let tree = ctx.tree();
        let target = tree.create_div();
        tree.edit_style(target, |s| {
            s.width = StyleUnit::Px(200.0);
            s.height = StyleUnit::Px(200.0);
        });
        let content = tree.create_div();
        tree.edit_style(content, |s| {
            s.width = StyleUnit::Px(content_size.0);
            s.height = StyleUnit::Px(content_size.1);
        });
        tree.append_child(target, content);
        tree.append_child(tree.root(), target);
        let setup = StructureSetup::create(&ctx, target, &Initialization::default()).unwrap();
        setup.append(&ctx);
        let updater = StructureUpdater::new(&ctx, setup.elements);
        (ctx, setup, updater, content)
    }

    fn fixture(content_size: (f32, f32)) -> (Context, StructureSetup, StructureUpdater, ElementId) {
        fixture_with(TestPlatform::new(), content_size)
    }

    #[test]
    fn overflow_amount_for_oversized_content() {
        let (_ctx, _setup, updater, _) = fixture((500.0, 500.0));
        let options = Options::default();
        let hints = updater.update(&options, &UpdateReason::default());
        let state = updater.state();
        // 500 of content in a 200 box: roughly 300 per axis, give or take
        // one native scrollbar thickness depending on gutter state.
        assert!((state.overflow_amount.x - 300.0).abs() <= 15.0);
        assert!((state.overflow_amount.y - 300.0).abs() <= 15.0);
        assert!(state.has_overflow.x && state.has_overflow.y);
        assert!(hints.overflow_amount_changed);
        assert_eq!(state.overflow_style, Xy::splat(StyleOverflow::Scroll));
    }

    #[test]
    fn overflow_amount_clamps_to_zero_for_small_content() {
        let (_ctx, _setup, updater, _) = fixture((100.0, 100.0));
        let options = Options::default();
        updater.update(&options, &UpdateReason::default());
        let state = updater.state();
        assert_eq!(state.overflow_amount, Xy::splat(0.0));
        assert!(!state.has_overflow.x && !state.has_overflow.y);
    }

    #[test]
    fn second_identical_cycle_reports_no_amount_change() {
        let (_ctx, _setup, updater, _) = fixture((500.0, 500.0));
        let options = Options::default();
        updater.update(&options, &UpdateReason::default());
        let hints = updater.update(&options, &UpdateReason::default());
        assert!(!hints.overflow_amount_changed);
        assert!(!hints.overflow_style_changed);
        assert!(!hints.overflow_edge_changed);
    }

    #[test]
    fn forced_cycle_reports_everything_changed() {
        let (_ctx, _setup, updater, _) = fixture((500.0, 500.0));
        let options = Options::default();
        updater.update(&options, &UpdateReason::default());
        let hints = updater.update(
            &options,
            &UpdateReason {
                force: true,
                ..Default::default()
            },
        );
        assert!(hints.forced);
        assert!(hints.overflow_amount_changed);
        assert!(hints.size_changed);
    }

    #[test]
    fn visible_variant_never_computes_scroll() {
        let (_ctx, _setup, updater, _) = fixture((500.0, 500.0));
        let mut options = Options::default();
        options.overflow.x = OverflowBehavior::VisibleScroll;
        options.overflow.y = OverflowBehavior::VisibleHidden;
        updater.update(&options, &UpdateReason::default());
        let state = updater.state();
        assert_ne!(state.overflow_style.x, StyleOverflow::Scroll);
        assert_ne!(state.overflow_style.y, StyleOverflow::Scroll);
    }

    #[test]
    fn cross_axis_overflow_pressure_hides_a_visible_axis() {
        // Both axes overflow; only x asks for a scrollbar.
        let (_ctx, _setup, updater, _) = fixture((500.0, 500.0));
        let mut options = Options::default();
        options.overflow.x = OverflowBehavior::Scroll;
        options.overflow.y = OverflowBehavior::Visible;
        updater.update(&options, &UpdateReason::default());
        let state = updater.state();
        assert_eq!(state.overflow_style.x, StyleOverflow::Scroll);
        assert_eq!(state.overflow_style.y, StyleOverflow::Hidden);
    }

    #[test]
    fn visible_axis_without_any_overflow_stays_visible() {
        let (_ctx, _setup, updater, _) = fixture((100.0, 100.0));
        let mut options = Options::default();
        options.overflow.x = OverflowBehavior::Visible;
        options.overflow.y = OverflowBehavior::Scroll;
        updater.update(&options, &UpdateReason::default());
        let state = updater.state();
        assert_eq!(state.overflow_style.x, StyleOverflow::Visible);
        assert_eq!(state.overflow_style.y, StyleOverflow::Scroll);
    }

    #[test]
    fn both_visible_axes_with_overflow_stay_visible() {
        let (_ctx, _setup, updater, _) = fixture((500.0, 500.0));
        let mut options = Options::default();
        options.overflow.x = OverflowBehavior::Visible;
        options.overflow.y = OverflowBehavior::VisibleScroll;
        updater.update(&options, &UpdateReason::default());
        let state = updater.state();
        assert_eq!(state.overflow_style, Xy::splat(StyleOverflow::Visible));
    }

    #[test]
    fn visible_axis_without_own_overflow_is_not_coupled() {
        // Content overflows horizontally only; y never feels pressure.
        let (_ctx, _setup, updater, _) = fixture((500.0, 100.0));
        let mut options = Options::default();
        options.overflow.x = OverflowBehavior::Scroll;
        options.overflow.y = OverflowBehavior::Visible;
        updater.update(&options, &UpdateReason::default());
        let state = updater.state();
        assert_eq!(state.overflow_style.x, StyleOverflow::Scroll);
        assert_eq!(state.overflow_style.y, StyleOverflow::Visible);
    }

    #[test]
    fn viewport_flag_writes_preserve_unrelated_flags() {
        let (ctx, setup, updater, _) = fixture((500.0, 500.0));
        let vp = setup.elements.viewport;
        ctx.tree().set_attr(vp, markers::DATA_ATTR_VIEWPORT, "measuring");
        updater.update(&Options::default(), &UpdateReason::default());
        let flags = ctx.tree().attr(vp, markers::DATA_ATTR_VIEWPORT).unwrap();
        assert!(flags.contains("measuring"));
        assert!(flags.contains(markers::FLAG_VIEWPORT_SCROLLBAR_HIDDEN));
    }

    #[test]
    fn missing_size_glue_pins_content_height_each_cycle() {
        let (ctx, setup, updater, _) =
            fixture_with(TestPlatform::new().with_restricted(), (500.0, 500.0));
        let content = setup.elements.content.unwrap();
        ctx.tree()
            .edit_style(content, |s| s.height = StyleUnit::Percent(100.0));
        updater.update(&Options::default(), &UpdateReason::default());
        assert_eq!(ctx.tree().style(content).height, StyleUnit::Auto);
    }

    #[test]
    fn no_scroll_keyword_without_overflow_when_hiding_unsupported() {
        let (_ctx, _setup, updater, _) =
            fixture_with(TestPlatform::new().without_hiding(), (100.0, 100.0));
        let options = Options::default(); // overflow scroll/scroll
        updater.update(&options, &UpdateReason::default());
        let state = updater.state();
        assert_eq!(state.overflow_style, Xy::splat(StyleOverflow::Hidden));
    }

    #[test]
    fn scroll_position_survives_an_update_cycle() {
        let (ctx, setup, updater, _) = fixture((500.0, 500.0));
        let options = Options::default();
        updater.update(&options, &UpdateReason::default());
        let vp = setup.elements.viewport;
        ctx.tree().set_scroll_position(vp, veneer_core::Xy::new(120.0, 80.0));
        updater.update(&options, &UpdateReason::default());
        assert_eq!(
            ctx.tree().scroll_position(vp),
            veneer_core::Xy::new(120.0, 80.0)
        );
    }

    #[test]
    fn arrange_compensation_recovers_the_gutter() {
        let (ctx, _setup, updater, _) =
            fixture_with(TestPlatform::new().without_hiding(), (500.0, 500.0));
        ctx.plugins()
            .register(VIEWPORT_ARRANGE_PLUGIN, ViewportArrangePlugin);
        let options = Options::default();
        updater.update(&options, &UpdateReason::default());
        let state = updater.state();
        // Gutter suppressed by arrange: the full 200px client measures.
        assert_eq!(state.overflow_amount, Xy::splat(300.0));
    }

    #[test]
    fn updating_marker_is_transient() {
        let (ctx, setup, updater, _) = fixture((500.0, 500.0));
        updater.update(&Options::default(), &UpdateReason::default());
        assert!(ctx
            .tree()
            .attr(setup.elements.host, markers::DATA_ATTR_HOST_UPDATING)
            .is_none());
    }
}
