//! End-to-end pipeline tests through the public API only.

use std::cell::Cell;
use std::rc::Rc;

use veneer_scroll::{
    Context, ElementId, Initialization, OverflowBehavior, PartialOptions, ScrollArea,
    ScrollAreaEvent, StyleOverflow, StyleUnit, TestPlatform,
};

fn document(content_size: f32) -> (Context, ElementId, ElementId) {
    let ctx = Context::new(Rc::new(TestPlatform::new()));
    let tree = ctx.tree();
    let target = tree.create_div();
    tree.edit_style(target, |s| {
        s.width = StyleUnit::Px(200.0);
        s.height = StyleUnit::Px(200.0);
    });
    let content = tree.create_div();
    tree.edit_style(content, |s| {
        s.width = StyleUnit::Px(content_size);
        s.height = StyleUnit::Px(content_size);
    });
    tree.append_child(target, content);
    tree.append_child(tree.root(), target);
    (ctx, target, content)
}

#[test]
fn oversized_content_reports_overflow_on_both_axes() {
    let (ctx, target, _) = document(500.0);
    let area = ScrollArea::new(&ctx, target, None, Initialization::default()).unwrap();
    let overflow = area.state().overflow;

    // Roughly 300 per axis; the exact value depends on the measured native
    // scrollbar thickness.
    let thickness = ctx.environment().scrollbar_size().y.max(1.0);
    assert!((overflow.overflow_amount.x - 300.0).abs() <= thickness);
    assert!((overflow.overflow_amount.y - 300.0).abs() <= thickness);
    assert!(overflow.has_overflow.x && overflow.has_overflow.y);
    assert!(overflow.overflow_amount.x >= 0.0 && overflow.overflow_amount.y >= 0.0);
}

#[test]
fn content_shrink_settles_in_one_cycle_with_no_overflow() {
    let (ctx, target, content) = document(500.0);
    let area = ScrollArea::new(&ctx, target, None, Initialization::default()).unwrap();
    ctx.relayout();
    ctx.scheduler().advance(100);

    let cycles = Rc::new(Cell::new(0_u32));
    let counter = Rc::clone(&cycles);
    area.on(move |event| {
        if matches!(event, ScrollAreaEvent::Updated { .. }) {
            counter.set(counter.get() + 1);
        }
    });

    ctx.tree().edit_style(content, |s| {
        s.width = StyleUnit::Px(100.0);
        s.height = StyleUnit::Px(100.0);
    });
    ctx.relayout();
    ctx.scheduler().advance(100);

    assert_eq!(cycles.get(), 1);
    let overflow = area.state().overflow;
    assert_eq!(overflow.overflow_amount.x, 0.0);
    assert_eq!(overflow.overflow_amount.y, 0.0);
}

#[test]
fn visible_variants_never_apply_scroll() {
    let (ctx, target, _) = document(500.0);
    let area = ScrollArea::new(&ctx, target, None, Initialization::default()).unwrap();
    area.set_options(&PartialOptions {
        overflow_x: Some(OverflowBehavior::VisibleScroll),
        overflow_y: Some(OverflowBehavior::VisibleHidden),
        ..Default::default()
    });
    let overflow = area.state().overflow;
    assert_ne!(overflow.overflow_style.x, StyleOverflow::Scroll);
    assert_ne!(overflow.overflow_style.y, StyleOverflow::Scroll);
}

#[test]
fn destroy_round_trips_the_target_markup() {
    let (ctx, target, _) = document(500.0);
    let before = ctx.tree().outer_html(target);
    let area = ScrollArea::new(&ctx, target, None, Initialization::default()).unwrap();
    ctx.relayout();
    ctx.scheduler().advance(100);
    area.destroy();
    assert_eq!(ctx.tree().outer_html(target), before);
}

#[test]
fn forced_update_without_changes_reports_no_amount_change_when_unforced() {
    let (ctx, target, _) = document(500.0);
    let area = ScrollArea::new(&ctx, target, None, Initialization::default()).unwrap();
    let hints = area.update(false);
    assert!(!hints.overflow_amount_changed);
    let hints = area.update(true);
    assert!(hints.overflow_amount_changed && hints.forced);
}
