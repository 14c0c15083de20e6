//! Minimal end-to-end walkthrough: build a document, initialize a scroll
//! area, mutate content, and watch the update cycles on stderr.

use std::rc::Rc;

use veneer_scroll::{
    Context, DesktopPlatform, Initialization, ScrollArea, ScrollAreaEvent, StyleUnit,
};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("veneer_scroll=debug".parse().unwrap()),
        )
        .init();

    let ctx = Context::new(Rc::new(DesktopPlatform::new()));
    let tree = ctx.tree();

    let target = tree.create_div();
    tree.edit_style(target, |s| {
        s.width = StyleUnit::Px(200.0);
        s.height = StyleUnit::Px(200.0);
    });
    let content = tree.create_div();
    tree.edit_style(content, |s| {
        s.width = StyleUnit::Px(500.0);
        s.height = StyleUnit::Px(500.0);
    });
    tree.append_child(target, content);
    tree.append_child(tree.root(), target);

    let area = ScrollArea::new(&ctx, target, None, Initialization::default())
        .expect("initialization is not canceled for a plain div");
    area.on(|event| {
        if let ScrollAreaEvent::Updated { hints, .. } = event {
            println!(
                "update: amount_changed={} style_changed={}",
                hints.overflow_amount_changed, hints.overflow_style_changed
            );
        }
    });

    let state = area.state();
    println!(
        "overflow amount: {:.0}x{:.0}",
        state.overflow.overflow_amount.x, state.overflow.overflow_amount.y
    );

    // Shrink the content and let the debounced observation settle.
    tree.edit_style(content, |s| {
        s.width = StyleUnit::Px(100.0);
        s.height = StyleUnit::Px(100.0);
    });
    ctx.relayout();
    ctx.scheduler().advance(100);

    let state = area.state();
    println!(
        "after shrink: {:.0}x{:.0}",
        state.overflow.overflow_amount.x, state.overflow.overflow_amount.y
    );

    println!("{}", tree.outer_html(target));
    area.destroy();
}
