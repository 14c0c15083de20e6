//! Structure skeleton builder
//!
//! Builds the element skeleton around a target:
//!
//! ```text
//! host > (padding?) > viewport > (content?)
//! ```
//!
//! Slots can be pre-assigned through [`Initialization`]; anything not
//! assigned is generated. Construction records one undo operation per
//! mutation, and destruction unwinds them in reverse, restoring the target
//! byte-identically (modulo a class attribute that ends up empty).

use std::cell::{Cell, RefCell};

use tracing::debug;

use veneer_core::Error;

use crate::context::Context;
use crate::initialization::{resolve_dynamic, resolve_static, DynamicSlot, Initialization};
use crate::markers;
use crate::tree::{ElementId, InlineStyle, Tag, Tree};

/// The resolved skeleton roles.
#[derive(Debug, Clone, Copy)]
pub struct StructureElements {
    pub target: ElementId,
    pub host: ElementId,
    pub viewport: ElementId,
    pub padding: Option<ElementId>,
    pub content: Option<ElementId>,
    /// The target element doubles as the viewport; no inner slots exist.
    pub viewport_is_target: bool,
    pub target_is_textarea: bool,
    pub target_is_body: bool,
}

impl StructureElements {
    /// The element original content lives in (innermost slot).
    pub fn content_host(&self) -> ElementId {
        self.content.unwrap_or(self.viewport)
    }

    /// The element scroll events originate from.
    pub fn scroll_event_element(&self) -> ElementId {
        self.viewport
    }
}

struct TargetSnapshot {
    attributes: Vec<(String, String)>,
    class: Option<String>,
    style: InlineStyle,
}

enum UndoOp {
    /// Remove a generated element (and its subtree).
    RemoveGenerated(ElementId),
    /// Move every child of `from` back into the target.
    MoveChildrenBack { from: ElementId },
    /// Re-insert the target at its pre-construction position (textarea wrap).
    ReinsertTarget {
        parent: ElementId,
        before: Option<ElementId>,
    },
    /// Remove a marker attribute from a caller-supplied element.
    ClearAttr {
        el: ElementId,
        name: &'static str,
    },
    /// Restore the target's attribute/class/style snapshot.
    RestoreTargetSnapshot,
}

/// The constructed skeleton plus its teardown state.
pub struct StructureSetup {
    pub elements: StructureElements,
    undo: RefCell<Vec<UndoOp>>,
    snapshot: TargetSnapshot,
    original_children: Vec<ElementId>,
    destroyed: Cell<bool>,
}

fn generated_slot(tree: &Tree, marker_attr: &str, size_class: &str) -> ElementId {
    let el = tree.create_div();
    tree.set_attr(el, marker_attr, "");
    tree.add_class(el, size_class);
    el
}

impl StructureSetup {
    /// Resolve slots and build the skeleton around `target`. The target's
    /// original children are not moved yet; that happens in [`append`].
    ///
    /// [`append`]: StructureSetup::append
    pub fn create(
        ctx: &Context,
        target: ElementId,
        init: &Initialization,
    ) -> Result<StructureSetup, Error> {
        let tree = ctx.tree();
        let tag = tree.tag(target).ok_or(Error::InvalidTarget)?;
        if tag == Tag::Img {
            return Err(Error::InvalidTarget);
        }
        if !tree.attached(target) {
            return Err(Error::DetachedTarget);
        }
        let target_is_textarea = tag == Tag::Textarea;
        let target_is_body = tag == Tag::Body;

        let snapshot = TargetSnapshot {
            attributes: tree.attributes(target),
            class: tree.attr(target, "class"),
            style: tree.style(target),
        };
        let original_children = tree.children(target);
        let mut undo: Vec<UndoOp> = vec![UndoOp::RestoreTargetSnapshot];

        // Host: the target itself, except textareas get a wrapper with the
        // target moved inside. An assigned host slot supplies the wrapper;
        // anything else generates one after the target.
        let host = if target_is_textarea {
            let parent = tree.parent(target).ok_or(Error::DetachedTarget)?;
            let next = {
                let siblings = tree.children(parent);
                let idx = siblings
                    .iter()
                    .position(|&c| c == target)
                    .ok_or(Error::DetachedTarget)?;
                siblings.get(idx + 1).copied()
            };
            let host = match resolve_static(&init.host, tree) {
                Some(el) if el != target => {
                    undo.push(UndoOp::ClearAttr {
                        el,
                        name: markers::DATA_ATTR_HOST,
                    });
                    el
                }
                _ => {
                    let el = tree.create_div();
                    undo.push(UndoOp::RemoveGenerated(el));
                    el
                }
            };
            if tree.parent(host).is_none() {
                tree.insert_after(target, host);
            }
            tree.append_child(host, target);
            // Popped in reverse: the target must be re-inserted before the
            // wrapper is removed.
            undo.push(UndoOp::ReinsertTarget {
                parent,
                before: next,
            });
            host
        } else {
            target
        };

        // The target doubles as the viewport when the viewport slot resolves
        // to the target itself, and always for body targets. Inner slots are
        // disabled in that mode.
        let viewport_is_target = target_is_body
            || (!target_is_textarea && resolve_static(&init.viewport, tree) == Some(target));

        let mut host_flags = markers::FLAG_HOST.to_string();
        let (viewport, padding, content) = if viewport_is_target {
            host_flags.push(' ');
            host_flags.push_str(markers::FLAG_VIEWPORT_IS_TARGET);
            (host, None, None)
        } else {
            let viewport = match resolve_static(&init.viewport, tree) {
                Some(el) => {
                    undo.push(UndoOp::ClearAttr {
                        el,
                        name: markers::DATA_ATTR_VIEWPORT,
                    });
                    el
                }
                None => {
                    let el = generated_slot(
                        tree,
                        markers::DATA_ATTR_VIEWPORT,
                        markers::CLASS_SIZE_FRACTION_MAX,
                    );
                    undo.push(UndoOp::RemoveGenerated(el));
                    el
                }
            };
            let padding = match resolve_dynamic(&init.padding, tree) {
                DynamicSlot::Omit => None,
                DynamicSlot::Use(el) => Some(el),
                DynamicSlot::Generate => {
                    let el = generated_slot(
                        tree,
                        markers::DATA_ATTR_PADDING,
                        markers::CLASS_SIZE_FRACTION_MAX,
                    );
                    undo.push(UndoOp::RemoveGenerated(el));
                    Some(el)
                }
            };
            let content = match resolve_dynamic(&init.content, tree) {
                DynamicSlot::Omit => None,
                // An element assigned to both the viewport and content slots
                // is the viewport; the content role is dropped.
                DynamicSlot::Use(el) if el == viewport => None,
                DynamicSlot::Use(el) => Some(el),
                DynamicSlot::Generate => {
                    // The content slot sizes to its children so the size
                    // observer sees intrinsic content growth and shrink.
                    let el = generated_slot(
                        tree,
                        markers::DATA_ATTR_CONTENT,
                        markers::CLASS_SIZE_FRACTION_MIN,
                    );
                    undo.push(UndoOp::RemoveGenerated(el));
                    Some(el)
                }
            };
            (viewport, padding, content)
        };

        tree.set_attr(host, markers::DATA_ATTR_HOST, &host_flags);

        // Assemble host > padding? > viewport > content?.
        if viewport != host {
            let mut cursor = host;
            if let Some(padding) = padding {
                tree.append_child(cursor, padding);
                cursor = padding;
            }
            tree.append_child(cursor, viewport);
            if let Some(content) = content {
                tree.append_child(viewport, content);
            }
            tree.set_attr(viewport, markers::DATA_ATTR_VIEWPORT, "");
        }

        debug!(
            ?target,
            viewport_is_target, target_is_textarea, target_is_body, "structure created"
        );

        Ok(StructureSetup {
            elements: StructureElements {
                target,
                host,
                viewport,
                padding,
                content,
                viewport_is_target,
                target_is_textarea,
                target_is_body,
            },
            undo: RefCell::new(undo),
            snapshot,
            original_children,
            destroyed: Cell::new(false),
        })
    }

    /// Move the target's original content into the innermost slot and restore
    /// focus continuity.
    pub fn append(&self, ctx: &Context) {
        let tree = ctx.tree();
        let elements = &self.elements;
        if elements.viewport_is_target || elements.target_is_textarea {
            return;
        }
        let focused = tree.active_element();
        let destination = elements.content_host();
        // Assigned slot elements may appear among the original children;
        // they already sit inside the skeleton and must not move again.
        let slots = [Some(elements.viewport), elements.padding, elements.content];
        for &child in &self.original_children {
            if tree.exists(child) && !slots.contains(&Some(child)) {
                tree.append_child(destination, child);
            }
        }
        self.undo
            .borrow_mut()
            .push(UndoOp::MoveChildrenBack { from: destination });
        // Children keep their own focus through the move; focus on the
        // target itself follows the scrolling role onto the viewport.
        if focused == Some(elements.target) {
            tree.set_focus(Some(elements.viewport));
        }
    }

    pub fn destroyed(&self) -> bool {
        self.destroyed.get()
    }

    /// Unwind construction in reverse order. Safe to call more than once.
    pub fn destroy(&self, ctx: &Context) {
        if self.destroyed.replace(true) {
            return;
        }
        let tree = ctx.tree();
        let target = self.elements.target;
        let mut undo = self.undo.borrow_mut();
        while let Some(op) = undo.pop() {
            match op {
                UndoOp::MoveChildrenBack { from } => {
                    if tree.exists(from) {
                        tree.move_children(from, target);
                    }
                }
                UndoOp::ReinsertTarget { parent, before } => {
                    if tree.exists(parent) {
                        tree.insert_before(parent, target, before.filter(|b| tree.exists(*b)));
                    }
                }
                UndoOp::RemoveGenerated(el) => {
                    // Generated slots may still hold original content when
                    // construction partially failed; evacuate first.
                    if tree.exists(el) {
                        tree.move_children(el, target);
                        tree.remove(el);
                    }
                }
                UndoOp::ClearAttr { el, name } => {
                    if tree.exists(el) {
                        tree.remove_attr(el, name);
                    }
                }
                UndoOp::RestoreTargetSnapshot => {
                    for (name, _) in tree.attributes(target) {
                        tree.remove_attr(target, &name);
                    }
                    for (name, value) in &self.snapshot.attributes {
                        tree.set_attr(target, name, value);
                    }
                    tree.set_attr(target, "class", self.snapshot.class.as_deref().unwrap_or(""));
                    tree.set_style(target, self.snapshot.style);
                }
            }
        }
        debug!(?target, "structure destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::initialization::Slot;
    use crate::platform::TestPlatform;
    use std::rc::Rc;

    fn ctx() -> Context {
        Context::new(Rc::new(TestPlatform::new()))
    }

    fn target_with_content(ctx: &Context) -> ElementId {
        let tree = ctx.tree();
        let target = tree.create_div();
        tree.add_class(target, "my-box");
        tree.set_attr(target, "data-app", "1");
        let child = tree.create_div();
        tree.set_text(child, "content");
        tree.append_child(target, child);
        tree.append_child(tree.root(), target);
        target
    }

    #[test]
    fn element_target_builds_full_skeleton() {
        let ctx = ctx();
        let target = target_with_content(&ctx);
        let setup = StructureSetup::create(&ctx, target, &Initialization::default()).unwrap();
        setup.append(&ctx);

        let e = &setup.elements;
        assert_eq!(e.host, target);
        assert!(!e.viewport_is_target);
        let tree = ctx.tree();
        // host > padding > viewport > content
        assert_eq!(tree.parent(e.padding.unwrap()), Some(e.host));
        assert_eq!(tree.parent(e.viewport), e.padding);
        assert_eq!(tree.parent(e.content.unwrap()), Some(e.viewport));
        // Original content moved into the content slot.
        assert_eq!(tree.children(e.content.unwrap()).len(), 1);
        assert_eq!(
            tree.attr(e.host, markers::DATA_ATTR_HOST).as_deref(),
            Some("host")
        );
    }

    #[test]
    fn omitted_slots_are_skipped() {
        let ctx = ctx();
        let target = target_with_content(&ctx);
        let init = Initialization {
            padding: Slot::Omit,
            content: Slot::Omit,
            ..Default::default()
        };
        let setup = StructureSetup::create(&ctx, target, &init).unwrap();
        setup.append(&ctx);
        let e = &setup.elements;
        assert!(e.padding.is_none());
        assert!(e.content.is_none());
        assert_eq!(ctx.tree().parent(e.viewport), Some(e.host));
        // Content lives directly in the viewport.
        assert_eq!(ctx.tree().children(e.viewport).len(), 1);
    }

    #[test]
    fn viewport_is_target_disables_inner_slots() {
        let ctx = ctx();
        let target = target_with_content(&ctx);
        let init = Initialization {
            viewport: Slot::Element(target),
            content: Slot::Force,
            ..Default::default()
        };
        let setup = StructureSetup::create(&ctx, target, &init).unwrap();
        setup.append(&ctx);
        let e = &setup.elements;
        assert!(e.viewport_is_target);
        assert_eq!(e.viewport, target);
        assert!(e.padding.is_none());
        assert!(e.content.is_none());
        let flags = ctx.tree().attr(target, markers::DATA_ATTR_HOST).unwrap();
        assert!(flags.contains(markers::FLAG_VIEWPORT_IS_TARGET));
    }

    #[test]
    fn shared_viewport_content_slot_resolves_to_viewport() {
        let ctx = ctx();
        let target = target_with_content(&ctx);
        let slot_el = ctx.tree().create_div();
        let init = Initialization {
            viewport: Slot::Element(slot_el),
            content: Slot::Element(slot_el),
            ..Default::default()
        };
        let setup = StructureSetup::create(&ctx, target, &init).unwrap();
        assert_eq!(setup.elements.viewport, slot_el);
        assert!(setup.elements.content.is_none());
    }

    #[test]
    fn textarea_target_is_wrapped_by_generated_host() {
        let ctx = ctx();
        let tree = ctx.tree();
        let textarea = tree.create_textarea();
        tree.set_text(textarea, "hello");
        tree.append_child(tree.root(), textarea);
        let setup =
            StructureSetup::create(&ctx, textarea, &Initialization::default()).unwrap();
        setup.append(&ctx);

        let e = &setup.elements;
        assert!(e.target_is_textarea);
        assert_ne!(e.host, textarea);
        assert_eq!(tree.parent(textarea), Some(e.host));
        assert_eq!(tree.parent(e.host), Some(tree.root()));
    }

    #[test]
    fn textarea_honors_an_assigned_host_slot() {
        let ctx = ctx();
        let tree = ctx.tree();
        let textarea = tree.create_textarea();
        tree.append_child(tree.root(), textarea);
        let host = tree.create_div();
        let init = Initialization {
            host: Slot::Element(host),
            ..Default::default()
        };
        let setup = StructureSetup::create(&ctx, textarea, &init).unwrap();
        setup.append(&ctx);

        assert_eq!(setup.elements.host, host);
        assert_eq!(tree.parent(textarea), Some(host));
        assert!(tree.attr(host, markers::DATA_ATTR_HOST).is_some());

        // The caller's host survives destruction, minus the marker.
        setup.destroy(&ctx);
        assert_eq!(tree.parent(textarea), Some(tree.root()));
        assert!(tree.exists(host));
        assert!(tree.attr(host, markers::DATA_ATTR_HOST).is_none());
    }

    #[test]
    fn focus_on_target_moves_to_the_viewport_on_append() {
        let ctx = ctx();
        let target = target_with_content(&ctx);
        ctx.tree().set_focus(Some(target));
        let setup = StructureSetup::create(&ctx, target, &Initialization::default()).unwrap();
        setup.append(&ctx);
        assert_eq!(ctx.tree().active_element(), Some(setup.elements.viewport));
    }

    #[test]
    fn focus_inside_content_survives_append() {
        let ctx = ctx();
        let target = target_with_content(&ctx);
        let child = ctx.tree().children(target)[0];
        ctx.tree().set_focus(Some(child));
        let setup = StructureSetup::create(&ctx, target, &Initialization::default()).unwrap();
        setup.append(&ctx);
        assert_eq!(ctx.tree().active_element(), Some(child));
    }

    #[test]
    fn assigned_viewport_loses_its_marker_on_destroy() {
        let ctx = ctx();
        let target = target_with_content(&ctx);
        let viewport = ctx.tree().create_div();
        ctx.tree().append_child(target, viewport);
        let init = Initialization {
            viewport: Slot::Element(viewport),
            ..Default::default()
        };
        let setup = StructureSetup::create(&ctx, target, &init).unwrap();
        setup.append(&ctx);
        assert!(ctx
            .tree()
            .attr(viewport, markers::DATA_ATTR_VIEWPORT)
            .is_some());
        setup.destroy(&ctx);
        assert!(ctx
            .tree()
            .attr(viewport, markers::DATA_ATTR_VIEWPORT)
            .is_none());
    }

    #[test]
    fn invalid_and_detached_targets_are_fatal() {
        let ctx = ctx();
        let tree = ctx.tree();
        let img = tree.create_img();
        tree.append_child(tree.root(), img);
        assert_eq!(
            StructureSetup::create(&ctx, img, &Initialization::default()).err(),
            Some(Error::InvalidTarget)
        );
        let detached = tree.create_div();
        assert_eq!(
            StructureSetup::create(&ctx, detached, &Initialization::default()).err(),
            Some(Error::DetachedTarget)
        );
    }

    #[test]
    fn destroy_round_trips_the_target_markup() {
        let ctx = ctx();
        let target = target_with_content(&ctx);
        let before = ctx.tree().outer_html(target);
        let setup = StructureSetup::create(&ctx, target, &Initialization::default()).unwrap();
        setup.append(&ctx);
        assert_ne!(ctx.tree().outer_html(target), before);
        setup.destroy(&ctx);
        assert_eq!(ctx.tree().outer_html(target), before);
        // Idempotent.
        setup.destroy(&ctx);
        assert_eq!(ctx.tree().outer_html(target), before);
    }

    #[test]
    fn destroy_round_trips_a_textarea_wrap() {
        let ctx = ctx();
        let tree = ctx.tree();
        let sibling = tree.create_div();
        let textarea = tree.create_textarea();
        tree.set_attr(textarea, "rows", "4");
        tree.set_text(textarea, "hi");
        tree.append_child(tree.root(), textarea);
        tree.append_child(tree.root(), sibling);
        let before_root = tree.outer_html(tree.root());

        let setup =
            StructureSetup::create(&ctx, textarea, &Initialization::default()).unwrap();
        setup.append(&ctx);
        setup.destroy(&ctx);
        assert_eq!(tree.outer_html(tree.root()), before_root);
    }
}
