//! Structure slot initialization
//!
//! Each structural slot (host, viewport, padding, content) can be
//! pre-assigned by the caller: a literal element, a force/omit flag, or a
//! resolver evaluated exactly once at initialization time. Resolution never
//! recurses; a resolver returns a literal outcome, not another resolver.
//!
//! Static slots (host, viewport) always end up with an element: anything
//! short of a usable assignment falls through to generation. Dynamic slots
//! (padding, content) can be omitted entirely.

use std::rc::Rc;

use crate::tree::{ElementId, Tree};

/// Outcome of evaluating a slot, with resolvers already applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotResolution {
    /// No preference; fall through to the next source.
    #[default]
    Unset,
    /// Dynamic slots only: do not create the element.
    Omit,
    /// Generate the element even if a default would omit it.
    Force,
    /// Use this existing element.
    Element(ElementId),
}

/// A slot assignment as configured by the caller or the environment defaults.
#[derive(Clone, Default)]
pub enum Slot {
    #[default]
    Unset,
    Omit,
    Force,
    Element(ElementId),
    /// Evaluated once during initialization.
    Resolve(Rc<dyn Fn() -> SlotResolution>),
}

impl Slot {
    pub fn is_unset(&self) -> bool {
        matches!(self, Slot::Unset)
    }

    /// Evaluate this slot, running a resolver at most once.
    pub fn resolve(&self) -> SlotResolution {
        match self {
            Slot::Unset => SlotResolution::Unset,
            Slot::Omit => SlotResolution::Omit,
            Slot::Force => SlotResolution::Force,
            Slot::Element(el) => SlotResolution::Element(*el),
            Slot::Resolve(resolver) => resolver(),
        }
    }
}

impl std::fmt::Debug for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Slot::Unset => f.write_str("Unset"),
            Slot::Omit => f.write_str("Omit"),
            Slot::Force => f.write_str("Force"),
            Slot::Element(el) => f.debug_tuple("Element").field(el).finish(),
            Slot::Resolve(_) => f.write_str("Resolve(..)"),
        }
    }
}

/// Conditions under which initialization is abandoned instead of adapting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CancelInitialization {
    /// Cancel when the platform's native scrollbars are overlaid anyway.
    pub native_scrollbars_overlaid: bool,
    /// Cancel (or force, when `Some(false)`) body-element targets.
    pub body: Option<bool>,
}

/// Per-instance initialization configuration.
#[derive(Debug, Clone, Default)]
pub struct Initialization {
    pub host: Slot,
    pub viewport: Slot,
    pub padding: Slot,
    pub content: Slot,
    pub cancel: CancelInitialization,
}

impl Initialization {
    /// Overlay `other` on top of `self`: set slots win, unset slots keep the
    /// base. Used to merge instance configuration over environment defaults.
    pub fn merged_over(&self, base: &Initialization) -> Initialization {
        let pick = |ours: &Slot, theirs: &Slot| {
            if ours.is_unset() {
                theirs.clone()
            } else {
                ours.clone()
            }
        };
        Initialization {
            host: pick(&self.host, &base.host),
            viewport: pick(&self.viewport, &base.viewport),
            padding: pick(&self.padding, &base.padding),
            content: pick(&self.content, &base.content),
            cancel: self.cancel,
        }
    }
}

/// Resolve a static slot: the result is always "use this element" or
/// "generate one". Detached or missing elements are not usable.
pub fn resolve_static(slot: &Slot, tree: &Tree) -> Option<ElementId> {
    match slot.resolve() {
        SlotResolution::Element(el) if tree.exists(el) => Some(el),
        _ => None,
    }
}

/// Outcome for a dynamic slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicSlot {
    Generate,
    Omit,
    Use(ElementId),
}

/// Resolve a dynamic slot: `Omit` is honored, `Unset` falls through to
/// generation, unusable elements degrade to generation.
pub fn resolve_dynamic(slot: &Slot, tree: &Tree) -> DynamicSlot {
    match slot.resolve() {
        SlotResolution::Omit => DynamicSlot::Omit,
        SlotResolution::Element(el) if tree.exists(el) => DynamicSlot::Use(el),
        _ => DynamicSlot::Generate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::TestPlatform;
    use veneer_core::Scheduler;

    fn tree() -> Tree {
        Tree::new(&Scheduler::new(), Rc::new(TestPlatform::new()))
    }

    #[test]
    fn static_slot_falls_through_to_generation() {
        let tree = tree();
        assert_eq!(resolve_static(&Slot::Unset, &tree), None);
        assert_eq!(resolve_static(&Slot::Force, &tree), None);
        // Omit has no meaning for static slots; it still generates.
        assert_eq!(resolve_static(&Slot::Omit, &tree), None);
    }

    #[test]
    fn static_slot_uses_existing_element() {
        let tree = tree();
        let el = tree.create_div();
        assert_eq!(resolve_static(&Slot::Element(el), &tree), Some(el));
        tree.remove(el);
        assert_eq!(resolve_static(&Slot::Element(el), &tree), None);
    }

    #[test]
    fn dynamic_slot_honors_omit_and_resolvers() {
        let tree = tree();
        assert_eq!(resolve_dynamic(&Slot::Omit, &tree), DynamicSlot::Omit);
        assert_eq!(resolve_dynamic(&Slot::Unset, &tree), DynamicSlot::Generate);
        let slot = Slot::Resolve(Rc::new(|| SlotResolution::Omit));
        assert_eq!(resolve_dynamic(&slot, &tree), DynamicSlot::Omit);
    }

    #[test]
    fn merge_prefers_set_slots() {
        let base = Initialization {
            padding: Slot::Omit,
            ..Default::default()
        };
        let over = Initialization {
            content: Slot::Force,
            ..Default::default()
        };
        let merged = over.merged_over(&base);
        assert!(matches!(merged.padding, Slot::Omit));
        assert!(matches!(merged.content, Slot::Force));
        assert!(merged.host.is_unset());
    }
}
