//! Retained element tree
//!
//! The substrate every other module works against: a `slotmap` arena of
//! element nodes mapped onto a `taffy` layout tree per layout pass. Elements
//! carry attributes, classes, a typed inline style, text content and a scroll
//! offset; the tree journals every mutation for registered observers and
//! re-measures observed elements after each layout.
//!
//! # Architecture
//!
//! The tree is a cheap-to-clone handle (`Rc<RefCell<...>>` inside) so timer
//! callbacks and observer deliveries can reach it without threading borrows
//! through every caller. All callback dispatch happens with the interior
//! borrow released, so callbacks may freely mutate the tree.
//!
//! Scrollbar gutters are emulated in layout: an axis with computed
//! `overflow: scroll` shrinks the cross-axis client size by the platform's
//! native scrollbar thickness, unless the platform reports overlay
//! scrollbars, the element carries the scrollbar-hiding class on a platform
//! that supports hiding, or gutter suppression is forced (arrange
//! compensation).

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use taffy::prelude::*;
use tracing::trace;

use veneer_core::{Cache, EventHub, ListenerKey, Scheduler, TimerKey, Trbl, Wh, Xy};

use crate::markers;
use crate::platform::{Platform, RtlScrollConvention};

/// Element event names.
pub mod events {
    pub const SCROLL: &str = "scroll";
    pub const POINTER_ENTER: &str = "pointerenter";
    pub const POINTER_LEAVE: &str = "pointerleave";
    pub const POINTER_MOVE: &str = "pointermove";
    pub const LOAD: &str = "load";
}

new_key_type! {
    /// Identifies one element in the arena.
    pub struct ElementId;

    /// Identifies one mutation observer registration.
    pub struct MutationObserverId;

    /// Identifies one resize observer registration.
    pub struct ResizeObserverId;
}

// ============================================================================
// Element data
// ============================================================================

/// Element kind. Only the kinds the scroll system distinguishes exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// Document body, the root of a tree.
    Body,
    Div,
    Textarea,
    Img,
}

impl Tag {
    pub fn name(self) -> &'static str {
        match self {
            Tag::Body => "body",
            Tag::Div => "div",
            Tag::Textarea => "textarea",
            Tag::Img => "img",
        }
    }
}

/// A sizing value in the typed inline style.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum StyleUnit {
    #[default]
    Auto,
    Px(f32),
    Percent(f32),
}

/// Computed overflow keyword per axis. `auto`/`visible` variants are resolved
/// by the update engine before they reach the tree; layout only ever sees the
/// applied value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StyleOverflow {
    #[default]
    Visible,
    Hidden,
    Scroll,
}

impl StyleOverflow {
    fn css(self) -> &'static str {
        match self {
            StyleOverflow::Visible => "visible",
            StyleOverflow::Hidden => "hidden",
            StyleOverflow::Scroll => "scroll",
        }
    }
}

/// Typed inline style. The serialized form (for markup snapshots) is
/// deterministic: properties appear in declaration order below and defaults
/// are omitted entirely.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InlineStyle {
    pub width: StyleUnit,
    pub height: StyleUnit,
    pub margin: Trbl,
    pub padding: Trbl,
    pub overflow_x: StyleOverflow,
    pub overflow_y: StyleOverflow,
    /// `None` inherits the document direction.
    pub direction_rtl: Option<bool>,
}

fn fmt_px(v: f32) -> String {
    format!("{v}px")
}

impl InlineStyle {
    fn unit_css(unit: StyleUnit) -> Option<String> {
        match unit {
            StyleUnit::Auto => None,
            StyleUnit::Px(v) => Some(fmt_px(v)),
            StyleUnit::Percent(v) => Some(format!("{v}%")),
        }
    }

    /// Serialize to a CSS declaration list; empty when fully default.
    pub fn to_css(&self) -> String {
        let mut out: Vec<String> = Vec::new();
        if let Some(v) = Self::unit_css(self.width) {
            out.push(format!("width: {v}"));
        }
        if let Some(v) = Self::unit_css(self.height) {
            out.push(format!("height: {v}"));
        }
        if self.margin != Trbl::ZERO {
            let m = self.margin;
            out.push(format!(
                "margin: {} {} {} {}",
                fmt_px(m.t),
                fmt_px(m.r),
                fmt_px(m.b),
                fmt_px(m.l)
            ));
        }
        if self.padding != Trbl::ZERO {
            let p = self.padding;
            out.push(format!(
                "padding: {} {} {} {}",
                fmt_px(p.t),
                fmt_px(p.r),
                fmt_px(p.b),
                fmt_px(p.l)
            ));
        }
        if self.overflow_x != StyleOverflow::Visible {
            out.push(format!("overflow-x: {}", self.overflow_x.css()));
        }
        if self.overflow_y != StyleOverflow::Visible {
            out.push(format!("overflow-y: {}", self.overflow_y.css()));
        }
        if let Some(rtl) = self.direction_rtl {
            out.push(format!("direction: {}", if rtl { "rtl" } else { "ltr" }));
        }
        out.join("; ")
    }
}

/// Metrics computed for an element by the last layout pass.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ElementMetrics {
    /// Position relative to the parent's border box.
    pub location: Xy<f32>,
    /// Border-box size.
    pub offset: Wh,
    /// Border box minus emulated scrollbar gutters.
    pub client: Wh,
    /// Total content extent, never below the client size.
    pub scroll_size: Wh,
}

/// Event payload delivered to element listeners.
#[derive(Debug, Clone, Copy)]
pub struct ElementEvent {
    pub target: ElementId,
    /// Scroll offset at dispatch time (raw, convention-dependent).
    pub scroll: Xy<f32>,
}

/// Revocation token for an element event listener.
#[derive(Clone)]
pub struct EventBinding {
    element: ElementId,
    name: String,
    key: ListenerKey,
}

struct Element {
    tag: Tag,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
    attributes: IndexMap<String, String>,
    classes: IndexSet<String>,
    style: InlineStyle,
    text: Option<String>,
    scroll: Xy<f32>,
    metrics: ElementMetrics,
    /// Forced by arrange compensation; overrides gutter emulation.
    gutter_suppressed: bool,
    listeners: FxHashMap<String, EventHub<ElementEvent>>,
}

impl Element {
    fn new(tag: Tag) -> Self {
        Self {
            tag,
            parent: None,
            children: Vec::new(),
            attributes: IndexMap::new(),
            classes: IndexSet::new(),
            style: InlineStyle::default(),
            text: None,
            scroll: Xy::splat(0.0),
            metrics: ElementMetrics::default(),
            gutter_suppressed: false,
            listeners: FxHashMap::default(),
        }
    }
}

// ============================================================================
// Mutation journal
// ============================================================================

/// One journaled mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRecord {
    pub target: ElementId,
    pub kind: MutationKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationKind {
    /// An attribute (including `class` and `style`) changed. `old_value` is
    /// `None` when the attribute was previously absent.
    Attribute {
        name: String,
        old_value: Option<String>,
    },
    /// Children were added, removed or moved.
    ChildList,
    /// Text content changed.
    CharacterData,
}

/// What a mutation observer registration is interested in.
#[derive(Debug, Clone, Default)]
pub struct MutationOptions {
    pub subtree: bool,
    pub attributes: bool,
    /// When set, only these attribute names produce records.
    pub attribute_filter: Option<Vec<String>>,
    pub child_list: bool,
    pub character_data: bool,
}

impl MutationOptions {
    fn matches(&self, kind: &MutationKind) -> bool {
        match kind {
            MutationKind::Attribute { name, .. } => {
                self.attributes
                    && self
                        .attribute_filter
                        .as_ref()
                        .map_or(true, |filter| filter.iter().any(|f| f == name))
            }
            MutationKind::ChildList => self.child_list,
            MutationKind::CharacterData => self.character_data,
        }
    }
}

type MutationCallback = Rc<dyn Fn(Vec<MutationRecord>)>;

struct MutationObserverState {
    target: ElementId,
    options: MutationOptions,
    callback: MutationCallback,
    pending: SmallVec<[MutationRecord; 8]>,
    scheduled: Option<TimerKey>,
}

struct ResizeObserverState {
    target: ElementId,
    /// Border-box size cell; seeded out-of-range so the initial observation
    /// always fires once.
    cache: Cache<Wh>,
    callback: Rc<dyn Fn(Wh)>,
    scheduled: Option<TimerKey>,
}

// ============================================================================
// Tree
// ============================================================================

struct TreeInner {
    elements: SlotMap<ElementId, Element>,
    root: ElementId,
    active_element: Option<ElementId>,
    direction_rtl: bool,
    mutation_observers: SlotMap<MutationObserverId, MutationObserverState>,
    resize_observers: SlotMap<ResizeObserverId, ResizeObserverState>,
}

/// Shared handle to the element tree. Cheap to clone.
#[derive(Clone)]
pub struct Tree {
    inner: Rc<RefCell<TreeInner>>,
    scheduler: Scheduler,
    platform: Rc<dyn Platform>,
}

impl Tree {
    pub fn new(scheduler: &Scheduler, platform: Rc<dyn Platform>) -> Self {
        let mut elements = SlotMap::with_key();
        let root = elements.insert(Element::new(Tag::Body));
        Self {
            inner: Rc::new(RefCell::new(TreeInner {
                elements,
                root,
                active_element: None,
                direction_rtl: false,
                mutation_observers: SlotMap::with_key(),
                resize_observers: SlotMap::with_key(),
            })),
            scheduler: scheduler.clone(),
            platform,
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn platform(&self) -> &Rc<dyn Platform> {
        &self.platform
    }

    /// The document body.
    pub fn root(&self) -> ElementId {
        self.inner.borrow().root
    }

    // ------------------------------------------------------------------------
    // Creation and hierarchy
    // ------------------------------------------------------------------------

    pub fn create(&self, tag: Tag) -> ElementId {
        self.inner.borrow_mut().elements.insert(Element::new(tag))
    }

    pub fn create_div(&self) -> ElementId {
        self.create(Tag::Div)
    }

    pub fn create_textarea(&self) -> ElementId {
        self.create(Tag::Textarea)
    }

    pub fn create_img(&self) -> ElementId {
        self.create(Tag::Img)
    }

    pub fn tag(&self, el: ElementId) -> Option<Tag> {
        self.inner.borrow().elements.get(el).map(|e| e.tag)
    }

    pub fn exists(&self, el: ElementId) -> bool {
        self.inner.borrow().elements.contains_key(el)
    }

    pub fn parent(&self, el: ElementId) -> Option<ElementId> {
        self.inner.borrow().elements.get(el).and_then(|e| e.parent)
    }

    pub fn children(&self, el: ElementId) -> Vec<ElementId> {
        self.inner
            .borrow()
            .elements
            .get(el)
            .map(|e| e.children.clone())
            .unwrap_or_default()
    }

    /// Whether `el` is attached under the document body.
    pub fn attached(&self, el: ElementId) -> bool {
        let inner = self.inner.borrow();
        let mut cursor = Some(el);
        while let Some(current) = cursor {
            if current == inner.root {
                return true;
            }
            cursor = inner.elements.get(current).and_then(|e| e.parent);
        }
        false
    }

    fn is_ancestor(inner: &TreeInner, ancestor: ElementId, of: ElementId) -> bool {
        let mut cursor = inner.elements.get(of).and_then(|e| e.parent);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = inner.elements.get(current).and_then(|e| e.parent);
        }
        false
    }

    pub fn append_child(&self, parent: ElementId, child: ElementId) {
        self.insert_child(parent, child, None);
    }

    /// Insert `child` into `parent` before `reference`; append when
    /// `reference` is `None` or not a child of `parent`.
    pub fn insert_before(&self, parent: ElementId, child: ElementId, reference: Option<ElementId>) {
        self.insert_child(parent, child, reference);
    }

    /// Insert `child` as the next sibling of `reference`.
    pub fn insert_after(&self, reference: ElementId, child: ElementId) {
        let Some(parent) = self.parent(reference) else {
            return;
        };
        let next = {
            let inner = self.inner.borrow();
            inner.elements.get(parent).and_then(|p| {
                let idx = p.children.iter().position(|&c| c == reference)?;
                p.children.get(idx + 1).copied()
            })
        };
        self.insert_child(parent, child, next);
    }

    fn insert_child(&self, parent: ElementId, child: ElementId, reference: Option<ElementId>) {
        let old_parent = {
            let mut inner = self.inner.borrow_mut();
            if !inner.elements.contains_key(parent) || !inner.elements.contains_key(child) {
                return;
            }
            // Reparenting would corrupt the arena if the child contains the
            // new parent.
            if child == parent || Self::is_ancestor(&inner, child, parent) {
                return;
            }
            let old_parent = inner.elements[child].parent;
            if let Some(old) = old_parent {
                inner.elements[old].children.retain(|&c| c != child);
            }
            let position = reference
                .and_then(|r| inner.elements[parent].children.iter().position(|&c| c == r));
            match position {
                Some(idx) => inner.elements[parent].children.insert(idx, child),
                None => inner.elements[parent].children.push(child),
            }
            inner.elements[child].parent = Some(parent);
            old_parent
        };
        if let Some(old) = old_parent {
            if old != parent {
                self.journal(old, MutationKind::ChildList);
            }
        }
        self.journal(parent, MutationKind::ChildList);
    }

    /// Detach `el` from its parent, keeping the node (and its subtree) alive.
    pub fn detach(&self, el: ElementId) {
        let old_parent = {
            let mut inner = self.inner.borrow_mut();
            let Some(parent) = inner.elements.get(el).and_then(|e| e.parent) else {
                return;
            };
            inner.elements[parent].children.retain(|&c| c != el);
            inner.elements[el].parent = None;
            parent
        };
        self.journal(old_parent, MutationKind::ChildList);
    }

    /// Detach `el` and drop it and its entire subtree from the arena.
    pub fn remove(&self, el: ElementId) {
        self.detach(el);
        let mut stack = vec![el];
        let mut inner = self.inner.borrow_mut();
        while let Some(current) = stack.pop() {
            if let Some(element) = inner.elements.remove(current) {
                stack.extend(element.children);
            }
        }
    }

    /// Move every child of `from` to the end of `to`, preserving order.
    /// Children that are (or contain) `to` stay where they are.
    pub fn move_children(&self, from: ElementId, to: ElementId) {
        let moved = {
            let mut inner = self.inner.borrow_mut();
            if from == to || !inner.elements.contains_key(from) || !inner.elements.contains_key(to)
            {
                return;
            }
            let children = std::mem::take(&mut inner.elements[from].children);
            let (movable, kept): (Vec<_>, Vec<_>) = children
                .into_iter()
                .partition(|&c| c != to && !Self::is_ancestor(&inner, c, to));
            inner.elements[from].children = kept;
            for &child in &movable {
                inner.elements[child].parent = Some(to);
            }
            let moved = !movable.is_empty();
            inner.elements[to].children.extend(movable);
            moved
        };
        if moved {
            self.journal(from, MutationKind::ChildList);
            self.journal(to, MutationKind::ChildList);
        }
    }

    // ------------------------------------------------------------------------
    // Attributes, classes, styles, text
    // ------------------------------------------------------------------------

    pub fn attr(&self, el: ElementId, name: &str) -> Option<String> {
        let inner = self.inner.borrow();
        let element = inner.elements.get(el)?;
        if name == "class" {
            let joined = Self::class_string(element);
            return (!joined.is_empty()).then_some(joined);
        }
        element.attributes.get(name).cloned()
    }

    pub fn set_attr(&self, el: ElementId, name: &str, value: &str) {
        if name == "class" {
            self.set_classes(el, value);
            return;
        }
        let old_value = {
            let mut inner = self.inner.borrow_mut();
            let Some(element) = inner.elements.get_mut(el) else {
                return;
            };
            element.attributes.insert(name.to_string(), value.to_string())
        };
        if old_value.as_deref() == Some(value) {
            return;
        }
        self.journal(
            el,
            MutationKind::Attribute {
                name: name.to_string(),
                old_value,
            },
        );
    }

    pub fn remove_attr(&self, el: ElementId, name: &str) {
        if name == "class" {
            self.set_classes(el, "");
            return;
        }
        let old_value = {
            let mut inner = self.inner.borrow_mut();
            let Some(element) = inner.elements.get_mut(el) else {
                return;
            };
            element.attributes.shift_remove(name)
        };
        if old_value.is_none() {
            return;
        }
        self.journal(
            el,
            MutationKind::Attribute {
                name: name.to_string(),
                old_value,
            },
        );
    }

    /// All attributes except `class`, in insertion order.
    pub fn attributes(&self, el: ElementId) -> Vec<(String, String)> {
        self.inner
            .borrow()
            .elements
            .get(el)
            .map(|e| {
                e.attributes
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn class_string(element: &Element) -> String {
        element.classes.iter().cloned().collect::<Vec<_>>().join(" ")
    }

    fn set_classes(&self, el: ElementId, value: &str) {
        let old_value = {
            let mut inner = self.inner.borrow_mut();
            let Some(element) = inner.elements.get_mut(el) else {
                return;
            };
            let old = Self::class_string(element);
            element.classes = value.split_whitespace().map(str::to_string).collect();
            let new = Self::class_string(element);
            if old == new {
                return;
            }
            (!old.is_empty()).then_some(old)
        };
        self.journal(
            el,
            MutationKind::Attribute {
                name: "class".to_string(),
                old_value,
            },
        );
    }

    pub fn add_class(&self, el: ElementId, class: &str) {
        let old_value = {
            let mut inner = self.inner.borrow_mut();
            let Some(element) = inner.elements.get_mut(el) else {
                return;
            };
            let old = Self::class_string(element);
            if !element.classes.insert(class.to_string()) {
                return;
            }
            (!old.is_empty()).then_some(old)
        };
        self.journal(
            el,
            MutationKind::Attribute {
                name: "class".to_string(),
                old_value,
            },
        );
    }

    pub fn remove_class(&self, el: ElementId, class: &str) {
        let old_value = {
            let mut inner = self.inner.borrow_mut();
            let Some(element) = inner.elements.get_mut(el) else {
                return;
            };
            let old = Self::class_string(element);
            if !element.classes.shift_remove(class) {
                return;
            }
            Some(old)
        };
        self.journal(
            el,
            MutationKind::Attribute {
                name: "class".to_string(),
                old_value,
            },
        );
    }

    pub fn has_class(&self, el: ElementId, class: &str) -> bool {
        self.inner
            .borrow()
            .elements
            .get(el)
            .is_some_and(|e| e.classes.contains(class))
    }

    pub fn toggle_class(&self, el: ElementId, class: &str, on: bool) {
        if on {
            self.add_class(el, class);
        } else {
            self.remove_class(el, class);
        }
    }

    pub fn style(&self, el: ElementId) -> InlineStyle {
        self.inner
            .borrow()
            .elements
            .get(el)
            .map(|e| e.style)
            .unwrap_or_default()
    }

    pub fn set_style(&self, el: ElementId, style: InlineStyle) {
        self.edit_style(el, |s| *s = style);
    }

    /// Mutate the inline style in place; journals one `style` attribute
    /// record when the serialized form changed.
    pub fn edit_style(&self, el: ElementId, f: impl FnOnce(&mut InlineStyle)) {
        let old_value = {
            let mut inner = self.inner.borrow_mut();
            let Some(element) = inner.elements.get_mut(el) else {
                return;
            };
            let old_css = element.style.to_css();
            f(&mut element.style);
            if element.style.to_css() == old_css {
                return;
            }
            (!old_css.is_empty()).then_some(old_css)
        };
        self.journal(
            el,
            MutationKind::Attribute {
                name: "style".to_string(),
                old_value,
            },
        );
    }

    pub fn text(&self, el: ElementId) -> Option<String> {
        self.inner.borrow().elements.get(el).and_then(|e| e.text.clone())
    }

    pub fn set_text(&self, el: ElementId, text: &str) {
        {
            let mut inner = self.inner.borrow_mut();
            let Some(element) = inner.elements.get_mut(el) else {
                return;
            };
            if element.text.as_deref() == Some(text) {
                return;
            }
            element.text = Some(text.to_string());
        }
        self.journal(el, MutationKind::CharacterData);
    }

    /// Force or release gutter suppression (arrange compensation).
    pub fn set_gutter_suppressed(&self, el: ElementId, suppressed: bool) {
        let mut inner = self.inner.borrow_mut();
        if let Some(element) = inner.elements.get_mut(el) {
            element.gutter_suppressed = suppressed;
        }
    }

    // ------------------------------------------------------------------------
    // Document facet
    // ------------------------------------------------------------------------

    pub fn active_element(&self) -> Option<ElementId> {
        self.inner.borrow().active_element
    }

    pub fn set_focus(&self, el: Option<ElementId>) {
        self.inner.borrow_mut().active_element = el;
    }

    pub fn direction_rtl(&self) -> bool {
        self.inner.borrow().direction_rtl
    }

    pub fn set_direction_rtl(&self, rtl: bool) {
        self.inner.borrow_mut().direction_rtl = rtl;
    }

    fn element_rtl(&self, el: ElementId) -> bool {
        let inner = self.inner.borrow();
        inner
            .elements
            .get(el)
            .and_then(|e| e.style.direction_rtl)
            .unwrap_or(inner.direction_rtl)
    }

    // ------------------------------------------------------------------------
    // Scrolling
    // ------------------------------------------------------------------------

    /// Raw scroll offset (convention-dependent in RTL).
    pub fn scroll_position(&self, el: ElementId) -> Xy<f32> {
        self.inner
            .borrow()
            .elements
            .get(el)
            .map(|e| e.scroll)
            .unwrap_or(Xy::splat(0.0))
    }

    pub fn set_scroll_position(&self, el: ElementId, position: Xy<f32>) {
        let changed = {
            let clamped = self.clamp_scroll(el, position);
            let mut inner = self.inner.borrow_mut();
            let Some(element) = inner.elements.get_mut(el) else {
                return;
            };
            if element.scroll == clamped {
                false
            } else {
                element.scroll = clamped;
                true
            }
        };
        if changed {
            self.dispatch(el, events::SCROLL);
        }
    }

    pub fn scroll_left(&self, el: ElementId) -> f32 {
        self.scroll_position(el).x
    }

    pub fn set_scroll_left(&self, el: ElementId, x: f32) {
        let y = self.scroll_position(el).y;
        self.set_scroll_position(el, Xy::new(x, y));
    }

    pub fn scroll_top(&self, el: ElementId) -> f32 {
        self.scroll_position(el).y
    }

    pub fn set_scroll_top(&self, el: ElementId, y: f32) {
        let x = self.scroll_position(el).x;
        self.set_scroll_position(el, Xy::new(x, y));
    }

    /// Maximum scrollable distance per axis (always non-negative).
    pub fn max_scroll(&self, el: ElementId) -> Xy<f32> {
        let metrics = self.metrics(el);
        Xy::new(
            (metrics.scroll_size.w - metrics.client.w).max(0.0),
            (metrics.scroll_size.h - metrics.client.h).max(0.0),
        )
    }

    fn clamp_scroll(&self, el: ElementId, position: Xy<f32>) -> Xy<f32> {
        let max = self.max_scroll(el);
        let x = if self.element_rtl(el) {
            match self.platform.rtl_convention() {
                RtlScrollConvention::Negated => position.x.clamp(-max.x, 0.0),
                RtlScrollConvention::Inverted => position.x.clamp(0.0, max.x),
            }
        } else {
            position.x.clamp(0.0, max.x)
        };
        Xy::new(x, position.y.clamp(0.0, max.y))
    }

    // ------------------------------------------------------------------------
    // Layout
    // ------------------------------------------------------------------------

    fn gutter_for(&self, element: &Element) -> Wh {
        let thickness = self.platform.scrollbar_thickness();
        let hidden = element.gutter_suppressed
            || (self.platform.supports_scrollbar_hiding()
                && element.classes.contains(markers::CLASS_SCROLLBAR_HIDDEN));
        if hidden {
            return Wh::ZERO;
        }
        Wh::new(
            // Horizontal bar consumes height `w`; vertical bar width `h`.
            if element.style.overflow_x == StyleOverflow::Scroll {
                thickness.w
            } else {
                0.0
            },
            if element.style.overflow_y == StyleOverflow::Scroll {
                thickness.h
            } else {
                0.0
            },
        )
    }

    fn taffy_style(&self, element: &Element, gutter: Wh) -> Style {
        let dim = |unit: StyleUnit| -> Dimension {
            match unit {
                StyleUnit::Auto => auto(),
                StyleUnit::Px(v) => length(v),
                StyleUnit::Percent(v) => percent(v / 100.0),
            }
        };
        let mut width = element.style.width;
        let mut height = element.style.height;
        // Sizing classes used by the intrinsic-size probe pair: `max` pins
        // the element to the full parent extent, `min` releases it.
        if element.classes.contains(markers::CLASS_SIZE_FRACTION_MAX) {
            width = StyleUnit::Percent(100.0);
            height = StyleUnit::Percent(100.0);
        } else if element.classes.contains(markers::CLASS_SIZE_FRACTION_MIN) {
            width = StyleUnit::Auto;
            height = StyleUnit::Auto;
        }
        if element.tag == Tag::Textarea {
            // Intrinsic textarea sizing from rows/cols when unsized.
            let cols: f32 = element
                .attributes
                .get("cols")
                .and_then(|v| v.parse().ok())
                .unwrap_or(20.0);
            let rows: f32 = element
                .attributes
                .get("rows")
                .and_then(|v| v.parse().ok())
                .unwrap_or(2.0);
            if width == StyleUnit::Auto {
                width = StyleUnit::Px(cols * 8.0);
            }
            if height == StyleUnit::Auto {
                height = StyleUnit::Px(rows * 16.0);
            }
        }
        let overflow = |o: StyleOverflow| match o {
            StyleOverflow::Visible => taffy::style::Overflow::Visible,
            StyleOverflow::Hidden => taffy::style::Overflow::Hidden,
            StyleOverflow::Scroll => taffy::style::Overflow::Scroll,
        };
        Style {
            display: Display::Block,
            size: Size {
                width: dim(width),
                height: dim(height),
            },
            margin: Rect {
                top: length(element.style.margin.t),
                right: length(element.style.margin.r),
                bottom: length(element.style.margin.b),
                left: length(element.style.margin.l),
            },
            padding: Rect {
                top: length(element.style.padding.t),
                right: length(element.style.padding.r),
                bottom: length(element.style.padding.b),
                left: length(element.style.padding.l),
            },
            overflow: taffy::geometry::Point {
                x: overflow(element.style.overflow_x),
                y: overflow(element.style.overflow_y),
            },
            scrollbar_width: gutter.w.max(gutter.h),
            ..Default::default()
        }
    }

    /// Recompute layout for the whole document at the given viewport size,
    /// refresh per-element metrics and run resize observations.
    pub fn layout(&self, viewport: Wh) {
        {
            let mut inner = self.inner.borrow_mut();
            let root = inner.root;
            let mut taffy: TaffyTree<()> = TaffyTree::new();
            let mut order: Vec<(ElementId, NodeId)> = Vec::with_capacity(inner.elements.len());

            fn build(
                tree: &Tree,
                inner: &TreeInner,
                taffy: &mut TaffyTree<()>,
                order: &mut Vec<(ElementId, NodeId)>,
                el: ElementId,
            ) -> NodeId {
                let element = &inner.elements[el];
                let gutter = tree.gutter_for(element);
                let style = tree.taffy_style(element, gutter);
                let node = taffy.new_leaf(style).unwrap();
                order.push((el, node));
                for &child in &element.children {
                    let child_node = build(tree, inner, taffy, order, child);
                    let _ = taffy.add_child(node, child_node);
                }
                node
            }

            let root_node = build(self, &inner, &mut taffy, &mut order, root);
            let _ = taffy.compute_layout(
                root_node,
                Size {
                    width: AvailableSpace::Definite(viewport.w),
                    height: AvailableSpace::Definite(viewport.h),
                },
            );

            for (el, node) in order {
                let Ok(layout) = taffy.layout(node) else {
                    continue;
                };
                let gutter = {
                    let element = &inner.elements[el];
                    self.gutter_for(element)
                };
                let offset = Wh::new(layout.size.width, layout.size.height);
                let client = Wh::new(
                    (offset.w - gutter.h).max(0.0),
                    (offset.h - gutter.w).max(0.0),
                );
                let scroll_size = Wh::new(
                    layout.content_size.width.max(client.w),
                    layout.content_size.height.max(client.h),
                );
                let element = inner
                    .elements
                    .get_mut(el)
                    .unwrap_or_else(|| unreachable!("element removed mid-layout"));
                element.metrics = ElementMetrics {
                    location: Xy::new(layout.location.x, layout.location.y),
                    offset,
                    client,
                    scroll_size,
                };
            }

            // Pin body metrics to the viewport; taffy sizes it to content.
            if let Some(body) = inner.elements.get_mut(root) {
                body.metrics.offset = viewport;
                let gutter = Wh::new(
                    if body.style.overflow_x == StyleOverflow::Scroll {
                        self.platform.scrollbar_thickness().w
                    } else {
                        0.0
                    },
                    if body.style.overflow_y == StyleOverflow::Scroll {
                        self.platform.scrollbar_thickness().h
                    } else {
                        0.0
                    },
                );
                body.metrics.client = Wh::new(
                    (viewport.w - gutter.h).max(0.0),
                    (viewport.h - gutter.w).max(0.0),
                );
                body.metrics.scroll_size = Wh::new(
                    body.metrics.scroll_size.w.max(body.metrics.client.w),
                    body.metrics.scroll_size.h.max(body.metrics.client.h),
                );
            }
        }
        trace!("layout pass complete");
        self.run_resize_observations();
    }

    /// Metrics from the last layout pass.
    pub fn metrics(&self, el: ElementId) -> ElementMetrics {
        self.inner
            .borrow()
            .elements
            .get(el)
            .map(|e| e.metrics)
            .unwrap_or_default()
    }

    pub fn offset_size(&self, el: ElementId) -> Wh {
        self.metrics(el).offset
    }

    pub fn client_size(&self, el: ElementId) -> Wh {
        self.metrics(el).client
    }

    pub fn scroll_size(&self, el: ElementId) -> Wh {
        self.metrics(el).scroll_size
    }

    /// Sub-pixel remainder of the border-box size.
    pub fn fractional_size(&self, el: ElementId) -> Wh {
        self.metrics(el).offset.fract()
    }

    // ------------------------------------------------------------------------
    // Mutation observers
    // ------------------------------------------------------------------------

    pub fn observe_mutations(
        &self,
        target: ElementId,
        options: MutationOptions,
        callback: impl Fn(Vec<MutationRecord>) + 'static,
    ) -> MutationObserverId {
        self.inner
            .borrow_mut()
            .mutation_observers
            .insert(MutationObserverState {
                target,
                options,
                callback: Rc::new(callback),
                pending: SmallVec::new(),
                scheduled: None,
            })
    }

    /// Disconnect an observer. Pending undelivered records are dropped.
    pub fn disconnect_mutations(&self, id: MutationObserverId) {
        let timer = {
            let mut inner = self.inner.borrow_mut();
            inner
                .mutation_observers
                .remove(id)
                .and_then(|state| state.scheduled)
        };
        if let Some(timer) = timer {
            self.scheduler.cancel(timer);
        }
    }

    /// Drain pending records synchronously without waiting for delivery.
    pub fn take_records(&self, id: MutationObserverId) -> Vec<MutationRecord> {
        let mut inner = self.inner.borrow_mut();
        inner
            .mutation_observers
            .get_mut(id)
            .map(|state| state.pending.drain(..).collect())
            .unwrap_or_default()
    }

    fn journal(&self, target: ElementId, kind: MutationKind) {
        let mut to_schedule: SmallVec<[MutationObserverId; 2]> = SmallVec::new();
        {
            let mut inner = self.inner.borrow_mut();
            let ids: SmallVec<[MutationObserverId; 4]> =
                inner.mutation_observers.keys().collect();
            for id in ids {
                let interested = {
                    let state = &inner.mutation_observers[id];
                    state.options.matches(&kind)
                        && (state.target == target
                            || (state.options.subtree
                                && Self::is_ancestor(&inner, state.target, target)))
                };
                if !interested {
                    continue;
                }
                let state = &mut inner.mutation_observers[id];
                state.pending.push(MutationRecord {
                    target,
                    kind: kind.clone(),
                });
                if state.scheduled.is_none() {
                    to_schedule.push(id);
                }
            }
        }
        for id in to_schedule {
            let tree = self.clone();
            let timer = self.scheduler.set_timeout(0, move || tree.deliver_mutations(id));
            let mut inner = self.inner.borrow_mut();
            if let Some(state) = inner.mutation_observers.get_mut(id) {
                state.scheduled = Some(timer);
            }
        }
    }

    fn deliver_mutations(&self, id: MutationObserverId) {
        let delivery = {
            let mut inner = self.inner.borrow_mut();
            let Some(state) = inner.mutation_observers.get_mut(id) else {
                return;
            };
            state.scheduled = None;
            if state.pending.is_empty() {
                return;
            }
            let records: Vec<MutationRecord> = state.pending.drain(..).collect();
            (records, Rc::clone(&state.callback))
        };
        let (records, callback) = delivery;
        trace!(count = records.len(), "delivering mutation records");
        callback(records);
    }

    // ------------------------------------------------------------------------
    // Resize observers
    // ------------------------------------------------------------------------

    pub fn observe_resize(
        &self,
        target: ElementId,
        callback: impl Fn(Wh) + 'static,
    ) -> ResizeObserverId {
        self.inner
            .borrow_mut()
            .resize_observers
            .insert(ResizeObserverState {
                target,
                cache: Cache::new(Wh::new(-1.0, -1.0)),
                callback: Rc::new(callback),
                scheduled: None,
            })
    }

    pub fn unobserve_resize(&self, id: ResizeObserverId) {
        let timer = {
            let mut inner = self.inner.borrow_mut();
            inner
                .resize_observers
                .remove(id)
                .and_then(|state| state.scheduled)
        };
        if let Some(timer) = timer {
            self.scheduler.cancel(timer);
        }
    }

    fn run_resize_observations(&self) {
        let mut to_schedule: SmallVec<[(ResizeObserverId, Wh); 2]> = SmallVec::new();
        {
            let mut inner = self.inner.borrow_mut();
            let ids: SmallVec<[ResizeObserverId; 4]> = inner.resize_observers.keys().collect();
            for id in ids {
                let size = {
                    let state = &inner.resize_observers[id];
                    match inner.elements.get(state.target) {
                        Some(element) => element.metrics.offset,
                        None => continue,
                    }
                };
                let state = &mut inner.resize_observers[id];
                if state.cache.update(size).changed && state.scheduled.is_none() {
                    to_schedule.push((id, size));
                }
            }
        }
        for (id, size) in to_schedule {
            let tree = self.clone();
            let timer = self.scheduler.set_timeout(0, move || {
                let callback = {
                    let mut inner = tree.inner.borrow_mut();
                    let Some(state) = inner.resize_observers.get_mut(id) else {
                        return;
                    };
                    state.scheduled = None;
                    Rc::clone(&state.callback)
                };
                callback(size);
            });
            let mut inner = self.inner.borrow_mut();
            if let Some(state) = inner.resize_observers.get_mut(id) {
                state.scheduled = Some(timer);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Element events
    // ------------------------------------------------------------------------

    pub fn on(
        &self,
        el: ElementId,
        name: &str,
        listener: impl Fn(&ElementEvent) + 'static,
    ) -> EventBinding {
        let mut inner = self.inner.borrow_mut();
        let key = match inner.elements.get_mut(el) {
            Some(element) => element
                .listeners
                .entry(name.to_string())
                .or_default()
                .on(listener),
            None => ListenerKey::default(),
        };
        EventBinding {
            element: el,
            name: name.to_string(),
            key,
        }
    }

    /// Remove a listener. Removing twice is a no-op.
    pub fn off(&self, binding: &EventBinding) {
        let mut inner = self.inner.borrow_mut();
        if let Some(element) = inner.elements.get_mut(binding.element) {
            if let Some(hub) = element.listeners.get_mut(&binding.name) {
                hub.off(binding.key);
            }
        }
    }

    /// Dispatch an event to the target's listeners for `name`.
    pub fn dispatch(&self, el: ElementId, name: &str) {
        let (listeners, scroll) = {
            let inner = self.inner.borrow();
            let Some(element) = inner.elements.get(el) else {
                return;
            };
            let listeners = element
                .listeners
                .get(name)
                .map(|hub| hub.snapshot())
                .unwrap_or_default();
            (listeners, element.scroll)
        };
        let event = ElementEvent { target: el, scroll };
        for listener in listeners {
            listener(&event);
        }
    }

    // ------------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------------

    /// Serialize `el` and its subtree to markup. Deterministic: `class`
    /// first (omitted when empty), attributes in insertion order, `style`
    /// last (omitted when default).
    pub fn outer_html(&self, el: ElementId) -> String {
        let mut out = String::new();
        self.write_html(el, &mut out);
        out
    }

    fn write_html(&self, el: ElementId, out: &mut String) {
        let (tag, open, text, children) = {
            let inner = self.inner.borrow();
            let Some(element) = inner.elements.get(el) else {
                return;
            };
            let mut open = String::new();
            let classes = Self::class_string(element);
            if !classes.is_empty() {
                open.push_str(&format!(" class=\"{classes}\""));
            }
            for (name, value) in &element.attributes {
                open.push_str(&format!(" {name}=\"{value}\""));
            }
            let css = element.style.to_css();
            if !css.is_empty() {
                open.push_str(&format!(" style=\"{css}\""));
            }
            (
                element.tag.name(),
                open,
                element.text.clone(),
                element.children.clone(),
            )
        };
        out.push_str(&format!("<{tag}{open}>"));
        if let Some(text) = text {
            out.push_str(&text);
        }
        for child in children {
            self.write_html(child, out);
        }
        out.push_str(&format!("</{tag}>"));
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::TestPlatform;
    use std::cell::RefCell as StdRefCell;

    fn fixture() -> (Scheduler, Tree) {
        let scheduler = Scheduler::new();
        let tree = Tree::new(&scheduler, Rc::new(TestPlatform::new()));
        (scheduler, tree)
    }

    fn sized_div(tree: &Tree, w: f32, h: f32) -> ElementId {
        let el = tree.create_div();
        tree.edit_style(el, |s| {
            s.width = StyleUnit::Px(w);
            s.height = StyleUnit::Px(h);
        });
        el
    }

    #[test]
    fn scroll_size_tracks_overflowing_content() {
        let (_, tree) = fixture();
        let host = sized_div(&tree, 200.0, 200.0);
        tree.edit_style(host, |s| {
            s.overflow_x = StyleOverflow::Scroll;
            s.overflow_y = StyleOverflow::Scroll;
        });
        let content = sized_div(&tree, 500.0, 500.0);
        tree.append_child(tree.root(), host);
        tree.append_child(host, content);
        tree.layout(Wh::new(800.0, 600.0));

        let metrics = tree.metrics(host);
        assert_eq!(metrics.offset, Wh::new(200.0, 200.0));
        // Both axes scroll, so each loses the cross-axis gutter.
        assert_eq!(metrics.client, Wh::new(185.0, 185.0));
        assert_eq!(metrics.scroll_size.w, 500.0);
        assert_eq!(metrics.scroll_size.h, 500.0);
    }

    #[test]
    fn hiding_class_removes_the_gutter() {
        let (_, tree) = fixture();
        let host = sized_div(&tree, 200.0, 200.0);
        tree.edit_style(host, |s| {
            s.overflow_y = StyleOverflow::Scroll;
        });
        tree.add_class(host, markers::CLASS_SCROLLBAR_HIDDEN);
        tree.append_child(tree.root(), host);
        tree.layout(Wh::new(800.0, 600.0));
        assert_eq!(tree.client_size(host), Wh::new(200.0, 200.0));
    }

    #[test]
    fn scroll_position_clamps_to_max_scroll() {
        let (_, tree) = fixture();
        let host = sized_div(&tree, 200.0, 200.0);
        tree.edit_style(host, |s| {
            s.overflow_x = StyleOverflow::Scroll;
            s.overflow_y = StyleOverflow::Scroll;
        });
        let content = sized_div(&tree, 500.0, 500.0);
        tree.append_child(tree.root(), host);
        tree.append_child(host, content);
        tree.layout(Wh::new(800.0, 600.0));

        tree.set_scroll_position(host, Xy::new(10_000.0, -50.0));
        let max = tree.max_scroll(host);
        assert_eq!(tree.scroll_position(host), Xy::new(max.x, 0.0));
    }

    #[test]
    fn rtl_negated_scroll_left_is_non_positive() {
        let scheduler = Scheduler::new();
        let tree = Tree::new(&scheduler, Rc::new(TestPlatform::new()));
        let host = sized_div(&tree, 200.0, 200.0);
        tree.edit_style(host, |s| {
            s.overflow_x = StyleOverflow::Scroll;
            s.direction_rtl = Some(true);
        });
        let content = sized_div(&tree, 500.0, 200.0);
        tree.append_child(tree.root(), host);
        tree.append_child(host, content);
        tree.layout(Wh::new(800.0, 600.0));

        tree.set_scroll_left(host, -999.0);
        let max = tree.max_scroll(host);
        assert_eq!(tree.scroll_left(host), -max.x);
        tree.set_scroll_left(host, 500.0);
        assert_eq!(tree.scroll_left(host), 0.0);
    }

    #[test]
    fn scroll_change_dispatches_scroll_event() {
        let (_, tree) = fixture();
        let host = sized_div(&tree, 200.0, 200.0);
        tree.edit_style(host, |s| s.overflow_y = StyleOverflow::Scroll);
        let content = sized_div(&tree, 100.0, 500.0);
        tree.append_child(tree.root(), host);
        tree.append_child(host, content);
        tree.layout(Wh::new(800.0, 600.0));

        let seen = Rc::new(StdRefCell::new(Vec::new()));
        let listener_seen = Rc::clone(&seen);
        tree.on(host, events::SCROLL, move |e| {
            listener_seen.borrow_mut().push(e.scroll.y);
        });
        tree.set_scroll_top(host, 40.0);
        tree.set_scroll_top(host, 40.0); // no change, no event
        assert_eq!(*seen.borrow(), vec![40.0]);
    }

    #[test]
    fn mutation_observer_filters_and_batches() {
        let (scheduler, tree) = fixture();
        let host = tree.create_div();
        tree.append_child(tree.root(), host);

        let batches = Rc::new(StdRefCell::new(Vec::new()));
        let cb_batches = Rc::clone(&batches);
        tree.observe_mutations(
            host,
            MutationOptions {
                attributes: true,
                attribute_filter: Some(vec!["class".to_string(), "data-x".to_string()]),
                ..Default::default()
            },
            move |records| cb_batches.borrow_mut().push(records),
        );

        tree.add_class(host, "a");
        tree.set_attr(host, "data-x", "1");
        tree.set_attr(host, "unrelated", "v");
        scheduler.flush_now();

        let batches = batches.borrow();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
    }

    #[test]
    fn subtree_observer_sees_descendant_child_list_changes() {
        let (scheduler, tree) = fixture();
        let content = tree.create_div();
        let nested = tree.create_div();
        tree.append_child(tree.root(), content);
        tree.append_child(content, nested);

        let count = Rc::new(StdRefCell::new(0));
        let cb_count = Rc::clone(&count);
        tree.observe_mutations(
            content,
            MutationOptions {
                subtree: true,
                child_list: true,
                character_data: true,
                ..Default::default()
            },
            move |records| *cb_count.borrow_mut() += records.len(),
        );

        let leaf = tree.create_div();
        tree.append_child(nested, leaf);
        tree.set_text(leaf, "hello");
        scheduler.flush_now();
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn take_records_drains_pending_synchronously() {
        let (scheduler, tree) = fixture();
        let host = tree.create_div();
        tree.append_child(tree.root(), host);
        let fired = Rc::new(StdRefCell::new(0));
        let cb_fired = Rc::clone(&fired);
        let id = tree.observe_mutations(
            host,
            MutationOptions {
                attributes: true,
                ..Default::default()
            },
            move |_| *cb_fired.borrow_mut() += 1,
        );
        tree.set_attr(host, "data-x", "1");
        let records = tree.take_records(id);
        assert_eq!(records.len(), 1);
        scheduler.flush_now();
        // Drained before delivery, so the callback never ran.
        assert_eq!(*fired.borrow(), 0);
    }

    #[test]
    fn resize_observer_fires_initially_and_on_change() {
        let (scheduler, tree) = fixture();
        let host = sized_div(&tree, 200.0, 200.0);
        tree.append_child(tree.root(), host);

        let sizes = Rc::new(StdRefCell::new(Vec::new()));
        let cb_sizes = Rc::clone(&sizes);
        tree.observe_resize(host, move |size| cb_sizes.borrow_mut().push(size));

        tree.layout(Wh::new(800.0, 600.0));
        scheduler.flush_now();
        tree.layout(Wh::new(800.0, 600.0));
        scheduler.flush_now();
        tree.edit_style(host, |s| s.width = StyleUnit::Px(300.0));
        tree.layout(Wh::new(800.0, 600.0));
        scheduler.flush_now();

        assert_eq!(
            *sizes.borrow(),
            vec![Wh::new(200.0, 200.0), Wh::new(300.0, 200.0)]
        );
    }

    #[test]
    fn outer_html_round_trips_structure() {
        let (_, tree) = fixture();
        let host = tree.create_div();
        tree.add_class(host, "box");
        tree.set_attr(host, "data-x", "1");
        let child = tree.create_div();
        tree.set_text(child, "hi");
        tree.append_child(host, child);
        assert_eq!(
            tree.outer_html(host),
            "<div class=\"box\" data-x=\"1\"><div>hi</div></div>"
        );
        tree.remove_class(host, "box");
        assert_eq!(
            tree.outer_html(host),
            "<div data-x=\"1\"><div>hi</div></div>"
        );
    }

    #[test]
    fn insert_after_and_move_children_preserve_order() {
        let (_, tree) = fixture();
        let a = tree.create_div();
        let b = tree.create_div();
        let c = tree.create_div();
        tree.append_child(tree.root(), a);
        tree.append_child(tree.root(), c);
        tree.insert_after(a, b);
        assert_eq!(tree.children(tree.root()), vec![a, b, c]);

        let bucket = tree.create_div();
        tree.move_children(tree.root(), bucket);
        assert!(tree.children(tree.root()).is_empty());
        assert_eq!(tree.children(bucket), vec![a, b, c]);
    }
}
