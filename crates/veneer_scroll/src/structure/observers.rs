//! Observation layer
//!
//! Watches everything that can invalidate the structure (viewport and
//! content size, host attributes, deep content mutations, content element
//! events) and funnels every signal through one debouncer so bursts
//! coalesce into a single update cycle with merged hints.
//!
//! The layer never reacts to its own writes: records carrying the reserved
//! attribute namespace, records produced while the updating marker is set,
//! and records matching the user's ignore predicate are dropped before they
//! can request a cycle.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use veneer_core::Debouncer;

use crate::context::Context;
use crate::markers;
use crate::options::{IgnoreMutation, Options};
use crate::structure::elements::StructureElements;
use crate::tree::{
    ElementId, EventBinding, MutationKind, MutationObserverId, MutationOptions, MutationRecord,
    ResizeObserverId,
};

/// Host attributes that always trigger an update when they change.
const BASE_HOST_ATTRIBUTES: &[&str] = &["id", "class", "style", "open", "wrap", "cols", "rows"];

/// Merged reasons an update cycle was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ObserversUpdateHints {
    /// The viewport's border-box size changed.
    pub size_changed: bool,
    /// The content's intrinsic size changed.
    pub content_size_changed: bool,
    /// A watched host attribute changed.
    pub host_mutation: bool,
    /// Content childList/characterData changed, or a content element event
    /// (e.g. an image load) fired.
    pub content_mutation: bool,
}

impl ObserversUpdateHints {
    pub fn merge(self, other: Self) -> Self {
        Self {
            size_changed: self.size_changed || other.size_changed,
            content_size_changed: self.content_size_changed || other.content_size_changed,
            host_mutation: self.host_mutation || other.host_mutation,
            content_mutation: self.content_mutation || other.content_mutation,
        }
    }

    pub fn any(&self) -> bool {
        self.size_changed
            || self.content_size_changed
            || self.host_mutation
            || self.content_mutation
    }
}

struct ObserversInner {
    ctx: Context,
    elements: StructureElements,
    debouncer: Debouncer<ObserversUpdateHints>,
    viewport_resize: Cell<Option<ResizeObserverId>>,
    content_resize: Cell<Option<ResizeObserverId>>,
    host_mutations: Cell<Option<MutationObserverId>>,
    content_mutations: Cell<Option<MutationObserverId>>,
    element_events: RefCell<Vec<(String, String)>>,
    event_bindings: RefCell<FxHashMap<(ElementId, String), EventBinding>>,
    ignore: RefCell<Option<IgnoreMutation>>,
    destroyed: Cell<bool>,
}

/// Owns every observation source for one structure.
pub struct StructureObservers {
    inner: Rc<ObserversInner>,
}

fn record_ignored(inner: &ObserversInner, record: &MutationRecord) -> bool {
    // The engine's own writes: reserved attributes, and anything that
    // happens while the updating marker scopes a cycle.
    if let MutationKind::Attribute { name, .. } = &record.kind {
        if name.starts_with(markers::DATA_ATTR_HOST) {
            return true;
        }
    }
    if inner
        .ctx
        .tree()
        .attr(inner.elements.host, markers::DATA_ATTR_HOST_UPDATING)
        .is_some()
    {
        return true;
    }
    if let Some(ignore) = inner.ignore.borrow().as_ref() {
        if ignore.ignores(record) {
            return true;
        }
    }
    false
}

fn handle_host_records(inner: &Rc<ObserversInner>, records: &[MutationRecord]) {
    let relevant = records.iter().any(|r| !record_ignored(inner, r));
    if relevant {
        trace!("host attribute mutation");
        inner.debouncer.request(ObserversUpdateHints {
            host_mutation: true,
            ..Default::default()
        });
    }
}

fn handle_content_records(inner: &Rc<ObserversInner>, records: &[MutationRecord]) {
    let relevant = records.iter().any(|r| !record_ignored(inner, r));
    if !relevant {
        return;
    }
    // New content may bring new event sources (e.g. images).
    rescan_element_events(inner);
    trace!("content mutation");
    inner.debouncer.request(ObserversUpdateHints {
        content_mutation: true,
        ..Default::default()
    });
}

/// Attach listeners for the configured (tag, event) pairs to every matching
/// descendant; duplicate listeners are never attached and listeners on
/// removed elements are released.
fn rescan_element_events(inner: &Rc<ObserversInner>) {
    let tree = inner.ctx.tree();
    let pairs = inner.element_events.borrow().clone();
    let mut bindings = inner.event_bindings.borrow_mut();

    // Release stale bindings first.
    bindings.retain(|(el, _), binding| {
        let keep = tree.exists(*el) && tree.attached(*el);
        if !keep {
            tree.off(binding);
        }
        keep
    });

    if pairs.is_empty() {
        for (_, binding) in bindings.drain() {
            tree.off(&binding);
        }
        return;
    }

    let mut stack = vec![inner.elements.content_host()];
    while let Some(el) = stack.pop() {
        stack.extend(tree.children(el));
        let Some(tag) = tree.tag(el) else { continue };
        for (tag_name, event) in &pairs {
            if tag.name() != tag_name {
                continue;
            }
            let key = (el, event.clone());
            if bindings.contains_key(&key) {
                continue;
            }
            let event_inner = Rc::clone(inner);
            let binding = tree.on(el, event, move |_| {
                trace!("content element event");
                event_inner.debouncer.request(ObserversUpdateHints {
                    content_mutation: true,
                    ..Default::default()
                });
            });
            bindings.insert(key, binding);
        }
    }
}

fn host_attribute_filter(options: &Options) -> Vec<String> {
    let mut filter: Vec<String> = BASE_HOST_ATTRIBUTES.iter().map(|s| s.to_string()).collect();
    if let Some(extra) = &options.update.attributes {
        for attr in extra {
            if !filter.contains(attr) {
                filter.push(attr.clone());
            }
        }
    }
    filter
}

fn connect_host_observer(inner: &Rc<ObserversInner>, options: &Options) {
    let tree = inner.ctx.tree();
    if let Some(id) = inner.host_mutations.take() {
        tree.disconnect_mutations(id);
    }
    let observer_inner = Rc::clone(inner);
    let id = tree.observe_mutations(
        inner.elements.host,
        MutationOptions {
            attributes: true,
            attribute_filter: Some(host_attribute_filter(options)),
            ..Default::default()
        },
        move |records| handle_host_records(&observer_inner, &records),
    );
    inner.host_mutations.set(Some(id));
}

impl StructureObservers {
    /// Construct all observation sources. `on_update` receives the merged
    /// hints whenever the debounce window closes.
    pub fn new(
        ctx: &Context,
        elements: StructureElements,
        options: &Options,
        on_update: impl Fn(ObserversUpdateHints) + 'static,
    ) -> Self {
        let debouncer = Debouncer::new(
            ctx.scheduler(),
            ObserversUpdateHints::merge,
            on_update,
        );
        let (delay, max) = options.update.debounce.unwrap_or((0, None));
        debouncer.set_delay(delay, max);

        let inner = Rc::new(ObserversInner {
            ctx: ctx.clone(),
            elements,
            debouncer,
            viewport_resize: Cell::new(None),
            content_resize: Cell::new(None),
            host_mutations: Cell::new(None),
            content_mutations: Cell::new(None),
            element_events: RefCell::new(
                options.update.element_events.clone().unwrap_or_default(),
            ),
            event_bindings: RefCell::new(FxHashMap::default()),
            ignore: RefCell::new(options.update.ignore_mutation.clone()),
            destroyed: Cell::new(false),
        });
        let tree = ctx.tree();

        let resize_inner = Rc::clone(&inner);
        let viewport_resize = tree.observe_resize(elements.viewport, move |_| {
            trace!("viewport size changed");
            resize_inner.debouncer.request(ObserversUpdateHints {
                size_changed: true,
                ..Default::default()
            });
        });
        inner.viewport_resize.set(Some(viewport_resize));

        let content_host = elements.content_host();
        if content_host != elements.viewport {
            let resize_inner = Rc::clone(&inner);
            let content_resize = tree.observe_resize(content_host, move |_| {
                trace!("content size changed");
                resize_inner.debouncer.request(ObserversUpdateHints {
                    size_changed: true,
                    content_size_changed: true,
                    ..Default::default()
                });
            });
            inner.content_resize.set(Some(content_resize));
        }

        connect_host_observer(&inner, options);

        // Deep content observation only exists when content is hosted by the
        // structure; with the target as viewport the host owns its content.
        if !elements.viewport_is_target {
            let observer_inner = Rc::clone(&inner);
            let content_mutations = tree.observe_mutations(
                content_host,
                MutationOptions {
                    subtree: true,
                    child_list: true,
                    character_data: true,
                    ..Default::default()
                },
                move |records| handle_content_records(&observer_inner, &records),
            );
            inner.content_mutations.set(Some(content_mutations));
        }

        rescan_element_events(&inner);
        debug!("observers connected");
        Self { inner }
    }

    /// Apply changed update options at runtime.
    pub fn update_options(&self, options: &Options) {
        let (delay, max) = options.update.debounce.unwrap_or((0, None));
        self.inner.debouncer.set_delay(delay, max);
        *self.inner.ignore.borrow_mut() = options.update.ignore_mutation.clone();
        let events = options.update.element_events.clone().unwrap_or_default();
        if *self.inner.element_events.borrow() != events {
            *self.inner.element_events.borrow_mut() = events;
            rescan_element_events(&self.inner);
        }
        connect_host_observer(&self.inner, options);
    }

    /// Process pending observations synchronously and fire the pending
    /// update, if any.
    pub fn flush(&self) {
        let tree = self.inner.ctx.tree();
        if let Some(id) = self.inner.host_mutations.get() {
            let records = tree.take_records(id);
            handle_host_records(&self.inner, &records);
        }
        if let Some(id) = self.inner.content_mutations.get() {
            let records = tree.take_records(id);
            handle_content_records(&self.inner, &records);
        }
        self.inner.debouncer.flush();
    }

    /// Swallow the engine's own writes from the just-finished cycle.
    ///
    /// The updating marker scopes a cycle, but records are filtered at
    /// delivery time, after the marker is gone. Draining the host observer
    /// here and dropping the cycle's style and class records keeps an update
    /// from scheduling its own successor; any genuine host mutation that
    /// raced the cycle is re-processed.
    pub fn absorb_cycle(&self) {
        let Some(id) = self.inner.host_mutations.get() else {
            return;
        };
        let records: Vec<MutationRecord> = self
            .inner
            .ctx
            .tree()
            .take_records(id)
            .into_iter()
            .filter(|r| {
                !matches!(&r.kind, MutationKind::Attribute { name, .. }
                    if name == "style" || name == "class")
            })
            .collect();
        if !records.is_empty() {
            handle_host_records(&self.inner, &records);
        }
    }

    /// Cancel timers, then disconnect every source. Safe to call repeatedly.
    pub fn destroy(&self) {
        if self.inner.destroyed.replace(true) {
            return;
        }
        self.inner.debouncer.cancel();
        let tree = self.inner.ctx.tree();
        if let Some(id) = self.inner.viewport_resize.take() {
            tree.unobserve_resize(id);
        }
        if let Some(id) = self.inner.content_resize.take() {
            tree.unobserve_resize(id);
        }
        if let Some(id) = self.inner.host_mutations.take() {
            tree.disconnect_mutations(id);
        }
        if let Some(id) = self.inner.content_mutations.take() {
            tree.disconnect_mutations(id);
        }
        for (_, binding) in self.inner.event_bindings.borrow_mut().drain() {
            tree.off(&binding);
        }
        debug!("observers destroyed");
    }
}
