//! Listener hub for single-threaded event fan-out
//!
//! The scroll system is single-threaded and event-loop driven, so callbacks
//! are `Rc` rather than `Arc`. A hub hands out a [`ListenerKey`] per
//! registration; removal through the key is idempotent.

use std::rc::Rc;

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Identifies one registered listener.
    pub struct ListenerKey;
}

/// Listener registry for one event payload type.
pub struct EventHub<A> {
    listeners: SlotMap<ListenerKey, Rc<dyn Fn(&A)>>,
}

impl<A> Default for EventHub<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> EventHub<A> {
    pub fn new() -> Self {
        Self {
            listeners: SlotMap::with_key(),
        }
    }

    /// Register a listener; the returned key revokes it.
    pub fn on(&mut self, listener: impl Fn(&A) + 'static) -> ListenerKey {
        self.listeners.insert(Rc::new(listener))
    }

    /// Remove a listener. Removing twice is a no-op.
    pub fn off(&mut self, key: ListenerKey) {
        self.listeners.remove(key);
    }

    /// Whether any listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Collect the current listeners for dispatch.
    ///
    /// Cloning out lets the caller drop any interior borrow before invoking
    /// callbacks, so a listener may re-enter the owning structure.
    pub fn snapshot(&self) -> Vec<Rc<dyn Fn(&A)>> {
        self.listeners.values().cloned().collect()
    }

    /// Invoke every registered listener with `payload`.
    pub fn trigger(&self, payload: &A) {
        for listener in self.listeners.values() {
            listener(payload);
        }
    }

    /// Drop all listeners.
    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn trigger_reaches_all_listeners() {
        let hits = Rc::new(Cell::new(0));
        let mut hub = EventHub::<u32>::new();
        for _ in 0..3 {
            let hits = Rc::clone(&hits);
            hub.on(move |n| hits.set(hits.get() + n));
        }
        hub.trigger(&2);
        assert_eq!(hits.get(), 6);
    }

    #[test]
    fn off_is_idempotent() {
        let hits = Rc::new(Cell::new(0));
        let mut hub = EventHub::<()>::new();
        let key = hub.on({
            let hits = Rc::clone(&hits);
            move |()| hits.set(hits.get() + 1)
        });
        hub.off(key);
        hub.off(key);
        hub.trigger(&());
        assert_eq!(hits.get(), 0);
    }
}
