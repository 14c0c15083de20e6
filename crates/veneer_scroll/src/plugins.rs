//! Plugin registry
//!
//! Optional capabilities live behind a name lookup. Core code asks for a
//! capability by name and falls back gracefully when it is absent; nothing in
//! the engine hard-depends on a plugin being registered.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::debug;

use veneer_core::{Trbl, Xy};

/// Shared plugin registry handle. Cheap to clone.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: Rc<RefCell<FxHashMap<String, Rc<dyn Any>>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability under `name`, replacing any previous one.
    pub fn register<T: 'static>(&self, name: &str, plugin: T) {
        debug!(name, "registering plugin");
        self.plugins
            .borrow_mut()
            .insert(name.to_string(), Rc::new(plugin));
    }

    /// Look up a capability by name and concrete type.
    pub fn get<T: 'static>(&self, name: &str) -> Option<Rc<T>> {
        self.plugins
            .borrow()
            .get(name)
            .cloned()
            .and_then(|plugin| plugin.downcast::<T>().ok())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.borrow().contains_key(name)
    }
}

/// Registry name of the viewport-arrange capability.
pub const VIEWPORT_ARRANGE_PLUGIN: &str = "viewport-arrange";

/// Arrange compensation for platforms that cannot hide native scrollbars:
/// the viewport is oversized by the native scrollbar thickness via negative
/// margins and the lost space is given back as padding, pushing the native
/// bars out of the visible box.
pub struct ViewportArrangePlugin;

impl ViewportArrangePlugin {
    /// Compute the (margin, padding) pair for a viewport whose axes overflow
    /// per `overflow_scroll`, with native scrollbar thickness `scrollbar`.
    /// In RTL the horizontal compensation flips to the left edge.
    pub fn compensation(
        &self,
        scrollbar: Xy<f32>,
        overflow_scroll: Xy<bool>,
        rtl: bool,
    ) -> (Trbl, Trbl) {
        let bottom = if overflow_scroll.x { scrollbar.x } else { 0.0 };
        let side = if overflow_scroll.y { scrollbar.y } else { 0.0 };
        let margin = if rtl {
            Trbl::new(0.0, 0.0, -bottom, -side)
        } else {
            Trbl::new(0.0, -side, -bottom, 0.0)
        };
        let padding = if rtl {
            Trbl::new(0.0, 0.0, bottom, side)
        } else {
            Trbl::new(0.0, side, bottom, 0.0)
        };
        (margin, padding)
    }

    /// Whether compensation applies at all for the measured scrollbar size.
    pub fn applies(&self, scrollbar: Xy<f32>) -> bool {
        scrollbar.x > 0.0 || scrollbar.y > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_typed_and_graceful() {
        let registry = PluginRegistry::new();
        assert!(registry.get::<ViewportArrangePlugin>(VIEWPORT_ARRANGE_PLUGIN).is_none());
        registry.register(VIEWPORT_ARRANGE_PLUGIN, ViewportArrangePlugin);
        assert!(registry.get::<ViewportArrangePlugin>(VIEWPORT_ARRANGE_PLUGIN).is_some());
        // Wrong type requested under the same name degrades to None.
        assert!(registry.get::<u32>(VIEWPORT_ARRANGE_PLUGIN).is_none());
    }

    #[test]
    fn compensation_targets_the_scrolling_axes() {
        let plugin = ViewportArrangePlugin;
        let (margin, padding) =
            plugin.compensation(Xy::new(15.0, 15.0), Xy::new(false, true), false);
        assert_eq!(margin, Trbl::new(0.0, -15.0, 0.0, 0.0));
        assert_eq!(padding, Trbl::new(0.0, 15.0, 0.0, 0.0));

        let (margin_rtl, _) =
            plugin.compensation(Xy::new(15.0, 15.0), Xy::new(false, true), true);
        assert_eq!(margin_rtl, Trbl::new(0.0, 0.0, 0.0, -15.0));
    }
}
