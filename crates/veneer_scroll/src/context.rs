//! Per-context runtime
//!
//! One [`Context`] owns everything a set of scroll areas shares: the
//! scheduler, the element tree, the probed environment and the plugin
//! registry. There is no process-global state; constructing a fresh context
//! is a full reset, which is what tests do.

use std::rc::Rc;

use veneer_core::{Scheduler, Wh};

use crate::environment::Environment;
use crate::platform::Platform;
use crate::plugins::PluginRegistry;
use crate::tree::Tree;

/// Shared runtime handle. Cheap to clone.
#[derive(Clone)]
pub struct Context {
    scheduler: Scheduler,
    tree: Tree,
    environment: Environment,
    plugins: PluginRegistry,
}

impl Context {
    pub fn new(platform: Rc<dyn Platform>) -> Self {
        let scheduler = Scheduler::new();
        let environment = Environment::new(&scheduler, Rc::clone(&platform));
        let tree = Tree::new(&scheduler, platform);
        Self {
            scheduler,
            tree,
            environment,
            plugins: PluginRegistry::new(),
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    /// Current layout viewport (the host window size).
    pub fn viewport(&self) -> Wh {
        self.environment.platform().window_size()
    }

    /// Recompute document layout at the current viewport.
    pub fn relayout(&self) {
        self.tree.layout(self.viewport());
    }
}
