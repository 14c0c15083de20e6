//! Instance facade
//!
//! [`ScrollArea`] ties the structure, observation layer, update engine and
//! scrollbar surface together behind one handle. Construction resolves the
//! initialization configuration against the environment defaults, runs the
//! first forced update, and from then on every observation funnels into one
//! cycle per debounce window.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{debug, info};

use veneer_core::{Error, EventHub, ListenerKey};

use crate::context::Context;
use crate::initialization::Initialization;
use crate::options::{Options, OptionsDiff, PartialOptions};
use crate::scrollbars::Scrollbars;
use crate::structure::elements::{StructureElements, StructureSetup};
use crate::structure::observers::StructureObservers;
use crate::structure::update::{OverflowState, StructureUpdater, UpdateHints, UpdateReason};
use crate::tree::ElementId;

/// Lifecycle and update notifications.
#[derive(Debug, Clone, Copy)]
pub enum ScrollAreaEvent {
    /// The structure exists and the first update cycle has run.
    Initialized,
    /// One update cycle finished.
    Updated {
        hints: UpdateHints,
        changed_options: OptionsDiff,
    },
    /// The structure was torn down.
    Destroyed,
}

/// Full state snapshot, for reading only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollAreaState {
    pub overflow: OverflowState,
    pub destroyed: bool,
}

struct CycleState {
    updater: StructureUpdater,
    scrollbars: Scrollbars,
    observers: RefCell<Option<StructureObservers>>,
    options: RefCell<Options>,
    events: RefCell<EventHub<ScrollAreaEvent>>,
    destroyed: Cell<bool>,
}

/// Run one update cycle and fan out the result. Quietly refuses to run on a
/// destroyed instance, since debounced observations may still be in flight.
fn run_cycle(state: &Rc<CycleState>, reason: &UpdateReason) -> UpdateHints {
    if state.destroyed.get() {
        return UpdateHints::default();
    }
    let options = state.options.borrow().clone();
    let hints = state.updater.update(&options, reason);
    if let Some(observers) = state.observers.borrow().as_ref() {
        observers.absorb_cycle();
    }
    state
        .scrollbars
        .refresh(&options, &state.updater.state(), &hints, &reason.changed_options);
    let listeners = state.events.borrow().snapshot();
    let event = ScrollAreaEvent::Updated {
        hints,
        changed_options: reason.changed_options,
    };
    for listener in listeners {
        listener(&event);
    }
    hints
}

/// One initialized scroll area. Cheap to clone; all clones address the same
/// instance.
#[derive(Clone)]
pub struct ScrollArea {
    ctx: Context,
    setup: Rc<StructureSetup>,
    state: Rc<CycleState>,
}

impl ScrollArea {
    /// Initialize a scroll area on `target`.
    ///
    /// `options` merges over the environment's default options, `init` over
    /// the environment's default initialization. The cancel configuration is
    /// honored before anything is generated.
    pub fn new(
        ctx: &Context,
        target: ElementId,
        options: Option<PartialOptions>,
        init: Initialization,
    ) -> Result<Self, Error> {
        let env = ctx.environment();
        let init = init.merged_over(&env.default_initialization());

        let overlaid = env.scrollbars_overlaid();
        if init.cancel.native_scrollbars_overlaid && overlaid.x && overlaid.y {
            info!("initialization canceled: native scrollbars are overlaid");
            return Err(Error::InitializationCanceled);
        }
        let target_is_body = ctx.tree().tag(target) == Some(crate::tree::Tag::Body);
        if target_is_body && init.cancel.body == Some(true) {
            info!("initialization canceled: body targets are disabled");
            return Err(Error::InitializationCanceled);
        }

        let mut merged = env.default_options();
        if let Some(partial) = &options {
            merged = merged.merged(partial);
        }

        let setup = Rc::new(StructureSetup::create(ctx, target, &init)?);
        setup.append(ctx);

        let updater = StructureUpdater::new(ctx, setup.elements);
        let scrollbars = Scrollbars::new(ctx, setup.elements, &merged);
        let state = Rc::new(CycleState {
            updater,
            scrollbars,
            observers: RefCell::new(None),
            options: RefCell::new(merged.clone()),
            events: RefCell::new(EventHub::new()),
            destroyed: Cell::new(false),
        });

        let sink_state = Rc::clone(&state);
        let observers =
            StructureObservers::new(ctx, setup.elements, &merged, move |observer_hints| {
                run_cycle(
                    &sink_state,
                    &UpdateReason {
                        observers: observer_hints,
                        ..Default::default()
                    },
                );
            });
        *state.observers.borrow_mut() = Some(observers);

        run_cycle(
            &state,
            &UpdateReason {
                force: true,
                ..Default::default()
            },
        );
        let listeners = state.events.borrow().snapshot();
        for listener in listeners {
            listener(&ScrollAreaEvent::Initialized);
        }
        debug!("scroll area initialized");
        Ok(Self {
            ctx: ctx.clone(),
            setup,
            state,
        })
    }

    /// Read-only state snapshot of the last cycle.
    pub fn state(&self) -> ScrollAreaState {
        ScrollAreaState {
            overflow: self.state.updater.state(),
            destroyed: self.state.destroyed.get(),
        }
    }

    /// The structure's element roles.
    pub fn elements(&self) -> StructureElements {
        self.setup.elements
    }

    /// The generated scrollbar surface.
    pub fn scrollbars(&self) -> &Scrollbars {
        &self.state.scrollbars
    }

    /// Current merged options.
    pub fn options(&self) -> Options {
        self.state.options.borrow().clone()
    }

    /// Merge `partial` over the current options and run a cycle scoped to
    /// what actually changed. Returns the cycle's hints.
    pub fn set_options(&self, partial: &PartialOptions) -> UpdateHints {
        let (diff, merged) = {
            let current = self.state.options.borrow();
            let merged = current.merged(partial);
            (merged.diff(&current), merged)
        };
        *self.state.options.borrow_mut() = merged.clone();
        if diff.update {
            if let Some(observers) = self.state.observers.borrow().as_ref() {
                observers.update_options(&merged);
            }
        }
        if !diff.any() {
            return UpdateHints::default();
        }
        run_cycle(
            &self.state,
            &UpdateReason {
                changed_options: diff,
                ..Default::default()
            },
        )
    }

    /// Run an update cycle now. `force` invalidates every cache.
    pub fn update(&self, force: bool) -> UpdateHints {
        if let Some(observers) = self.state.observers.borrow().as_ref() {
            observers.flush();
        }
        run_cycle(
            &self.state,
            &UpdateReason {
                force,
                ..Default::default()
            },
        )
    }

    /// Subscribe to lifecycle and update events.
    pub fn on(&self, listener: impl Fn(&ScrollAreaEvent) + 'static) -> ListenerKey {
        self.state.events.borrow_mut().on(listener)
    }

    pub fn off(&self, key: ListenerKey) {
        self.state.events.borrow_mut().off(key);
    }

    /// Tear the instance down and restore the target. Safe to call
    /// repeatedly; timers are canceled before anything is disconnected.
    pub fn destroy(&self) {
        if self.state.destroyed.replace(true) {
            return;
        }
        if let Some(observers) = self.state.observers.borrow().as_ref() {
            observers.destroy();
        }
        self.state.scrollbars.destroy();
        self.setup.destroy(&self.ctx);
        let listeners = self.state.events.borrow().snapshot();
        for listener in listeners {
            listener(&ScrollAreaEvent::Destroyed);
        }
        self.state.events.borrow_mut().clear();
        debug!("scroll area destroyed");
    }
}
