//! Deterministic virtual-time scheduler and two-tier debouncer
//!
//! The scroll system is driven by the host environment's event loop; there is
//! no preemption and no blocking wait. All suspension points are timer or
//! observer callbacks. The [`Scheduler`] models that loop with a virtual
//! clock: callbacks registered via [`Scheduler::set_timeout`] run when the
//! host (or a test) calls [`Scheduler::advance`], in due-time order, at the
//! virtual instant they were due.
//!
//! [`Debouncer`] implements the coalescing contract every observation source
//! funnels through: a short debounce merges bursts, a max-wait ceiling
//! guarantees an update fires even under continuous churn, and parameters of
//! merged requests are combined through a merge function rather than queued
//! as separate cycles.

use std::cell::RefCell;
use std::rc::Rc;

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Identifies one scheduled timeout; cancellation through it is idempotent.
    pub struct TimerKey;
}

struct Timer {
    due_ms: u64,
    seq: u64,
    callback: Rc<dyn Fn()>,
}

struct SchedulerInner {
    now_ms: u64,
    seq: u64,
    timers: SlotMap<TimerKey, Timer>,
}

/// Shared handle to the virtual event loop. Cheap to clone.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<RefCell<SchedulerInner>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(SchedulerInner {
                now_ms: 0,
                seq: 0,
                timers: SlotMap::with_key(),
            })),
        }
    }

    /// Current virtual time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.inner.borrow().now_ms
    }

    /// Schedule `callback` to run `delay_ms` from now.
    pub fn set_timeout(&self, delay_ms: u64, callback: impl Fn() + 'static) -> TimerKey {
        let mut inner = self.inner.borrow_mut();
        let due_ms = inner.now_ms + delay_ms;
        let seq = inner.seq;
        inner.seq += 1;
        inner.timers.insert(Timer {
            due_ms,
            seq,
            callback: Rc::new(callback),
        })
    }

    /// Cancel a scheduled timeout. Safe to call after it fired or was
    /// cancelled already.
    pub fn cancel(&self, key: TimerKey) {
        self.inner.borrow_mut().timers.remove(key);
    }

    /// Whether a timeout is still pending.
    pub fn is_pending(&self, key: TimerKey) -> bool {
        self.inner.borrow().timers.contains_key(key)
    }

    /// Advance virtual time by `ms`, firing due callbacks in due-time order.
    ///
    /// Callbacks may schedule or cancel further timeouts; anything they
    /// schedule inside the advanced window fires within the same call.
    pub fn advance(&self, ms: u64) {
        let target_ms = self.inner.borrow().now_ms + ms;
        loop {
            let next = {
                let inner = self.inner.borrow();
                inner
                    .timers
                    .iter()
                    .filter(|(_, t)| t.due_ms <= target_ms)
                    .min_by_key(|(_, t)| (t.due_ms, t.seq))
                    .map(|(key, t)| (key, t.due_ms))
            };
            let Some((key, due_ms)) = next else {
                break;
            };
            let callback = {
                let mut inner = self.inner.borrow_mut();
                inner.now_ms = inner.now_ms.max(due_ms);
                match inner.timers.remove(key) {
                    Some(timer) => timer.callback,
                    None => continue,
                }
            };
            // Borrow released: the callback may re-enter the scheduler.
            callback();
        }
        self.inner.borrow_mut().now_ms = target_ms;
    }

    /// Run everything currently scheduled for the present instant.
    pub fn flush_now(&self) {
        self.advance(0);
    }
}

struct DebouncerInner<P> {
    delay_ms: u64,
    max_delay_ms: Option<u64>,
    pending: Option<P>,
    timer: Option<TimerKey>,
    max_timer: Option<TimerKey>,
    merge: Rc<dyn Fn(P, P) -> P>,
    sink: Rc<dyn Fn(P)>,
}

/// Two-tier debouncer: short delay coalesces bursts, the optional max-wait
/// ceiling guarantees forward progress under continuous churn.
pub struct Debouncer<P> {
    scheduler: Scheduler,
    inner: Rc<RefCell<DebouncerInner<P>>>,
}

impl<P> Clone for Debouncer<P> {
    fn clone(&self) -> Self {
        Self {
            scheduler: self.scheduler.clone(),
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<P: 'static> Debouncer<P> {
    /// `merge` combines a newly requested parameter set into the pending one;
    /// `sink` receives the merged parameters when the debounce fires.
    pub fn new(
        scheduler: &Scheduler,
        merge: impl Fn(P, P) -> P + 'static,
        sink: impl Fn(P) + 'static,
    ) -> Self {
        Self {
            scheduler: scheduler.clone(),
            inner: Rc::new(RefCell::new(DebouncerInner {
                delay_ms: 0,
                max_delay_ms: None,
                pending: None,
                timer: None,
                max_timer: None,
                merge: Rc::new(merge),
                sink: Rc::new(sink),
            })),
        }
    }

    /// Reconfigure the delays. A zero short delay makes requests fire
    /// synchronously. Takes effect for the next request; a pending window
    /// keeps its original timing.
    pub fn set_delay(&self, delay_ms: u64, max_delay_ms: Option<u64>) {
        let mut inner = self.inner.borrow_mut();
        inner.delay_ms = delay_ms;
        inner.max_delay_ms = max_delay_ms;
    }

    /// Request a debounced invocation, merging `params` into any pending
    /// request (deliberate coalescing, not ordering loss).
    pub fn request(&self, params: P) {
        let (fire_now, schedule_max) = {
            let mut inner = self.inner.borrow_mut();
            let pending = match inner.pending.take() {
                Some(prev) => (inner.merge)(prev, params),
                None => params,
            };
            inner.pending = Some(pending);
            if inner.delay_ms == 0 {
                (true, false)
            } else {
                if let Some(timer) = inner.timer.take() {
                    self.scheduler.cancel(timer);
                }
                let this = self.clone();
                let key = self
                    .scheduler
                    .set_timeout(inner.delay_ms, move || this.fire());
                inner.timer = Some(key);
                let needs_max = inner.max_delay_ms.is_some() && inner.max_timer.is_none();
                (false, needs_max)
            }
        };
        if fire_now {
            self.fire();
        } else if schedule_max {
            let mut inner = self.inner.borrow_mut();
            if let Some(max_delay_ms) = inner.max_delay_ms {
                let this = self.clone();
                let key = self.scheduler.set_timeout(max_delay_ms, move || this.fire());
                inner.max_timer = Some(key);
            }
        }
    }

    /// Fire the pending request immediately, if any.
    pub fn flush(&self) {
        self.fire();
    }

    /// Drop the pending request and cancel the open windows.
    pub fn cancel(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.pending = None;
        if let Some(timer) = inner.timer.take() {
            self.scheduler.cancel(timer);
        }
        if let Some(timer) = inner.max_timer.take() {
            self.scheduler.cancel(timer);
        }
    }

    /// Whether a request is waiting for its window to close.
    pub fn has_pending(&self) -> bool {
        self.inner.borrow().pending.is_some()
    }

    fn fire(&self) {
        let (params, sink) = {
            let mut inner = self.inner.borrow_mut();
            if let Some(timer) = inner.timer.take() {
                self.scheduler.cancel(timer);
            }
            if let Some(timer) = inner.max_timer.take() {
                self.scheduler.cancel(timer);
            }
            match inner.pending.take() {
                Some(params) => (params, Rc::clone(&inner.sink)),
                None => return,
            }
        };
        // Borrow released: the sink may issue new requests.
        sink(params);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell as StdRefCell;

    #[test]
    fn timers_fire_in_due_order() {
        let scheduler = Scheduler::new();
        let order = Rc::new(StdRefCell::new(Vec::new()));
        for (delay, tag) in [(30_u64, 'c'), (10, 'a'), (20, 'b')] {
            let order = Rc::clone(&order);
            scheduler.set_timeout(delay, move || order.borrow_mut().push(tag));
        }
        scheduler.advance(40);
        assert_eq!(*order.borrow(), vec!['a', 'b', 'c']);
    }

    #[test]
    fn cancel_is_idempotent() {
        let scheduler = Scheduler::new();
        let key = scheduler.set_timeout(5, || panic!("cancelled timer fired"));
        scheduler.cancel(key);
        scheduler.cancel(key);
        scheduler.advance(10);
    }

    #[test]
    fn callback_scheduled_inside_window_fires_in_same_advance() {
        let scheduler = Scheduler::new();
        let hits = Rc::new(StdRefCell::new(0));
        let inner_hits = Rc::clone(&hits);
        let nested = scheduler.clone();
        scheduler.set_timeout(5, move || {
            let inner_hits = Rc::clone(&inner_hits);
            nested.set_timeout(5, move || *inner_hits.borrow_mut() += 1);
        });
        scheduler.advance(20);
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn debounce_coalesces_bursts_into_one_merged_call() {
        let scheduler = Scheduler::new();
        let seen = Rc::new(StdRefCell::new(Vec::new()));
        let sink_seen = Rc::clone(&seen);
        let debouncer = Debouncer::new(
            &scheduler,
            |a: u32, b: u32| a | b,
            move |p| sink_seen.borrow_mut().push(p),
        );
        debouncer.set_delay(10, Some(100));
        debouncer.request(0b01);
        scheduler.advance(5);
        debouncer.request(0b10);
        scheduler.advance(50);
        assert_eq!(*seen.borrow(), vec![0b11]);
    }

    #[test]
    fn max_wait_guarantees_progress_under_churn() {
        let scheduler = Scheduler::new();
        let fired = Rc::new(StdRefCell::new(0));
        let sink_fired = Rc::clone(&fired);
        let debouncer = Debouncer::new(
            &scheduler,
            |_: (), b: ()| b,
            move |()| *sink_fired.borrow_mut() += 1,
        );
        debouncer.set_delay(10, Some(40));
        // Keep re-requesting inside the short window; only the ceiling fires.
        for _ in 0..10 {
            debouncer.request(());
            scheduler.advance(5);
        }
        assert!(*fired.borrow() >= 1);
    }

    #[test]
    fn flush_fires_pending_immediately() {
        let scheduler = Scheduler::new();
        let fired = Rc::new(StdRefCell::new(0));
        let sink_fired = Rc::clone(&fired);
        let debouncer = Debouncer::new(
            &scheduler,
            |_: (), b: ()| b,
            move |()| *sink_fired.borrow_mut() += 1,
        );
        debouncer.set_delay(1000, None);
        debouncer.request(());
        debouncer.flush();
        assert_eq!(*fired.borrow(), 1);
        // Nothing left to fire later.
        scheduler.advance(2000);
        assert_eq!(*fired.borrow(), 1);
    }

    #[test]
    fn zero_delay_fires_synchronously() {
        let scheduler = Scheduler::new();
        let fired = Rc::new(StdRefCell::new(0));
        let sink_fired = Rc::clone(&fired);
        let debouncer = Debouncer::new(
            &scheduler,
            |_: (), b: ()| b,
            move |()| *sink_fired.borrow_mut() += 1,
        );
        debouncer.request(());
        assert_eq!(*fired.borrow(), 1);
    }
}
