#![forbid(unsafe_code)]

//! Event: an ordered list of subscribed handlers that are called together.
//!
//! # Design
//!
//! An [`Event<A>`] owns one strong `Rc` to its node and stores `Weak` edges
//! to its handlers. Dropping the event runs [`Event::reset`], which removes
//! the event from every handler's subscription list first.
//!
//! # Invoke passes
//!
//! [`Event::invoke`] copies the subscriber list before calling anything and
//! holds no borrow while a callable runs. A callable may therefore subscribe,
//! unsubscribe, reset, swap or drop any event or handler, including itself:
//!
//! - handlers subscribed during the pass are first called by the next pass;
//! - a snapshot entry whose handler was dropped, reset or unsubscribed
//!   before its turn is skipped;
//! - each snapshot entry runs at most once.
//!
//! # Failure Modes
//!
//! - **Panicking handler**: `invoke` unwinds immediately and later handlers
//!   are not called. The graph stays consistent. [`Event::try_invoke`]
//!   catches the panic and reports it as an [`InvokeError`].

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use crate::error::InvokeError;
use crate::graph::{self, EventNode};
use crate::handler::Handler;
use crate::id::{EventId, HandlerId};

#[cfg(feature = "tracing")]
use tracing::{debug_span, trace, warn};

/// Ordered fan-out of `&A` to subscribed [`Handler`]s.
///
/// Events are not `Clone`. Subscribing the same handler twice is allowed and
/// each subscription is called and removed independently.
pub struct Event<A> {
    node: Rc<EventNode<A>>,
}

impl<A> Event<A> {
    /// Create an event with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            node: EventNode::new(),
        }
    }

    /// Identity of this event's node. Stable across moves and swaps.
    #[inline]
    #[must_use]
    pub fn id(&self) -> EventId {
        self.node.id
    }

    /// Call every subscribed handler with `args`, in subscription order.
    ///
    /// # Panics
    ///
    /// Propagates a panic from a handler's callable. Handlers after it are
    /// not called.
    pub fn invoke(&self, args: &A) {
        let snapshot = self.node.snapshot();
        #[cfg(feature = "tracing")]
        let _span = debug_span!("event.invoke", event = %self.id(), handlers = snapshot.len())
            .entered();

        for edge in &snapshot {
            if let Some(callback) = self.node.live_callback(edge) {
                callback(args);
            }
        }
    }

    /// Like [`Event::invoke`], but a panicking callable is caught and
    /// returned as an error instead of unwinding.
    ///
    /// The pass stops at the failing handler either way. The error's
    /// `position` counts only the handlers that actually ran before it.
    pub fn try_invoke(&self, args: &A) -> Result<(), InvokeError> {
        let snapshot = self.node.snapshot();
        #[cfg(feature = "tracing")]
        let _span = debug_span!("event.try_invoke", event = %self.id(), handlers = snapshot.len())
            .entered();

        let mut called = 0;
        for edge in &snapshot {
            let Some(callback) = self.node.live_callback(edge) else {
                continue;
            };
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback(args))) {
                let err = InvokeError::panicked(self.id(), edge.id, called, payload.as_ref());
                #[cfg(feature = "tracing")]
                warn!(error = %err, "handler panicked during invoke");
                return Err(err);
            }
            called += 1;
        }
        Ok(())
    }

    /// Subscribe `handler` to this event.
    ///
    /// Both sides are updated. Subscribing an already-subscribed handler adds
    /// another, independent subscription.
    pub fn subscribe(&self, handler: &Handler<A>) {
        graph::link(&self.node, &handler.node);
        #[cfg(feature = "tracing")]
        trace!(event = %self.id(), handler = %handler.id(), "subscribe");
    }

    /// Wrap `callback` in a new [`Handler`], subscribe it, and hand it back.
    ///
    /// The event does not own the handler: dropping the returned value
    /// unsubscribes it.
    #[must_use = "dropping the returned handler unsubscribes it immediately"]
    pub fn subscribe_fn(&self, callback: impl Fn(&A) + 'static) -> Handler<A> {
        let handler = Handler::new(callback);
        self.subscribe(&handler);
        handler
    }

    /// Remove the first subscription of `handler`.
    ///
    /// Returns `false`, and changes nothing, if it was not subscribed.
    pub fn unsubscribe(&self, handler: &Handler<A>) -> bool {
        let removed = graph::unlink(&self.node, &handler.node);
        #[cfg(feature = "tracing")]
        trace!(event = %self.id(), handler = %handler.id(), removed, "unsubscribe");
        removed
    }

    /// Unsubscribe every handler. Idempotent.
    ///
    /// The handlers stay usable and can be subscribed elsewhere.
    pub fn reset(&self) {
        let _removed = self.node.detach_all();
        #[cfg(feature = "tracing")]
        if _removed > 0 {
            trace!(event = %self.id(), edges = _removed, "event reset");
        }
    }

    /// Exchange subscriber lists with `other`. Ids travel with the lists.
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(&mut self.node, &mut other.node);
    }

    /// Number of subscriptions, counting duplicates.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.node.handler_count()
    }

    /// Whether nothing is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handler_count() == 0
    }

    /// Whether `handler` is subscribed at least once.
    #[must_use]
    pub fn contains(&self, handler: &Handler<A>) -> bool {
        self.node.count_for(handler.id()) > 0
    }

    /// Subscribed handlers, in call order.
    #[must_use]
    pub fn handler_ids(&self) -> Vec<HandlerId> {
        self.node.handler_ids()
    }
}

impl<A> Default for Event<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for Event<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.node.id)
            .field("handlers", &self.node.handler_ids())
            .finish_non_exhaustive()
    }
}

impl<A> Drop for Event<A> {
    fn drop(&mut self) {
        let _removed = self.node.detach_all();
        #[cfg(feature = "tracing")]
        if _removed > 0 {
            trace!(event = %self.node.id, edges = _removed, "event dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    fn recorder(log: &Rc<RefCell<Vec<char>>>, tag: char) -> Handler<i32> {
        let log = Rc::clone(log);
        Handler::new(move |_: &i32| log.borrow_mut().push(tag))
    }

    #[test]
    fn invoke_with_no_handlers_is_noop() {
        let e = Event::<i32>::new();
        e.invoke(&1);
        assert!(e.is_empty());
    }

    #[test]
    fn invoke_calls_in_subscription_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let e = Event::new();
        let a = recorder(&log, 'A');
        let b = recorder(&log, 'B');
        let c = recorder(&log, 'C');

        e.subscribe(&b);
        e.subscribe(&a);
        e.subscribe(&c);
        e.invoke(&0);

        assert_eq!(*log.borrow(), vec!['B', 'A', 'C']);
    }

    #[test]
    fn subscribe_fn_returns_owning_handler() {
        let e = Event::new();
        let hits = Rc::new(Cell::new(0));
        let hits_clone = Rc::clone(&hits);

        let h = e.subscribe_fn(move |v: &i32| hits_clone.set(hits_clone.get() + v));
        assert!(e.contains(&h));

        e.invoke(&2);
        assert_eq!(hits.get(), 2);

        drop(h);
        assert!(e.is_empty());
        e.invoke(&2);
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn unsubscribe_removes_first_occurrence_only() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let e = Event::new();
        let a = recorder(&log, 'A');
        let b = recorder(&log, 'B');

        e.subscribe(&a);
        e.subscribe(&b);
        e.subscribe(&a);

        assert!(e.unsubscribe(&a));
        assert_eq!(e.handler_ids(), vec![b.id(), a.id()]);
        assert_eq!(a.subscription_count_for(&e), 1);

        e.invoke(&0);
        assert_eq!(*log.borrow(), vec!['B', 'A']);
    }

    #[test]
    fn unsubscribe_missing_is_silent() {
        let e = Event::<i32>::new();
        let h = Handler::new(|_: &i32| {});
        assert!(!e.unsubscribe(&h));
        e.subscribe(&h);
        assert!(e.unsubscribe(&h));
        assert!(!e.unsubscribe(&h));
    }

    #[test]
    fn reset_detaches_handlers_which_stay_usable() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let e = Event::new();
        let other = Event::new();
        let a = recorder(&log, 'A');

        e.subscribe(&a);
        e.reset();
        assert!(e.is_empty());
        assert!(!a.is_subscribed());

        e.invoke(&0);
        assert!(log.borrow().is_empty());

        other.subscribe(&a);
        other.invoke(&0);
        assert_eq!(*log.borrow(), vec!['A']);
    }

    #[test]
    fn dropping_event_clears_handler_side() {
        let h = Handler::new(|_: &i32| {});
        {
            let e = Event::new();
            e.subscribe(&h);
            e.subscribe(&h);
            assert_eq!(h.subscription_count(), 2);
        }
        assert!(!h.is_subscribed());
    }

    #[test]
    fn swap_exchanges_handler_lists() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut e1 = Event::new();
        let mut e2 = Event::new();
        let a = recorder(&log, 'A');
        let b = recorder(&log, 'B');
        let e1_id = e1.id();

        e1.subscribe(&a);
        e2.subscribe(&b);
        e1.swap(&mut e2);

        assert_eq!(e2.id(), e1_id);
        assert!(e1.contains(&b));
        assert!(e2.contains(&a));
        assert_eq!(a.subscriptions(), vec![e2.id()]);

        e1.invoke(&0);
        assert_eq!(*log.borrow(), vec!['B']);
    }

    #[test]
    fn handler_subscribed_during_pass_waits_for_next_pass() {
        let e = Rc::new(Event::new());
        let late_hits = Rc::new(Cell::new(0));
        let late_hits_clone = Rc::clone(&late_hits);
        let late = Rc::new(Handler::new(move |_: &i32| {
            late_hits_clone.set(late_hits_clone.get() + 1)
        }));

        let e_clone = Rc::clone(&e);
        let late_clone = Rc::clone(&late);
        let _adder = e.subscribe_fn(move |_: &i32| e_clone.subscribe(&late_clone));

        e.invoke(&0);
        assert_eq!(late_hits.get(), 0);

        e.invoke(&0);
        assert_eq!(late_hits.get(), 1);
    }

    #[test]
    fn handler_dropped_earlier_in_pass_is_skipped() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let e = Event::new();
        let victim: Rc<RefCell<Option<Handler<i32>>>> =
            Rc::new(RefCell::new(Some(recorder(&log, 'V'))));

        let victim_clone = Rc::clone(&victim);
        let killer = Handler::new(move |_: &i32| {
            victim_clone.borrow_mut().take();
        });

        e.subscribe(&killer);
        if let Some(v) = victim.borrow().as_ref() {
            e.subscribe(v);
        }
        assert_eq!(e.handler_count(), 2);

        e.invoke(&0);
        assert!(log.borrow().is_empty());
        assert_eq!(e.handler_ids(), vec![killer.id()]);
    }

    #[test]
    fn handler_may_drop_itself_mid_call() {
        let e = Event::new();
        let slot: Rc<RefCell<Option<Handler<i32>>>> = Rc::new(RefCell::new(None));
        let hits = Rc::new(Cell::new(0));

        let slot_clone = Rc::clone(&slot);
        let hits_clone = Rc::clone(&hits);
        let h = e.subscribe_fn(move |_: &i32| {
            slot_clone.borrow_mut().take();
            // Captured state is still alive for the rest of this call.
            hits_clone.set(hits_clone.get() + 1);
        });
        *slot.borrow_mut() = Some(h);

        e.invoke(&0);
        assert_eq!(hits.get(), 1);
        assert!(e.is_empty());

        e.invoke(&0);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn try_invoke_stops_at_panicking_handler() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let e = Event::new();
        let a = recorder(&log, 'A');
        let bad = Handler::new(|v: &i32| {
            if *v > 0 {
                panic!("refusing {v}");
            }
        });
        let c = recorder(&log, 'C');

        e.subscribe(&a);
        e.subscribe(&bad);
        e.subscribe(&c);

        let err = e.try_invoke(&1).expect_err("bad handler panics");
        assert_eq!(err.handler(), bad.id());
        assert_eq!(
            err,
            InvokeError::HandlerPanicked {
                event: e.id(),
                handler: bad.id(),
                position: 1,
                message: "refusing 1".into(),
            }
        );
        assert_eq!(*log.borrow(), vec!['A']);

        // Graph untouched by the failure.
        assert_eq!(e.handler_ids(), vec![a.id(), bad.id(), c.id()]);

        assert!(e.try_invoke(&0).is_ok());
        assert_eq!(*log.borrow(), vec!['A', 'A', 'C']);
    }

    #[test]
    fn debug_lists_handlers() {
        let e = Event::<i32>::new();
        let h = Handler::new(|_: &i32| {});
        e.subscribe(&h);
        let dbg = format!("{e:?}");
        assert!(dbg.contains("Event"));
        assert!(dbg.contains(&format!("{:?}", h.id())));
        assert!(dbg.ends_with(", .. }"));
    }

    #[test]
    fn unsubscribing_one_duplicate_mid_pass_skips_only_that_entry() {
        let e = Rc::new(Event::new());
        let hits = Rc::new(Cell::new(0));
        let hits_clone = Rc::clone(&hits);
        let target = Rc::new(Handler::new(move |_: &i32| hits_clone.set(hits_clone.get() + 1)));

        let e_weak = Rc::downgrade(&e);
        let target_clone = Rc::clone(&target);
        let remover = Handler::new(move |_: &i32| {
            if let Some(e) = e_weak.upgrade() {
                e.unsubscribe(&target_clone);
            }
        });

        e.subscribe(&remover);
        e.subscribe(&target);
        e.subscribe(&target);

        e.invoke(&0);
        assert_eq!(hits.get(), 1);
        assert_eq!(target.subscription_count_for(&e), 1);
        assert_eq!(e.handler_ids(), vec![remover.id(), target.id()]);
    }

    #[test]
    fn handler_resets_its_running_event() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let e = Rc::new(Event::new());
        let first = recorder(&log, 'A');

        let e_weak = Rc::downgrade(&e);
        let log_clone = Rc::clone(&log);
        let resetter = Handler::new(move |_: &i32| {
            log_clone.borrow_mut().push('R');
            if let Some(e) = e_weak.upgrade() {
                e.reset();
            }
        });
        let last = recorder(&log, 'C');

        e.subscribe(&first);
        e.subscribe(&resetter);
        e.subscribe(&last);

        e.invoke(&0);
        assert_eq!(*log.borrow(), vec!['A', 'R']);
        assert!(e.is_empty());
        assert!(!first.is_subscribed());
        assert!(!resetter.is_subscribed());
        assert!(!last.is_subscribed());
    }

    #[test]
    fn try_invoke_position_counts_only_handlers_that_ran() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let e = Rc::new(Event::new());
        let skipped = recorder(&log, 'S');

        let e_weak = Rc::downgrade(&e);
        let skipped_id = skipped.id();
        let skipped = Rc::new(skipped);
        let skipped_clone = Rc::clone(&skipped);
        let remover = Handler::new(move |_: &i32| {
            if let Some(e) = e_weak.upgrade() {
                e.unsubscribe(&skipped_clone);
            }
        });
        let bad = Handler::new(|_: &i32| panic!("late failure"));

        e.subscribe(&remover);
        e.subscribe(&skipped);
        e.subscribe(&bad);

        let err = e.try_invoke(&0).expect_err("bad handler panics");
        assert_eq!(
            err,
            InvokeError::HandlerPanicked {
                event: e.id(),
                handler: bad.id(),
                position: 1,
                message: "late failure".into(),
            }
        );
        assert!(log.borrow().is_empty());
        assert!(!e.handler_ids().contains(&skipped_id));
    }
}
