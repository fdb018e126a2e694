#![forbid(unsafe_code)]

//! Handler: a callable plus the set of events it is subscribed to.
//!
//! # Design
//!
//! A [`Handler<A>`] owns one strong `Rc` to its node; every event it is
//! subscribed to holds only a `Weak` edge back. Dropping the handler runs
//! [`Handler::reset`], which removes those edges from each event before the
//! node goes away, so no event ever lists a handler that no longer exists.
//!
//! Moving a handler (by value, [`std::mem::swap`], [`std::mem::take`], or
//! [`Handler::swap`]) moves the `Rc`, and the subscriptions follow it.
//!
//! # Invariants
//!
//! 1. `handler.is_subscribed_to(&e)` iff `e.contains(&handler)`, with equal
//!    multiplicity.
//! 2. After `reset()` or `drop`, no event references this handler.
//! 3. `invoke` never touches subscription state.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::event::Event;
use crate::graph::{Callback, HandlerNode};
use crate::id::{EventId, HandlerId};

#[cfg(feature = "tracing")]
use tracing::trace;

/// A subscribable callable taking `&A`.
///
/// Handlers are not `Clone`: two values must never share one identity.
/// Use a tuple for multiple arguments, e.g. `Handler<(u32, String)>`.
pub struct Handler<A> {
    pub(crate) node: Rc<HandlerNode<A>>,
}

impl<A> Handler<A> {
    /// Wrap a callable. The handler starts with no subscriptions.
    #[must_use]
    pub fn new(callback: impl Fn(&A) + 'static) -> Self {
        let callback: Callback<A> = Rc::new(callback);
        Self {
            node: HandlerNode::new(callback),
        }
    }

    /// Bind a `&self` method of a shared object.
    ///
    /// The object is held weakly, so a type may own handlers bound to itself
    /// without forming a reference cycle. Once the object has been dropped
    /// the handler does nothing. The method's return value is discarded.
    #[must_use]
    pub fn bind<T, R>(object: &Rc<T>, method: fn(&T, &A) -> R) -> Self
    where
        T: 'static,
        A: 'static,
        R: 'static,
    {
        Self::bind_weak(Rc::downgrade(object), method)
    }

    /// [`Handler::bind`] from a `Weak`, e.g. the one passed to
    /// [`Rc::new_cyclic`] while a type builds its own handlers.
    #[must_use]
    pub fn bind_weak<T, R>(object: Weak<T>, method: fn(&T, &A) -> R) -> Self
    where
        T: 'static,
        A: 'static,
        R: 'static,
    {
        Self::new(move |args: &A| {
            if let Some(object) = object.upgrade() {
                let _ = method(&object, args);
            }
        })
    }

    /// Bind a `&mut self` method of an object behind `Rc<RefCell<_>>`.
    ///
    /// Same lifetime rules as [`Handler::bind`].
    ///
    /// # Panics
    ///
    /// Panics if the object is already borrowed when the handler runs, e.g.
    /// when the bound method itself invokes an event this handler listens to.
    #[must_use]
    pub fn bind_mut<T, R>(object: &Rc<RefCell<T>>, method: fn(&mut T, &A) -> R) -> Self
    where
        T: 'static,
        A: 'static,
        R: 'static,
    {
        let object = Rc::downgrade(object);
        Self::new(move |args: &A| {
            if let Some(object) = object.upgrade() {
                let _ = method(&mut object.borrow_mut(), args);
            }
        })
    }

    /// Identity of this handler's node. Stable across moves and swaps.
    #[inline]
    #[must_use]
    pub fn id(&self) -> HandlerId {
        self.node.id
    }

    /// Call the wrapped callable directly.
    ///
    /// Works whether or not the handler is subscribed to anything.
    pub fn invoke(&self, args: &A) {
        let callback = self.node.callback();
        callback(args);
    }

    /// Unsubscribe from every event. Idempotent.
    pub fn reset(&self) {
        let _removed = self.node.detach_all();
        #[cfg(feature = "tracing")]
        if _removed > 0 {
            trace!(handler = %self.id(), edges = _removed, "handler reset");
        }
    }

    /// Exchange callables and subscriptions with `other`.
    ///
    /// Each event that listed `self` now lists `other` and vice versa. Ids
    /// travel with the subscriptions.
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(&mut self.node, &mut other.node);
    }

    /// Total number of subscriptions, counting duplicates.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.node.subscription_count()
    }

    /// Whether the handler is subscribed to at least one event.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscription_count() > 0
    }

    /// Whether the handler is subscribed to `event` at least once.
    #[must_use]
    pub fn is_subscribed_to(&self, event: &Event<A>) -> bool {
        self.subscription_count_for(event) > 0
    }

    /// How many times the handler is subscribed to `event`.
    #[must_use]
    pub fn subscription_count_for(&self, event: &Event<A>) -> usize {
        self.node.count_for(event.id())
    }

    /// Events this handler is subscribed to, in subscription order.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<EventId> {
        self.node.event_ids()
    }
}

impl<A: 'static> Default for Handler<A> {
    /// A handler that does nothing and is subscribed to nothing.
    fn default() -> Self {
        Self::new(|_: &A| {})
    }
}

impl<A> fmt::Debug for Handler<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("id", &self.node.id)
            .field("subscriptions", &self.node.event_ids())
            .finish_non_exhaustive()
    }
}

impl<A> Drop for Handler<A> {
    fn drop(&mut self) {
        let _removed = self.node.detach_all();
        #[cfg(feature = "tracing")]
        if _removed > 0 {
            trace!(handler = %self.node.id, edges = _removed, "handler dropped");
        }
    }
}
