#![forbid(unsafe_code)]

//! Subscription graph: the nodes behind events and handlers, and the edges
//! between them.
//!
//! # Design
//!
//! Each [`Event`](crate::Event) and [`Handler`](crate::Handler) value owns a
//! single strong `Rc` to its node. Partners only ever hold `Weak` references,
//! so the graph owns edges and never the entities themselves. Because the
//! node lives on the heap, moving or swapping the owning value does not
//! change what partners point at: there is nothing to relink.
//!
//! An edge is recorded twice, once on each side. Every mutation below updates
//! both sides before returning, so the following holds outside of these
//! functions:
//!
//! > handler `h` appears `n` times in event `e`'s list **iff** event `e`
//! > appears `n` times in handler `h`'s list.
//!
//! Each subscription carries a [`LinkId`] shared by its two records. Removal
//! on the partner side matches on that token, and an invoke pass uses it to
//! tell whether one particular subscription is still present.
//!
//! # Failure Modes
//!
//! None of these operations can fail. Internal `RefCell` borrows are released
//! before any user callable runs, so re-entrant mutation from inside a
//! callable never observes a held borrow.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::id::{EventId, HandlerId, LinkId};

/// Type-erased handler callable.
pub(crate) type Callback<A> = Rc<dyn Fn(&A)>;

/// Edge stored on a handler, pointing at an event.
pub(crate) struct EventEdge<A> {
    pub(crate) id: EventId,
    pub(crate) link: LinkId,
    pub(crate) node: Weak<EventNode<A>>,
}

// Manual Clone: `Weak` is clonable for any `A`.
impl<A> Clone for EventEdge<A> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            link: self.link,
            node: Weak::clone(&self.node),
        }
    }
}

/// Edge stored on an event, pointing at a handler.
pub(crate) struct HandlerEdge<A> {
    pub(crate) id: HandlerId,
    pub(crate) link: LinkId,
    pub(crate) node: Weak<HandlerNode<A>>,
}

impl<A> Clone for HandlerEdge<A> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            link: self.link,
            node: Weak::clone(&self.node),
        }
    }
}

/// Shared interior of a [`Handler`](crate::Handler).
pub(crate) struct HandlerNode<A> {
    pub(crate) id: HandlerId,
    callback: Callback<A>,
    /// Events this handler is subscribed to, in subscription order.
    events: RefCell<Vec<EventEdge<A>>>,
}

/// Shared interior of an [`Event`](crate::Event).
pub(crate) struct EventNode<A> {
    pub(crate) id: EventId,
    /// Subscribed handlers, in subscription order. Duplicates allowed.
    handlers: RefCell<Vec<HandlerEdge<A>>>,
}

/// Remove the first edge matching `pred`. Returns whether one was removed.
fn remove_first<T>(edges: &mut Vec<T>, pred: impl Fn(&T) -> bool) -> bool {
    match edges.iter().position(pred) {
        Some(idx) => {
            edges.remove(idx);
            true
        }
        None => false,
    }
}

impl<A> HandlerNode<A> {
    pub(crate) fn new(callback: Callback<A>) -> Rc<Self> {
        Rc::new(Self {
            id: HandlerId::next(),
            callback,
            events: RefCell::new(Vec::new()),
        })
    }

    /// Clone the callable out of the node so it can run without a borrow.
    pub(crate) fn callback(&self) -> Callback<A> {
        Rc::clone(&self.callback)
    }

    pub(crate) fn subscription_count(&self) -> usize {
        self.events.borrow().len()
    }

    pub(crate) fn count_for(&self, event: EventId) -> usize {
        self.events.borrow().iter().filter(|e| e.id == event).count()
    }

    pub(crate) fn event_ids(&self) -> Vec<EventId> {
        self.events.borrow().iter().map(|e| e.id).collect()
    }

    /// Drop every edge touching this handler, on both sides.
    pub(crate) fn detach_all(&self) -> usize {
        let edges = std::mem::take(&mut *self.events.borrow_mut());
        for edge in &edges {
            if let Some(event) = edge.node.upgrade() {
                remove_first(&mut *event.handlers.borrow_mut(), |h| h.link == edge.link);
            }
        }
        edges.len()
    }
}

impl<A> EventNode<A> {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self {
            id: EventId::next(),
            handlers: RefCell::new(Vec::new()),
        })
    }

    pub(crate) fn handler_count(&self) -> usize {
        self.handlers.borrow().len()
    }

    pub(crate) fn count_for(&self, handler: HandlerId) -> usize {
        self.handlers
            .borrow()
            .iter()
            .filter(|h| h.id == handler)
            .count()
    }

    pub(crate) fn handler_ids(&self) -> Vec<HandlerId> {
        self.handlers.borrow().iter().map(|h| h.id).collect()
    }

    /// Copy of the subscriber list, taken before an invoke pass.
    pub(crate) fn snapshot(&self) -> Vec<HandlerEdge<A>> {
        self.handlers.borrow().clone()
    }

    /// Resolve a snapshot entry to a callable, or `None` if that exact
    /// subscription has been removed or its handler dropped.
    pub(crate) fn live_callback(&self, edge: &HandlerEdge<A>) -> Option<Callback<A>> {
        let present = self.handlers.borrow().iter().any(|h| h.link == edge.link);
        if !present {
            return None;
        }
        let handler = edge.node.upgrade()?;
        Some(handler.callback())
    }

    /// Drop every edge touching this event, on both sides.
    pub(crate) fn detach_all(&self) -> usize {
        let edges = std::mem::take(&mut *self.handlers.borrow_mut());
        for edge in &edges {
            if let Some(handler) = edge.node.upgrade() {
                remove_first(&mut *handler.events.borrow_mut(), |e| e.link == edge.link);
            }
        }
        edges.len()
    }
}

/// Add one edge between `event` and `handler`.
pub(crate) fn link<A>(event: &Rc<EventNode<A>>, handler: &Rc<HandlerNode<A>>) {
    let link = LinkId::next();
    event.handlers.borrow_mut().push(HandlerEdge {
        id: handler.id,
        link,
        node: Rc::downgrade(handler),
    });
    handler.events.borrow_mut().push(EventEdge {
        id: event.id,
        link,
        node: Rc::downgrade(event),
    });
}

/// Remove the first edge between `event` and `handler`, if any.
pub(crate) fn unlink<A>(event: &EventNode<A>, handler: &HandlerNode<A>) -> bool {
    let removed = {
        let mut handlers = event.handlers.borrow_mut();
        match handlers.iter().position(|h| h.id == handler.id) {
            Some(idx) => Some(handlers.remove(idx).link),
            None => None,
        }
    };
    match removed {
        Some(link) => {
            remove_first(&mut *handler.events.borrow_mut(), |e| e.link == link);
            true
        }
        None => false,
    }
}
