#![forbid(unsafe_code)]

//! Process-unique identities for events and handlers.
//!
//! Every [`Event`](crate::Event) and [`Handler`](crate::Handler) node draws an
//! id from a monotonically increasing counter when it is created. Ids are
//! never reused, so an edge stored on one side of a subscription can always
//! be matched against the node on the other side without comparing pointers.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_LINK_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of an [`Event`](crate::Event) node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(u64);

impl EventId {
    pub(crate) fn next() -> Self {
        Self(NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event#{}", self.0)
    }
}

/// Identity of a [`Handler`](crate::Handler) node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandlerId(u64);

impl HandlerId {
    pub(crate) fn next() -> Self {
        Self(NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler#{}", self.0)
    }
}

/// Identity of one subscription. Both sides of an edge carry the same value,
/// so duplicate subscriptions of one handler stay distinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LinkId(u64);

impl LinkId {
    pub(crate) fn next() -> Self {
        Self(NEXT_LINK_ID.fetch_add(1, Ordering::Relaxed))
    }
}
