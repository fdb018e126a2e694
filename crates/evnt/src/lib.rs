#![forbid(unsafe_code)]

//! Single-threaded events and handlers with drop-safe, two-sided subscriptions.
//!
//! # Overview
//!
//! - [`Event<A>`]: an ordered list of subscribed handlers. [`Event::invoke`]
//!   calls each one with the same `&A`.
//! - [`Handler<A>`]: a callable that remembers which events it is subscribed
//!   to.
//!
//! Neither side owns the other. Each side records the edge, and dropping,
//! resetting, moving or swapping either side keeps both records in step.
//! There is no way to reach a handler or event that no longer exists through
//! this API.
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use evnt::{Event, Handler};
//!
//! let clicked = Event::<u32>::new();
//! let total = Rc::new(Cell::new(0));
//!
//! let total_clone = Rc::clone(&total);
//! let handler = Handler::new(move |n: &u32| total_clone.set(total_clone.get() + n));
//! clicked.subscribe(&handler);
//!
//! clicked.invoke(&3);
//! assert_eq!(total.get(), 3);
//!
//! drop(handler);
//! clicked.invoke(&3);
//! assert_eq!(total.get(), 3);
//! ```
//!
//! # Architecture
//!
//! Each value owns one `Rc` node; partners hold `Weak` edges tagged with the
//! node's [`EventId`] / [`HandlerId`]. Because partners point at the node and
//! not at the value, Rust's bitwise moves need no relinking.
//!
//! Both types are `!Send` and `!Sync`. Sharing a subscription graph across
//! threads needs external synchronization and a different design.
//!
//! # Invariants
//!
//! 1. A handler appears `n` times in an event's list iff that event appears
//!    `n` times in the handler's list.
//! 2. Handlers are called in subscription order.
//! 3. Dropping or resetting either side removes the edge on both sides
//!    before returning.
//! 4. Unsubscribing something that is not subscribed is a silent no-op.
//!
//! # Feature flags
//!
//! - `tracing`: emit `tracing` events for subscription changes and a span
//!   per invoke pass.

pub mod error;
pub mod event;
mod graph;
pub mod handler;
pub mod id;

pub use error::InvokeError;
pub use event::Event;
pub use handler::Handler;
pub use id::{EventId, HandlerId};
