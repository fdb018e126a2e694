#![forbid(unsafe_code)]

//! Errors surfaced by [`Event::try_invoke`](crate::Event::try_invoke).

use std::any::Any;

use crate::id::{EventId, HandlerId};

/// Failure of an invoke pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvokeError {
    /// A handler's callable panicked. Handlers after it were not called.
    HandlerPanicked {
        /// Event whose pass was aborted.
        event: EventId,
        /// Handler whose callable panicked.
        handler: HandlerId,
        /// Number of handlers that ran earlier in the same pass. Snapshot
        /// entries skipped because they were removed mid-pass do not count.
        position: usize,
        /// Panic payload rendered as text.
        message: String,
    },
}

impl InvokeError {
    pub(crate) fn panicked(
        event: EventId,
        handler: HandlerId,
        position: usize,
        payload: &(dyn Any + Send),
    ) -> Self {
        Self::HandlerPanicked {
            event,
            handler,
            position,
            message: panic_message(payload),
        }
    }

    /// The handler that failed.
    #[must_use]
    pub fn handler(&self) -> HandlerId {
        match self {
            Self::HandlerPanicked { handler, .. } => *handler,
        }
    }
}

impl core::fmt::Display for InvokeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::HandlerPanicked {
                event,
                handler,
                position,
                message,
            } => write!(
                f,
                "{handler} panicked at position {position} while invoking {event}: {message}"
            ),
        }
    }
}

impl std::error::Error for InvokeError {}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
