//! Delivery of inbound frames and lifecycle events to registered handlers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::codec::Frame;
use crate::error::TransportError;

/// Connection lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Open,
    /// Socket released. `code` is the WebSocket close code when the peer sent one.
    Close { code: Option<u16>, reason: String },
    /// Always followed by [`LifecycleEvent::Close`]
    Error(TransportError),
}

pub type FrameHandler = Arc<dyn Fn(&Frame) + Send + Sync>;
pub type LifecycleHandler = Arc<dyn Fn(&LifecycleEvent) + Send + Sync>;

/// Registration handle returned by [`Dispatcher::on_frame`] and
/// [`Dispatcher::on_lifecycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Routes decoded frames and lifecycle events to handlers.
///
/// Handlers run synchronously, in registration order, on the task that
/// received the event. A slow handler delays the next socket event.
#[derive(Default)]
pub struct Dispatcher {
    next_id: AtomicU64,
    frame_handlers: RwLock<Vec<(HandlerId, FrameHandler)>>,
    lifecycle_handlers: RwLock<Vec<(HandlerId, LifecycleHandler)>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_frame<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&Frame) + Send + Sync + 'static,
    {
        let id = self.next_handler_id();
        self.frame_handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(handler)));
        id
    }

    pub fn on_lifecycle<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        let id = self.next_handler_id();
        self.lifecycle_handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(handler)));
        id
    }

    /// Unregister a handler. Returns `false` if it was not registered.
    pub fn remove(&self, id: HandlerId) -> bool {
        let removed_frame = remove_from(&self.frame_handlers, id);
        removed_frame || remove_from(&self.lifecycle_handlers, id)
    }

    pub fn dispatch_frame(&self, frame: &Frame) {
        for handler in snapshot(&self.frame_handlers) {
            handler(frame);
        }
    }

    pub fn dispatch_lifecycle(&self, event: &LifecycleEvent) {
        for handler in snapshot(&self.lifecycle_handlers) {
            handler(event);
        }
    }

    fn next_handler_id(&self) -> HandlerId {
        HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

// Handlers are called on a copy of the list so they may (un)register others.
fn snapshot<H: Clone>(handlers: &RwLock<Vec<(HandlerId, H)>>) -> Vec<H> {
    handlers
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .map(|(_, handler)| handler.clone())
        .collect()
}

fn remove_from<H>(handlers: &RwLock<Vec<(HandlerId, H)>>, id: HandlerId) -> bool {
    let mut handlers = handlers.write().unwrap_or_else(PoisonError::into_inner);
    let before = handlers.len();
    handlers.retain(|(handler_id, _)| *handler_id != id);
    handlers.len() != before
}
