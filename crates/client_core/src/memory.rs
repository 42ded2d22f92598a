use std::sync::{Mutex, PoisonError};

use serde_json::Value;
use shared::protocol::Envelope;

use crate::{EventChannel, EventHandler, HandlerTable};

/// In-process channel: inbound events are delivered by the caller and
/// outbound events are recorded.
#[derive(Default)]
pub struct MemoryChannel {
    handlers: HandlerTable,
    emitted: Mutex<Vec<Envelope>>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an inbound event synchronously. Returns false when no handler
    /// is registered for `tag`.
    pub fn deliver(&self, tag: &str, payload: Value) -> bool {
        self.handlers.dispatch(Envelope::new(tag, payload))
    }

    pub fn emitted(&self) -> Vec<Envelope> {
        self.emitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn take_emitted(&self) -> Vec<Envelope> {
        std::mem::take(&mut *self.emitted.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl EventChannel for MemoryChannel {
    fn on_event(&self, tag: &str, handler: EventHandler) {
        self.handlers.register(tag, handler);
    }

    fn emit(&self, tag: &str, payload: Value) {
        self.emitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Envelope::new(tag, payload));
    }
}
