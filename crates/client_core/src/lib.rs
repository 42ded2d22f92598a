use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use serde_json::Value;
use shared::protocol::Envelope;
use tracing::debug;

pub mod emitter;
pub mod memory;
pub mod panel;
pub mod projector;
pub mod transport;

pub use emitter::{CommandEmitter, Confirmation, EmergencyOutcome, CONFIRM_MESSAGE};
pub use memory::MemoryChannel;
pub use panel::Panel;
pub use projector::{Bindings, Gauge, Lamp, StateProjector};
pub use transport::WsChannel;

pub type EventHandler = Box<dyn FnMut(Value) + Send>;

/// Bidirectional named-event channel to the plant controller.
///
/// Implementations deliver inbound events one at a time, in arrival order,
/// and run each handler to completion before dispatching the next event.
/// `emit` never blocks and never reports delivery.
pub trait EventChannel: Send + Sync {
    fn on_event(&self, tag: &str, handler: EventHandler);
    fn emit(&self, tag: &str, payload: Value);
}

/// Handler registry shared by the channel implementations.
///
/// The table stays locked while handlers run, so a handler must not register
/// further handlers on the same channel.
#[derive(Default)]
pub(crate) struct HandlerTable {
    handlers: Mutex<HashMap<String, Vec<EventHandler>>>,
}

impl HandlerTable {
    pub(crate) fn register(&self, tag: &str, handler: EventHandler) {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(tag.to_string())
            .or_default()
            .push(handler);
    }

    /// Returns false when nothing is listening for the event.
    pub(crate) fn dispatch(&self, envelope: Envelope) -> bool {
        let mut guard = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(handlers) = guard.get_mut(&envelope.event) else {
            debug!(event = %envelope.event, "no handler registered; dropping event");
            return false;
        };
        let Some((last, rest)) = handlers.split_last_mut() else {
            return false;
        };
        for handler in rest {
            handler(envelope.data.clone());
        }
        last(envelope.data);
        true
    }
}
