use std::sync::Arc;

use serde_json::json;
use shared::protocol::{EMERGENCY, EMERGENCY_STATUS};
use tracing::info;

use crate::EventChannel;

pub const CONFIRM_MESSAGE: &str = "Engage emergency SOP?";

/// Blocking operator confirmation. Dismissal counts as a decline.
pub trait Confirmation: Send + Sync {
    fn confirm(&self, message: &str) -> bool;
}

impl<F> Confirmation for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn confirm(&self, message: &str) -> bool {
        self(message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmergencyOutcome {
    Sent,
    Cancelled,
}

/// Sends the operator's emergency stop.
///
/// Fire-and-forget: one `emergency` event per confirmed trigger, no
/// acknowledgement, no retry.
pub struct CommandEmitter {
    channel: Arc<dyn EventChannel>,
    confirmation: Box<dyn Confirmation>,
}

impl CommandEmitter {
    pub fn new(channel: Arc<dyn EventChannel>, confirmation: impl Confirmation + 'static) -> Self {
        Self {
            channel,
            confirmation: Box::new(confirmation),
        }
    }

    pub fn trigger_emergency(&self) -> EmergencyOutcome {
        if self.confirmation.confirm(CONFIRM_MESSAGE) {
            self.channel
                .emit(EMERGENCY, json!({ "status": EMERGENCY_STATUS }));
            info!("emergency SOP engaged");
            EmergencyOutcome::Sent
        } else {
            info!("emergency SOP cancelled");
            EmergencyOutcome::Cancelled
        }
    }
}
