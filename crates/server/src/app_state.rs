use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, PoisonError,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::protocol::ServerEvent;
use tokio::sync::broadcast;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) events: broadcast::Sender<ServerEvent>,
    pub(crate) status: Arc<FeedStatus>,
}

impl AppState {
    pub(crate) fn new(events: broadcast::Sender<ServerEvent>) -> Self {
        Self {
            events,
            status: Arc::new(FeedStatus::default()),
        }
    }
}

#[derive(Debug, Default)]
pub struct FeedStatus {
    last_reading_id: AtomicU64,
    emergency_requests: AtomicU64,
    last_emergency_at: Mutex<Option<DateTime<Utc>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct StatusResponse {
    pub(crate) last_reading_id: Option<u64>,
    pub(crate) emergency_requests: u64,
    pub(crate) last_emergency_at: Option<DateTime<Utc>>,
}

impl FeedStatus {
    pub(crate) fn record_reading(&self, id: u64) {
        self.last_reading_id.store(id, Ordering::Relaxed);
    }

    pub(crate) fn record_emergency(&self, at: DateTime<Utc>) {
        self.emergency_requests.fetch_add(1, Ordering::Relaxed);
        *self
            .last_emergency_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(at);
    }

    pub(crate) fn snapshot(&self) -> StatusResponse {
        let last_reading_id = self.last_reading_id.load(Ordering::Relaxed);
        StatusResponse {
            last_reading_id: (last_reading_id > 0).then_some(last_reading_id),
            emergency_requests: self.emergency_requests.load(Ordering::Relaxed),
            last_emergency_at: *self
                .last_emergency_at
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        }
    }
}
