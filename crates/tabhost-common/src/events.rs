use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::ViewId;

/// A completed navigation, reported to the activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub window_id: ViewId,
    pub url: String,
    pub title: String,
}

/// Host-level notifications published by the view core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum HostEvent {
    ViewCreated(ViewId),
    ViewDestroyed(ViewId),
    /// A navigation was intercepted and should be opened at host level.
    #[serde(rename_all = "camelCase")]
    ExternalOpen {
        source_window_id: ViewId,
        target_url: String,
    },
    VisitCompleted(Visit),
    Shutdown,
    #[serde(other)]
    Unknown,
}

pub struct EventBus {
    sender: broadcast::Sender<HostEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: HostEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
