//! Activity log hand-off.
//!
//! Completed navigations are published on the host event bus as
//! `VisitCompleted`. A forwarder task hands them to an [`ActivityLog`]
//! collaborator off the control thread; navigation never waits on it and
//! its failures are only logged.

use std::sync::Arc;

use async_trait::async_trait;
use tabhost_common::{HostEvent, Visit};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ActivityError {
    #[error("activity store unavailable: {0}")]
    Unavailable(String),

    #[error("activity rejected: {0}")]
    Rejected(String),
}

/// Receives every completed visit.
#[async_trait]
pub trait ActivityLog: Send + Sync {
    async fn record_visit(&self, visit: &Visit) -> Result<(), ActivityError>;
}

/// Writes visits to the trace log.
#[derive(Debug, Default)]
pub struct TracingActivityLog;

#[async_trait]
impl ActivityLog for TracingActivityLog {
    async fn record_visit(&self, visit: &Visit) -> Result<(), ActivityError> {
        info!(
            window_id = %visit.window_id,
            url = %visit.url,
            title = %visit.title,
            "visit"
        );
        Ok(())
    }
}

/// Forward `VisitCompleted` events from `events` to `log` until the bus
/// closes or a `Shutdown` event arrives.
pub fn spawn_activity_forwarder(
    mut events: broadcast::Receiver<HostEvent>,
    log: Arc<dyn ActivityLog>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(HostEvent::VisitCompleted(visit)) => {
                    if let Err(e) = log.record_visit(&visit).await {
                        warn!(window_id = %visit.window_id, url = %visit.url, error = %e, "activity log failed");
                    }
                }
                Ok(HostEvent::Shutdown) => {
                    debug!("activity forwarder stopping");
                    break;
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("activity forwarder lagged by {n} events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
