//! Engine event types and the queue that carries them to the control thread.
//!
//! Surfaces never call back into the host directly. Every engine callback is
//! turned into an [`EngineEvent`] and pushed onto a shared queue, which the
//! dispatcher drains once per tick.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tabhost_common::SurfaceId;

/// State of a page load lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageLoadState {
    /// Navigation has started.
    Started,
    /// Page has fully loaded.
    Finished,
}

#[cfg(feature = "wry")]
impl From<wry::PageLoadEvent> for PageLoadState {
    fn from(e: wry::PageLoadEvent) -> Self {
        match e {
            wry::PageLoadEvent::Started => Self::Started,
            wry::PageLoadEvent::Finished => Self::Finished,
        }
    }
}

/// What happened inside a surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEventKind {
    LoadStarted,
    LoadStopped,
    DidNavigate { url: String },
    DidFailLoad { url: String, error: String },
    TitleUpdated { title: String },
    FaviconUpdated { url: String },
    RenderProcessGone { reason: String },
    /// An intercepted navigation should be handed to the host application.
    ExternalOpenRequested { url: String },
    /// An intercepted `window.open` should load in the originating view.
    LoadInPlaceRequested { url: String },
}

impl From<PageLoadState> for EngineEventKind {
    fn from(state: PageLoadState) -> Self {
        match state {
            PageLoadState::Started => Self::LoadStarted,
            PageLoadState::Finished => Self::LoadStopped,
        }
    }
}

/// An engine event tagged with the surface instance that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineEvent {
    pub surface_id: SurfaceId,
    pub kind: EngineEventKind,
}

type SharedEvents = Arc<Mutex<Vec<EngineEvent>>>;

/// The control thread's inbox of engine events.
#[derive(Clone, Default)]
pub struct EngineEventQueue {
    events: SharedEvents,
}

impl EngineEventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that tags everything it emits with `surface_id`.
    pub fn sink_for(&self, surface_id: SurfaceId) -> EventSink {
        EventSink {
            surface_id,
            events: Arc::clone(&self.events),
        }
    }

    /// Take all pending events in arrival order.
    pub fn drain(&self) -> Vec<EngineEvent> {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *events)
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle given to one surface instance for reporting engine events.
#[derive(Clone)]
pub struct EventSink {
    surface_id: SurfaceId,
    events: SharedEvents,
}

impl EventSink {
    pub fn surface_id(&self) -> SurfaceId {
        self.surface_id
    }

    pub fn emit(&self, kind: EngineEventKind) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(EngineEvent {
                surface_id: self.surface_id,
                kind,
            });
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("surface_id", &self.surface_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sinks_tag_events_with_their_surface() {
        let queue = EngineEventQueue::new();
        let a = queue.sink_for(SurfaceId(1));
        let b = queue.sink_for(SurfaceId(2));

        a.emit(EngineEventKind::LoadStarted);
        b.emit(EngineEventKind::TitleUpdated {
            title: "Docs".into(),
        });
        a.emit(EngineEventKind::LoadStopped);

        let drained = queue.drain();
        assert_eq!(drained.len(), 3);
        assert_eq!(drained[0].surface_id, SurfaceId(1));
        assert_eq!(drained[1].surface_id, SurfaceId(2));
        assert_eq!(drained[2].kind, EngineEventKind::LoadStopped);
    }

    #[test]
    fn drain_empties_the_queue() {
        let queue = EngineEventQueue::new();
        queue.sink_for(SurfaceId(7)).emit(EngineEventKind::LoadStarted);
        assert_eq!(queue.len(), 1);
        queue.drain();
        assert!(queue.is_empty());
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn page_load_state_maps_to_event_kind() {
        assert_eq!(
            EngineEventKind::from(PageLoadState::Started),
            EngineEventKind::LoadStarted
        );
        assert_eq!(
            EngineEventKind::from(PageLoadState::Finished),
            EngineEventKind::LoadStopped
        );
    }

    #[test]
    fn emit_recovers_from_a_poisoned_queue() {
        let queue = EngineEventQueue::new();
        let sink = queue.sink_for(SurfaceId(1));
        let shared = Arc::clone(&queue.events);
        let _ = std::thread::spawn(move || {
            let _guard = shared.lock().unwrap();
            panic!("poison the queue");
        })
        .join();
        assert!(queue.events.is_poisoned());

        sink.emit(EngineEventKind::LoadStarted);
        let events = queue.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EngineEventKind::LoadStarted);
    }
}
