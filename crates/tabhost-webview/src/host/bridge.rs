use tabhost_common::{HostEvent, ViewId, Visit};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::events::{EngineEvent, EngineEventKind};
use crate::state::{StatePush, ViewPatch};
use crate::surface::{RenderSurface, SurfaceFactory};

use super::{Owner, ViewHost};

/// Per-view patch coalescing in front of the push channel.
///
/// Patches for one view merge until flushed, so a view's pushes always
/// reach the UI in the order they were produced.
pub(crate) struct EventBridge {
    pending: Vec<(ViewId, ViewPatch)>,
    sender: mpsc::UnboundedSender<StatePush>,
}

impl EventBridge {
    pub(crate) fn new(sender: mpsc::UnboundedSender<StatePush>) -> Self {
        Self {
            pending: Vec::new(),
            sender,
        }
    }

    pub(crate) fn queue(&mut self, view: &ViewId, patch: ViewPatch) {
        if patch.is_empty() {
            return;
        }
        match self.pending.iter_mut().find(|(id, _)| id == view) {
            Some((_, pending)) => pending.merge(patch),
            None => self.pending.push((view.clone(), patch)),
        }
    }

    /// Queue `patch` and flush the view right away.
    pub(crate) fn push_now(&mut self, view: &ViewId, patch: ViewPatch) {
        self.queue(view, patch);
        self.flush_view(view);
    }

    pub(crate) fn flush_view(&mut self, view: &ViewId) {
        if let Some(pos) = self.pending.iter().position(|(id, _)| id == view) {
            let (window_id, patch) = self.pending.remove(pos);
            self.send(window_id, patch);
        }
    }

    /// Flush everything pending. Returns the number of pushes sent.
    pub(crate) fn flush_all(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending);
        let count = pending.len();
        for (window_id, patch) in pending {
            self.send(window_id, patch);
        }
        count
    }

    /// Drop whatever is pending for a view that is going away.
    pub(crate) fn discard(&mut self, view: &ViewId) {
        self.pending.retain(|(id, _)| id != view);
    }

    fn send(&self, window_id: ViewId, patch: ViewPatch) {
        trace!(window_id = %window_id, "state push");
        if self.sender.send(StatePush { window_id, patch }).is_err() {
            debug!("state push dropped: receiver closed");
        }
    }
}

// =============================================================================
// ENGINE EVENT TRANSLATION
// =============================================================================

impl<F: SurfaceFactory> ViewHost<F> {
    /// Apply every pending engine event, then flush coalesced patches.
    /// Returns the number of events processed.
    pub fn tick(&mut self) -> usize {
        let events = self.engine_events.drain();
        let count = events.len();
        for event in events {
            self.handle_engine_event(event);
        }
        self.bridge.flush_all();
        count
    }

    /// Apply one engine event. Events from surfaces that no longer belong
    /// to a live view are dropped.
    pub fn handle_engine_event(&mut self, event: EngineEvent) {
        let surface_id = event.surface_id;
        let window_id = match self.owners.get(&surface_id) {
            Some(Owner::View(id)) => id.clone(),
            Some(Owner::Prefetch) => {
                self.on_prefetch_event(surface_id, event.kind);
                return;
            }
            None => {
                debug!(surface_id = surface_id.0, kind = ?event.kind, "event from stale surface dropped");
                return;
            }
        };

        match event.kind {
            EngineEventKind::LoadStarted => self.on_load_started(&window_id),
            EngineEventKind::LoadStopped => self.on_load_stopped(&window_id),
            EngineEventKind::DidNavigate { url } => self.on_did_navigate(&window_id, url),
            EngineEventKind::DidFailLoad { url, error } => {
                self.on_did_fail_load(&window_id, url, error)
            }
            EngineEventKind::TitleUpdated { title } => self.on_title_updated(&window_id, title),
            EngineEventKind::FaviconUpdated { url } => self.on_favicon_updated(&window_id, url),
            EngineEventKind::RenderProcessGone { reason } => {
                self.on_render_process_gone(&window_id, reason)
            }
            EngineEventKind::ExternalOpenRequested { url } => {
                info!(window_id = %window_id, url = %url, "external open");
                self.bus.publish(HostEvent::ExternalOpen {
                    source_window_id: window_id,
                    target_url: url,
                });
            }
            EngineEventKind::LoadInPlaceRequested { url } => {
                if let Err(e) = self.load_url(&window_id, &url) {
                    warn!(window_id = %window_id, url = %url, error = %e, "in-place load failed");
                }
            }
        }
    }

    fn history_flags(&self, window_id: &ViewId) -> (bool, bool) {
        self.views
            .get(window_id)
            .map(|h| (h.surface.can_go_back(), h.surface.can_go_forward()))
            .unwrap_or((false, false))
    }

    fn on_load_started(&mut self, window_id: &ViewId) {
        if let Some(tab) = self.tabs.get_mut(window_id).and_then(|s| s.active_mut()) {
            tab.is_loading = true;
        }
        self.bridge.queue(window_id, ViewPatch::loading(true));
    }

    fn on_load_stopped(&mut self, window_id: &ViewId) {
        if let Some(handle) = self.views.get_mut(window_id) {
            handle.crash_reload_pending = false;
        }
        let (back, forward) = self.history_flags(window_id);
        let visit = self
            .tabs
            .get_mut(window_id)
            .and_then(|s| s.active_mut())
            .and_then(|tab| {
                tab.is_loading = false;
                tab.error.is_none().then(|| Visit {
                    window_id: window_id.clone(),
                    url: tab.url.clone(),
                    title: tab.title.clone(),
                })
            });

        self.bridge.push_now(
            window_id,
            ViewPatch::loading(false).with_history(back, forward),
        );

        if let Some(visit) = visit {
            self.bus.publish(HostEvent::VisitCompleted(visit));
        }
    }

    fn on_did_navigate(&mut self, window_id: &ViewId, url: String) {
        if let Some(handle) = self.views.get_mut(window_id) {
            handle.displayed_url = Some(url.clone());
        }
        let (back, forward) = self.history_flags(window_id);
        let Some(set) = self.tabs.get_mut(window_id) else {
            return;
        };
        if let Some(tab) = set.active_mut() {
            tab.url = url.clone();
            tab.error = None;
        }
        let tabs = set.tabs().to_vec();

        debug!(window_id = %window_id, url = %url, "did navigate");
        let patch = ViewPatch {
            url: Some(url),
            ..ViewPatch::default()
        }
        .with_tabs(tabs)
        .with_history(back, forward)
        .with_error(None);
        self.bridge.push_now(window_id, patch);
    }

    fn on_did_fail_load(&mut self, window_id: &ViewId, url: String, error: String) {
        warn!(window_id = %window_id, url = %url, error = %error, "load failed");
        if let Some(tab) = self.tabs.get_mut(window_id).and_then(|s| s.active_mut()) {
            tab.is_loading = false;
            tab.error = Some(error.clone());
        }
        self.bridge
            .queue(window_id, ViewPatch::loading(false).with_error(Some(error)));
    }

    fn on_title_updated(&mut self, window_id: &ViewId, title: String) {
        let Some(set) = self.tabs.get_mut(window_id) else {
            return;
        };
        if let Some(tab) = set.active_mut() {
            tab.title = title.clone();
        }
        let patch = ViewPatch {
            title: Some(title),
            ..ViewPatch::default()
        }
        .with_tabs(set.tabs().to_vec());
        self.bridge.queue(window_id, patch);
    }

    fn on_favicon_updated(&mut self, window_id: &ViewId, url: String) {
        if let Some(handle) = self.views.get_mut(window_id) {
            handle.favicon_url = Some(url.clone());
        }
        let Some(set) = self.tabs.get_mut(window_id) else {
            return;
        };
        if let Some(tab) = set.active_mut() {
            tab.favicon_url = Some(url.clone());
        }
        let patch = ViewPatch {
            favicon_url: Some(Some(url)),
            ..ViewPatch::default()
        }
        .with_tabs(set.tabs().to_vec());
        self.bridge.queue(window_id, patch);
    }

    fn on_render_process_gone(&mut self, window_id: &ViewId, reason: String) {
        if let Some(tab) = self.tabs.get_mut(window_id).and_then(|s| s.active_mut()) {
            tab.is_loading = false;
            tab.error = Some(reason.clone());
        }
        self.bridge.push_now(
            window_id,
            ViewPatch::loading(false).with_error(Some(reason.clone())),
        );

        let Some(handle) = self.views.get_mut(window_id) else {
            return;
        };
        if handle.crash_reload_pending {
            error!(
                window_id = %window_id,
                reason = %reason,
                "renderer crashed again before recovering; not reloading"
            );
            return;
        }

        error!(window_id = %window_id, reason = %reason, "renderer crashed; reloading");
        handle.crash_reload_pending = true;
        if let Err(e) = handle.surface.reload() {
            warn!(window_id = %window_id, error = %e, "crash reload failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge() -> (EventBridge, mpsc::UnboundedReceiver<StatePush>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EventBridge::new(tx), rx)
    }

    #[test]
    fn patches_for_one_view_coalesce() {
        let (mut bridge, mut rx) = bridge();
        let w1 = ViewId::from("w1");
        bridge.queue(&w1, ViewPatch::loading(true));
        bridge.queue(
            &w1,
            ViewPatch {
                title: Some("Docs".into()),
                ..ViewPatch::default()
            },
        );
        assert!(rx.try_recv().is_err());

        assert_eq!(bridge.flush_all(), 1);
        let push = rx.try_recv().unwrap();
        assert_eq!(push.patch.is_loading, Some(true));
        assert_eq!(push.patch.title.as_deref(), Some("Docs"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn push_now_carries_earlier_pending_fields() {
        let (mut bridge, mut rx) = bridge();
        let w1 = ViewId::from("w1");
        let w2 = ViewId::from("w2");
        bridge.queue(&w1, ViewPatch::loading(true));
        bridge.queue(&w2, ViewPatch::loading(true));
        bridge.push_now(&w1, ViewPatch::default().with_history(true, false));

        let push = rx.try_recv().unwrap();
        assert_eq!(push.window_id, w1);
        assert_eq!(push.patch.is_loading, Some(true));
        assert_eq!(push.patch.can_go_back, Some(true));
        assert!(rx.try_recv().is_err(), "w2 stays pending");

        bridge.flush_all();
        assert_eq!(rx.try_recv().unwrap().window_id, w2);
    }

    #[test]
    fn empty_patches_are_not_queued() {
        let (mut bridge, mut rx) = bridge();
        bridge.queue(&ViewId::from("w1"), ViewPatch::default());
        assert_eq!(bridge.flush_all(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn discard_drops_pending_patch() {
        let (mut bridge, mut rx) = bridge();
        let w1 = ViewId::from("w1");
        bridge.queue(&w1, ViewPatch::loading(true));
        bridge.discard(&w1);
        assert_eq!(bridge.flush_all(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_receiver_is_tolerated() {
        let (mut bridge, rx) = bridge();
        drop(rx);
        bridge.push_now(&ViewId::from("w1"), ViewPatch::loading(false));
    }
}
