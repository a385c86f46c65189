use tabhost_common::{ViewError, ViewId};
use tracing::{debug, info, warn};

use crate::state::ViewPatch;
use crate::surface::{RenderSurface, SurfaceFactory};

use super::{NavAction, ViewHost};

impl<F: SurfaceFactory> ViewHost<F> {
    /// Issue a history or load-control action. Returns whether it reached
    /// the surface; unknown views and unavailable history are no-ops.
    pub fn navigate(&mut self, window_id: &ViewId, action: NavAction) -> bool {
        let Some(handle) = self.views.get_mut(window_id) else {
            warn!(window_id = %window_id, ?action, "navigate for unknown view ignored");
            return false;
        };
        let surface = &mut handle.surface;

        let result = match action {
            NavAction::Back => {
                if !surface.can_go_back() {
                    debug!(window_id = %window_id, "back ignored: no history");
                    return false;
                }
                surface.go_back()
            }
            NavAction::Forward => {
                if !surface.can_go_forward() {
                    debug!(window_id = %window_id, "forward ignored: no forward history");
                    return false;
                }
                surface.go_forward()
            }
            NavAction::Reload => surface.reload(),
            NavAction::Stop => surface.stop(),
        };

        match result {
            Ok(()) => {
                debug!(window_id = %window_id, ?action, "navigation issued");
                true
            }
            Err(e) => {
                warn!(window_id = %window_id, ?action, error = %e, "navigation failed");
                false
            }
        }
    }

    /// Load `url` into the active tab of a view.
    ///
    /// Pushes `{isLoading: true, error: null}` before the load is issued. A
    /// blocked host or an engine rejection is pushed as the tab error and
    /// returned. Unknown views are a logged no-op.
    pub fn load_url(&mut self, window_id: &ViewId, url: &str) -> Result<(), ViewError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ViewError::MalformedInput("empty url".into()));
        }
        if !self.views.contains_key(window_id) {
            warn!(window_id = %window_id, url = %url, "loadUrl for unknown view ignored");
            return Ok(());
        }

        if let Some(host) = self.interceptor.blocked_host(url) {
            let err = ViewError::Blocked { host };
            warn!(window_id = %window_id, url = %url, "load refused: host blocked");
            self.fail_active_tab(window_id, err.to_string());
            return Err(err);
        }

        if let Some(tab) = self.tabs.get_mut(window_id).and_then(|s| s.active_mut()) {
            tab.url = url.to_string();
            tab.is_loading = true;
            tab.error = None;
        }
        self.bridge
            .push_now(window_id, ViewPatch::loading(true).with_error(None));

        let Some(handle) = self.views.get_mut(window_id) else {
            return Ok(());
        };
        match handle.surface.load_url(url) {
            Ok(()) => {
                handle.displayed_url = Some(url.to_string());
                info!(window_id = %window_id, url = %url, "load issued");
                Ok(())
            }
            Err(e) => {
                warn!(window_id = %window_id, url = %url, error = %e, "engine rejected load");
                self.fail_active_tab(window_id, e.to_string());
                Err(e.into())
            }
        }
    }

    fn fail_active_tab(&mut self, window_id: &ViewId, error: String) {
        if let Some(tab) = self.tabs.get_mut(window_id).and_then(|s| s.active_mut()) {
            tab.is_loading = false;
            tab.error = Some(error.clone());
        }
        self.bridge
            .push_now(window_id, ViewPatch::loading(false).with_error(Some(error)));
    }
}
