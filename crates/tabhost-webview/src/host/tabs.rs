use tabhost_common::{TabId, ViewError, ViewId};
use tracing::{debug, info, warn};

use crate::state::Tab;
use crate::surface::SurfaceFactory;
use crate::tab_store::CloseOutcome;

use super::ViewHost;

impl<F: SurfaceFactory> ViewHost<F> {
    /// Append a tab to a view, make it active and load it.
    pub fn create_tab(&mut self, window_id: &ViewId, url: Option<&str>) -> Result<TabId, ViewError> {
        let url = url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(&self.options.home_url)
            .to_string();
        let set = self
            .tabs
            .get_mut(window_id)
            .ok_or_else(|| ViewError::ViewNotFound(window_id.clone()))?;

        let tab_id = set.push_active(Tab::new(&url));
        info!(window_id = %window_id, tab_id = %tab_id, url = %url, "tab created");

        self.show_active_tab(window_id);
        self.push_full_state(window_id);
        Ok(tab_id)
    }

    /// Make `tab_id` the active tab of a view.
    pub fn switch_tab(&mut self, window_id: &ViewId, tab_id: &TabId) -> Result<(), ViewError> {
        let set = self
            .tabs
            .get_mut(window_id)
            .ok_or_else(|| ViewError::ViewNotFound(window_id.clone()))?;
        if !set.activate(tab_id) {
            return Err(ViewError::TabNotFound {
                view: window_id.clone(),
                tab: tab_id.clone(),
            });
        }
        debug!(window_id = %window_id, tab_id = %tab_id, "tab switched");

        self.show_active_tab(window_id);
        self.push_full_state(window_id);
        Ok(())
    }

    /// Remove a tab. Closing the last tab leaves one default tab behind.
    pub fn close_tab(
        &mut self,
        window_id: &ViewId,
        tab_id: &TabId,
    ) -> Result<CloseOutcome, ViewError> {
        let home_url = self.options.home_url.clone();
        let set = self
            .tabs
            .get_mut(window_id)
            .ok_or_else(|| ViewError::ViewNotFound(window_id.clone()))?;
        let outcome = set
            .close(tab_id, &home_url)
            .ok_or_else(|| ViewError::TabNotFound {
                view: window_id.clone(),
                tab: tab_id.clone(),
            })?;
        info!(
            window_id = %window_id,
            tab_id = %tab_id,
            new_active = %outcome.new_active,
            "tab closed"
        );

        if outcome.active_changed {
            self.show_active_tab(window_id);
        }
        self.push_full_state(window_id);
        Ok(outcome)
    }

    /// Load the active tab's URL into the surface unless it is already
    /// displayed. Load failures end up on the tab, not the caller.
    fn show_active_tab(&mut self, window_id: &ViewId) {
        let Some(url) = self
            .tabs
            .get(window_id)
            .and_then(|s| s.active())
            .map(|t| t.url.clone())
        else {
            return;
        };
        let displayed = self
            .views
            .get(window_id)
            .and_then(|h| h.displayed_url.as_deref());
        if displayed == Some(url.as_str()) {
            return;
        }
        if let Err(e) = self.load_url(window_id, &url) {
            warn!(window_id = %window_id, url = %url, error = %e, "active tab load failed");
        }
    }
}
