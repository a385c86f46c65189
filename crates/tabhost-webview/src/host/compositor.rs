use std::collections::HashSet;

use tabhost_common::{SurfaceError, ViewId};
use tracing::{debug, warn};

use crate::surface::{RenderSurface, SurfaceFactory};

use super::ViewHost;

impl<F: SurfaceFactory> ViewHost<F> {
    /// Rebuild the compositing tree in `ordered` order.
    ///
    /// Every attached view is detached first, then views are re-attached in
    /// the given order; unknown, dead and hidden ids are skipped and repeated
    /// ids count once. Per-view failures are logged and skipped. Returns the
    /// order actually applied.
    pub fn sync_stacking_order(&mut self, ordered: &[ViewId]) -> Vec<ViewId> {
        for handle in self.views.values_mut() {
            if !handle.attached {
                continue;
            }
            match handle.surface.detach() {
                Ok(()) | Err(SurfaceError::NotAttached) => handle.attached = false,
                Err(e) => {
                    warn!(window_id = %handle.window_id, error = %e, "detach failed during resync")
                }
            }
        }

        let mut seen = HashSet::new();
        let mut applied = Vec::with_capacity(ordered.len());
        for window_id in ordered {
            if !seen.insert(window_id) {
                continue;
            }
            let Some(handle) = self.views.get_mut(window_id) else {
                debug!(window_id = %window_id, "stacking: unknown view skipped");
                continue;
            };
            if !handle.visible || handle.surface.is_destroyed() {
                debug!(window_id = %window_id, "stacking: hidden or dead view skipped");
                continue;
            }
            match handle.surface.attach() {
                Ok(()) => {
                    handle.attached = true;
                    applied.push(window_id.clone());
                }
                Err(e) => warn!(window_id = %window_id, error = %e, "attach failed during resync"),
            }
        }

        debug!(order = ?applied, "stacking order applied");
        self.stacking = applied.clone();
        applied
    }

    /// Compositing order as last applied, bottom to top.
    pub fn stacking_order(&self) -> &[ViewId] {
        &self.stacking
    }
}
