use std::time::{Duration, Instant};

use tabhost_common::{HostEvent, ViewId};
use tracing::{info, warn};

use crate::surface::{RenderSurface, SurfaceFactory};

use super::{ShutdownReport, ViewHost};

impl<F: SurfaceFactory> ViewHost<F> {
    /// Tear a view down: mute, stop, detach, release. Returns `false`
    /// without side effects if the view is unknown or already gone.
    pub fn destroy_view(&mut self, window_id: &ViewId) -> bool {
        if !self.views.contains_key(window_id) {
            warn!(window_id = %window_id, "destroyView for unknown or already destroyed view ignored");
            return false;
        }
        self.teardown(window_id, true)
    }

    /// Destroy every view and prefetched surface.
    ///
    /// Views still pending once `timeout` has elapsed are released without
    /// the mute and stop steps.
    pub fn destroy_all_views(&mut self, timeout: Duration) -> ShutdownReport {
        let deadline = Instant::now() + timeout;
        let mut report = ShutdownReport::default();

        for window_id in self.active_view_ids() {
            let graceful = Instant::now() < deadline;
            if self.teardown(&window_id, graceful) {
                if graceful {
                    report.graceful += 1;
                } else {
                    report.forced += 1;
                }
            }
        }
        report.prefetched = self.clear_prefetched();
        self.stacking.clear();

        info!(
            graceful = report.graceful,
            forced = report.forced,
            prefetched = report.prefetched,
            "all views destroyed"
        );
        report
    }

    /// Remove the view from every table, then release its surface. The
    /// handle leaves the registry before any engine call, so a second
    /// teardown of the same id finds nothing.
    pub(crate) fn teardown(&mut self, window_id: &ViewId, graceful: bool) -> bool {
        let Some(mut handle) = self.views.remove(window_id) else {
            return false;
        };
        let surface_id = handle.surface.id();
        self.owners.remove(&surface_id);
        self.tabs.remove(window_id);
        self.bridge.discard(window_id);
        self.stacking.retain(|id| id != window_id);

        let surface = &mut handle.surface;
        if graceful && !surface.is_destroyed() {
            if let Err(e) = surface.set_muted(true) {
                warn!(window_id = %window_id, error = %e, "mute before teardown failed");
            }
            if let Err(e) = surface.stop() {
                warn!(window_id = %window_id, error = %e, "stop before teardown failed");
            }
            if handle.attached {
                if let Err(e) = surface.detach() {
                    warn!(window_id = %window_id, error = %e, "detach before teardown failed");
                }
            }
        }
        surface.destroy();

        info!(window_id = %window_id, surface_id = surface_id.0, graceful, "view destroyed");
        self.bus.publish(HostEvent::ViewDestroyed(window_id.clone()));
        true
    }
}
