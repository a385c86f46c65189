use tabhost_common::{HostEvent, Rect, SurfaceError, ViewError, ViewId, Visit};
use tracing::{debug, info, warn};

use crate::state::{NavigationState, Tab, ViewPatch};
use crate::surface::{RenderSurface, SurfaceFactory, SurfaceSpec};
use crate::tab_store::TabSet;

use super::prefetch::Adopted;
use super::{CreateOutcome, InitialPayload, Owner, ViewHandle, ViewHost, ViewSnapshot};

impl<F: SurfaceFactory> ViewHost<F> {
    /// Create the view `window_id`, or update it if it already exists.
    ///
    /// A live view gets the new bounds and, if `initial.url` is set, loads it
    /// into its active tab. A view whose surface died is torn down and
    /// rebuilt. Never fails because the view exists.
    pub fn create_view(
        &mut self,
        window_id: &ViewId,
        bounds: Rect,
        initial: InitialPayload,
    ) -> Result<CreateOutcome, ViewError> {
        if window_id.as_str().trim().is_empty() {
            return Err(ViewError::MalformedInput("empty window id".into()));
        }
        if !bounds.is_valid() {
            return Err(ViewError::MalformedInput(format!(
                "invalid bounds for {window_id}: {bounds:?}"
            )));
        }

        let mut outcome = CreateOutcome::Created;
        if let Some(handle) = self.views.get(window_id) {
            if !handle.surface.is_destroyed() {
                self.update_existing(window_id, bounds, initial.url.as_deref());
                return Ok(CreateOutcome::Updated);
            }
            warn!(window_id = %window_id, "surface of existing view is dead; recreating");
            self.teardown(window_id, false);
            outcome = CreateOutcome::Recreated;
        }

        self.build_view(window_id, bounds, initial)?;
        Ok(outcome)
    }

    /// Apply bounds and URL to a live view. Load refusals are already on
    /// the active tab as an error patch, so they are only logged here.
    fn update_existing(&mut self, window_id: &ViewId, bounds: Rect, url: Option<&str>) {
        debug!(window_id = %window_id, "createView on live view; updating");
        if let Err(e) = self.set_bounds(window_id, bounds) {
            warn!(window_id = %window_id, error = %e, "bounds update refused");
        }
        if let Some(url) = url {
            if let Err(e) = self.load_url(window_id, url) {
                warn!(window_id = %window_id, url = %url, error = %e, "load on live view refused");
            }
        }
    }

    fn build_view(
        &mut self,
        window_id: &ViewId,
        bounds: Rect,
        initial: InitialPayload,
    ) -> Result<(), ViewError> {
        let mut set = self.initial_tabs(&initial);
        let mut initial_url = set.active().map(|t| t.url.clone());

        if let Some(url) = initial_url.as_deref() {
            if let Some(host) = self.interceptor.blocked_host(url) {
                warn!(window_id = %window_id, host = %host, "initial url blocked");
                if let Some(tab) = set.active_mut() {
                    tab.error = Some(ViewError::Blocked { host }.to_string());
                }
                initial_url = None;
            }
        }

        let adopted = initial_url
            .as_deref()
            .and_then(|url| self.adopt_prefetched(window_id, url, bounds));
        let (mut surface, partition, progress) = match adopted {
            Some(Adopted {
                surface,
                partition,
                progress,
            }) => (surface, partition, Some(progress)),
            None => {
                let partition = self.partition_for(window_id);
                let spec = SurfaceSpec {
                    label: window_id.to_string(),
                    bounds,
                    url: initial_url.clone(),
                    visible: true,
                    muted: false,
                    partition: partition.clone(),
                    user_agent: self.options.user_agent.clone(),
                    devtools: self.options.devtools,
                };
                let context = self.surface_context();
                (self.factory.create(&spec, context)?, partition, None)
            }
        };

        let attached = match surface.attach() {
            Ok(()) => true,
            Err(e) => {
                warn!(window_id = %window_id, error = %e, "attach failed");
                false
            }
        };
        let mut favicon_url = None;
        let mut displayed_url = initial_url.clone();
        let mut visit = None;
        match (&progress, set.active_mut()) {
            (Some(progress), Some(tab)) => {
                progress.seed(tab);
                favicon_url = progress.favicon_url.clone();
                if progress.url.is_some() {
                    displayed_url = progress.url.clone();
                }
                if progress.completed() {
                    visit = Some(Visit {
                        window_id: window_id.clone(),
                        url: tab.url.clone(),
                        title: tab.title.clone(),
                    });
                }
            }
            (None, Some(tab)) => tab.is_loading = initial_url.is_some(),
            (_, None) => {}
        }

        let surface_id = surface.id();
        self.owners
            .insert(surface_id, Owner::View(window_id.clone()));
        self.views.insert(
            window_id.clone(),
            ViewHandle {
                window_id: window_id.clone(),
                surface,
                partition,
                bounds,
                visible: true,
                attached,
                favicon_url,
                crash_reload_pending: false,
                displayed_url,
            },
        );
        self.tabs.insert(window_id.clone(), set);
        if attached {
            self.stacking.retain(|id| id != window_id);
            self.stacking.push(window_id.clone());
        }

        info!(window_id = %window_id, surface_id = surface_id.0, "view created");
        self.bus.publish(HostEvent::ViewCreated(window_id.clone()));
        self.push_full_state(window_id);
        // The prefetch finished loading before anyone could see it.
        if let Some(visit) = visit {
            self.bus.publish(HostEvent::VisitCompleted(visit));
        }
        Ok(())
    }

    /// Materialize the initial tab set from the payload.
    fn initial_tabs(&self, initial: &InitialPayload) -> TabSet {
        let tabs: Vec<Tab> = initial
            .tabs
            .iter()
            .filter(|seed| !seed.url.trim().is_empty())
            .map(|seed| {
                let mut tab = match &seed.id {
                    Some(id) => Tab::with_id(id.clone(), seed.url.trim()),
                    None => Tab::new(seed.url.trim()),
                };
                tab.title = seed.title.clone().unwrap_or_default();
                tab
            })
            .collect();

        let mut set = if tabs.is_empty() {
            let url = initial.url.as_deref().unwrap_or(&self.options.home_url);
            TabSet::from_tabs(vec![Tab::new(url.trim())], None)
        } else {
            TabSet::from_tabs(tabs, initial.active_tab_id.clone())
        };

        if let (Some(url), Some(tab)) = (initial.url.as_deref(), set.active_mut()) {
            tab.url = url.trim().to_string();
        }
        set
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    pub fn get_view(&self, window_id: &ViewId) -> Option<&ViewHandle<F::Surface>> {
        self.views.get(window_id)
    }

    /// Ids of all live views, sorted.
    pub fn active_view_ids(&self) -> Vec<ViewId> {
        self.views.keys().cloned().collect()
    }

    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    pub fn view_snapshot(&self, window_id: &ViewId) -> Option<ViewSnapshot> {
        let handle = self.views.get(window_id)?;
        let set = self.tabs.get(window_id)?;
        let active = set.active();
        Some(ViewSnapshot {
            window_id: window_id.clone(),
            bounds: handle.bounds,
            visible: handle.visible,
            attached: handle.attached,
            tabs: set.tabs().to_vec(),
            active_tab_id: set.active_id().cloned(),
            navigation: NavigationState {
                can_go_back: handle.surface.can_go_back(),
                can_go_forward: handle.surface.can_go_forward(),
                is_loading: active.is_some_and(|t| t.is_loading),
                error: active.and_then(|t| t.error.clone()),
            },
            favicon_url: handle.favicon_url.clone(),
        })
    }

    /// Full state of a view as one patch.
    pub(crate) fn full_state_patch(&self, window_id: &ViewId) -> Option<ViewPatch> {
        let snapshot = self.view_snapshot(window_id)?;
        let active = snapshot
            .active_tab_id
            .as_ref()
            .and_then(|id| snapshot.tabs.iter().find(|t| &t.id == id));
        Some(ViewPatch {
            url: active.map(|t| t.url.clone()),
            title: active.map(|t| t.title.clone()),
            favicon_url: Some(active.and_then(|t| t.favicon_url.clone())),
            error: Some(snapshot.navigation.error.clone()),
            is_loading: Some(snapshot.navigation.is_loading),
            can_go_back: Some(snapshot.navigation.can_go_back),
            can_go_forward: Some(snapshot.navigation.can_go_forward),
            active_tab_id: snapshot.active_tab_id,
            tabs: Some(snapshot.tabs),
        })
    }

    pub(crate) fn push_full_state(&mut self, window_id: &ViewId) {
        if let Some(patch) = self.full_state_patch(window_id) {
            self.bridge.push_now(window_id, patch);
        }
    }

    // =========================================================================
    // GEOMETRY
    // =========================================================================

    /// Move or resize a view. Unknown ids are a logged no-op.
    pub fn set_bounds(&mut self, window_id: &ViewId, bounds: Rect) -> Result<(), ViewError> {
        if !bounds.is_valid() {
            return Err(ViewError::MalformedInput(format!(
                "invalid bounds for {window_id}: {bounds:?}"
            )));
        }
        let Some(handle) = self.views.get_mut(window_id) else {
            warn!(window_id = %window_id, "setBounds for unknown view ignored");
            return Ok(());
        };
        handle.bounds = bounds;
        if let Err(e) = handle.surface.set_bounds(bounds) {
            warn!(window_id = %window_id, error = %e, "set_bounds failed");
        }
        Ok(())
    }

    /// Show or hide a view. A hidden view leaves the compositing tree and
    /// the stacking order; a shown view that isn't composited is attached
    /// on top.
    pub fn set_visibility(&mut self, window_id: &ViewId, visible: bool) {
        let Some(handle) = self.views.get_mut(window_id) else {
            warn!(window_id = %window_id, "setVisibility for unknown view ignored");
            return;
        };
        handle.visible = visible;
        if let Err(e) = handle.surface.set_visible(visible) {
            warn!(window_id = %window_id, error = %e, "set_visible failed");
        }

        if !visible {
            if handle.attached {
                match handle.surface.detach() {
                    Ok(()) | Err(SurfaceError::NotAttached) => handle.attached = false,
                    Err(e) => warn!(window_id = %window_id, error = %e, "detach on hide failed"),
                }
            }
            self.stacking.retain(|id| id != window_id);
        } else if !handle.attached && !handle.surface.is_destroyed() {
            match handle.surface.attach() {
                Ok(()) => {
                    handle.attached = true;
                    self.stacking.retain(|id| id != window_id);
                    self.stacking.push(window_id.clone());
                }
                Err(e) => warn!(window_id = %window_id, error = %e, "attach on show failed"),
            }
        }
        debug!(window_id = %window_id, visible, "visibility changed");
    }
}
