use tabhost_common::{Rect, SurfaceId, ViewError, ViewId};
use tracing::{debug, info, trace, warn};

use crate::events::EngineEventKind;
use crate::state::Tab;
use crate::surface::{RenderSurface, SurfaceFactory, SurfaceSpec};

use super::{Owner, ViewHost};

/// What a prefetch surface has reported while nobody owned it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PrefetchProgress {
    pub(crate) loading: bool,
    /// Last committed URL, after redirects.
    pub(crate) url: Option<String>,
    pub(crate) title: Option<String>,
    pub(crate) favicon_url: Option<String>,
    pub(crate) error: Option<String>,
}

impl Default for PrefetchProgress {
    fn default() -> Self {
        // The load is issued with the surface.
        Self {
            loading: true,
            url: None,
            title: None,
            favicon_url: None,
            error: None,
        }
    }
}

impl PrefetchProgress {
    fn apply(&mut self, kind: EngineEventKind) {
        match kind {
            EngineEventKind::LoadStarted => {
                self.loading = true;
                self.error = None;
            }
            EngineEventKind::LoadStopped => self.loading = false,
            EngineEventKind::DidNavigate { url } => {
                self.url = Some(url);
                self.error = None;
            }
            EngineEventKind::DidFailLoad { error, .. } => {
                self.loading = false;
                self.error = Some(error);
            }
            EngineEventKind::TitleUpdated { title } => self.title = Some(title),
            EngineEventKind::FaviconUpdated { url } => self.favicon_url = Some(url),
            other => trace!(kind = ?other, "prefetch event ignored"),
        }
    }

    /// Copy the recorded state onto the tab that adopts the surface.
    pub(crate) fn seed(&self, tab: &mut Tab) {
        tab.is_loading = self.loading;
        if let Some(url) = &self.url {
            tab.url = url.clone();
        }
        if let Some(title) = &self.title {
            tab.title = title.clone();
        }
        if self.favicon_url.is_some() {
            tab.favicon_url = self.favicon_url.clone();
        }
        tab.error = self.error.clone();
    }

    /// The load ran to completion without an error.
    pub(crate) fn completed(&self) -> bool {
        !self.loading && self.error.is_none()
    }
}

/// A hidden surface warming up a URL for a future view.
pub(crate) struct Prefetched<S> {
    pub(crate) url: String,
    /// Storage partition of this surface alone.
    pub(crate) partition: String,
    pub(crate) surface: S,
    pub(crate) progress: PrefetchProgress,
}

/// A prefetched surface handed over to a view.
pub(crate) struct Adopted<S> {
    pub(crate) surface: S,
    pub(crate) partition: String,
    pub(crate) progress: PrefetchProgress,
}

impl<F: SurfaceFactory> ViewHost<F> {
    /// Start loading `url` in a hidden, muted, off-screen surface so a later
    /// `create_view` with the same URL can adopt it. Returns whether a new
    /// surface was started.
    pub fn prefetch(&mut self, url: &str) -> Result<bool, ViewError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ViewError::MalformedInput("empty prefetch url".into()));
        }
        if !self.options.prefetch_enabled {
            debug!(url = %url, "prefetch disabled; ignored");
            return Ok(false);
        }
        if let Some(host) = self.interceptor.blocked_host(url) {
            return Err(ViewError::Blocked { host });
        }
        if self.prefetched.iter().any(|p| p.url == url) {
            debug!(url = %url, "already prefetched");
            return Ok(false);
        }

        let context = self.surface_context();
        let partition = format!(
            "{}prefetch-{}",
            self.options.partition_prefix, context.surface_id.0
        );
        let spec = SurfaceSpec {
            label: "prefetch".to_string(),
            bounds: Rect::offscreen(self.options.offscreen_width, self.options.offscreen_height),
            url: Some(url.to_string()),
            visible: false,
            muted: true,
            partition: partition.clone(),
            user_agent: self.options.user_agent.clone(),
            devtools: false,
        };
        let surface = self.factory.create(&spec, context)?;
        self.owners.insert(surface.id(), Owner::Prefetch);
        self.prefetched.push_back(Prefetched {
            url: url.to_string(),
            partition,
            surface,
            progress: PrefetchProgress::default(),
        });
        info!(url = %url, "prefetch started");

        while self.prefetched.len() > self.options.prefetch_max_entries.max(1) {
            if let Some(oldest) = self.prefetched.pop_front() {
                debug!(url = %oldest.url, "prefetch evicted");
                self.release_prefetched(oldest);
            }
        }
        Ok(true)
    }

    pub fn prefetched_urls(&self) -> Vec<String> {
        self.prefetched.iter().map(|p| p.url.clone()).collect()
    }

    /// Record an engine event of a surface that is still prefetching. A
    /// crashed prefetch is discarded.
    pub(crate) fn on_prefetch_event(&mut self, surface_id: SurfaceId, kind: EngineEventKind) {
        let Some(pos) = self
            .prefetched
            .iter()
            .position(|p| p.surface.id() == surface_id)
        else {
            return;
        };
        if let EngineEventKind::RenderProcessGone { reason } = &kind {
            if let Some(entry) = self.prefetched.remove(pos) {
                warn!(url = %entry.url, reason = %reason, "prefetch renderer crashed; discarded");
                self.release_prefetched(entry);
            }
            return;
        }
        if let Some(entry) = self.prefetched.get_mut(pos) {
            entry.progress.apply(kind);
        }
    }

    /// Hand a prefetched surface for `url` over to `window_id`. A surface
    /// that cannot be brought on-screen is torn down and `None` returned.
    pub(crate) fn adopt_prefetched(
        &mut self,
        window_id: &ViewId,
        url: &str,
        bounds: Rect,
    ) -> Option<Adopted<F::Surface>> {
        let pos = self.prefetched.iter().position(|p| p.url == url)?;
        let Prefetched {
            mut surface,
            partition,
            progress,
            ..
        } = self.prefetched.remove(pos)?;

        let prepared = surface
            .set_bounds(bounds)
            .and_then(|()| surface.set_visible(true))
            .and_then(|()| surface.set_muted(false));
        if let Err(e) = prepared {
            warn!(window_id = %window_id, url = %url, error = %e, "prefetched surface unusable");
            self.owners.remove(&surface.id());
            surface.destroy();
            return None;
        }

        info!(
            window_id = %window_id,
            url = %url,
            loading = progress.loading,
            "prefetched surface adopted"
        );
        Some(Adopted {
            surface,
            partition,
            progress,
        })
    }

    /// Destroy every prefetched surface. Returns how many there were.
    pub(crate) fn clear_prefetched(&mut self) -> usize {
        let drained: Vec<_> = self.prefetched.drain(..).collect();
        let count = drained.len();
        for entry in drained {
            self.release_prefetched(entry);
        }
        count
    }

    fn release_prefetched(&mut self, mut entry: Prefetched<F::Surface>) {
        self.owners.remove(&entry.surface.id());
        entry.surface.destroy();
    }
}
