//! View orchestration.
//!
//! `ViewHost` owns every render surface, the tab sets of every view and the
//! outbound state-push channel. It is driven from a single control thread:
//! commands call its methods directly, engine callbacks land in its
//! [`EngineEventQueue`] and are applied on [`ViewHost::tick`].

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tabhost_common::{EventBus, Rect, SurfaceId, TabId, ViewId};
use tokio::sync::mpsc;

use crate::events::EngineEventQueue;
use crate::security::{NavigationGate, SecurityInterceptor};
use crate::state::{NavigationState, StatePush, Tab};
use crate::surface::{RenderSurface, SurfaceContext, SurfaceFactory};
use crate::tab_store::TabStateStore;

mod bridge;
mod compositor;
mod dispatch;
mod lifecycle;
mod navigation;
mod prefetch;
mod registry;
mod tabs;


use bridge::EventBridge;
use prefetch::Prefetched;

// =============================================================================
// OPTIONS & PAYLOADS
// =============================================================================

/// Host-wide settings, usually derived from the config file.
#[derive(Debug, Clone)]
pub struct HostOptions {
    /// URL of tabs created without one.
    pub home_url: String,
    /// Storage partition prefix. Views append their window id, prefetch
    /// surfaces `prefetch-<surface id>`.
    pub partition_prefix: String,
    pub user_agent: Option<String>,
    pub devtools: bool,
    pub prefetch_enabled: bool,
    pub prefetch_max_entries: usize,
    /// Size of off-screen prefetch surfaces.
    pub offscreen_width: f64,
    pub offscreen_height: f64,
    pub blocked_domains: Vec<String>,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            home_url: "about:blank".to_string(),
            partition_prefix: "persist:view-".to_string(),
            user_agent: None,
            devtools: false,
            prefetch_enabled: true,
            prefetch_max_entries: 4,
            offscreen_width: 1024.0,
            offscreen_height: 768.0,
            blocked_domains: Vec::new(),
        }
    }
}

/// A tab the host UI wants restored when a view is created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TabSeed {
    pub id: Option<TabId>,
    pub url: String,
    pub title: Option<String>,
}

/// Optional initial content of `createView`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InitialPayload {
    /// Loaded into the active tab.
    pub url: Option<String>,
    pub tabs: Vec<TabSeed>,
    pub active_tab_id: Option<TabId>,
}

impl InitialPayload {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }
}

/// What `createView` actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CreateOutcome {
    Created,
    /// A live view already existed; bounds and URL were applied to it.
    Updated,
    /// The previous surface had died and was replaced.
    Recreated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NavAction {
    Back,
    Forward,
    Reload,
    Stop,
}

/// Outcome of [`ViewHost::destroy_all_views`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShutdownReport {
    /// Views torn down with mute and stop before release.
    pub graceful: usize,
    /// Views released directly because the deadline had passed.
    pub forced: usize,
    pub prefetched: usize,
}

// =============================================================================
// VIEW HANDLE
// =============================================================================

/// One hosted view and the surface it exclusively owns.
pub struct ViewHandle<S> {
    pub(crate) window_id: ViewId,
    pub(crate) surface: S,
    /// Storage partition the surface was created in.
    pub(crate) partition: String,
    pub(crate) bounds: Rect,
    pub(crate) visible: bool,
    pub(crate) attached: bool,
    pub(crate) favicon_url: Option<String>,
    /// An automatic reload after a renderer crash is in flight.
    pub(crate) crash_reload_pending: bool,
    /// URL last committed to the surface.
    pub(crate) displayed_url: Option<String>,
}

impl<S: RenderSurface> ViewHandle<S> {
    pub fn window_id(&self) -> &ViewId {
        &self.window_id
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_id(&self) -> SurfaceId {
        self.surface.id()
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn favicon_url(&self) -> Option<&str> {
        self.favicon_url.as_deref()
    }

    pub fn crash_reload_pending(&self) -> bool {
        self.crash_reload_pending
    }

    pub fn displayed_url(&self) -> Option<&str> {
        self.displayed_url.as_deref()
    }
}

/// Read-only copy of a view's state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSnapshot {
    pub window_id: ViewId,
    pub bounds: Rect,
    pub visible: bool,
    pub attached: bool,
    pub tabs: Vec<Tab>,
    pub active_tab_id: Option<TabId>,
    pub navigation: NavigationState,
    pub favicon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Owner {
    View(ViewId),
    Prefetch,
}

// =============================================================================
// HOST
// =============================================================================

/// Registry of every hosted view, driven from one control thread.
pub struct ViewHost<F: SurfaceFactory> {
    factory: F,
    options: HostOptions,
    interceptor: SecurityInterceptor,
    engine_events: EngineEventQueue,
    next_surface_id: u64,
    views: BTreeMap<ViewId, ViewHandle<F::Surface>>,
    owners: HashMap<SurfaceId, Owner>,
    tabs: TabStateStore,
    bridge: EventBridge,
    bus: Arc<EventBus>,
    /// Last applied compositing order.
    stacking: Vec<ViewId>,
    prefetched: VecDeque<Prefetched<F::Surface>>,
}

impl<F: SurfaceFactory> ViewHost<F> {
    pub fn new(
        factory: F,
        options: HostOptions,
        bus: Arc<EventBus>,
        pushes: mpsc::UnboundedSender<StatePush>,
    ) -> Self {
        let interceptor = SecurityInterceptor::new(&options.blocked_domains);
        Self {
            factory,
            options,
            interceptor,
            engine_events: EngineEventQueue::new(),
            next_surface_id: 1,
            views: BTreeMap::new(),
            owners: HashMap::new(),
            tabs: TabStateStore::new(),
            bridge: EventBridge::new(pushes),
            bus,
            stacking: Vec::new(),
            prefetched: VecDeque::new(),
        }
    }

    pub fn options(&self) -> &HostOptions {
        &self.options
    }

    pub fn interceptor(&self) -> &SecurityInterceptor {
        &self.interceptor
    }

    /// Queue engine callbacks report into. Exposed so backends living
    /// outside the host can feed it.
    pub fn engine_events(&self) -> &EngineEventQueue {
        &self.engine_events
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Fresh id plus the per-instance event wiring for it.
    fn surface_context(&mut self) -> SurfaceContext {
        let surface_id = SurfaceId(self.next_surface_id);
        self.next_surface_id += 1;
        let events = self.engine_events.sink_for(surface_id);
        SurfaceContext {
            surface_id,
            gate: NavigationGate::new(self.interceptor.clone(), events.clone()),
            events,
        }
    }

    fn partition_for(&self, window_id: &ViewId) -> String {
        format!("{}{}", self.options.partition_prefix, window_id)
    }
}
