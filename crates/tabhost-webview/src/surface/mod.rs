//! Render surface capability.
//!
//! A render surface is one embedded, independently navigable web view owned
//! by a [`ViewHandle`](crate::host::ViewHandle). Backends implement
//! [`RenderSurface`] and hand instances out through a [`SurfaceFactory`].

use tabhost_common::{Rect, SurfaceError, SurfaceId};

use crate::events::EventSink;
use crate::security::NavigationGate;

pub mod headless;
#[cfg(feature = "wry")]
pub mod wry;

/// Everything a backend needs to build one surface.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceSpec {
    /// Debug label, usually the owning window id.
    pub label: String,
    pub bounds: Rect,
    /// Initial URL; `None` leaves the surface blank.
    pub url: Option<String>,
    pub visible: bool,
    pub muted: bool,
    /// Storage partition; one per view, shared by prefetched surfaces.
    pub partition: String,
    pub user_agent: Option<String>,
    pub devtools: bool,
}

/// Per-instance wiring handed to the backend exactly once at creation.
#[derive(Debug, Clone)]
pub struct SurfaceContext {
    pub surface_id: SurfaceId,
    /// Where engine callbacks report to.
    pub events: EventSink,
    /// Consulted synchronously before the engine navigates on its own.
    pub gate: NavigationGate,
}

/// One embedded web view.
///
/// Every call on a destroyed surface fails with [`SurfaceError::Destroyed`]
/// except the queries and [`RenderSurface::destroy`] itself.
pub trait RenderSurface {
    fn id(&self) -> SurfaceId;

    /// Add to the compositing tree, above everything already attached.
    fn attach(&mut self) -> Result<(), SurfaceError>;
    fn detach(&mut self) -> Result<(), SurfaceError>;

    fn set_bounds(&mut self, bounds: Rect) -> Result<(), SurfaceError>;
    fn set_visible(&mut self, visible: bool) -> Result<(), SurfaceError>;
    fn set_muted(&mut self, muted: bool) -> Result<(), SurfaceError>;

    /// Start loading `url`. Returns once the load is issued; progress is
    /// reported through engine events.
    fn load_url(&mut self, url: &str) -> Result<(), SurfaceError>;
    fn go_back(&mut self) -> Result<(), SurfaceError>;
    fn go_forward(&mut self) -> Result<(), SurfaceError>;
    fn reload(&mut self) -> Result<(), SurfaceError>;
    fn stop(&mut self) -> Result<(), SurfaceError>;

    fn can_go_back(&self) -> bool;
    fn can_go_forward(&self) -> bool;
    fn is_destroyed(&self) -> bool;

    /// Release the engine resources. Idempotent.
    fn destroy(&mut self);
}

/// Allocates surfaces for the host.
pub trait SurfaceFactory {
    type Surface: RenderSurface;

    fn create(
        &mut self,
        spec: &SurfaceSpec,
        context: SurfaceContext,
    ) -> Result<Self::Surface, SurfaceError>;
}
