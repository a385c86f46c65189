//! View orchestration core for tabbed, embedded web surfaces.
//!
//! Provides:
//! - A `RenderSurface` capability with headless and wry backends
//! - `ViewHost`: view registry, tab store, navigation, compositing order,
//!   teardown and prefetch, all driven from one control thread
//! - Coalesced state pushes to the host UI
//! - Interception of outbound navigation (external-open, blocklist)
//! - A JSON command protocol for driving the host over IPC

pub mod activity;
pub mod events;
pub mod host;
pub mod ipc;
pub mod security;
pub mod state;
pub mod surface;
pub mod tab_store;

pub use activity::{spawn_activity_forwarder, ActivityError, ActivityLog, TracingActivityLog};
pub use events::{EngineEvent, EngineEventKind, EngineEventQueue, EventSink, PageLoadState};
pub use host::{
    CreateOutcome, HostOptions, InitialPayload, NavAction, ShutdownReport, TabSeed, ViewHandle,
    ViewHost, ViewSnapshot,
};
pub use ipc::{
    route_page_message, CommandReply, HostCommand, IpcMessage, IpcRequest, OutboundMessage,
    PAGE_INIT_SCRIPT,
};
pub use security::{
    Modifiers, NavigationGate, NavigationRequest, NavigationTrigger, SecurityInterceptor, Verdict,
    WindowDisposition,
};
pub use state::{NavigationState, StatePush, Tab, ViewPatch};
pub use surface::headless::{HeadlessFactory, HeadlessProbe, HeadlessSurface, SurfaceJournal};
#[cfg(feature = "wry")]
pub use surface::wry::{WryFactory, WrySurface};
pub use surface::{RenderSurface, SurfaceContext, SurfaceFactory, SurfaceSpec};
pub use tab_store::{CloseOutcome, TabSet, TabStateStore};
