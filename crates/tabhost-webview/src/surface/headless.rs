//! Engine-less surface backend.
//!
//! Surfaces keep a simulated history and report the same engine events a
//! real engine would, instantly. All state lives in a shared
//! [`HeadlessProbe`], which also lets callers inspect the compositing tree,
//! read per-surface call journals and inject engine-side happenings
//! (crashes, link clicks, failing URLs).

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tabhost_common::{Rect, SurfaceError, SurfaceId};
use tracing::debug;

use crate::events::{EngineEventKind, EventSink};
use crate::security::{NavigationGate, NavigationRequest};

use super::{RenderSurface, SurfaceContext, SurfaceFactory, SurfaceSpec};

/// Calls a headless surface has received.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceJournal {
    pub attaches: usize,
    pub detaches: usize,
    /// Every URL committed through `load_url` or the `SurfaceSpec` URL.
    pub loads: Vec<String>,
    pub backs: usize,
    pub forwards: usize,
    pub reloads: usize,
    pub stops: usize,
    pub mutes: usize,
    pub destroys: usize,
    pub muted: bool,
    pub visible: bool,
    pub bounds: Rect,
}

impl SurfaceJournal {
    fn new(spec: &SurfaceSpec) -> Self {
        Self {
            attaches: 0,
            detaches: 0,
            loads: Vec::new(),
            backs: 0,
            forwards: 0,
            reloads: 0,
            stops: 0,
            mutes: 0,
            destroys: 0,
            muted: spec.muted,
            visible: spec.visible,
            bounds: spec.bounds,
        }
    }
}

struct SurfaceRecord {
    spec: SurfaceSpec,
    sink: EventSink,
    gate: NavigationGate,
    journal: SurfaceJournal,
    history: Vec<String>,
    index: usize,
    destroyed: bool,
}

impl SurfaceRecord {
    /// Commit a navigation to `url`, dropping any forward history.
    fn commit(&mut self, url: &str) {
        if !self.history.is_empty() {
            self.history.truncate(self.index + 1);
        }
        self.history.push(url.to_string());
        self.index = self.history.len() - 1;
        self.report_navigation(url);
    }

    fn report_navigation(&self, url: &str) {
        self.sink.emit(EngineEventKind::LoadStarted);
        self.sink.emit(EngineEventKind::DidNavigate {
            url: url.to_string(),
        });
        self.sink.emit(EngineEventKind::LoadStopped);
    }

    fn current(&self) -> Option<&str> {
        self.history.get(self.index).map(String::as_str)
    }
}

#[derive(Default)]
struct ProbeState {
    surfaces: HashMap<SurfaceId, SurfaceRecord>,
    tree: Vec<SurfaceId>,
    created: Vec<SurfaceId>,
    failing_urls: HashSet<String>,
    fail_next_creation: bool,
}

/// Shared view into every surface a [`HeadlessFactory`] has produced.
#[derive(Clone, Default)]
pub struct HeadlessProbe {
    state: Arc<Mutex<ProbeState>>,
}

impl HeadlessProbe {
    fn lock(&self) -> MutexGuard<'_, ProbeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn journal(&self, id: SurfaceId) -> Option<SurfaceJournal> {
        self.lock().surfaces.get(&id).map(|r| r.journal.clone())
    }

    pub fn spec(&self, id: SurfaceId) -> Option<SurfaceSpec> {
        self.lock().surfaces.get(&id).map(|r| r.spec.clone())
    }

    /// Attached surfaces in attach order; the last one is drawn on top.
    pub fn compositing_order(&self) -> Vec<SurfaceId> {
        self.lock().tree.clone()
    }

    /// Every surface ever created, in creation order.
    pub fn created(&self) -> Vec<SurfaceId> {
        self.lock().created.clone()
    }

    /// Surfaces not yet destroyed.
    pub fn live_count(&self) -> usize {
        self.lock().surfaces.values().filter(|r| !r.destroyed).count()
    }

    /// URL currently displayed by `id`.
    pub fn current_url(&self, id: SurfaceId) -> Option<String> {
        self.lock()
            .surfaces
            .get(&id)
            .and_then(|r| r.current().map(str::to_string))
    }

    /// Make every later `load_url(url)` fail with an engine error.
    pub fn fail_loads_of(&self, url: impl Into<String>) {
        self.lock().failing_urls.insert(url.into());
    }

    /// Make the next `create` call fail.
    pub fn fail_next_creation(&self) {
        self.lock().fail_next_creation = true;
    }

    /// Report that the surface's render process died.
    pub fn crash(&self, id: SurfaceId, reason: impl Into<String>) {
        self.emit(
            id,
            EngineEventKind::RenderProcessGone {
                reason: reason.into(),
            },
        );
    }

    /// Push an arbitrary engine event as if the surface had produced it.
    pub fn emit(&self, id: SurfaceId, kind: EngineEventKind) {
        if let Some(record) = self.lock().surfaces.get(&id) {
            record.sink.emit(kind);
        }
    }

    /// Have the page start a navigation on its own (link click,
    /// `window.open`, script). The request goes through the surface's gate;
    /// if allowed, it is committed to the surface history. Returns whether
    /// the engine navigated.
    pub fn simulate_navigation(&self, id: SurfaceId, request: &NavigationRequest) -> bool {
        let mut state = self.lock();
        let Some(record) = state.surfaces.get_mut(&id) else {
            return false;
        };
        if record.destroyed || !record.gate.check(request) {
            return false;
        }
        record.commit(&request.url);
        true
    }

    /// Flag the surface as destroyed behind its owner's back, as an engine
    /// whose process vanished would.
    pub fn mark_destroyed(&self, id: SurfaceId) {
        let mut state = self.lock();
        if let Some(record) = state.surfaces.get_mut(&id) {
            record.destroyed = true;
        }
        state.tree.retain(|s| *s != id);
    }
}

/// Produces [`HeadlessSurface`]s that all report into one probe.
#[derive(Clone, Default)]
pub struct HeadlessFactory {
    probe: HeadlessProbe,
}

impl HeadlessFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe(&self) -> HeadlessProbe {
        self.probe.clone()
    }
}

impl SurfaceFactory for HeadlessFactory {
    type Surface = HeadlessSurface;

    fn create(
        &mut self,
        spec: &SurfaceSpec,
        context: SurfaceContext,
    ) -> Result<HeadlessSurface, SurfaceError> {
        let mut state = self.probe.lock();
        if std::mem::take(&mut state.fail_next_creation) {
            return Err(SurfaceError::Creation(format!(
                "headless backend refused {}",
                spec.label
            )));
        }

        let id = context.surface_id;
        let mut record = SurfaceRecord {
            spec: spec.clone(),
            sink: context.events,
            gate: context.gate,
            journal: SurfaceJournal::new(spec),
            history: Vec::new(),
            index: 0,
            destroyed: false,
        };
        if let Some(url) = &spec.url {
            record.journal.loads.push(url.clone());
            record.commit(url);
        }
        state.surfaces.insert(id, record);
        state.created.push(id);
        debug!(surface_id = id.0, label = %spec.label, "headless surface created");

        Ok(HeadlessSurface {
            id,
            probe: self.probe.clone(),
        })
    }
}

/// A surface with no engine behind it.
pub struct HeadlessSurface {
    id: SurfaceId,
    probe: HeadlessProbe,
}

impl HeadlessSurface {
    /// Run `f` on this surface's live record.
    fn with_live<T>(
        &self,
        f: impl FnOnce(&mut ProbeState, SurfaceId) -> Result<T, SurfaceError>,
    ) -> Result<T, SurfaceError> {
        let mut state = self.probe.lock();
        let live = state.surfaces.get(&self.id).is_some_and(|r| !r.destroyed);
        if !live {
            return Err(SurfaceError::Destroyed);
        }
        f(&mut state, self.id)
    }

    fn with_record<T>(
        &self,
        f: impl FnOnce(&mut SurfaceRecord) -> Result<T, SurfaceError>,
    ) -> Result<T, SurfaceError> {
        self.with_live(|state, id| match state.surfaces.get_mut(&id) {
            Some(record) => f(record),
            None => Err(SurfaceError::Destroyed),
        })
    }

    fn query(&self, f: impl FnOnce(&SurfaceRecord) -> bool) -> bool {
        self.probe
            .lock()
            .surfaces
            .get(&self.id)
            .is_some_and(|r| !r.destroyed && f(r))
    }
}

impl RenderSurface for HeadlessSurface {
    fn id(&self) -> SurfaceId {
        self.id
    }

    fn attach(&mut self) -> Result<(), SurfaceError> {
        self.with_live(|state, id| {
            state.tree.retain(|s| *s != id);
            state.tree.push(id);
            if let Some(record) = state.surfaces.get_mut(&id) {
                record.journal.attaches += 1;
            }
            Ok(())
        })
    }

    fn detach(&mut self) -> Result<(), SurfaceError> {
        self.with_live(|state, id| {
            let before = state.tree.len();
            state.tree.retain(|s| *s != id);
            if state.tree.len() == before {
                return Err(SurfaceError::NotAttached);
            }
            if let Some(record) = state.surfaces.get_mut(&id) {
                record.journal.detaches += 1;
            }
            Ok(())
        })
    }

    fn set_bounds(&mut self, bounds: Rect) -> Result<(), SurfaceError> {
        self.with_record(|r| {
            r.journal.bounds = bounds;
            Ok(())
        })
    }

    fn set_visible(&mut self, visible: bool) -> Result<(), SurfaceError> {
        self.with_record(|r| {
            r.journal.visible = visible;
            Ok(())
        })
    }

    fn set_muted(&mut self, muted: bool) -> Result<(), SurfaceError> {
        self.with_record(|r| {
            r.journal.mutes += 1;
            r.journal.muted = muted;
            Ok(())
        })
    }

    fn load_url(&mut self, url: &str) -> Result<(), SurfaceError> {
        self.with_live(|state, id| {
            let failing = state.failing_urls.contains(url);
            let Some(record) = state.surfaces.get_mut(&id) else {
                return Err(SurfaceError::Destroyed);
            };
            record.journal.loads.push(url.to_string());
            if failing {
                return Err(SurfaceError::Engine(format!(
                    "ERR_CONNECTION_REFUSED ({url})"
                )));
            }
            record.commit(url);
            Ok(())
        })
    }

    fn go_back(&mut self) -> Result<(), SurfaceError> {
        self.with_record(|r| {
            if r.index == 0 || r.history.is_empty() {
                return Ok(());
            }
            r.journal.backs += 1;
            r.index -= 1;
            let url = r.history[r.index].clone();
            r.report_navigation(&url);
            Ok(())
        })
    }

    fn go_forward(&mut self) -> Result<(), SurfaceError> {
        self.with_record(|r| {
            if r.index + 1 >= r.history.len() {
                return Ok(());
            }
            r.journal.forwards += 1;
            r.index += 1;
            let url = r.history[r.index].clone();
            r.report_navigation(&url);
            Ok(())
        })
    }

    fn reload(&mut self) -> Result<(), SurfaceError> {
        self.with_record(|r| {
            r.journal.reloads += 1;
            if r.current().is_some() {
                r.sink.emit(EngineEventKind::LoadStarted);
                r.sink.emit(EngineEventKind::LoadStopped);
            }
            Ok(())
        })
    }

    fn stop(&mut self) -> Result<(), SurfaceError> {
        self.with_record(|r| {
            r.journal.stops += 1;
            Ok(())
        })
    }

    fn can_go_back(&self) -> bool {
        self.query(|r| r.index > 0)
    }

    fn can_go_forward(&self) -> bool {
        self.query(|r| r.index + 1 < r.history.len())
    }

    fn is_destroyed(&self) -> bool {
        !self.query(|_| true)
    }

    fn destroy(&mut self) {
        let mut state = self.probe.lock();
        let id = self.id;
        let Some(record) = state.surfaces.get_mut(&id) else {
            return;
        };
        record.journal.destroys += 1;
        if record.destroyed {
            return;
        }
        record.destroyed = true;
        state.tree.retain(|s| *s != id);
        debug!(surface_id = id.0, "headless surface destroyed");
    }
}
