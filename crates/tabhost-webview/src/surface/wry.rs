//! Child-webview backend on top of `wry`.
//!
//! Every surface is a `wry::WebView` built as a child of the host window.
//! Engine callbacks are turned into engine events on the surface's sink;
//! navigation callbacks consult the surface's gate synchronously.
//!
//! wry exposes no compositing tree, so attach/detach map to visibility and
//! the host's stacking order is best effort. History is tracked from
//! page-load callbacks, and back/forward/stop/mute go through script.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use tabhost_common::{Rect, SurfaceError, SurfaceId};
use tracing::{debug, warn};
use wry::raw_window_handle::HasWindowHandle;
use wry::{PageLoadEvent, WebContext, WebView, WebViewBuilder};

use crate::events::{EngineEventKind, PageLoadState};
use crate::ipc::{route_page_message, PAGE_INIT_SCRIPT};
use crate::security::{NavigationRequest, WindowDisposition};

use super::{RenderSurface, SurfaceContext, SurfaceFactory, SurfaceSpec};

const MUTE_SCRIPT: &str =
    "document.querySelectorAll('audio,video').forEach(function(m){m.muted=true;});";
const UNMUTE_SCRIPT: &str =
    "document.querySelectorAll('audio,video').forEach(function(m){m.muted=false;});";

fn engine_err(e: wry::Error) -> SurfaceError {
    SurfaceError::Engine(e.to_string())
}

fn to_wry_rect(rect: Rect) -> wry::Rect {
    wry::Rect {
        position: wry::dpi::Position::Logical(wry::dpi::LogicalPosition::new(rect.x, rect.y)),
        size: wry::dpi::Size::Logical(wry::dpi::LogicalSize::new(rect.width, rect.height)),
    }
}

/// Back/forward stack reconstructed from committed page loads.
#[derive(Debug, Default)]
struct History {
    entries: Vec<String>,
    index: usize,
}

impl History {
    fn commit(&mut self, url: &str) {
        let current = self.entries.get(self.index).map(String::as_str);
        if current == Some(url) {
            return;
        }
        if self.index > 0 && self.entries.get(self.index - 1).map(String::as_str) == Some(url) {
            self.index -= 1;
            return;
        }
        if self.entries.get(self.index + 1).map(String::as_str) == Some(url) {
            self.index += 1;
            return;
        }
        if !self.entries.is_empty() {
            self.entries.truncate(self.index + 1);
        }
        self.entries.push(url.to_string());
        self.index = self.entries.len() - 1;
    }

    fn can_go_back(&self) -> bool {
        self.index > 0
    }

    fn can_go_forward(&self) -> bool {
        self.index + 1 < self.entries.len()
    }
}

// =============================================================================
// FACTORY
// =============================================================================

/// Builds child webviews of one host window.
pub struct WryFactory<W: HasWindowHandle> {
    window: Arc<W>,
    /// Root of per-partition storage. `None` makes every surface incognito.
    data_root: Option<PathBuf>,
    contexts: HashMap<String, WebContext>,
}

impl<W: HasWindowHandle> WryFactory<W> {
    pub fn new(window: Arc<W>, data_root: Option<PathBuf>) -> Self {
        Self {
            window,
            data_root,
            contexts: HashMap::new(),
        }
    }
}

fn partition_dir(partition: &str) -> String {
    partition
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

impl<W: HasWindowHandle> SurfaceFactory for WryFactory<W> {
    type Surface = WrySurface;

    fn create(
        &mut self,
        spec: &SurfaceSpec,
        context: SurfaceContext,
    ) -> Result<WrySurface, SurfaceError> {
        let SurfaceContext {
            surface_id,
            events,
            gate,
        } = context;
        let history = Arc::new(Mutex::new(History::default()));

        let mut builder = match &self.data_root {
            Some(root) => {
                let dir = root.join(partition_dir(&spec.partition));
                let web_context = self
                    .contexts
                    .entry(spec.partition.clone())
                    .or_insert_with(|| WebContext::new(Some(dir)));
                WebViewBuilder::with_web_context(web_context)
            }
            None => WebViewBuilder::new().with_incognito(true),
        };

        builder = builder
            .with_bounds(to_wry_rect(spec.bounds))
            .with_visible(spec.visible)
            .with_devtools(spec.devtools)
            .with_focused(false)
            .with_initialization_script(PAGE_INIT_SCRIPT);
        if let Some(ua) = &spec.user_agent {
            builder = builder.with_user_agent(ua);
        }
        if spec.muted {
            builder = builder.with_initialization_script(MUTE_SCRIPT);
        }

        // Page script -> gate / sink
        let (ipc_gate, ipc_sink) = (gate.clone(), events.clone());
        builder = builder.with_ipc_handler(move |request| {
            route_page_message(request.body(), &ipc_gate, &ipc_sink);
        });

        let (load_sink, load_history) = (events.clone(), Arc::clone(&history));
        builder = builder.with_on_page_load_handler(move |event: PageLoadEvent, url| {
            let state = PageLoadState::from(event);
            debug!(surface_id = surface_id.0, ?state, url = %url, "page load");
            load_sink.emit(EngineEventKind::from(state));
            if state == PageLoadState::Started {
                load_history
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .commit(&url);
                load_sink.emit(EngineEventKind::DidNavigate { url });
            }
        });

        let title_sink = events.clone();
        builder = builder.with_document_title_changed_handler(move |title| {
            title_sink.emit(EngineEventKind::TitleUpdated { title });
        });

        let nav_gate = gate.clone();
        builder = builder
            .with_navigation_handler(move |url| nav_gate.check(&NavigationRequest::navigation(url)));

        // Native windows are never created.
        let popup_gate = gate;
        builder = builder.with_new_window_req_handler(move |url| {
            popup_gate.check(&NavigationRequest::window_open(
                url,
                WindowDisposition::ForegroundTab,
            ));
            false
        });

        if let Some(url) = &spec.url {
            builder = builder.with_url(url);
        }

        let webview = builder
            .build_as_child(&*self.window)
            .map_err(|e| SurfaceError::Creation(e.to_string()))?;
        debug!(surface_id = surface_id.0, label = %spec.label, "wry surface created");

        Ok(WrySurface {
            id: surface_id,
            webview: Some(webview),
            history,
            events_label: spec.label.clone(),
            attached: false,
        })
    }
}

// =============================================================================
// SURFACE
// =============================================================================

pub struct WrySurface {
    id: SurfaceId,
    webview: Option<WebView>,
    history: Arc<Mutex<History>>,
    events_label: String,
    attached: bool,
}

impl WrySurface {
    fn webview(&self) -> Result<&WebView, SurfaceError> {
        self.webview.as_ref().ok_or(SurfaceError::Destroyed)
    }

    fn script(&self, js: &str) -> Result<(), SurfaceError> {
        self.webview()?.evaluate_script(js).map_err(engine_err)
    }

    fn history_flag(&self, f: impl FnOnce(&History) -> bool) -> bool {
        self.webview.is_some() && f(&self.history.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl RenderSurface for WrySurface {
    fn id(&self) -> SurfaceId {
        self.id
    }

    fn attach(&mut self) -> Result<(), SurfaceError> {
        self.webview()?.set_visible(true).map_err(engine_err)?;
        self.attached = true;
        Ok(())
    }

    fn detach(&mut self) -> Result<(), SurfaceError> {
        if !self.attached {
            return Err(SurfaceError::NotAttached);
        }
        self.webview()?.set_visible(false).map_err(engine_err)?;
        self.attached = false;
        Ok(())
    }

    fn set_bounds(&mut self, bounds: Rect) -> Result<(), SurfaceError> {
        self.webview()?
            .set_bounds(to_wry_rect(bounds))
            .map_err(engine_err)
    }

    fn set_visible(&mut self, visible: bool) -> Result<(), SurfaceError> {
        self.webview()?.set_visible(visible).map_err(engine_err)
    }

    fn set_muted(&mut self, muted: bool) -> Result<(), SurfaceError> {
        self.script(if muted { MUTE_SCRIPT } else { UNMUTE_SCRIPT })
    }

    fn load_url(&mut self, url: &str) -> Result<(), SurfaceError> {
        self.webview()?.load_url(url).map_err(engine_err)
    }

    fn go_back(&mut self) -> Result<(), SurfaceError> {
        self.script("history.back();")
    }

    fn go_forward(&mut self) -> Result<(), SurfaceError> {
        self.script("history.forward();")
    }

    fn reload(&mut self) -> Result<(), SurfaceError> {
        self.script("location.reload();")
    }

    fn stop(&mut self) -> Result<(), SurfaceError> {
        self.script("window.stop();")
    }

    fn can_go_back(&self) -> bool {
        self.history_flag(History::can_go_back)
    }

    fn can_go_forward(&self) -> bool {
        self.history_flag(History::can_go_forward)
    }

    fn is_destroyed(&self) -> bool {
        self.webview.is_none()
    }

    fn destroy(&mut self) {
        if let Some(webview) = self.webview.take() {
            if let Err(e) = webview.set_visible(false) {
                warn!(surface_id = self.id.0, error = %e, "hide before release failed");
            }
            drop(webview);
            debug!(surface_id = self.id.0, label = %self.events_label, "wry surface released");
        }
    }
}
