//! Wire protocol.
//!
//! Two directions are covered here:
//! - **Host UI <-> core**: newline-delimited JSON. The UI sends
//!   [`IpcRequest`]s (`{"id", "kind", "payload"}`) which decode into
//!   [`HostCommand`]s; the core answers with [`OutboundMessage`]s carrying
//!   replies, state pushes and host events.
//! - **Page -> surface**: the init script injected into every wry surface
//!   posts [`IpcMessage`]s for modifier clicks, `window.open` and favicons,
//!   which [`route_page_message`] turns into gate checks and engine events.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tabhost_common::{HostEvent, Rect, TabId, ViewError, ViewId};
use tracing::{debug, warn};

use crate::events::{EngineEventKind, EventSink};
use crate::host::{CreateOutcome, InitialPayload, NavAction, ViewSnapshot};
use crate::security::{Modifiers, NavigationGate, NavigationRequest, WindowDisposition};
use crate::state::StatePush;

// =============================================================================
// COMMANDS
// =============================================================================

/// A command from the host UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "camelCase")]
pub enum HostCommand {
    #[serde(rename_all = "camelCase")]
    CreateView {
        window_id: ViewId,
        bounds: Rect,
        #[serde(default)]
        initial_payload: InitialPayload,
    },
    #[serde(rename_all = "camelCase")]
    LoadUrl { window_id: ViewId, url: String },
    #[serde(rename_all = "camelCase")]
    Navigate { window_id: ViewId, action: NavAction },
    #[serde(rename_all = "camelCase")]
    SetBounds { window_id: ViewId, bounds: Rect },
    #[serde(rename_all = "camelCase")]
    SetVisibility { window_id: ViewId, visible: bool },
    #[serde(rename_all = "camelCase")]
    CreateTab {
        window_id: ViewId,
        #[serde(default)]
        url: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    SwitchTab { window_id: ViewId, tab_id: TabId },
    #[serde(rename_all = "camelCase")]
    CloseTab { window_id: ViewId, tab_id: TabId },
    SyncStackingOrder { order: Vec<ViewId> },
    #[serde(rename_all = "camelCase")]
    DestroyView { window_id: ViewId },
    Prefetch { url: String },
    #[serde(rename_all = "camelCase")]
    GetView { window_id: ViewId },
    ListViews,
}

impl HostCommand {
    /// Command name as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            HostCommand::CreateView { .. } => "createView",
            HostCommand::LoadUrl { .. } => "loadUrl",
            HostCommand::Navigate { .. } => "navigate",
            HostCommand::SetBounds { .. } => "setBounds",
            HostCommand::SetVisibility { .. } => "setVisibility",
            HostCommand::CreateTab { .. } => "createTab",
            HostCommand::SwitchTab { .. } => "switchTab",
            HostCommand::CloseTab { .. } => "closeTab",
            HostCommand::SyncStackingOrder { .. } => "syncStackingOrder",
            HostCommand::DestroyView { .. } => "destroyView",
            HostCommand::Prefetch { .. } => "prefetch",
            HostCommand::GetView { .. } => "getView",
            HostCommand::ListViews => "listViews",
        }
    }
}

/// One line received from the host UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpcRequest {
    /// Correlates the reply; requests without an id still get one.
    #[serde(default)]
    pub id: Option<u64>,
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

impl IpcRequest {
    pub fn from_json(raw: &str) -> Result<Self, ViewError> {
        serde_json::from_str(raw)
            .map_err(|e| ViewError::MalformedInput(format!("invalid request: {e}")))
    }

    /// Decode the typed command. Unknown kinds and bad payloads are
    /// `MalformedInput`.
    pub fn command(&self) -> Result<HostCommand, ViewError> {
        let mut object = serde_json::Map::new();
        object.insert("kind".into(), Value::String(self.kind.clone()));
        if !self.payload.is_null() {
            object.insert("payload".into(), self.payload.clone());
        }
        serde_json::from_value(Value::Object(object))
            .map_err(|e| ViewError::MalformedInput(format!("{}: {e}", self.kind)))
    }
}

/// Successful result of a command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum CommandReply {
    Ack,
    ViewCreated(CreateOutcome),
    TabCreated(TabId),
    /// Active tab after the close.
    TabClosed(TabId),
    /// Whether a navigation action reached the surface.
    Navigated(bool),
    StackingOrder(Vec<ViewId>),
    Destroyed(bool),
    Prefetched(bool),
    View(Option<ViewSnapshot>),
    Views(Vec<ViewId>),
}

/// One line sent to the host UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "channel", rename_all = "camelCase")]
pub enum OutboundMessage {
    Push(StatePush),
    Reply {
        id: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<CommandReply>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Event { event: HostEvent },
}

impl OutboundMessage {
    pub fn reply<E: std::fmt::Display>(id: Option<u64>, result: Result<CommandReply, E>) -> Self {
        match result {
            Ok(reply) => OutboundMessage::Reply {
                id,
                result: Some(reply),
                error: None,
            },
            Err(e) => OutboundMessage::Reply {
                id,
                result: None,
                error: Some(e.to_string()),
            },
        }
    }

    /// Serialize as one JSON line (without the newline).
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// PAGE BRIDGE
// =============================================================================

/// A message posted by the injected page script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpcMessage {
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

impl IpcMessage {
    pub fn from_json(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

#[derive(Debug, Deserialize)]
struct LinkClickPayload {
    url: String,
    #[serde(default)]
    modifiers: Modifiers,
}

#[derive(Debug, Deserialize)]
struct WindowOpenPayload {
    url: String,
    disposition: WindowDisposition,
}

#[derive(Debug, Deserialize)]
struct FaviconPayload {
    url: String,
}

/// Apply a page-script message to the surface's gate and sink. Returns
/// `true` if the message was understood.
pub fn route_page_message(raw: &str, gate: &NavigationGate, sink: &EventSink) -> bool {
    let Some(message) = IpcMessage::from_json(raw) else {
        warn!(
            surface_id = sink.surface_id().0,
            body_len = raw.len(),
            "page message rejected: invalid JSON"
        );
        return false;
    };
    let payload = message.payload;

    match message.kind.as_str() {
        "link-click" => match serde_json::from_value::<LinkClickPayload>(payload) {
            Ok(p) => {
                gate.check(&NavigationRequest::link_click(p.url, p.modifiers));
                true
            }
            Err(e) => {
                warn!(error = %e, "link-click payload malformed; dropped");
                false
            }
        },
        "window-open" => match serde_json::from_value::<WindowOpenPayload>(payload) {
            Ok(p) => {
                gate.check(&NavigationRequest::window_open(p.url, p.disposition));
                true
            }
            Err(e) => {
                warn!(error = %e, "window-open payload malformed; dropped");
                false
            }
        },
        "favicon" => match serde_json::from_value::<FaviconPayload>(payload) {
            Ok(p) => {
                sink.emit(EngineEventKind::FaviconUpdated { url: p.url });
                true
            }
            Err(e) => {
                warn!(error = %e, "favicon payload malformed; dropped");
                false
            }
        },
        other => {
            debug!(kind = %other, "unhandled page message");
            false
        }
    }
}

/// Injected into every wry surface. Reports modifier clicks, `window.open`
/// and the page favicon; the modified click itself is cancelled in-page.
pub const PAGE_INIT_SCRIPT: &str = r#"
(function() {
    if (window.__tabhost) return;
    window.__tabhost = true;

    function post(kind, payload) {
        try {
            window.ipc.postMessage(JSON.stringify({ kind: kind, payload: payload }));
        } catch (e) {}
    }

    document.addEventListener('click', function(ev) {
        if (!(ev.metaKey || ev.ctrlKey)) return;
        var el = ev.target;
        while (el && el.tagName !== 'A') el = el.parentElement;
        if (!el || !el.href) return;
        ev.preventDefault();
        ev.stopPropagation();
        post('link-click', {
            url: el.href,
            modifiers: { ctrl: ev.ctrlKey, meta: ev.metaKey, shift: ev.shiftKey, alt: ev.altKey }
        });
    }, true);

    window.open = function(url, target) {
        var resolved;
        try { resolved = new URL(url, location.href).href; } catch (e) { resolved = String(url); }
        var t = (target || '_blank').toLowerCase();
        var disposition = (t === '_self' || t === '_top' || t === '_parent') ? 'current-tab' : 'foreground-tab';
        post('window-open', { url: resolved, disposition: disposition });
        return null;
    };

    function reportFavicon() {
        var link = document.querySelector('link[rel~="icon"]');
        var href = link ? link.href : new URL('/favicon.ico', location.href).href;
        post('favicon', { url: href });
    }
    if (document.readyState === 'loading') {
        document.addEventListener('DOMContentLoaded', reportFavicon);
    } else {
        reportFavicon();
    }
})();
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EngineEventQueue;
    use crate::security::SecurityInterceptor;
    use crate::state::ViewPatch;
    use tabhost_common::SurfaceId;

    fn request(raw: &str) -> HostCommand {
        IpcRequest::from_json(raw).unwrap().command().unwrap()
    }

    #[test]
    fn decodes_create_view_with_defaults() {
        let cmd = request(
            r#"{"id":1,"kind":"createView","payload":{"windowId":"w1","bounds":{"x":0,"y":0,"width":800,"height":600}}}"#,
        );
        match cmd {
            HostCommand::CreateView {
                window_id,
                bounds,
                initial_payload,
            } => {
                assert_eq!(window_id, ViewId::from("w1"));
                assert_eq!(bounds.width, 800.0);
                assert_eq!(initial_payload, InitialPayload::default());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn decodes_navigate_action() {
        let cmd = request(r#"{"kind":"navigate","payload":{"windowId":"w1","action":"back"}}"#);
        assert_eq!(
            cmd,
            HostCommand::Navigate {
                window_id: ViewId::from("w1"),
                action: NavAction::Back,
            }
        );
        assert_eq!(cmd.kind(), "navigate");
    }

    #[test]
    fn decodes_unit_command_without_payload() {
        assert_eq!(request(r#"{"kind":"listViews"}"#), HostCommand::ListViews);
    }

    #[test]
    fn unknown_kind_is_malformed() {
        let req = IpcRequest::from_json(r#"{"kind":"selfDestruct","payload":{}}"#).unwrap();
        assert!(matches!(req.command(), Err(ViewError::MalformedInput(_))));
    }

    #[test]
    fn missing_field_is_malformed() {
        let req = IpcRequest::from_json(r#"{"kind":"loadUrl","payload":{"windowId":"w1"}}"#).unwrap();
        let err = req.command().unwrap_err();
        assert!(err.to_string().contains("loadUrl"));
    }

    #[test]
    fn garbage_line_is_malformed() {
        assert!(matches!(
            IpcRequest::from_json("not json"),
            Err(ViewError::MalformedInput(_))
        ));
    }

    #[test]
    fn reply_encodes_result_or_error() {
        let ok = OutboundMessage::reply::<ViewError>(
            Some(3),
            Ok(CommandReply::TabCreated(TabId::from("t2"))),
        );
        let json: Value = serde_json::from_str(&ok.encode().unwrap()).unwrap();
        assert_eq!(json["channel"], "reply");
        assert_eq!(json["id"], 3);
        assert_eq!(json["result"]["kind"], "tabCreated");
        assert_eq!(json["result"]["value"], "t2");
        assert!(json.get("error").is_none());

        let err = OutboundMessage::reply(None, Err(ViewError::ViewNotFound(ViewId::from("w9"))));
        let json: Value = serde_json::from_str(&err.encode().unwrap()).unwrap();
        assert_eq!(json["error"], "view not found: w9");
        assert!(json["id"].is_null());
    }

    #[test]
    fn push_and_event_channels() {
        let push = OutboundMessage::Push(StatePush {
            window_id: ViewId::from("w1"),
            patch: ViewPatch::loading(true),
        });
        let json: Value = serde_json::from_str(&push.encode().unwrap()).unwrap();
        assert_eq!(json["channel"], "push");
        assert_eq!(json["windowId"], "w1");
        assert_eq!(json["patch"]["isLoading"], true);

        let event = OutboundMessage::Event {
            event: HostEvent::ViewDestroyed(ViewId::from("w1")),
        };
        let json: Value = serde_json::from_str(&event.encode().unwrap()).unwrap();
        assert_eq!(json["channel"], "event");
        assert_eq!(json["event"]["type"], "ViewDestroyed");
    }

    fn gate_and_sink(queue: &EngineEventQueue) -> (NavigationGate, EventSink) {
        let sink = queue.sink_for(SurfaceId(1));
        (
            NavigationGate::new(SecurityInterceptor::default(), sink.clone()),
            sink,
        )
    }

    #[test]
    fn page_link_click_with_modifier_requests_external_open() {
        let queue = EngineEventQueue::new();
        let (gate, sink) = gate_and_sink(&queue);
        let raw = r#"{"kind":"link-click","payload":{"url":"https://b.com/","modifiers":{"meta":true}}}"#;
        assert!(route_page_message(raw, &gate, &sink));

        let events = queue.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].kind,
            EngineEventKind::ExternalOpenRequested {
                url: "https://b.com/".into()
            }
        );
    }

    #[test]
    fn page_window_open_self_loads_in_place() {
        let queue = EngineEventQueue::new();
        let (gate, sink) = gate_and_sink(&queue);
        let raw = r#"{"kind":"window-open","payload":{"url":"https://c.com/","disposition":"current-tab"}}"#;
        assert!(route_page_message(raw, &gate, &sink));
        assert_eq!(
            queue.drain()[0].kind,
            EngineEventKind::LoadInPlaceRequested {
                url: "https://c.com/".into()
            }
        );
    }

    #[test]
    fn page_favicon_is_forwarded() {
        let queue = EngineEventQueue::new();
        let (gate, sink) = gate_and_sink(&queue);
        let raw = r#"{"kind":"favicon","payload":{"url":"https://a.com/favicon.ico"}}"#;
        assert!(route_page_message(raw, &gate, &sink));
        assert_eq!(
            queue.drain()[0].kind,
            EngineEventKind::FaviconUpdated {
                url: "https://a.com/favicon.ico".into()
            }
        );
    }

    #[test]
    fn malformed_page_messages_are_dropped() {
        let queue = EngineEventQueue::new();
        let (gate, sink) = gate_and_sink(&queue);
        assert!(!route_page_message("{", &gate, &sink));
        assert!(!route_page_message(r#"{"kind":"link-click","payload":{}}"#, &gate, &sink));
        assert!(!route_page_message(r#"{"kind":"mystery"}"#, &gate, &sink));
        assert!(queue.is_empty());
    }
}
