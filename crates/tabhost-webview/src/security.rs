//! Outbound navigation policy.
//!
//! Decides, for every navigation a surface is about to perform, whether it
//! stays inside the embedded view, escapes to the host application, or is
//! cancelled. The decision is a pure function of the request and the
//! blocklist, so it is testable without an engine.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::events::{EngineEventKind, EventSink};

// =============================================================================
// REQUEST TYPES
// =============================================================================

/// Keyboard modifiers held during a link click.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        meta: false,
        shift: false,
        alt: false,
    };

    /// Cmd (macOS) or Ctrl (elsewhere) sends the click to the host.
    pub fn opens_externally(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// Where a `window.open` asked for the new content to go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindowDisposition {
    ForegroundTab,
    BackgroundTab,
    NewWindow,
    CurrentTab,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationTrigger {
    /// Script, form or address navigation inside the page.
    Navigation,
    LinkClick { modifiers: Modifiers },
    WindowOpen { disposition: WindowDisposition },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationRequest {
    pub url: String,
    pub trigger: NavigationTrigger,
}

impl NavigationRequest {
    pub fn navigation(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            trigger: NavigationTrigger::Navigation,
        }
    }

    pub fn link_click(url: impl Into<String>, modifiers: Modifiers) -> Self {
        Self {
            url: url.into(),
            trigger: NavigationTrigger::LinkClick { modifiers },
        }
    }

    pub fn window_open(url: impl Into<String>, disposition: WindowDisposition) -> Self {
        Self {
            url: url.into(),
            trigger: NavigationTrigger::WindowOpen { disposition },
        }
    }
}

/// Outcome of [`SecurityInterceptor::decide`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Let the engine navigate unmodified.
    Allow,
    /// Host is on the blocklist; cancel.
    Block { host: String },
    /// Cancel in-engine navigation and hand the URL to the host.
    OpenExternally { url: String },
    /// Deny the new window but load the URL in the originating view.
    LoadInPlace { url: String },
    /// Undecodable target; log and drop.
    Drop { reason: String },
}

impl Verdict {
    /// Whether the engine itself may go ahead with the navigation.
    pub fn allows_engine(&self) -> bool {
        matches!(self, Verdict::Allow)
    }
}

// =============================================================================
// INTERCEPTOR
// =============================================================================

/// Navigation policy shared by every surface.
#[derive(Debug, Clone)]
pub struct SecurityInterceptor {
    blocked: Arc<[String]>,
}

impl Default for SecurityInterceptor {
    fn default() -> Self {
        Self {
            blocked: Arc::from(Vec::new()),
        }
    }
}

impl SecurityInterceptor {
    /// Build from a list of blocked hosts. Subdomains of each host are
    /// blocked as well.
    pub fn new<I, S>(blocked_domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let blocked: Vec<String> = blocked_domains
            .into_iter()
            .map(|d| d.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        Self {
            blocked: blocked.into(),
        }
    }

    pub fn blocked_domains(&self) -> &[String] {
        &self.blocked
    }

    /// The blocklist entry matching `url`'s host, if any. Unparseable URLs
    /// and URLs without a host never match.
    pub fn blocked_host(&self, url: &str) -> Option<String> {
        let parsed = Url::parse(url.trim()).ok()?;
        let host = parsed.host_str()?.to_ascii_lowercase();
        self.blocked
            .iter()
            .find(|domain| {
                host == **domain
                    || (host.len() > domain.len()
                        && host.ends_with(domain.as_str())
                        && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
            })
            .map(|_| host)
    }

    /// Apply the policy table to one request.
    pub fn decide(&self, request: &NavigationRequest) -> Verdict {
        let escapes = match request.trigger {
            NavigationTrigger::Navigation => false,
            NavigationTrigger::LinkClick { modifiers } => modifiers.opens_externally(),
            NavigationTrigger::WindowOpen { .. } => true,
        };

        if !escapes {
            return match self.blocked_host(&request.url) {
                Some(host) => Verdict::Block { host },
                None => Verdict::Allow,
            };
        }

        let url = request.url.trim();
        if let Err(e) = Url::parse(url) {
            return Verdict::Drop {
                reason: format!("undecodable url {url:?}: {e}"),
            };
        }
        if let Some(host) = self.blocked_host(url) {
            return Verdict::Block { host };
        }

        match request.trigger {
            NavigationTrigger::WindowOpen {
                disposition: WindowDisposition::CurrentTab,
            } => Verdict::LoadInPlace {
                url: url.to_string(),
            },
            _ => Verdict::OpenExternally {
                url: url.to_string(),
            },
        }
    }
}

// =============================================================================
// GATE
// =============================================================================

/// The interceptor bound to one surface's event sink.
///
/// Backends call [`NavigationGate::check`] synchronously from the engine's
/// navigation callback; side effects travel to the control thread as engine
/// events.
#[derive(Debug, Clone)]
pub struct NavigationGate {
    interceptor: SecurityInterceptor,
    sink: EventSink,
}

impl NavigationGate {
    pub fn new(interceptor: SecurityInterceptor, sink: EventSink) -> Self {
        Self { interceptor, sink }
    }

    /// Returns whether the engine may perform the navigation itself.
    pub fn check(&self, request: &NavigationRequest) -> bool {
        let surface_id = self.sink.surface_id().0;
        let verdict = self.interceptor.decide(request);
        match &verdict {
            Verdict::Allow => {
                debug!(surface_id, url = %request.url, "navigation allowed");
            }
            Verdict::Block { host } => {
                warn!(surface_id, host = %host, "navigation blocked: host on blocklist");
            }
            Verdict::OpenExternally { url } => {
                debug!(surface_id, url = %url, "navigation redirected to host");
                self.sink
                    .emit(EngineEventKind::ExternalOpenRequested { url: url.clone() });
            }
            Verdict::LoadInPlace { url } => {
                debug!(surface_id, url = %url, "window.open folded into current view");
                self.sink
                    .emit(EngineEventKind::LoadInPlaceRequested { url: url.clone() });
            }
            Verdict::Drop { reason } => {
                warn!(surface_id, reason = %reason, "external-open dropped");
            }
        }
        verdict.allows_engine()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EngineEventQueue;
    use tabhost_common::SurfaceId;

    fn ctrl() -> Modifiers {
        Modifiers {
            ctrl: true,
            ..Modifiers::NONE
        }
    }

    fn interceptor() -> SecurityInterceptor {
        SecurityInterceptor::new(["doubleclick.net", "Ads.Example.com"])
    }

    // -- Decision table --

    #[test]
    fn regular_navigation_is_allowed() {
        let verdict = interceptor().decide(&NavigationRequest::navigation("https://a.com/page"));
        assert_eq!(verdict, Verdict::Allow);
    }

    #[test]
    fn plain_link_click_is_allowed() {
        let req = NavigationRequest::link_click("https://a.com/next", Modifiers::NONE);
        assert_eq!(interceptor().decide(&req), Verdict::Allow);
    }

    #[test]
    fn shift_or_alt_click_stays_in_view() {
        let req = NavigationRequest::link_click(
            "https://a.com/next",
            Modifiers {
                shift: true,
                alt: true,
                ..Modifiers::NONE
            },
        );
        assert_eq!(interceptor().decide(&req), Verdict::Allow);
    }

    #[test]
    fn ctrl_click_opens_externally() {
        let req = NavigationRequest::link_click("https://b.com/", ctrl());
        assert_eq!(
            interceptor().decide(&req),
            Verdict::OpenExternally {
                url: "https://b.com/".into()
            }
        );
    }

    #[test]
    fn meta_click_opens_externally() {
        let req = NavigationRequest::link_click(
            "https://b.com/",
            Modifiers {
                meta: true,
                ..Modifiers::NONE
            },
        );
        assert!(matches!(
            interceptor().decide(&req),
            Verdict::OpenExternally { .. }
        ));
    }

    #[test]
    fn window_open_tabs_open_externally() {
        for disposition in [
            WindowDisposition::ForegroundTab,
            WindowDisposition::BackgroundTab,
            WindowDisposition::NewWindow,
            WindowDisposition::Other,
        ] {
            let req = NavigationRequest::window_open("https://c.com/x", disposition);
            assert_eq!(
                interceptor().decide(&req),
                Verdict::OpenExternally {
                    url: "https://c.com/x".into()
                },
                "{disposition:?}"
            );
        }
    }

    #[test]
    fn window_open_current_tab_loads_in_place() {
        let req = NavigationRequest::window_open("https://c.com/x", WindowDisposition::CurrentTab);
        assert_eq!(
            interceptor().decide(&req),
            Verdict::LoadInPlace {
                url: "https://c.com/x".into()
            }
        );
    }

    #[test]
    fn undecodable_external_open_is_dropped() {
        let req = NavigationRequest::link_click("http://[not-a-host", ctrl());
        assert!(matches!(interceptor().decide(&req), Verdict::Drop { .. }));

        let req = NavigationRequest::window_open("", WindowDisposition::ForegroundTab);
        assert!(matches!(interceptor().decide(&req), Verdict::Drop { .. }));
    }

    #[test]
    fn undecodable_regular_navigation_passes_through() {
        let req = NavigationRequest::navigation("not a url at all");
        assert_eq!(interceptor().decide(&req), Verdict::Allow);
    }

    // -- Blocklist --

    #[test]
    fn blocks_exact_host_and_subdomains() {
        let i = interceptor();
        assert_eq!(
            i.blocked_host("https://doubleclick.net/ad"),
            Some("doubleclick.net".into())
        );
        assert_eq!(
            i.blocked_host("https://stats.g.doubleclick.net/x"),
            Some("stats.g.doubleclick.net".into())
        );
        assert_eq!(
            i.blocked_host("https://ADS.example.com"),
            Some("ads.example.com".into())
        );
    }

    #[test]
    fn does_not_block_lookalike_hosts() {
        let i = interceptor();
        assert_eq!(i.blocked_host("https://notdoubleclick.net/"), None);
        assert_eq!(i.blocked_host("https://example.com/"), None);
        assert_eq!(i.blocked_host("about:blank"), None);
        assert_eq!(i.blocked_host("garbage"), None);
    }

    #[test]
    fn blocked_regular_navigation_is_cancelled() {
        let req = NavigationRequest::navigation("https://ads.example.com/banner");
        assert_eq!(
            interceptor().decide(&req),
            Verdict::Block {
                host: "ads.example.com".into()
            }
        );
    }

    #[test]
    fn blocked_external_open_is_cancelled() {
        let req = NavigationRequest::link_click("https://doubleclick.net/", ctrl());
        assert!(matches!(interceptor().decide(&req), Verdict::Block { .. }));
    }

    #[test]
    fn blocklist_is_normalized() {
        let i = SecurityInterceptor::new([" .Tracker.IO ", ""]);
        assert_eq!(i.blocked_domains(), &["tracker.io".to_string()]);
    }

    // -- Gate --

    #[test]
    fn gate_emits_one_external_open_and_denies_engine() {
        let queue = EngineEventQueue::new();
        let gate = NavigationGate::new(interceptor(), queue.sink_for(SurfaceId(4)));

        let allowed = gate.check(&NavigationRequest::link_click("https://b.com/", ctrl()));

        assert!(!allowed);
        let events = queue.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].surface_id, SurfaceId(4));
        assert_eq!(
            events[0].kind,
            EngineEventKind::ExternalOpenRequested {
                url: "https://b.com/".into()
            }
        );
    }

    #[test]
    fn gate_allows_regular_navigation_silently() {
        let queue = EngineEventQueue::new();
        let gate = NavigationGate::new(interceptor(), queue.sink_for(SurfaceId(1)));
        assert!(gate.check(&NavigationRequest::navigation("https://a.com/")));
        assert!(queue.is_empty());
    }

    #[test]
    fn gate_drops_malformed_without_events() {
        let queue = EngineEventQueue::new();
        let gate = NavigationGate::new(interceptor(), queue.sink_for(SurfaceId(1)));
        assert!(!gate.check(&NavigationRequest::link_click("::::", ctrl())));
        assert!(queue.is_empty());
    }

    #[test]
    fn gate_turns_current_tab_open_into_load_request() {
        let queue = EngineEventQueue::new();
        let gate = NavigationGate::new(interceptor(), queue.sink_for(SurfaceId(2)));
        let allowed = gate.check(&NavigationRequest::window_open(
            "https://d.com/",
            WindowDisposition::CurrentTab,
        ));
        assert!(!allowed);
        assert_eq!(
            queue.drain()[0].kind,
            EngineEventKind::LoadInPlaceRequested {
                url: "https://d.com/".into()
            }
        );
    }
}
