//! View state as seen by the host UI, and the partial patches that update it.

use serde::{Deserialize, Serialize};
use tabhost_common::{TabId, ViewId};

/// One tab inside a view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub id: TabId,
    pub url: String,
    pub title: String,
    pub favicon_url: Option<String>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl Tab {
    /// A fresh tab with a generated id.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_id(TabId::generate(), url)
    }

    pub fn with_id(id: TabId, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            title: String::new(),
            favicon_url: None,
            is_loading: false,
            error: None,
        }
    }
}

/// Navigation state of a view's active tab.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationState {
    pub can_go_back: bool,
    pub can_go_forward: bool,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// Partial update of a view's externally visible state.
///
/// `None` means "unchanged". For the nullable fields, `Some(None)` is an
/// explicit clear and serializes as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tabs: Option<Vec<Tab>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_tab_id: Option<TabId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_go_back: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_go_forward: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_loading: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon_url: Option<Option<String>>,
}

impl ViewPatch {
    pub fn is_empty(&self) -> bool {
        *self == ViewPatch::default()
    }

    /// Fold a later patch into this one; fields set in `later` win.
    pub fn merge(&mut self, later: ViewPatch) {
        let ViewPatch {
            tabs,
            active_tab_id,
            url,
            title,
            can_go_back,
            can_go_forward,
            is_loading,
            error,
            favicon_url,
        } = later;
        if tabs.is_some() {
            self.tabs = tabs;
        }
        if active_tab_id.is_some() {
            self.active_tab_id = active_tab_id;
        }
        if url.is_some() {
            self.url = url;
        }
        if title.is_some() {
            self.title = title;
        }
        if can_go_back.is_some() {
            self.can_go_back = can_go_back;
        }
        if can_go_forward.is_some() {
            self.can_go_forward = can_go_forward;
        }
        if is_loading.is_some() {
            self.is_loading = is_loading;
        }
        if error.is_some() {
            self.error = error;
        }
        if favicon_url.is_some() {
            self.favicon_url = favicon_url;
        }
    }

    pub fn loading(is_loading: bool) -> Self {
        Self {
            is_loading: Some(is_loading),
            ..Self::default()
        }
    }

    pub fn with_error(mut self, error: Option<String>) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_tabs(mut self, tabs: Vec<Tab>) -> Self {
        self.tabs = Some(tabs);
        self
    }

    pub fn with_history(mut self, can_go_back: bool, can_go_forward: bool) -> Self {
        self.can_go_back = Some(can_go_back);
        self.can_go_forward = Some(can_go_forward);
        self
    }
}

/// A patch addressed to one view; the unit of the push protocol.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePush {
    pub window_id: ViewId,
    pub patch: ViewPatch,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_patch_serializes_to_empty_object() {
        let json = serde_json::to_value(ViewPatch::default()).unwrap();
        assert_eq!(json, serde_json::json!({}));
        assert!(ViewPatch::default().is_empty());
    }

    #[test]
    fn explicit_error_clear_serializes_as_null() {
        let patch = ViewPatch::loading(true).with_error(None);
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({ "isLoading": true, "error": null }));
    }

    #[test]
    fn merge_keeps_earlier_fields_and_overwrites_later_ones() {
        let mut patch = ViewPatch {
            title: Some("Old".into()),
            is_loading: Some(true),
            ..ViewPatch::default()
        };
        patch.merge(ViewPatch {
            is_loading: Some(false),
            favicon_url: Some(Some("https://a.com/favicon.ico".into())),
            ..ViewPatch::default()
        });

        assert_eq!(patch.title.as_deref(), Some("Old"));
        assert_eq!(patch.is_loading, Some(false));
        assert_eq!(
            patch.favicon_url,
            Some(Some("https://a.com/favicon.ico".to_string()))
        );
    }

    #[test]
    fn merge_preserves_explicit_clear() {
        let mut patch = ViewPatch::default().with_error(Some("boom".into()));
        patch.merge(ViewPatch::default().with_error(None));
        assert_eq!(patch.error, Some(None));
    }

    #[test]
    fn state_push_uses_camel_case() {
        let push = StatePush {
            window_id: ViewId::from("w1"),
            patch: ViewPatch::default().with_history(true, false),
        };
        let json = serde_json::to_value(&push).unwrap();
        assert_eq!(json["windowId"], "w1");
        assert_eq!(json["patch"]["canGoBack"], true);
        assert_eq!(json["patch"]["canGoForward"], false);
    }

    #[test]
    fn tab_serializes_camel_case() {
        let tab = Tab::with_id(TabId::from("t1"), "https://a.com");
        let json = serde_json::to_value(&tab).unwrap();
        assert_eq!(json["id"], "t1");
        assert_eq!(json["isLoading"], false);
        assert!(json["faviconUrl"].is_null());
    }
}
