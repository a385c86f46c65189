//! Per-view tab sets.
//!
//! A [`TabSet`] keeps its active tab pointing at a member at all times and is
//! never left empty by a close: removing the last tab inserts a default one.

use std::collections::HashMap;

use tabhost_common::{TabId, ViewId};

use crate::state::Tab;

/// Result of closing a tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseOutcome {
    pub removed: Tab,
    /// Active tab after the close.
    pub new_active: TabId,
    /// A default tab was created because the closed tab was the last one.
    pub replacement_created: bool,
    /// The active tab is a different tab than before the close.
    pub active_changed: bool,
}

/// Ordered tabs of one view plus the active tab.
#[derive(Debug, Clone, Default)]
pub struct TabSet {
    tabs: Vec<Tab>,
    active: Option<TabId>,
}

impl TabSet {
    /// Build from an initial list. An `active` id that isn't a member falls
    /// back to the first tab.
    pub fn from_tabs(tabs: Vec<Tab>, active: Option<TabId>) -> Self {
        let active = active
            .filter(|id| tabs.iter().any(|t| &t.id == id))
            .or_else(|| tabs.first().map(|t| t.id.clone()));
        Self { tabs, active }
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn active_id(&self) -> Option<&TabId> {
        self.active.as_ref()
    }

    pub fn active(&self) -> Option<&Tab> {
        let id = self.active.as_ref()?;
        self.tabs.iter().find(|t| &t.id == id)
    }

    pub fn active_mut(&mut self) -> Option<&mut Tab> {
        let id = self.active.clone()?;
        self.get_mut(&id)
    }

    pub fn get(&self, id: &TabId) -> Option<&Tab> {
        self.tabs.iter().find(|t| &t.id == id)
    }

    pub fn get_mut(&mut self, id: &TabId) -> Option<&mut Tab> {
        self.tabs.iter_mut().find(|t| &t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn contains(&self, id: &TabId) -> bool {
        self.get(id).is_some()
    }

    /// Append a tab and make it active.
    pub fn push_active(&mut self, tab: Tab) -> TabId {
        let id = tab.id.clone();
        self.tabs.push(tab);
        self.active = Some(id.clone());
        id
    }

    /// Make `id` the active tab. Returns `false` if it isn't a member.
    pub fn activate(&mut self, id: &TabId) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.active = Some(id.clone());
        true
    }

    /// Remove `id`. When the active tab goes, its right neighbour takes
    /// over, else its left one; when the last tab goes, a default tab at
    /// `home_url` replaces it. Returns `None` if `id` isn't a member.
    pub fn close(&mut self, id: &TabId, home_url: &str) -> Option<CloseOutcome> {
        let index = self.tabs.iter().position(|t| &t.id == id)?;
        let removed = self.tabs.remove(index);
        let was_active = self.active.as_ref() == Some(id);

        if self.tabs.is_empty() {
            let new_active = self.push_active(Tab::new(home_url));
            return Some(CloseOutcome {
                removed,
                new_active,
                replacement_created: true,
                active_changed: true,
            });
        }

        if was_active {
            // After removal the right neighbour sits at `index`.
            let next = self
                .tabs
                .get(index)
                .or_else(|| self.tabs.get(index.saturating_sub(1)))
                .map(|t| t.id.clone());
            self.active = next;
        }

        let new_active = match &self.active {
            Some(active) => active.clone(),
            None => {
                let first = self.tabs[0].id.clone();
                self.active = Some(first.clone());
                first
            }
        };

        Some(CloseOutcome {
            removed,
            new_active,
            replacement_created: false,
            active_changed: was_active,
        })
    }
}

/// Tab sets of every live view.
#[derive(Debug, Default)]
pub struct TabStateStore {
    sets: HashMap<ViewId, TabSet>,
}

impl TabStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, view: ViewId, set: TabSet) {
        self.sets.insert(view, set);
    }

    pub fn get(&self, view: &ViewId) -> Option<&TabSet> {
        self.sets.get(view)
    }

    pub fn get_mut(&mut self, view: &ViewId) -> Option<&mut TabSet> {
        self.sets.get_mut(view)
    }

    pub fn remove(&mut self, view: &ViewId) -> Option<TabSet> {
        self.sets.remove(view)
    }

    pub fn contains(&self, view: &ViewId) -> bool {
        self.sets.contains_key(view)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}
