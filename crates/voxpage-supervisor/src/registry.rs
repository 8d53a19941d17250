//! Ready-tab store.
//!
//! Records which tabs currently run an initialised worker. Entries are added
//! when a worker announces itself and dropped on navigation or close, so the
//! next request for that tab reinstalls the worker.

use std::collections::HashMap;

use voxpage_core::types::{TabId, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabRecord {
    pub ready_since: Timestamp,
}

#[derive(Debug, Default)]
pub struct ReadyTabs {
    tabs: HashMap<TabId, TabRecord>,
}

impl ReadyTabs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `tab` as ready. Returns `false` if it already was.
    pub fn mark_ready(&mut self, tab: TabId) -> bool {
        if self.tabs.contains_key(&tab) {
            return false;
        }
        self.tabs.insert(
            tab,
            TabRecord {
                ready_since: Timestamp::now(),
            },
        );
        true
    }

    /// Drop the record for `tab`. Returns whether one existed.
    pub fn forget(&mut self, tab: TabId) -> bool {
        self.tabs.remove(&tab).is_some()
    }

    pub fn is_ready(&self, tab: TabId) -> bool {
        self.tabs.contains_key(&tab)
    }

    pub fn get(&self, tab: TabId) -> Option<&TabRecord> {
        self.tabs.get(&tab)
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }
}
