//! Registry tracking pages, their CDP targets and attached sessions.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::ids::{PageId, SessionId};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TargetContext {
    pub session_id: SessionId,
    pub target_id: String,
    pub cdp_session: Option<String>,
}

/// Concurrent lookup tables keyed by page, CDP target id and CDP session id.
#[derive(Default)]
pub struct Registry {
    pages: DashMap<PageId, TargetContext>,
    by_target: DashMap<String, PageId>,
    by_session: DashMap<String, PageId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a newly discovered page target and returns its page id.
    /// Rediscovering a known target returns the existing id.
    pub fn track_target(&self, target_id: &str) -> PageId {
        if let Some(existing) = self.by_target.get(target_id) {
            return *existing.value();
        }
        let page = PageId::new();
        self.pages.insert(
            page,
            TargetContext {
                session_id: SessionId::new(),
                target_id: target_id.to_string(),
                cdp_session: None,
            },
        );
        self.by_target.insert(target_id.to_string(), page);
        page
    }

    pub fn attach_session(&self, target_id: &str, cdp_session: String) -> Option<PageId> {
        let page = *self.by_target.get(target_id)?.value();
        if let Some(mut entry) = self.pages.get_mut(&page) {
            entry.cdp_session = Some(cdp_session.clone());
        }
        self.by_session.insert(cdp_session, page);
        Some(page)
    }

    pub fn detach_session(&self, cdp_session: &str) {
        if let Some((_, page)) = self.by_session.remove(cdp_session) {
            if let Some(mut entry) = self.pages.get_mut(&page) {
                entry.cdp_session = None;
            }
        }
    }

    pub fn forget_target(&self, target_id: &str) -> Option<PageId> {
        let (_, page) = self.by_target.remove(target_id)?;
        if let Some((_, ctx)) = self.pages.remove(&page) {
            if let Some(session) = ctx.cdp_session {
                self.by_session.remove(&session);
            }
        }
        Some(page)
    }

    pub fn page_for_target(&self, target_id: &str) -> Option<PageId> {
        self.by_target.get(target_id).map(|entry| *entry.value())
    }

    pub fn page_for_session(&self, cdp_session: &str) -> Option<PageId> {
        self.by_session.get(cdp_session).map(|entry| *entry.value())
    }

    pub fn get(&self, page: &PageId) -> Option<TargetContext> {
        self.pages.get(page).map(|entry| entry.value().clone())
    }

    pub fn cdp_session(&self, page: &PageId) -> Option<String> {
        self.pages
            .get(page)
            .and_then(|entry| entry.cdp_session.clone())
    }

    pub fn pages(&self) -> Vec<PageId> {
        self.pages.iter().map(|kv| *kv.key()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn clear(&self) {
        self.pages.clear();
        self.by_target.clear();
        self.by_session.clear();
    }
}
