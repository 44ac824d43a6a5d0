//! Per-session search context
//!
//! Correlates a conversational session with its most recent search so that a
//! `resources/read` following a `tools/call` can reuse the already-fetched
//! doctor list instead of hitting the upstream API again.
//!
//! The store is process-local memory. Across horizontally scaled instances
//! there is no consistency guarantee: a read landing on another instance
//! misses and re-derives results from the resource URI's own query parameter.
//! Swapping this for a shared cache is the intended fix for multi-instance
//! deployments; the store is injected as an `Arc` for exactly that reason.
//!
//! Two concurrent `tools/call`s for the same session id race and the last
//! write wins. A session represents one conversational turn at a time, so no
//! locking beyond whole-entry replacement is done.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

use crate::doctors::DoctorRecord;
use crate::search::Language;

/// The most recent search for one conversational session.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    /// Canonical search text, i.e. whichever normalized variant actually
    /// produced results.
    pub search_text: String,
    pub doctors: Vec<DoctorRecord>,
    pub language: Language,
    stored_at: Instant,
}

/// Keyed in-memory session cache with TTL and capacity bounds.
pub struct SessionStore {
    entries: RwLock<HashMap<String, SessionEntry>>,
    ttl: Duration,
    capacity: usize,
}

impl SessionStore {
    pub fn new(ttl: Duration, capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
        })
    }

    /// Store the latest search for a session, replacing any previous entry.
    pub async fn put(
        &self,
        session_id: &str,
        search_text: String,
        doctors: Vec<DoctorRecord>,
        language: Language,
    ) {
        let mut entries = self.entries.write().await;

        entries.retain(|_, e| e.stored_at.elapsed() < self.ttl);

        // At capacity and inserting a new key: drop the stalest entry.
        if entries.len() >= self.capacity && !entries.contains_key(session_id) {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, e)| e.stored_at)
                .map(|(k, _)| k.clone())
            {
                debug!(session = %oldest, "evicting session entry at capacity");
                entries.remove(&oldest);
            }
        }

        entries.insert(
            session_id.to_string(),
            SessionEntry {
                search_text,
                doctors,
                language,
                stored_at: Instant::now(),
            },
        );
    }

    /// Fetch the session entry if present and not expired. Never mutates.
    pub async fn get(&self, session_id: &str) -> Option<SessionEntry> {
        let entries = self.entries.read().await;
        entries
            .get(session_id)
            .filter(|e| e.stored_at.elapsed() < self.ttl)
            .cloned()
    }
}
