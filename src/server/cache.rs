// src/server/cache.rs
//! Rendered `packages.json` cache
//!
//! Building the index scans the host and hashes every artifact, so the
//! serialized document is kept per user for a while. Entries expire after the
//! configured TTL and are all dropped as soon as a new artifact is archived.

use crate::host::ReleaseObserver;
use crate::package::Release;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

struct CachedIndex {
    body: Arc<String>,
    created: Instant,
}

/// Per-user serialized index with a TTL
pub struct IndexCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CachedIndex>>,
}

impl IndexCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, user: &str) -> Option<Arc<String>> {
        let mut entries = self.entries.lock();
        match entries.get(user) {
            Some(entry) if entry.created.elapsed() < self.ttl => Some(entry.body.clone()),
            Some(_) => {
                entries.remove(user);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, user: &str, body: String) -> Arc<String> {
        let body = Arc::new(body);
        self.entries.lock().insert(
            user.to_string(),
            CachedIndex {
                body: body.clone(),
                created: Instant::now(),
            },
        );
        body
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        if !entries.is_empty() {
            debug!("Dropping {} cached indexes", entries.len());
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReleaseObserver for IndexCache {
    fn archived(&self, _release: &Release<'_>) {
        self.clear();
    }
}
