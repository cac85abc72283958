use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::provider::Resource;

/// TTL-bound cache of scope-listing results, keyed by [`Scope::cache_key`]
/// (spec §3). Shared across all policy loops so policies with the same
/// scope reuse a single listing call instead of hammering the provider.
pub struct ResourceCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, Vec<Resource>)>>,
}

impl ResourceCache {
    pub fn new(ttl: Duration) -> Self {
        ResourceCache {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached listing for `key` if it's still within the TTL.
    pub fn get(&self, key: &str) -> Option<Vec<Resource>> {
        let entries = self.entries.lock().unwrap();
        let (stored_at, resources) = entries.get(key)?;
        if stored_at.elapsed() < self.ttl {
            Some(resources.clone())
        } else {
            None
        }
    }

    pub fn set(&self, key: &str, resources: Vec<Resource>) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (Instant::now(), resources));
    }
}
