//! Two-tier cache of fetched file bytes keyed by URL: a bounded in-memory
//! map in front of the SQLite `blob_cache` table.

use crate::models::CacheSource;
use bytes::Bytes;
use sqlx::SqlitePool;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

#[derive(Default)]
struct MemoryTier {
    entries: HashMap<String, Bytes>,
    order: VecDeque<String>,
}

pub struct BlobCache {
    memory: Mutex<MemoryTier>,
    capacity: usize,
    pool: Option<SqlitePool>,
}

impl BlobCache {
    pub fn in_memory(capacity: usize) -> Self {
        Self {
            memory: Mutex::new(MemoryTier::default()),
            capacity,
            pool: None,
        }
    }

    pub fn with_pool(capacity: usize, pool: SqlitePool) -> Self {
        Self {
            pool: Some(pool),
            ..Self::in_memory(capacity)
        }
    }

    fn tier(&self) -> Option<MutexGuard<'_, MemoryTier>> {
        self.memory.lock().ok()
    }

    pub fn memory_len(&self) -> usize {
        self.tier().map(|t| t.entries.len()).unwrap_or(0)
    }

    pub fn clear_memory(&self) {
        if let Some(mut tier) = self.tier() {
            tier.entries.clear();
            tier.order.clear();
        }
    }

    fn remember(&self, url: &str, data: Bytes) {
        if self.capacity == 0 {
            return;
        }
        let Some(mut tier) = self.tier() else {
            return;
        };
        if tier.entries.insert(url.to_string(), data).is_none() {
            tier.order.push_back(url.to_string());
        }
        while tier.order.len() > self.capacity {
            if let Some(oldest) = tier.order.pop_front() {
                tier.entries.remove(&oldest);
            }
        }
    }

    pub async fn get(&self, url: &str) -> Option<(Bytes, CacheSource)> {
        let hit = self.tier().and_then(|t| t.entries.get(url).cloned());
        if let Some(data) = hit {
            debug!(url, "memory cache hit");
            return Some((data, CacheSource::Memory));
        }
        let pool = self.pool.as_ref()?;
        match storage::blobs::get(pool, url).await {
            Ok(Some(data)) => {
                debug!(url, "disk cache hit");
                let data = Bytes::from(data);
                self.remember(url, data.clone());
                Some((data, CacheSource::Disk))
            }
            Ok(None) => None,
            Err(e) => {
                warn!(url, "disk cache read failed: {}", e);
                None
            }
        }
    }

    pub async fn put(&self, url: &str, data: Bytes) {
        self.remember(url, data.clone());
        if let Some(pool) = &self.pool {
            if let Err(e) = storage::blobs::put(pool, url, &data).await {
                warn!(url, "disk cache write failed: {}", e);
            }
        }
    }

    /// Trims the persistent tier to `keep` entries.
    pub async fn prune_disk(&self, keep: i64) -> anyhow::Result<u64> {
        match &self.pool {
            Some(pool) => storage::blobs::prune(pool, keep).await,
            None => Ok(0),
        }
    }
}
