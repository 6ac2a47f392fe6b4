use crate::{FileStore, NewObject, Predicate, ProviderError, RecordStore, StoredObject};
use bytes::Bytes;
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
struct State {
    classes: HashMap<String, Vec<StoredObject>>,
    files: HashMap<String, Bytes>,
    next_id: i64,
}

/// In-process backend. Counts calls and can be told to fail.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
    queries: AtomicUsize,
    fetches: AtomicUsize,
    fail_query: AtomicBool,
    fail_fetch: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn set_fail_query(&self, fail: bool) {
        self.fail_query.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn put_file(&self, url: &str, data: Bytes) {
        if let Ok(mut state) = self.state.lock() {
            state.files.insert(url.to_string(), data);
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, State>, ProviderError> {
        self.state
            .lock()
            .map_err(|_| ProviderError::RequestFailed("memory backend poisoned".into()))
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryBackend {
    async fn query(
        &self,
        class: &str,
        predicate: &Predicate,
    ) -> Result<Vec<StoredObject>, ProviderError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_query.load(Ordering::SeqCst) {
            return Err(ProviderError::RequestFailed("query failure injected".into()));
        }
        let state = self.lock()?;
        Ok(state
            .classes
            .get(class)
            .map(|objects| {
                objects
                    .iter()
                    .filter(|o| predicate.matches(o))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn save(&self, class: &str, object: NewObject) -> Result<StoredObject, ProviderError> {
        let mut state = self.lock()?;
        state.next_id += 1;
        let id = state.next_id;
        let mut fields = object.fields;
        for file in object.files {
            let url = format!("memory://{class}/{id}/{}", file.file_name);
            fields.insert(file.field, json!({"type": "file", "value": url}));
            state.files.insert(url, file.data);
        }
        let now = Utc::now();
        let stored = StoredObject {
            id,
            created_at: Some(now),
            updated_at: Some(now),
            fields,
        };
        state
            .classes
            .entry(class.to_string())
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }
}

#[async_trait::async_trait]
impl FileStore for MemoryBackend {
    async fn fetch(&self, url: &str) -> Result<Bytes, ProviderError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(ProviderError::RequestFailed("fetch failure injected".into()));
        }
        self.lock()?
            .files
            .get(url)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(url.to_string()))
    }
}
