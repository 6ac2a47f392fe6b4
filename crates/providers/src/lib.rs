//! Backend abstractions for object records and remote files.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub mod memory;
pub mod syncano;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("status {status} body {body}")]
    Status { status: u16, body: String },
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

/// Filter applied to a class query. Only equality is supported.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq { field: String, value: Value },
}

impl Predicate {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Predicate::Eq {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn matches(&self, object: &StoredObject) -> bool {
        match self {
            Predicate::Eq { field, value } => object.fields.get(field) == Some(value),
        }
    }

    /// Query document in the `{"field": {"_eq": value}}` form.
    pub fn to_query(&self) -> Value {
        match self {
            Predicate::Eq { field, value } => {
                let mut cond = Map::new();
                cond.insert("_eq".to_string(), value.clone());
                let mut doc = Map::new();
                doc.insert(field.clone(), Value::Object(cond));
                Value::Object(doc)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredObject {
    pub id: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl StoredObject {
    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// File fields come back as `{"type": "file", "value": url}`; a bare
    /// string is accepted as well.
    pub fn file_url(&self, field: &str) -> Option<&str> {
        match self.fields.get(field)? {
            Value::String(url) => Some(url.as_str()),
            Value::Object(obj) => {
                if obj.get("type").and_then(Value::as_str) != Some("file") {
                    return None;
                }
                obj.get("value").and_then(Value::as_str)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileAttachment {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, Default)]
pub struct NewObject {
    pub fields: Map<String, Value>,
    pub files: Vec<FileAttachment>,
}

impl NewObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn with_file(mut self, file: FileAttachment) -> Self {
        self.files.push(file);
        self
    }
}

#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Objects of `class` matching `predicate`, in backend order.
    async fn query(
        &self,
        class: &str,
        predicate: &Predicate,
    ) -> Result<Vec<StoredObject>, ProviderError>;

    /// Persists a new object together with its file attachments.
    async fn save(&self, class: &str, object: NewObject) -> Result<StoredObject, ProviderError>;
}

#[async_trait::async_trait]
pub trait FileStore: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes, ProviderError>;
}

#[derive(Default, Clone)]
pub struct BackendRegistry {
    records: HashMap<String, Arc<dyn RecordStore>>,
    files: HashMap<String, Arc<dyn FileStore>>,
    pub preferred: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(mut self, name: &str, store: Arc<dyn RecordStore>) -> Self {
        self.records.insert(name.to_string(), store);
        self
    }

    pub fn with_files(mut self, name: &str, store: Arc<dyn FileStore>) -> Self {
        self.files.insert(name.to_string(), store);
        self
    }

    pub fn set_preferred(mut self, name: &str) -> Self {
        self.preferred = Some(name.to_string());
        self
    }

    fn key(&self, name: Option<&str>) -> Result<String, ProviderError> {
        name.map(str::to_string)
            .or_else(|| self.preferred.clone())
            .ok_or_else(|| ProviderError::UnknownProvider("no backend configured".into()))
    }

    pub fn records(&self, name: Option<&str>) -> Result<Arc<dyn RecordStore>, ProviderError> {
        let key = self.key(name)?;
        self.records
            .get(&key)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownProvider(key))
    }

    pub fn files(&self, name: Option<&str>) -> Result<Arc<dyn FileStore>, ProviderError> {
        let key = self.key(name)?;
        self.files
            .get(&key)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownProvider(key))
    }
}
