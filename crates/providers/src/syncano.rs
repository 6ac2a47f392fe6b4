use crate::{FileStore, NewObject, Predicate, ProviderError, RecordStore, StoredObject};
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct SyncanoConfig {
    pub base_url: String,
    pub instance: String,
    pub api_key: Option<String>,
}

#[derive(Clone)]
pub struct SyncanoClient {
    client: Client,
    cfg: Arc<SyncanoConfig>,
}

#[derive(Debug, Deserialize)]
struct ObjectPage {
    #[serde(default)]
    objects: Vec<StoredObject>,
    #[serde(default)]
    next: Option<String>,
}

impl SyncanoClient {
    pub fn new(cfg: SyncanoConfig) -> Self {
        Self {
            client: Client::new(),
            cfg: Arc::new(cfg),
        }
    }

    pub fn objects_url(&self, class: &str) -> String {
        format!(
            "{}/v1.1/instances/{}/classes/{}/objects/",
            self.cfg.base_url.trim_end_matches('/'),
            self.cfg.instance,
            class
        )
    }

    /// `next` links are returned as absolute paths on the API host.
    fn resolve(&self, link: &str) -> String {
        if link.starts_with("http://") || link.starts_with("https://") {
            link.to_string()
        } else {
            format!("{}{}", self.cfg.base_url.trim_end_matches('/'), link)
        }
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.cfg.api_key {
            Some(key) => builder.header("X-API-KEY", key),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ProviderError> {
        let resp = self
            .authorized(builder)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.bytes().await.unwrap_or(Bytes::from_static(b""));
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(resp)
    }
}

fn text_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait::async_trait]
impl RecordStore for SyncanoClient {
    async fn query(
        &self,
        class: &str,
        predicate: &Predicate,
    ) -> Result<Vec<StoredObject>, ProviderError> {
        let query = predicate.to_query().to_string();
        let mut builder = self
            .client
            .get(self.objects_url(class))
            .query(&[("query", query.as_str())]);
        let mut objects = Vec::new();
        loop {
            let page: ObjectPage = self
                .send(builder)
                .await?
                .json()
                .await
                .map_err(|e| ProviderError::Decode(e.to_string()))?;
            debug!(class, count = page.objects.len(), "received object page");
            objects.extend(page.objects);
            match page.next {
                Some(next) if !next.is_empty() => {
                    builder = self.client.get(self.resolve(&next));
                }
                _ => break,
            }
        }
        Ok(objects)
    }

    async fn save(&self, class: &str, object: NewObject) -> Result<StoredObject, ProviderError> {
        let mut form = Form::new();
        for (name, value) in &object.fields {
            form = form.text(name.clone(), text_value(value));
        }
        for file in object.files {
            let part = Part::bytes(file.data.to_vec())
                .file_name(file.file_name)
                .mime_str(&file.content_type)
                .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
            form = form.part(file.field, part);
        }
        let builder = self.client.post(self.objects_url(class)).multipart(form);
        self.send(builder)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

#[async_trait::async_trait]
impl FileStore for SyncanoClient {
    async fn fetch(&self, url: &str) -> Result<Bytes, ProviderError> {
        // File URLs are public; no API key is sent.
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: String::new(),
            });
        }
        resp.bytes()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))
    }
}
