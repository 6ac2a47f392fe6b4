use bytes::Bytes;
use chrono::{DateTime, Utc};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of one app installation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceIdentifier(String);

impl DeviceIdentifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a photo's binary payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteFileRef {
    /// Encoded bytes waiting for the next save.
    Pending { data: Bytes },
    /// Uploaded file; `cached` holds its bytes once known locally.
    Stored { url: String, cached: Option<Bytes> },
}

impl RemoteFileRef {
    pub fn stored(url: impl Into<String>) -> Self {
        RemoteFileRef::Stored {
            url: url.into(),
            cached: None,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            RemoteFileRef::Pending { .. } => None,
            RemoteFileRef::Stored { url, .. } => Some(url),
        }
    }

    pub fn cached_bytes(&self) -> Option<&Bytes> {
        match self {
            RemoteFileRef::Pending { data } => Some(data),
            RemoteFileRef::Stored { cached, .. } => cached.as_ref(),
        }
    }

    pub fn is_uploaded(&self) -> bool {
        matches!(self, RemoteFileRef::Stored { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
    Record,
    Memory,
    Disk,
    Network,
}

#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub bytes: Bytes,
    /// `None` when the bytes did not decode.
    pub bitmap: Option<DynamicImage>,
    pub source: CacheSource,
}

#[derive(Debug, Clone)]
pub struct PhotoRecord {
    pub id: Option<i64>,
    pub name: String,
    pub device_id: DeviceIdentifier,
    pub image_ref: Option<RemoteFileRef>,
    pub local_image: Option<DynamicImage>,
    pub created_at: Option<DateTime<Utc>>,
}

impl PhotoRecord {
    pub fn is_uploaded(&self) -> bool {
        self.image_ref
            .as_ref()
            .map(RemoteFileRef::is_uploaded)
            .unwrap_or(false)
    }

    pub fn has_downloaded_image(&self) -> bool {
        self.local_image.is_some()
    }

    /// Stores the loaded bytes on the reference and keeps the decoded bitmap.
    pub fn apply_loaded(&mut self, loaded: LoadedImage) {
        if let Some(RemoteFileRef::Stored { cached, .. }) = self.image_ref.as_mut() {
            if cached.is_none() {
                *cached = Some(loaded.bytes);
            }
        }
        if let Some(bitmap) = loaded.bitmap {
            self.local_image = Some(bitmap);
        }
    }

    /// Drops the decoded bitmap; cached bytes stay so it can be rebuilt offline.
    pub fn release_image(&mut self) -> bool {
        self.local_image.take().is_some()
    }

    pub fn summary(&self) -> PhotoSummary {
        PhotoSummary {
            id: self.id,
            name: self.name.clone(),
            device_id: self.device_id.clone(),
            url: self
                .image_ref
                .as_ref()
                .and_then(RemoteFileRef::url)
                .map(str::to_string),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhotoSummary {
    pub id: Option<i64>,
    pub name: String,
    pub device_id: DeviceIdentifier,
    pub url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(image_ref: Option<RemoteFileRef>) -> PhotoRecord {
        PhotoRecord {
            id: Some(1),
            name: "selfie".into(),
            device_id: DeviceIdentifier::new("dev"),
            image_ref,
            local_image: None,
            created_at: None,
        }
    }

    #[test]
    fn apply_loaded_fills_cache_once() {
        let mut rec = record(Some(RemoteFileRef::stored("https://x/1.jpg")));
        rec.apply_loaded(LoadedImage {
            bytes: Bytes::from_static(b"first"),
            bitmap: Some(DynamicImage::new_rgb8(2, 2)),
            source: CacheSource::Network,
        });
        rec.apply_loaded(LoadedImage {
            bytes: Bytes::from_static(b"second"),
            bitmap: None,
            source: CacheSource::Network,
        });
        assert_eq!(
            rec.image_ref.as_ref().and_then(RemoteFileRef::cached_bytes),
            Some(&Bytes::from_static(b"first"))
        );
        assert!(rec.has_downloaded_image());

        assert!(rec.release_image());
        assert!(!rec.release_image());
        assert!(rec.image_ref.as_ref().unwrap().cached_bytes().is_some());
    }

    #[test]
    fn pending_payload_is_not_uploaded() {
        let rec = record(Some(RemoteFileRef::Pending {
            data: Bytes::from_static(b"jpeg"),
        }));
        assert!(!rec.is_uploaded());
        assert!(rec.summary().url.is_none());
        assert!(!record(None).is_uploaded());
    }
}
