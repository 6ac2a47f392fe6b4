//! Photo sync client: creates, saves, lists and loads photos against the
//! configured record and file stores.

use crate::cache::BlobCache;
use crate::codec;
use crate::config::AppConfig;
use crate::error::SyncError;
use crate::models::{CacheSource, DeviceIdentifier, LoadedImage, PhotoRecord, RemoteFileRef};
use bytes::Bytes;
use image::DynamicImage;
use providers::{FileAttachment, FileStore, NewObject, Predicate, RecordStore, StoredObject};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const NAME_FIELD: &str = "name";
pub const DEVICE_ID_FIELD: &str = "deviceId";
pub const IMAGE_FIELD: &str = "image";

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub class_name: String,
    pub jpeg_quality: u8,
    pub cache_fetched: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            class_name: "photo".to_string(),
            jpeg_quality: codec::DEFAULT_JPEG_QUALITY,
            cache_fetched: true,
        }
    }
}

impl From<&AppConfig> for SyncSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            class_name: config.backend.class_name.clone(),
            jpeg_quality: config.images.jpeg_quality,
            cache_fetched: config.images.cache_fetched,
        }
    }
}

pub struct PhotoSyncClient {
    device_id: DeviceIdentifier,
    records: Arc<dyn RecordStore>,
    files: Arc<dyn FileStore>,
    cache: BlobCache,
    settings: SyncSettings,
}

impl PhotoSyncClient {
    pub fn new(
        device_id: DeviceIdentifier,
        records: Arc<dyn RecordStore>,
        files: Arc<dyn FileStore>,
        cache: BlobCache,
        settings: SyncSettings,
    ) -> Self {
        Self {
            device_id,
            records,
            files,
            cache,
            settings,
        }
    }

    pub fn device_id(&self) -> &DeviceIdentifier {
        &self.device_id
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn cache(&self) -> &BlobCache {
        &self.cache
    }

    /// Builds a local record for this device. The bitmap, if any, is encoded
    /// right away; nothing is sent until [`save_photo`](Self::save_photo).
    pub fn create_photo(
        &self,
        name: &str,
        bitmap: Option<&DynamicImage>,
    ) -> Result<PhotoRecord, SyncError> {
        let image_ref = match bitmap {
            Some(bitmap) => {
                let data = codec::encode_jpeg(bitmap, self.settings.jpeg_quality)?;
                debug!(name, bytes = data.len(), "encoded photo payload");
                Some(RemoteFileRef::Pending { data })
            }
            None => None,
        };
        Ok(PhotoRecord {
            id: None,
            name: name.to_string(),
            device_id: self.device_id.clone(),
            image_ref,
            local_image: bitmap.cloned(),
            created_at: None,
        })
    }

    /// Writes the record and its pending payload to the backend.
    pub async fn save_photo(&self, record: &mut PhotoRecord) -> Result<(), SyncError> {
        if let Some(id) = record.id {
            return Err(SyncError::AlreadySaved(id));
        }
        let mut object = NewObject::new()
            .with_field(NAME_FIELD, record.name.as_str())
            .with_field(DEVICE_ID_FIELD, record.device_id.as_str());
        let pending = match &record.image_ref {
            Some(RemoteFileRef::Pending { data }) => Some(data.clone()),
            _ => None,
        };
        if let Some(data) = &pending {
            object = object.with_file(FileAttachment {
                field: IMAGE_FIELD.to_string(),
                file_name: payload_file_name(data),
                content_type: "image/jpeg".to_string(),
                data: data.clone(),
            });
        }

        let stored = self
            .records
            .save(&self.settings.class_name, object)
            .await?;
        info!(id = stored.id, name = %record.name, "saved photo");
        // The object exists remotely from here on, even if the reply is incomplete.
        record.id = Some(stored.id);
        record.created_at = stored.created_at;

        if let Some(data) = pending {
            let url = stored.file_url(IMAGE_FIELD).ok_or_else(|| {
                SyncError::InvalidResponse(format!("object {} has no {} url", stored.id, IMAGE_FIELD))
            })?;
            self.cache.put(url, data.clone()).await;
            record.image_ref = Some(RemoteFileRef::Stored {
                url: url.to_string(),
                cached: Some(data),
            });
        }
        Ok(())
    }

    /// Photos uploaded by `device_id`, in the order the backend returns them.
    pub async fn list_photos(
        &self,
        device_id: &DeviceIdentifier,
    ) -> Result<Vec<PhotoRecord>, SyncError> {
        let predicate = Predicate::eq(DEVICE_ID_FIELD, device_id.as_str());
        let objects = self
            .records
            .query(&self.settings.class_name, &predicate)
            .await
            .map_err(|e| {
                warn!(device_id = %device_id, "photo query failed: {}", e);
                e
            })?;
        let total = objects.len();
        let photos: Vec<PhotoRecord> = objects.into_iter().filter_map(record_from_object).collect();
        info!(
            device_id = %device_id,
            count = photos.len(),
            skipped = total - photos.len(),
            "listed photos"
        );
        Ok(photos)
    }

    /// Resolves the bytes behind `image_ref` (record, cache, then network)
    /// and decodes them.
    pub async fn load_image(&self, image_ref: &RemoteFileRef) -> Result<LoadedImage, SyncError> {
        if let Some(bytes) = image_ref.cached_bytes() {
            return Ok(decode_loaded(bytes.clone(), CacheSource::Record).await);
        }
        let url = image_ref.url().ok_or(SyncError::MissingImage)?;
        if let Some((bytes, source)) = self.cache.get(url).await {
            return Ok(decode_loaded(bytes, source).await);
        }

        let bytes = self.files.fetch(url).await.map_err(|e| {
            warn!(url, "image fetch failed: {}", e);
            e
        })?;
        debug!(url, bytes = bytes.len(), "fetched image");
        if self.settings.cache_fetched {
            self.cache.put(url, bytes.clone()).await;
        }
        Ok(decode_loaded(bytes, CacheSource::Network).await)
    }

    /// Loads the record's image in place. `Ok(None)` means there is nothing to show.
    pub async fn load_record_image<'a>(
        &self,
        record: &'a mut PhotoRecord,
    ) -> Result<Option<&'a DynamicImage>, SyncError> {
        if record.local_image.is_none() {
            let Some(image_ref) = record.image_ref.clone() else {
                return Ok(None);
            };
            let loaded = self.load_image(&image_ref).await?;
            record.apply_loaded(loaded);
        }
        Ok(record.local_image.as_ref())
    }
}

fn payload_file_name(data: &Bytes) -> String {
    let hash = blake3::hash(data).to_hex();
    format!("{}.jpg", &hash.as_str()[..16])
}

async fn decode_loaded(bytes: Bytes, source: CacheSource) -> LoadedImage {
    let input = bytes.clone();
    let bitmap = match tokio::task::spawn_blocking(move || codec::decode(&input)).await {
        Ok(bitmap) => bitmap,
        Err(e) => {
            warn!("decode task failed: {}", e);
            None
        }
    };
    LoadedImage {
        bytes,
        bitmap,
        source,
    }
}

fn record_from_object(object: StoredObject) -> Option<PhotoRecord> {
    let Some(device_id) = object.text(DEVICE_ID_FIELD) else {
        warn!(id = object.id, "object without {} skipped", DEVICE_ID_FIELD);
        return None;
    };
    Some(PhotoRecord {
        id: Some(object.id),
        name: object.text(NAME_FIELD).unwrap_or_default().to_string(),
        device_id: DeviceIdentifier::new(device_id),
        image_ref: object.file_url(IMAGE_FIELD).map(RemoteFileRef::stored),
        local_image: None,
        created_at: object.created_at,
    })
}
