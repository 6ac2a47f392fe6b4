use anyhow::{Context, Result};
use selfie_core::grid::PhotoGrid;
use selfie_core::identity::{DeviceIdentityProvider, FixedIdentity};
use selfie_core::models::{DeviceIdentifier, PhotoRecord, PhotoSummary, RemoteFileRef};
use selfie_core::sync::PhotoSyncClient;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Default, Serialize)]
pub struct FetchSummary {
    pub listed: usize,
    pub written: Vec<PathBuf>,
    pub missing: usize,
}

/// The device whose photos a command works on: `requested` when given,
/// otherwise this installation.
pub fn target_device(
    requested: Option<String>,
    own: &dyn DeviceIdentityProvider,
) -> DeviceIdentifier {
    match requested {
        Some(id) => FixedIdentity::new(id).device_identifier(),
        None => own.device_identifier(),
    }
}

/// Reads a picture from disk and uploads it as a new photo for this device.
pub async fn upload_photo(
    client: &PhotoSyncClient,
    path: &Path,
    name: Option<&str>,
) -> Result<PhotoSummary> {
    let bitmap =
        image::open(path).with_context(|| format!("read image {}", path.display()))?;
    let name = match name {
        Some(n) => n.to_string(),
        None => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "photo".to_string()),
    };
    let mut record = client.create_photo(&name, Some(&bitmap))?;
    client.save_photo(&mut record).await.context("save photo")?;
    Ok(record.summary())
}

pub async fn list_photos(
    client: &PhotoSyncClient,
    device: &DeviceIdentifier,
) -> Result<Vec<PhotoSummary>> {
    let photos = client.list_photos(device).await.context("list photos")?;
    Ok(photos.iter().map(PhotoRecord::summary).collect())
}

/// Loads every photo of `device` through a grid with `slots` cells, writing
/// the downloaded JPEG bytes into `out`.
pub async fn fetch_photos(
    client: Arc<PhotoSyncClient>,
    device: &DeviceIdentifier,
    out: &Path,
    slots: usize,
) -> Result<FetchSummary> {
    let slots = slots.max(1);
    fs::create_dir_all(out).with_context(|| format!("create {}", out.display()))?;

    let mut grid = PhotoGrid::new(client, slots);
    let listed = grid.refresh(device).await.context("list photos")?;
    let mut start = 0;
    while start < listed {
        let end = (start + slots).min(listed);
        for (slot, index) in (start..end).enumerate() {
            grid.bind_cell(slot, index)?;
        }
        grid.settle().await;
        start = end;
    }

    let mut summary = FetchSummary {
        listed,
        ..FetchSummary::default()
    };
    for (index, record) in grid.photos().iter().enumerate() {
        let bytes = record
            .image_ref
            .as_ref()
            .and_then(RemoteFileRef::cached_bytes)
            .filter(|_| record.has_downloaded_image());
        let Some(bytes) = bytes else {
            warn!(index, name = %record.name, "no image downloaded");
            summary.missing += 1;
            continue;
        };
        let path = out.join(output_name(record, index));
        fs::write(&path, bytes).with_context(|| format!("write {}", path.display()))?;
        summary.written.push(path);
    }
    info!(
        listed = summary.listed,
        written = summary.written.len(),
        missing = summary.missing,
        "fetch complete"
    );
    Ok(summary)
}

pub fn output_name(record: &PhotoRecord, index: usize) -> String {
    match record.id {
        Some(id) => format!("{id}.jpg"),
        None => format!("photo-{index}.jpg"),
    }
}
