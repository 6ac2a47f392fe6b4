use bytes::Bytes;
use image::{DynamicImage, Rgb, RgbImage};
use providers::memory::MemoryBackend;
use selfie_core::cache::BlobCache;
use selfie_core::codec;
use selfie_core::grid::{Applied, BindOutcome, PhotoGrid};
use selfie_core::models::{CacheSource, DeviceIdentifier, RemoteFileRef};
use selfie_core::sync::{PhotoSyncClient, SyncSettings};
use std::sync::Arc;

fn client(device: &str, backend: &Arc<MemoryBackend>, cache: BlobCache) -> PhotoSyncClient {
    PhotoSyncClient::new(
        DeviceIdentifier::new(device),
        backend.clone(),
        backend.clone(),
        cache,
        SyncSettings::default(),
    )
}

fn bitmap(w: u32, h: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([10, 120, 240])))
}

async fn upload(client: &PhotoSyncClient, name: &str, w: u32, h: u32) -> String {
    let mut rec = client.create_photo(name, Some(&bitmap(w, h))).unwrap();
    client.save_photo(&mut rec).await.unwrap();
    rec.image_ref.unwrap().url().unwrap().to_string()
}

#[tokio::test]
async fn list_photos_filters_by_device() {
    let backend = Arc::new(MemoryBackend::new());
    let mine = client("device-d", &backend, BlobCache::in_memory(8));
    let theirs = client("device-d2", &backend, BlobCache::in_memory(8));
    upload(&mine, "one", 4, 4).await;
    upload(&theirs, "other", 4, 4).await;
    upload(&mine, "two", 4, 4).await;

    let photos = mine.list_photos(mine.device_id()).await.unwrap();
    let names: Vec<&str> = photos.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["one", "two"]);
    assert!(photos.iter().all(|p| p.device_id.as_str() == "device-d"));
    assert!(photos.iter().all(|p| p.is_uploaded() && p.local_image.is_none()));
    assert_eq!(backend.query_count(), 1);
}

#[tokio::test]
async fn list_photos_surfaces_query_errors() {
    let backend = Arc::new(MemoryBackend::new());
    let c = client("device-d", &backend, BlobCache::in_memory(8));
    backend.set_fail_query(true);
    assert!(c.list_photos(c.device_id()).await.is_err());
}

#[tokio::test]
async fn cached_bytes_skip_the_network() {
    let backend = Arc::new(MemoryBackend::new());
    let c = client("device-d", &backend, BlobCache::in_memory(0));
    let payload = codec::encode_jpeg(&bitmap(12, 9), 50).unwrap();
    let image_ref = RemoteFileRef::Stored {
        url: "memory://photo/1/a.jpg".into(),
        cached: Some(payload),
    };

    let loaded = c.load_image(&image_ref).await.unwrap();
    assert_eq!(loaded.source, CacheSource::Record);
    let img = loaded.bitmap.unwrap();
    assert_eq!((img.width(), img.height()), (12, 9));
    assert_eq!(backend.fetch_count(), 0);
}

#[tokio::test]
async fn uncached_load_fetches_once() {
    let backend = Arc::new(MemoryBackend::new());
    let url = "memory://photo/9/x.jpg";
    backend.put_file(url, codec::encode_jpeg(&bitmap(20, 10), 50).unwrap());
    let c = client("device-d", &backend, BlobCache::in_memory(0));

    let loaded = c.load_image(&RemoteFileRef::stored(url)).await.unwrap();
    assert_eq!(backend.fetch_count(), 1);
    assert_eq!(loaded.source, CacheSource::Network);
    let img = loaded.bitmap.unwrap();
    assert!(img.width() > 0 && img.height() > 0);
}

#[tokio::test]
async fn fetched_bytes_are_cached_by_url() {
    let backend = Arc::new(MemoryBackend::new());
    let url = "memory://photo/9/x.jpg";
    backend.put_file(url, codec::encode_jpeg(&bitmap(20, 10), 50).unwrap());
    let c = client("device-d", &backend, BlobCache::in_memory(4));

    let first = c.load_image(&RemoteFileRef::stored(url)).await.unwrap();
    let second = c.load_image(&RemoteFileRef::stored(url)).await.unwrap();
    assert_eq!(first.source, CacheSource::Network);
    assert_eq!(second.source, CacheSource::Memory);
    assert_eq!(backend.fetch_count(), 1);
}

#[tokio::test]
async fn fetch_error_delivers_no_bitmap() {
    let backend = Arc::new(MemoryBackend::new());
    backend.set_fail_fetch(true);
    let c = client("device-d", &backend, BlobCache::in_memory(0));

    let result = c.load_image(&RemoteFileRef::stored("memory://missing")).await;
    assert!(result.is_err());
    assert_eq!(backend.fetch_count(), 1);
}

#[tokio::test]
async fn malformed_bytes_mean_no_image() {
    let backend = Arc::new(MemoryBackend::new());
    backend.put_file("memory://bad", Bytes::from_static(b"<html>oops</html>"));
    let c = client("device-d", &backend, BlobCache::in_memory(0));

    let loaded = c.load_image(&RemoteFileRef::stored("memory://bad")).await.unwrap();
    assert!(loaded.bitmap.is_none());
}

#[tokio::test]
async fn recycled_slot_ignores_stale_completion() {
    let backend = Arc::new(MemoryBackend::new());
    let uploader = client("device-d", &backend, BlobCache::in_memory(0));
    upload(&uploader, "wide", 30, 10).await;
    upload(&uploader, "tall", 10, 30).await;

    let viewer = Arc::new(client("device-d", &backend, BlobCache::in_memory(0)));
    let mut grid = PhotoGrid::new(viewer.clone(), 1);
    grid.refresh(viewer.device_id()).await.unwrap();
    assert_eq!(grid.photos().len(), 2);

    assert_eq!(grid.bind_cell(0, 0), Ok(BindOutcome::Loading));
    assert_eq!(grid.bind_cell(0, 1), Ok(BindOutcome::Loading));

    let mut outcomes = Vec::new();
    while let Some(applied) = grid.next_event().await {
        outcomes.push(applied);
    }
    outcomes.sort_by_key(|a| *a as u8);
    assert_eq!(outcomes, vec![Applied::Cell, Applied::RecordOnly]);

    let cell = &grid.cells()[0];
    assert_eq!(cell.assigned, Some(1));
    assert!(!cell.loading);
    let shown = cell.image.as_ref().unwrap();
    assert_eq!((shown.width(), shown.height()), (10, 30));

    // The stale completion still fills its own record.
    assert!(grid.photos()[0].has_downloaded_image());
    assert_eq!(backend.fetch_count(), 2);
}

#[tokio::test]
async fn replaced_list_drops_old_completions() {
    let backend = Arc::new(MemoryBackend::new());
    let uploader = client("device-d", &backend, BlobCache::in_memory(0));
    upload(&uploader, "one", 8, 8).await;

    let viewer = Arc::new(client("device-d", &backend, BlobCache::in_memory(0)));
    let mut grid = PhotoGrid::new(viewer.clone(), 2);
    grid.refresh(viewer.device_id()).await.unwrap();
    grid.bind_cell(0, 0).unwrap();

    grid.set_photos(Vec::new());
    assert_eq!(grid.next_event().await, Some(Applied::Dropped));
    assert_eq!(grid.next_event().await, None);
    assert!(grid.cells().iter().all(|c| c.image.is_none() && c.assigned.is_none()));
}

#[tokio::test]
async fn failed_refresh_keeps_previous_list() {
    let backend = Arc::new(MemoryBackend::new());
    let c = Arc::new(client("device-d", &backend, BlobCache::in_memory(0)));
    upload(&c, "one", 4, 4).await;

    let mut grid = PhotoGrid::new(c.clone(), 1);
    assert_eq!(grid.refresh(c.device_id()).await.unwrap(), 1);

    backend.set_fail_query(true);
    assert!(grid.refresh(c.device_id()).await.is_err());
    assert!(!grid.is_busy());
    assert_eq!(grid.photos().len(), 1);
}

#[tokio::test]
async fn failed_load_clears_loading_indicator() {
    let backend = Arc::new(MemoryBackend::new());
    let c = Arc::new(client("device-d", &backend, BlobCache::in_memory(0)));
    upload(&c, "one", 4, 4).await;

    let mut grid = PhotoGrid::new(c.clone(), 1);
    grid.refresh(c.device_id()).await.unwrap();
    backend.set_fail_fetch(true);
    grid.bind_cell(0, 0).unwrap();
    assert!(grid.cells()[0].loading);

    grid.settle().await;
    assert!(!grid.cells()[0].loading);
    assert!(grid.cells()[0].image.is_none());
    assert!(!grid.photos()[0].has_downloaded_image());
}
