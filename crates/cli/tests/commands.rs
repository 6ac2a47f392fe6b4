use cli::commands::{fetch_photos, list_photos, output_name, target_device, upload_photo};
use image::{DynamicImage, Rgb, RgbImage};
use providers::memory::MemoryBackend;
use selfie_core::cache::BlobCache;
use selfie_core::identity::FixedIdentity;
use selfie_core::models::DeviceIdentifier;
use selfie_core::sync::{PhotoSyncClient, SyncSettings};
use std::sync::Arc;
use tempfile::tempdir;

fn client(device: &str, backend: &Arc<MemoryBackend>) -> PhotoSyncClient {
    PhotoSyncClient::new(
        DeviceIdentifier::new(device),
        backend.clone(),
        backend.clone(),
        BlobCache::in_memory(0),
        SyncSettings::default(),
    )
}

#[tokio::test]
async fn upload_list_and_fetch_round_trip() {
    let temp = tempdir().unwrap();
    let src = temp.path().join("me.png");
    DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 12, Rgb([255, 0, 0])))
        .save(&src)
        .unwrap();

    let backend = Arc::new(MemoryBackend::new());
    let uploader = client("phone-a", &backend);
    let first = upload_photo(&uploader, &src, None).await.unwrap();
    assert_eq!(first.name, "me");
    assert!(first.url.is_some());
    upload_photo(&uploader, &src, Some("again")).await.unwrap();
    upload_photo(&client("phone-b", &backend), &src, None)
        .await
        .unwrap();

    let listed = list_photos(&uploader, uploader.device_id()).await.unwrap();
    assert_eq!(listed.len(), 2);

    // A fresh client has no cached bytes, so every image comes over the wire.
    let viewer = Arc::new(client("phone-a", &backend));
    let out = temp.path().join("out");
    let summary = fetch_photos(viewer, &DeviceIdentifier::new("phone-a"), &out, 1)
        .await
        .unwrap();
    assert_eq!(summary.listed, 2);
    assert_eq!(summary.written.len(), 2);
    assert_eq!(summary.missing, 0);
    assert_eq!(backend.fetch_count(), 2);
    for path in &summary.written {
        let img = image::open(path).unwrap();
        assert_eq!((img.width(), img.height()), (16, 12));
    }
}

#[tokio::test]
async fn fetch_counts_failed_downloads_as_missing() {
    let temp = tempdir().unwrap();
    let src = temp.path().join("me.png");
    DynamicImage::new_rgb8(4, 4).save(&src).unwrap();

    let backend = Arc::new(MemoryBackend::new());
    let uploader = client("phone-a", &backend);
    upload_photo(&uploader, &src, None).await.unwrap();

    backend.set_fail_fetch(true);
    let summary = fetch_photos(
        Arc::new(client("phone-a", &backend)),
        uploader.device_id(),
        &temp.path().join("out"),
        4,
    )
    .await
    .unwrap();
    assert_eq!(summary.listed, 1);
    assert!(summary.written.is_empty());
    assert_eq!(summary.missing, 1);
}

#[tokio::test]
async fn upload_rejects_unreadable_file() {
    let temp = tempdir().unwrap();
    let bogus = temp.path().join("nope.jpg");
    std::fs::write(&bogus, b"not a jpeg").unwrap();
    let backend = Arc::new(MemoryBackend::new());
    assert!(upload_photo(&client("phone-a", &backend), &bogus, None)
        .await
        .is_err());
}

#[test]
fn output_names_prefer_backend_id() {
    let backend = Arc::new(MemoryBackend::new());
    let c = client("phone-a", &backend);
    let mut rec = c.create_photo("x", None).unwrap();
    assert_eq!(output_name(&rec, 3), "photo-3.jpg");
    rec.id = Some(42);
    assert_eq!(output_name(&rec, 3), "42.jpg");
}

#[test]
fn target_device_defaults_to_own_identity() {
    let own = FixedIdentity::new("SELF");
    assert_eq!(target_device(None, &own).as_str(), "SELF");
    assert_eq!(
        target_device(Some("OTHER".into()), &own).as_str(),
        "OTHER"
    );
}
