use crate::cache::BlobCache;
use crate::config::AppConfig;
use crate::identity::{DeviceIdentityProvider, InstallationIdentity};
use crate::models::DeviceIdentifier;
use crate::sync::{PhotoSyncClient, SyncSettings};
use anyhow::Context;
use providers::memory::MemoryBackend;
use providers::syncano::{SyncanoClient, SyncanoConfig};
use providers::BackendRegistry;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything a command needs: the local database, this installation's
/// identity and a ready client.
pub struct Session {
    pub config: AppConfig,
    pub pool: SqlitePool,
    pub identity: InstallationIdentity,
    pub client: Arc<PhotoSyncClient>,
}

pub fn build_registry(config: &AppConfig) -> BackendRegistry {
    let memory = Arc::new(MemoryBackend::new());
    let mut reg = BackendRegistry::new()
        .with_records("memory", memory.clone())
        .with_files("memory", memory);

    if !config.backend.instance.is_empty() {
        let client = SyncanoClient::new(SyncanoConfig {
            base_url: config.backend.base_url.clone(),
            instance: config.backend.instance.clone(),
            api_key: config.backend.api_key.clone(),
        });
        reg = reg
            .with_records("syncano", Arc::new(client.clone()))
            .with_files("syncano", Arc::new(client));
    }

    reg.set_preferred(&config.backend.provider)
}

/// True when the selected provider keeps objects only for this process.
pub fn is_ephemeral(config: &AppConfig) -> bool {
    config.backend.provider == "memory"
}

pub fn build_cache(config: &AppConfig, pool: Option<SqlitePool>) -> BlobCache {
    match pool {
        Some(pool) if config.images.persist_cache => {
            BlobCache::with_pool(config.images.memory_cache_entries, pool)
        }
        _ => BlobCache::in_memory(config.images.memory_cache_entries),
    }
}

pub fn build_client(
    config: &AppConfig,
    device_id: DeviceIdentifier,
    cache: BlobCache,
) -> anyhow::Result<PhotoSyncClient> {
    let registry = build_registry(config);
    let records = registry.records(None).context("record store")?;
    let files = registry.files(None).context("file store")?;
    Ok(PhotoSyncClient::new(
        device_id,
        records,
        files,
        cache,
        SyncSettings::from(config),
    ))
}

pub async fn open_session(config: AppConfig) -> anyhow::Result<Session> {
    let pool = storage::open(&config.database.path)
        .await
        .context("open local database")?;
    let identity = InstallationIdentity::load(&pool)
        .await
        .context("load installation identity")?;
    let cache = build_cache(&config, Some(pool.clone()));
    let pruned = cache
        .prune_disk(config.images.persist_cache_entries)
        .await
        .context("prune blob cache")?;
    if pruned > 0 {
        debug!(pruned, "trimmed blob cache");
    }
    let client = build_client(&config, identity.device_identifier(), cache)?;
    if is_ephemeral(&config) {
        warn!(
            "memory backend selected: photos are gone when this process exits; \
             set backend.provider = \"syncano\" to keep them"
        );
    }
    info!(
        device_id = %client.device_id(),
        provider = %config.backend.provider,
        "session ready"
    );
    Ok(Session {
        config,
        pool,
        identity,
        client: Arc::new(client),
    })
}
