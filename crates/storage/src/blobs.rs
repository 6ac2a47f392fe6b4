//! Persistent cache of fetched file bytes, keyed by URL.
//!
//! Each row carries a blake3 checksum of its data; a row whose data no longer
//! matches is treated as a miss and removed.

use sqlx::{Row, SqlitePool};
use tracing::warn;

pub async fn get(pool: &SqlitePool, url: &str) -> anyhow::Result<Option<Vec<u8>>> {
    let row = sqlx::query("SELECT data, checksum FROM blob_cache WHERE url = ?1")
        .bind(url)
        .fetch_optional(pool)
        .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let data: Vec<u8> = row.try_get("data")?;
    let checksum: String = row.try_get("checksum")?;
    if blake3::hash(&data).to_hex().as_str() != checksum {
        warn!(url, "cached blob failed checksum, dropping");
        remove(pool, url).await?;
        return Ok(None);
    }
    Ok(Some(data))
}

pub async fn put(pool: &SqlitePool, url: &str, data: &[u8]) -> anyhow::Result<()> {
    let checksum = blake3::hash(data).to_hex().to_string();
    sqlx::query(
        "INSERT INTO blob_cache (url, data, checksum, size, seq, fetched_at)
         VALUES (?1, ?2, ?3, ?4,
                 (SELECT COALESCE(MAX(seq), 0) + 1 FROM blob_cache),
                 strftime('%s','now'))
         ON CONFLICT(url) DO UPDATE SET
           data=excluded.data,
           checksum=excluded.checksum,
           size=excluded.size,
           seq=excluded.seq,
           fetched_at=excluded.fetched_at",
    )
    .bind(url)
    .bind(data)
    .bind(checksum)
    .bind(data.len() as i64)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn remove(pool: &SqlitePool, url: &str) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM blob_cache WHERE url = ?1")
        .bind(url)
        .execute(pool)
        .await?;
    Ok(())
}

/// Keeps the `keep` most recently fetched entries. Returns how many were removed.
pub async fn prune(pool: &SqlitePool, keep: i64) -> anyhow::Result<u64> {
    let done = sqlx::query(
        "DELETE FROM blob_cache WHERE url NOT IN
           (SELECT url FROM blob_cache ORDER BY seq DESC LIMIT ?1)",
    )
    .bind(keep)
    .execute(pool)
    .await?;
    Ok(done.rows_affected())
}
