use sqlx::SqlitePool;
use tracing::info;

/// Returns the installation's device id, generating and storing one on first use.
pub async fn device_id(pool: &SqlitePool) -> anyhow::Result<String> {
    if let Some(existing) = read(pool).await? {
        return Ok(existing);
    }
    let fresh = uuid::Uuid::new_v4().to_string().to_uppercase();
    // Another connection may have won the race; the row it wrote is the one we keep.
    sqlx::query(
        "INSERT OR IGNORE INTO installation (id, device_id, created_at) VALUES (1, ?1, strftime('%s','now'))",
    )
    .bind(&fresh)
    .execute(pool)
    .await?;
    let stored: String = sqlx::query_scalar("SELECT device_id FROM installation WHERE id = 1")
        .fetch_one(pool)
        .await?;
    info!(device_id = %stored, "generated installation identifier");
    Ok(stored)
}

async fn read(pool: &SqlitePool) -> anyhow::Result<Option<String>> {
    let row = sqlx::query_scalar("SELECT device_id FROM installation WHERE id = 1")
        .fetch_optional(pool)
        .await?;
    Ok(row)
}
