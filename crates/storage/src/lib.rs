//! Storage layer: SQLite pool setup, migrations, installation identity and
//! the persistent blob cache.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

pub mod blobs;
pub mod installation;

pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let mut url = database_url.to_string();
    if !database_url.starts_with("sqlite:") {
        let path = std::path::PathBuf::from(database_url);
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let norm = path.to_string_lossy().replace('\\', "/");
        if path.is_absolute() {
            url = format!("sqlite:///{}", norm.trim_start_matches('/'));
        } else {
            url = format!("sqlite://{}", norm);
        }
        url.push_str("?mode=rwc");
    }
    let mut opts = SqlitePoolOptions::new();
    if url.contains("memory") {
        opts = opts.max_connections(1);
    } else {
        opts = opts.max_connections(5);
    }
    let pool = opts.connect(&url).await?;
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
    // Idempotent; migrations live in crates/storage/migrations.
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn open(database_url: &str) -> anyhow::Result<SqlitePool> {
    let pool = connect(database_url).await?;
    migrate(&pool).await?;
    Ok(pool)
}
