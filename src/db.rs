use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::time::Duration;
use tracing::info;

const SQLITE_MAX_CONNECTIONS: u32 = 5;
const PRIMARY_MAX_CONNECTIONS: u32 = 5;

/// Open (creating if needed) the local SQLite database
pub async fn connect_sqlite(path: &str, acquire_timeout: Duration) -> Result<SqlitePool> {
    info!(path = %path, "Opening local SQLite database");

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(acquire_timeout);

    let pool = SqlitePoolOptions::new()
        .max_connections(SQLITE_MAX_CONNECTIONS)
        .acquire_timeout(acquire_timeout)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open SQLite database at {path}"))?;

    Ok(pool)
}

/// Initialize the local database schema
pub async fn init_database_schema(pool: &SqlitePool) -> Result<()> {
    info!("Initializing database schema...");

    // Ledger of record
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (
            user_id INTEGER PRIMARY KEY,
            coins INTEGER NOT NULL DEFAULT 10,
            language TEXT NOT NULL DEFAULT 'en',
            achievements TEXT NOT NULL DEFAULT '[]'
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create users table")?;

    // Answer cache and rate windows
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS cache (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            expire_at INTEGER
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create cache table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS cache_expire_at ON cache (expire_at)")
        .execute(pool)
        .await
        .context("Failed to create cache expiry index")?;

    info!("Database schema initialized successfully");
    Ok(())
}

/// Build a lazily connected pool for the primary user store.
///
/// No connection is attempted here; failures show up on first use and are
/// treated as misses by the ledger.
pub fn connect_primary(url: &str, acquire_timeout: Duration) -> Result<PgPool> {
    info!("Configuring primary user store");

    let pool = PgPoolOptions::new()
        .max_connections(PRIMARY_MAX_CONNECTIONS)
        .acquire_timeout(acquire_timeout)
        .connect_lazy(url)
        .context("Invalid primary store connection string")?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup_test_db() -> Result<(SqlitePool, TempDir)> {
        let dir = TempDir::new()?;
        let path = dir.path().join("test.db");
        let pool = connect_sqlite(&path.to_string_lossy(), Duration::from_secs(5)).await?;
        init_database_schema(&pool).await?;
        Ok((pool, dir))
    }

    #[tokio::test]
    async fn test_schema_creates_tables() -> Result<()> {
        let (pool, _dir) = setup_test_db().await?;

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&pool)
        .await?;

        assert!(tables.contains(&"users".to_string()));
        assert!(tables.contains(&"cache".to_string()));

        Ok(())
    }

    #[tokio::test]
    async fn test_schema_init_is_idempotent() -> Result<()> {
        let (pool, _dir) = setup_test_db().await?;

        sqlx::query("INSERT INTO users (user_id) VALUES (7)")
            .execute(&pool)
            .await?;

        // Second init must neither fail nor wipe rows
        init_database_schema(&pool).await?;

        let coins: i64 = sqlx::query_scalar("SELECT coins FROM users WHERE user_id = 7")
            .fetch_one(&pool)
            .await?;
        assert_eq!(coins, 10);

        Ok(())
    }

    #[tokio::test]
    async fn test_data_survives_reopen() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("durable.db");
        let path = path.to_string_lossy().to_string();

        {
            let pool = connect_sqlite(&path, Duration::from_secs(5)).await?;
            init_database_schema(&pool).await?;
            sqlx::query("INSERT INTO cache (key, value) VALUES ('k', 'v')")
                .execute(&pool)
                .await?;
            pool.close().await;
        }

        let pool = connect_sqlite(&path, Duration::from_secs(5)).await?;
        let value: String = sqlx::query_scalar("SELECT value FROM cache WHERE key = 'k'")
            .fetch_one(&pool)
            .await?;
        assert_eq!(value, "v");

        Ok(())
    }

    #[tokio::test]
    async fn test_connect_primary_rejects_garbage_url() {
        assert!(connect_primary("not a url", Duration::from_secs(1)).is_err());
    }
}
