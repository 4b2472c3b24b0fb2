//! # Cache Store Module
//!
//! Durable key-value map from a composite lookup key to a cached answer, with
//! optional per-entry expiry. Expired entries are evicted lazily: a read that
//! finds one deletes it and reports the key as absent. Entries that are never
//! read again are removed by [`CacheStore::purge_expired`], which the binary
//! runs periodically.

use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::clock::Clock;
use crate::errors::LookupResult;

/// A cached value together with its expiry
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub value: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Build the cache key of a lookup
pub fn cache_key(question: &str, subject: &str, level: &str, paper: &str) -> String {
    format!("{}:{subject}:{level}:{paper}", question.trim())
}

#[derive(Clone)]
pub struct CacheStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Upsert `value` under `key`, expiring after `ttl` when given
    pub async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> LookupResult<()> {
        // An unrepresentable ttl degrades to no expiry
        let expires_at = ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .and_then(|ttl| self.now().checked_add_signed(ttl));
        self.put_until(key, value, expires_at).await
    }

    /// Upsert `value` under `key` with an absolute expiry
    pub async fn put_until(
        &self,
        key: &str,
        value: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> LookupResult<()> {
        debug!(key = %key, expires_at = ?expires_at, "Writing cache entry");

        sqlx::query(
            "INSERT INTO cache (key, value, expire_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, expire_at = excluded.expire_at",
        )
        .bind(key)
        .bind(value)
        .bind(expires_at.map(|at| at.timestamp_millis()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetch the live value under `key`
    pub async fn get(&self, key: &str) -> LookupResult<Option<String>> {
        Ok(self.get_entry(key).await?.map(|entry| entry.value))
    }

    /// Fetch the live entry under `key`, evicting it if it has expired
    pub async fn get_entry(&self, key: &str) -> LookupResult<Option<CacheEntry>> {
        let row = sqlx::query("SELECT value, expire_at FROM cache WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            debug!(key = %key, "Cache miss");
            return Ok(None);
        };

        let expire_at: Option<i64> = row.try_get("expire_at")?;
        let entry = CacheEntry {
            key: key.to_string(),
            value: row.try_get("value")?,
            expires_at: expire_at.and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        };

        if entry.is_expired(self.now()) {
            debug!(key = %key, "Cache entry expired, evicting");
            self.delete(key).await?;
            return Ok(None);
        }

        debug!(key = %key, "Cache hit");
        Ok(Some(entry))
    }

    /// Remove `key`; missing keys are ignored
    pub async fn delete(&self, key: &str) -> LookupResult<()> {
        sqlx::query("DELETE FROM cache WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete every expired entry, returning how many were removed
    pub async fn purge_expired(&self) -> LookupResult<u64> {
        let result = sqlx::query("DELETE FROM cache WHERE expire_at IS NOT NULL AND expire_at <= ?1")
            .bind(self.now().timestamp_millis())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
