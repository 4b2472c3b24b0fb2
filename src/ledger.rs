//! # User Ledger Module
//!
//! Per-user coin balance and preferences.
//!
//! The local SQLite store is the ledger of record: every read of a balance and
//! every mutation goes there. An optional primary directory (a remote Postgres
//! table) is only consulted when the local store has no row for a user. A
//! record found there is imported into the local store once and the local copy
//! is authoritative from then on. The primary is never written, and any
//! failure talking to it is logged and treated as a miss.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPool;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::STARTING_COINS;
use crate::errors::{LookupError, LookupResult};

/// Supported interface languages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    En,
    Fr,
}

impl Locale {
    pub fn code(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Fr => "fr",
        }
    }

    /// Parse a stored or Telegram-provided code; anything unknown is English
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_lowercase().split(['-', '_']).next() {
            Some("fr") => Locale::Fr,
            _ => Locale::En,
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Represents a user record in the ledger
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub user_id: i64,
    pub balance: i64,
    pub locale: Locale,
    pub achievements: Vec<String>,
}

impl User {
    fn from_columns(user_id: i64, coins: i64, language: &str, achievements: &str) -> LookupResult<Self> {
        Ok(Self {
            user_id,
            balance: coins,
            locale: Locale::from_code(language),
            achievements: serde_json::from_str(achievements)?,
        })
    }
}

/// Read-only user lookup in a primary store
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, user_id: i64) -> LookupResult<Option<User>>;
}

/// Primary directory backed by a Postgres `users` table
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_user(&self, user_id: i64) -> LookupResult<Option<User>> {
        let row = sqlx::query(
            "SELECT user_id, coins, language, achievements FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let language: String = row.try_get("language")?;
                let achievements: String = row.try_get("achievements")?;
                Ok(Some(User::from_columns(
                    row.try_get("user_id")?,
                    row.try_get("coins")?,
                    &language,
                    &achievements,
                )?))
            }
            None => Ok(None),
        }
    }
}

#[derive(Clone)]
pub struct UserLedger {
    primary: Option<Arc<dyn UserDirectory>>,
    pool: SqlitePool,
}

impl UserLedger {
    /// Ledger backed only by the local store
    pub fn new(pool: SqlitePool) -> Self {
        Self { primary: None, pool }
    }

    /// Ledger that seeds unknown users from `primary`
    pub fn with_primary(pool: SqlitePool, primary: Arc<dyn UserDirectory>) -> Self {
        Self {
            primary: Some(primary),
            pool,
        }
    }

    /// Look a user up in the local ledger, importing it from the primary on a miss
    pub async fn get_user(&self, user_id: i64) -> LookupResult<Option<User>> {
        if let Some(user) = self.get_local_user(user_id).await? {
            return Ok(Some(user));
        }

        let Some(user) = self.find_in_primary(user_id).await else {
            return Ok(None);
        };
        self.import_user(&user).await?;
        self.get_local_user(user_id).await
    }

    async fn find_in_primary(&self, user_id: i64) -> Option<User> {
        let primary = self.primary.as_ref()?;
        match primary.find_user(user_id).await {
            Ok(Some(user)) => {
                debug!(user_id = %user_id, "User found in primary store");
                Some(user)
            }
            Ok(None) => {
                debug!(user_id = %user_id, "User not in primary store");
                None
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Primary store unavailable, treating as a miss");
                None
            }
        }
    }

    /// Copy a primary record into the local store unless a local row appeared meanwhile
    async fn import_user(&self, user: &User) -> LookupResult<()> {
        let result = sqlx::query(
            "INSERT INTO users (user_id, coins, language, achievements)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO NOTHING",
        )
        .bind(user.user_id)
        .bind(user.balance)
        .bind(user.locale.code())
        .bind(serde_json::to_string(&user.achievements)?)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            info!(user_id = %user.user_id, coins = user.balance, "User imported from primary store");
        }
        Ok(())
    }

    async fn get_local_user(&self, user_id: i64) -> LookupResult<Option<User>> {
        let row = sqlx::query(
            "SELECT user_id, coins, language, achievements FROM users WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let language: String = row.try_get("language")?;
                let achievements: String = row.try_get("achievements")?;
                debug!(user_id = %user_id, "User found in local store");
                Ok(Some(User::from_columns(
                    row.try_get("user_id")?,
                    row.try_get("coins")?,
                    &language,
                    &achievements,
                )?))
            }
            None => {
                debug!(user_id = %user_id, "User not found");
                Ok(None)
            }
        }
    }

    /// Insert the default record unless one exists; returns whether a row was created
    pub async fn create_user(&self, user_id: i64) -> LookupResult<bool> {
        let result = sqlx::query(
            "INSERT INTO users (user_id, coins, language, achievements)
             VALUES (?1, ?2, ?3, '[]')
             ON CONFLICT(user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(STARTING_COINS)
        .bind(Locale::default().code())
        .execute(&self.pool)
        .await?;

        let created = result.rows_affected() > 0;
        if created {
            info!(user_id = %user_id, coins = STARTING_COINS, "User created");
        }
        Ok(created)
    }

    /// Apply `balance += delta`, returning the new balance. Not clamped.
    pub async fn update_balance(&self, user_id: i64, delta: i64) -> LookupResult<i64> {
        let balance: Option<i64> = sqlx::query_scalar(
            "UPDATE users SET coins = coins + ?1 WHERE user_id = ?2 RETURNING coins",
        )
        .bind(delta)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match balance {
            Some(balance) => {
                info!(user_id = %user_id, delta = delta, balance = balance, "Balance updated");
                Ok(balance)
            }
            None => Err(LookupError::UserNotFound(user_id)),
        }
    }

    pub async fn set_locale(&self, user_id: i64, locale: Locale) -> LookupResult<()> {
        let result = sqlx::query("UPDATE users SET language = ?1 WHERE user_id = ?2")
            .bind(locale.code())
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LookupError::UserNotFound(user_id));
        }
        info!(user_id = %user_id, locale = %locale, "Locale updated");
        Ok(())
    }

    /// Append an achievement once; returns whether it was new
    pub async fn add_achievement(&self, user_id: i64, achievement: &str) -> LookupResult<bool> {
        let mut tx = self.pool.begin().await?;

        let current: Option<String> =
            sqlx::query_scalar("SELECT achievements FROM users WHERE user_id = ?1")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(current) = current else {
            return Err(LookupError::UserNotFound(user_id));
        };

        let mut achievements: Vec<String> = serde_json::from_str(&current)?;
        if achievements.iter().any(|a| a == achievement) {
            return Ok(false);
        }
        achievements.push(achievement.to_string());

        sqlx::query("UPDATE users SET achievements = ?1 WHERE user_id = ?2")
            .bind(serde_json::to_string(&achievements)?)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(user_id = %user_id, achievement = %achievement, "Achievement unlocked");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locale_codes() {
        assert_eq!(Locale::from_code("fr"), Locale::Fr);
        assert_eq!(Locale::from_code("fr-CA"), Locale::Fr);
        assert_eq!(Locale::from_code("FR"), Locale::Fr);
        assert_eq!(Locale::from_code("en-US"), Locale::En);
        assert_eq!(Locale::from_code("de"), Locale::En);
        assert_eq!(Locale::Fr.to_string(), "fr");
    }

    #[test]
    fn test_user_from_columns_parses_achievements() {
        let user = User::from_columns(1, 3, "fr", r#"["first-question"]"#).unwrap();
        assert_eq!(user.locale, Locale::Fr);
        assert_eq!(user.achievements, vec!["first-question".to_string()]);

        assert!(User::from_columns(1, 3, "en", "not json").is_err());
    }
}
