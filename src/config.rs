//! # Configuration Module
//!
//! This module defines configuration structures for the lookup pipeline,
//! including rate limiting, document fetching, matching and store settings.
//! Values come from the environment (optionally a `.env` file) and fall back
//! to the defaults below.

use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

// Constants for lookup configuration
pub const STARTING_COINS: i64 = 10;
pub const LOOKUP_COST: i64 = 1;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600; // 1 hour
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;
pub const MAX_DISPLAYED_CANDIDATES: usize = 5;
pub const DEFAULT_SQLITE_PATH: &str = "paperbot.db";

/// Rate limiting configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum number of lookups admitted per window
    pub max_requests: u32,
    /// Length of one fixed window in seconds
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window_secs: 60, // 1 minute
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Document fetching configuration
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Base URL of the past-paper source
    pub base_url: String,
    /// Maximum number of attempts per fetch
    pub max_attempts: u32,
    /// Fixed delay between attempts in milliseconds
    pub retry_delay_ms: u64,
    /// Upper bound of the random jitter added to the delay in milliseconds
    pub retry_jitter_ms: u64,
    /// Timeout for a single attempt in seconds
    pub attempt_timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: String::from("http://localhost:8080"),
            max_attempts: 3,
            retry_delay_ms: 1000, // 1 second
            retry_jitter_ms: 250,
            attempt_timeout_secs: 30, // 30 seconds
        }
    }
}

/// Lookup orchestration configuration
#[derive(Debug, Clone)]
pub struct LookupConfig {
    /// Coins charged for a successful lookup
    pub lookup_cost: i64,
    /// Time-to-live of cached answers, `None` keeps them forever
    pub cache_ttl: Option<Duration>,
    /// Minimum similarity score for fuzzy candidates
    pub similarity_threshold: f64,
    pub rate_limit: RateLimitConfig,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            lookup_cost: LOOKUP_COST,
            cache_ttl: Some(Duration::from_secs(DEFAULT_CACHE_TTL_SECS)),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Durable store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path of the local SQLite database (ledger, cache and rate windows)
    pub sqlite_path: String,
    /// Connection string of the primary user store, if any
    pub primary_url: Option<String>,
    /// Connection acquire timeout for every pool in seconds
    pub acquire_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sqlite_path: DEFAULT_SQLITE_PATH.to_string(),
            primary_url: None,
            acquire_timeout_secs: 10,
        }
    }
}

impl StoreConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

/// Complete process configuration
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub telegram_token: String,
    pub lookup: LookupConfig,
    pub fetch: FetchConfig,
    pub store: StoreConfig,
}

impl BotConfig {
    /// Build the configuration from environment variables.
    ///
    /// `TELEGRAM_BOT_TOKEN` and `PAPERS_SOURCE_URL` are required; everything
    /// else falls back to its default.
    pub fn from_env() -> Result<Self> {
        let telegram_token =
            env::var("TELEGRAM_BOT_TOKEN").context("TELEGRAM_BOT_TOKEN must be set")?;
        let base_url = env::var("PAPERS_SOURCE_URL").context("PAPERS_SOURCE_URL must be set")?;

        let rate_defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            max_requests: env_or("RATE_LIMIT_MAX_REQUESTS", rate_defaults.max_requests)?,
            window_secs: env_or("RATE_LIMIT_WINDOW_SECS", rate_defaults.window_secs)?,
        };

        // CACHE_TTL_SECS=0 disables expiry
        let ttl_secs = env_or("CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)?;
        let lookup = LookupConfig {
            cache_ttl: (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs)),
            similarity_threshold: env_or("SIMILARITY_THRESHOLD", DEFAULT_SIMILARITY_THRESHOLD)?,
            rate_limit,
            ..LookupConfig::default()
        };

        let fetch_defaults = FetchConfig::default();
        let fetch = FetchConfig {
            base_url,
            max_attempts: env_or("FETCH_MAX_ATTEMPTS", fetch_defaults.max_attempts)?,
            attempt_timeout_secs: env_or("FETCH_TIMEOUT_SECS", fetch_defaults.attempt_timeout_secs)?,
            ..fetch_defaults
        };

        let store = StoreConfig {
            sqlite_path: env::var("SQLITE_PATH").unwrap_or_else(|_| DEFAULT_SQLITE_PATH.to_string()),
            primary_url: env::var("PRIMARY_DATABASE_URL").ok().filter(|url| !url.is_empty()),
            ..StoreConfig::default()
        };

        Ok(Self {
            telegram_token,
            lookup,
            fetch,
            store,
        })
    }
}

/// Read an optional variable, parsing it when present
fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid value for {name}: {e}")),
        Err(_) => Ok(default),
    }
}
