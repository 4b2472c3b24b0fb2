//! # Rate Limiter Module
//!
//! Fixed-window request counter per user, persisted in the cache table under
//! `rate_limit:{user_id}`.
//!
//! A window starts on the first request after the previous one expired and
//! lasts `window` from that moment. Requests inside a window increment the
//! counter without moving its expiry. Because windows are fixed rather than
//! sliding, a burst straddling a window boundary can admit up to twice
//! `max_requests` in quick succession.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, warn};

use crate::cache_store::CacheStore;
use crate::errors::LookupResult;

/// Current counter state of one user
#[derive(Debug, Clone, PartialEq)]
pub struct RateWindow {
    pub user_id: i64,
    pub count: u32,
    pub expires_at: DateTime<Utc>,
}

pub fn rate_limit_key(user_id: i64) -> String {
    format!("rate_limit:{user_id}")
}

#[derive(Clone)]
pub struct RateLimiter {
    store: CacheStore,
}

impl RateLimiter {
    pub fn new(store: CacheStore) -> Self {
        Self { store }
    }

    /// Read the live window of `user_id`, if any
    pub async fn window(&self, user_id: i64) -> LookupResult<Option<RateWindow>> {
        let key = rate_limit_key(user_id);
        let Some(entry) = self.store.get_entry(&key).await? else {
            return Ok(None);
        };

        let (Ok(count), Some(expires_at)) = (entry.value.parse::<u32>(), entry.expires_at) else {
            // Unreadable windows are dropped and restart from zero
            warn!(user_id = %user_id, value = %entry.value, "Discarding malformed rate window");
            self.store.delete(&key).await?;
            return Ok(None);
        };

        Ok(Some(RateWindow {
            user_id,
            count,
            expires_at,
        }))
    }

    /// Count one request against the user's window.
    ///
    /// Returns `false` without counting when the window is already full.
    pub async fn check_and_increment(
        &self,
        user_id: i64,
        max_requests: u32,
        window: Duration,
    ) -> LookupResult<bool> {
        let now = self.store.now();

        let (count, expires_at) = match self.window(user_id).await? {
            Some(current) if now < current.expires_at => (current.count, current.expires_at),
            _ => {
                let length = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::zero());
                (0, now + length)
            }
        };

        if count >= max_requests {
            debug!(user_id = %user_id, count = count, "Rate limit reached");
            return Ok(false);
        }

        let count = count + 1;
        self.store
            .put_until(&rate_limit_key(user_id), &count.to_string(), Some(expires_at))
            .await?;

        debug!(user_id = %user_id, count = count, expires_at = %expires_at, "Request admitted");
        Ok(true)
    }
}
