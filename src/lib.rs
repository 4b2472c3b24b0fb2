//! # Paperbot
//!
//! A Telegram bot that looks up past-paper questions for a chosen subject,
//! level and paper, answers them from a cache or a remote paper source, and
//! charges one coin per answered lookup.
//!
//! The lookup core (`cache_store`, `ledger`, `rate_limiter`, `fetcher`,
//! `matcher`, `lookup`) has no Telegram dependency; `bot` and `dialogue`
//! drive it from chat.

pub mod bot;
pub mod cache_store;
pub mod clock;
pub mod config;
pub mod db;
pub mod dialogue;
pub mod errors;
pub mod fetcher;
pub mod ledger;
pub mod localization;
pub mod lookup;
pub mod matcher;
pub mod rate_limiter;
