//! # Lookup Error Types Module
//!
//! This module defines the error taxonomy shared by the stores, the document
//! fetcher and the lookup orchestrator.

/// Custom error types for lookup operations
#[derive(Debug, Clone, PartialEq)]
pub enum LookupError {
    /// Durable store I/O failure
    Storage(String),
    /// Document source unreachable or malformed after the retry budget
    Fetch(String),
    /// Ledger mutation targeting an absent user
    UserNotFound(i64),
}

impl std::fmt::Display for LookupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupError::Storage(msg) => write!(f, "Storage error: {msg}"),
            LookupError::Fetch(msg) => write!(f, "Fetch error: {msg}"),
            LookupError::UserNotFound(id) => write!(f, "User not found: {id}"),
        }
    }
}

impl std::error::Error for LookupError {}

impl From<sqlx::Error> for LookupError {
    fn from(err: sqlx::Error) -> Self {
        LookupError::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for LookupError {
    fn from(err: reqwest::Error) -> Self {
        LookupError::Fetch(err.to_string())
    }
}

impl From<serde_json::Error> for LookupError {
    fn from(err: serde_json::Error) -> Self {
        LookupError::Storage(format!("corrupt record: {err}"))
    }
}

pub type LookupResult<T> = Result<T, LookupError>;
