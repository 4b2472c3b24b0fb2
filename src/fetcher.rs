//! # Document Fetcher Module
//!
//! Retrieves the question/answer documents of one (subject, level, paper)
//! filter from the past-paper source.
//!
//! The HTTP fetcher makes a bounded number of attempts, each with its own
//! timeout, separated by a fixed delay plus a little random jitter. Once the
//! attempts are used up the last failure is reported as a fetch error.

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::FetchConfig;
use crate::errors::{LookupError, LookupResult};
use crate::matcher::Document;

/// Coarse filter picked in the menu
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaperFilter {
    pub subject: String,
    pub level: String,
    pub paper: String,
}

impl PaperFilter {
    pub fn new(subject: impl Into<String>, level: impl Into<String>, paper: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            level: level.into(),
            paper: paper.into(),
        }
    }
}

impl std::fmt::Display for PaperFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {} / {}", self.subject, self.level, self.paper)
    }
}

/// Source of past-paper documents
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Fetch all documents for `filter`; an empty list means the source has none
    async fn fetch_documents(&self, filter: &PaperFilter) -> LookupResult<Vec<Document>>;
}

/// Fetches documents as JSON from `{base_url}/papers`
pub struct HttpDocumentFetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

impl HttpDocumentFetcher {
    pub fn new(config: FetchConfig) -> LookupResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.attempt_timeout_secs))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, config })
    }

    fn papers_url(&self) -> String {
        format!("{}/papers", self.config.base_url.trim_end_matches('/'))
    }

    fn retry_delay(&self) -> Duration {
        let jitter = if self.config.retry_jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=self.config.retry_jitter_ms)
        } else {
            0
        };
        Duration::from_millis(self.config.retry_delay_ms + jitter)
    }

    async fn attempt(&self, filter: &PaperFilter) -> LookupResult<Vec<Document>> {
        let response = self
            .client
            .get(self.papers_url())
            .query(&[
                ("subject", filter.subject.as_str()),
                ("level", filter.level.as_str()),
                ("paper", filter.paper.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let documents = response.json::<Vec<Document>>().await?;
        Ok(documents)
    }
}

#[async_trait]
impl DocumentSource for HttpDocumentFetcher {
    async fn fetch_documents(&self, filter: &PaperFilter) -> LookupResult<Vec<Document>> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            debug!(filter = %filter, attempt = attempt, "Fetching documents");

            match self.attempt(filter).await {
                Ok(documents) => {
                    info!(filter = %filter, documents = documents.len(), attempt = attempt, "Documents fetched");
                    return Ok(documents);
                }
                Err(e) => {
                    warn!(filter = %filter, attempt = attempt, max_attempts = max_attempts, error = %e, "Document fetch attempt failed");
                    last_error = Some(e);
                    if attempt < max_attempts {
                        tokio::time::sleep(self.retry_delay()).await;
                    }
                }
            }
        }

        let reason = last_error.map(|e| e.to_string()).unwrap_or_default();
        Err(LookupError::Fetch(format!(
            "gave up after {max_attempts} attempts: {reason}"
        )))
    }
}
