//! # Lookup Module
//!
//! Composes the ledger, rate limiter, cache, document source and matcher into
//! the paid question lookup.
//!
//! A lookup walks the stages `Idle → RateCheck → CacheCheck → Fetching →
//! Matching → CacheWrite → Debit → Done` and stops early with one of the
//! terminal outcomes. Errors never escape to the caller: they are logged and
//! turned into [`LookupOutcome::Failed`] with the balance left untouched.
//! Only a successful answer (cached, exact or similar) is charged.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::cache_store::{cache_key, CacheStore};
use crate::config::LookupConfig;
use crate::errors::{LookupError, LookupResult};
use crate::fetcher::{DocumentSource, PaperFilter};
use crate::ledger::{User, UserLedger};
use crate::matcher::{Candidate, Document, Matcher};
use crate::rate_limiter::RateLimiter;

pub const FIRST_LOOKUP_ACHIEVEMENT: &str = "first-lookup";

/// Stages of a single lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStage {
    Idle,
    RateCheck,
    CacheCheck,
    Fetching,
    Matching,
    CacheWrite,
    Debit,
    Done,
}

impl std::fmt::Display for LookupStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Result of a lookup as seen by the front-end
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    /// Cached or exactly matched answer
    Answered {
        answer: String,
        from_cache: bool,
        charged: bool,
    },
    /// Best fuzzy answer plus the full ranked list for browsing
    Similar {
        answer: String,
        candidates: Vec<Candidate>,
        charged: bool,
    },
    RateLimited,
    InsufficientFunds {
        balance: i64,
    },
    NoPapersFound,
    NoMatch,
    Failed {
        stage: LookupStage,
    },
}

impl LookupOutcome {
    pub fn charged(&self) -> bool {
        match self {
            LookupOutcome::Answered { charged, .. } | LookupOutcome::Similar { charged, .. } => {
                *charged
            }
            _ => false,
        }
    }
}

/// Follow-up choice among previously returned candidates
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Chosen(Document),
    Invalid,
}

pub fn select_candidate(candidates: &[Candidate], index: usize) -> Selection {
    match candidates.get(index) {
        Some(candidate) => Selection::Chosen(candidate.document.clone()),
        None => Selection::Invalid,
    }
}

struct StageFailure {
    stage: LookupStage,
    error: LookupError,
}

fn at(stage: LookupStage) -> impl FnOnce(LookupError) -> StageFailure {
    move |error| StageFailure { stage, error }
}

#[derive(Clone)]
pub struct LookupService {
    cache: CacheStore,
    ledger: UserLedger,
    limiter: RateLimiter,
    source: Arc<dyn DocumentSource>,
    matcher: Matcher,
    config: LookupConfig,
}

impl LookupService {
    pub fn new(
        cache: CacheStore,
        ledger: UserLedger,
        source: Arc<dyn DocumentSource>,
        config: LookupConfig,
    ) -> Self {
        Self {
            limiter: RateLimiter::new(cache.clone()),
            matcher: Matcher::new(config.similarity_threshold),
            cache,
            ledger,
            source,
            config,
        }
    }

    pub fn ledger(&self) -> &UserLedger {
        &self.ledger
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Load a user, creating the default record on first contact
    pub async fn ensure_user(&self, user_id: i64) -> LookupResult<User> {
        if let Some(user) = self.ledger.get_user(user_id).await? {
            return Ok(user);
        }
        self.ledger.create_user(user_id).await?;
        self.ledger
            .get_user(user_id)
            .await?
            .ok_or(LookupError::UserNotFound(user_id))
    }

    /// Answer `question` for `user_id` within `filter`
    pub async fn lookup(&self, user_id: i64, question: &str, filter: &PaperFilter) -> LookupOutcome {
        match self.run(user_id, question, filter).await {
            Ok(outcome) => {
                info!(user_id = %user_id, filter = %filter, stage = %LookupStage::Done, outcome = %outcome_label(&outcome), charged = outcome.charged(), "Lookup finished");
                outcome
            }
            Err(failure) => {
                error!(user_id = %user_id, filter = %filter, stage = %failure.stage, error = %failure.error, "Lookup failed");
                LookupOutcome::Failed {
                    stage: failure.stage,
                }
            }
        }
    }

    async fn run(
        &self,
        user_id: i64,
        question: &str,
        filter: &PaperFilter,
    ) -> Result<LookupOutcome, StageFailure> {
        let user = self.ensure_user(user_id).await.map_err(at(LookupStage::Idle))?;
        if user.balance <= 0 {
            info!(user_id = %user_id, balance = user.balance, "Lookup refused, no coins left");
            return Ok(LookupOutcome::InsufficientFunds {
                balance: user.balance,
            });
        }

        let limits = &self.config.rate_limit;
        let allowed = self
            .limiter
            .check_and_increment(user_id, limits.max_requests, limits.window())
            .await
            .map_err(at(LookupStage::RateCheck))?;
        if !allowed {
            info!(user_id = %user_id, "Lookup refused, rate limited");
            return Ok(LookupOutcome::RateLimited);
        }

        let key = cache_key(question, &filter.subject, &filter.level, &filter.paper);
        if let Some(answer) = self
            .cache
            .get(&key)
            .await
            .map_err(at(LookupStage::CacheCheck))?
        {
            let charged = self.charge(&user).await;
            return Ok(LookupOutcome::Answered {
                answer,
                from_cache: true,
                charged,
            });
        }

        debug!(user_id = %user_id, stage = %LookupStage::Fetching, "Cache miss, fetching documents");
        let documents = match self.source.fetch_documents(filter).await {
            Ok(documents) if documents.is_empty() => {
                info!(user_id = %user_id, filter = %filter, "Source returned no documents");
                return Ok(LookupOutcome::NoPapersFound);
            }
            Ok(documents) => documents,
            Err(e) => {
                warn!(user_id = %user_id, filter = %filter, stage = %LookupStage::Fetching, error = %e, "Source unreachable");
                return Ok(LookupOutcome::NoPapersFound);
            }
        };

        debug!(user_id = %user_id, stage = %LookupStage::Matching, documents = documents.len(), "Matching question");
        let result = self.matcher.match_question(question, &documents);

        if let Some(exact) = result.exact {
            self.remember(&key, &exact.answer).await?;
            let charged = self.charge(&user).await;
            return Ok(LookupOutcome::Answered {
                answer: exact.answer,
                from_cache: false,
                charged,
            });
        }

        let Some(best) = result.similar.first() else {
            return Ok(LookupOutcome::NoMatch);
        };
        let answer = best.document.answer.clone();
        self.remember(&key, &answer).await?;
        let charged = self.charge(&user).await;

        Ok(LookupOutcome::Similar {
            answer,
            candidates: result.similar,
            charged,
        })
    }

    async fn remember(&self, key: &str, answer: &str) -> Result<(), StageFailure> {
        self.cache
            .put(key, answer, self.config.cache_ttl)
            .await
            .map_err(at(LookupStage::CacheWrite))
    }

    /// Debit one lookup; failures are logged and leave the answer uncharged
    async fn charge(&self, user: &User) -> bool {
        match self
            .ledger
            .update_balance(user.user_id, -self.config.lookup_cost)
            .await
        {
            Ok(_) => {}
            Err(LookupError::UserNotFound(id)) => {
                warn!(user_id = %id, stage = %LookupStage::Debit, "Debit skipped, user missing from ledger");
                return false;
            }
            Err(e) => {
                error!(user_id = %user.user_id, stage = %LookupStage::Debit, error = %e, "Debit failed");
                return false;
            }
        }

        if !user.achievements.iter().any(|a| a == FIRST_LOOKUP_ACHIEVEMENT) {
            if let Err(e) = self
                .ledger
                .add_achievement(user.user_id, FIRST_LOOKUP_ACHIEVEMENT)
                .await
            {
                warn!(user_id = %user.user_id, error = %e, "Failed to record achievement");
            }
        }

        true
    }
}

fn outcome_label(outcome: &LookupOutcome) -> &'static str {
    match outcome {
        LookupOutcome::Answered { from_cache: true, .. } => "cache-hit",
        LookupOutcome::Answered { .. } => "exact",
        LookupOutcome::Similar { .. } => "similar",
        LookupOutcome::RateLimited => "rate-limited",
        LookupOutcome::InsufficientFunds { .. } => "insufficient-funds",
        LookupOutcome::NoPapersFound => "no-papers",
        LookupOutcome::NoMatch => "no-match",
        LookupOutcome::Failed { .. } => "failed",
    }
}
