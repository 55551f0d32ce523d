#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Public incident feed ingestion.
//!
//! The feed publishes incidents with a 3-7 day reporting lag, so fetch
//! windows never end at "now": [`FetchWindow::current`] ends `lag_days`
//! in the past, and windows reaching inside the settle horizon are
//! flagged incomplete so reports can label the most recent data
//! accordingly.
//!
//! [`IncidentRepository`] is the caller-facing surface: it caches
//! results per window, guarantees at-most-one in-flight external fetch
//! per window even under concurrent report generation, and degrades to
//! last-known-good data with a staleness flag when the provider is
//! down.

pub mod repository;
pub mod retry;
pub mod socrata;
pub mod type_mapping;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use crime_brief_models::Incident;

pub use repository::{CachedWindow, IncidentRepository, InMemoryWindowCache, WindowCache, WindowSnapshot};

/// Errors that can occur during data source operations.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The feed is unreachable and no cached data exists to degrade
    /// to. Transient; retryable later.
    #[error("data source unavailable: {message}")]
    Unavailable {
        /// What failed.
        message: String,
    },
}

/// A half-open fetch window `[since, until)` in feed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchWindow {
    /// Inclusive start.
    pub since: DateTime<Utc>,
    /// Exclusive end.
    pub until: DateTime<Utc>,
}

impl FetchWindow {
    /// The current reporting window: `length_days` long, ending
    /// `lag_days` before `now` (the feed's minimum reporting lag).
    #[must_use]
    pub fn current(now: DateTime<Utc>, lag_days: i64, length_days: i64) -> Self {
        let until = now - Duration::days(lag_days);
        Self {
            since: until - Duration::days(length_days),
            until,
        }
    }

    /// The immediately-prior window of equal length.
    #[must_use]
    pub fn prior(&self) -> Self {
        let length = self.until - self.since;
        Self {
            since: self.since - length,
            until: self.since,
        }
    }

    /// Whether this window reaches inside the feed's settle horizon at
    /// `now` — i.e. some of its records may not have been published
    /// yet. The feed lags up to `settle_days` (its maximum lag).
    #[must_use]
    pub fn is_incomplete(&self, now: DateTime<Utc>, settle_days: i64) -> bool {
        self.until > now - Duration::days(settle_days)
    }
}

/// A raw feed the repository fetches from, substitutable in tests.
///
/// Implementations own pagination, retry, and normalization; the
/// returned incidents are already deduplicated by id.
#[async_trait]
pub trait IncidentFeed: Send + Sync {
    /// Fetches every incident in the window.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the feed cannot be reached after
    /// retries or the response cannot be parsed.
    async fn fetch_window(&self, window: FetchWindow) -> Result<Vec<Incident>, SourceError>;
}
