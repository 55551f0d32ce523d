#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Free-text address resolution for the crime brief service.
//!
//! The adapter is the sole source of spatial coordinates for users. It
//! wraps a provider (Nominatim in production, a stub in tests) with:
//!
//! - a normalized-text cache that stores hits *and* misses, so a bad
//!   address doesn't re-query the provider on every report run;
//! - single-flight per distinct normalized text — concurrent callers
//!   for the same address share one outstanding lookup;
//! - a minimum-delay throttle to stay under the provider's documented
//!   ceiling (Nominatim: 1 request per second);
//! - a bounded per-lookup timeout, after which the lookup fails as
//!   [`GeocodeError::Unavailable`] (retryable) rather than hanging the
//!   pipeline.

pub mod adapter;
pub mod nominatim;

use async_trait::async_trait;
use crime_brief_models::LatLon;

pub use adapter::GeocoderAdapter;

/// A provider lookup result with coordinates and the matched address.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedAddress {
    /// Resolved coordinates (WGS84).
    pub point: LatLon,
    /// The matched/canonical address returned by the provider.
    pub display_name: Option<String>,
}

/// Errors from geocoding operations.
#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// Rate limit exceeded at the provider.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// The address does not resolve to a location. User-correctable;
    /// callers should prompt for a different address, not retry.
    #[error("address not found")]
    NotFound,

    /// The provider timed out or errored. Transient; callers may retry
    /// later rather than treating the address as invalid.
    #[error("geocoding unavailable: {message}")]
    Unavailable {
        /// What failed.
        message: String,
    },
}

/// Remote lookup behind the adapter, substitutable in tests.
#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    /// Resolves a free-text query. `Ok(None)` means the provider
    /// answered but found no match.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the request or response parsing
    /// fails.
    async fn lookup(&self, query: &str) -> Result<Option<GeocodedAddress>, GeocodeError>;
}

/// A cached lookup outcome. Misses are cached alongside hits so
/// unresolvable addresses don't hammer the provider.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedLookup {
    /// The address resolved to this point.
    Hit(LatLon),
    /// The provider answered definitively: no match.
    Miss,
}

/// Address-text -> point cache, keyed by [`normalize_key`] output.
///
/// Implementations must be safe under concurrent access. Only the
/// schema matters to the engine; the reference implementation is
/// in-memory.
#[async_trait]
pub trait GeocodeCache: Send + Sync {
    /// Looks up a prior outcome for a normalized address key.
    async fn get(&self, key: &str) -> Option<CachedLookup>;

    /// Records a lookup outcome.
    async fn put(&self, key: &str, entry: CachedLookup);
}

/// In-memory [`GeocodeCache`] reference implementation.
#[derive(Debug, Default)]
pub struct InMemoryGeocodeCache {
    entries: tokio::sync::RwLock<std::collections::BTreeMap<String, CachedLookup>>,
}

#[async_trait]
impl GeocodeCache for InMemoryGeocodeCache {
    async fn get(&self, key: &str) -> Option<CachedLookup> {
        self.entries.read().await.get(key).cloned()
    }

    async fn put(&self, key: &str, entry: CachedLookup) {
        self.entries.write().await.insert(key.to_string(), entry);
    }
}

/// Normalizes address text into a cache key: trimmed, lowercased,
/// interior whitespace collapsed.
#[must_use]
pub fn normalize_key(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace_and_case() {
        assert_eq!(
            normalize_key("  123  N State\tSt  "),
            "123 n state st"
        );
        assert_eq!(normalize_key("123 N State St"), normalize_key("123 n state st"));
    }

    #[tokio::test]
    async fn cache_stores_hits_and_misses() {
        let cache = InMemoryGeocodeCache::default();
        cache
            .put("a", CachedLookup::Hit(LatLon::new(41.0, -87.0)))
            .await;
        cache.put("b", CachedLookup::Miss).await;

        assert!(matches!(cache.get("a").await, Some(CachedLookup::Hit(_))));
        assert_eq!(cache.get("b").await, Some(CachedLookup::Miss));
        assert_eq!(cache.get("c").await, None);
    }
}
