//! The geocoder adapter: cache, single-flight, throttle, timeout.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crime_brief_models::LatLon;
use futures::FutureExt as _;
use futures::future::{BoxFuture, Shared};
use tokio::time::Instant;

use crate::{CachedLookup, GeocodeCache, GeocodeError, GeocodeProvider, normalize_key};

/// Lookup result shared between concurrent callers. `Shared` requires
/// `Clone` output, so provider errors are carried as their rendered
/// message and rebuilt as [`GeocodeError::Unavailable`] on the way out.
type SharedResult = Result<Option<LatLon>, String>;
type SharedLookup = Shared<BoxFuture<'static, SharedResult>>;

/// Resolves free-text addresses to coordinates.
///
/// See the [crate docs](crate) for the caching, single-flight,
/// throttling, and timeout contracts.
pub struct GeocoderAdapter {
    provider: Arc<dyn GeocodeProvider>,
    cache: Arc<dyn GeocodeCache>,
    timeout: Duration,
    min_delay: Duration,
    inflight: Arc<Mutex<HashMap<String, SharedLookup>>>,
    last_request: Arc<tokio::sync::Mutex<Option<Instant>>>,
}

impl GeocoderAdapter {
    /// Creates an adapter over `provider` and `cache`.
    ///
    /// `timeout` bounds each provider lookup; `min_delay` is the
    /// minimum spacing between provider requests (the rate throttle).
    #[must_use]
    pub fn new(
        provider: Arc<dyn GeocodeProvider>,
        cache: Arc<dyn GeocodeCache>,
        timeout: Duration,
        min_delay: Duration,
    ) -> Self {
        Self {
            provider,
            cache,
            timeout,
            min_delay,
            inflight: Arc::new(Mutex::new(HashMap::new())),
            last_request: Arc::new(tokio::sync::Mutex::new(None)),
        }
    }

    /// Resolves a free-text address to coordinates.
    ///
    /// # Errors
    ///
    /// - [`GeocodeError::NotFound`] — the provider answered but found
    ///   no match (also served from the cached-miss record without a
    ///   provider call).
    /// - [`GeocodeError::Unavailable`] — timeout or provider failure;
    ///   nothing is cached, so a later call retries.
    pub async fn resolve(&self, text: &str) -> Result<LatLon, GeocodeError> {
        let key = normalize_key(text);
        if key.is_empty() {
            return Err(GeocodeError::NotFound);
        }

        match self.cache.get(&key).await {
            Some(CachedLookup::Hit(point)) => return Ok(point),
            Some(CachedLookup::Miss) => return Err(GeocodeError::NotFound),
            None => {}
        }

        let lookup = {
            let mut inflight = self
                .inflight
                .lock()
                .expect("geocoder in-flight map poisoned");
            if let Some(existing) = inflight.get(&key) {
                existing.clone()
            } else {
                let fut = Self::run_lookup(
                    Arc::clone(&self.provider),
                    Arc::clone(&self.cache),
                    Arc::clone(&self.inflight),
                    Arc::clone(&self.last_request),
                    self.timeout,
                    self.min_delay,
                    key.clone(),
                )
                .boxed()
                .shared();
                inflight.insert(key.clone(), fut.clone());
                fut
            }
        };

        match lookup.await {
            Ok(Some(point)) => Ok(point),
            Ok(None) => Err(GeocodeError::NotFound),
            Err(message) => Err(GeocodeError::Unavailable { message }),
        }
    }

    /// The single in-flight lookup for one normalized key. Throttles,
    /// calls the provider under a timeout, writes the cache on a
    /// definitive answer, and removes itself from the in-flight map.
    async fn run_lookup(
        provider: Arc<dyn GeocodeProvider>,
        cache: Arc<dyn GeocodeCache>,
        inflight: Arc<Mutex<HashMap<String, SharedLookup>>>,
        last_request: Arc<tokio::sync::Mutex<Option<Instant>>>,
        timeout: Duration,
        min_delay: Duration,
        key: String,
    ) -> SharedResult {
        if !min_delay.is_zero() {
            let mut last = last_request.lock().await;
            if let Some(prev) = *last {
                let elapsed = prev.elapsed();
                if elapsed < min_delay {
                    tokio::time::sleep(min_delay - elapsed).await;
                }
            }
            *last = Some(Instant::now());
        }

        let outcome = match tokio::time::timeout(timeout, provider.lookup(&key)).await {
            Err(_) => {
                log::warn!("geocode lookup for {key:?} timed out after {timeout:?}");
                Err(format!("lookup timed out after {timeout:?}"))
            }
            Ok(Err(e)) => {
                log::warn!("geocode lookup for {key:?} failed: {e}");
                Err(e.to_string())
            }
            Ok(Ok(None)) => {
                cache.put(&key, CachedLookup::Miss).await;
                Ok(None)
            }
            Ok(Ok(Some(resolved))) => {
                cache.put(&key, CachedLookup::Hit(resolved.point)).await;
                Ok(Some(resolved.point))
            }
        };

        inflight
            .lock()
            .expect("geocoder in-flight map poisoned")
            .remove(&key);

        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::{GeocodedAddress, InMemoryGeocodeCache};

    /// Stub provider with a call counter and scripted behavior.
    struct StubProvider {
        calls: AtomicUsize,
        behavior: Behavior,
    }

    enum Behavior {
        Found(LatLon),
        NotFound,
        Slow(Duration),
    }

    impl StubProvider {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                behavior,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GeocodeProvider for StubProvider {
        async fn lookup(&self, _query: &str) -> Result<Option<GeocodedAddress>, GeocodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Yield so concurrent callers genuinely overlap.
            tokio::time::sleep(Duration::from_millis(10)).await;
            match &self.behavior {
                Behavior::Found(point) => Ok(Some(GeocodedAddress {
                    point: *point,
                    display_name: None,
                })),
                Behavior::NotFound => Ok(None),
                Behavior::Slow(delay) => {
                    tokio::time::sleep(*delay).await;
                    Ok(None)
                }
            }
        }
    }

    fn adapter(provider: Arc<StubProvider>) -> GeocoderAdapter {
        GeocoderAdapter::new(
            provider,
            Arc::new(InMemoryGeocodeCache::default()),
            Duration::from_millis(200),
            Duration::ZERO,
        )
    }

    const POINT: LatLon = LatLon::new(41.8827, -87.6278);

    #[tokio::test]
    async fn concurrent_resolves_share_one_lookup() {
        let provider = StubProvider::new(Behavior::Found(POINT));
        let adapter = adapter(Arc::clone(&provider));

        let (a, b) = tokio::join!(
            adapter.resolve("123 N State St"),
            adapter.resolve("  123 n state ST ")
        );
        assert_eq!(a.unwrap(), POINT);
        assert_eq!(b.unwrap(), POINT);
        assert_eq!(provider.calls(), 1, "normalized duplicates must single-flight");
    }

    #[tokio::test]
    async fn second_resolve_is_served_from_cache() {
        let provider = StubProvider::new(Behavior::Found(POINT));
        let adapter = adapter(Arc::clone(&provider));

        adapter.resolve("123 N State St").await.unwrap();
        adapter.resolve("123 N State St").await.unwrap();
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn not_found_is_cached_too() {
        let provider = StubProvider::new(Behavior::NotFound);
        let adapter = adapter(Arc::clone(&provider));

        for _ in 0..3 {
            let err = adapter.resolve("nowhere at all").await.unwrap_err();
            assert!(matches!(err, GeocodeError::NotFound));
        }
        assert_eq!(provider.calls(), 1, "misses must be cached");
    }

    #[tokio::test]
    async fn timeout_degrades_to_unavailable_and_retries_later() {
        let provider = StubProvider::new(Behavior::Slow(Duration::from_secs(5)));
        let adapter = adapter(Arc::clone(&provider));

        let err = adapter.resolve("123 N State St").await.unwrap_err();
        assert!(matches!(err, GeocodeError::Unavailable { .. }));

        // Nothing cached; a later attempt reaches the provider again.
        let err = adapter.resolve("123 N State St").await.unwrap_err();
        assert!(matches!(err, GeocodeError::Unavailable { .. }));
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn empty_text_is_not_found_without_provider_call() {
        let provider = StubProvider::new(Behavior::Found(POINT));
        let adapter = adapter(Arc::clone(&provider));

        let err = adapter.resolve("   ").await.unwrap_err();
        assert!(matches!(err, GeocodeError::NotFound));
        assert_eq!(provider.calls(), 0);
    }
}
