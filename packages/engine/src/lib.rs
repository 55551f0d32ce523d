#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! The crime brief engine.
//!
//! Ties the pipeline together behind the three entry points the
//! transport layer consumes — [`Engine::request_report`],
//! [`Engine::set_address`], [`Engine::entitlement_summary`] — plus the
//! subscription commands ([`Engine::begin_checkout`],
//! [`Engine::cancel_subscription`], [`Engine::apply_payment_event`])
//! and user lifecycle ([`Engine::register_user`],
//! [`Engine::delete_user`]).
//!
//! Report flow: entitlement gate -> lazy geocode -> window fetch
//! (current + prior) -> proximity filter -> analyzer -> renderer.
//! Every entitlement check is derived from the subscription record at
//! call time, never cached. Payment events are deduplicated by event
//! id and applied under a per-user lock, so duplicate or concurrently
//! delivered notifications cannot double-activate or double-extend.

pub mod clock;
pub mod config;
pub mod store;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use crime_brief_analytics::{AnalyzerOptions, PeriodIncidents, analyze};
use crime_brief_geocoder::{
    GeocodeError, GeocoderAdapter, InMemoryGeocodeCache, nominatim::NominatimProvider,
};
use crime_brief_models::{
    Address, AddressLabel, Plan, Subscription, SubscriptionStatus, User, UserId,
};
use crime_brief_report::{RenderOptions, Report, ReportMeta, render};
use crime_brief_source::{
    FetchWindow, IncidentRepository, InMemoryWindowCache, SourceError,
    socrata::{SocrataConfig, SocrataFeed},
};
use crime_brief_spatial::filter_within;
use crime_brief_subscription::{
    SubscriptionError,
    event::PaymentEvent,
    machine::{self, Outcome},
    new_correlation_ref,
};
use serde::{Deserialize, Serialize};

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::EngineConfig;
pub use store::{InMemoryUserStore, StoreError, UserStore};

/// Errors surfaced by engine commands.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No record for this user identity.
    #[error("unknown user {0}")]
    UnknownUser(UserId),

    /// The user has no saved address to report on.
    #[error("no address saved")]
    NoAddress,

    /// The user is not entitled to the report engine. Surfaced to the
    /// transport as an upsell prompt, not a system error.
    #[error("subscription required (plan {plan}, currently {status})")]
    EntitlementDenied {
        /// The user's plan at denial time.
        plan: Plan,
        /// Effective status at denial time (lazy expiry applied).
        status: SubscriptionStatus,
    },

    /// Address resolution failed.
    #[error(transparent)]
    Geocode(#[from] GeocodeError),

    /// Incident feed failed with no cached fallback.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Subscription command or payload failure.
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What applying an inbound payment notification did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    /// The event mutated (or deliberately didn't mutate) the matched
    /// user's subscription; see the inner outcome.
    Applied {
        /// The matched user.
        user_id: UserId,
        /// The state machine's outcome.
        outcome: Outcome,
    },
    /// The event id was already processed. Benign no-op.
    Duplicate,
    /// No subscription carries the event's correlation reference.
    /// Acknowledged and logged as an anomaly.
    Unmatched,
}

/// Subscription summary for the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSummary {
    /// Plan tier.
    pub plan: Plan,
    /// Effective status (lazy expiry applied).
    pub status: SubscriptionStatus,
    /// End of the paid period, if any.
    pub period_end: Option<DateTime<Utc>>,
    /// Whether the report engine is usable right now.
    pub entitled: bool,
}

/// The engine. Cheap to share behind an [`Arc`]; all methods take
/// `&self` and distinct users' operations run concurrently.
pub struct Engine {
    store: Arc<dyn UserStore>,
    geocoder: Arc<GeocoderAdapter>,
    repository: Arc<IncidentRepository>,
    config: EngineConfig,
    analyzer_options: AnalyzerOptions,
    render_options: RenderOptions,
    clock: Arc<dyn Clock>,
    user_locks: Mutex<HashMap<UserId, Arc<tokio::sync::Mutex<()>>>>,
}

impl Engine {
    /// Creates an engine over injected collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn UserStore>,
        geocoder: Arc<GeocoderAdapter>,
        repository: Arc<IncidentRepository>,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let analyzer_options = AnalyzerOptions {
            cluster_threshold_miles: config.report.cluster_threshold_miles,
            min_cluster_size: config.report.min_cluster_size,
            max_hotspots: config.report.max_hotspots,
        };
        let render_options = RenderOptions {
            max_recommendations: config.report.max_recommendations,
            elevated_threshold: config.report.elevated_threshold,
        };
        Self {
            store,
            geocoder,
            repository,
            config,
            analyzer_options,
            render_options,
            clock,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Creates an engine with the production collaborators: Nominatim
    /// geocoding, the Socrata feed, and in-memory stores.
    #[must_use]
    pub fn with_defaults(config: EngineConfig) -> Self {
        let geocoder = Arc::new(GeocoderAdapter::new(
            Arc::new(NominatimProvider::new(
                &config.geocoder.base_url,
                &config.geocoder.bias_city,
                &config.geocoder.bias_state,
            )),
            Arc::new(InMemoryGeocodeCache::default()),
            StdDuration::from_millis(config.geocoder.timeout_ms),
            StdDuration::from_millis(config.geocoder.rate_limit_ms),
        ));
        let repository = Arc::new(IncidentRepository::new(
            Arc::new(SocrataFeed::new(SocrataConfig {
                api_url: config.feed.api_url.clone(),
                date_column: config.feed.date_column.clone(),
                page_size: config.feed.page_size,
                label: config.feed.label.clone(),
            })),
            Arc::new(InMemoryWindowCache::default()),
            config.feed.settle_days,
            Duration::minutes(config.feed.refresh_ttl_minutes),
        ));
        Self::new(
            Arc::new(InMemoryUserStore::default()),
            geocoder,
            repository,
            config,
            Arc::new(SystemClock),
        )
    }

    /// The engine's configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The user store, shared with the scheduler for fan-out.
    #[must_use]
    pub fn store(&self) -> Arc<dyn UserStore> {
        Arc::clone(&self.store)
    }

    /// The engine's clock.
    #[must_use]
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Registers a user on first contact (idempotent).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] on storage failure.
    pub async fn register_user(&self, user_id: UserId) -> Result<User, EngineError> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        if let Some(existing) = self.store.get(user_id).await? {
            return Ok(existing);
        }
        let user = User::new(user_id, self.clock.now());
        self.store.upsert(user.clone()).await?;
        log::info!("registered user {user_id}");
        Ok(user)
    }

    /// Saves an address for a user, resolving it eagerly when the
    /// geocoder is reachable.
    ///
    /// An unreachable geocoder is not an error here: the address is
    /// stored unresolved and resolved lazily on the next report. An
    /// unresolvable address *is* an error — the user must correct it.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::NotFound`] (wrapped) if the address
    /// doesn't resolve to a location, or [`EngineError::Store`] on
    /// storage failure.
    pub async fn set_address(
        &self,
        user_id: UserId,
        label: AddressLabel,
        text: &str,
    ) -> Result<Address, EngineError> {
        let now = self.clock.now();
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let mut user = match self.store.get(user_id).await? {
            Some(user) => user,
            None => User::new(user_id, now),
        };

        let mut address = Address::new(label, text.to_string());
        match self.geocoder.resolve(text).await {
            Ok(point) => {
                address.resolved_point = Some(point);
                address.resolved_at = Some(now);
            }
            Err(GeocodeError::NotFound) => return Err(GeocodeError::NotFound.into()),
            Err(e) => {
                log::warn!(
                    "geocoder unavailable for user {user_id} ({e}); storing {label} address \
                     unresolved"
                );
            }
        }

        user.addresses.insert(label, address.clone());
        self.store.upsert(user).await?;
        Ok(address)
    }

    /// Generates a report for the user's saved address (home
    /// preferred), gated on entitlement.
    ///
    /// # Errors
    ///
    /// - [`EngineError::EntitlementDenied`] if not subscribed or lapsed.
    /// - [`EngineError::NoAddress`] if nothing is saved to report on.
    /// - [`EngineError::Geocode`] if the saved address can't resolve.
    /// - [`EngineError::Source`] if the feed is unreachable with no
    ///   cached fallback (degraded data is returned as a report with
    ///   its staleness flag set instead).
    pub async fn request_report(&self, user_id: UserId) -> Result<Report, EngineError> {
        let user = self
            .store
            .get(user_id)
            .await?
            .ok_or(EngineError::UnknownUser(user_id))?;
        let now = self.clock.now();

        if !user.subscription.entitled_at(now) {
            return Err(EngineError::EntitlementDenied {
                plan: user.subscription.plan,
                status: user.subscription.effective_status(now),
            });
        }

        let address = user
            .addresses
            .get(&AddressLabel::Home)
            .or_else(|| user.addresses.values().next())
            .ok_or(EngineError::NoAddress)?
            .clone();

        let point = match address.resolved_point {
            Some(point) => point,
            None => self.resolve_and_save(&user, &address, now).await?,
        };

        let current_window =
            FetchWindow::current(now, self.config.feed.lag_days, self.config.feed.window_days);
        let prior_window = current_window.prior();

        let (current_snapshot, prior_snapshot) = tokio::join!(
            self.repository.fetch(current_window, now),
            self.repository.fetch(prior_window, now)
        );
        let current_snapshot = current_snapshot?;
        let prior_snapshot = prior_snapshot?;

        let radius = self.config.report.radius_miles;
        let current = filter_within(&current_snapshot.incidents, point, radius);
        let prior = filter_within(&prior_snapshot.incidents, point, radius);

        let analysis = analyze(
            PeriodIncidents {
                start: current_window.since,
                end: current_window.until,
                incidents: &current,
            },
            PeriodIncidents {
                start: prior_window.since,
                end: prior_window.until,
                incidents: &prior,
            },
            &self.analyzer_options,
        );

        let meta = ReportMeta {
            user_id,
            address_label: address.label,
            address_text: address.raw_text.clone(),
            radius_miles: radius,
            generated_at: now,
            stale: current_snapshot.stale || prior_snapshot.stale,
            incomplete: current_snapshot.incomplete,
        };
        Ok(render(&meta, analysis, &self.render_options))
    }

    /// Lazily resolves a stored address and persists the point.
    async fn resolve_and_save(
        &self,
        user: &User,
        address: &Address,
        now: DateTime<Utc>,
    ) -> Result<crime_brief_models::LatLon, EngineError> {
        let point = self.geocoder.resolve(&address.raw_text).await?;

        let lock = self.user_lock(user.id);
        let _guard = lock.lock().await;
        // Re-read under the lock; the subscription may have moved since.
        if let Some(mut current) = self.store.get(user.id).await? {
            if let Some(stored) = current.addresses.get_mut(&address.label) {
                if stored.resolved_point.is_none() {
                    stored.resolved_point = Some(point);
                    stored.resolved_at = Some(now);
                    self.store.upsert(current).await?;
                }
            }
        }
        Ok(point)
    }

    /// Summarizes the user's subscription for the transport layer.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownUser`] if no record exists.
    pub async fn entitlement_summary(
        &self,
        user_id: UserId,
    ) -> Result<SubscriptionSummary, EngineError> {
        let user = self
            .store
            .get(user_id)
            .await?
            .ok_or(EngineError::UnknownUser(user_id))?;
        let now = self.clock.now();
        Ok(SubscriptionSummary {
            plan: user.subscription.plan,
            status: user.subscription.effective_status(now),
            period_end: user.subscription.period_end,
            entitled: user.subscription.entitled_at(now),
        })
    }

    /// Starts a checkout for a plan, returning the provider-correlation
    /// reference the transport layer hands to the hosted checkout.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError`] (wrapped) if the plan is `None` or
    /// the subscription is not effectively inactive.
    pub async fn begin_checkout(
        &self,
        user_id: UserId,
        plan: Plan,
    ) -> Result<String, EngineError> {
        if plan == Plan::None {
            return Err(SubscriptionError::Malformed {
                message: "checkout requires a paid plan".to_string(),
            }
            .into());
        }

        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let now = self.clock.now();
        let mut user = match self.store.get(user_id).await? {
            Some(user) => user,
            None => User::new(user_id, now),
        };

        let reference = new_correlation_ref();
        user.subscription =
            machine::begin_checkout(&user.subscription, plan, reference.clone(), now)?;
        self.store.upsert(user).await?;
        log::info!("user {user_id} began checkout for {plan} ({reference})");
        Ok(reference)
    }

    /// Cancels the user's active subscription. Entitlement remains
    /// until the paid period ends.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownUser`] for unknown users or
    /// [`SubscriptionError::InvalidTransition`] (wrapped) if nothing is
    /// active.
    pub async fn cancel_subscription(
        &self,
        user_id: UserId,
    ) -> Result<Subscription, EngineError> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let mut user = self
            .store
            .get(user_id)
            .await?
            .ok_or(EngineError::UnknownUser(user_id))?;
        user.subscription = machine::cancel(&user.subscription, self.clock.now())?;
        let subscription = user.subscription.clone();
        self.store.upsert(user).await?;
        log::info!("user {user_id} canceled subscription");
        Ok(subscription)
    }

    /// Applies a signature-verified payment notification payload.
    ///
    /// Deduplicates by event id, matches by correlation reference, and
    /// applies the transition under the matched user's lock. Duplicate
    /// and unmatched events are acknowledged no-ops, logged as
    /// anomalies.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::Malformed`] (wrapped) for payloads
    /// that don't parse; those are rejected, logged, and never crash
    /// the machine.
    pub async fn apply_payment_event(
        &self,
        payload: &str,
    ) -> Result<NotificationOutcome, EngineError> {
        let event = PaymentEvent::parse(payload).inspect_err(|e| {
            log::warn!("rejected payment notification: {e}");
        })?;

        let Some(user) = self
            .store
            .find_by_correlation_ref(&event.correlation_ref)
            .await?
        else {
            log::warn!(
                "payment event {} matches no subscription (ref {})",
                event.event_id,
                event.correlation_ref
            );
            return Ok(NotificationOutcome::Unmatched);
        };

        let lock = self.user_lock(user.id);
        let _guard = lock.lock().await;

        if !self.store.record_event_if_new(&event.event_id).await? {
            log::warn!("duplicate payment event {}, ignoring", event.event_id);
            return Ok(NotificationOutcome::Duplicate);
        }

        // Re-read under the lock; `find_by_correlation_ref` raced ahead
        // of it.
        let mut user = self
            .store
            .get(user.id)
            .await?
            .ok_or(EngineError::UnknownUser(user.id))?;

        let (next, outcome) = machine::apply(&user.subscription, &event, self.clock.now());
        user.subscription = next;
        let user_id = user.id;
        self.store.upsert(user).await?;

        log::info!("payment event {} for user {user_id}: {outcome:?}", event.event_id);
        Ok(NotificationOutcome::Applied { user_id, outcome })
    }

    /// Deletes a user and everything it owns. Returns whether a record
    /// existed.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] on storage failure.
    pub async fn delete_user(&self, user_id: UserId) -> Result<bool, EngineError> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;
        let existed = self.store.delete(user_id).await?;
        if existed {
            log::info!("deleted user {user_id} and all owned records");
        }
        Ok(existed)
    }

    fn user_lock(&self, user_id: UserId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .user_locks
            .lock()
            .expect("engine user-lock map poisoned");
        Arc::clone(
            locks
                .entry(user_id)
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }
}
