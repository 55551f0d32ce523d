#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Recurring brief generation.
//!
//! Fans report generation out over the entitled-subscriber list as
//! independent tasks: bounded concurrency, a per-subscriber timeout,
//! and one retry for transient failures. One subscriber's failure
//! never blocks or delays the others — it is logged as a delivery
//! failure and the batch carries on.
//!
//! Trigger alignment uses the metro's civic UTC offset: weekly plans
//! run on the configured weekday at the send hour, the premium tier
//! runs every day at the send hour.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Datelike as _, FixedOffset, Utc, Weekday};
use crime_brief_engine::{Engine, EngineError};
use crime_brief_models::{Plan, User, UserId};
use crime_brief_report::Report;
use futures::StreamExt as _;

/// Delivery failed at the transport collaborator.
#[derive(Debug, thiserror::Error)]
#[error("delivery failed: {message}")]
pub struct DeliveryError {
    /// What failed.
    pub message: String,
}

/// The delivery collaborator. The chat transport implements this; the
/// scheduler only hands it finished content.
#[async_trait::async_trait]
pub trait ReportSink: Send + Sync {
    /// Delivers a generated report.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] if the transport could not deliver.
    async fn deliver_report(&self, user_id: UserId, report: &Report)
    -> Result<(), DeliveryError>;

    /// Delivers a short service notice (e.g. subscription activated).
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] if the transport could not deliver.
    async fn deliver_notice(&self, user_id: UserId, text: &str) -> Result<(), DeliveryError>;
}

/// Sink that logs instead of delivering; the stand-in until a real
/// transport is wired up, and useful for dry runs.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait::async_trait]
impl ReportSink for LogSink {
    async fn deliver_report(
        &self,
        user_id: UserId,
        report: &Report,
    ) -> Result<(), DeliveryError> {
        log::info!("report for user {user_id}:\n{}", report.text);
        Ok(())
    }

    async fn deliver_notice(&self, user_id: UserId, text: &str) -> Result<(), DeliveryError> {
        log::info!("notice for user {user_id}: {text}");
        Ok(())
    }
}

/// The activation notice sent when a checkout completes.
#[must_use]
pub fn activation_notice(plan: Plan) -> String {
    if plan.daily_cadence() {
        "Subscription active. You'll receive a brief every morning.".to_string()
    } else {
        "Subscription active. You'll receive a brief every week.".to_string()
    }
}

/// Outcome counts for one scheduled batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Subscribers due this run.
    pub attempted: usize,
    /// Reports generated and delivered.
    pub delivered: usize,
    /// Runs that failed after the retry.
    pub failed: usize,
}

/// Drives periodic report generation for every entitled subscriber.
pub struct Scheduler {
    engine: Arc<Engine>,
    sink: Arc<dyn ReportSink>,
}

impl Scheduler {
    /// Creates a scheduler over an engine and a delivery sink.
    #[must_use]
    pub const fn new(engine: Arc<Engine>, sink: Arc<dyn ReportSink>) -> Self {
        Self { engine, sink }
    }

    /// The metro's civic UTC offset from configuration.
    ///
    /// # Panics
    ///
    /// Panics if the configured offset is out of range (validated
    /// config would have rejected it).
    #[must_use]
    pub fn civic_offset(&self) -> FixedOffset {
        let hours = self.engine.config().scheduler.utc_offset_hours;
        FixedOffset::east_opt(hours * 3600).expect("utc_offset_hours out of range")
    }

    /// The weekday weekly briefs go out.
    #[must_use]
    pub fn weekly_weekday(&self) -> Weekday {
        self.engine
            .config()
            .scheduler
            .weekly_weekday
            .parse()
            .unwrap_or(Weekday::Mon)
    }

    /// Runs one batch now: every entitled subscriber whose cadence is
    /// due on today's civic date gets a report.
    pub async fn run_once(&self) -> RunSummary {
        let now = self.engine.clock().now();
        let today = now.with_timezone(&self.civic_offset()).weekday();
        let weekly_day = self.weekly_weekday();

        let users = match self.engine.store().entitled_users(now).await {
            Ok(users) => users,
            Err(e) => {
                log::error!("scheduler could not list subscribers: {e}");
                return RunSummary::default();
            }
        };
        let due: Vec<User> = users
            .into_iter()
            .filter(|user| is_due(user.subscription.plan, today, weekly_day))
            .collect();

        let summary = std::sync::Mutex::new(RunSummary {
            attempted: due.len(),
            ..RunSummary::default()
        });

        let concurrency = self.engine.config().scheduler.concurrency.max(1);
        futures::stream::iter(due)
            .for_each_concurrent(concurrency, |user| {
                let summary = &summary;
                async move {
                    match self.run_for_user(user.id).await {
                        Ok(()) => {
                            summary.lock().expect("summary mutex poisoned").delivered += 1;
                        }
                        Err(reason) => {
                            log::error!("delivery failed for user {}: {reason}", user.id);
                            summary.lock().expect("summary mutex poisoned").failed += 1;
                        }
                    }
                }
            })
            .await;

        let summary = summary.into_inner().expect("summary mutex poisoned");
        log::info!(
            "scheduled batch done: {}/{} delivered, {} failed",
            summary.delivered,
            summary.attempted,
            summary.failed
        );
        summary
    }

    /// Generates and delivers one subscriber's report under the run
    /// timeout, retrying once on transient failure.
    async fn run_for_user(&self, user_id: UserId) -> Result<(), String> {
        let timeout = StdDuration::from_secs(self.engine.config().scheduler.run_timeout_secs);

        for attempt in 0..2 {
            let result = tokio::time::timeout(timeout, self.generate_and_deliver(user_id)).await;
            match result {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(RunError::Permanent(reason))) => return Err(reason),
                Ok(Err(RunError::Transient(reason))) => {
                    if attempt == 0 {
                        log::warn!("run for user {user_id} failed ({reason}), retrying once");
                    } else {
                        return Err(reason);
                    }
                }
                Err(_) => {
                    if attempt == 0 {
                        log::warn!("run for user {user_id} timed out after {timeout:?}, retrying once");
                    } else {
                        return Err(format!("timed out after {timeout:?}"));
                    }
                }
            }
        }
        unreachable!("run_for_user retry loop exited without returning")
    }

    async fn generate_and_deliver(&self, user_id: UserId) -> Result<(), RunError> {
        let report = self
            .engine
            .request_report(user_id)
            .await
            .map_err(RunError::from_engine)?;
        self.sink
            .deliver_report(user_id, &report)
            .await
            .map_err(|e| RunError::Transient(e.to_string()))
    }

    /// Runs forever: sleeps to the next send-hour boundary in civic
    /// time, runs a batch, repeats.
    pub async fn run_forever(&self) {
        loop {
            let now = self.engine.clock().now();
            let next = next_send_instant(
                now,
                self.engine.config().scheduler.send_hour,
                self.civic_offset(),
            );
            let wait = (next - now)
                .to_std()
                .unwrap_or(StdDuration::from_secs(60));
            log::info!("next scheduled batch at {next} (in {wait:?})");
            tokio::time::sleep(wait).await;
            self.run_once().await;
        }
    }
}

/// How a single run failed, for retry purposes.
enum RunError {
    /// Worth one retry (feed/geocoder/delivery hiccup).
    Transient(String),
    /// Retrying cannot help (no address, not entitled).
    Permanent(String),
}

impl RunError {
    fn from_engine(e: EngineError) -> Self {
        match &e {
            EngineError::Geocode(_) | EngineError::Source(_) | EngineError::Store(_) => {
                Self::Transient(e.to_string())
            }
            EngineError::UnknownUser(_)
            | EngineError::NoAddress
            | EngineError::EntitlementDenied { .. }
            | EngineError::Subscription(_) => Self::Permanent(e.to_string()),
        }
    }
}

/// Whether a plan's cadence is due on a civic weekday.
#[must_use]
pub fn is_due(plan: Plan, today: Weekday, weekly_day: Weekday) -> bool {
    match plan {
        Plan::None => false,
        Plan::Premium => true,
        Plan::Personal | Plan::Family => today == weekly_day,
    }
}

/// The next occurrence of `send_hour` in civic time, strictly after
/// `now`.
#[must_use]
pub fn next_send_instant(
    now: DateTime<Utc>,
    send_hour: u32,
    offset: FixedOffset,
) -> DateTime<Utc> {
    let local_now = now.with_timezone(&offset);
    let mut candidate_date = local_now.date_naive();
    loop {
        if let Some(naive) = candidate_date.and_hms_opt(send_hour, 0, 0) {
            if let Some(candidate) = naive.and_local_timezone(offset).single() {
                let candidate = candidate.with_timezone(&Utc);
                if candidate > now {
                    return candidate;
                }
            }
        }
        candidate_date = candidate_date.succ_opt().unwrap_or(candidate_date);
    }
}
