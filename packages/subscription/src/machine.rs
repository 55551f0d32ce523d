//! Pure subscription lifecycle transitions.
//!
//! Lifecycle: `Inactive -> PendingPayment -> Active -> {Canceled,
//! PaymentFailed} -> Inactive`. The final edge is lazy: nothing ever
//! writes `Inactive` back on expiry; entitlement checks derive it from
//! `period_end` (see [`crime_brief_models::Subscription::entitled_at`]).

use chrono::{DateTime, Duration, Utc};
use crime_brief_models::{Plan, Subscription, SubscriptionStatus};

use crate::{BILLING_PERIOD_DAYS, SubscriptionError};
use crate::event::{PaymentEvent, PaymentEventKind};

/// What applying a payment event did to the subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// `PendingPayment -> Active`; first period granted.
    Activated {
        /// The plan that became active.
        plan: Plan,
        /// End of the newly paid period.
        period_end: DateTime<Utc>,
    },
    /// A renewal succeeded; period extended.
    Renewed {
        /// End of the extended period.
        period_end: DateTime<Utc>,
    },
    /// A renewal failed; entitlement lapses at `period_end` unless a
    /// success event arrives first.
    RenewalFailed,
    /// The event produced no state change. Acknowledged, logged as an
    /// anomaly where warranted, never surfaced as an error.
    Ignored(IgnoreReason),
}

/// Why an event was acknowledged without a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The event's correlation reference matches no record we hold.
    UnmatchedReference,
    /// The subscription is not in a state this event applies to (e.g.
    /// a completion arriving after activation already happened).
    WrongState,
    /// An event type the machine doesn't act on.
    UnrecognizedType,
}

/// Applies a payment event to a subscription.
///
/// Pure: the caller is responsible for event-id deduplication (via its
/// processed-event ledger) and for applying the result under a per-user
/// lock so concurrent deliveries cannot race into a double activation
/// or a double period extension.
#[must_use]
pub fn apply(
    subscription: &Subscription,
    event: &PaymentEvent,
    now: DateTime<Utc>,
) -> (Subscription, Outcome) {
    let matches_ref = subscription
        .external_ref
        .as_deref()
        .is_some_and(|r| r == event.correlation_ref);

    match event.kind {
        PaymentEventKind::Unrecognized => {
            (subscription.clone(), Outcome::Ignored(IgnoreReason::UnrecognizedType))
        }

        PaymentEventKind::CheckoutCompleted => {
            if !matches_ref {
                log::warn!(
                    "checkout completion {} references unknown checkout {}",
                    event.event_id,
                    event.correlation_ref
                );
                return (
                    subscription.clone(),
                    Outcome::Ignored(IgnoreReason::UnmatchedReference),
                );
            }
            if subscription.status != SubscriptionStatus::PendingPayment {
                log::warn!(
                    "checkout completion {} arrived while {}, ignoring",
                    event.event_id,
                    subscription.status
                );
                return (
                    subscription.clone(),
                    Outcome::Ignored(IgnoreReason::WrongState),
                );
            }

            let period_end = now + Duration::days(BILLING_PERIOD_DAYS);
            let next = Subscription {
                plan: subscription.plan,
                status: SubscriptionStatus::Active,
                period_end: Some(period_end),
                external_ref: subscription.external_ref.clone(),
            };
            (
                next,
                Outcome::Activated {
                    plan: subscription.plan,
                    period_end,
                },
            )
        }

        PaymentEventKind::RenewalSucceeded => {
            if !matches_ref {
                return (
                    subscription.clone(),
                    Outcome::Ignored(IgnoreReason::UnmatchedReference),
                );
            }
            match subscription.status {
                SubscriptionStatus::Active | SubscriptionStatus::PaymentFailed => {
                    // Extend from whichever is later: an on-time renewal
                    // stacks onto the current period, a late one starts
                    // from now.
                    let base = subscription
                        .period_end
                        .map_or(now, |end| end.max(now));
                    let period_end = base + Duration::days(BILLING_PERIOD_DAYS);
                    let next = Subscription {
                        plan: subscription.plan,
                        status: SubscriptionStatus::Active,
                        period_end: Some(period_end),
                        external_ref: subscription.external_ref.clone(),
                    };
                    (next, Outcome::Renewed { period_end })
                }
                _ => (
                    subscription.clone(),
                    Outcome::Ignored(IgnoreReason::WrongState),
                ),
            }
        }

        PaymentEventKind::RenewalFailed => {
            if !matches_ref {
                return (
                    subscription.clone(),
                    Outcome::Ignored(IgnoreReason::UnmatchedReference),
                );
            }
            if subscription.status != SubscriptionStatus::Active {
                return (
                    subscription.clone(),
                    Outcome::Ignored(IgnoreReason::WrongState),
                );
            }
            let next = Subscription {
                status: SubscriptionStatus::PaymentFailed,
                ..subscription.clone()
            };
            (next, Outcome::RenewalFailed)
        }
    }
}

/// User initiates checkout: `Inactive -> PendingPayment`, recording the
/// chosen plan and the provider-correlation reference.
///
/// # Errors
///
/// Returns [`SubscriptionError::InvalidTransition`] if the subscription
/// is not effectively inactive at `now` (an entitled subscription must
/// lapse or be canceled before a new checkout starts; a pending
/// checkout must complete or be replaced explicitly by the caller).
pub fn begin_checkout(
    subscription: &Subscription,
    plan: Plan,
    correlation_ref: String,
    now: DateTime<Utc>,
) -> Result<Subscription, SubscriptionError> {
    let effective = subscription.effective_status(now);
    if effective != SubscriptionStatus::Inactive {
        return Err(SubscriptionError::InvalidTransition {
            from: effective,
            action: "begin checkout",
        });
    }

    Ok(Subscription {
        plan,
        status: SubscriptionStatus::PendingPayment,
        period_end: None,
        external_ref: Some(correlation_ref),
    })
}

/// Explicit user cancellation: `Active -> Canceled`.
///
/// Entitlement remains valid until `period_end`, then lazily becomes
/// inactive.
///
/// # Errors
///
/// Returns [`SubscriptionError::InvalidTransition`] if the subscription
/// is not active at `now`.
pub fn cancel(
    subscription: &Subscription,
    now: DateTime<Utc>,
) -> Result<Subscription, SubscriptionError> {
    if subscription.effective_status(now) != SubscriptionStatus::Active {
        return Err(SubscriptionError::InvalidTransition {
            from: subscription.effective_status(now),
            action: "cancel",
        });
    }

    Ok(Subscription {
        status: SubscriptionStatus::Canceled,
        ..subscription.clone()
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn checkout_event(id: &str, reference: &str) -> PaymentEvent {
        PaymentEvent {
            event_id: id.to_string(),
            kind: PaymentEventKind::CheckoutCompleted,
            correlation_ref: reference.to_string(),
        }
    }

    fn renewal_event(id: &str, reference: &str, kind: PaymentEventKind) -> PaymentEvent {
        PaymentEvent {
            event_id: id.to_string(),
            kind,
            correlation_ref: reference.to_string(),
        }
    }

    fn pending(plan: Plan) -> Subscription {
        begin_checkout(&Subscription::none(), plan, "chk_1".to_string(), at(0)).unwrap()
    }

    #[test]
    fn checkout_then_completion_activates() {
        let sub = pending(Plan::Personal);
        assert_eq!(sub.status, SubscriptionStatus::PendingPayment);

        let (active, outcome) = apply(&sub, &checkout_event("evt_1", "chk_1"), at(100));
        assert_eq!(active.status, SubscriptionStatus::Active);
        assert_eq!(
            active.period_end,
            Some(at(100) + Duration::days(BILLING_PERIOD_DAYS))
        );
        assert!(matches!(outcome, Outcome::Activated { plan: Plan::Personal, .. }));
        assert!(active.entitled_at(at(200)));
    }

    #[test]
    fn duplicate_completion_is_a_no_op() {
        // The ledger catches true duplicates before `apply` runs, but a
        // replayed completion that slips through still must not grant a
        // second period: the state is no longer PendingPayment.
        let sub = pending(Plan::Personal);
        let (active, _) = apply(&sub, &checkout_event("evt_1", "chk_1"), at(100));
        let (again, outcome) = apply(&active, &checkout_event("evt_1", "chk_1"), at(500));
        assert_eq!(again, active);
        assert_eq!(outcome, Outcome::Ignored(IgnoreReason::WrongState));
    }

    #[test]
    fn unmatched_reference_is_acknowledged_no_op() {
        let sub = pending(Plan::Personal);
        let (next, outcome) = apply(&sub, &checkout_event("evt_9", "chk_other"), at(100));
        assert_eq!(next, sub);
        assert_eq!(outcome, Outcome::Ignored(IgnoreReason::UnmatchedReference));
    }

    #[test]
    fn renewal_success_extends_from_period_end() {
        let sub = pending(Plan::Family);
        let (active, _) = apply(&sub, &checkout_event("evt_1", "chk_1"), at(0));
        let first_end = active.period_end.unwrap();

        // Renewal arrives a day early.
        let renew_at = first_end - Duration::days(1);
        let (renewed, outcome) = apply(
            &active,
            &renewal_event("evt_2", "chk_1", PaymentEventKind::RenewalSucceeded),
            renew_at,
        );
        assert_eq!(
            renewed.period_end,
            Some(first_end + Duration::days(BILLING_PERIOD_DAYS)),
            "early renewal stacks onto the current period"
        );
        assert!(matches!(outcome, Outcome::Renewed { .. }));
    }

    #[test]
    fn late_renewal_extends_from_now() {
        let sub = pending(Plan::Personal);
        let (active, _) = apply(&sub, &checkout_event("evt_1", "chk_1"), at(0));
        let first_end = active.period_end.unwrap();

        let late = first_end + Duration::days(3);
        let (renewed, _) = apply(
            &active,
            &renewal_event("evt_2", "chk_1", PaymentEventKind::RenewalSucceeded),
            late,
        );
        assert_eq!(renewed.period_end, Some(late + Duration::days(BILLING_PERIOD_DAYS)));
    }

    #[test]
    fn renewal_failure_marks_payment_failed_but_keeps_entitlement() {
        let sub = pending(Plan::Personal);
        let (active, _) = apply(&sub, &checkout_event("evt_1", "chk_1"), at(0));
        let period_end = active.period_end.unwrap();

        let (failed, outcome) = apply(
            &active,
            &renewal_event("evt_2", "chk_1", PaymentEventKind::RenewalFailed),
            at(1_000),
        );
        assert_eq!(failed.status, SubscriptionStatus::PaymentFailed);
        assert_eq!(outcome, Outcome::RenewalFailed);
        assert!(failed.entitled_at(period_end - Duration::seconds(1)));
        assert!(!failed.entitled_at(period_end));
    }

    #[test]
    fn success_after_failure_recovers() {
        let sub = pending(Plan::Personal);
        let (active, _) = apply(&sub, &checkout_event("evt_1", "chk_1"), at(0));
        let (failed, _) = apply(
            &active,
            &renewal_event("evt_2", "chk_1", PaymentEventKind::RenewalFailed),
            at(100),
        );
        let (recovered, outcome) = apply(
            &failed,
            &renewal_event("evt_3", "chk_1", PaymentEventKind::RenewalSucceeded),
            at(200),
        );
        assert_eq!(recovered.status, SubscriptionStatus::Active);
        assert!(matches!(outcome, Outcome::Renewed { .. }));
    }

    #[test]
    fn cancel_keeps_paid_period() {
        let sub = pending(Plan::Personal);
        let (active, _) = apply(&sub, &checkout_event("evt_1", "chk_1"), at(0));
        let period_end = active.period_end.unwrap();

        let canceled = cancel(&active, at(100)).unwrap();
        assert_eq!(canceled.status, SubscriptionStatus::Canceled);
        assert!(canceled.entitled_at(period_end - Duration::seconds(1)));
        assert!(!canceled.entitled_at(period_end));
    }

    #[test]
    fn cancel_requires_active() {
        let err = cancel(&Subscription::none(), at(0)).unwrap_err();
        assert!(matches!(err, SubscriptionError::InvalidTransition { .. }));
    }

    #[test]
    fn checkout_requires_effectively_inactive() {
        let sub = pending(Plan::Personal);
        let (active, _) = apply(&sub, &checkout_event("evt_1", "chk_1"), at(0));

        let err = begin_checkout(&active, Plan::Premium, "chk_2".to_string(), at(100));
        assert!(err.is_err());

        // Once the paid period lapses, a fresh checkout is allowed
        // without any explicit transition back to Inactive.
        let after_expiry = active.period_end.unwrap() + Duration::days(1);
        let renewed = begin_checkout(&active, Plan::Premium, "chk_2".to_string(), after_expiry);
        assert!(renewed.is_ok());
    }

    #[test]
    fn renewal_on_canceled_subscription_is_ignored() {
        let sub = pending(Plan::Personal);
        let (active, _) = apply(&sub, &checkout_event("evt_1", "chk_1"), at(0));
        let canceled = cancel(&active, at(10)).unwrap();

        let (next, outcome) = apply(
            &canceled,
            &renewal_event("evt_2", "chk_1", PaymentEventKind::RenewalSucceeded),
            at(20),
        );
        assert_eq!(next, canceled);
        assert_eq!(outcome, Outcome::Ignored(IgnoreReason::WrongState));
    }
}
