#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Subscription lifecycle state machine.
//!
//! Payment-provider notifications arrive asynchronously, possibly out
//! of order and possibly more than once. The transition logic is a pure
//! function `(subscription, event, now) -> (subscription', outcome)` so
//! duplicate-delivery behavior is trivially testable; event-id
//! deduplication and per-user locking live with the caller (the
//! engine), which consults its processed-event ledger before invoking
//! [`machine::apply`].

pub mod event;
pub mod machine;

/// Errors from subscription operations.
#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    /// Inbound notification payload could not be parsed. Logged as an
    /// anomaly and rejected; never crashes the state machine.
    #[error("malformed payment notification: {message}")]
    Malformed {
        /// Description of what was wrong with the payload.
        message: String,
    },

    /// The requested user-initiated transition is not valid from the
    /// subscription's current state.
    #[error("invalid transition: cannot {action} while {from}")]
    InvalidTransition {
        /// Current effective status.
        from: crime_brief_models::SubscriptionStatus,
        /// The attempted action (e.g. `"begin checkout"`).
        action: &'static str,
    },
}

/// Length of one paid billing period. Every paid plan bills weekly;
/// Premium differs by brief cadence, not by period length.
pub const BILLING_PERIOD_DAYS: i64 = 7;

/// Generates a fresh provider-correlation reference for a checkout.
#[must_use]
pub fn new_correlation_ref() -> String {
    format!("chk_{}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_refs_are_unique() {
        let a = new_correlation_ref();
        let b = new_correlation_ref();
        assert_ne!(a, b);
        assert!(a.starts_with("chk_"));
    }
}
