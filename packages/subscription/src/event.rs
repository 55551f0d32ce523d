//! Inbound payment-provider event types.
//!
//! The transport layer verifies the payload signature before handing
//! the raw JSON to [`PaymentEvent::parse`]; this module only validates
//! structure. Unknown event types parse successfully and are ignored by
//! the state machine (providers emit many event types we don't act on),
//! while structurally broken payloads are rejected as malformed.

use serde::Deserialize;
use strum_macros::{AsRefStr, Display, EnumString};

use crate::SubscriptionError;

/// What a payment notification is telling us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum PaymentEventKind {
    /// Hosted checkout finished and the first payment succeeded.
    CheckoutCompleted,
    /// A recurring renewal charge succeeded.
    RenewalSucceeded,
    /// A recurring renewal charge failed.
    RenewalFailed,
    /// An event type we don't act on.
    Unrecognized,
}

/// A parsed, signature-verified payment notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentEvent {
    /// Provider-assigned unique event id; the deduplication key.
    pub event_id: String,
    /// What the event means for the subscription lifecycle.
    pub kind: PaymentEventKind,
    /// Links the event to the checkout it belongs to.
    pub correlation_ref: String,
}

/// Raw wire shape of a provider notification.
#[derive(Debug, Deserialize)]
struct WirePayload {
    event_id: String,
    event_type: String,
    correlation_ref: String,
    payment_status: String,
}

impl PaymentEvent {
    /// Parses a provider notification from its JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::Malformed`] if the payload is not
    /// valid JSON, is missing required fields, or carries empty
    /// identifiers.
    pub fn parse(payload: &str) -> Result<Self, SubscriptionError> {
        let wire: WirePayload =
            serde_json::from_str(payload).map_err(|e| SubscriptionError::Malformed {
                message: e.to_string(),
            })?;

        if wire.event_id.is_empty() {
            return Err(SubscriptionError::Malformed {
                message: "empty event_id".to_string(),
            });
        }
        if wire.correlation_ref.is_empty() {
            return Err(SubscriptionError::Malformed {
                message: "empty correlation_ref".to_string(),
            });
        }

        let succeeded = match wire.payment_status.as_str() {
            "succeeded" | "paid" => true,
            "failed" => false,
            other => {
                return Err(SubscriptionError::Malformed {
                    message: format!("unknown payment_status {other:?}"),
                });
            }
        };

        let kind = match (wire.event_type.as_str(), succeeded) {
            ("checkout_completed", true) => PaymentEventKind::CheckoutCompleted,
            // A failed checkout never reaches us as a completion; the
            // provider just abandons the session.
            ("checkout_completed", false) => PaymentEventKind::Unrecognized,
            ("renewal", true) => PaymentEventKind::RenewalSucceeded,
            ("renewal", false) => PaymentEventKind::RenewalFailed,
            (other, _) => {
                log::warn!("unrecognized payment event type {other:?}, will acknowledge and ignore");
                PaymentEventKind::Unrecognized
            }
        };

        Ok(Self {
            event_id: wire.event_id,
            kind,
            correlation_ref: wire.correlation_ref,
        })
    }
}
