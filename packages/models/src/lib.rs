#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Shared domain types for the crime brief service.
//!
//! Defines the canonical incident category taxonomy that feed records
//! are normalized into, plus the user, address, and subscription records
//! shared across the engine, scheduler, and transport layer.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

impl LatLon {
    /// Creates a coordinate pair.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Normalized incident category taxonomy.
///
/// Every data feed reports its own category strings; sources map them
/// into this shared set so analytics and recommendations key off stable
/// variants. The original feed string is preserved on the incident as
/// `raw_category`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentCategory {
    /// Larceny, shoplifting, pickpocketing.
    Theft,
    /// Unlawful entry to commit a felony or theft.
    Burglary,
    /// Taking property by force or threat.
    Robbery,
    /// Physical attack causing bodily harm.
    Battery,
    /// Attack or threat of attack.
    Assault,
    /// Theft of a motor vehicle.
    MotorVehicleTheft,
    /// Vandalism and property damage.
    CriminalDamage,
    /// Drug and narcotics offenses.
    Narcotics,
    /// Unlawful possession or use of weapons.
    WeaponsViolation,
    /// Murder and non-negligent manslaughter.
    Homicide,
    /// Anything that doesn't map to the above.
    Other,
}

impl IncidentCategory {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Theft,
            Self::Burglary,
            Self::Robbery,
            Self::Battery,
            Self::Assault,
            Self::MotorVehicleTheft,
            Self::CriminalDamage,
            Self::Narcotics,
            Self::WeaponsViolation,
            Self::Homicide,
            Self::Other,
        ]
    }

    /// Human-readable label for report rendering (e.g. "Motor Vehicle Theft").
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Theft => "Theft",
            Self::Burglary => "Burglary",
            Self::Robbery => "Robbery",
            Self::Battery => "Battery",
            Self::Assault => "Assault",
            Self::MotorVehicleTheft => "Motor Vehicle Theft",
            Self::CriminalDamage => "Criminal Damage",
            Self::Narcotics => "Narcotics",
            Self::WeaponsViolation => "Weapons Violation",
            Self::Homicide => "Homicide",
            Self::Other => "Other",
        }
    }
}

/// A single normalized incident record from the public feed.
///
/// Immutable once fetched. Deduplicated by [`id`](Self::id) across
/// repeated fetches and pagination boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    /// Feed-assigned unique identifier.
    pub id: String,
    /// Normalized category.
    pub category: IncidentCategory,
    /// The feed's original category string.
    pub raw_category: String,
    /// When the incident occurred.
    pub timestamp: DateTime<Utc>,
    /// Where the incident occurred.
    pub location: LatLon,
    /// Feed-provided description.
    pub description: String,
}

/// Which saved location an address represents.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AddressLabel {
    /// The user's home address.
    Home,
    /// The user's work address.
    Work,
}

/// A user-saved address, lazily resolved to coordinates.
///
/// `resolved_point` is `None` until the geocoder resolves `raw_text`.
/// Resolved points are never auto-expired; geocoding is assumed stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    /// Which saved location this is.
    pub label: AddressLabel,
    /// The address text as the user entered it.
    pub raw_text: String,
    /// Geocoded coordinates, once resolved.
    pub resolved_point: Option<LatLon>,
    /// When the coordinates were resolved.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Address {
    /// Creates an unresolved address from user text.
    #[must_use]
    pub const fn new(label: AddressLabel, raw_text: String) -> Self {
        Self {
            label,
            raw_text,
            resolved_point: None,
            resolved_at: None,
        }
    }
}

/// Chat-platform identity for a user.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered user with saved addresses and a subscription record.
///
/// Created on first contact. Exclusively owns its addresses and
/// subscription; deleting the user erases both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Chat-platform identity.
    pub id: UserId,
    /// Saved addresses keyed by label.
    pub addresses: BTreeMap<AddressLabel, Address>,
    /// Subscription record.
    pub subscription: Subscription,
    /// First-contact timestamp.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Creates a new user with no addresses and no subscription.
    #[must_use]
    pub fn new(id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            addresses: BTreeMap::new(),
            subscription: Subscription::none(),
            created_at: now,
        }
    }
}

/// Subscription plan tiers.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Plan {
    /// No plan selected.
    None,
    /// Single-address weekly brief.
    Personal,
    /// Multiple-address weekly brief.
    Family,
    /// Daily brief cadence.
    Premium,
}

impl Plan {
    /// Whether subscribers on this plan receive a brief every day
    /// instead of weekly.
    #[must_use]
    pub const fn daily_cadence(self) -> bool {
        matches!(self, Self::Premium)
    }
}

/// Subscription payment lifecycle status.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SubscriptionStatus {
    /// No subscription, or a prior one fully lapsed.
    Inactive,
    /// Checkout initiated, awaiting the provider's completion event.
    PendingPayment,
    /// Paid up through `period_end`.
    Active,
    /// User canceled; paid through `period_end`.
    Canceled,
    /// Renewal failed; paid through `period_end` unless a success
    /// event arrives first.
    PaymentFailed,
}

/// A user's subscription record.
///
/// Invariant: `status == Active` implies `plan != None` and
/// `period_end` is set. Entitlement is always derived via
/// [`entitled_at`](Self::entitled_at), never cached, so an expired
/// `period_end` lapses without any explicit transition having run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    /// Selected plan tier.
    pub plan: Plan,
    /// Lifecycle status.
    pub status: SubscriptionStatus,
    /// End of the paid (or pending) billing period.
    pub period_end: Option<DateTime<Utc>>,
    /// Payment-provider correlation reference (checkout session id).
    pub external_ref: Option<String>,
}

impl Subscription {
    /// The empty subscription: no plan, inactive, nothing pending.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            plan: Plan::None,
            status: SubscriptionStatus::Inactive,
            period_end: None,
            external_ref: None,
        }
    }

    /// Derived entitlement check: may this subscription use the report
    /// engine at `now`?
    ///
    /// `Canceled` and `PaymentFailed` subscriptions remain entitled
    /// until the already-paid period ends. An `Active` subscription
    /// whose `period_end` has passed is *not* entitled (lazy expiry).
    #[must_use]
    pub fn entitled_at(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.status,
            SubscriptionStatus::Active
                | SubscriptionStatus::Canceled
                | SubscriptionStatus::PaymentFailed
        ) && self.period_end.is_some_and(|end| now < end)
    }

    /// Status as observed at `now`, folding lazy expiry in: any status
    /// whose paid period has ended reads as `Inactive`.
    #[must_use]
    pub fn effective_status(&self, now: DateTime<Utc>) -> SubscriptionStatus {
        match self.status {
            SubscriptionStatus::Active
            | SubscriptionStatus::Canceled
            | SubscriptionStatus::PaymentFailed => {
                if self.period_end.is_some_and(|end| now < end) {
                    self.status
                } else {
                    SubscriptionStatus::Inactive
                }
            }
            status => status,
        }
    }
}
