#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Analysis result types.
//!
//! Everything here is derived from filtered incident sets and is never
//! persisted; reports are ephemeral.

use chrono::{DateTime, Utc, Weekday};
use crime_brief_models::{IncidentCategory, LatLon};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Incident count for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    /// The category.
    pub category: IncidentCategory,
    /// Incidents in the period.
    pub count: u64,
}

/// Week-over-week movement for one category.
///
/// Division by zero is defined away: a category with no prior
/// incidents is `New`, not an infinite percentage, and a category with
/// no incidents in either period is `NoChange`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TrendDelta {
    /// Prior period had zero incidents, current has some.
    New,
    /// Both periods had zero incidents.
    NoChange,
    /// Signed percentage change from the prior period.
    Percent(f64),
}

impl TrendDelta {
    /// Derives the delta from period counts.
    #[must_use]
    pub fn from_counts(prior: u64, current: u64) -> Self {
        match (prior, current) {
            (0, 0) => Self::NoChange,
            (0, _) => Self::New,
            #[allow(clippy::cast_precision_loss)]
            (prior, current) => {
                let prior = prior as f64;
                let current = current as f64;
                Self::Percent((current - prior) / prior * 100.0)
            }
        }
    }

    /// True when activity is up versus the prior period (new or a
    /// positive percentage).
    #[must_use]
    pub fn is_rising(&self) -> bool {
        match self {
            Self::New => true,
            Self::NoChange => false,
            Self::Percent(pct) => *pct > 0.0,
        }
    }
}

impl std::fmt::Display for TrendDelta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::NoChange => write!(f, "no change"),
            Self::Percent(pct) => write!(f, "{pct:+.0}%"),
        }
    }
}

/// A category's counts in both periods and the derived delta.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTrend {
    /// The category.
    pub category: IncidentCategory,
    /// Current-period count.
    pub current: u64,
    /// Prior-period count.
    pub prior: u64,
    /// Movement between the periods.
    pub delta: TrendDelta,
}

/// A spatial cluster of current-period incidents.
///
/// Derived, never persisted independently of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotspot {
    /// Centroid of the clustered incidents.
    pub center: LatLon,
    /// Distance from the centroid to its farthest member, in miles.
    pub radius_miles: f64,
    /// How many incidents clustered here.
    pub incident_count: u64,
    /// The most common category in the cluster.
    pub dominant_category: IncidentCategory,
    /// Earliest incident timestamp in the cluster (also the ranking
    /// tie-breaker).
    pub earliest: DateTime<Utc>,
}

/// Four six-hour blocks of the civic day.
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
pub enum TimeBlock {
    /// 6 AM - noon.
    Morning,
    /// Noon - 6 PM.
    Afternoon,
    /// 6 PM - midnight.
    Evening,
    /// Midnight - 6 AM.
    LateNight,
}

impl TimeBlock {
    /// The block containing an hour of day (0-23).
    #[must_use]
    pub const fn from_hour(hour: u32) -> Self {
        match hour {
            6..=11 => Self::Morning,
            12..=17 => Self::Afternoon,
            18..=23 => Self::Evening,
            _ => Self::LateNight,
        }
    }

    /// All blocks in fixed display order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Morning, Self::Afternoon, Self::Evening, Self::LateNight]
    }

    /// Human-readable label (e.g. `"evening (6PM-midnight)"`).
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Morning => "morning (6AM-noon)",
            Self::Afternoon => "afternoon (noon-6PM)",
            Self::Evening => "evening (6PM-midnight)",
            Self::LateNight => "late night (midnight-6AM)",
        }
    }
}

/// Incident count for one time block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockCount {
    /// The time block.
    pub block: TimeBlock,
    /// Incidents in the block.
    pub count: u64,
}

/// Incident count for one day of the week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayCount {
    /// The day.
    pub day: Weekday,
    /// Incidents on that day.
    pub count: u64,
}

/// When in the week incidents concentrate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskProfile {
    /// Counts per time block, fixed block order.
    pub block_counts: Vec<BlockCount>,
    /// Counts per day of week, Monday first.
    pub day_counts: Vec<DayCount>,
    /// The highest-count block, if any incidents exist.
    pub riskiest_block: Option<TimeBlock>,
    /// The highest-count day, if any incidents exist.
    pub riskiest_day: Option<Weekday>,
}

/// Incident counts for one period of the comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSummary {
    /// Period start (inclusive).
    pub start: DateTime<Utc>,
    /// Period end (exclusive).
    pub end: DateTime<Utc>,
    /// Total incidents.
    pub total: u64,
    /// Counts per category, descending.
    pub by_category: Vec<CategoryCount>,
}

/// Full analyzer output for one center and window pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    /// The current period.
    pub current: PeriodSummary,
    /// The immediately-prior period of equal length.
    pub prior: PeriodSummary,
    /// Per-category movement, ordered by current count descending.
    pub trends: Vec<CategoryTrend>,
    /// Ranked hotspots (count descending, then earliest timestamp).
    pub hotspots: Vec<Hotspot>,
    /// Time-of-day / day-of-week concentration.
    pub risk: RiskProfile,
}
