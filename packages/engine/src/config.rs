//! Engine configuration loaded from TOML.
//!
//! A compiled-in default configuration ships with the crate; operators
//! override it with a config file. All thresholds the analysis and
//! rendering contracts leave open (radii, clustering, schedule times)
//! live here.

use serde::Deserialize;

/// Compiled-in default configuration.
const DEFAULT_CONFIG: &str = include_str!("../default.toml");

/// Top-level engine configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Incident feed settings.
    pub feed: FeedConfig,
    /// Geocoder settings.
    pub geocoder: GeocoderConfig,
    /// Report pipeline settings.
    pub report: ReportConfig,
    /// Scheduler settings (consumed by the scheduler crate).
    pub scheduler: SchedulerConfig,
}

/// Incident feed settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedConfig {
    /// Socrata dataset URL.
    pub api_url: String,
    /// Date column used for `$order` and `$where`.
    pub date_column: String,
    /// Page size for pagination.
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    /// Log label for the feed.
    pub label: String,
    /// The feed's minimum reporting lag; fetch windows end this many
    /// days in the past.
    #[serde(default = "default_lag_days")]
    pub lag_days: i64,
    /// The feed's maximum reporting lag; windows reaching inside this
    /// horizon are refreshed and flagged incomplete.
    #[serde(default = "default_settle_days")]
    pub settle_days: i64,
    /// Length of one report window in days.
    #[serde(default = "default_window_days")]
    pub window_days: i64,
    /// How long an unsettled window's cache entry is served before the
    /// feed is consulted again, in minutes.
    #[serde(default = "default_refresh_ttl_minutes")]
    pub refresh_ttl_minutes: i64,
}

/// Geocoder settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeocoderConfig {
    /// Nominatim search endpoint.
    pub base_url: String,
    /// City appended to every query.
    pub bias_city: String,
    /// State appended to every query.
    pub bias_state: String,
    /// Per-lookup timeout in milliseconds.
    #[serde(default = "default_geocode_timeout_ms")]
    pub timeout_ms: u64,
    /// Minimum delay between provider requests in milliseconds
    /// (Nominatim public instance: 1 request per second).
    #[serde(default = "default_rate_limit_ms")]
    pub rate_limit_ms: u64,
}

/// Report pipeline settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    /// Proximity filter radius in miles.
    #[serde(default = "default_radius_miles")]
    pub radius_miles: f64,
    /// Hotspot clustering distance threshold in miles.
    #[serde(default = "default_cluster_threshold_miles")]
    pub cluster_threshold_miles: f64,
    /// Minimum incidents for a cluster to be a hotspot.
    #[serde(default = "default_min_cluster_size")]
    pub min_cluster_size: usize,
    /// Maximum hotspots reported.
    #[serde(default = "default_max_hotspots")]
    pub max_hotspots: usize,
    /// Maximum recommendations per brief.
    #[serde(default = "default_max_recommendations")]
    pub max_recommendations: usize,
    /// Current-period totals at or above this add an elevated-activity
    /// warning.
    #[serde(default = "default_elevated_threshold")]
    pub elevated_threshold: u64,
}

/// Scheduler settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Weekday for the weekly brief (e.g. `"Mon"`).
    #[serde(default = "default_weekly_weekday")]
    pub weekly_weekday: String,
    /// Local hour-of-day briefs go out (0-23).
    #[serde(default = "default_send_hour")]
    pub send_hour: u32,
    /// The metro's civic UTC offset in hours (Chicago: -6 standard).
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
    /// How many subscriber runs execute concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Per-subscriber run timeout in seconds.
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,
}

const fn default_page_size() -> u64 {
    1_000
}
const fn default_lag_days() -> i64 {
    3
}
const fn default_settle_days() -> i64 {
    7
}
const fn default_window_days() -> i64 {
    7
}
const fn default_refresh_ttl_minutes() -> i64 {
    60
}
const fn default_geocode_timeout_ms() -> u64 {
    10_000
}
const fn default_rate_limit_ms() -> u64 {
    1_100
}
const fn default_radius_miles() -> f64 {
    0.5
}
const fn default_cluster_threshold_miles() -> f64 {
    0.15
}
const fn default_min_cluster_size() -> usize {
    2
}
const fn default_max_hotspots() -> usize {
    3
}
const fn default_max_recommendations() -> usize {
    3
}
const fn default_elevated_threshold() -> u64 {
    50
}
fn default_weekly_weekday() -> String {
    "Mon".to_string()
}
const fn default_send_hour() -> u32 {
    6
}
const fn default_utc_offset_hours() -> i32 {
    -6
}
const fn default_concurrency() -> usize {
    4
}
const fn default_run_timeout_secs() -> u64 {
    60
}

impl Default for EngineConfig {
    /// The compiled-in defaults.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML is malformed — a build-time
    /// invariant, covered by tests.
    fn default() -> Self {
        toml::de::from_str(DEFAULT_CONFIG).expect("embedded default.toml is malformed")
    }
}

impl EngineConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns the TOML deserialization error for malformed input or
    /// unknown fields.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::de::from_str(text)
    }

    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or a parse
    /// error as from [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: &std::path::Path) -> Result<Self, Box<dyn std::error::Error>> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&text)?)
    }
}
