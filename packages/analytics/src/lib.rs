#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Trend and hotspot analysis over proximity-filtered incidents.
//!
//! Input is two incident sets — the current period and the
//! immediately-prior period of equal length, both already filtered to
//! the same center. Output is comparative statistics: category counts,
//! signed deltas, ranked hotspots, and a time-of-day risk profile.
//!
//! Everything here is deterministic: identical inputs always yield
//! identical output, including hotspot ordering.

pub mod hotspots;
pub mod risk;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use crime_brief_analytics_models::{
    Analysis, CategoryCount, CategoryTrend, PeriodSummary, TrendDelta,
};
use crime_brief_models::{Incident, IncidentCategory};

pub use hotspots::cluster_hotspots;
pub use risk::risk_profile;

/// Tunables for the analyzer. Concrete thresholds are product
/// configuration; only determinism and tie-breaks are contractual.
#[derive(Debug, Clone)]
pub struct AnalyzerOptions {
    /// Two incidents within this distance of a cluster's seed join the
    /// cluster.
    pub cluster_threshold_miles: f64,
    /// Clusters smaller than this are not hotspots.
    pub min_cluster_size: usize,
    /// Maximum hotspots reported.
    pub max_hotspots: usize,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            cluster_threshold_miles: 0.15,
            min_cluster_size: 2,
            max_hotspots: 3,
        }
    }
}

/// One period's incidents with its date range.
#[derive(Debug, Clone, Copy)]
pub struct PeriodIncidents<'a> {
    /// Period start (inclusive).
    pub start: DateTime<Utc>,
    /// Period end (exclusive).
    pub end: DateTime<Utc>,
    /// Proximity-filtered incidents in the period.
    pub incidents: &'a [Incident],
}

/// Runs the full analysis for one center.
#[must_use]
pub fn analyze(
    current: PeriodIncidents<'_>,
    prior: PeriodIncidents<'_>,
    options: &AnalyzerOptions,
) -> Analysis {
    let current_counts = count_by_category(current.incidents);
    let prior_counts = count_by_category(prior.incidents);

    let mut trends: Vec<CategoryTrend> = IncidentCategory::all()
        .iter()
        .filter_map(|&category| {
            let cur = current_counts.get(&category).copied().unwrap_or(0);
            let pri = prior_counts.get(&category).copied().unwrap_or(0);
            if cur == 0 && pri == 0 {
                return None;
            }
            Some(CategoryTrend {
                category,
                current: cur,
                prior: pri,
                delta: TrendDelta::from_counts(pri, cur),
            })
        })
        .collect();
    // Highest current activity first; the taxonomy order above makes
    // equal-count ordering deterministic.
    trends.sort_by(|a, b| b.current.cmp(&a.current).then(a.category.cmp(&b.category)));

    Analysis {
        current: summarize(current, &current_counts),
        prior: summarize(prior, &prior_counts),
        trends,
        hotspots: cluster_hotspots(current.incidents, options),
        risk: risk_profile(current.incidents),
    }
}

fn count_by_category(incidents: &[Incident]) -> BTreeMap<IncidentCategory, u64> {
    let mut counts = BTreeMap::new();
    for incident in incidents {
        *counts.entry(incident.category).or_insert(0) += 1;
    }
    counts
}

fn summarize(
    period: PeriodIncidents<'_>,
    counts: &BTreeMap<IncidentCategory, u64>,
) -> PeriodSummary {
    let mut by_category: Vec<CategoryCount> = counts
        .iter()
        .map(|(&category, &count)| CategoryCount { category, count })
        .collect();
    by_category.sort_by(|a, b| b.count.cmp(&a.count).then(a.category.cmp(&b.category)));

    PeriodSummary {
        start: period.start,
        end: period.end,
        total: period.incidents.len() as u64,
        by_category,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;
    use crime_brief_models::LatLon;

    use super::*;

    fn incident(id: &str, raw: &str, hour_offset: i64) -> Incident {
        Incident {
            id: id.to_string(),
            category: category_for(raw),
            raw_category: raw.to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 7, 27, 12, 0, 0).unwrap()
                + chrono::Duration::hours(hour_offset),
            location: LatLon::new(41.8827, -87.6278),
            description: String::new(),
        }
    }

    // The real mapping lives in the source crate; tests here only need
    // a handful of fixed categories.
    fn category_for(raw: &str) -> IncidentCategory {
        match raw {
            "THEFT" => IncidentCategory::Theft,
            "ROBBERY" => IncidentCategory::Robbery,
            "BATTERY" => IncidentCategory::Battery,
            _ => IncidentCategory::Other,
        }
    }

    fn period(incidents: &[Incident], day: u32) -> PeriodIncidents<'_> {
        PeriodIncidents {
            start: Utc.with_ymd_and_hms(2026, 7, day, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2026, 8, 3, 0, 0, 0).unwrap(),
            incidents,
        }
    }

    #[test]
    fn counts_and_deltas() {
        let current = vec![
            incident("1", "THEFT", 0),
            incident("2", "THEFT", 1),
            incident("3", "ROBBERY", 2),
        ];
        let prior = vec![
            incident("4", "THEFT", 0),
            incident("5", "THEFT", 1),
            incident("6", "THEFT", 2),
            incident("7", "THEFT", 3),
            incident("8", "BATTERY", 4),
        ];

        let analysis = analyze(period(&current, 27), period(&prior, 20), &AnalyzerOptions::default());

        assert_eq!(analysis.current.total, 3);
        assert_eq!(analysis.prior.total, 5);

        let theft = analysis
            .trends
            .iter()
            .find(|t| t.category == IncidentCategory::Theft)
            .unwrap();
        assert_eq!(theft.delta, TrendDelta::Percent(-50.0));

        let robbery = analysis
            .trends
            .iter()
            .find(|t| t.category == IncidentCategory::Robbery)
            .unwrap();
        assert_eq!(robbery.delta, TrendDelta::New);

        let battery = analysis
            .trends
            .iter()
            .find(|t| t.category == IncidentCategory::Battery)
            .unwrap();
        assert_eq!(battery.delta, TrendDelta::Percent(-100.0));
    }

    #[test]
    fn trends_ordered_by_current_count_desc() {
        let current = vec![
            incident("1", "ROBBERY", 0),
            incident("2", "ROBBERY", 1),
            incident("3", "THEFT", 2),
        ];
        let prior: Vec<Incident> = vec![];

        let analysis = analyze(period(&current, 27), period(&prior, 20), &AnalyzerOptions::default());
        assert_eq!(analysis.trends[0].category, IncidentCategory::Robbery);
        assert_eq!(analysis.trends[1].category, IncidentCategory::Theft);
    }

    #[test]
    fn absent_categories_produce_no_trend_rows() {
        let current = vec![incident("1", "THEFT", 0)];
        let prior: Vec<Incident> = vec![];
        let analysis = analyze(period(&current, 27), period(&prior, 20), &AnalyzerOptions::default());
        assert_eq!(analysis.trends.len(), 1);
    }

    #[test]
    fn analysis_is_deterministic() {
        let current = vec![
            incident("1", "THEFT", 0),
            incident("2", "THEFT", 1),
            incident("3", "ROBBERY", 2),
        ];
        let prior = vec![incident("4", "BATTERY", 0)];

        let a = analyze(period(&current, 27), period(&prior, 20), &AnalyzerOptions::default());
        let b = analyze(period(&current, 27), period(&prior, 20), &AnalyzerOptions::default());
        assert_eq!(a, b);
    }
}
