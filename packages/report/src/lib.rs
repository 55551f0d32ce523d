#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Report rendering.
//!
//! [`render`] is a pure function from analyzer output to a structured
//! [`Report`]: no randomness, no side effects, stable under repeated
//! calls with the same input. The transport layer decides how the
//! rendered text is framed for the user.

pub mod recommendations;

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use crime_brief_analytics_models::{Analysis, TrendDelta};
use crime_brief_models::{AddressLabel, UserId};
use serde::{Deserialize, Serialize};

pub use recommendations::recommendations;

/// Rendering tunables. The thresholds are product configuration; the
/// renderer itself stays deterministic for any fixed values.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// At most this many recommendations are included.
    pub max_recommendations: usize,
    /// Current-period totals at or above this add an elevated-activity
    /// warning.
    pub elevated_threshold: u64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            max_recommendations: 3,
            elevated_threshold: 50,
        }
    }
}

/// Context the engine knows and the analyzer doesn't.
#[derive(Debug, Clone)]
pub struct ReportMeta {
    /// Who the report is for.
    pub user_id: UserId,
    /// Which saved address it covers.
    pub address_label: AddressLabel,
    /// The address text as the user entered it.
    pub address_text: String,
    /// Radius the incidents were filtered to.
    pub radius_miles: f64,
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// The feed was unreachable; this is last-known-good data.
    pub stale: bool,
    /// The window reaches into the feed's reporting lag.
    pub incomplete: bool,
}

/// A rendered brief. Ephemeral — never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Who the report is for.
    pub generated_for: UserId,
    /// Which saved address it covers.
    pub address_label: AddressLabel,
    /// The covered address text.
    pub address_text: String,
    /// Filter radius in miles.
    pub radius_miles: f64,
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Last-known-good data flag.
    pub stale: bool,
    /// Reporting-lag incompleteness flag.
    pub incomplete: bool,
    /// One-line risk narrative.
    pub headline: String,
    /// Full analyzer output (counts, deltas, hotspots, risk profile).
    pub analysis: Analysis,
    /// 1-3 rule-table recommendations.
    pub recommendations: Vec<String>,
    /// The rendered plain-text brief.
    pub text: String,
}

/// Renders an analysis into a report.
#[must_use]
pub fn render(meta: &ReportMeta, analysis: Analysis, options: &RenderOptions) -> Report {
    let headline = headline(&analysis, meta);
    let recommendations = recommendations(&analysis, options);
    let text = render_text(meta, &analysis, &headline, &recommendations);

    Report {
        generated_for: meta.user_id,
        address_label: meta.address_label,
        address_text: meta.address_text.clone(),
        radius_miles: meta.radius_miles,
        generated_at: meta.generated_at,
        stale: meta.stale,
        incomplete: meta.incomplete,
        headline,
        analysis,
        recommendations,
        text,
    }
}

fn headline(analysis: &Analysis, meta: &ReportMeta) -> String {
    let total = analysis.current.total;
    if total == 0 {
        return format!(
            "All clear: zero incidents within {:.1} miles this period",
            meta.radius_miles
        );
    }

    let overall = TrendDelta::from_counts(analysis.prior.total, total);
    let movement = match overall {
        TrendDelta::New => "first activity after a quiet week".to_string(),
        TrendDelta::NoChange => "unchanged from the prior week".to_string(),
        TrendDelta::Percent(_) => format!("{overall} vs the prior week"),
    };
    format!(
        "{total} incidents within {:.1} miles, {movement}",
        meta.radius_miles
    )
}

fn render_text(
    meta: &ReportMeta,
    analysis: &Analysis,
    headline: &str,
    recommendations: &[String],
) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "CRIME BRIEF - {}", meta.address_text);
    let _ = writeln!(
        out,
        "Period {} to {}",
        analysis.current.start.format("%b %d"),
        analysis.current.end.format("%b %d")
    );
    if meta.stale {
        let _ = writeln!(out, "NOTE: data source unavailable; showing last known data");
    }
    if meta.incomplete {
        let _ = writeln!(out, "NOTE: most recent days may be incomplete (reporting lag)");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "{headline}");

    if analysis.current.total > 0 {
        let _ = writeln!(out);
        let _ = writeln!(out, "BREAKDOWN");
        #[allow(clippy::cast_precision_loss)]
        for (rank, trend) in analysis.trends.iter().filter(|t| t.current > 0).enumerate() {
            let share = trend.current as f64 / analysis.current.total as f64 * 100.0;
            let _ = writeln!(
                out,
                "{}. {}: {} ({share:.0}%, {})",
                rank + 1,
                trend.category.label(),
                trend.current,
                trend.delta
            );
        }

        if !analysis.hotspots.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "HOTSPOTS");
            for (rank, hotspot) in analysis.hotspots.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "{}. {} x{} near {:.4}, {:.4}",
                    rank + 1,
                    hotspot.dominant_category.label(),
                    hotspot.incident_count,
                    hotspot.center.latitude,
                    hotspot.center.longitude
                );
            }
        }

        if let (Some(day), Some(block)) =
            (analysis.risk.riskiest_day, analysis.risk.riskiest_block)
        {
            let _ = writeln!(out);
            let _ = writeln!(out, "HIGHEST RISK");
            let _ = writeln!(out, "{day}, {}", block.label());
        }
    }

    if !recommendations.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "RECOMMENDATIONS");
        for rec in recommendations {
            let _ = writeln!(out, "- {rec}");
        }
    }

    out
}
