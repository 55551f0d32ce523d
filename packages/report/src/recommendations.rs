//! Fixed recommendation rule table.
//!
//! Rules key off which categories are present and whether they are
//! rising; the table order is the output order, so renders are stable.

use crime_brief_analytics_models::Analysis;
use crime_brief_models::IncidentCategory;

use crate::RenderOptions;

/// Picks 1-3 recommendations for an analysis.
///
/// Walks the category trends in their ranked order (current count
/// descending) and emits the matching rule per category, deduplicated,
/// capped at [`RenderOptions::max_recommendations`]. A rising robbery
/// trend names the top hotspot. Totals at or above the elevated
/// threshold append an area-wide warning that doesn't count against
/// the cap.
#[must_use]
pub fn recommendations(analysis: &Analysis, options: &RenderOptions) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();

    for trend in analysis.trends.iter().filter(|t| t.current > 0) {
        if out.len() >= options.max_recommendations {
            break;
        }
        let line = match trend.category {
            IncidentCategory::Theft | IncidentCategory::MotorVehicleTheft => {
                Some("Secure vehicles and keep valuables out of view".to_string())
            }
            IncidentCategory::Battery | IncidentCategory::Assault => {
                Some("Avoid solo walks after dark".to_string())
            }
            IncidentCategory::Burglary => Some("Verify locks before leaving".to_string()),
            IncidentCategory::Robbery => {
                let mut line = "Stay in lit areas after sunset".to_string();
                if trend.delta.is_rising() {
                    if let Some(hotspot) = analysis.hotspots.first() {
                        line.push_str(&format!(
                            ", especially near {:.4}, {:.4}",
                            hotspot.center.latitude, hotspot.center.longitude
                        ));
                    }
                }
                Some(line)
            }
            _ => None,
        };

        if let Some(line) = line {
            if !out.contains(&line) {
                out.push(line);
            }
        }
    }

    if analysis.current.total >= options.elevated_threshold {
        out.push("Elevated activity in your area this period".to_string());
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone as _, Utc};
    use crime_brief_analytics_models::{
        CategoryTrend, Hotspot, PeriodSummary, RiskProfile, TrendDelta,
    };
    use crime_brief_models::LatLon;

    use super::*;

    fn base_analysis(trends: Vec<CategoryTrend>, total: u64) -> Analysis {
        let period = PeriodSummary {
            start: Utc.with_ymd_and_hms(2026, 7, 20, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2026, 7, 27, 0, 0, 0).unwrap(),
            total,
            by_category: vec![],
        };
        Analysis {
            current: PeriodSummary {
                total,
                ..period.clone()
            },
            prior: period,
            trends,
            hotspots: vec![],
            risk: RiskProfile {
                block_counts: vec![],
                day_counts: vec![],
                riskiest_block: None,
                riskiest_day: None,
            },
        }
    }

    fn trend(category: IncidentCategory, prior: u64, current: u64) -> CategoryTrend {
        CategoryTrend {
            category,
            current,
            prior,
            delta: TrendDelta::from_counts(prior, current),
        }
    }

    #[test]
    fn theft_maps_to_vehicle_advice() {
        let analysis = base_analysis(vec![trend(IncidentCategory::Theft, 1, 4)], 4);
        let recs = recommendations(&analysis, &RenderOptions::default());
        assert_eq!(recs, vec!["Secure vehicles and keep valuables out of view"]);
    }

    #[test]
    fn theft_and_vehicle_theft_dedupe() {
        let analysis = base_analysis(
            vec![
                trend(IncidentCategory::Theft, 1, 4),
                trend(IncidentCategory::MotorVehicleTheft, 0, 2),
            ],
            6,
        );
        let recs = recommendations(&analysis, &RenderOptions::default());
        assert_eq!(recs.len(), 1);
    }

    #[test]
    fn rising_robbery_names_top_hotspot() {
        let mut analysis = base_analysis(vec![trend(IncidentCategory::Robbery, 1, 3)], 3);
        analysis.hotspots = vec![Hotspot {
            center: LatLon::new(41.8827, -87.6278),
            radius_miles: 0.05,
            incident_count: 2,
            dominant_category: IncidentCategory::Robbery,
            earliest: Utc.with_ymd_and_hms(2026, 7, 21, 21, 0, 0).unwrap(),
        }];
        let recs = recommendations(&analysis, &RenderOptions::default());
        assert_eq!(recs.len(), 1);
        assert!(recs[0].contains("41.8827"), "{:?}", recs);
    }

    #[test]
    fn flat_robbery_does_not_name_hotspot() {
        let analysis = base_analysis(vec![trend(IncidentCategory::Robbery, 3, 3)], 3);
        let recs = recommendations(&analysis, &RenderOptions::default());
        assert_eq!(recs, vec!["Stay in lit areas after sunset"]);
    }

    #[test]
    fn capped_at_three() {
        let analysis = base_analysis(
            vec![
                trend(IncidentCategory::Theft, 0, 5),
                trend(IncidentCategory::Battery, 0, 4),
                trend(IncidentCategory::Burglary, 0, 3),
                trend(IncidentCategory::Robbery, 0, 2),
            ],
            14,
        );
        let recs = recommendations(&analysis, &RenderOptions::default());
        assert_eq!(recs.len(), 3);
    }

    #[test]
    fn elevated_activity_appends_warning() {
        let analysis = base_analysis(vec![trend(IncidentCategory::Theft, 10, 60)], 60);
        let recs = recommendations(&analysis, &RenderOptions::default());
        assert!(recs.iter().any(|r| r.contains("Elevated activity")));
    }

    #[test]
    fn unmapped_categories_yield_nothing() {
        let analysis = base_analysis(vec![trend(IncidentCategory::Other, 0, 9)], 9);
        let recs = recommendations(&analysis, &RenderOptions::default());
        assert!(recs.is_empty());
    }
}
