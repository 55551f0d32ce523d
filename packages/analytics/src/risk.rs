//! Time-of-day and day-of-week risk profiling.

use chrono::{Datelike as _, Timelike as _, Weekday};
use crime_brief_analytics_models::{BlockCount, DayCount, RiskProfile, TimeBlock};
use crime_brief_models::Incident;

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Buckets incidents by time block and day of week.
///
/// The riskiest block/day is the highest count; ties resolve to the
/// earlier entry in fixed block/weekday order, keeping the profile
/// deterministic.
#[must_use]
pub fn risk_profile(incidents: &[Incident]) -> RiskProfile {
    let mut block_counts: Vec<BlockCount> = TimeBlock::all()
        .iter()
        .map(|&block| BlockCount { block, count: 0 })
        .collect();
    let mut day_counts: Vec<DayCount> =
        WEEK.iter().map(|&day| DayCount { day, count: 0 }).collect();

    for incident in incidents {
        let block = TimeBlock::from_hour(incident.timestamp.hour());
        if let Some(entry) = block_counts.iter_mut().find(|c| c.block == block) {
            entry.count += 1;
        }
        let day = incident.timestamp.weekday();
        if let Some(entry) = day_counts.iter_mut().find(|c| c.day == day) {
            entry.count += 1;
        }
    }

    // Strict greater-than keeps the earlier entry on ties.
    let mut riskiest_block = None;
    let mut best = 0;
    for entry in &block_counts {
        if entry.count > best {
            best = entry.count;
            riskiest_block = Some(entry.block);
        }
    }
    let mut riskiest_day = None;
    let mut best = 0;
    for entry in &day_counts {
        if entry.count > best {
            best = entry.count;
            riskiest_day = Some(entry.day);
        }
    }

    RiskProfile {
        block_counts,
        day_counts,
        riskiest_block,
        riskiest_day,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone as _, Utc};
    use crime_brief_models::{IncidentCategory, LatLon};

    use super::*;

    fn incident_at(id: &str, day: u32, hour: u32) -> Incident {
        Incident {
            id: id.to_string(),
            category: IncidentCategory::Theft,
            raw_category: "THEFT".to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 7, day, hour, 0, 0).unwrap(),
            location: LatLon::new(41.88, -87.63),
            description: String::new(),
        }
    }

    #[test]
    fn buckets_by_block_and_day() {
        // 2026-07-27 is a Monday.
        let incidents = vec![
            incident_at("1", 27, 19),
            incident_at("2", 27, 22),
            incident_at("3", 28, 8),
        ];
        let profile = risk_profile(&incidents);

        assert_eq!(profile.riskiest_block, Some(TimeBlock::Evening));
        assert_eq!(profile.riskiest_day, Some(Weekday::Mon));

        let evening = profile
            .block_counts
            .iter()
            .find(|c| c.block == TimeBlock::Evening)
            .unwrap();
        assert_eq!(evening.count, 2);
    }

    #[test]
    fn empty_input_has_no_riskiest() {
        let profile = risk_profile(&[]);
        assert_eq!(profile.riskiest_block, None);
        assert_eq!(profile.riskiest_day, None);
        assert_eq!(profile.block_counts.len(), 4);
        assert_eq!(profile.day_counts.len(), 7);
    }

    #[test]
    fn tie_resolves_to_earlier_block() {
        let incidents = vec![incident_at("1", 27, 8), incident_at("2", 27, 20)];
        let profile = risk_profile(&incidents);
        // Morning and Evening both have 1; the earlier block wins.
        assert_eq!(profile.riskiest_block, Some(TimeBlock::Morning));
    }
}
