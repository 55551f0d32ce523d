//! Socrata SODA API incident feed.
//!
//! Fetches incident records with `$limit`/`$offset` pagination, ordered
//! by the date column, filtered to the requested window via `$where`.
//! Records are normalized into [`Incident`]s as pages arrive; records
//! with missing or null coordinates, timestamps, or ids are skipped
//! with a warning rather than failing the whole fetch.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use crime_brief_models::{Incident, LatLon};

use crate::type_mapping::map_category;
use crate::{FetchWindow, IncidentFeed, SourceError, retry};

/// Configuration for a Socrata-backed feed.
#[derive(Debug, Clone)]
pub struct SocrataConfig {
    /// Base API URL (e.g.
    /// `"https://data.cityofchicago.org/resource/ijzp-q8t2.json"`).
    pub api_url: String,
    /// The date column name for ordering and `$where` filtering.
    pub date_column: String,
    /// Page size for pagination.
    pub page_size: u64,
    /// Label for log messages (e.g. `"Chicago"`).
    pub label: String,
}

impl Default for SocrataConfig {
    fn default() -> Self {
        Self {
            api_url: "https://data.cityofchicago.org/resource/ijzp-q8t2.json".to_string(),
            date_column: "date".to_string(),
            page_size: 1_000,
            label: "Chicago".to_string(),
        }
    }
}

/// Socrata SODA [`IncidentFeed`] implementation.
pub struct SocrataFeed {
    client: reqwest::Client,
    config: SocrataConfig,
}

impl SocrataFeed {
    /// Creates a feed client for the given dataset.
    #[must_use]
    pub fn new(config: SocrataConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl IncidentFeed for SocrataFeed {
    async fn fetch_window(&self, window: FetchWindow) -> Result<Vec<Incident>, SourceError> {
        let since = window.since.format("%Y-%m-%dT%H:%M:%S").to_string();
        let until = window.until.format("%Y-%m-%dT%H:%M:%S").to_string();
        let date_column = &self.config.date_column;
        let where_clause =
            format!("{date_column} >= '{since}' AND {date_column} < '{until}'");

        // Dedupe by incident id across pagination boundaries; Socrata
        // can repeat rows at page edges when the dataset updates
        // mid-fetch.
        let mut by_id: BTreeMap<String, Incident> = BTreeMap::new();
        let mut skipped = 0_u64;
        let mut offset = 0_u64;

        loop {
            let page_limit = self.config.page_size;
            log::info!(
                "Fetching {} incidents: offset={offset}, limit={page_limit}",
                self.config.label
            );

            let body = retry::send_json(|| {
                self.client.get(&self.config.api_url).query(&[
                    ("$limit", page_limit.to_string()),
                    ("$offset", offset.to_string()),
                    ("$order", format!("{date_column} ASC")),
                    ("$where", where_clause.clone()),
                ])
            })
            .await?;

            let records = body.as_array().ok_or_else(|| SourceError::Unavailable {
                message: "feed response is not an array".to_string(),
            })?;

            let count = records.len() as u64;
            for record in records {
                match normalize_record(record) {
                    Some(incident) => {
                        by_id.insert(incident.id.clone(), incident);
                    }
                    None => skipped += 1,
                }
            }

            if count < page_limit {
                break;
            }
            offset += count;
        }

        if skipped > 0 {
            log::warn!(
                "Skipped {skipped} {} records with missing id/date/coordinates",
                self.config.label
            );
        }
        log::info!(
            "Fetched {} {} incidents for window {} .. {}",
            by_id.len(),
            self.config.label,
            window.since,
            window.until
        );

        Ok(by_id.into_values().collect())
    }
}

/// Normalizes one feed record. Returns `None` if required fields are
/// missing or unparseable (the record is skipped, never fatal).
#[must_use]
pub fn normalize_record(record: &serde_json::Value) -> Option<Incident> {
    let id = record["id"].as_str()?.to_string();
    if id.is_empty() {
        return None;
    }

    let timestamp = parse_feed_timestamp(record["date"].as_str()?)?;
    let latitude = parse_coordinate(&record["latitude"])?;
    let longitude = parse_coordinate(&record["longitude"])?;

    let raw_category = record["primary_type"].as_str().unwrap_or("").to_string();
    let description = record["description"].as_str().unwrap_or("").to_string();

    Some(Incident {
        category: map_category(&raw_category),
        raw_category,
        id,
        timestamp,
        location: LatLon::new(latitude, longitude),
        description,
    })
}

/// The feed reports naive local-ish timestamps like
/// `"2026-07-28T22:15:00.000"`; treat them as UTC for windowing
/// purposes (the feed's `$where` filter uses the same column).
fn parse_feed_timestamp(raw: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Coordinates arrive as JSON strings or numbers depending on dataset
/// vintage; accept both.
fn parse_coordinate(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crime_brief_models::IncidentCategory;

    fn record(id: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "primary_type": "THEFT",
            "description": "POCKET-PICKING",
            "date": "2026-07-28T22:15:00.000",
            "latitude": "41.8827",
            "longitude": "-87.6278"
        })
    }

    #[test]
    fn normalizes_a_complete_record() {
        let incident = normalize_record(&record("12345")).unwrap();
        assert_eq!(incident.id, "12345");
        assert_eq!(incident.category, IncidentCategory::Theft);
        assert_eq!(incident.raw_category, "THEFT");
        assert!((incident.location.latitude - 41.8827).abs() < 1e-6);
        assert_eq!(incident.description, "POCKET-PICKING");
    }

    #[test]
    fn accepts_numeric_coordinates() {
        let mut rec = record("1");
        rec["latitude"] = serde_json::json!(41.9);
        rec["longitude"] = serde_json::json!(-87.7);
        let incident = normalize_record(&rec).unwrap();
        assert!((incident.location.latitude - 41.9).abs() < 1e-9);
    }

    #[test]
    fn skips_records_with_null_coordinates() {
        let mut rec = record("1");
        rec["latitude"] = serde_json::Value::Null;
        assert!(normalize_record(&rec).is_none());
    }

    #[test]
    fn skips_records_with_missing_date() {
        let mut rec = record("1");
        rec.as_object_mut().unwrap().remove("date");
        assert!(normalize_record(&rec).is_none());
    }

    #[test]
    fn skips_records_with_bad_date() {
        let mut rec = record("1");
        rec["date"] = serde_json::json!("not a date");
        assert!(normalize_record(&rec).is_none());
    }

    #[test]
    fn skips_records_with_empty_id() {
        assert!(normalize_record(&record("")).is_none());
    }

    #[test]
    fn tolerates_missing_category_and_description() {
        let mut rec = record("1");
        rec.as_object_mut().unwrap().remove("primary_type");
        rec.as_object_mut().unwrap().remove("description");
        let incident = normalize_record(&rec).unwrap();
        assert_eq!(incident.category, IncidentCategory::Other);
        assert_eq!(incident.raw_category, "");
    }
}
