//! Nominatim / OpenStreetMap geocoding provider.
//!
//! Nominatim has strict rate limits: **1 request per second** maximum
//! on the public instance. The adapter enforces the delay; this module
//! only issues single requests.
//!
//! See <https://nominatim.org/release-docs/develop/api/Search/>

use async_trait::async_trait;
use crime_brief_models::LatLon;

use crate::{GeocodeError, GeocodeProvider, GeocodedAddress};

/// Nominatim-backed [`GeocodeProvider`] biased to the service's metro
/// area.
pub struct NominatimProvider {
    client: reqwest::Client,
    base_url: String,
    /// City appended to every query (e.g. `"Chicago"`).
    bias_city: String,
    /// State appended to every query (e.g. `"IL"`).
    bias_state: String,
}

impl NominatimProvider {
    /// Creates a provider against `base_url` (e.g.
    /// `"https://nominatim.openstreetmap.org/search"`), biasing every
    /// query to the given city and state.
    #[must_use]
    pub fn new(base_url: &str, bias_city: &str, bias_state: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.to_string(),
            bias_city: bias_city.to_string(),
            bias_state: bias_state.to_string(),
        }
    }
}

#[async_trait]
impl GeocodeProvider for NominatimProvider {
    async fn lookup(&self, query: &str) -> Result<Option<GeocodedAddress>, GeocodeError> {
        let biased = format!("{query}, {}, {}", self.bias_city, self.bias_state);
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", biased.as_str()),
                ("countrycodes", "us"),
                ("format", "jsonv2"),
                ("limit", "1"),
            ])
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GeocodeError::RateLimited);
        }

        let body: serde_json::Value = resp.json().await?;
        parse_response(&body)
    }
}

/// Parses a Nominatim JSON response into the first candidate, if any.
fn parse_response(body: &serde_json::Value) -> Result<Option<GeocodedAddress>, GeocodeError> {
    let results = body.as_array().ok_or_else(|| GeocodeError::Parse {
        message: "Nominatim response is not an array".to_string(),
    })?;

    let Some(first) = results.first() else {
        return Ok(None);
    };

    let latitude = first["lat"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| GeocodeError::Parse {
            message: "Missing lat in Nominatim response".to_string(),
        })?;

    let longitude = first["lon"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| GeocodeError::Parse {
            message: "Missing lon in Nominatim response".to_string(),
        })?;

    let display_name = first["display_name"].as_str().map(String::from);

    Ok(Some(GeocodedAddress {
        point: LatLon::new(latitude, longitude),
        display_name,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nominatim_result() {
        let body = serde_json::json!([{
            "lat": "41.8827",
            "lon": "-87.6278",
            "display_name": "123, North State Street, Chicago, IL, USA"
        }]);
        let result = parse_response(&body).unwrap().unwrap();
        assert!((result.point.latitude - 41.8827).abs() < 1e-4);
        assert!((result.point.longitude - -87.6278).abs() < 1e-4);
        assert!(result.display_name.unwrap().contains("State Street"));
    }

    #[test]
    fn parses_nominatim_empty() {
        let body = serde_json::json!([]);
        assert!(parse_response(&body).unwrap().is_none());
    }

    #[test]
    fn rejects_non_array_response() {
        let body = serde_json::json!({"error": "boom"});
        assert!(matches!(
            parse_response(&body),
            Err(GeocodeError::Parse { .. })
        ));
    }
}
