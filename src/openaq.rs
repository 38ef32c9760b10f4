//! OpenAQ v3 client and the measurement join helpers
//!
//! Three calls back the conditions endpoint: nearest-location lookup, latest
//! readings for that location, and per-sensor metadata. The readings arrive
//! loosely typed on purpose: one malformed field blanks that reading instead
//! of failing the whole batch.

use std::collections::HashMap;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::AirsightError;
use crate::models::Measurement;

const BASE_URL: &str = "https://api.openaq.org/v3";

/// Nearest-station search radius around the input coordinate, meters.
const SEARCH_RADIUS_M: u32 = 5000;
/// Latest readings fetched per location.
const LATEST_LIMIT: u32 = 50;
/// Distinct sensor ids that get a metadata lookup per request. Readings on
/// sensors past the cap still produce measurements with defaulted metadata.
pub const SENSOR_FETCH_CAP: usize = 15;

/// An asynchronous client for the OpenAQ v3 API.
pub struct OpenAqClient {
    client: Client,
    api_key: String,
    base_url: String,
}

/// One row from `/locations/{id}/latest`.
///
/// `sensorsId` and `value` keep their raw JSON shape; the accessors apply
/// the integer/finite-number checks the aggregation needs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LatestReading {
    #[serde(rename = "sensorsId")]
    pub sensors_id: Option<Value>,
    pub value: Option<Value>,
    pub datetime: Option<Value>,
}

impl LatestReading {
    /// The reading's sensor id, when it is an integer.
    #[must_use]
    pub fn sensor_id(&self) -> Option<i64> {
        self.sensors_id.as_ref()?.as_i64()
    }

    /// The reading's value, when it is a finite number.
    #[must_use]
    pub fn numeric_value(&self) -> Option<f64> {
        self.value.as_ref()?.as_f64().filter(|v| v.is_finite())
    }

    /// Local timestamp preferred, else UTC, else none.
    #[must_use]
    pub fn timestamp(&self) -> Option<String> {
        let datetime = self.datetime.as_ref()?;
        datetime
            .get("local")
            .and_then(Value::as_str)
            .or_else(|| datetime.get("utc").and_then(Value::as_str))
            .map(str::to_owned)
    }
}

/// Parameter metadata for one sensor from `/sensors/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SensorMetadata {
    pub name: Option<String>,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
    pub units: Option<String>,
}

/// A monitoring location row from `/locations`.
#[derive(Debug, Clone, Deserialize)]
pub struct LocationRow {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LocationsResponse {
    #[serde(default, deserialize_with = "loose_results")]
    results: Vec<LocationRow>,
}

#[derive(Debug, Deserialize)]
struct LatestResponse {
    #[serde(default, deserialize_with = "loose_results")]
    results: Vec<LatestReading>,
}

#[derive(Debug, Deserialize)]
struct SensorResponse {
    #[serde(default, deserialize_with = "loose_results")]
    results: Vec<SensorRow>,
}

/// Deserialize a `results` field tolerantly: a mistyped field degrades to
/// an empty list and malformed elements are dropped, so one bad field
/// cannot fail a 200 response.
fn loose_results<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

#[derive(Debug, Deserialize)]
struct SensorRow {
    #[serde(default)]
    parameter: Option<SensorMetadata>,
}

impl OpenAqClient {
    /// Creates a new client with the provided API key.
    pub fn new(client: Client, api_key: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            base_url: BASE_URL.to_string(),
        }
    }

    /// Creates a client against a custom base URL, for mock servers.
    pub fn new_with_base_url(client: Client, api_key: &str, base_url: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.to_string(),
        }
    }

    /// Read the response body as JSON and split success from upstream error.
    ///
    /// Non-success statuses become a named provider error forwarding the raw
    /// body; transport and parse failures bubble up as internal errors.
    async fn json_or_provider_error(
        response: reqwest::Response,
        upstream: &str,
    ) -> Result<Value, AirsightError> {
        let status = response.status();
        let body: Value = response.json().await?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(AirsightError::provider(upstream, body))
        }
    }

    /// Look up the nearest monitoring location within the search radius.
    ///
    /// Returns `None` when nothing is within range; `lat`/`lon` are passed
    /// through as the caller supplied them.
    pub async fn nearest_location(
        &self,
        lat: &str,
        lon: &str,
    ) -> Result<Option<LocationRow>, AirsightError> {
        let url = format!(
            "{}/locations?coordinates={},{}&radius={}&limit=1",
            self.base_url,
            urlencoding::encode(lat),
            urlencoding::encode(lon),
            SEARCH_RADIUS_M,
        );
        debug!("OpenAQ nearest-location lookup: {url}");

        let response = self
            .client
            .get(&url)
            .header("X-API-Key", &self.api_key)
            .send()
            .await?;
        let body =
            Self::json_or_provider_error(response, "OpenAQ location lookup failed").await?;

        let parsed: LocationsResponse = serde_json::from_value(body)
            .map_err(|e| AirsightError::internal(format!("OpenAQ locations response: {e}")))?;
        Ok(parsed.results.into_iter().next())
    }

    /// Fetch the latest readings for a location, capped at 50.
    pub async fn latest_readings(
        &self,
        location_id: i64,
    ) -> Result<Vec<LatestReading>, AirsightError> {
        let url = format!(
            "{}/locations/{location_id}/latest?limit={LATEST_LIMIT}",
            self.base_url
        );
        debug!("OpenAQ latest readings: {url}");

        let response = self
            .client
            .get(&url)
            .header("X-API-Key", &self.api_key)
            .send()
            .await?;
        let body = Self::json_or_provider_error(response, "OpenAQ latest request failed").await?;

        let parsed: LatestResponse = serde_json::from_value(body)
            .map_err(|e| AirsightError::internal(format!("OpenAQ latest response: {e}")))?;
        Ok(parsed.results)
    }

    /// Fetch parameter metadata for one sensor.
    ///
    /// A non-success status yields `Ok(None)`; the caller treats absence as
    /// defaulted metadata rather than a request failure.
    async fn sensor_metadata(
        &self,
        sensor_id: i64,
    ) -> Result<Option<SensorMetadata>, AirsightError> {
        let url = format!("{}/sensors/{sensor_id}", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("X-API-Key", &self.api_key)
            .send()
            .await?;
        if !response.status().is_success() {
            return Ok(None);
        }

        let body: SensorResponse = response.json().await?;
        Ok(body.results.into_iter().next().and_then(|row| row.parameter))
    }

    /// Fetch metadata for a batch of sensor ids concurrently.
    ///
    /// All fetches are issued at once and all are awaited; an individual
    /// failure or malformed body only leaves that id out of the map. The
    /// returned map lives for the current request only.
    pub async fn fetch_sensor_metadata(
        &self,
        sensor_ids: &[i64],
    ) -> HashMap<i64, SensorMetadata> {
        let fetches = sensor_ids.iter().map(|&sensor_id| async move {
            match self.sensor_metadata(sensor_id).await {
                Ok(Some(metadata)) => Some((sensor_id, metadata)),
                Ok(None) => None,
                Err(err) => {
                    warn!("sensor {sensor_id} metadata lookup failed: {err}");
                    None
                }
            }
        });

        futures::future::join_all(fetches)
            .await
            .into_iter()
            .flatten()
            .collect()
    }
}

/// Collect distinct integer sensor ids in first-encounter order, capped.
#[must_use]
pub fn distinct_sensor_ids(readings: &[LatestReading], cap: usize) -> Vec<i64> {
    let mut ids = Vec::new();
    for reading in readings {
        if let Some(id) = reading.sensor_id() {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids.truncate(cap);
    ids
}

/// Join readings with their (possibly absent) sensor metadata.
///
/// Readings without a finite numeric value are dropped; everything else
/// produces a measurement, with "unknown"/empty defaults when the metadata
/// fetch failed or the sensor fell outside the fetch cap. Provider order is
/// preserved.
#[must_use]
pub fn join_measurements(
    readings: &[LatestReading],
    metadata: &HashMap<i64, SensorMetadata>,
) -> Vec<Measurement> {
    readings
        .iter()
        .filter_map(|reading| {
            let value = reading.numeric_value()?;
            let meta = reading.sensor_id().and_then(|id| metadata.get(&id));

            let parameter = meta
                .and_then(|m| m.name.as_deref())
                .map_or_else(|| "unknown".to_string(), str::to_lowercase);
            let display = meta
                .and_then(|m| m.display_name.as_deref().or(m.name.as_deref()))
                .unwrap_or("unknown")
                .to_string();
            let unit = meta.and_then(|m| m.units.clone()).unwrap_or_default();

            Some(Measurement {
                parameter,
                display,
                value,
                unit,
                datetime: reading.timestamp(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn reading(value: Value) -> LatestReading {
        serde_json::from_value(value).unwrap()
    }

    fn named_meta(name: &str, display: &str, units: &str) -> SensorMetadata {
        SensorMetadata {
            name: Some(name.to_string()),
            display_name: Some(display.to_string()),
            units: Some(units.to_string()),
        }
    }

    #[rstest]
    #[case(json!({"sensorsId": 7, "value": 12.5}), Some(7), Some(12.5))]
    #[case(json!({"sensorsId": 7.5, "value": 0}), None, Some(0.0))]
    #[case(json!({"sensorsId": "7", "value": null}), None, None)]
    #[case(json!({"value": "12.5"}), None, None)]
    #[case(json!({}), None, None)]
    fn test_reading_accessors(
        #[case] raw: Value,
        #[case] sensor_id: Option<i64>,
        #[case] value: Option<f64>,
    ) {
        let reading = reading(raw);
        assert_eq!(reading.sensor_id(), sensor_id);
        assert_eq!(reading.numeric_value(), value);
    }

    #[test]
    fn test_timestamp_prefers_local_over_utc() {
        let with_both = reading(json!({
            "datetime": {"local": "2024-05-01T08:00:00-04:00", "utc": "2024-05-01T12:00:00Z"}
        }));
        assert_eq!(
            with_both.timestamp().as_deref(),
            Some("2024-05-01T08:00:00-04:00")
        );

        let utc_only = reading(json!({"datetime": {"utc": "2024-05-01T12:00:00Z"}}));
        assert_eq!(utc_only.timestamp().as_deref(), Some("2024-05-01T12:00:00Z"));

        let malformed = reading(json!({"datetime": "2024-05-01"}));
        assert_eq!(malformed.timestamp(), None);
    }

    #[test]
    fn test_mistyped_results_field_degrades_to_empty() {
        let latest: LatestResponse =
            serde_json::from_value(json!({ "results": "nope" })).unwrap();
        assert!(latest.results.is_empty());

        let locations: LocationsResponse =
            serde_json::from_value(json!({ "results": { "id": 1 } })).unwrap();
        assert!(locations.results.is_empty());

        let sensors: SensorResponse = serde_json::from_value(json!({})).unwrap();
        assert!(sensors.results.is_empty());
    }

    #[test]
    fn test_malformed_result_rows_are_dropped_not_fatal() {
        let latest: LatestResponse = serde_json::from_value(json!({
            "results": [{ "sensorsId": 1, "value": 2.0 }, 7, "bad"]
        }))
        .unwrap();
        assert_eq!(latest.results.len(), 1);
        assert_eq!(latest.results[0].sensor_id(), Some(1));
    }

    #[test]
    fn test_distinct_sensor_ids_dedupes_and_keeps_order() {
        let readings: Vec<LatestReading> = [3, 1, 3, 2, 1]
            .iter()
            .map(|id| reading(json!({"sensorsId": id, "value": 1.0})))
            .collect();
        assert_eq!(distinct_sensor_ids(&readings, 15), vec![3, 1, 2]);
    }

    #[test]
    fn test_distinct_sensor_ids_caps_at_limit() {
        let readings: Vec<LatestReading> = (0..20)
            .map(|id| reading(json!({"sensorsId": id, "value": 1.0})))
            .collect();
        let ids = distinct_sensor_ids(&readings, SENSOR_FETCH_CAP);
        assert_eq!(ids.len(), 15);
        assert_eq!(ids, (0..15).collect::<Vec<i64>>());
    }

    #[test]
    fn test_distinct_sensor_ids_skips_non_integers() {
        let readings = vec![
            reading(json!({"sensorsId": 4, "value": 1.0})),
            reading(json!({"sensorsId": "5", "value": 1.0})),
            reading(json!({"value": 1.0})),
        ];
        assert_eq!(distinct_sensor_ids(&readings, 15), vec![4]);
    }

    #[test]
    fn test_join_with_metadata() {
        let readings = vec![reading(json!({
            "sensorsId": 9,
            "value": 8.1,
            "datetime": {"local": "2024-05-01T08:00:00-04:00"}
        }))];
        let metadata = HashMap::from([(9, named_meta("PM25", "PM2.5", "µg/m³"))]);

        let measurements = join_measurements(&readings, &metadata);
        assert_eq!(
            measurements,
            vec![Measurement {
                parameter: "pm25".to_string(),
                display: "PM2.5".to_string(),
                value: 8.1,
                unit: "µg/m³".to_string(),
                datetime: Some("2024-05-01T08:00:00-04:00".to_string()),
            }]
        );
    }

    #[test]
    fn test_join_defaults_when_metadata_absent() {
        let readings = vec![reading(json!({"sensorsId": 42, "value": 0}))];
        let measurements = join_measurements(&readings, &HashMap::new());

        assert_eq!(measurements.len(), 1);
        let m = &measurements[0];
        assert_eq!(m.parameter, "unknown");
        assert_eq!(m.display, "unknown");
        assert_eq!(m.value, 0.0);
        assert_eq!(m.unit, "");
        assert_eq!(m.datetime, None);
    }

    #[rstest]
    #[case(json!({"sensorsId": 1, "value": null}))]
    #[case(json!({"sensorsId": 1, "value": "7.2"}))]
    #[case(json!({"sensorsId": 1}))]
    fn test_join_drops_non_numeric_values(#[case] raw: Value) {
        let readings = vec![reading(raw)];
        assert!(join_measurements(&readings, &HashMap::new()).is_empty());
    }

    #[test]
    fn test_join_falls_back_to_name_for_display() {
        let metadata = HashMap::from([(
            3,
            SensorMetadata {
                name: Some("NO2".to_string()),
                display_name: None,
                units: None,
            },
        )]);
        let readings = vec![reading(json!({"sensorsId": 3, "value": 14}))];

        let measurements = join_measurements(&readings, &metadata);
        assert_eq!(measurements[0].parameter, "no2");
        assert_eq!(measurements[0].display, "NO2");
        assert_eq!(measurements[0].unit, "");
    }

    #[test]
    fn test_join_preserves_provider_order() {
        let readings = vec![
            reading(json!({"sensorsId": 2, "value": 5.0})),
            reading(json!({"sensorsId": 1, "value": null})),
            reading(json!({"sensorsId": 1, "value": 3.0})),
        ];
        let values: Vec<f64> = join_measurements(&readings, &HashMap::new())
            .iter()
            .map(|m| m.value)
            .collect();
        assert_eq!(values, vec![5.0, 3.0]);
    }
}
