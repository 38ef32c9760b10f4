//! Data model for the conditions and favorites endpoints

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Echo of the caller's coordinate input, parsed to numbers.
///
/// Unparseable input serializes as `null` rather than failing the request;
/// the endpoint only checks presence, not validity.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct InputCoordinates {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl InputCoordinates {
    /// Parse the raw query strings; anything that is not a finite number
    /// echoes as `null`.
    #[must_use]
    pub fn parse(lat: &str, lon: &str) -> Self {
        let numeric = |s: &str| s.trim().parse::<f64>().ok().filter(|n| n.is_finite());
        Self {
            lat: numeric(lat),
            lon: numeric(lon),
        }
    }
}

/// Identifier and display name of the nearest monitoring station
///
/// A station row without an id is still reported (the key is omitted);
/// only the readings chain requires one.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StationSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: Option<String>,
}

/// One latest reading joined with its sensor metadata
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Measurement {
    /// Lower-cased parameter key, or "unknown" when metadata is absent
    pub parameter: String,
    /// Display label for charts
    pub display: String,
    /// Always a finite number; non-numeric readings are dropped
    pub value: f64,
    /// Unit string, possibly empty
    pub unit: String,
    /// Local timestamp preferred, else UTC, else null
    pub datetime: Option<String>,
}

/// Current weather for the requested coordinate, fields individually
/// nullable when absent upstream
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WeatherSnapshot {
    pub name: Option<String>,
    pub temp_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub wind_mps: Option<f64>,
}

/// Normalized document returned by the conditions endpoint
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConditionsResponse {
    pub input: InputCoordinates,
    pub openaq_location: Option<StationSummary>,
    pub openaq_measurements: Vec<Measurement>,
    pub weather: WeatherSnapshot,
}

/// A saved favorite location
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Favorite {
    pub id: i64,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub created_at: DateTime<Utc>,
}
