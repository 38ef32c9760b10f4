//! OpenWeather current-conditions client

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::AirsightError;
use crate::models::WeatherSnapshot;

const BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// An asynchronous client for the OpenWeather current-weather API.
pub struct OpenWeatherClient {
    client: Client,
    api_key: String,
    base_url: String,
}

/// Wire shapes of the `/weather` response, reduced to the fields we emit.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CurrentWeatherResponse {
    name: Option<String>,
    main: MainFields,
    wind: WindFields,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MainFields {
    temp: Option<f64>,
    humidity: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WindFields {
    speed: Option<f64>,
}

impl OpenWeatherClient {
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

    /// Fetch current weather for a coordinate, metric units.
    ///
    /// Each snapshot field is independently nullable when the provider
    /// leaves it out. `lat`/`lon` are passed through as the caller supplied
    /// them.
    pub async fn current(&self, lat: &str, lon: &str) -> Result<WeatherSnapshot, AirsightError> {
        let url = format!(
            "{}/weather?lat={}&lon={}&units=metric&appid={}",
            self.base_url,
            urlencoding::encode(lat),
            urlencoding::encode(lon),
            self.api_key,
        );
        debug!("OpenWeather current conditions for ({lat}, {lon})");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let body: Value = response.json().await?;
        if !status.is_success() {
            return Err(AirsightError::provider("OpenWeather request failed", body));
        }

        let parsed: CurrentWeatherResponse = serde_json::from_value(body)
            .map_err(|e| AirsightError::internal(format!("OpenWeather response: {e}")))?;
        Ok(WeatherSnapshot {
            name: parsed.name,
            temp_c: parsed.main.temp,
            humidity_pct: parsed.main.humidity,
            wind_mps: parsed.wind.speed,
        })
    }
}
