//! HTTP API for conditions aggregation and favorites

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{any, get},
};
use serde_json::{Value, json};
use tracing::info;

use crate::config::AppConfig;
use crate::error::AirsightError;
use crate::favorites::{FavoriteStore, NewFavorite};
use crate::models::{ConditionsResponse, InputCoordinates, Measurement, StationSummary};
use crate::openaq::{self, OpenAqClient};
use crate::openweather::OpenWeatherClient;

/// Shared handler state: the startup configuration and one HTTP client.
///
/// Provider clients are built per request from the config, so missing
/// credentials surface as per-request errors instead of startup failures.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub http: reqwest::Client,
}

impl AppState {
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
            http: reqwest::Client::new(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/conditions", get(get_conditions))
        .route("/favorites", any(favorites))
        .with_state(state)
}

async fn get_conditions(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ConditionsResponse>, AirsightError> {
    // Presence check only; the raw strings are passed through to the
    // providers unvalidated.
    let lat = params.get("lat").filter(|v| !v.is_empty());
    let lon = params.get("lon").filter(|v| !v.is_empty());
    let (Some(lat), Some(lon)) = (lat, lon) else {
        return Err(AirsightError::bad_request("Missing lat or lon"));
    };

    let (openaq_key, openweather_key) = state.config.provider_keys()?;
    let openaq = OpenAqClient::new(state.http.clone(), openaq_key);
    let openweather = OpenWeatherClient::new(state.http.clone(), openweather_key);

    let conditions = fetch_conditions(&openaq, &openweather, lat, lon).await?;
    info!(
        "conditions for ({lat}, {lon}): {} measurements",
        conditions.openaq_measurements.len()
    );
    Ok(Json(conditions))
}

/// Run the air-quality chain and the weather fetch concurrently and join
/// the results into one normalized document.
pub async fn fetch_conditions(
    openaq: &OpenAqClient,
    openweather: &OpenWeatherClient,
    lat: &str,
    lon: &str,
) -> Result<ConditionsResponse, AirsightError> {
    let (air_quality, snapshot) = tokio::join!(
        fetch_air_quality(openaq, lat, lon),
        openweather.current(lat, lon)
    );

    // Location/latest failures take precedence over a weather failure; a
    // weather failure still discards completed air-quality work.
    let (openaq_location, openaq_measurements) = air_quality?;
    let weather = snapshot?;

    Ok(ConditionsResponse {
        input: InputCoordinates::parse(lat, lon),
        openaq_location,
        openaq_measurements,
        weather,
    })
}

/// Nearest station, its latest readings, and the sensor-metadata fan-out.
///
/// No station within range is not an error: the response carries a null
/// station and an empty measurement list.
async fn fetch_air_quality(
    client: &OpenAqClient,
    lat: &str,
    lon: &str,
) -> Result<(Option<StationSummary>, Vec<Measurement>), AirsightError> {
    let Some(location) = client.nearest_location(lat, lon).await? else {
        return Ok((None, Vec::new()));
    };

    // A station row without an id is still reported; only the readings
    // chain needs one.
    let station = StationSummary {
        id: location.id,
        name: location.name,
    };
    let Some(station_id) = station.id else {
        return Ok((Some(station), Vec::new()));
    };

    let readings = client.latest_readings(station_id).await?;
    let sensor_ids = openaq::distinct_sensor_ids(&readings, openaq::SENSOR_FETCH_CAP);
    let metadata = client.fetch_sensor_metadata(&sensor_ids).await;
    let measurements = openaq::join_measurements(&readings, &metadata);

    Ok((Some(station), measurements))
}

/// Method dispatch for `/favorites`, mirroring the store-credential check
/// before the method check so every verb reports missing configuration.
async fn favorites(State(state): State<AppState>, method: Method, body: String) -> Response {
    let (url, key) = match state.config.store_config() {
        Ok(store_config) => store_config,
        Err(err) => return err.into_response(),
    };
    let store = FavoriteStore::new(url, key);

    if method == Method::GET {
        list_favorites(&store).await.into_response()
    } else if method == Method::POST {
        let payload: Value = serde_json::from_str(&body).unwrap_or_else(|_| json!({}));
        create_favorite(&store, &payload).await.into_response()
    } else {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "GET, POST")],
            Json(json!({ "error": "Method Not Allowed" })),
        )
            .into_response()
    }
}

async fn list_favorites(store: &FavoriteStore) -> Result<Json<Value>, AirsightError> {
    let favorites = store.list().await?;
    Ok(Json(json!({ "favorites": favorites })))
}

async fn create_favorite(
    store: &FavoriteStore,
    body: &Value,
) -> Result<Json<Value>, AirsightError> {
    let new_favorite = NewFavorite::from_body(body)?;
    let favorite = store.insert(&new_favorite).await?;
    Ok(Json(json!({ "ok": true, "favorite": favorite })))
}
