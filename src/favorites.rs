//! Favorite locations, persisted through the Supabase PostgREST API

use postgrest::Postgrest;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::AirsightError;
use crate::models::Favorite;

const TABLE: &str = "favorites";
const MAX_NAME_CHARS: usize = 80;

/// Store for favorite locations, backed by a Supabase `favorites` table.
///
/// Consistency under concurrent writers is the store's business; this side
/// only inserts and reads.
pub struct FavoriteStore {
    client: Postgrest,
}

/// Validated input for one new favorite.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFavorite {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

impl NewFavorite {
    /// Validate a request body into a new favorite.
    ///
    /// The name falls back to "Favorite" when absent or falsy and is
    /// truncated to 80 characters. Latitude and longitude accept numbers or
    /// numeric strings and must be finite.
    pub fn from_body(body: &Value) -> Result<Self, AirsightError> {
        let name = coerce_name(body.get("name"));

        match (coerce_finite(body.get("lat")), coerce_finite(body.get("lon"))) {
            (Some(lat), Some(lon)) => Ok(Self { name, lat, lon }),
            _ => Err(AirsightError::bad_request("Invalid lat/lon")),
        }
    }
}

/// Truthy name coercion: non-empty strings pass through, non-zero numbers
/// and `true` stringify, everything else falls back to "Favorite". The
/// result is truncated to 80 characters.
fn coerce_name(value: Option<&Value>) -> String {
    let name = match value {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) if n.as_f64() != Some(0.0) => n.to_string(),
        Some(Value::Bool(true)) => "true".to_string(),
        _ => return "Favorite".to_string(),
    };
    name.chars().take(MAX_NAME_CHARS).collect()
}

/// Coerce a JSON value to a finite number: numbers pass through, strings
/// are parsed, everything else is rejected.
fn coerce_finite(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

impl FavoriteStore {
    /// Create a store against a Supabase project URL, authenticated with
    /// the service-role key.
    pub fn new(supabase_url: &str, service_key: &str) -> Self {
        let endpoint = format!("{}/rest/v1", supabase_url.trim_end_matches('/'));
        let client = Postgrest::new(endpoint)
            .insert_header("apikey", service_key)
            .insert_header("Authorization", format!("Bearer {service_key}"));
        Self { client }
    }

    /// All favorites, newest first.
    pub async fn list(&self) -> Result<Vec<Favorite>, AirsightError> {
        let response = self
            .client
            .from(TABLE)
            .select("id,name,lat,lon,created_at")
            .order("created_at.desc")
            .execute()
            .await
            .map_err(|e| AirsightError::store(e.to_string()))?;

        // Non-success store responses surface the store's own message.
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AirsightError::store(e.to_string()))?;
        if !status.is_success() {
            return Err(AirsightError::store(body));
        }

        serde_json::from_str(&body).map_err(|e| AirsightError::store(e.to_string()))
    }

    /// Insert one favorite and return the stored row, including its
    /// generated id and creation timestamp.
    pub async fn insert(&self, favorite: &NewFavorite) -> Result<Favorite, AirsightError> {
        let row = json!([{
            "name": favorite.name,
            "lat": favorite.lat,
            "lon": favorite.lon,
        }]);
        debug!("inserting favorite {:?}", favorite.name);

        let response = self
            .client
            .from(TABLE)
            .insert(row.to_string())
            .execute()
            .await
            .map_err(|e| AirsightError::store(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AirsightError::store(e.to_string()))?;
        if !status.is_success() {
            return Err(AirsightError::store(body));
        }

        // PostgREST returns the representation as a one-element array.
        let mut inserted: Vec<Favorite> =
            serde_json::from_str(&body).map_err(|e| AirsightError::store(e.to_string()))?;
        inserted
            .pop()
            .ok_or_else(|| AirsightError::store("insert returned no rows"))
    }
}
