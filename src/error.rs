//! Error types and HTTP response mapping for the airsight service

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use thiserror::Error;

/// Main error type for the airsight service
#[derive(Error, Debug)]
pub enum AirsightError {
    /// Missing or invalid caller input
    #[error("{message}")]
    BadRequest { message: String },

    /// One or both provider API keys are absent
    #[error("Missing API keys")]
    MissingProviderKeys {
        has_openaq_key: bool,
        has_openweather_key: bool,
    },

    /// Favorites store credentials are absent
    #[error("Missing Supabase env vars")]
    MissingStoreConfig {
        has_supabase_url: bool,
        has_supabase_key: bool,
    },

    /// A named upstream call returned a non-success status
    #[error("{upstream}")]
    Provider { upstream: String, detail: Value },

    /// Favorites store operation failed
    #[error("{message}")]
    Store { message: String },

    /// Unexpected failure anywhere in a handler
    #[error("Server error: {message}")]
    Internal { message: String },
}

impl AirsightError {
    /// Create a new bad-request error
    pub fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Create a new provider error carrying the upstream's raw payload
    pub fn provider<S: Into<String>>(upstream: S, detail: Value) -> Self {
        Self::Provider {
            upstream: upstream.into(),
            detail,
        }
    }

    /// Create a new store error
    pub fn store<S: Into<String>>(message: S) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for AirsightError {
    fn from(err: reqwest::Error) -> Self {
        // Transport failures (connect, body read) are internal errors; only
        // non-success upstream statuses become Provider errors.
        Self::Internal {
            message: err.to_string(),
        }
    }
}

impl IntoResponse for AirsightError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AirsightError::BadRequest { message } => {
                (StatusCode::BAD_REQUEST, json!({ "error": message }))
            }
            AirsightError::MissingProviderKeys {
                has_openaq_key,
                has_openweather_key,
            } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": "Missing API keys",
                    "has_OPENAQ_API_KEY": has_openaq_key,
                    "has_OPENWEATHER_API_KEY": has_openweather_key,
                }),
            ),
            AirsightError::MissingStoreConfig {
                has_supabase_url,
                has_supabase_key,
            } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": "Missing Supabase env vars",
                    "has_SUPABASE_URL": has_supabase_url,
                    "has_SUPABASE_SERVICE_ROLE_KEY": has_supabase_key,
                }),
            ),
            AirsightError::Provider { upstream, detail } => (
                StatusCode::BAD_GATEWAY,
                json!({ "error": upstream, "detail": detail }),
            ),
            AirsightError::Store { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": message }),
            ),
            AirsightError::Internal { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Server error", "detail": message }),
            ),
        };
        (status, Json(body)).into_response()
    }
}
