//! `airsight` - coordinate-based air quality and weather dashboard
//!
//! This library aggregates current weather and nearby air-quality
//! measurements for a coordinate pair and manages saved favorite locations.

pub mod api;
pub mod config;
pub mod error;
pub mod favorites;
pub mod models;
pub mod openaq;
pub mod openweather;
pub mod web;

// Re-export core types for public API
pub use api::AppState;
pub use config::AppConfig;
pub use error::AirsightError;
pub use favorites::{FavoriteStore, NewFavorite};
pub use models::{ConditionsResponse, Favorite, Measurement, WeatherSnapshot};
pub use openaq::OpenAqClient;
pub use openweather::OpenWeatherClient;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, AirsightError>;
