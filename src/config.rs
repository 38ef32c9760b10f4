//! Configuration management for the airsight service
//!
//! Builds an explicit configuration struct once at startup from an optional
//! `config.toml` and environment variables. Missing credentials do not stop
//! the server from starting; the accessors below turn absence into the
//! credential-missing error responses instead.

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::AirsightError;

/// Root configuration for the airsight service
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// OpenAQ v3 API key
    pub openaq_api_key: Option<String>,
    /// OpenWeather API key
    pub openweather_api_key: Option<String>,
    /// Supabase project URL (PostgREST lives under `/rest/v1`)
    pub supabase_url: Option<String>,
    /// Supabase service-role key
    pub supabase_service_role_key: Option<String>,
    /// Listener port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    3000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openaq_api_key: None,
            openweather_api_key: None,
            supabase_url: None,
            supabase_service_role_key: None,
            port: default_port(),
        }
    }
}

/// Treat empty values the same as absent ones.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl AppConfig {
    /// Load configuration from `config.toml` (if present) and environment
    /// variables (`OPENAQ_API_KEY`, `OPENWEATHER_API_KEY`, `SUPABASE_URL`,
    /// `SUPABASE_SERVICE_ROLE_KEY`, `PORT`).
    pub fn load() -> Result<Self> {
        let settings = Config::builder()
            .add_source(
                File::with_name("config")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(Environment::default().try_parsing(true))
            .build()
            .with_context(|| "Failed to build configuration")?;

        settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")
    }

    /// Both provider API keys, or the credential-missing error with
    /// presence flags for the response body.
    pub fn provider_keys(&self) -> Result<(&str, &str), AirsightError> {
        match (present(&self.openaq_api_key), present(&self.openweather_api_key)) {
            (Some(openaq), Some(openweather)) => Ok((openaq, openweather)),
            (openaq, openweather) => Err(AirsightError::MissingProviderKeys {
                has_openaq_key: openaq.is_some(),
                has_openweather_key: openweather.is_some(),
            }),
        }
    }

    /// Favorites store URL and key, or the credential-missing error with
    /// presence flags.
    pub fn store_config(&self) -> Result<(&str, &str), AirsightError> {
        match (
            present(&self.supabase_url),
            present(&self.supabase_service_role_key),
        ) {
            (Some(url), Some(key)) => Ok((url, key)),
            (url, key) => Err(AirsightError::MissingStoreConfig {
                has_supabase_url: url.is_some(),
                has_supabase_key: key.is_some(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.port, 3000);
        assert!(config.openaq_api_key.is_none());
        assert!(config.supabase_url.is_none());
    }

    #[test]
    fn test_provider_keys_present() {
        let config = AppConfig {
            openaq_api_key: Some("aq-key".to_string()),
            openweather_api_key: Some("ow-key".to_string()),
            ..AppConfig::default()
        };
        let (openaq, openweather) = config.provider_keys().unwrap();
        assert_eq!(openaq, "aq-key");
        assert_eq!(openweather, "ow-key");
    }

    #[test]
    fn test_provider_keys_missing_reports_flags() {
        let config = AppConfig {
            openaq_api_key: Some("aq-key".to_string()),
            ..AppConfig::default()
        };
        let err = config.provider_keys().unwrap_err();
        match err {
            AirsightError::MissingProviderKeys {
                has_openaq_key,
                has_openweather_key,
            } => {
                assert!(has_openaq_key);
                assert!(!has_openweather_key);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_key_counts_as_missing() {
        let config = AppConfig {
            openaq_api_key: Some(String::new()),
            openweather_api_key: Some("ow-key".to_string()),
            ..AppConfig::default()
        };
        let err = config.provider_keys().unwrap_err();
        match err {
            AirsightError::MissingProviderKeys { has_openaq_key, .. } => {
                assert!(!has_openaq_key);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_store_config_missing_reports_flags() {
        let config = AppConfig {
            supabase_url: Some("https://example.supabase.co".to_string()),
            ..AppConfig::default()
        };
        let err = config.store_config().unwrap_err();
        match err {
            AirsightError::MissingStoreConfig {
                has_supabase_url,
                has_supabase_key,
            } => {
                assert!(has_supabase_url);
                assert!(!has_supabase_key);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
