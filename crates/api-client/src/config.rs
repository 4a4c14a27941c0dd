//! Configuration for the Findixi API client
//!
//! Supports environment-based configuration with sensible defaults.

use crate::error::{ApiError, ApiResult};
use findixi_core::config::{BackendConfig, RoutingConfig};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Default routing service
const DEFAULT_ROUTING_URL: &str = "https://osrm.enpe-erre.com";

/// Environment types
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development (typically localhost Supabase)
    Development,
    /// Staging environment
    Staging,
    /// Production environment
    #[default]
    Production,
}

impl Environment {
    /// Parse from `FINDIXI_ENV`
    pub fn from_env() -> Self {
        Self::parse(&env::var("FINDIXI_ENV").unwrap_or_default())
    }

    fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "development" | "dev" | "local" => Self::Development,
            "staging" | "stage" => Self::Staging,
            _ => Self::Production,
        }
    }

    /// Request timeout suited to the environment
    #[must_use]
    pub fn default_timeout(self) -> Duration {
        match self {
            Self::Development => Duration::from_secs(10),
            Self::Staging | Self::Production => Duration::from_secs(30),
        }
    }
}

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Supabase project URL, e.g. `https://project.supabase.co`
    pub base_url: String,
    /// Supabase anonymous key
    pub anon_key: Option<String>,
    /// Signed-in user's access token
    pub access_token: Option<String>,
    /// OSRM base URL
    pub routing_url: String,
    /// Request timeout for backend calls
    #[serde(with = "millis")]
    pub timeout: Duration,
    /// Request timeout for routing lookups
    #[serde(with = "millis")]
    pub routing_timeout: Duration,
    /// Current environment
    pub environment: Environment,
}

mod millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        u64::try_from(duration.as_millis()).unwrap_or(u64::MAX).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            anon_key: None,
            access_token: None,
            routing_url: DEFAULT_ROUTING_URL.to_string(),
            timeout: Duration::from_secs(30),
            routing_timeout: Duration::from_millis(4000),
            environment: Environment::default(),
        }
    }
}

impl ClientConfig {
    /// Create configuration from environment variables
    ///
    /// Reads the following environment variables:
    /// - `FINDIXI_SUPABASE_URL`: Supabase project URL (required)
    /// - `FINDIXI_SUPABASE_ANON_KEY`: Anonymous key
    /// - `FINDIXI_ACCESS_TOKEN`: Access token of the signed-in user
    /// - `FINDIXI_OSRM_URL`: Routing service URL
    /// - `FINDIXI_ENV`: Environment (development/staging/production)
    /// - `FINDIXI_TIMEOUT_SECS`: Request timeout in seconds
    pub fn from_env() -> ApiResult<Self> {
        let environment = Environment::from_env();
        let base_url = env::var("FINDIXI_SUPABASE_URL").map_err(|_| ApiError::missing_env("FINDIXI_SUPABASE_URL"))?;

        let timeout = env::var("FINDIXI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map_or_else(|| environment.default_timeout(), Duration::from_secs);

        Ok(Self {
            base_url,
            anon_key: env::var("FINDIXI_SUPABASE_ANON_KEY").ok(),
            access_token: env::var("FINDIXI_ACCESS_TOKEN").ok(),
            routing_url: env::var("FINDIXI_OSRM_URL").unwrap_or_else(|_| DEFAULT_ROUTING_URL.to_string()),
            timeout,
            environment,
            ..Self::default()
        })
    }

    /// Create configuration from the `[backend]` and `[routing]` sections
    pub fn from_sections(backend: &BackendConfig, routing: &RoutingConfig) -> ApiResult<Self> {
        let base_url = backend
            .url
            .clone()
            .ok_or_else(|| ApiError::config("backend.url is not set"))?;
        let environment = Environment::from_env();

        Ok(Self {
            base_url,
            anon_key: backend.anon_key.clone(),
            access_token: backend.access_token.clone(),
            routing_url: routing.base_url.clone(),
            timeout: environment.default_timeout(),
            routing_timeout: Duration::from_millis(routing.timeout_ms),
            environment,
        })
    }

    /// Create development configuration (local Supabase)
    #[must_use]
    pub fn development() -> Self {
        Self {
            base_url: "http://localhost:54321".to_string(),
            anon_key: env::var("FINDIXI_SUPABASE_ANON_KEY").ok(),
            timeout: Environment::Development.default_timeout(),
            environment: Environment::Development,
            ..Self::default()
        }
    }

    /// Builder-style method to set base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Builder-style method to set anon key
    #[must_use]
    pub fn with_anon_key(mut self, key: impl Into<String>) -> Self {
        self.anon_key = Some(key.into());
        self
    }

    /// Builder-style method to set the user's access token
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Builder-style method to set the routing URL
    #[must_use]
    pub fn with_routing_url(mut self, url: impl Into<String>) -> Self {
        self.routing_url = url.into();
        self
    }

    /// Builder-style method to set timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> ApiResult<()> {
        for (name, url) in [("base_url", &self.base_url), ("routing_url", &self.routing_url)] {
            if url.is_empty() {
                return Err(ApiError::config(format!("{name} cannot be empty")));
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ApiError::InvalidUrl(url.clone()));
            }
        }

        if self.timeout.is_zero() || self.routing_timeout.is_zero() {
            return Err(ApiError::config("timeouts cannot be zero"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("dev"), Environment::Development);
        assert_eq!(Environment::parse("STAGING"), Environment::Staging);
        assert_eq!(Environment::parse(""), Environment::Production);
    }

    #[test]
    fn test_development_config() {
        let config = ClientConfig::development();
        assert!(config.base_url.contains("localhost"));
        assert_eq!(config.environment, Environment::Development);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_sections() {
        let backend = BackendConfig {
            url: Some("https://project.supabase.co".into()),
            anon_key: Some("anon".into()),
            ..BackendConfig::default()
        };
        let routing = RoutingConfig::default();

        let config = ClientConfig::from_sections(&backend, &routing).unwrap();
        assert_eq!(config.base_url, "https://project.supabase.co");
        assert_eq!(config.routing_url, "https://osrm.enpe-erre.com");
        assert_eq!(config.routing_timeout, Duration::from_millis(4000));

        assert!(ClientConfig::from_sections(&BackendConfig::default(), &routing).is_err());
    }

    #[test]
    fn test_validation() {
        let valid = ClientConfig::default().with_base_url("https://project.supabase.co");
        assert!(valid.validate().is_ok());

        assert!(ClientConfig::default().validate().is_err());
        let bad = ClientConfig::default().with_base_url("ftp://project");
        assert!(matches!(bad.validate(), Err(ApiError::InvalidUrl(_))));
    }
}
