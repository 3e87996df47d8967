//! Server configuration read from the environment.

use std::net::SocketAddr;

use skillforge_cache::CacheConfig;
use skillforge_event_bus::EventBusConfig;

use crate::error::AppError;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;

/// Everything the binary needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// PostgreSQL URL for the dead-letter store; in-memory when absent.
    pub database_url: Option<String>,
    /// OTLP collector endpoint; span export is off when absent.
    pub otlp_endpoint: Option<String>,
    pub event_bus: EventBusConfig,
    pub cache: CacheConfig,
}

impl ApiConfig {
    /// Reads `HOST`, `PORT`, `DATABASE_URL`, `OTEL_EXPORTER_OTLP_ENDPOINT`
    /// plus the event bus and cache variables from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` for any invalid value.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ApiConfig::from_env`] with an injectable lookup.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` for any invalid value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = non_empty("HOST").unwrap_or_else(|| DEFAULT_HOST.to_owned());
        let port = match non_empty("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| AppError::Config(format!("PORT must be a valid u16: {e}")))?,
            None => DEFAULT_PORT,
        };
        let event_bus =
            EventBusConfig::from_lookup(&lookup).map_err(|e| AppError::Config(e.to_string()))?;
        let cache = CacheConfig::from_lookup(&lookup).map_err(|e| AppError::Config(e.to_string()))?;

        Ok(Self {
            host,
            port,
            database_url: non_empty("DATABASE_URL"),
            otlp_endpoint: non_empty("OTEL_EXPORTER_OTLP_ENDPOINT"),
            event_bus,
            cache,
        })
    }

    /// The socket address to listen on.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `HOST:PORT` is not a socket address.
    pub fn bind_address(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_empty_environment_yields_in_memory_defaults() {
        let config = ApiConfig::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.database_url, None);
        assert_eq!(config.otlp_endpoint, None);
        assert_eq!(config.event_bus, EventBusConfig::default());
        assert_eq!(config.cache, CacheConfig::default());
    }

    #[test]
    fn test_nested_settings_are_read_through_the_same_lookup() {
        // Arrange
        let lookup = lookup_from(&[
            ("PORT", "8080"),
            ("DATABASE_URL", "postgres://localhost/skillforge"),
            ("EVENT_HANDLER_TIMEOUT_SECS", "5"),
            ("CACHE_ENABLED", "false"),
        ]);

        // Act
        let config = ApiConfig::from_lookup(lookup).unwrap();

        // Assert
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/skillforge"));
        assert_eq!(config.event_bus.handler_timeout, Duration::from_secs(5));
        assert!(!config.cache.enabled);
    }

    #[test]
    fn test_blank_database_url_is_treated_as_unset() {
        let config = ApiConfig::from_lookup(lookup_from(&[("DATABASE_URL", "  ")])).unwrap();

        assert_eq!(config.database_url, None);
    }

    #[test]
    fn test_invalid_values_map_to_config_errors() {
        for pairs in [
            &[("PORT", "http")][..],
            &[("DLQ_MAX_RETRIES", "0")][..],
            &[("CACHE_PROVIDER", "redis")][..],
        ] {
            let result = ApiConfig::from_lookup(lookup_from(pairs));

            assert!(matches!(result, Err(AppError::Config(_))), "{pairs:?}");
        }
    }

    #[test]
    fn test_bind_address_rejects_unparseable_host() {
        let mut config = ApiConfig::from_lookup(lookup_from(&[])).unwrap();
        config.host = "not a host".to_owned();

        assert!(config.bind_address().is_err());
        config.host = "127.0.0.1".to_owned();
        assert_eq!(config.bind_address().unwrap().port(), 3000);
    }
}
