//! Event bus configuration.

use std::time::Duration;

use skillforge_core::error::DomainError;

/// Default ring buffer capacity for event history.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1_000;

/// Largest accepted `EVENT_HISTORY_CAPACITY`.
pub const MAX_HISTORY_CAPACITY: usize = 100_000;

/// Default per-handler timeout.
pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of failed retries before an entry is marked
/// `FAILED_PERMANENTLY`.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Tunables for the event bus and its dead-letter handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBusConfig {
    /// Number of publishes retained in history.
    pub history_capacity: usize,
    /// Time a handler may run before it is treated as failed.
    pub handler_timeout: Duration,
    /// Failed retries allowed per dead-letter entry.
    pub max_retries: u32,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            handler_timeout: DEFAULT_HANDLER_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl EventBusConfig {
    /// Reads `EVENT_HISTORY_CAPACITY`, `EVENT_HANDLER_TIMEOUT_SECS` and
    /// `DLQ_MAX_RETRIES` from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` for unparseable values.
    pub fn from_env() -> Result<Self, DomainError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`EventBusConfig::from_env`] with an injectable lookup.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` for unparseable, zero or
    /// out-of-range values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DomainError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let history_capacity = match parse_positive(&lookup, "EVENT_HISTORY_CAPACITY")? {
            Some(v) => usize::try_from(v)
                .ok()
                .filter(|v| *v <= MAX_HISTORY_CAPACITY)
                .ok_or_else(|| {
                    DomainError::invalid_argument(format!(
                        "EVENT_HISTORY_CAPACITY must be at most {MAX_HISTORY_CAPACITY}, got {v}"
                    ))
                })?,
            None => defaults.history_capacity,
        };
        let handler_timeout = parse_positive(&lookup, "EVENT_HANDLER_TIMEOUT_SECS")?
            .map_or(defaults.handler_timeout, Duration::from_secs);
        let max_retries = match parse_positive(&lookup, "DLQ_MAX_RETRIES")? {
            Some(v) => u32::try_from(v)
                .map_err(|_| DomainError::invalid_argument("DLQ_MAX_RETRIES is too large"))?,
            None => defaults.max_retries,
        };

        Ok(Self {
            history_capacity,
            handler_timeout,
            max_retries,
        })
    }
}

fn parse_positive<F>(lookup: &F, key: &str) -> Result<Option<u64>, DomainError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let value: u64 = raw
        .trim()
        .parse()
        .map_err(|e| DomainError::invalid_argument(format!("{key} must be a positive integer: {e}")))?;
    if value == 0 {
        return Err(DomainError::invalid_argument(format!("{key} must be greater than zero")));
    }
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_variables_yield_defaults() {
        let config = EventBusConfig::from_lookup(|_| None).unwrap();

        assert_eq!(config, EventBusConfig::default());
        assert_eq!(config.history_capacity, 1_000);
        assert_eq!(config.handler_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_variables_override_defaults() {
        let config = EventBusConfig::from_lookup(|key| match key {
            "EVENT_HISTORY_CAPACITY" => Some("50".into()),
            "EVENT_HANDLER_TIMEOUT_SECS" => Some("5".into()),
            "DLQ_MAX_RETRIES" => Some("7".into()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.history_capacity, 50);
        assert_eq!(config.handler_timeout, Duration::from_secs(5));
        assert_eq!(config.max_retries, 7);
    }

    #[test]
    fn test_zero_and_garbage_are_rejected() {
        assert!(EventBusConfig::from_lookup(|k| (k == "DLQ_MAX_RETRIES").then(|| "0".into())).is_err());
        assert!(
            EventBusConfig::from_lookup(|k| (k == "EVENT_HISTORY_CAPACITY").then(|| "lots".into()))
                .is_err()
        );
    }

    #[test]
    fn test_history_capacity_above_limit_is_rejected() {
        // Arrange
        let over = (MAX_HISTORY_CAPACITY + 1).to_string();

        // Act
        let huge = EventBusConfig::from_lookup(|k| {
            (k == "EVENT_HISTORY_CAPACITY").then(|| "18446744073709551615".into())
        });
        let just_over =
            EventBusConfig::from_lookup(|k| (k == "EVENT_HISTORY_CAPACITY").then(|| over.clone()));
        let at_limit = EventBusConfig::from_lookup(|k| {
            (k == "EVENT_HISTORY_CAPACITY").then(|| MAX_HISTORY_CAPACITY.to_string())
        });

        // Assert
        assert!(matches!(huge, Err(DomainError::InvalidArgument(_))));
        assert!(matches!(just_over, Err(DomainError::InvalidArgument(_))));
        assert_eq!(at_limit.unwrap().history_capacity, MAX_HISTORY_CAPACITY);
    }
}
