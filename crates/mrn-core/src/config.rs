//! Core runtime configuration.
//!
//! Resolved once at process startup and passed into the allocator, so the
//! core never reads environment variables while handling a registration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{MrnError, MrnResult};

/// Lock wait used when nothing else is configured.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound accepted for the lock wait.
pub const MAX_LOCK_TIMEOUT: Duration = Duration::from_secs(120);

/// Core configuration resolved at startup.
///
/// Deserialization goes through [`CoreConfig::new`], so a stored config is
/// validated the same way as one built in code.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CoreConfigFile")]
pub struct CoreConfig {
    lock_timeout_ms: u64,
    default_facility: Option<String>,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    pub fn new(lock_timeout: Duration, default_facility: Option<String>) -> MrnResult<Self> {
        if lock_timeout.is_zero() {
            return Err(MrnError::Configuration(
                "lock timeout must be greater than zero".into(),
            ));
        }
        if lock_timeout > MAX_LOCK_TIMEOUT {
            return Err(MrnError::Configuration(format!(
                "lock timeout cannot exceed {}s",
                MAX_LOCK_TIMEOUT.as_secs()
            )));
        }

        let default_facility = default_facility
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty());

        Ok(Self {
            lock_timeout_ms: lock_timeout.as_millis() as u64,
            default_facility,
        })
    }

    /// How long a write waits for another writer before giving up.
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Facility used when a registration names none; overrides the stored setting.
    pub fn default_facility(&self) -> Option<&str> {
        self.default_facility.as_deref()
    }
}

/// Unvalidated on-disk shape of [`CoreConfig`].
#[derive(Deserialize)]
struct CoreConfigFile {
    lock_timeout_ms: Option<u64>,
    default_facility: Option<String>,
}

impl TryFrom<CoreConfigFile> for CoreConfig {
    type Error = MrnError;

    fn try_from(file: CoreConfigFile) -> Result<Self, Self::Error> {
        let lock_timeout = file
            .lock_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_LOCK_TIMEOUT);
        CoreConfig::new(lock_timeout, file.default_facility)
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT.as_millis() as u64,
            default_facility: None,
        }
    }
}

/// Parse a lock timeout in milliseconds from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_LOCK_TIMEOUT`].
pub fn lock_timeout_from_env_value(value: Option<String>) -> MrnResult<Duration> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(DEFAULT_LOCK_TIMEOUT),
        Some(v) => v.parse::<u64>().map(Duration::from_millis).map_err(|_| {
            MrnError::Configuration(format!("lock timeout '{}' is not a number of milliseconds", v))
        }),
    }
}

/// Build a `CoreConfig` from raw values as read by the host (e.g. environment).
pub fn config_from_env_values(
    lock_timeout_ms: Option<String>,
    default_facility: Option<String>,
) -> MrnResult<CoreConfig> {
    CoreConfig::new(lock_timeout_from_env_value(lock_timeout_ms)?, default_facility)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let config = CoreConfig::default();
        assert_eq!(config.lock_timeout(), DEFAULT_LOCK_TIMEOUT);
        assert_eq!(config.default_facility(), None);
    }

    #[test]
    fn test_rejects_bad_timeouts() {
        assert!(matches!(
            CoreConfig::new(Duration::ZERO, None),
            Err(MrnError::Configuration(_))
        ));
        assert!(matches!(
            CoreConfig::new(Duration::from_secs(600), None),
            Err(MrnError::Configuration(_))
        ));
    }

    #[test]
    fn test_blank_default_facility_is_none() {
        let config = CoreConfig::new(Duration::from_secs(1), Some("  ".into())).unwrap();
        assert_eq!(config.default_facility(), None);

        let config = CoreConfig::new(Duration::from_secs(1), Some(" HOSP-KRB ".into())).unwrap();
        assert_eq!(config.default_facility(), Some("HOSP-KRB"));
    }

    #[test]
    fn test_lock_timeout_from_env_value() {
        assert_eq!(lock_timeout_from_env_value(None).unwrap(), DEFAULT_LOCK_TIMEOUT);
        assert_eq!(
            lock_timeout_from_env_value(Some(" ".into())).unwrap(),
            DEFAULT_LOCK_TIMEOUT
        );
        assert_eq!(
            lock_timeout_from_env_value(Some("250".into())).unwrap(),
            Duration::from_millis(250)
        );
        assert!(lock_timeout_from_env_value(Some("soon".into())).is_err());
    }

    #[test]
    fn test_config_from_env_values() {
        let config =
            config_from_env_values(Some("1500".into()), Some("HOSP-KRB".into())).unwrap();
        assert_eq!(config.lock_timeout(), Duration::from_millis(1500));
        assert_eq!(config.default_facility(), Some("HOSP-KRB"));

        assert!(config_from_env_values(Some("0".into()), None).is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = CoreConfig::new(Duration::from_millis(750), Some("HOSP-KRB".into())).unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let back: CoreConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_deserialize_validates() {
        assert!(serde_json::from_str::<CoreConfig>(r#"{"lock_timeout_ms":0}"#).is_err());
        assert!(serde_json::from_str::<CoreConfig>(r#"{"lock_timeout_ms":600000}"#).is_err());

        let config: CoreConfig =
            serde_json::from_str(r#"{"default_facility":"  HOSP-KRB "}"#).unwrap();
        assert_eq!(config.lock_timeout(), DEFAULT_LOCK_TIMEOUT);
        assert_eq!(config.default_facility(), Some("HOSP-KRB"));

        let config: CoreConfig = serde_json::from_str(r#"{"default_facility":"  "}"#).unwrap();
        assert_eq!(config.default_facility(), None);
    }
}
