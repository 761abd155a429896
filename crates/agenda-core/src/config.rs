use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Environment variable prefix for overrides, e.g. `AGENDA__STORE__BACKEND=http`.
pub const ENV_PREFIX: &str = "AGENDA";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// Where events live
    #[serde(default)]
    pub store: StoreConfig,

    /// Start-time notification settings
    #[serde(default)]
    pub notifications: NotificationConfig,
}

/// Which event store backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Local SQLite file
    #[default]
    Sqlite,
    /// Remote REST API (`/api/events`)
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Base URL of the events REST API (used by the `http` backend)
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// SQLite file path; defaults to `events.db` inside the config directory
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

fn default_api_url() -> String {
    "http://localhost:5000".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            api_url: default_api_url(),
            database_path: None,
        }
    }
}

/// Where notifications are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceKind {
    /// Native desktop notifications
    #[default]
    Desktop,
    /// Write notifications to the log only
    Log,
}

/// What happens to pending notifications when an event is scheduled again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RescheduleMode {
    /// Cancel pending notifications for the same event before arming new ones
    #[default]
    Supersede,
    /// Leave earlier notifications armed; every call fires independently
    Accumulate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Master switch; when false every schedule call is refused like a denied permission
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub surface: SurfaceKind,

    /// Added to every computed delay to absorb clock-read jitter
    #[serde(default = "default_grace_buffer_ms")]
    pub grace_buffer_ms: u64,

    /// Delay between the start notification and the reminder
    #[serde(default = "default_follow_up_minutes")]
    pub follow_up_minutes: u32,

    /// Body used when an event has no description
    #[serde(default = "default_body")]
    pub default_body: String,

    #[serde(default)]
    pub reschedule: RescheduleMode,
}

fn default_enabled() -> bool {
    true
}

fn default_grace_buffer_ms() -> u64 {
    5000
}

fn default_follow_up_minutes() -> u32 {
    5
}

fn default_body() -> String {
    "Your event is starting now!".to_string()
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            surface: SurfaceKind::default(),
            grace_buffer_ms: default_grace_buffer_ms(),
            follow_up_minutes: default_follow_up_minutes(),
            default_body: default_body(),
            reschedule: RescheduleMode::default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("agenda");

        Self {
            config_dir,
            store: StoreConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if missing.
    ///
    /// `AGENDA__*` environment variables override file values.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = Self::default();
            config.save_to(&config_path)?;
            tracing::info!("Wrote default config to {}", config_path.display());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit file, layering defaults below it
    /// and environment overrides above it.
    pub fn load_from(path: &Path) -> Result<Self> {
        let defaults = ::config::Config::try_from(&Self::default())
            .context("Failed to build default config")?;

        let settings = ::config::Config::builder()
            .add_source(defaults)
            .add_source(::config::File::from(path.to_path_buf()).required(false))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read config file")?;

        settings
            .try_deserialize()
            .context("Failed to parse config file")
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.store.backend == StoreBackend::Http {
            self.validate_url(&self.store.api_url, "store.api_url", &mut result);
        }

        if let Some(path) = &self.store.database_path {
            if path.is_dir() {
                result.add_error(
                    "store.database_path",
                    format!("Path is a directory: {}", path.display()),
                );
            }
        }

        let n = &self.notifications;
        if n.follow_up_minutes == 0 {
            result.add_error(
                "notifications.follow_up_minutes",
                "Follow-up offset must be greater than 0",
            );
        } else if n.follow_up_minutes > 24 * 60 {
            result.add_warning(
                "notifications.follow_up_minutes",
                "Follow-up reminder is more than a day after the event start",
            );
        }

        if n.grace_buffer_ms > 60_000 {
            result.add_warning(
                "notifications.grace_buffer_ms",
                "Grace buffer is over a minute; notifications will arrive late",
            );
        }

        if n.default_body.trim().is_empty() {
            result.add_warning(
                "notifications.default_body",
                "Default body is empty; events without a description show a blank notification",
            );
        }

        if !n.enabled {
            result.add_warning("notifications.enabled", "Notifications are disabled");
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// SQLite file used by the `sqlite` backend.
    pub fn database_path(&self) -> PathBuf {
        self.store
            .database_path
            .clone()
            .unwrap_or_else(|| self.config_dir.join("events.db"))
    }

    /// Save configuration to an explicit file
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("agenda");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
    }

    #[test]
    fn test_default_notification_settings() {
        let n = NotificationConfig::default();
        assert_eq!(n.grace_buffer_ms, 5000);
        assert_eq!(n.follow_up_minutes, 5);
        assert_eq!(n.default_body, "Your event is starting now!");
        assert_eq!(n.reschedule, RescheduleMode::Supersede);
    }

    #[test]
    fn test_invalid_api_url_only_checked_for_http_backend() {
        let mut config = Config::default();
        config.store.api_url = "not-a-url".to_string();
        assert!(config.validate().is_valid());

        config.store.backend = StoreBackend::Http;
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "store.api_url"));
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = Config::default();
        config.store.backend = StoreBackend::Http;
        config.store.api_url = "ftp://localhost:5000".to_string();
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_zero_follow_up_is_error() {
        let mut config = Config::default();
        config.notifications.follow_up_minutes = 0;
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result
            .errors
            .iter()
            .any(|e| e.field == "notifications.follow_up_minutes"));
    }

    #[test]
    fn test_large_grace_buffer_is_warning() {
        let mut config = Config::default();
        config.notifications.grace_buffer_ms = 120_000;
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.field == "notifications.grace_buffer_ms"));
    }

    #[test]
    fn test_database_path_defaults_into_config_dir() {
        let mut config = Config::default();
        config.config_dir = PathBuf::from("/tmp/agenda-test");
        assert_eq!(config.database_path(), PathBuf::from("/tmp/agenda-test/events.db"));

        config.store.database_path = Some(PathBuf::from("/data/cal.db"));
        assert_eq!(config.database_path(), PathBuf::from("/data/cal.db"));
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
config_dir = "/tmp/agenda"

[store]
backend = "http"
api_url = "http://calendar.local:5000"

[notifications]
grace_buffer_ms = 1000
reschedule = "accumulate"
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Http);
        assert_eq!(config.store.api_url, "http://calendar.local:5000");
        assert_eq!(config.notifications.grace_buffer_ms, 1000);
        assert_eq!(config.notifications.reschedule, RescheduleMode::Accumulate);
        // untouched keys keep their defaults
        assert_eq!(config.notifications.follow_up_minutes, 5);
    }

    #[test]
    fn test_save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.notifications.surface = SurfaceKind::Log;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.notifications.surface, SurfaceKind::Log);
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }
}
