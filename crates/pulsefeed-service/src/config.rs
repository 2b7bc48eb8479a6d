//! Collector configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, UtcOffset};

use pulsefeed_core::{DEFAULT_MAX_WORKERS, PoolConfig, WindowCalculator};
use pulsefeed_store::DataPaths;
use pulsefeed_types::{SessionId, parse_api_timestamp, parse_utc_offset};

/// Collector configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Telemetry endpoint settings.
    pub api: ApiConfig,
    /// Window and cadence settings.
    pub window: WindowConfig,
    /// Fetch pool settings.
    pub pool: PoolSettings,
    /// File locations.
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    ///
    /// This checks:
    /// - The endpoint URL is http(s) and the request timeout is non-zero
    /// - The UTC offset parses as `+HH:MM`
    /// - Window length and cycle interval are non-zero
    /// - A fixed start, if set, is `YYYY-MM-DD-HH-MM-SS`
    /// - The worker cap is at least 1
    /// - The data directory is not empty
    ///
    /// # Example
    ///
    /// ```
    /// use pulsefeed_service::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.api.validate());
        errors.extend(self.window.validate());
        errors.extend(self.pool.validate());
        errors.extend(self.storage.validate());

        // The fixed start is read in the API offset.
        if let (Some(start), Ok(offset)) = (&self.window.fixed_start, self.api.offset())
            && let Err(e) = parse_api_timestamp(start, offset)
        {
            errors.push(ValidationError {
                field: "window.fixed_start".to_string(),
                message: e.to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Window calculator for this configuration.
    pub fn window_calculator(&self) -> Result<WindowCalculator, ConfigError> {
        let length = self.window.fetch_duration();
        let calc = match self.fixed_start()? {
            Some(seed) => WindowCalculator::fixed_advance(seed, length),
            None => WindowCalculator::relative(length),
        };
        calc.map_err(|e| invalid("window", e))
    }

    /// The parsed fixed start, if configured.
    pub fn fixed_start(&self) -> Result<Option<OffsetDateTime>, ConfigError> {
        let Some(start) = &self.window.fixed_start else {
            return Ok(None);
        };
        parse_api_timestamp(start, self.api.offset()?)
            .map(Some)
            .map_err(|e| invalid("window.fixed_start", e))
    }

    /// Pool settings for this configuration.
    pub fn pool_config(&self) -> Result<PoolConfig, ConfigError> {
        Ok(PoolConfig {
            max_workers: self.pool.max_workers,
            request_timeout: self.api.request_timeout(),
            utc_offset: self.api.offset()?,
            session: self.api.session.as_deref().map(SessionId::parse),
        })
    }
}

fn invalid(field: &str, err: impl std::fmt::Display) -> ConfigError {
    ConfigError::Validation(vec![ValidationError {
        field: field.to_string(),
        message: err.to_string(),
    }])
}

/// Default endpoint URL.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:30003/get_ppg_data";

/// Telemetry endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Endpoint URL.
    pub url: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Offset request times are rendered in, e.g. `+03:00`.
    pub utc_offset: String,
    /// Session name; requests are scoped to `{session}_{address}` when set.
    pub session: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: 10,
            utc_offset: "+03:00".to_string(),
            session: None,
        }
    }
}

impl ApiConfig {
    /// Request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Parsed UTC offset.
    pub fn offset(&self) -> Result<UtcOffset, ConfigError> {
        parse_utc_offset(&self.utc_offset).map_err(|e| invalid("api.utc_offset", e))
    }

    /// Validate endpoint configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.url.is_empty() {
            errors.push(ValidationError {
                field: "api.url".to_string(),
                message: "URL cannot be empty".to_string(),
            });
        } else if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            errors.push(ValidationError {
                field: "api.url".to_string(),
                message: format!("URL must start with http:// or https://, got '{}'", self.url),
            });
        }

        if self.request_timeout_secs == 0 {
            errors.push(ValidationError {
                field: "api.request_timeout_secs".to_string(),
                message: "request timeout must be at least 1 second".to_string(),
            });
        }

        if let Err(e) = parse_utc_offset(&self.utc_offset) {
            errors.push(ValidationError {
                field: "api.utc_offset".to_string(),
                message: e.to_string(),
            });
        }

        if let Some(session) = &self.session
            && session.trim().is_empty()
        {
            errors.push(ValidationError {
                field: "api.session".to_string(),
                message: "session cannot be empty string (omit instead)".to_string(),
            });
        }

        errors
    }
}

/// Window and cadence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window length in seconds.
    pub fetch_duration_secs: u64,
    /// Sleep between cycles in seconds.
    pub interval_secs: u64,
    /// Seed for fixed-advance mode, `YYYY-MM-DD-HH-MM-SS`. Relative mode when unset.
    pub fixed_start: Option<String>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            fetch_duration_secs: 60,
            interval_secs: 5,
            fixed_start: None,
        }
    }
}

impl WindowConfig {
    /// Window length.
    pub fn fetch_duration(&self) -> Duration {
        Duration::from_secs(self.fetch_duration_secs)
    }

    /// Sleep between cycles.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Validate window configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.fetch_duration_secs == 0 {
            errors.push(ValidationError {
                field: "window.fetch_duration_secs".to_string(),
                message: "window length must be at least 1 second".to_string(),
            });
        }
        if self.interval_secs == 0 {
            errors.push(ValidationError {
                field: "window.interval_secs".to_string(),
                message: "cycle interval must be at least 1 second".to_string(),
            });
        }

        errors
    }
}

/// Fetch pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Upper bound on concurrent fetches.
    pub max_workers: usize,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

impl PoolSettings {
    /// Validate pool configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.max_workers == 0 {
            errors.push(ValidationError {
                field: "pool.max_workers".to_string(),
                message: "max_workers must be at least 1".to_string(),
            });
        }
        errors
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the registry, history, snapshot and backups.
    pub data_dir: PathBuf,
    /// Registry file, if not `<data_dir>/bracelets.json`.
    pub registry: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: pulsefeed_store::default_data_dir(),
            registry: None,
        }
    }
}

impl StorageConfig {
    /// Resolved file locations.
    pub fn paths(&self) -> DataPaths {
        let mut paths = DataPaths::in_dir(&self.data_dir);
        if let Some(registry) = &self.registry {
            paths.registry = registry.clone();
        }
        paths
    }

    /// Validate storage configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.data_dir.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.data_dir".to_string(),
                message: "data directory cannot be empty".to_string(),
            });
        }
        if let Some(registry) = &self.registry
            && registry.as_os_str().is_empty()
        {
            errors.push(ValidationError {
                field: "storage.registry".to_string(),
                message: "registry path cannot be empty (omit instead)".to_string(),
            });
        }

        errors
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `api.url` or `window.fixed_start`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pulsefeed")
        .join("pulsefeed.toml")
}
