use crate::core::errors::ConfigError;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub log_level: Level,
    pub debug: bool,
}

/// fal.ai adapter configuration
#[derive(Clone)]
pub struct FalConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    /// Ceiling for a single outbound generation/face-swap call
    pub timeout: Duration,
}

/// Upload limits
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Per-file byte ceiling (MAX_FILE_SIZE)
    pub max_file_size: u64,
}

/// On-disk layout roots
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub static_dir: PathBuf,
    pub logs_dir: PathBuf,
}

/// Main application configuration
#[derive(Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub fal: FalConfig,
    pub upload: UploadConfig,
    pub storage: StorageConfig,
    pub app_secret_key: String,
}

pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_FAL_BASE_URL: &str = "https://fal.run/fal-ai";

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Self::load_from_env()?;
        config.validate()?;
        Ok(config)
    }

    fn load_from_env() -> Result<Self, ConfigError> {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// Missing or unparsable values fall back to their defaults. Validation is
    /// left to the caller so tests can inspect rejected configurations.
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parsed = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());

        let debug = lookup("DEBUG")
            .map(|s| s.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let log_level = lookup("LOG_LEVEL")
            .and_then(|s| match s.to_lowercase().as_str() {
                "trace" => Some(Level::TRACE),
                "debug" => Some(Level::DEBUG),
                "info" => Some(Level::INFO),
                "warn" | "warning" => Some(Level::WARN),
                "error" => Some(Level::ERROR),
                _ => None,
            })
            .unwrap_or(if debug { Level::DEBUG } else { Level::INFO });

        let port = match lookup("SERVER_PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                ConfigError::InvalidServerConfig(format!("SERVER_PORT is not a port: {}", raw))
            })?,
            None => 7860,
        };

        Ok(Self {
            server: ServerConfig {
                port,
                host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                log_level,
                debug,
            },
            fal: FalConfig {
                api_key: lookup("FAL_API_KEY")
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty()),
                base_url: lookup("FAL_BASE_URL")
                    .map(|s| s.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| DEFAULT_FAL_BASE_URL.to_string()),
                timeout: Duration::from_secs(
                    parsed("GENERATION_TIMEOUT").unwrap_or(DEFAULT_GENERATION_TIMEOUT_SECS),
                ),
            },
            upload: UploadConfig {
                max_file_size: parsed("MAX_FILE_SIZE").unwrap_or(DEFAULT_MAX_FILE_SIZE),
            },
            storage: StorageConfig {
                static_dir: lookup("STATIC_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("static")),
                logs_dir: lookup("LOGS_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("logs")),
            },
            app_secret_key: lookup("APP_SECRET_KEY")
                .unwrap_or_else(|| "your-secret-key-here".to_string()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // FAL_API_KEY is checked when the adapter is built, not here: /health
        // reports an unconfigured key instead of refusing to load.
        if self.upload.max_file_size == 0 {
            return Err(ConfigError::InvalidMaxFileSize(self.upload.max_file_size));
        }

        if self.fal.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(self.fal.timeout.as_secs()));
        }

        if self.server.port == 0 {
            return Err(ConfigError::InvalidServerConfig(
                "SERVER_PORT must be non-zero".to_string(),
            ));
        }

        Ok(())
    }

    pub fn server_port(&self) -> u16 {
        self.server.port
    }

    pub fn server_host(&self) -> &str {
        &self.server.host
    }

    pub fn log_level(&self) -> Level {
        self.server.log_level
    }

    pub fn debug_mode(&self) -> bool {
        self.server.debug
    }

    pub fn fal_api_configured(&self) -> bool {
        self.fal.api_key.is_some()
    }

    pub fn max_file_size(&self) -> u64 {
        self.upload.max_file_size
    }

    pub fn generation_timeout(&self) -> Duration {
        self.fal.timeout
    }
}

impl fmt::Debug for FalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FalConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("server", &self.server)
            .field("fal", &self.fal)
            .field("upload", &self.upload)
            .field("storage", &self.storage)
            .field("app_secret_key", &"<redacted>")
            .finish()
    }
}

// Note: No Default implementation because Config::new() can fail
