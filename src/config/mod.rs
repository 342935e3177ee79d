//! Configuration management for the vocabulary scanner
//!
//! This module handles loading and validating configuration from environment
//! variables, TOML files, and command-line arguments.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default vocabulary page URL prefix; the probed URL is `{base_url}{id}`
pub const DEFAULT_BASE_URL: &str = "https://klavogonki.ru/vocs/";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Scanner configuration
    pub scanner: ScannerConfig,

    /// HTTP client configuration
    pub http: HttpConfig,

    /// Registry persistence configuration
    pub registry: RegistryConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Scanner-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Number of concurrent prober workers
    pub workers: usize,

    /// First vocabulary ID to probe. When absent, scanning resumes one past
    /// the maximum ID already present in the registry file.
    pub start_id: Option<u64>,

    /// URL prefix; probed URLs are `{base_url}{id}`
    pub base_url: String,
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-probe request timeout in seconds
    pub probe_timeout_secs: u64,

    /// Timeout for full page fetches during moderation, in seconds
    pub page_timeout_secs: u64,

    /// Rate limit (requests per second) across all workers
    pub rate_limit: u32,

    /// Maximum retries for moderation-stage page fetches
    pub max_retries: u32,
}

/// Registry persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Path of the approved-vocabularies JSON file
    pub path: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let workers = std::env::var("VOCSCAN_WORKERS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(10);

        let start_id = std::env::var("VOCSCAN_START_ID")
            .ok()
            .and_then(|v| v.parse::<u64>().ok());

        let base_url =
            std::env::var("VOCSCAN_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let probe_timeout_secs = std::env::var("VOCSCAN_PROBE_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(2);

        let page_timeout_secs = std::env::var("VOCSCAN_PAGE_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(15);

        let rate_limit = std::env::var("VOCSCAN_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(20);

        let max_retries = std::env::var("VOCSCAN_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(3);

        let registry_path = std::env::var("VOCSCAN_REGISTRY_PATH")
            .unwrap_or_else(|_| String::from("valid_vocabularies.json"))
            .into();

        let log_level = std::env::var("VOCSCAN_LOG_LEVEL").unwrap_or_else(|_| String::from("info"));
        let log_format =
            std::env::var("VOCSCAN_LOG_FORMAT").unwrap_or_else(|_| String::from("text"));

        Ok(Self {
            scanner: ScannerConfig {
                workers,
                start_id,
                base_url,
            },
            http: HttpConfig {
                probe_timeout_secs,
                page_timeout_secs,
                rate_limit,
                max_retries,
            },
            registry: RegistryConfig {
                path: registry_path,
            },
            logging: LoggingConfig {
                level: log_level,
                format: log_format,
            },
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.scanner.workers == 0 {
            anyhow::bail!("workers must be greater than 0");
        }

        if self.scanner.base_url.is_empty() {
            anyhow::bail!("base_url must not be empty");
        }

        if let Some(0) = self.scanner.start_id {
            anyhow::bail!("start_id must be a positive ID");
        }

        if self.http.probe_timeout_secs == 0 {
            anyhow::bail!("probe_timeout_secs must be greater than 0");
        }

        if self.http.rate_limit == 0 {
            anyhow::bail!("rate_limit must be greater than 0");
        }

        if self.http.max_retries > 10 {
            anyhow::bail!("max_retries must be 10 or fewer");
        }

        Ok(())
    }

    /// Get probe timeout as Duration
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.http.probe_timeout_secs)
    }

    /// Get moderation page-fetch timeout as Duration
    #[must_use]
    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.http.page_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scanner: ScannerConfig {
                workers: 10,
                start_id: None,
                base_url: DEFAULT_BASE_URL.to_string(),
            },
            http: HttpConfig {
                probe_timeout_secs: 2,
                page_timeout_secs: 15,
                rate_limit: 20,
                max_retries: 3,
            },
            registry: RegistryConfig {
                path: PathBuf::from("valid_vocabularies.json"),
            },
            logging: LoggingConfig {
                level: String::from("info"),
                format: String::from("text"),
            },
        }
    }
}
