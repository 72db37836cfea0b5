//! Configuration loading for chatsync-client.
//!
//! Configuration is loaded from a TOML file. Every section and field is
//! optional.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chatsync_core::RetryPolicy;

const MAX_FIRST_MESSAGES_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Root configuration for chatsync-client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientConfig {
    /// Paging configuration.
    #[serde(default)]
    pub pagination: PaginationConfig,
    /// Remote fetch configuration.
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Resync configuration.
    #[serde(default)]
    pub resync: ResyncConfig,
    /// New channel staging configuration.
    #[serde(default)]
    pub staging: StagingConfig,
    /// Output feed configuration.
    #[serde(default)]
    pub feed: FeedConfig,
    /// Local cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Paging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PaginationConfig {
    /// Channels per page (default: 25).
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Messages fetched per channel (default: 25).
    #[serde(default = "default_message_limit")]
    pub message_limit: usize,
}

/// Remote fetch configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Attempts per page fetch before an error is emitted (default: 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// Resync configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ResyncConfig {
    /// First-page fetches running at once (default: 4).
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
}

/// New channel staging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StagingConfig {
    /// How long a new channel waits for its first messages before it is
    /// inserted empty (default: 10).
    #[serde(default = "default_first_messages_timeout_secs")]
    pub first_messages_timeout_secs: u64,
}

/// Output feed configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Changes buffered per subscriber before it lags (default: 256).
    #[serde(default = "default_change_buffer")]
    pub change_buffer: usize,
}

/// Local cache configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
    /// Snapshot file. The cache stays in memory when unset.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

// Default value functions
fn default_page_size() -> usize {
    25
}

fn default_message_limit() -> usize {
    25
}

fn default_max_attempts() -> u32 {
    chatsync_core::DEFAULT_MAX_ATTEMPTS
}

fn default_max_concurrent_fetches() -> usize {
    4
}

fn default_first_messages_timeout_secs() -> u64 {
    10
}

fn default_change_buffer() -> usize {
    256
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            message_limit: default_message_limit(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for ResyncConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: default_max_concurrent_fetches(),
        }
    }
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            first_messages_timeout_secs: default_first_messages_timeout_secs(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            change_buffer: default_change_buffer(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Retry policy for page fetches.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.fetch.max_attempts)
    }

    /// Staging deadline for new channels, at most one day.
    pub fn first_messages_timeout(&self) -> Duration {
        Duration::from_secs(
            self.staging
                .first_messages_timeout_secs
                .min(MAX_FIRST_MESSAGES_TIMEOUT_SECS),
        )
    }

    /// Page size, never below one.
    pub fn page_size(&self) -> usize {
        self.pagination.page_size.max(1)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
