//! Configuration management for `EchoLens`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Blob store configuration
    pub storage: StorageConfig,

    /// Transcription provider configuration
    pub transcription: TranscriptionConfig,

    /// Analysis provider configuration
    pub analysis: AnalysisConfig,

    /// Analytics configuration
    #[serde(default)]
    pub analytics: TrendsConfig,

    /// Task queue configuration
    #[serde(default)]
    pub queue: QueueConfig,

    /// Worker pool configuration
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: u64,
}

/// Blob store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base URL of the object store endpoint
    pub endpoint: String,

    /// Bucket holding call recordings
    pub bucket: String,

    /// Bearer token or access key presented to the store
    #[serde(default)]
    pub access_token: String,

    /// Request timeout in seconds
    #[serde(default = "default_storage_timeout")]
    pub timeout_seconds: u64,
}

/// Transcription provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// API key for the transcription provider
    #[serde(default)]
    pub api_key: String,

    /// Preferred transcription model
    #[serde(default = "default_transcribe_model")]
    pub model: String,

    /// Fallback model used once on a format rejection
    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,

    /// Base URL of the transcription API
    #[serde(default = "default_transcribe_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_provider_timeout")]
    pub timeout_seconds: u64,
}

/// Analysis provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// API key for the language-model provider
    #[serde(default)]
    pub api_key: String,

    /// Chat completion model
    #[serde(default = "default_analysis_model")]
    pub model: String,

    /// Base URL of the chat completion API
    #[serde(default = "default_analysis_base_url")]
    pub base_url: String,

    /// Extra in-process attempts after a failed analysis call
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Request timeout in seconds
    #[serde(default = "default_provider_timeout")]
    pub timeout_seconds: u64,
}

/// Analytics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendsConfig {
    /// Weeks of history included in topic trends
    #[serde(default = "default_trend_window_weeks")]
    pub trend_window_weeks: u32,
}

impl Default for TrendsConfig {
    fn default() -> Self {
        Self {
            trend_window_weeks: default_trend_window_weeks(),
        }
    }
}

/// Task queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum number of pending tasks
    #[serde(default = "default_queue_size")]
    pub max_size: usize,

    /// Optional file for queue persistence across restarts
    #[serde(default)]
    pub persistence_file: Option<PathBuf>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_size: default_queue_size(),
            persistence_file: None,
        }
    }
}

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of concurrent workers
    ///
    /// Kept low on purpose: provider rate limits are the bottleneck, not CPU.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json or text)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

const fn default_connect_timeout() -> u64 {
    30
}

const fn default_idle_timeout() -> u64 {
    600
}

const fn default_storage_timeout() -> u64 {
    60
}

fn default_transcribe_model() -> String {
    "whisper-1".to_string()
}

fn default_fallback_model() -> String {
    "whisper-1".to_string()
}

fn default_transcribe_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_analysis_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_analysis_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

const fn default_max_retries() -> u32 {
    2
}

const fn default_provider_timeout() -> u64 {
    120
}

const fn default_trend_window_weeks() -> u32 {
    8
}

const fn default_queue_size() -> usize {
    1000
}

const fn default_workers() -> usize {
    2
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Config {
    /// Load configuration from `config.toml` and `ECHOLENS_*` environment
    /// variables (environment wins)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or parsed.
    pub fn load() -> crate::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("ECHOLENS").separator("_"))
            .build()
            .map_err(|e| crate::Error::Configuration {
                message: e.to_string(),
            })?;

        config
            .try_deserialize()
            .map_err(|e| crate::Error::Configuration {
                message: e.to_string(),
            })
    }
}

impl Default for Config {
    fn default() -> Self {
        let database_url = std::env::var("ECHOLENS_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .unwrap_or_else(|_| "postgresql://localhost/echolens".to_string());

        Self {
            database: DatabaseConfig {
                url: database_url,
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout: default_connect_timeout(),
                idle_timeout: default_idle_timeout(),
            },
            storage: StorageConfig {
                endpoint: "http://localhost:9000".to_string(),
                bucket: "echolens-call-recordings".to_string(),
                access_token: String::new(),
                timeout_seconds: default_storage_timeout(),
            },
            transcription: TranscriptionConfig {
                api_key: String::new(),
                model: default_transcribe_model(),
                fallback_model: default_fallback_model(),
                base_url: default_transcribe_base_url(),
                timeout_seconds: default_provider_timeout(),
            },
            analysis: AnalysisConfig {
                api_key: String::new(),
                model: default_analysis_model(),
                base_url: default_analysis_base_url(),
                max_retries: default_max_retries(),
                timeout_seconds: default_provider_timeout(),
            },
            analytics: TrendsConfig::default(),
            queue: QueueConfig::default(),
            worker: WorkerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
