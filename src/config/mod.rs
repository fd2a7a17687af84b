use std::path::PathBuf;
use std::time::Duration;

use crate::types::event_manager::EventManager;
use crate::types::{BearerToken, MIB};

pub mod args;

pub const DEFAULT_CHUNK_SIZE: u64 = 10 * MIB;
pub const DEFAULT_BATCH_WIDTH: u16 = 3;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_MILLISECONDS: u64 = 1000;
pub const DEFAULT_POLL_INTERVAL_MILLISECONDS: u64 = 3000;
pub const DEFAULT_POLL_TIMEOUT_SECONDS: u64 = 30 * 60;
pub const DEFAULT_MAX_FILE_SIZE: u64 = 2 * 1024 * MIB;
pub const DEFAULT_ACCEPTED_MIME_PREFIX: &str = "video/";

#[derive(Debug, Clone)]
pub struct Config {
    pub source: PathBuf,
    pub destination_config: DestinationConfig,
    pub transfer_config: TransferConfig,
    pub poll_config: PollConfig,
    pub validation_config: ValidationConfig,
    pub tracing_config: Option<TracingConfig>,
    pub mime_type: Option<String>,
    pub resume_file: Option<PathBuf>,
    pub auto_complete_shell: Option<clap_complete::shells::Shell>,
    pub event_manager: EventManager,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: PathBuf::new(),
            destination_config: DestinationConfig::default(),
            transfer_config: TransferConfig::default(),
            poll_config: PollConfig::default(),
            validation_config: ValidationConfig::default(),
            tracing_config: None,
            mime_type: None,
            resume_file: None,
            auto_complete_shell: None,
            event_manager: EventManager::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DestinationConfig {
    pub endpoint_url: String,
    pub bearer_token: BearerToken,
    pub folder: Option<String>,
    pub timeout_config: TimeoutConfig,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            endpoint_url: "http://localhost:8080/api/uploads".to_string(),
            bearer_token: BearerToken { token: None },
            folder: None,
            timeout_config: TimeoutConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TimeoutConfig {
    pub operation_timeout_milliseconds: Option<u64>,
    pub connect_timeout_milliseconds: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
pub struct TransferConfig {
    pub chunk_size: u64,
    pub batch_width: u16,
    pub max_attempts: u32,
    pub backoff_milliseconds: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            batch_width: DEFAULT_BATCH_WIDTH,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_milliseconds: DEFAULT_BACKOFF_MILLISECONDS,
        }
    }
}

impl TransferConfig {
    /// Linear backoff: the wait after the n-th failed attempt is `n * base`.
    pub fn backoff_after_attempt(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_milliseconds.saturating_mul(attempt as u64))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub interval_milliseconds: u64,
    pub timeout_seconds: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_milliseconds: DEFAULT_POLL_INTERVAL_MILLISECONDS,
            timeout_seconds: DEFAULT_POLL_TIMEOUT_SECONDS,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_milliseconds)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone)]
pub struct ValidationConfig {
    pub max_file_size: u64,
    pub accepted_mime_prefix: Option<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            accepted_mime_prefix: Some(DEFAULT_ACCEPTED_MIME_PREFIX.to_string()),
        }
    }
}

impl ValidationConfig {
    pub fn is_mime_type_accepted(&self, mime_type: &str) -> bool {
        match &self.accepted_mime_prefix {
            None => true,
            Some(prefix) => mime_type
                .to_ascii_lowercase()
                .starts_with(&prefix.to_ascii_lowercase()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TracingConfig {
    pub tracing_level: log::Level,
    pub json_tracing: bool,
    pub http_client_tracing: bool,
    pub span_events_tracing: bool,
    pub disable_color_tracing: bool,
}
