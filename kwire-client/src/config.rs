//! Client configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via KWIRE_CONFIG or --config)
//! 3. Environment variables

use crate::error::ConfigError;
use kwire_protocol::DEFAULT_MAX_FRAME_SIZE;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default client id sent in every request header.
pub const DEFAULT_CLIENT_ID: &str = "kwire";

/// Default read buffer size (8 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Minimum read buffer size (1 KiB).
pub const MIN_READ_BUFFER_SIZE: usize = 1024;

/// Maximum read buffer size (1 MiB).
pub const MAX_READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Client id sent in request headers. Empty means null on the wire.
    pub client_id: String,
    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Bound on one exchange when the caller passes no deadline.
    pub request_timeout_ms: u64,
    /// Round-trip time reserved for the response when deriving broker-side
    /// timeouts from a deadline.
    pub rtt_estimate_ms: u64,
    /// Largest response frame accepted, in bytes.
    pub max_response_size: usize,
    /// Idle connections kept per broker address.
    pub max_idle_per_broker: usize,
    /// Read buffer size for socket reads.
    pub read_buffer_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID.to_string(),
            connect_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            rtt_estimate_ms: 1_000,
            max_response_size: DEFAULT_MAX_FRAME_SIZE,
            max_idle_per_broker: 4,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("KWIRE_CONFIG").ok();
        Self::load_from(path.as_deref().map(Path::new))
    }

    /// Like [`ClientConfig::load`], with an explicit file taking the place of
    /// `KWIRE_CONFIG`.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: ClientConfig = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("KWIRE_CLIENT_ID") {
            self.client_id = id;
        }

        if let Ok(ms) = std::env::var("KWIRE_CONNECT_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse() {
                self.connect_timeout_ms = ms;
            }
        }

        if let Ok(ms) = std::env::var("KWIRE_REQUEST_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse() {
                self.request_timeout_ms = ms;
            }
        }

        if let Ok(ms) = std::env::var("KWIRE_RTT_ESTIMATE_MS") {
            if let Ok(ms) = ms.parse() {
                self.rtt_estimate_ms = ms;
            }
        }

        if let Ok(size) = std::env::var("KWIRE_MAX_RESPONSE_SIZE") {
            if let Ok(size) = size.parse() {
                self.max_response_size = size;
            }
        }

        if let Ok(max) = std::env::var("KWIRE_MAX_IDLE_PER_BROKER") {
            if let Ok(max) = max.parse() {
                self.max_idle_per_broker = max;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.len() > i16::MAX as usize {
            return Err(ConfigError::ValidationError(format!(
                "client_id is {} bytes, at most {} allowed",
                self.client_id.len(),
                i16::MAX
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_ms must be positive".to_string(),
            ));
        }
        if self.max_response_size == 0 {
            return Err(ConfigError::ValidationError(
                "max_response_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = id.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_rtt_estimate(mut self, rtt: Duration) -> Self {
        self.rtt_estimate_ms = rtt.as_millis() as u64;
        self
    }

    pub fn with_max_response_size(mut self, size: usize) -> Self {
        self.max_response_size = size;
        self
    }

    pub fn with_max_idle_per_broker(mut self, max: usize) -> Self {
        self.max_idle_per_broker = max;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE);
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn rtt_estimate(&self) -> Duration {
        Duration::from_millis(self.rtt_estimate_ms)
    }

    /// Client id as sent on the wire.
    pub(crate) fn wire_client_id(&self) -> Option<String> {
        if self.client_id.is_empty() {
            None
        } else {
            Some(self.client_id.clone())
        }
    }
}
