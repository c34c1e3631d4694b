//! Client error types.

use kwire_protocol::{ApiKey, ErrorCode, VersionRange};
use std::path::PathBuf;
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] kwire_protocol::ProtocolError),

    #[error("connection closed")]
    ConnectionClosed,

    /// The connection failed earlier and can no longer be used.
    #[error("connection failed")]
    ConnectionFailed,

    #[error("request timed out")]
    Timeout,

    #[error("correlation id mismatch: expected {expected}, got {actual}")]
    CorrelationMismatch { expected: i32, actual: i32 },

    /// No version is supported by both sides. `broker` is `None` when the
    /// broker does not advertise the API at all.
    #[error("unsupported version for {api}: client supports {client}, broker supports {}", display_range(.broker))]
    UnsupportedVersion {
        api: ApiKey,
        client: VersionRange,
        broker: Option<VersionRange>,
    },

    #[error("broker error: {0}")]
    Broker(ErrorCode),

    /// An error raised inside a named client operation.
    #[error("{op}: {source}")]
    Operation {
        op: &'static str,
        source: Box<ClientError>,
    },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// Returns whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Io(_) => true,
            ClientError::Timeout => true,
            ClientError::ConnectionClosed => true,
            ClientError::Broker(code) => code.is_retriable(),
            ClientError::Operation { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Returns whether a connection that produced this error must be
    /// discarded.
    pub fn is_fatal_to_connection(&self) -> bool {
        match self {
            ClientError::Io(_)
            | ClientError::Protocol(_)
            | ClientError::ConnectionClosed
            | ClientError::ConnectionFailed
            | ClientError::Timeout
            | ClientError::CorrelationMismatch { .. } => true,
            ClientError::Operation { source, .. } => source.is_fatal_to_connection(),
            _ => false,
        }
    }

    /// Returns the underlying error, looking through operation context.
    pub fn root(&self) -> &ClientError {
        match self {
            ClientError::Operation { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns the broker status code, if this is a broker error.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self.root() {
            ClientError::Broker(code) => Some(*code),
            _ => None,
        }
    }

    pub(crate) fn context(self, op: &'static str) -> ClientError {
        ClientError::Operation {
            op,
            source: Box::new(self),
        }
    }
}

fn display_range(range: &Option<VersionRange>) -> String {
    match range {
        Some(range) => range.to_string(),
        None => "none".to_string(),
    }
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {}", .0.display(), .1)]
    IoError(PathBuf, std::io::Error),

    #[error("failed to parse config file '{}': {}", .0.display(), .1)]
    ParseError(PathBuf, String),

    #[error("invalid configuration: {0}")]
    ValidationError(String),
}
