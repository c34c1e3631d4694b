//! # kwire-client
//!
//! Client library for kwire.
//!
//! This crate provides:
//! - Single-flight broker connections with correlation and API version
//!   negotiation
//! - Deadlines threaded from the caller down to socket I/O
//! - A per-broker pool of idle connections
//! - High-level admin operations (`DeleteTopics`, `ApiVersions`)

pub mod admin;
pub mod client;
pub mod config;
pub mod connection;
pub mod deadline;
pub mod error;
pub mod pool;

#[cfg(test)]
pub(crate) mod test_support;

pub use admin::{DeleteTopicsRequest, DeleteTopicsResponse, DEFAULT_DELETE_TOPICS_TIMEOUT};
pub use client::Client;
pub use config::ClientConfig;
pub use connection::{Connection, ConnectionState};
pub use deadline::Deadline;
pub use error::{ClientError, ConfigError};
