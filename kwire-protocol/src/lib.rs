//! # kwire-protocol
//!
//! Wire protocol implementation for kwire (the Kafka binary protocol).
//!
//! This crate provides:
//! - A codec for protocol primitives with exact size computation
//! - Request/response framing with length prefix and correlation header
//! - Versioned operation descriptors (`DeleteTopics`, `ApiVersions`)
//! - The broker error code table

pub mod api;
pub mod codec;
pub mod error;
pub mod frame;
pub mod messages;

pub use api::{ApiKey, ApiRequest, ApiResponse, ApiVersion, Message, VersionRange};
pub use codec::{Decode, Encode, FrameDecoder, Reader, LENGTH_PREFIX_SIZE};
pub use error::{ErrorCode, ProtocolError, ERROR_CODES};
pub use frame::{encode_request, encode_response, RequestHeader, ResponseHeader};

/// Default broker port.
pub const DEFAULT_PORT: u16 = 9092;

/// Default maximum response frame size (100 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 100 * 1024 * 1024;
