//! DeleteTopics (API key 20).
//!
//! ```text
//! request  v0-v1: [array<string> topic_names][int32 timeout_ms]
//! response v0:    [array<{string name; int16 error_code}> responses]
//! response v1:    [int32 throttle_time_ms][array<{string name; int16 error_code}> responses]
//! ```

use crate::api::{ApiKey, ApiRequest, ApiResponse, ApiVersion, Message, VersionRange};
use crate::codec::{Decode, Encode, Reader};
use crate::error::{ErrorCode, ProtocolError};
use bytes::BytesMut;
use std::time::Duration;

/// Request to delete a set of topics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteTopicsRequest {
    pub version: ApiVersion,

    /// Topics to delete.
    pub topic_names: Vec<String>,

    /// Time in ms the controller waits for the deletion to complete.
    ///
    /// Values `<= 0` start the deletion and return immediately. `None` leaves
    /// the choice to the connection, which derives a value from the request
    /// deadline before sending; an unset timeout that reaches the wire is
    /// written as `0`.
    pub timeout_ms: Option<i32>,
}

impl DeleteTopicsRequest {
    pub fn new(topic_names: Vec<String>, timeout_ms: Option<i32>) -> Self {
        Self {
            version: 0,
            topic_names,
            timeout_ms,
        }
    }
}

impl Message for DeleteTopicsRequest {
    fn version(&self) -> ApiVersion {
        self.version
    }

    fn size(&self) -> usize {
        self.topic_names.size() + 0i32.size()
    }

    fn write_to(&self, buf: &mut BytesMut) {
        self.topic_names.encode(buf);
        self.timeout_ms.unwrap_or(0).encode(buf);
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        self.topic_names.validate()
    }

    fn read_from(reader: &mut Reader, version: ApiVersion) -> Result<Self, ProtocolError> {
        Ok(Self {
            version,
            topic_names: reader.read()?,
            timeout_ms: Some(reader.read_i32()?),
        })
    }
}

impl ApiRequest for DeleteTopicsRequest {
    const API_KEY: ApiKey = ApiKey::DeleteTopics;
    const VERSIONS: VersionRange = VersionRange::new(0, 1);

    type Response = DeleteTopicsResponse;

    fn set_version(&mut self, version: ApiVersion) {
        self.version = version;
    }

    fn derive_timeout(&mut self, timeout: Duration) {
        if self.timeout_ms.is_none() {
            self.timeout_ms = Some(timeout.as_millis().min(i32::MAX as u128) as i32);
        }
    }
}

/// Outcome for one topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletableTopicResult {
    pub name: String,
    pub error_code: i16,
}

impl Encode for DeletableTopicResult {
    fn size(&self) -> usize {
        self.name.size() + self.error_code.size()
    }

    fn encode(&self, buf: &mut BytesMut) {
        self.name.encode(buf);
        self.error_code.encode(buf);
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        self.name.validate()
    }
}

impl Decode for DeletableTopicResult {
    fn decode(reader: &mut Reader) -> Result<Self, ProtocolError> {
        Ok(Self {
            name: reader.read_string()?,
            error_code: reader.read_i16()?,
        })
    }
}

/// Response to [`DeleteTopicsRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteTopicsResponse {
    pub version: ApiVersion,

    /// Present from v1; zero below.
    pub throttle_time_ms: i32,

    /// One entry per topic, in broker order.
    pub responses: Vec<DeletableTopicResult>,
}

impl Message for DeleteTopicsResponse {
    fn version(&self) -> ApiVersion {
        self.version
    }

    fn size(&self) -> usize {
        let mut size = self.responses.size();
        if self.version >= 1 {
            size += self.throttle_time_ms.size();
        }
        size
    }

    fn write_to(&self, buf: &mut BytesMut) {
        if self.version >= 1 {
            self.throttle_time_ms.encode(buf);
        }
        self.responses.encode(buf);
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        self.responses.validate()
    }

    fn read_from(reader: &mut Reader, version: ApiVersion) -> Result<Self, ProtocolError> {
        let throttle_time_ms = if version >= 1 { reader.read_i32()? } else { 0 };
        Ok(Self {
            version,
            throttle_time_ms,
            responses: reader.read()?,
        })
    }
}

impl ApiResponse for DeleteTopicsResponse {
    fn item_errors(&self) -> Vec<(&str, Option<ErrorCode>)> {
        self.responses
            .iter()
            .map(|r| (r.name.as_str(), ErrorCode::from_code(r.error_code)))
            .collect()
    }

    fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_time_ms.max(0) as u64)
    }
}
