//! ApiVersions (API key 18), the capability exchange every connection opens
//! with.
//!
//! Only v0 is spoken: it is understood by every broker, so it can run before
//! anything is known about the peer.
//!
//! ```text
//! request  v0: (empty)
//! response v0: [int16 error_code][array<{int16 api_key; int16 min_version; int16 max_version}> api_keys]
//! ```

use crate::api::{ApiKey, ApiRequest, ApiResponse, ApiVersion, Message, VersionRange};
use crate::codec::{Decode, Encode, Reader};
use crate::error::{ErrorCode, ProtocolError};
use bytes::BytesMut;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiVersionsRequest {
    pub version: ApiVersion,
}

impl Message for ApiVersionsRequest {
    fn version(&self) -> ApiVersion {
        self.version
    }

    fn size(&self) -> usize {
        0
    }

    fn write_to(&self, _buf: &mut BytesMut) {}

    fn read_from(_reader: &mut Reader, version: ApiVersion) -> Result<Self, ProtocolError> {
        Ok(Self { version })
    }
}

impl ApiRequest for ApiVersionsRequest {
    const API_KEY: ApiKey = ApiKey::ApiVersions;
    const VERSIONS: VersionRange = VersionRange::new(0, 0);

    type Response = ApiVersionsResponse;

    fn set_version(&mut self, version: ApiVersion) {
        self.version = version;
    }
}

/// Version range the broker supports for one API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiVersionRange {
    pub api_key: i16,
    pub min_version: i16,
    pub max_version: i16,
}

impl ApiVersionRange {
    pub fn range(&self) -> VersionRange {
        VersionRange::new(self.min_version, self.max_version)
    }
}

impl Encode for ApiVersionRange {
    fn size(&self) -> usize {
        6
    }

    fn encode(&self, buf: &mut BytesMut) {
        self.api_key.encode(buf);
        self.min_version.encode(buf);
        self.max_version.encode(buf);
    }
}

impl Decode for ApiVersionRange {
    fn decode(reader: &mut Reader) -> Result<Self, ProtocolError> {
        Ok(Self {
            api_key: reader.read_i16()?,
            min_version: reader.read_i16()?,
            max_version: reader.read_i16()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiVersionsResponse {
    pub version: ApiVersion,
    pub error_code: i16,
    pub api_keys: Vec<ApiVersionRange>,
}

impl ApiVersionsResponse {
    /// Returns the broker's range for `key`, if it advertises one.
    pub fn find(&self, key: i16) -> Option<VersionRange> {
        self.api_keys
            .iter()
            .find(|k| k.api_key == key)
            .map(ApiVersionRange::range)
    }
}

impl Message for ApiVersionsResponse {
    fn version(&self) -> ApiVersion {
        self.version
    }

    fn size(&self) -> usize {
        self.error_code.size() + self.api_keys.size()
    }

    fn write_to(&self, buf: &mut BytesMut) {
        self.error_code.encode(buf);
        self.api_keys.encode(buf);
    }

    fn read_from(reader: &mut Reader, version: ApiVersion) -> Result<Self, ProtocolError> {
        Ok(Self {
            version,
            error_code: reader.read_i16()?,
            api_keys: reader.read()?,
        })
    }
}

impl ApiResponse for ApiVersionsResponse {
    fn error_code(&self) -> Option<ErrorCode> {
        ErrorCode::from_code(self.error_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_response_decode() {
        #[rustfmt::skip]
        let raw: &[u8] = &[
            0, 0,               // error_code
            0, 0, 0, 2,         // count
            0, 18, 0, 0, 0, 3,  // ApiVersions v0..=v3
            0, 20, 0, 0, 0, 6,  // DeleteTopics v0..=v6
        ];
        let mut reader = Reader::new(Bytes::from_static(raw));
        let response = ApiVersionsResponse::read_from(&mut reader, 0).unwrap();
        reader.finish().unwrap();

        assert_eq!(response.error_code(), None);
        assert_eq!(response.find(20), Some(VersionRange::new(0, 6)));
        assert_eq!(response.find(3), None);

        let mut buf = BytesMut::new();
        response.write_to(&mut buf);
        assert_eq!(&buf[..], raw);
        assert_eq!(response.size(), raw.len());
    }

    #[test]
    fn test_root_error_code() {
        let response = ApiVersionsResponse {
            version: 0,
            error_code: 35,
            api_keys: vec![],
        };
        assert_eq!(response.error_code(), Some(ErrorCode::UnsupportedVersion));
        assert!(response.item_errors().is_empty());
    }
}
