//! Request and response framing.
//!
//! Every request and response travels with a 4-byte size prefix that counts
//! the bytes after it:
//!
//! ```text
//! request:  [int32 size][int16 api_key][int16 api_version][int32 correlation_id][string client_id][body]
//! response: [int32 size][int32 correlation_id][body]
//! ```

use crate::api::{ApiRequest, ApiVersion, Message};
use crate::codec::{Decode, Encode, Reader, LENGTH_PREFIX_SIZE};
use crate::error::ProtocolError;
use bytes::{BufMut, BytesMut};

/// Header in front of every request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeader {
    pub api_key: i16,
    pub api_version: ApiVersion,
    pub correlation_id: i32,
    pub client_id: Option<String>,
}

impl Encode for RequestHeader {
    fn size(&self) -> usize {
        self.api_key.size()
            + self.api_version.size()
            + self.correlation_id.size()
            + self.client_id.size()
    }

    fn encode(&self, buf: &mut BytesMut) {
        self.api_key.encode(buf);
        self.api_version.encode(buf);
        self.correlation_id.encode(buf);
        self.client_id.encode(buf);
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        self.client_id.validate()
    }
}

impl Decode for RequestHeader {
    fn decode(reader: &mut Reader) -> Result<Self, ProtocolError> {
        Ok(Self {
            api_key: reader.read_i16()?,
            api_version: reader.read_i16()?,
            correlation_id: reader.read_i32()?,
            client_id: reader.read_nullable_string()?,
        })
    }
}

/// Header in front of every response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub correlation_id: i32,
}

impl Encode for ResponseHeader {
    fn size(&self) -> usize {
        self.correlation_id.size()
    }

    fn encode(&self, buf: &mut BytesMut) {
        self.correlation_id.encode(buf);
    }
}

impl Decode for ResponseHeader {
    fn decode(reader: &mut Reader) -> Result<Self, ProtocolError> {
        Ok(Self {
            correlation_id: reader.read_i32()?,
        })
    }
}

fn frame_size(size: usize) -> Result<i32, ProtocolError> {
    i32::try_from(size).map_err(|_| ProtocolError::FrameTooLarge {
        size,
        max: i32::MAX as usize,
    })
}

/// Encodes a complete request frame, size prefix included.
///
/// The buffer is sized from `header.size() + request.size()` before anything
/// is written. Fails without writing if a length would not fit its prefix.
pub fn encode_request<R: ApiRequest>(
    header: &RequestHeader,
    request: &R,
) -> Result<BytesMut, ProtocolError> {
    header.validate()?;
    request.validate()?;

    let size = header.size() + request.size();
    let prefix = frame_size(size)?;

    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + size);
    buf.put_i32(prefix);
    header.encode(&mut buf);
    request.write_to(&mut buf);
    debug_assert_eq!(buf.len(), LENGTH_PREFIX_SIZE + size);

    Ok(buf)
}

/// Encodes a complete response frame, size prefix included.
pub fn encode_response<M: Message>(
    correlation_id: i32,
    response: &M,
) -> Result<BytesMut, ProtocolError> {
    response.validate()?;

    let header = ResponseHeader { correlation_id };
    let size = header.size() + response.size();
    let prefix = frame_size(size)?;

    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + size);
    buf.put_i32(prefix);
    header.encode(&mut buf);
    response.write_to(&mut buf);
    debug_assert_eq!(buf.len(), LENGTH_PREFIX_SIZE + size);

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FrameDecoder;
    use crate::messages::delete_topics::DeleteTopicsRequest;

    #[test]
    fn test_request_frame_layout() {
        let header = RequestHeader {
            api_key: 20,
            api_version: 1,
            correlation_id: 7,
            client_id: Some("kw".to_string()),
        };
        let request = DeleteTopicsRequest::new(vec!["t1".to_string()], Some(500));
        let frame = encode_request(&header, &request).unwrap();

        #[rustfmt::skip]
        let expected: &[u8] = &[
            0, 0, 0, 24,          // size
            0, 20,                // api_key
            0, 1,                 // api_version
            0, 0, 0, 7,           // correlation_id
            0, 2, b'k', b'w',     // client_id
            0, 0, 0, 1,           // topic count
            0, 2, b't', b'1',     // topic
            0, 0, 0x01, 0xF4,     // timeout_ms = 500
        ];
        assert_eq!(&frame[..], expected);
    }

    #[test]
    fn test_request_header_roundtrip_through_frame_decoder() {
        let header = RequestHeader {
            api_key: 18,
            api_version: 0,
            correlation_id: 42,
            client_id: None,
        };
        let request = DeleteTopicsRequest::new(vec![], Some(0));
        let frame = encode_request(&header, &request).unwrap();

        let mut decoder = FrameDecoder::new(1024);
        decoder.extend(&frame);
        let body = decoder.decode_frame().unwrap().unwrap();

        let mut reader = Reader::new(body);
        let decoded = RequestHeader::decode(&mut reader).unwrap();
        assert_eq!(decoded, header);
        let request = DeleteTopicsRequest::read_from(&mut reader, 0).unwrap();
        reader.finish().unwrap();
        assert_eq!(request.timeout_ms, Some(0));
    }

    #[test]
    fn test_oversized_fields_are_rejected_before_encoding() {
        let header = RequestHeader {
            api_key: 20,
            api_version: 1,
            correlation_id: 1,
            client_id: None,
        };
        let request = DeleteTopicsRequest::new(vec!["a".repeat(40_000)], Some(0));
        assert!(matches!(
            encode_request(&header, &request),
            Err(ProtocolError::Malformed(_))
        ));

        let header = RequestHeader {
            client_id: Some("c".repeat(70_000)),
            ..header
        };
        let request = DeleteTopicsRequest::new(vec!["t1".to_string()], Some(0));
        assert!(matches!(
            encode_request(&header, &request),
            Err(ProtocolError::Malformed(_))
        ));
    }
}
