//! In-process mock broker for tests.

use bytes::{Bytes, BytesMut};
use kwire_protocol::messages::{
    ApiVersionRange, ApiVersionsResponse, DeletableTopicResult, DeleteTopicsResponse,
};
use kwire_protocol::{encode_response, Decode, FrameDecoder, Reader, RequestHeader};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;

/// A request as seen by the mock broker.
#[derive(Debug, Clone)]
pub(crate) struct Received {
    pub header: RequestHeader,
    pub body: Bytes,
}

/// What the mock broker does with one request.
pub(crate) enum Reply {
    Frame(BytesMut),
    /// Write the frame, then hang up.
    FrameThenClose(BytesMut),
    /// Never answer.
    Silent,
    Close,
}

/// Serves one stream until the peer hangs up or the handler says to close.
pub(crate) async fn serve<S, F>(mut stream: S, mut handler: F)
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: FnMut(&RequestHeader, &Bytes) -> Reply,
{
    let mut decoder = FrameDecoder::new(1024 * 1024);
    let mut buf = vec![0u8; 4096];

    loop {
        let frame = loop {
            if let Some(frame) = decoder.decode_frame().expect("valid request frame") {
                break frame;
            }
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => decoder.extend(&buf[..n]),
            }
        };

        let mut reader = Reader::new(frame);
        let header = RequestHeader::decode(&mut reader).expect("valid request header");
        let body = reader.read_remaining();

        match handler(&header, &body) {
            Reply::Frame(frame) => {
                if stream.write_all(&frame).await.is_err() {
                    return;
                }
            }
            Reply::FrameThenClose(frame) => {
                let _ = stream.write_all(&frame).await;
                let _ = stream.shutdown().await;
                return;
            }
            Reply::Silent => {}
            Reply::Close => return,
        }
    }
}

/// Binds a loopback broker that serves every accepted connection with a
/// fresh clone of `handler`. Returns the address to dial.
pub(crate) async fn spawn_broker<F>(handler: F) -> String
where
    F: FnMut(&RequestHeader, &Bytes) -> Reply + Clone + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve(stream, handler.clone()));
        }
    });

    addr
}

pub(crate) fn api_versions_frame(
    correlation_id: i32,
    error_code: i16,
    keys: &[(i16, i16, i16)],
) -> BytesMut {
    let response = ApiVersionsResponse {
        version: 0,
        error_code,
        api_keys: keys
            .iter()
            .map(|&(api_key, min_version, max_version)| ApiVersionRange {
                api_key,
                min_version,
                max_version,
            })
            .collect(),
    };
    encode_response(correlation_id, &response).unwrap()
}

pub(crate) fn delete_topics_frame(
    correlation_id: i32,
    version: i16,
    throttle_time_ms: i32,
    results: &[(&str, i16)],
) -> BytesMut {
    let response = DeleteTopicsResponse {
        version,
        throttle_time_ms,
        responses: results
            .iter()
            .map(|&(name, error_code)| DeletableTopicResult {
                name: name.to_string(),
                error_code,
            })
            .collect(),
    };
    encode_response(correlation_id, &response).unwrap()
}
