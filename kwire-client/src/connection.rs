//! Connection management.
//!
//! A [`Connection`] carries one request at a time. Every exchange method
//! takes `&mut self`, so a connection checked out of the pool is exclusively
//! owned by the round trip holding it and correlation reduces to a single
//! in-flight id.

use crate::config::ClientConfig;
use crate::deadline::{adjust_for_rtt, deadline_to_timeout, Deadline};
use crate::error::ClientError;
use bytes::Bytes;
use kwire_protocol::messages::ApiVersionsRequest;
use kwire_protocol::{
    encode_request, ApiKey, ApiRequest, ApiResponse, ApiVersion, Decode, FrameDecoder, Message,
    Reader, RequestHeader, ResponseHeader, VersionRange,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;

/// Where a connection is in its request/response cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    VersionNegotiated,
    RequestSent,
    ResponseReceived,
    /// Terminal. Set by any transport, codec, correlation or timeout error.
    Failed,
}

/// A connection to one broker.
#[derive(Debug)]
pub struct Connection<S = TcpStream> {
    stream: S,
    addr: String,
    config: Arc<ClientConfig>,
    client_id: Option<String>,
    decoder: FrameDecoder,
    read_buf: Vec<u8>,
    state: ConnectionState,
    next_correlation_id: i32,
    in_flight: Option<i32>,
    /// Broker version ranges keyed by API key, fetched on first use.
    api_versions: Option<HashMap<i16, VersionRange>>,
}

impl Connection<TcpStream> {
    /// Dials `addr`, bounded by the earlier of the connect timeout and
    /// `deadline`.
    pub async fn connect(
        addr: &str,
        config: Arc<ClientConfig>,
        deadline: Deadline,
    ) -> Result<Self, ClientError> {
        tracing::debug!("Connecting to {}...", addr);

        let bound = deadline.or_within(Instant::now(), config.connect_timeout());
        let stream = tokio::time::timeout_at(bound, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                tracing::debug!("Connection to {} timed out", addr);
                ClientError::Timeout
            })?
            .map_err(|e| {
                tracing::debug!("Connection to {} failed: {}", addr, e);
                ClientError::Io(e)
            })?;

        stream.set_nodelay(true).ok();
        tracing::debug!("TCP connected to {}", addr);

        Ok(Self::new(stream, addr, config))
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an established stream.
    pub fn new(stream: S, addr: impl Into<String>, config: Arc<ClientConfig>) -> Self {
        Self {
            stream,
            addr: addr.into(),
            client_id: config.wire_client_id(),
            decoder: FrameDecoder::new(config.max_response_size),
            read_buf: vec![0u8; config.read_buffer_size],
            config,
            state: ConnectionState::Idle,
            next_correlation_id: 0,
            in_flight: None,
            api_versions: None,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns whether the connection can carry another request.
    pub fn is_reusable(&self) -> bool {
        self.state != ConnectionState::Failed
    }

    /// Returns the broker's advertised version ranges, running the
    /// ApiVersions v0 exchange the first time.
    ///
    /// A root-level error from the broker fails the call but leaves the
    /// connection usable; nothing is cached in that case.
    pub async fn api_versions(
        &mut self,
        deadline: Deadline,
    ) -> Result<&HashMap<i16, VersionRange>, ClientError> {
        self.ensure_usable()?;

        if self.api_versions.is_none() {
            let response = self.exchange(&ApiVersionsRequest::default(), deadline).await?;
            if let Some(code) = response.error_code() {
                tracing::debug!("ApiVersions on {} failed: {}", self.addr, code);
                return Err(ClientError::Broker(code));
            }

            let ranges: HashMap<i16, VersionRange> = response
                .api_keys
                .iter()
                .map(|k| (k.api_key, k.range()))
                .collect();
            tracing::debug!("Broker {} advertises {} APIs", self.addr, ranges.len());
            self.api_versions = Some(ranges);
        }

        self.api_versions.as_ref().ok_or(ClientError::ConnectionFailed)
    }

    /// Picks the highest version both sides support for `api`.
    pub async fn negotiate_version(
        &mut self,
        api: ApiKey,
        supported: VersionRange,
        deadline: Deadline,
    ) -> Result<ApiVersion, ClientError> {
        let broker = self.api_versions(deadline).await?.get(&api.key()).copied();

        match broker.and_then(|b| supported.intersect(&b)) {
            Some(range) => {
                self.state = ConnectionState::VersionNegotiated;
                tracing::debug!("Negotiated {} v{} with {}", api, range.max, self.addr);
                Ok(range.max)
            }
            None => Err(ClientError::UnsupportedVersion {
                api,
                client: supported,
                broker,
            }),
        }
    }

    /// Sends `request` at the negotiated version and returns the decoded
    /// response.
    ///
    /// A root-level status code in the response is returned as
    /// [`ClientError::Broker`]; per-item codes are left in the response.
    pub async fn round_trip<R: ApiRequest>(
        &mut self,
        mut request: R,
        deadline: Deadline,
    ) -> Result<R::Response, ClientError> {
        self.ensure_usable()?;

        let version = self
            .negotiate_version(R::API_KEY, R::VERSIONS, deadline)
            .await?;
        request.set_version(version);

        let now = Instant::now();
        let broker_deadline = adjust_for_rtt(deadline, now, self.config.rtt_estimate());
        request.derive_timeout(deadline_to_timeout(broker_deadline, now));

        let response = self.exchange(&request, deadline).await?;
        if let Some(code) = response.error_code() {
            return Err(ClientError::Broker(code));
        }

        Ok(response)
    }

    /// Like [`Connection::round_trip`], but the first non-zero per-item code
    /// is surfaced as the call's error.
    pub async fn round_trip_checked<R: ApiRequest>(
        &mut self,
        request: R,
        deadline: Deadline,
    ) -> Result<R::Response, ClientError> {
        let response = self.round_trip(request, deadline).await?;

        let failed = response
            .item_errors()
            .into_iter()
            .find_map(|(_, code)| code);
        if let Some(code) = failed {
            return Err(ClientError::Broker(code));
        }

        Ok(response)
    }

    /// Closes the connection.
    pub async fn close(mut self) {
        tracing::debug!("Closing connection to {}", self.addr);
        let _ = self.stream.shutdown().await;
    }

    fn ensure_usable(&self) -> Result<(), ClientError> {
        if self.state == ConnectionState::Failed {
            return Err(ClientError::ConnectionFailed);
        }
        Ok(())
    }

    /// One write/read cycle. Errors that leave the stream in an unknown state
    /// fail the connection. A request that cannot be encoded fails the call
    /// before anything is written.
    async fn exchange<R: ApiRequest>(
        &mut self,
        request: &R,
        deadline: Deadline,
    ) -> Result<R::Response, ClientError> {
        let io_deadline = deadline
            .instant()
            .unwrap_or_else(|| Instant::now() + self.config.request_timeout());

        let correlation_id = self.next_correlation_id;
        let header = RequestHeader {
            api_key: R::API_KEY.key(),
            api_version: request.version(),
            correlation_id,
            client_id: self.client_id.clone(),
        };
        let frame = encode_request(&header, request).map_err(|e| {
            self.state = ConnectionState::Idle;
            ClientError::Protocol(e)
        })?;
        self.next_correlation_id = self.next_correlation_id.wrapping_add(1);

        tracing::debug!(
            "Sending {} v{} id={} to {} ({} bytes)",
            R::API_KEY,
            request.version(),
            correlation_id,
            self.addr,
            frame.len()
        );

        let result = match self.write_operation(correlation_id, &frame, io_deadline).await {
            Ok(()) => self.read_operation::<R>(request.version(), io_deadline).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(response) => {
                self.state = ConnectionState::Idle;
                let throttle = response.throttle();
                if throttle > Duration::ZERO {
                    tracing::debug!("{} throttled by {} for {:?}", R::API_KEY, self.addr, throttle);
                }
                Ok(response)
            }
            Err(e) if e.is_fatal_to_connection() => {
                tracing::debug!("Connection to {} failed: {}", self.addr, e);
                self.state = ConnectionState::Failed;
                self.in_flight = None;
                Err(e)
            }
            Err(e) => {
                self.state = ConnectionState::Idle;
                Err(e)
            }
        }
    }

    async fn write_operation(
        &mut self,
        correlation_id: i32,
        frame: &[u8],
        io_deadline: Instant,
    ) -> Result<(), ClientError> {
        self.in_flight = Some(correlation_id);
        let stream = &mut self.stream;
        tokio::time::timeout_at(io_deadline, async {
            stream.write_all(frame).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| ClientError::Timeout)??;

        self.state = ConnectionState::RequestSent;
        Ok(())
    }

    async fn read_operation<R: ApiRequest>(
        &mut self,
        version: ApiVersion,
        io_deadline: Instant,
    ) -> Result<R::Response, ClientError> {
        let frame = tokio::time::timeout_at(io_deadline, self.read_frame())
            .await
            .map_err(|_| ClientError::Timeout)??;

        let mut reader = Reader::new(frame);
        let header = ResponseHeader::decode(&mut reader)?;
        let expected = self.in_flight.take().ok_or(ClientError::ConnectionFailed)?;
        if header.correlation_id != expected {
            return Err(ClientError::CorrelationMismatch {
                expected,
                actual: header.correlation_id,
            });
        }

        let response = R::Response::read_from(&mut reader, version)?;
        reader.finish()?;

        self.state = ConnectionState::ResponseReceived;
        tracing::debug!("Received {} response id={} from {}", R::API_KEY, expected, self.addr);
        Ok(response)
    }

    /// Reads until one whole frame is buffered.
    async fn read_frame(&mut self) -> Result<Bytes, ClientError> {
        loop {
            if let Some(frame) = self.decoder.decode_frame()? {
                return Ok(frame);
            }

            let n = self.stream.read(&mut self.read_buf).await?;
            if n == 0 {
                tracing::debug!(
                    "Connection to {} closed with {} bytes buffered",
                    self.addr,
                    self.decoder.buffered()
                );
                return Err(ClientError::ConnectionClosed);
            }
            self.decoder.extend(&self.read_buf[..n]);
        }
    }
}
