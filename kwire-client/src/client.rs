//! High-level client API.

use crate::config::ClientConfig;
use crate::deadline::{adjust_for_rtt, deadline_to_timeout, milliseconds, Deadline};
use crate::error::ClientError;
use crate::pool::ConnectionPool;
use kwire_protocol::ApiRequest;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// High-level client for a set of brokers.
///
/// Calls to different brokers run in parallel on independent connections;
/// each call holds its connection exclusively for the duration of one round
/// trip.
pub struct Client {
    config: Arc<ClientConfig>,
    pool: ConnectionPool,
}

impl Client {
    /// Creates a new client with the given configuration.
    pub fn new(config: ClientConfig) -> Self {
        let config = Arc::new(config);
        Self {
            pool: ConnectionPool::new(config.clone()),
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Drops all idle connections.
    pub fn close(&self) {
        self.pool.close_idle();
    }

    /// Sends `request` to the broker at `addr` and returns its response.
    ///
    /// The connection goes back to the pool only if the exchange left it
    /// usable.
    pub async fn round_trip<R: ApiRequest>(
        &self,
        addr: &str,
        request: R,
        deadline: Deadline,
    ) -> Result<R::Response, ClientError> {
        self.send(addr, request, deadline)
            .await
            .map_err(|e| e.context("Client::round_trip"))
    }

    /// [`Client::round_trip`] without operation context, for callers that
    /// add their own.
    pub(crate) async fn send<R: ApiRequest>(
        &self,
        addr: &str,
        request: R,
        deadline: Deadline,
    ) -> Result<R::Response, ClientError> {
        if deadline.has_elapsed(Instant::now()) {
            return Err(ClientError::Timeout);
        }

        let mut conn = self.pool.acquire(addr, deadline).await?;
        let result = conn.round_trip(request, deadline).await;
        if let Err(e) = &result {
            tracing::debug!("{} to {} failed: {}", R::API_KEY, addr, e);
        }
        self.pool.release(conn);

        result
    }

    /// Broker-side timeout for a call bounded by `deadline`, in
    /// milliseconds. Without a deadline `default` is used as is.
    pub fn timeout_ms(&self, deadline: Deadline, default: Duration) -> i32 {
        if !deadline.is_set() {
            return milliseconds(default);
        }

        let now = Instant::now();
        let t = adjust_for_rtt(deadline, now, self.config.rtt_estimate());
        milliseconds(deadline_to_timeout(t, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{api_versions_frame, spawn_broker, Reply};
    use kwire_protocol::messages::ApiVersionsRequest;
    use kwire_protocol::ErrorCode;

    fn client() -> Client {
        Client::new(ClientConfig::default().with_rtt_estimate(Duration::from_millis(100)))
    }

    #[test]
    fn test_timeout_ms_without_deadline_uses_default() {
        let client = client();
        assert_eq!(
            client.timeout_ms(Deadline::NONE, Duration::from_secs(10)),
            10_000
        );
    }

    #[tokio::test]
    async fn test_timeout_ms_with_deadline() {
        let client = client();
        let deadline = Deadline::after(Duration::from_millis(500));
        let ms = client.timeout_ms(deadline, Duration::from_secs(10));
        assert!(ms <= 400 && ms > 300, "got {}", ms);

        let tight = Deadline::after(Duration::from_millis(40));
        let ms = client.timeout_ms(tight, Duration::from_secs(10));
        assert!(ms <= 30, "got {}", ms);
    }

    #[tokio::test]
    async fn test_expired_deadline_fails_before_dialing() {
        let client = client();
        let deadline = Deadline::at(Instant::now() - Duration::from_millis(1));
        let err = client
            .round_trip("127.0.0.1:1", ApiVersionsRequest::default(), deadline)
            .await
            .unwrap_err();
        assert!(matches!(err.root(), ClientError::Timeout));
        assert_eq!(err.to_string(), "Client::round_trip: request timed out");
    }

    #[tokio::test]
    async fn test_root_error_keeps_connection_pooled() {
        let addr = spawn_broker(|header: &kwire_protocol::RequestHeader, _: &bytes::Bytes| {
            Reply::Frame(api_versions_frame(
                header.correlation_id,
                ErrorCode::ClusterAuthorizationFailed.code(),
                &[],
            ))
        })
        .await;
        let client = client();

        let err = client
            .round_trip(&addr, ApiVersionsRequest::default(), Deadline::NONE)
            .await
            .unwrap_err();
        assert!(matches!(
            err.root(),
            ClientError::Broker(ErrorCode::ClusterAuthorizationFailed)
        ));
        assert!(err.to_string().starts_with("Client::round_trip: broker error"));
        assert_eq!(client.pool().idle_count(&addr), 1);
    }
}
