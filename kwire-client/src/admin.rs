//! Administrative operations.

use crate::client::Client;
use crate::deadline::{milliseconds, Deadline};
use crate::error::ClientError;
use kwire_protocol::messages::delete_topics as wire;
use kwire_protocol::{ApiResponse, ErrorCode, VersionRange};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;
use tokio::time::Instant;

/// Broker-side wait used by [`Client::delete_topics`] when neither a timeout
/// nor a deadline is given.
pub const DEFAULT_DELETE_TOPICS_TIMEOUT: Duration = Duration::from_secs(10);

/// Topics to delete on one broker.
#[derive(Debug, Clone)]
pub struct DeleteTopicsRequest {
    /// Broker (normally the controller) to send the request to.
    pub addr: String,
    pub topics: Vec<String>,
    /// How long the broker waits for the deletion to complete. `None`
    /// derives a value from the call deadline. `Some(Duration::ZERO)` starts
    /// the deletion and returns at once.
    pub timeout: Option<Duration>,
}

impl DeleteTopicsRequest {
    pub fn new(addr: impl Into<String>, topics: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            addr: addr.into(),
            topics: topics.into_iter().map(Into::into).collect(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Outcome of [`Client::delete_topics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteTopicsResponse {
    /// Time the broker asked the client to back off for. Zero below v1.
    pub throttle: Duration,
    /// One entry per requested topic; `None` means the topic was deleted.
    pub errors: HashMap<String, Option<ErrorCode>>,
}

impl DeleteTopicsResponse {
    /// Returns the topics that reported an error, sorted by name.
    pub fn failed(&self) -> Vec<(&str, ErrorCode)> {
        let mut failed: Vec<_> = self
            .errors
            .iter()
            .filter_map(|(topic, code)| code.map(|code| (topic.as_str(), code)))
            .collect();
        failed.sort_by(|a, b| a.0.cmp(b.0));
        failed
    }
}

impl Client {
    /// Deletes topics through the broker at `request.addr`.
    ///
    /// Per-topic failures are reported in the result map and do not fail the
    /// call. Every requested topic appears in the map exactly once.
    pub async fn delete_topics(
        &self,
        request: &DeleteTopicsRequest,
        deadline: Deadline,
    ) -> Result<DeleteTopicsResponse, ClientError> {
        self.delete_topics_inner(request, deadline)
            .await
            .map_err(|e| e.context("Client::delete_topics"))
    }

    async fn delete_topics_inner(
        &self,
        request: &DeleteTopicsRequest,
        deadline: Deadline,
    ) -> Result<DeleteTopicsResponse, ClientError> {
        let timeout_ms = match request.timeout {
            Some(timeout) => milliseconds(timeout),
            None => self.timeout_ms(deadline, DEFAULT_DELETE_TOPICS_TIMEOUT),
        };

        let message = wire::DeleteTopicsRequest::new(request.topics.clone(), Some(timeout_ms));
        let response = self.send(&request.addr, message, deadline).await?;

        Ok(DeleteTopicsResponse {
            throttle: response.throttle(),
            errors: topic_errors(&request.topics, &response),
        })
    }

    /// Returns the version ranges the broker at `addr` advertises, keyed by
    /// API key.
    pub async fn api_versions(
        &self,
        addr: &str,
        deadline: Deadline,
    ) -> Result<BTreeMap<i16, VersionRange>, ClientError> {
        self.api_versions_inner(addr, deadline)
            .await
            .map_err(|e| e.context("Client::api_versions"))
    }

    async fn api_versions_inner(
        &self,
        addr: &str,
        deadline: Deadline,
    ) -> Result<BTreeMap<i16, VersionRange>, ClientError> {
        if deadline.has_elapsed(Instant::now()) {
            return Err(ClientError::Timeout);
        }

        let mut conn = self.pool().acquire(addr, deadline).await?;
        let result = conn
            .api_versions(deadline)
            .await
            .map(|ranges| ranges.iter().map(|(k, v)| (*k, *v)).collect());
        self.pool().release(conn);

        result
    }
}

/// Builds the per-topic result map: exactly the requested topics as keys.
fn topic_errors(
    requested: &[String],
    response: &wire::DeleteTopicsResponse,
) -> HashMap<String, Option<ErrorCode>> {
    let mut errors: HashMap<String, Option<ErrorCode>> = HashMap::with_capacity(requested.len());
    let mut pending: HashSet<&str> = requested.iter().map(String::as_str).collect();

    for (topic, code) in response.item_errors() {
        if !pending.remove(topic) {
            tracing::warn!("Broker reported unrequested topic {}, ignoring", topic);
            continue;
        }
        errors.insert(topic.to_string(), code);
    }

    for topic in pending {
        tracing::warn!("Broker did not report a result for topic {}", topic);
        errors.insert(topic.to_string(), Some(ErrorCode::UnknownServerError));
    }

    errors
}
