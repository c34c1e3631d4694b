//! Per-broker pool of idle connections.

use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::deadline::Deadline;
use crate::error::ClientError;
use dashmap::DashMap;
use std::sync::Arc;

/// Idle connections keyed by broker address.
///
/// A connection is handed out by value, so whoever holds it owns it
/// exclusively until it is released. Failed connections are never pooled.
pub struct ConnectionPool {
    config: Arc<ClientConfig>,
    idle: DashMap<String, Vec<Connection>>,
}

impl ConnectionPool {
    pub fn new(config: Arc<ClientConfig>) -> Self {
        Self {
            config,
            idle: DashMap::new(),
        }
    }

    /// Returns an idle connection to `addr`, or dials a new one.
    pub async fn acquire(&self, addr: &str, deadline: Deadline) -> Result<Connection, ClientError> {
        if let Some(conn) = self.take_idle(addr) {
            tracing::debug!("Reusing idle connection to {}", addr);
            return Ok(conn);
        }

        Connection::connect(addr, self.config.clone(), deadline).await
    }

    fn take_idle(&self, addr: &str) -> Option<Connection> {
        let mut idle = self.idle.get_mut(addr)?;
        while let Some(conn) = idle.pop() {
            if conn.is_reusable() {
                return Some(conn);
            }
        }
        None
    }

    /// Hands a connection back. It is kept only if it is still reusable and
    /// the broker is under its idle limit.
    pub fn release(&self, conn: Connection) {
        if !conn.is_reusable() {
            tracing::debug!("Discarding failed connection to {}", conn.addr());
            return;
        }

        let mut idle = self.idle.entry(conn.addr().to_string()).or_default();
        if idle.len() >= self.config.max_idle_per_broker {
            tracing::debug!("Idle limit reached for {}, dropping connection", conn.addr());
            return;
        }
        idle.push(conn);
    }

    /// Returns the number of idle connections to `addr`.
    pub fn idle_count(&self, addr: &str) -> usize {
        self.idle.get(addr).map(|idle| idle.len()).unwrap_or(0)
    }

    /// Drops every idle connection.
    pub fn close_idle(&self) {
        let count: usize = self.idle.iter().map(|entry| entry.len()).sum();
        tracing::debug!("Closing {} idle connections", count);
        self.idle.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{api_versions_frame, spawn_broker, Reply};
    use std::time::Duration;

    fn broker_handler(
        header: &kwire_protocol::RequestHeader,
        _body: &bytes::Bytes,
    ) -> Reply {
        Reply::Frame(api_versions_frame(header.correlation_id, 0, &[(20, 0, 1)]))
    }

    #[tokio::test]
    async fn test_release_and_reuse() {
        let addr = spawn_broker(broker_handler).await;
        let pool = ConnectionPool::new(Arc::new(ClientConfig::default()));

        let mut conn = pool.acquire(&addr, Deadline::NONE).await.unwrap();
        conn.api_versions(Deadline::NONE).await.unwrap();
        pool.release(conn);
        assert_eq!(pool.idle_count(&addr), 1);

        let conn = pool.acquire(&addr, Deadline::NONE).await.unwrap();
        assert_eq!(pool.idle_count(&addr), 0);
        assert_eq!(conn.addr(), addr);
        pool.release(conn);

        pool.close_idle();
        assert_eq!(pool.idle_count(&addr), 0);
    }

    #[tokio::test]
    async fn test_idle_limit() {
        let addr = spawn_broker(broker_handler).await;
        let config = ClientConfig::default().with_max_idle_per_broker(1);
        let pool = ConnectionPool::new(Arc::new(config));

        let a = pool.acquire(&addr, Deadline::NONE).await.unwrap();
        let b = pool.acquire(&addr, Deadline::NONE).await.unwrap();
        pool.release(a);
        pool.release(b);
        assert_eq!(pool.idle_count(&addr), 1);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let config = ClientConfig::default().with_connect_timeout(Duration::from_secs(2));
        let pool = ConnectionPool::new(Arc::new(config));
        let err = pool.acquire(&addr, Deadline::NONE).await.unwrap_err();
        assert!(matches!(err, ClientError::Io(_) | ClientError::Timeout));
    }
}
