// SPDX-License-Identifier: Apache-2.0

//! Connection Pool
//!
//! One pool per (identity, connection key). A pool owns the credential it
//! was built with, a bounded set of physical connections, and the usage
//! statistics the state manager uses for monitoring and eviction.

use std::collections::VecDeque;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::engine::auth::credential::Credential;
use crate::engine::clock::Clock;
use crate::engine::connection_key::ConnectionKey;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::traits::{ConnectionFactory, PhysicalConnection};
use crate::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: usize,
    pub acquire_timeout: Duration,
}

impl PoolConfig {
    pub const DEFAULT_MAX_CONNECTIONS: usize = 10;
    pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: Self::DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: Self::DEFAULT_ACQUIRE_TIMEOUT,
        }
    }
}

#[derive(Default)]
struct PoolStatistics {
    first_request_ms: AtomicI64,
    last_request_ms: AtomicI64,
    requested: AtomicU64,
    granted: AtomicU64,
    active: AtomicU64,
    created: AtomicU64,
    exhausted: AtomicU64,
    cancelled: AtomicU64,
    awaiting: AtomicU64,
    wait_total_ms: AtomicU64,
    wait_max_ms: AtomicU64,
}

/// Point-in-time copy of a pool's counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStatisticsSnapshot {
    pub first_request_at: Option<DateTime<Utc>>,
    pub last_request_at: Option<DateTime<Utc>>,
    pub requested: u64,
    pub granted: u64,
    pub active_connections: u64,
    pub idle_connections: u64,
    pub total_connections: u64,
    pub connections_created: u64,
    pub exhausted: u64,
    pub cancelled: u64,
    pub threads_awaiting_connection: u64,
    pub average_wait_ms: u64,
    pub max_wait_ms: u64,
}

fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    if millis == 0 {
        return None;
    }
    Utc.timestamp_millis_opt(millis).single()
}

/// Decrements the awaiting counter however the checkout ends
struct AwaitingGuard<'a>(&'a AtomicU64);

impl<'a> AwaitingGuard<'a> {
    fn enter(counter: &'a AtomicU64) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for AwaitingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct ConnectionPool {
    name: String,
    key: ConnectionKey,
    principal: String,
    credential: Credential,
    factory: Arc<dyn ConnectionFactory>,
    config: PoolConfig,
    permits: Arc<Semaphore>,
    idle: Mutex<VecDeque<Box<dyn PhysicalConnection>>>,
    stats: PoolStatistics,
    clock: Arc<dyn Clock>,
    created_ms: i64,
    closed: AtomicBool,
}

impl ConnectionPool {
    pub fn new(
        name: impl Into<String>,
        key: ConnectionKey,
        principal: impl Into<String>,
        credential: Credential,
        factory: Arc<dyn ConnectionFactory>,
        config: PoolConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name: name.into(),
            key,
            principal: principal.into(),
            credential,
            factory,
            permits: Arc::new(Semaphore::new(config.max_connections.max(1))),
            config,
            idle: Mutex::new(VecDeque::new()),
            stats: PoolStatistics::default(),
            created_ms: clock.now_millis(),
            clock,
            closed: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> &ConnectionKey {
        &self.key
    }

    /// Name of the identity the pool was built for
    pub fn principal(&self) -> &str {
        &self.principal
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn config(&self) -> PoolConfig {
        self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Counts a resolution against this pool, whether or not a connection follows
    pub fn record_request(&self) {
        let now = self.clock.now_millis();
        let _ = self.stats.first_request_ms.compare_exchange(
            0,
            now,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        self.stats.last_request_ms.store(now, Ordering::SeqCst);
        self.stats.requested.fetch_add(1, Ordering::SeqCst);
    }

    /// Time since the last request, or since creation when never requested
    pub fn idle_for(&self) -> chrono::Duration {
        let last = self
            .stats
            .last_request_ms
            .load(Ordering::SeqCst)
            .max(self.created_ms);
        chrono::Duration::milliseconds(self.clock.now_millis() - last)
    }

    pub fn has_active_connections(&self) -> bool {
        self.stats.active.load(Ordering::SeqCst) > 0
    }

    pub fn idle_connections(&self) -> usize {
        self.idle.lock().len()
    }

    pub fn statistics(&self) -> PoolStatisticsSnapshot {
        let granted = self.stats.granted.load(Ordering::SeqCst);
        let active = self.stats.active.load(Ordering::SeqCst);
        let idle = self.idle_connections() as u64;
        let wait_total = self.stats.wait_total_ms.load(Ordering::SeqCst);

        PoolStatisticsSnapshot {
            first_request_at: millis_to_datetime(self.stats.first_request_ms.load(Ordering::SeqCst)),
            last_request_at: millis_to_datetime(self.stats.last_request_ms.load(Ordering::SeqCst)),
            requested: self.stats.requested.load(Ordering::SeqCst),
            granted,
            active_connections: active,
            idle_connections: idle,
            total_connections: active + idle,
            connections_created: self.stats.created.load(Ordering::SeqCst),
            exhausted: self.stats.exhausted.load(Ordering::SeqCst),
            cancelled: self.stats.cancelled.load(Ordering::SeqCst),
            threads_awaiting_connection: self.stats.awaiting.load(Ordering::SeqCst),
            average_wait_ms: if granted == 0 { 0 } else { wait_total / granted },
            max_wait_ms: self.stats.wait_max_ms.load(Ordering::SeqCst),
        }
    }

    pub async fn checkout(self: &Arc<Self>) -> EngineResult<PooledConnection> {
        self.checkout_or_cancel(std::future::pending::<()>()).await
    }

    /// Waits for a free slot, then reuses an idle connection or opens one.
    ///
    /// `cancel` completing first abandons the wait without granting anything.
    pub async fn checkout_or_cancel<F>(self: &Arc<Self>, cancel: F) -> EngineResult<PooledConnection>
    where
        F: Future<Output = ()>,
    {
        if self.is_closed() {
            return Err(EngineError::pool_closed(&self.name));
        }

        let _awaiting = AwaitingGuard::enter(&self.stats.awaiting);
        let started = Instant::now();

        let acquire = async {
            let permit = match timeout(
                self.config.acquire_timeout,
                Arc::clone(&self.permits).acquire_owned(),
            )
            .await
            {
                Ok(Ok(permit)) => permit,
                Ok(Err(_)) => return Err(EngineError::pool_closed(&self.name)),
                Err(_) => {
                    self.stats.exhausted.fetch_add(1, Ordering::SeqCst);
                    metrics::record_pool_exhausted();
                    let timeout_ms = self.config.acquire_timeout.as_millis() as u64;
                    warn!(pool = %self.name, timeout_ms, "Connection pool exhausted");
                    return Err(EngineError::pool_exhausted(&self.name, timeout_ms));
                }
            };
            let connection = self.take_or_open().await?;
            Ok((permit, connection))
        };

        tokio::select! {
            biased;
            _ = cancel => {
                self.stats.cancelled.fetch_add(1, Ordering::SeqCst);
                metrics::record_checkout_cancelled();
                debug!(pool = %self.name, "Checkout cancelled");
                Err(EngineError::Cancelled)
            }
            result = acquire => {
                let (permit, connection) = result?;
                let waited = started.elapsed().as_millis() as u64;
                self.stats.wait_total_ms.fetch_add(waited, Ordering::SeqCst);
                self.stats.wait_max_ms.fetch_max(waited, Ordering::SeqCst);
                self.stats.granted.fetch_add(1, Ordering::SeqCst);
                self.stats.active.fetch_add(1, Ordering::SeqCst);
                Ok(PooledConnection {
                    connection: Some(connection),
                    pool: Arc::clone(self),
                    _permit: permit,
                })
            }
        }
    }

    async fn take_or_open(&self) -> EngineResult<Box<dyn PhysicalConnection>> {
        loop {
            let candidate = self.idle.lock().pop_front();
            match candidate {
                Some(connection) if connection.is_valid() => return Ok(connection),
                Some(mut stale) => {
                    debug!(pool = %self.name, connection = %stale.describe(), "Dropping stale idle connection");
                    if let Err(e) = stale.close().await {
                        debug!(pool = %self.name, error = %e, "Failed to close stale connection");
                    }
                }
                None => break,
            }
        }

        let connection = self.factory.open(&self.key, &self.credential).await?;
        self.stats.created.fetch_add(1, Ordering::SeqCst);
        Ok(connection)
    }

    fn give_back(&self, connection: Box<dyn PhysicalConnection>) {
        self.stats.active.fetch_sub(1, Ordering::SeqCst);
        if self.is_closed() || !connection.is_valid() {
            close_detached(connection);
            return;
        }
        self.idle.lock().push_back(connection);
    }

    fn discard(&self, connection: Box<dyn PhysicalConnection>) {
        self.stats.active.fetch_sub(1, Ordering::SeqCst);
        close_detached(connection);
    }

    /// Closes idle connections and refuses further checkouts.
    ///
    /// Connections still checked out are closed when returned.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.permits.close();

        let drained: Vec<_> = self.idle.lock().drain(..).collect();
        for mut connection in drained {
            if let Err(e) = connection.close().await {
                warn!(pool = %self.name, error = %e, "Failed to close idle connection");
            }
        }
        debug!(pool = %self.name, "Pool closed");
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("name", &self.name)
            .field("principal", &self.principal)
            .field("config", &self.config)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

fn close_detached(connection: Box<dyn PhysicalConnection>) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                let mut connection = connection;
                let _ = connection.close().await;
            });
        }
        Err(_) => drop(connection),
    }
}

/// Checked-out connection; returns to its pool on drop
pub struct PooledConnection {
    connection: Option<Box<dyn PhysicalConnection>>,
    pool: Arc<ConnectionPool>,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    pub fn pool_name(&self) -> &str {
        self.pool.name()
    }

    pub fn credential(&self) -> &Credential {
        self.pool.credential()
    }

    pub fn release(self) {
        drop(self)
    }

    /// Closes the connection instead of returning it for reuse
    pub fn discard(mut self) {
        if let Some(connection) = self.connection.take() {
            self.pool.discard(connection);
        }
    }
}

impl Deref for PooledConnection {
    type Target = dyn PhysicalConnection;

    fn deref(&self) -> &Self::Target {
        match &self.connection {
            Some(connection) => connection.as_ref(),
            None => unreachable!("connection is only taken on drop"),
        }
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.connection {
            Some(connection) => connection.as_mut(),
            None => unreachable!("connection is only taken on drop"),
        }
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.pool.give_back(connection);
        }
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("pool", &self.pool.name)
            .field("connection", &self.connection)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::auth::strategy::AuthenticationStrategy;
    use crate::engine::clock::ManualClock;
    use crate::engine::datasource::{DataSourceSpecificationKey, LocalH2Specification};
    use crate::engine::mock::MockConnectionFactory;
    use crate::engine::types::DatabaseType;

    fn pool(factory: Arc<MockConnectionFactory>, config: PoolConfig) -> (Arc<ConnectionPool>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let key = ConnectionKey::new(
            DataSourceSpecificationKey::LocalH2(LocalH2Specification::default().resolve()),
            AuthenticationStrategy::DefaultH2.key().unwrap(),
        );
        let pool = ConnectionPool::new(
            "DBPool_test",
            key,
            "user1",
            Credential::None,
            factory,
            config,
            clock.clone(),
        );
        (Arc::new(pool), clock)
    }

    #[tokio::test]
    async fn returned_connections_are_reused() {
        let factory = Arc::new(MockConnectionFactory::new(DatabaseType::H2));
        let (pool, _) = pool(factory.clone(), PoolConfig::default());

        let first = pool.checkout().await.unwrap();
        assert_eq!(pool.statistics().active_connections, 1);
        first.release();

        let stats = pool.statistics();
        assert_eq!(stats.active_connections, 0);
        assert_eq!(stats.idle_connections, 1);
        assert_eq!(stats.total_connections, 1);

        let _second = pool.checkout().await.unwrap();
        assert_eq!(factory.opened(), 1);
        assert_eq!(pool.statistics().granted, 2);
    }

    #[tokio::test]
    async fn full_pool_times_out_as_exhausted() {
        let factory = Arc::new(MockConnectionFactory::new(DatabaseType::H2));
        let (pool, _) = pool(
            factory,
            PoolConfig {
                max_connections: 1,
                acquire_timeout: Duration::from_millis(20),
            },
        );

        let _held = pool.checkout().await.unwrap();
        let err = pool.checkout().await.unwrap_err();
        assert_eq!(err, EngineError::pool_exhausted("DBPool_test", 20));
        assert!(err.is_retryable());
        assert_eq!(pool.statistics().exhausted, 1);
        assert_eq!(pool.statistics().threads_awaiting_connection, 0);
    }

    #[tokio::test]
    async fn cancelled_wait_grants_nothing() {
        let factory = Arc::new(MockConnectionFactory::new(DatabaseType::H2));
        let (pool, _) = pool(
            factory,
            PoolConfig {
                max_connections: 1,
                acquire_timeout: Duration::from_secs(30),
            },
        );

        let _held = pool.checkout().await.unwrap();
        let err = pool
            .checkout_or_cancel(tokio::time::sleep(Duration::from_millis(10)))
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::Cancelled);

        let stats = pool.statistics();
        assert_eq!(stats.granted, 1);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.active_connections, 1);
    }

    #[tokio::test]
    async fn closed_pool_refuses_checkout_and_closes_idle() {
        let factory = Arc::new(MockConnectionFactory::new(DatabaseType::H2));
        let (pool, _) = pool(factory.clone(), PoolConfig::default());

        pool.checkout().await.unwrap().release();
        pool.close().await;

        assert_eq!(factory.closed(), 1);
        assert_eq!(pool.idle_connections(), 0);
        assert_eq!(
            pool.checkout().await.unwrap_err(),
            EngineError::pool_closed("DBPool_test")
        );
    }

    #[tokio::test]
    async fn request_times_follow_the_clock() {
        let factory = Arc::new(MockConnectionFactory::new(DatabaseType::H2));
        let (pool, clock) = pool(factory, PoolConfig::default());

        pool.record_request();
        let first = pool.statistics().first_request_at;
        clock.advance(chrono::Duration::minutes(3));
        pool.record_request();

        let stats = pool.statistics();
        assert_eq!(stats.requested, 2);
        assert_eq!(stats.first_request_at, first);
        assert_eq!(stats.last_request_at, first.map(|t| t + chrono::Duration::minutes(3)));
        assert_eq!(pool.idle_for(), chrono::Duration::zero());
    }

    #[tokio::test]
    async fn failed_open_releases_the_slot() {
        let factory = Arc::new(MockConnectionFactory::new(DatabaseType::H2).failing());
        let (pool, _) = pool(
            factory,
            PoolConfig {
                max_connections: 1,
                acquire_timeout: Duration::from_millis(20),
            },
        );

        assert!(matches!(
            pool.checkout().await.unwrap_err(),
            EngineError::ConnectionFailed { .. }
        ));
        assert!(matches!(
            pool.checkout().await.unwrap_err(),
            EngineError::ConnectionFailed { .. }
        ));
    }
}
