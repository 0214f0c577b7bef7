// SPDX-License-Identifier: Apache-2.0

//! Connection State Manager
//!
//! Process-wide registry of connection pools, keyed by identity,
//! credential kind and connection key. Pool names are for monitoring only.
//! This is the only place pools are created, looked up, evicted or
//! enumerated for monitoring.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::engine::auth::credential::{Credential, Identity};
use crate::engine::clock::{Clock, SystemClock};
use crate::engine::connection_key::ConnectionKey;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::pool::{ConnectionPool, PoolConfig, PoolStatisticsSnapshot};
use crate::engine::traits::ConnectionFactory;
use crate::engine::types::DatabaseType;
use crate::metrics;

pub const POOL_NAME_PREFIX: &str = "DBPool";

/// Monitoring view of one pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolInfo {
    pub name: String,
    pub principal: String,
    pub database_type: DatabaseType,
    pub data_source: String,
    pub connection_key: String,
    pub credential_kind: String,
    pub statistics: PoolStatisticsSnapshot,
}

impl PoolInfo {
    fn of(pool: &ConnectionPool) -> Self {
        Self {
            name: pool.name().to_string(),
            principal: pool.principal().to_string(),
            database_type: pool.key().database_type(),
            data_source: pool.key().data_source().short_id(),
            connection_key: pool.key().short_id(),
            credential_kind: pool.credential().kind_name().to_string(),
            statistics: pool.statistics(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedStatistics {
    pub total_connections: u64,
    pub active_connections: u64,
    pub idle_connections: u64,
    pub threads_awaiting_connection: u64,
    pub requested_connections: u64,
}

impl AggregatedStatistics {
    fn add(&mut self, stats: &PoolStatisticsSnapshot) {
        self.total_connections += stats.total_connections;
        self.active_connections += stats.active_connections;
        self.idle_connections += stats.idle_connections;
        self.threads_awaiting_connection += stats.threads_awaiting_connection;
        self.requested_connections += stats.requested;
    }
}

/// Pools sharing one physical store, across identities and strategies
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreInfo {
    pub data_source: String,
    pub database_type: DatabaseType,
    pub pools: Vec<PoolInfo>,
    pub statistics: AggregatedStatistics,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub pool_count: usize,
    pub stores: Vec<StoreInfo>,
}

/// Registry key; the pool name is derived from it but is not unique
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    identity: String,
    credential_kind: &'static str,
    connection_key: ConnectionKey,
}

impl PoolKey {
    pub fn new(identity: &Identity, key: &ConnectionKey) -> Self {
        Self {
            identity: identity.name.clone(),
            credential_kind: identity.credential_kind(),
            connection_key: key.clone(),
        }
    }
}

type PoolLock = Arc<tokio::sync::Mutex<()>>;

static GLOBAL: OnceLock<Arc<ConnectionStateManager>> = OnceLock::new();

pub struct ConnectionStateManager {
    pools: RwLock<HashMap<PoolKey, Arc<ConnectionPool>>>,
    pool_locks: Mutex<HashMap<PoolKey, PoolLock>>,
    pool_config: PoolConfig,
    clock: Arc<dyn Clock>,
}

impl ConnectionStateManager {
    pub fn new(pool_config: PoolConfig) -> Self {
        Self::with_clock(pool_config, Arc::new(SystemClock))
    }

    pub fn with_clock(pool_config: PoolConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            pools: RwLock::new(HashMap::new()),
            pool_locks: Mutex::new(HashMap::new()),
            pool_config,
            clock,
        }
    }

    /// Process-wide instance with default pool settings
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::new(PoolConfig::default()))))
    }

    pub fn pool_config(&self) -> PoolConfig {
        self.pool_config
    }

    pub fn pool_name_for(identity: &Identity, key: &ConnectionKey) -> String {
        format!(
            "{}_{}_{}_{}",
            POOL_NAME_PREFIX,
            key.short_id(),
            identity.name,
            identity.credential_kind()
        )
    }

    fn pool_lock(&self, key: &PoolKey) -> PoolLock {
        let mut locks = self.pool_locks.lock();
        Arc::clone(
            locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }

    /// Holds the creation lock for `key`. A lock dropped from the table while
    /// we waited on it no longer guards anything, so take the current one.
    async fn lock_pool(&self, key: &PoolKey) -> tokio::sync::OwnedMutexGuard<()> {
        loop {
            let lock = self.pool_lock(key);
            let guard = Arc::clone(&lock).lock_owned().await;
            let current = self
                .pool_locks
                .lock()
                .get(key)
                .is_some_and(|held| Arc::ptr_eq(held, &lock));
            if current {
                return guard;
            }
        }
    }

    /// Caller must hold the pool's creation lock
    fn forget(&self, key: &PoolKey) -> Option<Arc<ConnectionPool>> {
        let removed = self.pools.write().remove(key);
        self.pool_locks.lock().remove(key);
        removed
    }

    /// Caller must hold the pool's creation lock
    fn release_unused_lock(&self, key: &PoolKey) {
        if !self.pools.read().contains_key(key) {
            self.pool_locks.lock().remove(key);
        }
    }

    /// Open pool registered under `key`; closed pools are treated as absent
    fn open_pool(&self, key: &PoolKey) -> Option<Arc<ConnectionPool>> {
        self.pools
            .read()
            .get(key)
            .filter(|pool| !pool.is_closed())
            .cloned()
    }

    fn key_of(&self, name: &str) -> Option<PoolKey> {
        self.pools
            .read()
            .iter()
            .find(|(_, pool)| pool.name() == name)
            .map(|(key, _)| key.clone())
    }

    /// Returns the pool for (identity, key), creating it on first use.
    ///
    /// `mint` runs at most once per pool, under the pool's creation lock;
    /// every other caller for the same key waits and reuses the result.
    /// A closed pool still in the registry is replaced.
    #[instrument(
        skip_all,
        fields(identity = %identity.name, vendor = %key.database_type())
    )]
    pub async fn resolve<F, Fut>(
        &self,
        identity: &Identity,
        key: &ConnectionKey,
        factory: Arc<dyn ConnectionFactory>,
        mint: F,
    ) -> EngineResult<Arc<ConnectionPool>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = EngineResult<Credential>>,
    {
        if !identity.is_valid() {
            return Err(EngineError::invalid_identity(&identity.name));
        }

        let pool_key = PoolKey::new(identity, key);
        if let Some(pool) = self.open_pool(&pool_key) {
            pool.record_request();
            return Ok(pool);
        }

        let _guard = self.lock_pool(&pool_key).await;

        if let Some(pool) = self.open_pool(&pool_key) {
            pool.record_request();
            return Ok(pool);
        }

        let credential = match mint().await {
            Ok(credential) if credential.is_valid() => credential,
            Ok(_) => {
                self.release_unused_lock(&pool_key);
                return Err(EngineError::invalid_identity(&identity.name));
            }
            Err(e) => {
                self.release_unused_lock(&pool_key);
                return Err(e);
            }
        };

        let name = Self::pool_name_for(identity, key);
        let pool = Arc::new(ConnectionPool::new(
            name.clone(),
            key.clone(),
            identity.name.clone(),
            credential,
            factory,
            self.pool_config,
            Arc::clone(&self.clock),
        ));
        let replaced = self.pools.write().insert(pool_key, Arc::clone(&pool));
        if replaced.is_some() {
            debug!(pool = %name, "Replaced closed connection pool");
        }
        metrics::record_pool_created();
        info!(pool = %name, "Connection pool created");

        pool.record_request();
        Ok(pool)
    }

    pub fn get(&self, name: &str) -> Option<Arc<ConnectionPool>> {
        self.pools
            .read()
            .values()
            .find(|pool| pool.name() == name)
            .cloned()
    }

    pub fn find_by_pool_name(&self, name: &str) -> Option<PoolInfo> {
        self.get(name).map(|pool| PoolInfo::of(&pool))
    }

    /// Pools built for one identity, sorted by name
    pub fn pools_by_principal(&self, principal: &str) -> Vec<PoolInfo> {
        let mut infos: Vec<PoolInfo> = self
            .pools
            .read()
            .values()
            .filter(|pool| pool.principal() == principal)
            .map(|pool| PoolInfo::of(pool))
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    pub fn size(&self) -> usize {
        self.pools.read().len()
    }

    /// Closes and forgets a pool; returns false when no such pool exists
    #[instrument(skip(self))]
    pub async fn close_and_remove_pool(&self, name: &str) -> bool {
        let Some(key) = self.key_of(name) else {
            return false;
        };
        let _guard = self.lock_pool(&key).await;

        match self.forget(&key) {
            Some(pool) => {
                pool.close().await;
                info!(pool = %name, "Connection pool removed");
                true
            }
            None => false,
        }
    }

    /// Pools idle longer than `duration` with nothing checked out
    pub fn find_unused_pools_older_than(&self, duration: Duration) -> Vec<(PoolKey, PoolStatisticsSnapshot)> {
        let threshold = duration.as_millis() as i64;
        self.pools
            .read()
            .iter()
            .filter(|(_, pool)| {
                pool.idle_for().num_milliseconds() > threshold && !pool.has_active_connections()
            })
            .map(|(key, pool)| (key.clone(), pool.statistics()))
            .collect()
    }

    /// Removes unused pools whose statistics have not moved since they were selected
    pub async fn evict_unused_pools_older_than(&self, duration: Duration) -> usize {
        let candidates = self.find_unused_pools_older_than(duration);
        let mut evicted = 0;

        for (key, observed) in candidates {
            let _guard = self.lock_pool(&key).await;

            let registered = self.pools.read().get(&key).cloned();
            let Some(pool) = registered else {
                self.release_unused_lock(&key);
                continue;
            };
            if pool.has_active_connections() || pool.statistics() != observed {
                debug!(pool = %pool.name(), "Pool used since selection, keeping it");
                continue;
            }

            self.forget(&key);
            pool.close().await;
            evicted += 1;
            info!(pool = %pool.name(), "Evicted unused connection pool");
        }

        if evicted > 0 {
            metrics::record_pools_evicted(evicted as u64);
        }
        evicted
    }

    /// Runs eviction every `interval` until `cancel` fires
    pub fn spawn_housekeeper(
        self: &Arc<Self>,
        interval: Duration,
        evict_after: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        manager.evict_unused_pools_older_than(evict_after).await;
                    }
                }
            }
            debug!("Pool housekeeper stopped");
        })
    }

    /// Every pool grouped by physical store, sorted for stable output
    pub fn snapshot(&self) -> StateSnapshot {
        let pools: Vec<Arc<ConnectionPool>> = self.pools.read().values().cloned().collect();
        let pool_count = pools.len();

        let mut stores: BTreeMap<String, StoreInfo> = BTreeMap::new();
        for pool in pools {
            let info = PoolInfo::of(&pool);
            let store = stores
                .entry(info.data_source.clone())
                .or_insert_with(|| StoreInfo {
                    data_source: info.data_source.clone(),
                    database_type: info.database_type,
                    pools: Vec::new(),
                    statistics: AggregatedStatistics::default(),
                });
            store.statistics.add(&info.statistics);
            store.pools.push(info);
        }

        let stores = stores
            .into_values()
            .map(|mut store| {
                store.pools.sort_by(|a, b| a.name.cmp(&b.name));
                store
            })
            .collect();

        StateSnapshot { pool_count, stores }
    }

    pub fn pool_statistics_json(&self, name: &str) -> EngineResult<Option<String>> {
        self.find_by_pool_name(name)
            .map(|info| {
                serde_json::to_string(&info)
                    .map_err(|e| EngineError::internal(format!("Failed to serialize pool statistics: {e}")))
            })
            .transpose()
    }

    /// Closes every pool and empties the registry
    pub async fn shutdown(&self) {
        let pools: Vec<Arc<ConnectionPool>> = self.pools.write().drain().map(|(_, pool)| pool).collect();
        self.pool_locks.lock().clear();
        let count = pools.len();
        for pool in pools {
            pool.close().await;
        }
        info!(pools = count, "Connection state manager shut down");
    }
}

#[cfg(test)]
impl ConnectionStateManager {
    fn lock_count(&self) -> usize {
        self.pool_locks.lock().len()
    }
}

impl std::fmt::Debug for ConnectionStateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionStateManager")
            .field("pools", &self.size())
            .field("pool_locks", &self.pool_locks.lock().len())
            .field("pool_config", &self.pool_config)
            .finish()
    }
}
