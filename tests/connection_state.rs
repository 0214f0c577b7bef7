// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use datagate_lib::engine::auth::{AuthenticationStrategy, Credential, Identity};
use datagate_lib::engine::datasource::LocalH2Specification;
use datagate_lib::engine::mock::MockConnectionFactory;
use datagate_lib::engine::{
    ConnectionFactory, ConnectionKey, ConnectionStateManager, DataSourceSpecificationKey,
    DatabaseType, EngineError, ManualClock, PoolConfig,
};
use tokio_util::sync::CancellationToken;

fn key() -> ConnectionKey {
    ConnectionKey::new(
        DataSourceSpecificationKey::LocalH2(
            LocalH2Specification {
                setup_sql: vec!["CREATE TABLE T1 (ID INT)".to_string()],
            }
            .resolve(),
        ),
        AuthenticationStrategy::DefaultH2.key().unwrap(),
    )
}

fn factory() -> Arc<dyn ConnectionFactory> {
    Arc::new(MockConnectionFactory::new(DatabaseType::H2))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_first_resolution_creates_one_pool() {
    let manager = Arc::new(ConnectionStateManager::new(PoolConfig::default()));
    let mints = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::with_capacity(5000);
    for _ in 0..5000 {
        let manager = Arc::clone(&manager);
        let mints = Arc::clone(&mints);
        handles.push(tokio::spawn(async move {
            let identity = Identity::new("mock");
            manager
                .resolve(&identity, &key(), factory(), || async move {
                    mints.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Ok(Credential::None)
                })
                .await
                .map(|pool| pool.name().to_string())
        }));
    }

    let mut names = Vec::new();
    for result in futures::future::join_all(handles).await {
        names.push(result.unwrap().unwrap());
    }
    names.dedup();

    assert_eq!(names.len(), 1);
    assert_eq!(mints.load(Ordering::SeqCst), 1);
    assert_eq!(manager.size(), 1);
    let info = manager.find_by_pool_name(&names[0]).unwrap();
    assert_eq!(info.statistics.requested, 5000);
}

#[tokio::test]
async fn housekeeper_evicts_idle_pools() {
    let clock = Arc::new(ManualClock::default());
    let manager = Arc::new(ConnectionStateManager::with_clock(PoolConfig::default(), clock.clone()));

    let pool = manager
        .resolve(&Identity::new("mock"), &key(), factory(), || async { Ok(Credential::None) })
        .await
        .unwrap();
    pool.checkout().await.unwrap().release();

    let cancel = CancellationToken::new();
    let housekeeper = manager.spawn_housekeeper(
        Duration::from_millis(10),
        Duration::from_secs(5 * 60),
        cancel.clone(),
    );

    clock.advance(chrono::Duration::minutes(4));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(manager.size(), 1);

    clock.advance(chrono::Duration::minutes(2));
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while manager.size() > 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(manager.size(), 0);
    assert!(pool.is_closed());

    cancel.cancel();
    housekeeper.await.unwrap();
}

#[tokio::test]
async fn pool_in_use_survives_eviction() {
    let clock = Arc::new(ManualClock::default());
    let manager = ConnectionStateManager::with_clock(PoolConfig::default(), clock.clone());

    let pool = manager
        .resolve(&Identity::new("mock"), &key(), factory(), || async { Ok(Credential::None) })
        .await
        .unwrap();
    let held = pool.checkout().await.unwrap();

    clock.advance(chrono::Duration::minutes(11));
    assert_eq!(manager.evict_unused_pools_older_than(Duration::from_secs(600)).await, 0);

    held.release();
    assert_eq!(manager.evict_unused_pools_older_than(Duration::from_secs(600)).await, 1);
}

#[tokio::test]
async fn exhausted_pool_reports_retryable_error() {
    let manager = ConnectionStateManager::new(PoolConfig {
        max_connections: 2,
        acquire_timeout: Duration::from_millis(25),
    });
    let pool = manager
        .resolve(&Identity::new("mock"), &key(), factory(), || async { Ok(Credential::None) })
        .await
        .unwrap();

    let _a = pool.checkout().await.unwrap();
    let _b = pool.checkout().await.unwrap();
    let err = pool.checkout().await.unwrap_err();

    assert!(matches!(err, EngineError::PoolExhausted { timeout_ms: 25, .. }));
    assert!(err.is_retryable());
    let stats = pool.statistics();
    assert_eq!(stats.granted, 2);
    assert_eq!(stats.exhausted, 1);
}

#[tokio::test]
async fn snapshot_serializes_for_dashboards() {
    let manager = ConnectionStateManager::new(PoolConfig::default());
    for user in ["user1", "user2", "user3"] {
        manager
            .resolve(&Identity::new(user), &key(), factory(), || async { Ok(Credential::None) })
            .await
            .unwrap();
    }

    let json = serde_json::to_value(manager.snapshot()).unwrap();
    assert_eq!(json["poolCount"], 3);
    assert_eq!(json["stores"][0]["databaseType"], "H2");
    assert_eq!(json["stores"][0]["statistics"]["requestedConnections"], 3);
    assert_eq!(json["stores"][0]["pools"].as_array().unwrap().len(), 3);
}
