// SPDX-License-Identifier: Apache-2.0

//! In-process connection factory
//!
//! Stands in for a vendor driver when no wire-level connector is plugged in
//! (local H2 stores, tests, dry runs).

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::engine::auth::credential::Credential;
use crate::engine::connection_key::ConnectionKey;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::traits::{ConnectionFactory, PhysicalConnection};
use crate::engine::types::DatabaseType;

#[derive(Debug, Default)]
struct Counters {
    opened: AtomicU64,
    closed: AtomicU64,
}

pub struct MockConnectionFactory {
    database_type: DatabaseType,
    counters: Arc<Counters>,
    open_delay: Option<Duration>,
    failing: bool,
    credentials_seen: Mutex<Vec<String>>,
}

impl MockConnectionFactory {
    pub fn new(database_type: DatabaseType) -> Self {
        Self {
            database_type,
            counters: Arc::new(Counters::default()),
            open_delay: None,
            failing: false,
            credentials_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    /// Every open fails with a retryable connection error
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn opened(&self) -> u64 {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> u64 {
        self.counters.closed.load(Ordering::SeqCst)
    }

    /// Credential kinds presented to `open`, in order
    pub fn credentials_seen(&self) -> Vec<String> {
        self.credentials_seen.lock().clone()
    }
}

#[async_trait]
impl ConnectionFactory for MockConnectionFactory {
    fn database_type(&self) -> DatabaseType {
        self.database_type
    }

    async fn open(
        &self,
        key: &ConnectionKey,
        credential: &Credential,
    ) -> EngineResult<Box<dyn PhysicalConnection>> {
        if let Some(delay) = self.open_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing {
            return Err(EngineError::connection_failed(format!(
                "Mock connection refused for {}",
                key.data_source().short_id()
            )));
        }

        self.credentials_seen
            .lock()
            .push(credential.kind_name().to_string());
        let id = self.counters.opened.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Box::new(MockConnection {
            id,
            target: key.short_id(),
            open: AtomicBool::new(true),
            counters: Arc::clone(&self.counters),
        }))
    }
}

#[derive(Debug)]
pub struct MockConnection {
    id: u64,
    target: String,
    open: AtomicBool,
    counters: Arc<Counters>,
}

impl MockConnection {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Marks the connection broken so the pool drops it on return
    pub fn invalidate(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl PhysicalConnection for MockConnection {
    fn is_valid(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(&mut self) -> EngineResult<()> {
        self.open.store(false, Ordering::SeqCst);
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("mock#{} -> {}", self.id, self.target)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
