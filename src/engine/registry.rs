// SPDX-License-Identifier: Apache-2.0

//! Factory Registry
//!
//! Central registry of connection factories, one per vendor.
//! The execution layer registers its drivers here at startup.

use std::collections::HashMap;
use std::sync::Arc;

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::traits::ConnectionFactory;
use crate::engine::types::DatabaseType;

/// Registry that holds the connection factory for each vendor
pub struct FactoryRegistry {
    factories: HashMap<DatabaseType, Arc<dyn ConnectionFactory>>,
}

impl FactoryRegistry {
    /// Creates a new empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registers a factory
    ///
    /// The factory's `database_type()` is used as the key.
    pub fn register(&mut self, factory: Arc<dyn ConnectionFactory>) {
        self.factories.insert(factory.database_type(), factory);
    }

    pub fn get(&self, database_type: DatabaseType) -> Option<Arc<dyn ConnectionFactory>> {
        self.factories.get(&database_type).cloned()
    }

    pub fn resolve(&self, database_type: DatabaseType) -> EngineResult<Arc<dyn ConnectionFactory>> {
        self.get(database_type).ok_or_else(|| {
            EngineError::configuration(format!(
                "No connection factory registered for {database_type}"
            ))
        })
    }

    /// Lists registered vendors, sorted
    pub fn list(&self) -> Vec<DatabaseType> {
        let mut vendors: Vec<_> = self.factories.keys().copied().collect();
        vendors.sort();
        vendors
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl Default for FactoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}
