// SPDX-License-Identifier: Apache-2.0

// Connection Engine Module
// Resolves data sources and strategies into pooled, identity-scoped connections

pub mod auth;
pub mod clock;
pub mod connection_key;
pub mod datasource;
pub mod error;
pub mod mock;
pub mod pool;
pub mod provider;
pub mod registry;
pub mod state;
pub mod traits;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use connection_key::ConnectionKey;
pub use datasource::{resolve_key, DataSourceSpecification, DataSourceSpecificationKey};
pub use error::{EngineError, EngineResult};
pub use pool::{ConnectionPool, PoolConfig, PoolStatisticsSnapshot, PooledConnection};
pub use provider::ConnectionProvider;
pub use registry::FactoryRegistry;
pub use state::{ConnectionStateManager, PoolInfo, PoolKey, StateSnapshot, StoreInfo};
pub use traits::{ConnectionFactory, PhysicalConnection};
pub use types::{DatabaseType, RuntimeContext};
