// SPDX-License-Identifier: Apache-2.0

//! Physical connection seams
//!
//! Wire-level drivers live outside this crate. The execution layer supplies
//! one `ConnectionFactory` per vendor, and pools hold whatever
//! `PhysicalConnection` it returns.

use async_trait::async_trait;
use std::any::Any;
use std::fmt::Debug;

use crate::engine::auth::credential::Credential;
use crate::engine::connection_key::ConnectionKey;
use crate::engine::error::EngineResult;
use crate::engine::types::DatabaseType;

/// Opens authenticated physical connections for one vendor
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    fn database_type(&self) -> DatabaseType;

    /// Opens a new connection to the endpoint described by `key`
    ///
    /// Failures should map to `EngineError::ConnectionFailed` when a retry
    /// could succeed.
    async fn open(
        &self,
        key: &ConnectionKey,
        credential: &Credential,
    ) -> EngineResult<Box<dyn PhysicalConnection>>;
}

/// A live session owned by a pool
#[async_trait]
pub trait PhysicalConnection: Send + Sync + Debug {
    /// Cheap liveness check run before an idle connection is reused
    fn is_valid(&self) -> bool;

    async fn close(&mut self) -> EngineResult<()>;

    fn describe(&self) -> String;

    fn as_any(&self) -> &dyn Any;
}
