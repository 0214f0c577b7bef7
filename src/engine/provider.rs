// SPDX-License-Identifier: Apache-2.0

//! Connection Provider
//!
//! Entry point for the execution layer: turns "a connection to store X,
//! authenticated as Y, on behalf of Z" into a checked-out pooled connection.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::engine::auth::credential::Identity;
use crate::engine::auth::flow::CredentialRequest;
use crate::engine::auth::registry::FlowRegistry;
use crate::engine::auth::strategy::{AuthenticationStrategy, StrategyKind};
use crate::engine::connection_key::ConnectionKey;
use crate::engine::datasource::{resolve_key, DataSourceSpecification};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::pool::PooledConnection;
use crate::engine::registry::FactoryRegistry;
use crate::engine::state::ConnectionStateManager;
use crate::engine::types::RuntimeContext;

pub struct ConnectionProvider {
    flows: Arc<FlowRegistry>,
    factories: Arc<FactoryRegistry>,
    state: Arc<ConnectionStateManager>,
}

impl ConnectionProvider {
    pub fn new(
        flows: Arc<FlowRegistry>,
        factories: Arc<FactoryRegistry>,
        state: Arc<ConnectionStateManager>,
    ) -> Self {
        Self {
            flows,
            factories,
            state,
        }
    }

    pub fn state(&self) -> &Arc<ConnectionStateManager> {
        &self.state
    }

    /// Derives the pool identity; fails before any vault or network access
    pub fn connection_key(
        spec: &DataSourceSpecification,
        strategy: &AuthenticationStrategy,
    ) -> EngineResult<ConnectionKey> {
        let data_source = resolve_key(spec)?;
        let strategy = strategy.key()?;
        let test_mode = strategy.kind() == StrategyKind::TestDatabase;
        let key = ConnectionKey::new(data_source, strategy);
        Ok(if test_mode { key.for_tests() } else { key })
    }

    pub async fn connect(
        &self,
        identity: &Identity,
        spec: &DataSourceSpecification,
        strategy: &AuthenticationStrategy,
        runtime_context: Option<&RuntimeContext>,
    ) -> EngineResult<PooledConnection> {
        self.connect_with_cancel(identity, spec, strategy, runtime_context, &CancellationToken::new())
            .await
    }

    /// Authorization runs on every call; the credential is minted only
    /// when the pool does not exist yet.
    #[instrument(
        skip_all,
        fields(
            identity = %identity.name,
            vendor = %spec.database_type(),
            strategy = %strategy.kind(),
        )
    )]
    pub async fn connect_with_cancel(
        &self,
        identity: &Identity,
        spec: &DataSourceSpecification,
        strategy: &AuthenticationStrategy,
        runtime_context: Option<&RuntimeContext>,
        cancel: &CancellationToken,
    ) -> EngineResult<PooledConnection> {
        let key = Self::connection_key(spec, strategy)?;
        let factory = self.factories.resolve(key.database_type())?;
        let request = CredentialRequest::new(identity, key.data_source(), key.strategy().strategy());

        self.flows.authorize(request, runtime_context).await?;

        let mut retried = false;
        loop {
            let pool = self
                .state
                .resolve(identity, &key, Arc::clone(&factory), || {
                    self.flows.make_credential(request, runtime_context)
                })
                .await?;

            match pool.checkout_or_cancel(cancel.cancelled()).await {
                // evicted between lookup and checkout
                Err(EngineError::PoolClosed { .. }) if !retried => {
                    debug!(pool = %pool.name(), "Pool closed before checkout, resolving again");
                    retried = true;
                }
                result => return result,
            }
        }
    }
}
