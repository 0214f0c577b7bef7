// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;

use crate::engine::auth::credential::Credential;
use crate::engine::auth::flow::{CredentialRequest, DatabaseAuthenticationFlow};
use crate::engine::auth::strategy::StrategyKind;
use crate::engine::error::EngineResult;
use crate::engine::types::{DatabaseType, RuntimeContext};

/// Defers to the Google application default credentials of the host.
pub struct GcpApplicationDefaultFlow {
    database_type: DatabaseType,
}

impl GcpApplicationDefaultFlow {
    pub fn new(database_type: DatabaseType) -> Self {
        Self { database_type }
    }
}

#[async_trait]
impl DatabaseAuthenticationFlow for GcpApplicationDefaultFlow {
    fn database_type(&self) -> DatabaseType {
        self.database_type
    }

    fn strategy_kind(&self) -> StrategyKind {
        StrategyKind::GcpApplicationDefault
    }

    async fn make_credential_with_context(
        &self,
        _request: CredentialRequest<'_>,
        _runtime_context: &RuntimeContext,
    ) -> EngineResult<Credential> {
        Ok(Credential::GcpApplicationDefault)
    }
}
