// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;

use crate::engine::auth::credential::Credential;
use crate::engine::auth::flow::{CredentialRequest, DatabaseAuthenticationFlow};
use crate::engine::auth::strategy::StrategyKind;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::{DatabaseType, RuntimeContext};

/// Forwards the Kerberos context the calling identity already holds.
pub struct DelegatedKerberosFlow {
    database_type: DatabaseType,
}

impl DelegatedKerberosFlow {
    pub fn new(database_type: DatabaseType) -> Self {
        Self { database_type }
    }
}

#[async_trait]
impl DatabaseAuthenticationFlow for DelegatedKerberosFlow {
    fn database_type(&self) -> DatabaseType {
        self.database_type
    }

    fn strategy_kind(&self) -> StrategyKind {
        StrategyKind::DelegatedKerberos
    }

    async fn make_credential_with_context(
        &self,
        request: CredentialRequest<'_>,
        _runtime_context: &RuntimeContext,
    ) -> EngineResult<Credential> {
        let ctx = request.identity.kerberos_context().ok_or_else(|| {
            EngineError::credential_acquisition(format!(
                "Identity '{}' does not carry a Kerberos credential",
                request.identity.name
            ))
        })?;
        Ok(Credential::KerberosPrincipal(ctx.clone()))
    }
}
