// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;

use crate::engine::auth::credential::Credential;
use crate::engine::auth::flow::{CredentialRequest, DatabaseAuthenticationFlow};
use crate::engine::auth::strategy::StrategyKind;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::{DatabaseType, RuntimeContext};

/// Uses the OAuth token supplied by the calling identity
pub struct OAuthFlow {
    database_type: DatabaseType,
}

impl OAuthFlow {
    pub fn new(database_type: DatabaseType) -> Self {
        Self { database_type }
    }
}

#[async_trait]
impl DatabaseAuthenticationFlow for OAuthFlow {
    fn database_type(&self) -> DatabaseType {
        self.database_type
    }

    fn strategy_kind(&self) -> StrategyKind {
        StrategyKind::OAuth
    }

    async fn make_credential_with_context(
        &self,
        request: CredentialRequest<'_>,
        _runtime_context: &RuntimeContext,
    ) -> EngineResult<Credential> {
        let identity = request.identity;
        let token = identity.oauth_credential().ok_or_else(|| {
            EngineError::credential_acquisition(format!(
                "Identity '{}' does not carry an OAuth token",
                identity.name
            ))
        })?;
        if !token.is_valid() {
            return Err(EngineError::credential_acquisition(format!(
                "OAuth token for identity '{}' has expired",
                identity.name
            )));
        }
        Ok(token.clone())
    }
}
