// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;

use crate::engine::auth::credential::Credential;
use crate::engine::auth::flow::{CredentialRequest, DatabaseAuthenticationFlow};
use crate::engine::auth::strategy::StrategyKind;
use crate::engine::error::EngineResult;
use crate::engine::types::{DatabaseType, RuntimeContext};

/// Embedded H2 stores authenticate with the built-in default user.
pub struct H2Flow {
    kind: StrategyKind,
}

impl H2Flow {
    pub fn default_h2() -> Self {
        Self {
            kind: StrategyKind::DefaultH2,
        }
    }

    pub fn test_database() -> Self {
        Self {
            kind: StrategyKind::TestDatabase,
        }
    }
}

#[async_trait]
impl DatabaseAuthenticationFlow for H2Flow {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::H2
    }

    fn strategy_kind(&self) -> StrategyKind {
        self.kind
    }

    async fn make_credential_with_context(
        &self,
        _request: CredentialRequest<'_>,
        _runtime_context: &RuntimeContext,
    ) -> EngineResult<Credential> {
        Ok(Credential::None)
    }
}
