// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

use crate::engine::auth::credential::Credential;
use crate::engine::auth::flow::{strategy_mismatch, CredentialRequest, DatabaseAuthenticationFlow};
use crate::engine::auth::flows::read_secret;
use crate::engine::auth::strategy::{AuthenticationStrategy, StrategyKind};
use crate::engine::error::EngineResult;
use crate::engine::types::{DatabaseType, RuntimeContext};
use crate::vault::Vault;

/// Reads a user name and password from the vault.
///
/// Both references are prefixed with the optional base reference.
pub struct UserNamePasswordFlow {
    database_type: DatabaseType,
    vault: Arc<dyn Vault>,
}

impl UserNamePasswordFlow {
    pub fn new(database_type: DatabaseType, vault: Arc<dyn Vault>) -> Self {
        Self {
            database_type,
            vault,
        }
    }
}

#[async_trait]
impl DatabaseAuthenticationFlow for UserNamePasswordFlow {
    fn database_type(&self) -> DatabaseType {
        self.database_type
    }

    fn strategy_kind(&self) -> StrategyKind {
        StrategyKind::UserNamePassword
    }

    #[instrument(skip_all, fields(vendor = %self.database_type))]
    async fn make_credential_with_context(
        &self,
        request: CredentialRequest<'_>,
        _runtime_context: &RuntimeContext,
    ) -> EngineResult<Credential> {
        let AuthenticationStrategy::UserNamePassword {
            base_vault_reference,
            user_name_vault_reference,
            password_vault_reference,
        } = request.strategy
        else {
            return Err(strategy_mismatch(self.strategy_kind(), request.strategy));
        };

        let base = base_vault_reference.as_deref().unwrap_or("");
        let user_ref = format!("{}{}", base, user_name_vault_reference);
        let password_ref = format!("{}{}", base, password_vault_reference);

        let user = read_secret(self.vault.as_ref(), &user_ref, "user name")?;
        let password = read_secret(self.vault.as_ref(), &password_ref, "password")?;

        Ok(Credential::UserPassword {
            user: user.into_inner(),
            password,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::auth::credential::Identity;
    use crate::engine::datasource::{DataSourceSpecificationKey, LocalH2Specification};
    use crate::engine::error::EngineError;
    use crate::vault::InMemoryVault;

    fn data_source() -> DataSourceSpecificationKey {
        DataSourceSpecificationKey::LocalH2(LocalH2Specification::default().resolve())
    }

    #[tokio::test]
    async fn reads_prefixed_references() {
        let vault = InMemoryVault::new()
            .with_value("prod.db.user", "svc_reader")
            .with_value("prod.db.password", "s3cret");
        let flow = UserNamePasswordFlow::new(DatabaseType::Postgres, Arc::new(vault));
        let strategy = AuthenticationStrategy::user_name_password(Some("prod."), "db.user", "db.password");
        let identity = Identity::new("alice");
        let ds = data_source();

        let credential = flow
            .make_credential(CredentialRequest::new(&identity, &ds, &strategy))
            .await
            .unwrap();
        match credential {
            Credential::UserPassword { user, password } => {
                assert_eq!(user, "svc_reader");
                assert_eq!(password.expose(), "s3cret");
            }
            other => panic!("unexpected credential: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_password_names_the_reference() {
        let vault = InMemoryVault::new().with_value("db.user", "svc_reader");
        let flow = UserNamePasswordFlow::new(DatabaseType::Postgres, Arc::new(vault));
        let strategy = AuthenticationStrategy::user_name_password(None, "db.user", "db.password");
        let identity = Identity::new("alice");
        let ds = data_source();

        let err = flow
            .make_credential(CredentialRequest::new(&identity, &ds, &strategy))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::credential_acquisition(
                "Failed to locate password using vault reference 'db.password'"
            )
        );
    }
}
