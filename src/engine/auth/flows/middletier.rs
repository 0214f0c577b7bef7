// SPDX-License-Identifier: Apache-2.0

//! Middle-tier keytab delegation
//!
//! A trusted service authenticates with a shared keytab on behalf of end
//! users. Use of the keytab is gated by a metadata record stored separately
//! in the vault, which names the keytab it covers and the services allowed
//! to use it. Checks run in a fixed order:
//!
//! 1. the caller supplied a non-empty runtime context
//! 2. the metadata record exists
//! 3. the record covers the requested keytab reference
//! 4. the calling service is listed in the record
//!
//! Only then is the keytab itself read from the vault and used to log in.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::engine::auth::credential::Credential;
use crate::engine::auth::flow::{
    require_context, strategy_mismatch, CredentialRequest, DatabaseAuthenticationFlow,
};
use crate::engine::auth::flows::read_secret;
use crate::engine::auth::kerberos::{serialized_login, KerberosLogin};
use crate::engine::auth::strategy::{AuthenticationStrategy, StrategyKind};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::{DatabaseType, RuntimeContext};
use crate::metrics;
use crate::vault::{MiddletierKeytabMetadata, Vault};

struct KeytabRequest<'a> {
    principal: &'a str,
    keytab_vault_reference: &'a str,
    keytab_metadata_vault_reference: &'a str,
}

pub struct MiddleTierKeytabFlow {
    database_type: DatabaseType,
    vault: Arc<dyn Vault>,
    login: Arc<dyn KerberosLogin>,
}

impl MiddleTierKeytabFlow {
    pub fn new(
        database_type: DatabaseType,
        vault: Arc<dyn Vault>,
        login: Arc<dyn KerberosLogin>,
    ) -> Self {
        Self {
            database_type,
            vault,
            login,
        }
    }

    fn keytab_request<'a>(&self, strategy: &'a AuthenticationStrategy) -> EngineResult<KeytabRequest<'a>> {
        match strategy {
            AuthenticationStrategy::MiddleTierKeytab {
                principal,
                keytab_vault_reference,
                keytab_metadata_vault_reference,
            } => Ok(KeytabRequest {
                principal,
                keytab_vault_reference,
                keytab_metadata_vault_reference,
            }),
            other => Err(strategy_mismatch(StrategyKind::MiddleTierKeytab, other)),
        }
    }

    /// Validates the metadata record against the request and calling service.
    fn check_metadata(&self, request: &KeytabRequest<'_>, runtime_context: &RuntimeContext) -> EngineResult<()> {
        let keytab_ref = request.keytab_vault_reference;
        let metadata_ref = request.keytab_metadata_vault_reference;

        let raw = self.vault.get_value(metadata_ref)?.ok_or_else(|| {
            deny(
                metadata_ref,
                format!(
                    "Failed to locate keytab metadata using vault reference '{}'",
                    metadata_ref
                ),
            )
        })?;

        let metadata = MiddletierKeytabMetadata::parse(metadata_ref, raw.expose())
            .inspect_err(|_| metrics::record_authorization_denied())?;

        if !metadata.authorizes_keytab(keytab_ref) {
            return Err(deny(
                keytab_ref,
                format!(
                    "Use of keytab with reference '{}' not authorized. Mismatch between keytab vault reference and its associated vault metadata",
                    keytab_ref
                ),
            ));
        }

        let service = runtime_context.context().unwrap_or_default();
        if !metadata.permits_service(service) {
            return Err(deny(
                keytab_ref,
                format!(
                    "Use of keytab with reference '{}' not authorized. Mismatch between runtime context and keytab metadata context",
                    keytab_ref
                ),
            ));
        }
        Ok(())
    }
}

fn deny(vault_reference: &str, message: String) -> EngineError {
    warn!(vault_reference = %vault_reference, "{}", message);
    metrics::record_authorization_denied();
    EngineError::authorization(message)
}

#[async_trait]
impl DatabaseAuthenticationFlow for MiddleTierKeytabFlow {
    fn database_type(&self) -> DatabaseType {
        self.database_type
    }

    fn strategy_kind(&self) -> StrategyKind {
        StrategyKind::MiddleTierKeytab
    }

    fn requires_runtime_context(&self) -> bool {
        true
    }

    async fn authorize(
        &self,
        request: CredentialRequest<'_>,
        runtime_context: Option<&RuntimeContext>,
    ) -> EngineResult<()> {
        let ctx = require_context(runtime_context)?;
        let keytab = self.keytab_request(request.strategy)?;
        self.check_metadata(&keytab, ctx)
    }

    #[instrument(
        skip_all,
        fields(
            vendor = %self.database_type,
            identity = %request.identity.name,
        )
    )]
    async fn make_credential_with_context(
        &self,
        request: CredentialRequest<'_>,
        runtime_context: &RuntimeContext,
    ) -> EngineResult<Credential> {
        let ctx = require_context(Some(runtime_context))?;
        let keytab = self.keytab_request(request.strategy)?;
        self.check_metadata(&keytab, ctx)?;

        let keytab_path = read_secret(self.vault.as_ref(), keytab.keytab_vault_reference, "keytab")?;
        let keytab_path = PathBuf::from(keytab_path.into_inner());
        let principal = keytab.principal.to_string();
        let login = Arc::clone(&self.login);

        let context = tokio::task::spawn_blocking(move || {
            serialized_login(login.as_ref(), &principal, &keytab_path)
        })
        .await
        .map_err(|e| EngineError::internal(format!("Kerberos login task failed: {}", e)))??;

        info!(
            principal = %context.principal,
            keytab_vault_reference = %keytab.keytab_vault_reference,
            "Issued middle-tier Kerberos credential"
        );
        Ok(Credential::KerberosPrincipal(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::auth::credential::Identity;
    use crate::engine::auth::flow::{EMPTY_CONTEXT_MESSAGE, MISSING_CONTEXT_MESSAGE};
    use crate::engine::auth::kerberos::RecordingKerberosLogin;
    use crate::engine::datasource::{DataSourceSpecificationKey, LocalH2Specification};
    use crate::vault::InMemoryVault;

    const METADATA: &str = r#"{"keytabVaultReference":"file::ref1","services":["service1"]}"#;

    fn flow(vault: &InMemoryVault, login: &RecordingKerberosLogin) -> MiddleTierKeytabFlow {
        MiddleTierKeytabFlow::new(
            DatabaseType::Postgres,
            Arc::new(vault.clone()),
            Arc::new(login.clone()),
        )
    }

    fn ds() -> DataSourceSpecificationKey {
        DataSourceSpecificationKey::LocalH2(LocalH2Specification::default().resolve())
    }

    #[tokio::test]
    async fn without_context_is_unsupported() {
        let vault = InMemoryVault::new();
        let flow = flow(&vault, &RecordingKerberosLogin::new());
        let strategy = AuthenticationStrategy::middle_tier_keytab("fred@EXAMPLE.COM", "file::ref1", "ref2");
        let identity = Identity::new("fred");
        let ds = ds();
        let request = CredentialRequest::new(&identity, &ds, &strategy);

        let absent = flow.make_credential(request).await.unwrap_err();
        assert_eq!(absent, EngineError::unsupported_operation(MISSING_CONTEXT_MESSAGE));

        let empty = flow
            .make_credential_with_context(request, &RuntimeContext::empty())
            .await
            .unwrap_err();
        assert_eq!(empty, EngineError::unsupported_operation(EMPTY_CONTEXT_MESSAGE));
        assert!(vault.reads().is_empty());
    }

    #[tokio::test]
    async fn missing_metadata_fails_before_reading_keytab() {
        let vault = InMemoryVault::new().with_value("file::ref1", "fred.kt");
        let login = RecordingKerberosLogin::new();
        let flow = flow(&vault, &login);
        let strategy = AuthenticationStrategy::middle_tier_keytab("fred@EXAMPLE.COM", "file::ref1", "ref2");
        let identity = Identity::new("fred");
        let ds = ds();

        let err = flow
            .make_credential_with_context(
                CredentialRequest::new(&identity, &ds, &strategy),
                &RuntimeContext::for_service("service1"),
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::authorization("Failed to locate keytab metadata using vault reference 'ref2'")
        );
        assert_eq!(vault.reads(), vec!["ref2"]);
        assert!(login.logins().is_empty());
    }

    #[tokio::test]
    async fn reference_mismatch_wins_over_authorized_context() {
        let vault = InMemoryVault::new()
            .with_value("file::ref1", "fred.kt")
            .with_value("file::ref3", "other.kt")
            .with_value("ref2", METADATA);
        let flow = flow(&vault, &RecordingKerberosLogin::new());
        let strategy = AuthenticationStrategy::middle_tier_keytab("fred@EXAMPLE.COM", "file::ref3", "ref2");
        let identity = Identity::new("fred");
        let ds = ds();

        let err = flow
            .make_credential_with_context(
                CredentialRequest::new(&identity, &ds, &strategy),
                &RuntimeContext::for_service("service1"),
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::authorization(
                "Use of keytab with reference 'file::ref3' not authorized. Mismatch between keytab vault reference and its associated vault metadata"
            )
        );
        assert!(!vault.reads().contains(&"file::ref3".to_string()));
    }

    #[tokio::test]
    async fn unlisted_service_is_refused() {
        let vault = InMemoryVault::new()
            .with_value("file::ref1", "fred.kt")
            .with_value("ref2", METADATA);
        let flow = flow(&vault, &RecordingKerberosLogin::new());
        let strategy = AuthenticationStrategy::middle_tier_keytab("fred@EXAMPLE.COM", "file::ref1", "ref2");
        let identity = Identity::new("fred");
        let ds = ds();
        let request = CredentialRequest::new(&identity, &ds, &strategy);

        let expected = EngineError::authorization(
            "Use of keytab with reference 'file::ref1' not authorized. Mismatch between runtime context and keytab metadata context",
        );
        let err = flow
            .make_credential_with_context(request, &RuntimeContext::for_service("service2"))
            .await
            .unwrap_err();
        assert_eq!(err, expected);

        let ctx = RuntimeContext::empty().with("team", "risk");
        let err = flow.authorize(request, Some(&ctx)).await.unwrap_err();
        assert_eq!(err, expected);
    }

    #[tokio::test]
    async fn authorized_service_gets_principal_credential() {
        let vault = InMemoryVault::new()
            .with_value("file::ref1", "fred.kt")
            .with_value("ref2", METADATA);
        let login = RecordingKerberosLogin::new();
        let flow = flow(&vault, &login);
        let strategy = AuthenticationStrategy::middle_tier_keytab("fred@EXAMPLE.COM", "file::ref1", "ref2");
        let identity = Identity::new("fred");
        let ds = ds();

        let credential = flow
            .make_credential_with_context(
                CredentialRequest::new(&identity, &ds, &strategy),
                &RuntimeContext::for_service("service1"),
            )
            .await
            .unwrap();
        match credential {
            Credential::KerberosPrincipal(ctx) => {
                assert_eq!(ctx.principal, "fred@EXAMPLE.COM");
                assert_eq!(ctx.short_name, "fred");
            }
            other => panic!("unexpected credential: {other:?}"),
        }
        assert_eq!(vault.reads(), vec!["ref2", "file::ref1"]);
        assert_eq!(login.logins(), vec!["fred@EXAMPLE.COM"]);
    }
}
