// SPDX-License-Identifier: Apache-2.0

//! Flow Registry
//!
//! Central table of credential flows keyed by (vendor, strategy kind),
//! populated once at startup.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::engine::auth::credential::Credential;
use crate::engine::auth::flow::{CredentialRequest, DatabaseAuthenticationFlow};
use crate::engine::auth::flows::{
    DelegatedKerberosFlow, GcpApplicationDefaultFlow, H2Flow, MiddleTierKeytabFlow, OAuthFlow,
    SnowflakePublicFlow, UserNamePasswordFlow,
};
use crate::engine::auth::kerberos::KerberosLogin;
use crate::engine::auth::strategy::StrategyKind;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::{DatabaseType, RuntimeContext};
use crate::metrics;
use crate::vault::Vault;

pub struct FlowRegistry {
    flows: HashMap<(DatabaseType, StrategyKind), Arc<dyn DatabaseAuthenticationFlow>>,
}

impl FlowRegistry {
    pub fn new() -> Self {
        Self {
            flows: HashMap::new(),
        }
    }

    /// Registry with every flow this crate ships
    pub fn default_flows(vault: Arc<dyn Vault>, kerberos_login: Arc<dyn KerberosLogin>) -> Self {
        let mut registry = Self::new();

        registry.register(Arc::new(H2Flow::default_h2()));
        registry.register(Arc::new(H2Flow::test_database()));

        for db in [
            DatabaseType::Postgres,
            DatabaseType::SqlServer,
            DatabaseType::Redshift,
            DatabaseType::Snowflake,
            DatabaseType::Databricks,
        ] {
            registry.register(Arc::new(UserNamePasswordFlow::new(db, Arc::clone(&vault))));
        }

        for db in [DatabaseType::Postgres, DatabaseType::SqlServer] {
            registry.register(Arc::new(DelegatedKerberosFlow::new(db)));
            registry.register(Arc::new(MiddleTierKeytabFlow::new(
                db,
                Arc::clone(&vault),
                Arc::clone(&kerberos_login),
            )));
        }

        registry.register(Arc::new(SnowflakePublicFlow::new(Arc::clone(&vault))));
        registry.register(Arc::new(OAuthFlow::new(DatabaseType::Databricks)));
        registry.register(Arc::new(OAuthFlow::new(DatabaseType::BigQuery)));
        registry.register(Arc::new(GcpApplicationDefaultFlow::new(DatabaseType::BigQuery)));
        registry.register(Arc::new(GcpApplicationDefaultFlow::new(DatabaseType::Spanner)));

        registry
    }

    /// Registers a flow, replacing any flow for the same pair
    pub fn register(&mut self, flow: Arc<dyn DatabaseAuthenticationFlow>) {
        let key = (flow.database_type(), flow.strategy_kind());
        self.flows.insert(key, flow);
    }

    pub fn get(&self, vendor: DatabaseType, kind: StrategyKind) -> Option<Arc<dyn DatabaseAuthenticationFlow>> {
        self.flows.get(&(vendor, kind)).cloned()
    }

    pub fn resolve(&self, vendor: DatabaseType, kind: StrategyKind) -> EngineResult<Arc<dyn DatabaseAuthenticationFlow>> {
        self.get(vendor, kind)
            .ok_or_else(|| EngineError::unsupported_flow(vendor.as_str(), kind.as_str()))
    }

    /// Registered pairs, sorted
    pub fn list(&self) -> Vec<(DatabaseType, StrategyKind)> {
        let mut pairs: Vec<_> = self.flows.keys().copied().collect();
        pairs.sort();
        pairs
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Runs the flow's authorization checks without acquiring a credential
    pub async fn authorize(
        &self,
        request: CredentialRequest<'_>,
        runtime_context: Option<&RuntimeContext>,
    ) -> EngineResult<()> {
        let flow = self.resolve(request.data_source.database_type(), request.strategy.kind())?;
        flow.authorize(request, runtime_context).await
    }

    /// Mints a credential; `None` takes the context-less entry point.
    #[instrument(
        skip_all,
        fields(
            vendor = %request.data_source.database_type(),
            strategy = %request.strategy.kind(),
            identity = %request.identity.name,
        )
    )]
    pub async fn make_credential(
        &self,
        request: CredentialRequest<'_>,
        runtime_context: Option<&RuntimeContext>,
    ) -> EngineResult<Credential> {
        let flow = self.resolve(request.data_source.database_type(), request.strategy.kind())?;
        let result = match runtime_context {
            Some(ctx) => flow.make_credential_with_context(request, ctx).await,
            None => flow.make_credential(request).await,
        };
        metrics::record_credential(result.is_ok());
        if let Ok(credential) = &result {
            debug!(kind = credential.kind_name(), "Credential acquired");
        }
        result
    }
}

impl Default for FlowRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::auth::credential::Identity;
    use crate::engine::auth::kerberos::RecordingKerberosLogin;
    use crate::engine::auth::strategy::AuthenticationStrategy;
    use crate::engine::datasource::{DataSourceSpecificationKey, LocalH2Specification, StaticSpecification};
    use crate::engine::auth::flow::MISSING_CONTEXT_MESSAGE;
    use crate::vault::InMemoryVault;

    fn registry() -> FlowRegistry {
        FlowRegistry::default_flows(
            Arc::new(InMemoryVault::new()),
            Arc::new(RecordingKerberosLogin::new()),
        )
    }

    #[test]
    fn default_table_is_sorted_and_complete() {
        let registry = registry();
        let pairs = registry.list();
        assert_eq!(pairs.len(), registry.len());
        assert!(pairs.windows(2).all(|w| w[0] < w[1]));

        assert!(registry.get(DatabaseType::H2, StrategyKind::DefaultH2).is_some());
        assert!(registry.get(DatabaseType::Postgres, StrategyKind::MiddleTierKeytab).is_some());
        assert!(registry.get(DatabaseType::Snowflake, StrategyKind::SnowflakePublic).is_some());
        assert!(registry.get(DatabaseType::Spanner, StrategyKind::GcpApplicationDefault).is_some());
        assert!(registry.get(DatabaseType::H2, StrategyKind::OAuth).is_none());
    }

    #[test]
    fn unknown_pair_is_unsupported_flow() {
        let err = registry()
            .resolve(DatabaseType::Snowflake, StrategyKind::MiddleTierKeytab)
            .err()
            .unwrap();
        assert_eq!(
            err,
            EngineError::unsupported_flow("Snowflake", "MiddleTierKeytab")
        );
    }

    #[test]
    fn only_delegated_flows_require_context() {
        let registry = registry();
        for (db, kind) in registry.list() {
            let flow = registry.get(db, kind).unwrap();
            assert_eq!(
                flow.requires_runtime_context(),
                kind == StrategyKind::MiddleTierKeytab,
                "{db} x {kind}"
            );
        }
    }

    #[tokio::test]
    async fn context_less_request_dispatches_by_vendor_and_kind() {
        let registry = registry();
        let identity = Identity::new("user1");
        let h2 = DataSourceSpecificationKey::LocalH2(LocalH2Specification::default().resolve());
        let credential = registry
            .make_credential(
                CredentialRequest::new(&identity, &h2, &AuthenticationStrategy::DefaultH2),
                None,
            )
            .await
            .unwrap();
        assert_eq!(credential, Credential::None);

        let pg = DataSourceSpecificationKey::Static(
            StaticSpecification {
                database_type: DatabaseType::Postgres,
                host: Some("pg".into()),
                port: None,
                database_name: Some("db".into()),
            }
            .resolve()
            .unwrap(),
        );
        let strategy = AuthenticationStrategy::middle_tier_keytab("fred@EXAMPLE.COM", "file::ref1", "ref2");
        let err = registry
            .make_credential(CredentialRequest::new(&identity, &pg, &strategy), None)
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::unsupported_operation(MISSING_CONTEXT_MESSAGE));
    }
}
