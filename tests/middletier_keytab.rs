// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use datagate_lib::config::RuntimeConfig;
use datagate_lib::engine::auth::{
    AuthenticationStrategy, Credential, Identity, KeytabFileLogin, RecordingKerberosLogin,
};
use datagate_lib::engine::mock::MockConnectionFactory;
use datagate_lib::engine::{
    DataSourceSpecification, DatabaseType, EngineError, FactoryRegistry, RuntimeContext,
};
use datagate_lib::vault::{FileVault, MiddletierKeytabMetadata, Vault, VaultChain, InMemoryVault};
use datagate_lib::AppState;

fn postgres() -> DataSourceSpecification {
    serde_json::from_value(serde_json::json!({
        "type": "Static",
        "databaseType": "Postgres",
        "host": "pg.example.com",
        "port": 5432,
        "databaseName": "sales"
    }))
    .unwrap()
}

fn strategy() -> AuthenticationStrategy {
    AuthenticationStrategy::middle_tier_keytab("fred@EXAMPLE.COM", "file::ref1", "ref2")
}

fn app(vault: Arc<dyn Vault>, login: Arc<dyn datagate_lib::engine::auth::KerberosLogin>) -> (AppState, Arc<MockConnectionFactory>) {
    let factory = Arc::new(MockConnectionFactory::new(DatabaseType::Postgres));
    let mut factories = FactoryRegistry::new();
    factories.register(factory.clone());
    let state = AppState::new(RuntimeConfig::default(), vault, factories, login).unwrap();
    (state, factory)
}

#[tokio::test]
async fn keytab_from_file_vault_issues_principal_credential() {
    let dir = tempfile::tempdir().unwrap();
    let keytab = dir.path().join("fred.kt");
    fs::write(&keytab, b"\x05\x02keytab-bytes").unwrap();

    let metadata = MiddletierKeytabMetadata::new("file::ref1", ["service1"]);
    let document = serde_json::json!({
        "file::ref1": keytab.to_string_lossy(),
        "ref2": metadata.to_json().unwrap(),
    });
    fs::write(dir.path().join("vault.json"), document.to_string()).unwrap();

    let vault = VaultChain::new()
        .with(Arc::new(InMemoryVault::new()))
        .with(Arc::new(FileVault::in_directory(dir.path())));
    let (state, factory) = app(Arc::new(vault), Arc::new(KeytabFileLogin));

    let connection = state
        .provider
        .connect(
            &Identity::new("fred"),
            &postgres(),
            &strategy(),
            Some(&RuntimeContext::for_service("service1")),
        )
        .await
        .unwrap();

    match connection.credential() {
        Credential::KerberosPrincipal(ctx) => {
            assert_eq!(ctx.principal, "fred@EXAMPLE.COM");
            assert_eq!(ctx.short_name, "fred");
        }
        other => panic!("unexpected credential {other:?}"),
    }
    assert_eq!(factory.credentials_seen(), vec!["KerberosPrincipal"]);
}

#[tokio::test]
async fn metadata_keytab_ref_alias_is_accepted() {
    let vault = InMemoryVault::new()
        .with_value("file::ref1", "fred.kt")
        .with_value("ref2", r#"{"keytabRef": "file::ref1", "services": ["service1"]}"#);
    let login = RecordingKerberosLogin::new();
    let (state, _) = app(Arc::new(vault), Arc::new(login.clone()));

    state
        .provider
        .connect(
            &Identity::new("fred"),
            &postgres(),
            &strategy(),
            Some(&RuntimeContext::for_service("service1")),
        )
        .await
        .unwrap();
    assert_eq!(login.logins(), vec!["fred@EXAMPLE.COM"]);
}

#[tokio::test]
async fn authorization_is_rechecked_for_existing_pools() {
    let vault = InMemoryVault::new()
        .with_value("file::ref1", "fred.kt")
        .with_value("ref2", r#"{"keytabVaultReference": "file::ref1", "services": ["service1"]}"#);
    let login = RecordingKerberosLogin::new();
    let (state, _) = app(Arc::new(vault.clone()), Arc::new(login.clone()));
    let identity = Identity::new("fred");

    state
        .provider
        .connect(&identity, &postgres(), &strategy(), Some(&RuntimeContext::for_service("service1")))
        .await
        .unwrap()
        .release();

    let err = state
        .provider
        .connect(&identity, &postgres(), &strategy(), Some(&RuntimeContext::for_service("service2")))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::authorization(
            "Use of keytab with reference 'file::ref1' not authorized. Mismatch between runtime context and keytab metadata context"
        )
    );

    let err = state
        .provider
        .connect(&identity, &postgres(), &strategy(), Some(&RuntimeContext::empty()))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnsupportedOperation { .. }));

    // one login, one pool: the refused calls never reached the keytab
    assert_eq!(login.logins().len(), 1);
    assert_eq!(state.state_manager.size(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_logins_never_overlap() {
    let vault = InMemoryVault::new()
        .with_value("file::ref1", "fred.kt")
        .with_value("ref2", r#"{"keytabVaultReference": "file::ref1", "services": ["service1"]}"#);
    let login = RecordingKerberosLogin::new().holding_for(Duration::from_millis(20));
    let (state, _) = app(Arc::new(vault), Arc::new(login.clone()));
    let state = Arc::new(state);

    // distinct identities force one pool, and so one login, each
    let mut handles = Vec::new();
    for i in 0..8 {
        let state = Arc::clone(&state);
        handles.push(tokio::spawn(async move {
            let identity = Identity::new(format!("user{i}"));
            state
                .provider
                .connect(&identity, &postgres(), &strategy(), Some(&RuntimeContext::for_service("service1")))
                .await
                .map(|connection| connection.release())
        }));
    }
    for result in futures::future::join_all(handles).await {
        result.unwrap().unwrap();
    }

    assert_eq!(login.logins().len(), 8);
    assert_eq!(login.overlaps(), 0);
    assert_eq!(state.state_manager.size(), 8);
}
