// SPDX-License-Identifier: Apache-2.0

// Datagate - connection resolution and credential delegation
// Core library

pub mod config;
pub mod engine;
pub mod metrics;
pub mod observability;
pub mod vault;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use config::RuntimeConfig;
use engine::auth::{FlowRegistry, KerberosLogin, KeytabFileLogin};
use engine::{ConnectionProvider, ConnectionStateManager, EngineResult, FactoryRegistry};
use vault::{EnvironmentVault, FileVault, KeyringVault, Vault, VaultChain};

pub const VAULT_ENV_PREFIX: &str = "DATAGATE_SECRET";
pub const KEYRING_SERVICE: &str = "datagate";

pub struct AppState {
    pub config: RuntimeConfig,
    pub vault: Arc<dyn Vault>,
    pub flows: Arc<FlowRegistry>,
    pub factories: Arc<FactoryRegistry>,
    pub state_manager: Arc<ConnectionStateManager>,
    pub provider: ConnectionProvider,
}

impl AppState {
    pub fn new(
        config: RuntimeConfig,
        vault: Arc<dyn Vault>,
        factories: FactoryRegistry,
        kerberos_login: Arc<dyn KerberosLogin>,
    ) -> EngineResult<Self> {
        config.validate()?;

        let flows = Arc::new(FlowRegistry::default_flows(Arc::clone(&vault), kerberos_login));
        let factories = Arc::new(factories);
        let state_manager = Arc::new(ConnectionStateManager::new(config.pool_config()));
        let provider = ConnectionProvider::new(
            Arc::clone(&flows),
            Arc::clone(&factories),
            Arc::clone(&state_manager),
        );

        Ok(Self {
            config,
            vault,
            flows,
            factories,
            state_manager,
            provider,
        })
    }

    /// Environment, then `~/.config/datagate/vault.json`, then the OS keyring
    pub fn default_vault() -> VaultChain {
        let mut chain = VaultChain::new().with(Arc::new(EnvironmentVault::new(VAULT_ENV_PREFIX)));
        if let Some(mut dir) = dirs::config_dir() {
            dir.push("datagate");
            chain.register(Arc::new(FileVault::in_directory(&dir)));
        }
        chain.with(Arc::new(KeyringVault::new(KEYRING_SERVICE)))
    }

    /// Default vault chain and keytab login, configured from the environment
    pub fn from_env(factories: FactoryRegistry) -> EngineResult<Self> {
        Self::new(
            RuntimeConfig::from_env()?,
            Arc::new(Self::default_vault()),
            factories,
            Arc::new(KeytabFileLogin),
        )
    }

    pub fn spawn_housekeeper(&self, cancel: CancellationToken) -> JoinHandle<()> {
        self.state_manager.spawn_housekeeper(
            self.config.housekeeping_interval(),
            self.config.evict_after(),
            cancel,
        )
    }

    pub async fn shutdown(&self) {
        self.state_manager.shutdown().await;
    }
}

/// Initializes logging and wires the subsystem; call from within a tokio runtime.
pub fn run(factories: FactoryRegistry, cancel: CancellationToken) -> EngineResult<(AppState, JoinHandle<()>)> {
    let state = AppState::from_env(factories)?;
    observability::init_tracing(&state.config.logging);
    let housekeeper = state.spawn_housekeeper(cancel);
    tracing::info!(
        flows = state.flows.len(),
        factories = state.factories.len(),
        "Datagate initialized"
    );
    Ok((state, housekeeper))
}
