// SPDX-License-Identifier: Apache-2.0

//! Ordered chain of vault implementations.

use std::sync::Arc;

use crate::engine::error::EngineResult;
use crate::observability::Sensitive;
use crate::vault::backend::Vault;

/// Queries each registered vault in registration order; the first vault
/// holding a reference wins.
#[derive(Clone, Default)]
pub struct VaultChain {
    vaults: Vec<Arc<dyn Vault>>,
}

impl VaultChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, vault: Arc<dyn Vault>) {
        self.vaults.push(vault);
    }

    pub fn with(mut self, vault: Arc<dyn Vault>) -> Self {
        self.register(vault);
        self
    }

    /// Names of the registered vaults, in query order
    pub fn names(&self) -> Vec<&str> {
        self.vaults.iter().map(|v| v.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.vaults.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vaults.is_empty()
    }
}

impl Vault for VaultChain {
    fn name(&self) -> &str {
        "chain"
    }

    fn get_value(&self, reference: &str) -> EngineResult<Option<Sensitive<String>>> {
        for vault in &self.vaults {
            if let Some(value) = vault.get_value(reference)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}
