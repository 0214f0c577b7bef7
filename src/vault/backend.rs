// SPDX-License-Identifier: Apache-2.0

use keyring::Entry;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::engine::error::{EngineError, EngineResult};
use crate::observability::Sensitive;

/// Read-only secret store resolving vault references to values.
///
/// Reads are synchronous and must be free of side effects; callers may cache
/// results but nothing here relies on it.
pub trait Vault: Send + Sync {
    /// Short name used in logs and error messages
    fn name(&self) -> &str;

    /// Resolves `reference`, returning `None` when the vault does not hold it.
    fn get_value(&self, reference: &str) -> EngineResult<Option<Sensitive<String>>>;

    fn has_value(&self, reference: &str) -> bool {
        matches!(self.get_value(reference), Ok(Some(_)))
    }
}

/// Production implementation backed by the OS keychain.
///
/// The vault reference is used as the keychain account name under a fixed
/// service.
pub struct KeyringVault {
    service: String,
}

impl KeyringVault {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }
}

impl Vault for KeyringVault {
    fn name(&self) -> &str {
        "keyring"
    }

    fn get_value(&self, reference: &str) -> EngineResult<Option<Sensitive<String>>> {
        let entry = Entry::new(&self.service, reference)
            .map_err(|e| EngineError::vault(format!("Keyring error for '{}': {}", reference, e)))?;
        match entry.get_password() {
            Ok(value) => Ok(Some(Sensitive::new(value))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(EngineError::vault(format!(
                "Failed to read '{}' from keyring: {}",
                reference, e
            ))),
        }
    }
}

/// Resolves references from process environment variables.
///
/// `file::ref1` with prefix `DATAGATE_VAULT` maps to `DATAGATE_VAULT_FILE__REF1`.
pub struct EnvironmentVault {
    prefix: String,
}

impl EnvironmentVault {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn variable_name(&self, reference: &str) -> String {
        let suffix: String = reference
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        if self.prefix.is_empty() {
            suffix
        } else {
            format!("{}_{}", self.prefix, suffix)
        }
    }
}

impl Vault for EnvironmentVault {
    fn name(&self) -> &str {
        "environment"
    }

    fn get_value(&self, reference: &str) -> EngineResult<Option<Sensitive<String>>> {
        Ok(std::env::var(self.variable_name(reference))
            .ok()
            .map(Sensitive::new))
    }
}

/// In-memory vault for tests and embedded deployments.
///
/// Every lookup is recorded so tests can assert which references were read
/// and in what order.
#[derive(Clone, Default)]
pub struct InMemoryVault {
    values: Arc<Mutex<HashMap<String, String>>>,
    reads: Arc<Mutex<Vec<String>>>,
}

impl InMemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(self, reference: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(reference, value);
        self
    }

    pub fn insert(&self, reference: impl Into<String>, value: impl Into<String>) {
        self.values.lock().insert(reference.into(), value.into());
    }

    pub fn remove(&self, reference: &str) {
        self.values.lock().remove(reference);
    }

    /// References looked up so far, oldest first
    pub fn reads(&self) -> Vec<String> {
        self.reads.lock().clone()
    }
}

impl Vault for InMemoryVault {
    fn name(&self) -> &str {
        "memory"
    }

    fn get_value(&self, reference: &str) -> EngineResult<Option<Sensitive<String>>> {
        self.reads.lock().push(reference.to_string());
        Ok(self.values.lock().get(reference).cloned().map(Sensitive::new))
    }
}
