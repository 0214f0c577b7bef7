// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::engine::error::{EngineError, EngineResult};

/// Authorization record stored in the vault next to a shared keytab.
///
/// Written by an administrator; this crate only reads it. The record names the
/// keytab it authorizes and the services allowed to use that keytab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiddletierKeytabMetadata {
    #[serde(alias = "keytabRef")]
    pub keytab_vault_reference: String,
    #[serde(alias = "securityContexts", default)]
    pub services: BTreeSet<String>,
}

impl MiddletierKeytabMetadata {
    pub fn new<I, S>(keytab_vault_reference: impl Into<String>, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keytab_vault_reference: keytab_vault_reference.into(),
            services: services.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses the JSON document held under `metadata_reference`.
    pub fn parse(metadata_reference: &str, json: &str) -> EngineResult<Self> {
        serde_json::from_str(json).map_err(|e| {
            EngineError::authorization(format!(
                "Failed to parse keytab metadata with vault reference '{}': {}",
                metadata_reference, e
            ))
        })
    }

    pub fn authorizes_keytab(&self, keytab_vault_reference: &str) -> bool {
        self.keytab_vault_reference == keytab_vault_reference
    }

    pub fn permits_service(&self, service: &str) -> bool {
        self.services.contains(service)
    }

    pub fn to_json(&self) -> EngineResult<String> {
        serde_json::to_string(self)
            .map_err(|e| EngineError::internal(format!("Serialization error: {}", e)))
    }
}
