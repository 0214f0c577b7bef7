// SPDX-License-Identifier: Apache-2.0

//! File Vault
//!
//! Reads vault references from a local JSON document of the form
//! `{ "reference": "value", ... }`. The file is read on every lookup so that
//! administrators can rotate values without restarting the process.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::error::{EngineError, EngineResult};
use crate::observability::Sensitive;
use crate::vault::backend::Vault;

const DEFAULT_VAULT_FILE: &str = "vault.json";

pub struct FileVault {
    path: PathBuf,
}

impl FileVault {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Uses `vault.json` inside `dir`
    pub fn in_directory(dir: &Path) -> Self {
        Self::new(dir.join(DEFAULT_VAULT_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> EngineResult<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            EngineError::vault(format!(
                "Failed to read vault file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            EngineError::vault(format!(
                "Failed to parse vault file {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

impl Vault for FileVault {
    fn name(&self) -> &str {
        "file"
    }

    fn get_value(&self, reference: &str) -> EngineResult<Option<Sensitive<String>>> {
        Ok(self.load()?.remove(reference).map(Sensitive::new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reads_values_from_json_document() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("vault.json"),
            r#"{"file::ref1": "fred.kt", "ref2": "{\"keytabVaultReference\":\"file::ref1\"}"}"#,
        )
        .unwrap();

        let vault = FileVault::in_directory(dir.path());
        assert_eq!(
            vault.get_value("file::ref1").unwrap().unwrap().expose(),
            "fred.kt"
        );
        assert!(vault.get_value("ref3").unwrap().is_none());
    }

    #[test]
    fn missing_file_is_an_empty_vault() {
        let dir = tempdir().unwrap();
        let vault = FileVault::in_directory(dir.path());
        assert!(!vault.has_value("ref1"));
    }

    #[test]
    fn malformed_file_is_a_vault_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("vault.json"), "not json").unwrap();

        let vault = FileVault::in_directory(dir.path());
        assert!(matches!(
            vault.get_value("ref1"),
            Err(EngineError::Vault { .. })
        ));
    }
}
