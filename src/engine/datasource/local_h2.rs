// SPDX-License-Identifier: Apache-2.0

//! Embedded H2 store seeded from setup statements
//!
//! Two local stores with identical setup statements are the same store.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalH2Specification {
    #[serde(default)]
    pub setup_sql: Vec<String>,
}

impl LocalH2Specification {
    pub fn resolve(&self) -> LocalH2Key {
        LocalH2Key {
            setup_sql: self
                .setup_sql
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalH2Key {
    pub setup_sql: Vec<String>,
}

impl LocalH2Key {
    /// Stable digest of the setup statements
    pub fn fingerprint(&self) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, self.setup_sql.join(";\n").as_bytes())
    }

    pub fn short_id(&self) -> String {
        format!("LocalH2_{}", self.fingerprint().simple())
    }

    pub fn jdbc_url(&self) -> String {
        format!("jdbc:h2:mem:{};DB_CLOSE_DELAY=-1", self.fingerprint().simple())
    }
}
