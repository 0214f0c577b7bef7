// SPDX-License-Identifier: Apache-2.0

//! Core domain types shared by the resolution layer

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::engine::error::EngineError;

// ==================== Vendors ====================

/// Closed set of supported store vendors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DatabaseType {
    Snowflake,
    BigQuery,
    Redshift,
    Spanner,
    Databricks,
    Postgres,
    SqlServer,
    H2,
}

impl DatabaseType {
    pub const ALL: [DatabaseType; 8] = [
        DatabaseType::Snowflake,
        DatabaseType::BigQuery,
        DatabaseType::Redshift,
        DatabaseType::Spanner,
        DatabaseType::Databricks,
        DatabaseType::Postgres,
        DatabaseType::SqlServer,
        DatabaseType::H2,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseType::Snowflake => "Snowflake",
            DatabaseType::BigQuery => "BigQuery",
            DatabaseType::Redshift => "Redshift",
            DatabaseType::Spanner => "Spanner",
            DatabaseType::Databricks => "Databricks",
            DatabaseType::Postgres => "Postgres",
            DatabaseType::SqlServer => "SqlServer",
            DatabaseType::H2 => "H2",
        }
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "snowflake" => Ok(DatabaseType::Snowflake),
            "bigquery" => Ok(DatabaseType::BigQuery),
            "redshift" => Ok(DatabaseType::Redshift),
            "spanner" => Ok(DatabaseType::Spanner),
            "databricks" | "deltalake" => Ok(DatabaseType::Databricks),
            "postgres" | "postgresql" => Ok(DatabaseType::Postgres),
            "sqlserver" | "mssql" => Ok(DatabaseType::SqlServer),
            "h2" => Ok(DatabaseType::H2),
            _ => Err(EngineError::configuration(format!(
                "Unknown database type '{}'",
                s
            ))),
        }
    }
}

// ==================== Runtime Context ====================

/// Caller-supplied key/value map handed to credential flows.
///
/// Delegated flows read the calling service from the `context` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeContext {
    values: BTreeMap<String, String>,
}

impl RuntimeContext {
    pub const CONTEXT_KEY: &'static str = "context";

    pub fn empty() -> Self {
        Self::default()
    }

    /// Context carrying only the calling service name
    pub fn for_service(service: impl Into<String>) -> Self {
        Self::empty().with(Self::CONTEXT_KEY, service)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// The calling service, if any
    pub fn context(&self) -> Option<&str> {
        self.get(Self::CONTEXT_KEY)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

impl<K, V> FromIterator<(K, V)> for RuntimeContext
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_type_parses_aliases() {
        assert_eq!("DeltaLake".parse::<DatabaseType>().unwrap(), DatabaseType::Databricks);
        assert_eq!(" postgresql ".parse::<DatabaseType>().unwrap(), DatabaseType::Postgres);
        assert!(matches!(
            "oracle".parse::<DatabaseType>(),
            Err(EngineError::Configuration { .. })
        ));
        for db in DatabaseType::ALL {
            assert_eq!(db.as_str().parse::<DatabaseType>().unwrap(), db);
        }
    }

    #[test]
    fn runtime_context_exposes_calling_service() {
        let ctx = RuntimeContext::for_service("service1");
        assert_eq!(ctx.context(), Some("service1"));
        assert!(!ctx.is_empty());

        let ctx: RuntimeContext = [("team", "risk")].into_iter().collect();
        assert_eq!(ctx.context(), None);
        assert_eq!(ctx.get("team"), Some("risk"));
        assert!(RuntimeContext::empty().is_empty());
    }
}
