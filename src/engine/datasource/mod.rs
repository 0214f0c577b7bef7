// SPDX-License-Identifier: Apache-2.0

//! Data source specifications and their canonical keys
//!
//! A `DataSourceSpecification` is the vendor configuration as parsed from a
//! runtime definition. `resolve_key` normalizes it into a
//! `DataSourceSpecificationKey`: two specifications describing the same
//! physical endpoint always produce equal keys, which is what lets pools be
//! shared. Resolution is pure and fails fast on missing mandatory fields.

pub mod bigquery;
pub mod databricks;
pub mod local_h2;
pub mod redshift;
pub mod snowflake;
pub mod spanner;
pub mod static_spec;

use serde::{Deserialize, Serialize};

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::DatabaseType;

pub use bigquery::{BigQueryKey, BigQuerySpecification};
pub use databricks::{DatabricksKey, DatabricksSpecification};
pub use local_h2::{LocalH2Key, LocalH2Specification};
pub use redshift::{RedshiftKey, RedshiftSpecification};
pub use snowflake::{SnowflakeAccountType, SnowflakeKey, SnowflakeSpecification};
pub use spanner::{SpannerKey, SpannerSpecification};
pub use static_spec::{StaticKey, StaticSpecification};

/// Vendor configuration, as supplied by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DataSourceSpecification {
    Snowflake(SnowflakeSpecification),
    BigQuery(BigQuerySpecification),
    Redshift(RedshiftSpecification),
    Spanner(SpannerSpecification),
    Databricks(DatabricksSpecification),
    Static(StaticSpecification),
    LocalH2(LocalH2Specification),
}

impl DataSourceSpecification {
    pub fn database_type(&self) -> DatabaseType {
        match self {
            DataSourceSpecification::Snowflake(_) => DatabaseType::Snowflake,
            DataSourceSpecification::BigQuery(_) => DatabaseType::BigQuery,
            DataSourceSpecification::Redshift(_) => DatabaseType::Redshift,
            DataSourceSpecification::Spanner(_) => DatabaseType::Spanner,
            DataSourceSpecification::Databricks(_) => DatabaseType::Databricks,
            DataSourceSpecification::Static(spec) => spec.database_type,
            DataSourceSpecification::LocalH2(_) => DatabaseType::H2,
        }
    }
}

/// Canonical, hashable identity of a physical endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type")]
pub enum DataSourceSpecificationKey {
    Snowflake(SnowflakeKey),
    BigQuery(BigQueryKey),
    Redshift(RedshiftKey),
    Spanner(SpannerKey),
    Databricks(DatabricksKey),
    Static(StaticKey),
    LocalH2(LocalH2Key),
}

impl DataSourceSpecificationKey {
    pub fn database_type(&self) -> DatabaseType {
        match self {
            DataSourceSpecificationKey::Snowflake(_) => DatabaseType::Snowflake,
            DataSourceSpecificationKey::BigQuery(_) => DatabaseType::BigQuery,
            DataSourceSpecificationKey::Redshift(_) => DatabaseType::Redshift,
            DataSourceSpecificationKey::Spanner(_) => DatabaseType::Spanner,
            DataSourceSpecificationKey::Databricks(_) => DatabaseType::Databricks,
            DataSourceSpecificationKey::Static(key) => key.database_type,
            DataSourceSpecificationKey::LocalH2(_) => DatabaseType::H2,
        }
    }

    /// Short human-readable identifier used in pool names and logs
    pub fn short_id(&self) -> String {
        match self {
            DataSourceSpecificationKey::Snowflake(key) => key.short_id(),
            DataSourceSpecificationKey::BigQuery(key) => key.short_id(),
            DataSourceSpecificationKey::Redshift(key) => key.short_id(),
            DataSourceSpecificationKey::Spanner(key) => key.short_id(),
            DataSourceSpecificationKey::Databricks(key) => key.short_id(),
            DataSourceSpecificationKey::Static(key) => key.short_id(),
            DataSourceSpecificationKey::LocalH2(key) => key.short_id(),
        }
    }
}

/// Normalizes a vendor configuration into its canonical key.
pub fn resolve_key(spec: &DataSourceSpecification) -> EngineResult<DataSourceSpecificationKey> {
    Ok(match spec {
        DataSourceSpecification::Snowflake(s) => DataSourceSpecificationKey::Snowflake(s.resolve()?),
        DataSourceSpecification::BigQuery(s) => DataSourceSpecificationKey::BigQuery(s.resolve()?),
        DataSourceSpecification::Redshift(s) => DataSourceSpecificationKey::Redshift(s.resolve()?),
        DataSourceSpecification::Spanner(s) => DataSourceSpecificationKey::Spanner(s.resolve()?),
        DataSourceSpecification::Databricks(s) => {
            DataSourceSpecificationKey::Databricks(s.resolve()?)
        }
        DataSourceSpecification::Static(s) => DataSourceSpecificationKey::Static(s.resolve()?),
        DataSourceSpecification::LocalH2(s) => DataSourceSpecificationKey::LocalH2(s.resolve()),
    })
}

/// Trimmed mandatory field; blank counts as missing.
pub(crate) fn required(vendor: DatabaseType, field: &str, value: &Option<String>) -> EngineResult<String> {
    optional(value).ok_or_else(|| {
        EngineError::configuration(format!(
            "{} data source specification is missing mandatory field '{}'",
            vendor, field
        ))
    })
}

/// Trimmed optional field; blank collapses to `None`.
pub(crate) fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Proxy host/port pair; a port without a host is rejected.
pub(crate) fn proxy(
    vendor: DatabaseType,
    host: &Option<String>,
    port: Option<u16>,
) -> EngineResult<Option<(String, Option<u16>)>> {
    match (optional(host), port) {
        (Some(host), port) => Ok(Some((host.to_ascii_lowercase(), port))),
        (None, Some(_)) => Err(EngineError::configuration(format!(
            "{} data source specification sets a proxy port without a proxy host",
            vendor
        ))),
        (None, None) => Ok(None),
    }
}
