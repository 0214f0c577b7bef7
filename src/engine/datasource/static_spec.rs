// SPDX-License-Identifier: Apache-2.0

//! Classic host/port/database endpoints (Postgres, SQL Server)

use serde::{Deserialize, Serialize};

use crate::engine::datasource::required;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::DatabaseType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticSpecification {
    pub database_type: DatabaseType,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database_name: Option<String>,
}

impl StaticSpecification {
    fn default_port(database_type: DatabaseType) -> Option<u16> {
        match database_type {
            DatabaseType::Postgres => Some(5432),
            DatabaseType::SqlServer => Some(1433),
            _ => None,
        }
    }

    pub fn resolve(&self) -> EngineResult<StaticKey> {
        let vendor = self.database_type;
        let default_port = Self::default_port(vendor).ok_or_else(|| {
            EngineError::configuration(format!(
                "{} cannot be described by a static host/port specification",
                vendor
            ))
        })?;

        Ok(StaticKey {
            database_type: vendor,
            host: required(vendor, "host", &self.host)?.to_ascii_lowercase(),
            port: self.port.unwrap_or(default_port),
            database_name: required(vendor, "databaseName", &self.database_name)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticKey {
    pub database_type: DatabaseType,
    pub host: String,
    pub port: u16,
    pub database_name: String,
}

impl StaticKey {
    pub fn short_id(&self) -> String {
        format!(
            "Static_type:{}_host:{}_port:{}_db:{}",
            self.database_type, self.host, self.port, self.database_name
        )
    }

    pub fn jdbc_url(&self) -> String {
        match self.database_type {
            DatabaseType::SqlServer => format!(
                "jdbc:sqlserver://{}:{};databaseName={}",
                self.host, self.port, self.database_name
            ),
            _ => format!(
                "jdbc:postgresql://{}:{}/{}",
                self.host, self.port, self.database_name
            ),
        }
    }
}
