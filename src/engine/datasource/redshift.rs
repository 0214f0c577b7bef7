// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use url::Url;

use crate::engine::datasource::{optional, required};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::DatabaseType;

const DEFAULT_PORT: u16 = 5439;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedshiftSpecification {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database_name: Option<String>,
    pub cluster_id: Option<String>,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
}

impl RedshiftSpecification {
    pub fn resolve(&self) -> EngineResult<RedshiftKey> {
        let vendor = DatabaseType::Redshift;
        let endpoint_url = match optional(&self.endpoint_url) {
            Some(raw) => {
                let parsed = Url::parse(&raw).map_err(|e| {
                    EngineError::configuration(format!(
                        "Redshift endpoint URL '{}' is invalid: {}",
                        raw, e
                    ))
                })?;
                Some(parsed.to_string())
            }
            None => None,
        };

        Ok(RedshiftKey {
            host: required(vendor, "host", &self.host)?.to_ascii_lowercase(),
            port: self.port.unwrap_or(DEFAULT_PORT),
            database_name: required(vendor, "databaseName", &self.database_name)?,
            cluster_id: optional(&self.cluster_id).map(|c| c.to_ascii_lowercase()),
            region: optional(&self.region).map(|r| r.to_ascii_lowercase()),
            endpoint_url,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedshiftKey {
    pub host: String,
    pub port: u16,
    pub database_name: String,
    pub cluster_id: Option<String>,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
}

impl RedshiftKey {
    pub fn short_id(&self) -> String {
        format!(
            "Redshift_host:{}_port:{}_database:{}_clusterID:{}_region:{}_endpointURL:{}",
            self.host,
            self.port,
            self.database_name,
            self.cluster_id.as_deref().unwrap_or(""),
            self.region.as_deref().unwrap_or(""),
            self.endpoint_url.as_deref().unwrap_or("")
        )
    }

    pub fn jdbc_url(&self) -> String {
        format!("jdbc:redshift://{}:{}/{}", self.host, self.port, self.database_name)
    }
}
