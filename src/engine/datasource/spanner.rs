// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::engine::datasource::{proxy, required};
use crate::engine::error::EngineResult;
use crate::engine::types::DatabaseType;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpannerSpecification {
    pub project_id: Option<String>,
    pub instance_id: Option<String>,
    pub database_id: Option<String>,
    pub proxy_host: Option<String>,
    pub proxy_port: Option<u16>,
}

impl SpannerSpecification {
    pub fn resolve(&self) -> EngineResult<SpannerKey> {
        let vendor = DatabaseType::Spanner;
        let proxy = proxy(vendor, &self.proxy_host, self.proxy_port)?;
        Ok(SpannerKey {
            project_id: required(vendor, "projectId", &self.project_id)?.to_ascii_lowercase(),
            instance_id: required(vendor, "instanceId", &self.instance_id)?,
            database_id: required(vendor, "databaseId", &self.database_id)?,
            proxy_host: proxy.as_ref().map(|(h, _)| h.clone()),
            proxy_port: proxy.and_then(|(_, p)| p),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpannerKey {
    pub project_id: String,
    pub instance_id: String,
    pub database_id: String,
    pub proxy_host: Option<String>,
    pub proxy_port: Option<u16>,
}

impl SpannerKey {
    pub fn short_id(&self) -> String {
        let mut id = format!(
            "Spanner_projectId:{}_instanceId:{}_databaseId:{}",
            self.project_id, self.instance_id, self.database_id
        );
        if let Some(host) = &self.proxy_host {
            id.push_str(&format!("_proxyHost:{}", host));
            if let Some(port) = self.proxy_port {
                id.push_str(&format!("_proxyPort:{}", port));
            }
        }
        id
    }

    pub fn jdbc_url(&self) -> String {
        format!(
            "jdbc:cloudspanner:/projects/{}/instances/{}/databases/{}",
            self.project_id, self.instance_id, self.database_id
        )
    }
}
