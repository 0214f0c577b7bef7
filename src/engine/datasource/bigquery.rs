// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::engine::datasource::{proxy, required};
use crate::engine::error::EngineResult;
use crate::engine::types::DatabaseType;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BigQuerySpecification {
    pub project_id: Option<String>,
    pub default_dataset: Option<String>,
    pub proxy_host: Option<String>,
    pub proxy_port: Option<u16>,
}

impl BigQuerySpecification {
    pub fn resolve(&self) -> EngineResult<BigQueryKey> {
        let vendor = DatabaseType::BigQuery;
        let proxy = proxy(vendor, &self.proxy_host, self.proxy_port)?;
        Ok(BigQueryKey {
            // GCP project ids are lower case
            project_id: required(vendor, "projectId", &self.project_id)?.to_ascii_lowercase(),
            default_dataset: required(vendor, "defaultDataset", &self.default_dataset)?,
            proxy_host: proxy.as_ref().map(|(h, _)| h.clone()),
            proxy_port: proxy.and_then(|(_, p)| p),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BigQueryKey {
    pub project_id: String,
    pub default_dataset: String,
    pub proxy_host: Option<String>,
    pub proxy_port: Option<u16>,
}

impl BigQueryKey {
    pub fn short_id(&self) -> String {
        let mut id = format!(
            "BigQuery_projectId:{}_defaultDataset:{}",
            self.project_id, self.default_dataset
        );
        if let Some(host) = &self.proxy_host {
            id.push_str(&format!("_proxyHost:{}", host));
        }
        if let Some(port) = self.proxy_port {
            id.push_str(&format!("_proxyPort:{}", port));
        }
        id
    }

    pub fn jdbc_url(&self) -> String {
        format!(
            "jdbc:bigquery://https://www.googleapis.com/bigquery/v2:443;ProjectId={};DefaultDataset={}",
            self.project_id, self.default_dataset
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_id_is_case_insensitive() {
        let a = BigQuerySpecification {
            project_id: Some("Legend-Integration".into()),
            default_dataset: Some("sales".into()),
            ..Default::default()
        };
        let b = BigQuerySpecification {
            project_id: Some("legend-integration ".into()),
            default_dataset: Some("sales".into()),
            ..Default::default()
        };
        assert_eq!(a.resolve().unwrap(), b.resolve().unwrap());
        assert_eq!(
            a.resolve().unwrap().short_id(),
            "BigQuery_projectId:legend-integration_defaultDataset:sales"
        );
    }

    #[test]
    fn proxy_is_part_of_the_key() {
        let direct = BigQuerySpecification {
            project_id: Some("p".into()),
            default_dataset: Some("d".into()),
            ..Default::default()
        };
        let proxied = BigQuerySpecification {
            proxy_host: Some("proxy".into()),
            proxy_port: Some(3128),
            ..direct.clone()
        };
        let key = proxied.resolve().unwrap();
        assert_ne!(direct.resolve().unwrap(), key);
        assert!(key.short_id().ends_with("_proxyHost:proxy_proxyPort:3128"));
    }
}
