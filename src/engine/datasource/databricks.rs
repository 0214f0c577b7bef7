// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::engine::datasource::required;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::DatabaseType;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabricksSpecification {
    pub hostname: Option<String>,
    pub port: Option<String>,
    pub protocol: Option<String>,
    pub http_path: Option<String>,
}

impl DatabricksSpecification {
    pub fn resolve(&self) -> EngineResult<DatabricksKey> {
        let vendor = DatabaseType::Databricks;
        let port_text = required(vendor, "port", &self.port)?;
        let port = port_text.parse::<u16>().map_err(|_| {
            EngineError::configuration(format!("Databricks port '{}' is not a valid port", port_text))
        })?;
        let protocol = required(vendor, "protocol", &self.protocol)?.to_ascii_lowercase();
        if protocol != "https" && protocol != "http" {
            return Err(EngineError::configuration(format!(
                "Databricks protocol '{}' is not supported",
                protocol
            )));
        }

        let http_path = required(vendor, "httpPath", &self.http_path)?;
        Ok(DatabricksKey {
            hostname: required(vendor, "hostname", &self.hostname)?.to_ascii_lowercase(),
            port,
            protocol,
            http_path: if http_path.starts_with('/') {
                http_path
            } else {
                format!("/{}", http_path)
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabricksKey {
    pub hostname: String,
    pub port: u16,
    pub protocol: String,
    pub http_path: String,
}

impl DatabricksKey {
    pub fn short_id(&self) -> String {
        format!(
            "Databricks_hostname:{}_port:{}_protocol:{}_httpPath:{}",
            self.hostname, self.port, self.protocol, self.http_path
        )
    }

    pub fn jdbc_url(&self) -> String {
        format!(
            "jdbc:databricks://{}:{}/default;transportMode=http;ssl={};httpPath={}",
            self.hostname,
            self.port,
            if self.protocol == "https" { 1 } else { 0 },
            self.http_path
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> DatabricksSpecification {
        DatabricksSpecification {
            hostname: Some("dbc-01.cloud.databricks.com".into()),
            port: Some("443".into()),
            protocol: Some("HTTPS".into()),
            http_path: Some("sql/protocolv1/o/1/0101".into()),
        }
    }

    #[test]
    fn http_path_and_protocol_are_normalized() {
        let key = spec().resolve().unwrap();
        assert_eq!(key.protocol, "https");
        assert_eq!(key.http_path, "/sql/protocolv1/o/1/0101");

        let mut slashed = spec();
        slashed.http_path = Some("/sql/protocolv1/o/1/0101".into());
        assert_eq!(slashed.resolve().unwrap(), key);
        assert!(key.jdbc_url().contains("ssl=1"));
    }

    #[test]
    fn invalid_port_fails_fast() {
        let mut s = spec();
        s.port = Some("https".into());
        assert!(matches!(s.resolve(), Err(EngineError::Configuration { .. })));
    }
}
