// SPDX-License-Identifier: Apache-2.0

//! Snowflake data source
//!
//! Unquoted Snowflake identifiers are case-insensitive, so unless
//! `quoteIdentifiers` is set the warehouse, database and role are folded to
//! upper case for key equality. Quoted identifiers are compared as given.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use crate::engine::datasource::{optional, proxy, required};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::DatabaseType;

pub const DEFAULT_CLOUD_TYPE: &str = "privatelink";
const PRIVATELINK: &str = "privatelink";
const HOST_SUFFIX: &str = "snowflakecomputing.com";

pub const PROPERTY_ACCOUNT: &str = "account";
pub const PROPERTY_REGION: &str = "region";
pub const PROPERTY_CLOUD_TYPE: &str = "cloudType";
pub const PROPERTY_WAREHOUSE: &str = "warehouse";
pub const PROPERTY_DATABASE: &str = "db";
pub const PROPERTY_ROLE: &str = "role";
pub const PROPERTY_QUOTE_IDENTIFIERS: &str = "quotedIdentifiersIgnoreCase";
pub const PROPERTY_USE_PROXY: &str = "useProxy";
pub const PROPERTY_PROXY_HOST: &str = "proxyHost";
pub const PROPERTY_PROXY_PORT: &str = "proxyPort";
pub const PROPERTY_NON_PROXY_HOSTS: &str = "nonProxyHosts";
pub const PROPERTY_ACCOUNT_TYPE: &str = "accountType";
pub const PROPERTY_ORGANIZATION: &str = "organization";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnowflakeAccountType {
    #[serde(rename = "VPS")]
    Vps,
    MultiTenant,
}

impl SnowflakeAccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnowflakeAccountType::Vps => "VPS",
            SnowflakeAccountType::MultiTenant => "MultiTenant",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnowflakeSpecification {
    pub account_name: Option<String>,
    pub region: Option<String>,
    pub warehouse_name: Option<String>,
    pub database_name: Option<String>,
    pub cloud_type: Option<String>,
    pub quote_identifiers: Option<bool>,
    pub proxy_host: Option<String>,
    pub proxy_port: Option<u16>,
    pub non_proxy_hosts: Option<String>,
    pub account_type: Option<SnowflakeAccountType>,
    pub organization: Option<String>,
    pub role: Option<String>,
}

impl SnowflakeSpecification {
    pub fn resolve(&self) -> EngineResult<SnowflakeKey> {
        let vendor = DatabaseType::Snowflake;
        let account_type = self.account_type;
        let organization = optional(&self.organization);

        if account_type == Some(SnowflakeAccountType::Vps) && organization.is_none() {
            return Err(EngineError::configuration(
                "Snowflake account type VPS requires an organization",
            ));
        }

        let proxy = proxy(vendor, &self.proxy_host, self.proxy_port)?;
        let (proxy_host, proxy_port) = match proxy {
            Some((host, port)) => (Some(host), port),
            None => (None, None),
        };

        Ok(SnowflakeKey {
            account_name: required(vendor, "accountName", &self.account_name)?,
            region: required(vendor, "region", &self.region)?,
            warehouse: required(vendor, "warehouseName", &self.warehouse_name)?,
            database: required(vendor, "databaseName", &self.database_name)?,
            cloud_type: optional(&self.cloud_type)
                .map(|c| c.to_ascii_lowercase())
                .unwrap_or_else(|| DEFAULT_CLOUD_TYPE.to_string()),
            quote_identifiers: self.quote_identifiers.unwrap_or(false),
            proxy_host,
            proxy_port,
            non_proxy_hosts: optional(&self.non_proxy_hosts),
            account_type,
            organization,
            role: optional(&self.role),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnowflakeKey {
    pub account_name: String,
    pub region: String,
    pub warehouse: String,
    pub database: String,
    pub cloud_type: String,
    pub quote_identifiers: bool,
    pub proxy_host: Option<String>,
    pub proxy_port: Option<u16>,
    pub non_proxy_hosts: Option<String>,
    pub account_type: Option<SnowflakeAccountType>,
    pub organization: Option<String>,
    pub role: Option<String>,
}

type CanonicalSnowflake<'a> = (
    &'a str,
    &'a str,
    String,
    String,
    &'a str,
    bool,
    Option<&'a str>,
    Option<u16>,
    Option<&'a str>,
    Option<SnowflakeAccountType>,
    Option<&'a str>,
    Option<String>,
);

impl SnowflakeKey {
    fn fold(&self, identifier: &str) -> String {
        if self.quote_identifiers {
            identifier.to_string()
        } else {
            identifier.to_ascii_uppercase()
        }
    }

    fn quote(&self, identifier: &str) -> String {
        if self.quote_identifiers {
            format!("\"{}\"", identifier)
        } else {
            identifier.to_string()
        }
    }

    fn canonical(&self) -> CanonicalSnowflake<'_> {
        (
            self.account_name.as_str(),
            self.region.as_str(),
            self.fold(&self.warehouse),
            self.fold(&self.database),
            self.cloud_type.as_str(),
            self.quote_identifiers,
            self.proxy_host.as_deref(),
            self.proxy_port,
            self.non_proxy_hosts.as_deref(),
            self.account_type,
            self.organization.as_deref(),
            self.role.as_deref().map(|r| self.fold(r)),
        )
    }

    pub fn use_proxy(&self) -> bool {
        self.proxy_host.is_some()
    }

    fn is_privatelink(&self) -> bool {
        self.account_type.is_some() || self.cloud_type == PRIVATELINK
    }

    pub fn jdbc_url(&self) -> String {
        let mut parts: Vec<&str> = vec![self.account_name.as_str()];
        if let Some(org) = &self.organization {
            parts.push(org.as_str());
        }
        parts.push(self.region.as_str());
        if self.cloud_type != PRIVATELINK {
            parts.push(self.cloud_type.as_str());
        }
        if self.is_privatelink() {
            parts.push(PRIVATELINK);
        }
        parts.push(HOST_SUFFIX);
        format!("jdbc:snowflake://{}", parts.join("."))
    }

    /// Driver properties describing this endpoint
    pub fn connection_properties(&self) -> BTreeMap<&'static str, String> {
        let mut props = BTreeMap::new();
        props.insert(PROPERTY_ACCOUNT, self.account_name.clone());
        props.insert(PROPERTY_REGION, self.region.clone());
        props.insert(PROPERTY_CLOUD_TYPE, self.cloud_type.clone());
        props.insert(PROPERTY_WAREHOUSE, self.quote(&self.warehouse));
        props.insert(PROPERTY_DATABASE, self.quote(&self.database));
        if let Some(role) = &self.role {
            props.insert(PROPERTY_ROLE, self.quote(role));
        }
        props.insert(PROPERTY_QUOTE_IDENTIFIERS, self.quote_identifiers.to_string());
        props.insert(PROPERTY_USE_PROXY, self.use_proxy().to_string());
        if let Some(host) = &self.proxy_host {
            props.insert(PROPERTY_PROXY_HOST, host.clone());
        }
        if let Some(port) = self.proxy_port {
            props.insert(PROPERTY_PROXY_PORT, port.to_string());
        }
        if let Some(hosts) = &self.non_proxy_hosts {
            props.insert(PROPERTY_NON_PROXY_HOSTS, hosts.clone());
        }
        if let Some(account_type) = self.account_type {
            props.insert(PROPERTY_ACCOUNT_TYPE, account_type.as_str().to_string());
        }
        if let Some(org) = &self.organization {
            props.insert(PROPERTY_ORGANIZATION, org.clone());
        }
        props
    }

    pub fn short_id(&self) -> String {
        let mut id = format!(
            "Snowflake_account:{}_region:{}_warehouse:{}_db:{}_cloudType:{}_quoteIdentifiers:{}",
            self.account_name,
            self.region,
            self.fold(&self.warehouse),
            self.fold(&self.database),
            self.cloud_type,
            self.quote_identifiers
        );
        if let Some(role) = &self.role {
            id.push_str(&format!("_role:{}", self.fold(role)));
        }
        if let Some(account_type) = self.account_type {
            id.push_str(&format!("_accountType:{}", account_type.as_str()));
        }
        if let Some(org) = &self.organization {
            id.push_str(&format!("_organization:{}", org));
        }
        if let Some(host) = &self.proxy_host {
            id.push_str(&format!("_proxy:{}", host));
            if let Some(port) = self.proxy_port {
                id.push_str(&format!(":{}", port));
            }
        }
        if let Some(hosts) = &self.non_proxy_hosts {
            id.push_str(&format!("_nonProxyHosts:{}", hosts));
        }
        id
    }
}

impl PartialEq for SnowflakeKey {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for SnowflakeKey {}

impl Hash for SnowflakeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}
