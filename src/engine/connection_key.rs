// SPDX-License-Identifier: Apache-2.0

use serde::Serialize;

use crate::engine::auth::strategy::AuthenticationStrategyKey;
use crate::engine::datasource::DataSourceSpecificationKey;
use crate::engine::types::DatabaseType;

/// Pool identity: where to connect and how to authenticate
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionKey {
    data_source: DataSourceSpecificationKey,
    strategy: AuthenticationStrategyKey,
    test_mode: bool,
}

impl ConnectionKey {
    pub fn new(data_source: DataSourceSpecificationKey, strategy: AuthenticationStrategyKey) -> Self {
        Self {
            data_source,
            strategy,
            test_mode: false,
        }
    }

    /// Test-mode keys never share a pool with production keys
    pub fn for_tests(mut self) -> Self {
        self.test_mode = true;
        self
    }

    pub fn data_source(&self) -> &DataSourceSpecificationKey {
        &self.data_source
    }

    pub fn strategy(&self) -> &AuthenticationStrategyKey {
        &self.strategy
    }

    pub fn database_type(&self) -> DatabaseType {
        self.data_source.database_type()
    }

    pub fn is_test_mode(&self) -> bool {
        self.test_mode
    }

    pub fn short_id(&self) -> String {
        let mut id = format!("{}_{}", self.data_source.short_id(), self.strategy.short_id());
        if self.test_mode {
            id.push_str("_test");
        }
        id
    }
}
