// SPDX-License-Identifier: Apache-2.0

//! Authentication strategies
//!
//! A strategy declares how to authenticate against a store. It never holds
//! secret material, only vault references and principal names, so it can be
//! logged, serialized and used as part of a pool key.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::engine::error::{EngineError, EngineResult};

/// Data-less discriminant of `AuthenticationStrategy`, used for flow dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StrategyKind {
    DefaultH2,
    TestDatabase,
    UserNamePassword,
    DelegatedKerberos,
    MiddleTierKeytab,
    OAuth,
    SnowflakePublic,
    GcpApplicationDefault,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::DefaultH2 => "DefaultH2",
            StrategyKind::TestDatabase => "TestDatabase",
            StrategyKind::UserNamePassword => "UserNamePassword",
            StrategyKind::DelegatedKerberos => "DelegatedKerberos",
            StrategyKind::MiddleTierKeytab => "MiddleTierKeytab",
            StrategyKind::OAuth => "OAuth",
            StrategyKind::SnowflakePublic => "SnowflakePublic",
            StrategyKind::GcpApplicationDefault => "GcpApplicationDefault",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum AuthenticationStrategy {
    DefaultH2,
    TestDatabase,
    UserNamePassword {
        #[serde(default)]
        base_vault_reference: Option<String>,
        user_name_vault_reference: String,
        password_vault_reference: String,
    },
    DelegatedKerberos {
        #[serde(default)]
        server_principal: Option<String>,
    },
    MiddleTierKeytab {
        principal: String,
        keytab_vault_reference: String,
        keytab_metadata_vault_reference: String,
    },
    OAuth {
        oauth_key: String,
        scope: String,
    },
    SnowflakePublic {
        private_key_vault_reference: String,
        pass_phrase_vault_reference: String,
        public_user_name: String,
    },
    GcpApplicationDefault,
}

impl AuthenticationStrategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            AuthenticationStrategy::DefaultH2 => StrategyKind::DefaultH2,
            AuthenticationStrategy::TestDatabase => StrategyKind::TestDatabase,
            AuthenticationStrategy::UserNamePassword { .. } => StrategyKind::UserNamePassword,
            AuthenticationStrategy::DelegatedKerberos { .. } => StrategyKind::DelegatedKerberos,
            AuthenticationStrategy::MiddleTierKeytab { .. } => StrategyKind::MiddleTierKeytab,
            AuthenticationStrategy::OAuth { .. } => StrategyKind::OAuth,
            AuthenticationStrategy::SnowflakePublic { .. } => StrategyKind::SnowflakePublic,
            AuthenticationStrategy::GcpApplicationDefault => StrategyKind::GcpApplicationDefault,
        }
    }

    pub fn middle_tier_keytab(
        principal: impl Into<String>,
        keytab_vault_reference: impl Into<String>,
        keytab_metadata_vault_reference: impl Into<String>,
    ) -> Self {
        AuthenticationStrategy::MiddleTierKeytab {
            principal: principal.into(),
            keytab_vault_reference: keytab_vault_reference.into(),
            keytab_metadata_vault_reference: keytab_metadata_vault_reference.into(),
        }
    }

    pub fn user_name_password(
        base_vault_reference: Option<&str>,
        user_name_vault_reference: impl Into<String>,
        password_vault_reference: impl Into<String>,
    ) -> Self {
        AuthenticationStrategy::UserNamePassword {
            base_vault_reference: base_vault_reference.map(str::to_string),
            user_name_vault_reference: user_name_vault_reference.into(),
            password_vault_reference: password_vault_reference.into(),
        }
    }

    /// Distills the strategy into its pool key.
    ///
    /// Surrounding whitespace is ignored and blank mandatory references are
    /// rejected, so logically identical strategies collapse to one key.
    pub fn key(&self) -> EngineResult<AuthenticationStrategyKey> {
        let kind = self.kind();
        let normalized = match self {
            AuthenticationStrategy::DefaultH2 => AuthenticationStrategy::DefaultH2,
            AuthenticationStrategy::TestDatabase => AuthenticationStrategy::TestDatabase,
            AuthenticationStrategy::UserNamePassword {
                base_vault_reference,
                user_name_vault_reference,
                password_vault_reference,
            } => AuthenticationStrategy::UserNamePassword {
                base_vault_reference: base_vault_reference
                    .as_deref()
                    .map(str::trim)
                    .filter(|b| !b.is_empty())
                    .map(str::to_string),
                user_name_vault_reference: mandatory(kind, "userNameVaultReference", user_name_vault_reference)?,
                password_vault_reference: mandatory(kind, "passwordVaultReference", password_vault_reference)?,
            },
            AuthenticationStrategy::DelegatedKerberos { server_principal } => {
                AuthenticationStrategy::DelegatedKerberos {
                    server_principal: server_principal
                        .as_deref()
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(str::to_string),
                }
            }
            AuthenticationStrategy::MiddleTierKeytab {
                principal,
                keytab_vault_reference,
                keytab_metadata_vault_reference,
            } => AuthenticationStrategy::MiddleTierKeytab {
                principal: mandatory(kind, "principal", principal)?,
                keytab_vault_reference: mandatory(kind, "keytabVaultReference", keytab_vault_reference)?,
                keytab_metadata_vault_reference: mandatory(
                    kind,
                    "keytabMetadataVaultReference",
                    keytab_metadata_vault_reference,
                )?,
            },
            AuthenticationStrategy::OAuth { oauth_key, scope } => AuthenticationStrategy::OAuth {
                oauth_key: mandatory(kind, "oauthKey", oauth_key)?,
                scope: mandatory(kind, "scope", scope)?,
            },
            AuthenticationStrategy::SnowflakePublic {
                private_key_vault_reference,
                pass_phrase_vault_reference,
                public_user_name,
            } => AuthenticationStrategy::SnowflakePublic {
                private_key_vault_reference: mandatory(kind, "privateKeyVaultReference", private_key_vault_reference)?,
                pass_phrase_vault_reference: mandatory(kind, "passPhraseVaultReference", pass_phrase_vault_reference)?,
                public_user_name: mandatory(kind, "publicUserName", public_user_name)?,
            },
            AuthenticationStrategy::GcpApplicationDefault => {
                AuthenticationStrategy::GcpApplicationDefault
            }
        };
        Ok(AuthenticationStrategyKey(normalized))
    }
}

fn mandatory(kind: StrategyKind, field: &str, value: &str) -> EngineResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::configuration(format!(
            "{} authentication strategy is missing mandatory field '{}'",
            kind, field
        )));
    }
    Ok(trimmed.to_string())
}

/// Normalized strategy identity, one half of a `ConnectionKey`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AuthenticationStrategyKey(AuthenticationStrategy);

impl AuthenticationStrategyKey {
    pub fn kind(&self) -> StrategyKind {
        self.0.kind()
    }

    pub fn strategy(&self) -> &AuthenticationStrategy {
        &self.0
    }

    pub fn short_id(&self) -> String {
        match &self.0 {
            AuthenticationStrategy::DefaultH2
            | AuthenticationStrategy::TestDatabase
            | AuthenticationStrategy::GcpApplicationDefault => self.kind().to_string(),
            AuthenticationStrategy::UserNamePassword {
                base_vault_reference,
                user_name_vault_reference,
                password_vault_reference,
            } => format!(
                "UserNamePassword_base:{}_user:{}_password:{}",
                base_vault_reference.as_deref().unwrap_or(""),
                user_name_vault_reference,
                password_vault_reference
            ),
            AuthenticationStrategy::DelegatedKerberos { server_principal } => format!(
                "DelegatedKerberos_serverPrincipal:{}",
                server_principal.as_deref().unwrap_or("")
            ),
            AuthenticationStrategy::MiddleTierKeytab {
                principal,
                keytab_vault_reference,
                keytab_metadata_vault_reference,
            } => format!(
                "MiddleTierKeytab_principal:{}_keytab:{}_metadata:{}",
                principal, keytab_vault_reference, keytab_metadata_vault_reference
            ),
            AuthenticationStrategy::OAuth { oauth_key, scope } => {
                format!("OAuth_key:{}_scope:{}", oauth_key, scope)
            }
            AuthenticationStrategy::SnowflakePublic {
                private_key_vault_reference,
                pass_phrase_vault_reference,
                public_user_name,
            } => format!(
                "SnowflakePublic_user:{}_privateKey:{}_passPhrase:{}",
                public_user_name, private_key_vault_reference, pass_phrase_vault_reference
            ),
        }
    }
}
