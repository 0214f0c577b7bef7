// SPDX-License-Identifier: Apache-2.0

//! Resolved credentials and the identities that carry them

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::observability::Sensitive;

/// Authenticated Kerberos principal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KerberosPrincipalContext {
    pub principal: String,
    pub short_name: String,
    pub authenticated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl KerberosPrincipalContext {
    pub fn new(principal: impl Into<String>) -> Self {
        let principal = principal.into();
        Self {
            short_name: short_name(&principal),
            principal,
            authenticated_at: Utc::now(),
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

/// `fred@EXAMPLE.COM` and `fred/host@EXAMPLE.COM` both shorten to `fred`.
pub fn short_name(principal: &str) -> String {
    let without_realm = principal.split('@').next().unwrap_or(principal);
    without_realm
        .split('/')
        .next()
        .unwrap_or(without_realm)
        .to_string()
}

/// A usable secret minted by a credential flow.
///
/// Lives only as long as the pool or session using it and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum Credential {
    /// Embedded stores that need no authentication
    None,
    UserPassword {
        user: String,
        password: Sensitive<String>,
    },
    KerberosPrincipal(KerberosPrincipalContext),
    OAuthToken {
        token: Sensitive<String>,
        expires_at: Option<DateTime<Utc>>,
    },
    SnowflakeKeyPair {
        user: String,
        private_key: Sensitive<String>,
        pass_phrase: Sensitive<String>,
    },
    GcpApplicationDefault,
}

impl Credential {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Credential::None => "None",
            Credential::UserPassword { .. } => "UserPassword",
            Credential::KerberosPrincipal(_) => "KerberosPrincipal",
            Credential::OAuthToken { .. } => "OAuthToken",
            Credential::SnowflakeKeyPair { .. } => "SnowflakeKeyPair",
            Credential::GcpApplicationDefault => "GcpApplicationDefault",
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        let expires_at = match self {
            Credential::OAuthToken { expires_at, .. } => *expires_at,
            Credential::KerberosPrincipal(ctx) => ctx.expires_at,
            _ => None,
        };
        expires_at.map(|at| at > now).unwrap_or(true)
    }

    pub fn oauth_token(token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Credential::OAuthToken {
            token: Sensitive::new(token.into()),
            expires_at,
        }
    }
}

/// End user on whose behalf a connection is requested
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub name: String,
    pub credentials: Vec<Credential>,
}

impl Identity {
    pub const ANONYMOUS_KIND: &'static str = "Anonymous";

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            credentials: Vec::new(),
        }
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credentials.push(credential);
        self
    }

    pub fn first_credential(&self) -> Option<&Credential> {
        self.credentials.first()
    }

    /// Kind of the first credential, used in pool names
    pub fn credential_kind(&self) -> &'static str {
        self.first_credential()
            .map(Credential::kind_name)
            .unwrap_or(Self::ANONYMOUS_KIND)
    }

    /// An identity is valid while none of its credentials has expired.
    pub fn is_valid(&self) -> bool {
        self.credentials.iter().all(Credential::is_valid)
    }

    pub fn kerberos_context(&self) -> Option<&KerberosPrincipalContext> {
        self.credentials.iter().find_map(|c| match c {
            Credential::KerberosPrincipal(ctx) => Some(ctx),
            _ => None,
        })
    }

    pub fn oauth_credential(&self) -> Option<&Credential> {
        self.credentials
            .iter()
            .find(|c| matches!(c, Credential::OAuthToken { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn short_name_strips_realm_and_instance() {
        assert_eq!(short_name("fred@EXAMPLE.COM"), "fred");
        assert_eq!(short_name("svc/host.example.com@EXAMPLE.COM"), "svc");
        assert_eq!(short_name("plain"), "plain");
        assert_eq!(KerberosPrincipalContext::new("fred@EXAMPLE.COM").short_name, "fred");
    }

    #[test]
    fn expired_oauth_token_is_invalid() {
        let now = Utc::now();
        let expired = Credential::oauth_token("t", Some(now - Duration::minutes(1)));
        let fresh = Credential::oauth_token("t", Some(now + Duration::minutes(5)));
        let open_ended = Credential::oauth_token("t", None);

        assert!(!expired.is_valid_at(now));
        assert!(fresh.is_valid_at(now));
        assert!(open_ended.is_valid_at(now));
        assert!(!Identity::new("u").with_credential(expired).is_valid());
    }

    #[test]
    fn identity_without_credentials_is_anonymous_and_valid() {
        let identity = Identity::new("user1");
        assert_eq!(identity.credential_kind(), "Anonymous");
        assert!(identity.is_valid());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let credential = Credential::UserPassword {
            user: "svc".into(),
            password: Sensitive::new("hunter2".to_string()),
        };
        let debug = format!("{:?}", credential);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }
}
