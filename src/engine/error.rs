// SPDX-License-Identifier: Apache-2.0

//! Normalized error types for connection resolution
//!
//! Vendor, vault and credential-provider failures are mapped to these
//! unified error types so callers can decide on retries without inspecting
//! driver-specific errors. Messages carry vault references and identifiers,
//! never secret values.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all connection resolution operations
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Authorization error: {message}")]
    Authorization { message: String },

    #[error("Credential acquisition failed: {message}")]
    CredentialAcquisition { message: String },

    #[error("Pool '{pool_name}' exhausted: no connection available after {timeout_ms}ms")]
    PoolExhausted { pool_name: String, timeout_ms: u64 },

    #[error("No authentication flow registered for vendor '{vendor}' and strategy '{strategy}'")]
    UnsupportedFlow { vendor: String, strategy: String },

    #[error("Unsupported operation: {message}")]
    UnsupportedOperation { message: String },

    #[error("Invalid Identity found, cannot build connection pool for {identity}")]
    InvalidIdentity { identity: String },

    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Vault error: {message}")]
    Vault { message: String },

    #[error("Pool '{pool_name}' is closed")]
    PoolClosed { pool_name: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl EngineError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration { message: msg.into() }
    }

    pub fn authorization(msg: impl Into<String>) -> Self {
        Self::Authorization { message: msg.into() }
    }

    pub fn credential_acquisition(msg: impl Into<String>) -> Self {
        Self::CredentialAcquisition { message: msg.into() }
    }

    pub fn pool_exhausted(pool_name: impl Into<String>, timeout_ms: u64) -> Self {
        Self::PoolExhausted {
            pool_name: pool_name.into(),
            timeout_ms,
        }
    }

    pub fn unsupported_flow(vendor: impl Into<String>, strategy: impl Into<String>) -> Self {
        Self::UnsupportedFlow {
            vendor: vendor.into(),
            strategy: strategy.into(),
        }
    }

    pub fn unsupported_operation(msg: impl Into<String>) -> Self {
        Self::UnsupportedOperation { message: msg.into() }
    }

    pub fn invalid_identity(identity: impl Into<String>) -> Self {
        Self::InvalidIdentity {
            identity: identity.into(),
        }
    }

    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::ConnectionFailed { message: msg.into() }
    }

    pub fn vault(msg: impl Into<String>) -> Self {
        Self::Vault { message: msg.into() }
    }

    pub fn pool_closed(pool_name: impl Into<String>) -> Self {
        Self::PoolClosed {
            pool_name: pool_name.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal { message: msg.into() }
    }

    /// Whether a caller may retry the request (with backoff).
    ///
    /// Configuration and authorization failures are final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PoolExhausted { .. } | Self::ConnectionFailed { .. })
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
