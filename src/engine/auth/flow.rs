// SPDX-License-Identifier: Apache-2.0

//! Database Authentication Flow Trait
//!
//! A flow turns an authentication strategy into a live `Credential` for one
//! (vendor, strategy kind) pair. Flows whose authorization depends on the
//! calling service declare it through `requires_runtime_context`, and the
//! context-less entry point refuses them.

use async_trait::async_trait;

use crate::engine::auth::credential::{Credential, Identity};
use crate::engine::auth::strategy::{AuthenticationStrategy, StrategyKind};
use crate::engine::datasource::DataSourceSpecificationKey;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::{DatabaseType, RuntimeContext};

pub const MISSING_CONTEXT_MESSAGE: &str =
    "Unsafe attempt to make credential without RuntimeContext";
pub const EMPTY_CONTEXT_MESSAGE: &str =
    "Unsafe attempt to make credential with empty RuntimeContext";

/// Inputs shared by every credential acquisition
#[derive(Debug, Clone, Copy)]
pub struct CredentialRequest<'a> {
    pub identity: &'a Identity,
    pub data_source: &'a DataSourceSpecificationKey,
    pub strategy: &'a AuthenticationStrategy,
}

impl<'a> CredentialRequest<'a> {
    pub fn new(
        identity: &'a Identity,
        data_source: &'a DataSourceSpecificationKey,
        strategy: &'a AuthenticationStrategy,
    ) -> Self {
        Self {
            identity,
            data_source,
            strategy,
        }
    }
}

#[async_trait]
pub trait DatabaseAuthenticationFlow: Send + Sync {
    fn database_type(&self) -> DatabaseType;

    fn strategy_kind(&self) -> StrategyKind;

    /// Whether the flow refuses to run without a caller-supplied context
    fn requires_runtime_context(&self) -> bool {
        false
    }

    /// Checks the caller may use the strategy, without acquiring anything.
    ///
    /// Runs on every resolution, including reuse of an existing pool.
    async fn authorize(
        &self,
        request: CredentialRequest<'_>,
        runtime_context: Option<&RuntimeContext>,
    ) -> EngineResult<()> {
        let _ = request;
        if self.requires_runtime_context() {
            require_context(runtime_context)?;
        }
        Ok(())
    }

    async fn make_credential_with_context(
        &self,
        request: CredentialRequest<'_>,
        runtime_context: &RuntimeContext,
    ) -> EngineResult<Credential>;

    /// Context-less entry point; refused for flows that need a context.
    async fn make_credential(&self, request: CredentialRequest<'_>) -> EngineResult<Credential> {
        if self.requires_runtime_context() {
            return Err(EngineError::unsupported_operation(MISSING_CONTEXT_MESSAGE));
        }
        self.make_credential_with_context(request, &RuntimeContext::empty())
            .await
    }
}

/// Distinguishes an absent context from a present but empty one.
pub fn require_context(runtime_context: Option<&RuntimeContext>) -> EngineResult<&RuntimeContext> {
    match runtime_context {
        None => Err(EngineError::unsupported_operation(MISSING_CONTEXT_MESSAGE)),
        Some(ctx) if ctx.is_empty() => {
            Err(EngineError::unsupported_operation(EMPTY_CONTEXT_MESSAGE))
        }
        Some(ctx) => Ok(ctx),
    }
}

/// Error for a flow handed a strategy of another kind
pub(crate) fn strategy_mismatch(expected: StrategyKind, actual: &AuthenticationStrategy) -> EngineError {
    EngineError::internal(format!(
        "{} flow invoked with {} strategy",
        expected,
        actual.kind()
    ))
}
