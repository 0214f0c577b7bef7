// SPDX-License-Identifier: Apache-2.0

//! Credential flow implementations, one per strategy family

pub mod delegated_kerberos;
pub mod gcp;
pub mod h2;
pub mod middletier;
pub mod oauth;
pub mod snowflake_public;
pub mod user_password;

pub use delegated_kerberos::DelegatedKerberosFlow;
pub use gcp::GcpApplicationDefaultFlow;
pub use h2::H2Flow;
pub use middletier::MiddleTierKeytabFlow;
pub use oauth::OAuthFlow;
pub use snowflake_public::SnowflakePublicFlow;
pub use user_password::UserNamePasswordFlow;

use crate::engine::error::{EngineError, EngineResult};
use crate::observability::Sensitive;
use crate::vault::Vault;

/// Reads a secret the flow cannot do without.
pub(crate) fn read_secret(
    vault: &dyn Vault,
    reference: &str,
    what: &str,
) -> EngineResult<Sensitive<String>> {
    vault.get_value(reference)?.ok_or_else(|| {
        EngineError::credential_acquisition(format!(
            "Failed to locate {} using vault reference '{}'",
            what, reference
        ))
    })
}
