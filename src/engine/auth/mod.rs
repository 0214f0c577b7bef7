// SPDX-License-Identifier: Apache-2.0

// Authentication: strategies, credentials and the flows that mint them

pub mod credential;
pub mod flow;
pub mod flows;
pub mod kerberos;
pub mod registry;
pub mod strategy;

pub use credential::{Credential, Identity, KerberosPrincipalContext};
pub use flow::{CredentialRequest, DatabaseAuthenticationFlow};
pub use kerberos::{KerberosLogin, KeytabFileLogin, RecordingKerberosLogin};
pub use registry::FlowRegistry;
pub use strategy::{AuthenticationStrategy, AuthenticationStrategyKey, StrategyKind};
