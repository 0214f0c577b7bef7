// SPDX-License-Identifier: Apache-2.0

pub mod backend;
pub mod chain;
pub mod file;
pub mod metadata;

pub use backend::{EnvironmentVault, InMemoryVault, KeyringVault, Vault};
pub use chain::VaultChain;
pub use file::FileVault;
pub use metadata::MiddletierKeytabMetadata;
