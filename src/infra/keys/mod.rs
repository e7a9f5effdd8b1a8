//! Secret resolution.
//!
//! Configuration only ever names a secret (an environment variable, a vault
//! path). [`KeyStore`] turns that reference into its plaintext value at
//! startup so credentials never live in config files or source.

mod env;

pub use env::EnvKeyStore;

use anyhow::Result;

/// Resolves a secret reference into a plaintext value.
#[async_trait::async_trait]
pub trait KeyStore: Send + Sync {
    async fn get(&self, reference: &str) -> Result<String>;
}
