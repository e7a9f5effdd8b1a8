use anyhow::{Context, Result};

use super::KeyStore;

/// Resolves secret references as environment variable names. Pairs with
/// `dotenvy` for local development.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvKeyStore;

#[async_trait::async_trait]
impl KeyStore for EnvKeyStore {
    async fn get(&self, reference: &str) -> Result<String> {
        let value = std::env::var(reference)
            .with_context(|| format!("environment variable '{reference}' is not set"))?;
        if value.trim().is_empty() {
            anyhow::bail!("environment variable '{reference}' is empty");
        }
        Ok(value)
    }
}
