//! HTTP plumbing shared by the network adapters.

mod basic;
mod client;
pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

const ERROR_BODY_LIMIT: usize = 200;

/// GETs `url` and returns the raw body. Non-success statuses are errors.
pub async fn fetch_bytes<C: HttpClient + ?Sized>(client: &C, url: &str) -> Result<Vec<u8>> {
    let url: reqwest::Url = url.parse().with_context(|| format!("invalid URL '{url}'"))?;
    let req = reqwest::Request::new(reqwest::Method::GET, url);

    let resp = client.execute(req).await.context("sending request")?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let body: String = body.chars().take(ERROR_BODY_LIMIT).collect();
        anyhow::bail!("HTTP {status}: {body}");
    }
    Ok(resp.bytes().await.context("reading response body")?.to_vec())
}

/// Like [`fetch_bytes`] but decodes the body as JSON.
pub async fn fetch_json<C, T>(client: &C, url: &str) -> Result<T>
where
    C: HttpClient + ?Sized,
    T: DeserializeOwned,
{
    let bytes = fetch_bytes(client, url).await?;
    serde_json::from_slice(&bytes).context("decoding JSON response")
}
