//! Shared helpers for the HTTP adapters

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Error out on non-2xx responses, keeping the body for the message
#[async_trait]
pub trait ResponseExt {
    async fn ensure_success(self, api_name: &str) -> Result<Self>
    where
        Self: Sized;
}

#[async_trait]
impl ResponseExt for reqwest::Response {
    async fn ensure_success(self, api_name: &str) -> Result<Self> {
        if !self.status().is_success() {
            let status = self.status();
            let error_text = self.text().await.unwrap_or_default();
            anyhow::bail!("{api_name} API error ({status}): {error_text}");
        }
        Ok(self)
    }
}

/// HTTP client with a per-request timeout
pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}
