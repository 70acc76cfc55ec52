use anyhow::{Context, Result};
use std::time::Duration;
use url::Url;

use crate::providers::http::{ResponseExt, build_client};
use crate::watch::LedgerSnapshot;

/// Client for the admin API of a running daemon
pub struct AdminClient {
    http: reqwest::Client,
    base: Url,
}

impl AdminClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url).with_context(|| format!("Invalid admin API URL: {}", base_url))?;
        if base.scheme() != "http" && base.scheme() != "https" {
            anyhow::bail!("Admin API URL must use http or https (got: {})", base_url);
        }
        let http = build_client(Duration::from_secs(10)).context("Failed to create HTTP client")?;

        Ok(Self { http, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Admin API URL cannot be a base: {}", self.base))?
            .pop_if_empty()
            .push(path);
        Ok(url)
    }

    pub async fn stats(&self) -> Result<LedgerSnapshot> {
        self.http
            .get(self.endpoint("stats")?)
            .send()
            .await
            .with_context(|| format!("Failed to reach daemon at {}", self.base))?
            .ensure_success("Admin")
            .await?
            .json()
            .await
            .context("Failed to parse stats")
    }

    /// Reset one client; returns the daemon's confirmation message
    pub async fn reset(&self, ip: &str) -> Result<String> {
        let mut url = self.endpoint("reset")?;
        url.query_pairs_mut().append_pair("ip", ip);

        self.http
            .post(url)
            .send()
            .await
            .with_context(|| format!("Failed to reach daemon at {}", self.base))?
            .ensure_success("Admin")
            .await?
            .text()
            .await
            .context("Failed to read reset response")
    }
}
