use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::providers::http::build_client;

/// Client for a network speaker that reads messages aloud
pub struct SpeakerClient {
    http: reqwest::Client,
    url: String,
    language: String,
}

#[derive(Serialize)]
struct SpeakRequest<'a> {
    message: &'a str,
    language: &'a str,
}

impl SpeakerClient {
    pub fn new(base_url: &str, language: &str) -> Result<Self> {
        let http = build_client(Duration::from_secs(10)).context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            url: format!("{}/speak", base_url.trim_end_matches('/')),
            language: language.to_string(),
        })
    }

    /// Queue a message; the speaker answers 202 and plays it asynchronously
    pub async fn speak(&self, message: &str) -> Result<()> {
        let response = self
            .http
            .post(&self.url)
            .json(&SpeakRequest {
                message,
                language: &self.language,
            })
            .send()
            .await
            .context("Failed to reach speaker")?;

        let status = response.status();
        if status != StatusCode::ACCEPTED {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Speaker returned {}: {}", status, body);
        }

        debug!("Speaker accepted message");
        Ok(())
    }
}
