use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::providers::http::{ResponseExt, build_client};

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Telegram Bot API client for text alerts
pub struct TelegramClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramClient {
    pub fn new(bot_token: &str, chat_id: &str) -> Result<Self> {
        Self::with_base_url(bot_token, chat_id, TELEGRAM_API)
    }

    pub fn with_base_url(bot_token: &str, chat_id: &str, api_base: &str) -> Result<Self> {
        let http = build_client(Duration::from_secs(10)).context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
        })
    }

    pub async fn send_message(&self, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);

        let response: ApiResponse = self
            .http
            .post(&url)
            .json(&SendMessage {
                chat_id: &self.chat_id,
                text,
            })
            .send()
            .await
            .context("Failed to reach Telegram")?
            .ensure_success("Telegram")
            .await?
            .json()
            .await
            .context("Failed to parse Telegram response")?;

        if !response.ok {
            anyhow::bail!(
                "Telegram rejected message: {}",
                response.description.unwrap_or_default()
            );
        }

        debug!("Sent Telegram message to chat {}", self.chat_id);
        Ok(())
    }
}
