//! External collaborators of the watch engine.
//!
//! The engine only sees these traits. Pi-hole supplies query events and
//! enforces blocks; Telegram and a network speaker carry alerts.

pub(crate) mod http;
pub mod pihole;
pub mod speaker;
pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;
use tracing::debug;

pub use pihole::PiholeClient;
pub use speaker::SpeakerClient;
pub use telegram::TelegramClient;

/// A DNS query for a monitored domain, attributed to a client address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryEvent {
    pub client: String,
    pub timestamp: DateTime<Utc>,
}

/// Rejected query log rows
#[derive(Debug, Error, PartialEq)]
pub enum EventError {
    #[error("query has no client address")]
    MissingClient,

    #[error("invalid query timestamp: {0}")]
    InvalidTimestamp(f64),
}

impl QueryEvent {
    /// Build an event from a unix timestamp in (fractional) seconds.
    ///
    /// The timestamp is truncated to whole seconds, so queries inside the
    /// same second collapse into one event.
    pub fn from_unix_secs(client: &str, secs: f64) -> Result<Self, EventError> {
        let client = client.trim();
        if client.is_empty() {
            return Err(EventError::MissingClient);
        }

        if !secs.is_finite() || secs < 0.0 || secs > i64::MAX as f64 {
            return Err(EventError::InvalidTimestamp(secs));
        }

        let timestamp = Utc
            .timestamp_opt(secs.trunc() as i64, 0)
            .single()
            .ok_or(EventError::InvalidTimestamp(secs))?;

        Ok(Self {
            client: client.to_string(),
            timestamp,
        })
    }
}

/// Source of monitored-domain queries
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Queries matching `pattern` between `from` and `until`.
    ///
    /// Results may repeat events from earlier calls and need not be ordered.
    async fn fetch_queries(
        &self,
        pattern: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<QueryEvent>>;
}

/// Applies and lifts DNS blocks for a client.
///
/// Both calls must succeed when the client is already in the target state.
#[async_trait]
pub trait BlockingProvider: Send + Sync {
    async fn block(&self, client: &str, patterns: &[String]) -> Result<()>;

    async fn unblock(&self, client: &str) -> Result<()>;
}

/// Outbound alert channels. Delivery is best-effort.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, message: &str) -> Result<()>;

    async fn send_voice(&self, message: &str) -> Result<()>;
}

/// Text alerts over Telegram and voice alerts over the speaker, each optional
pub struct HouseholdNotifier {
    telegram: Option<TelegramClient>,
    speaker: Option<SpeakerClient>,
}

impl HouseholdNotifier {
    pub fn new(telegram: Option<TelegramClient>, speaker: Option<SpeakerClient>) -> Self {
        Self { telegram, speaker }
    }
}

#[async_trait]
impl Notifier for HouseholdNotifier {
    async fn send_text(&self, message: &str) -> Result<()> {
        match &self.telegram {
            Some(telegram) => telegram.send_message(message).await,
            None => {
                debug!("Telegram not configured, dropping text alert: {}", message);
                Ok(())
            }
        }
    }

    async fn send_voice(&self, message: &str) -> Result<()> {
        match &self.speaker {
            Some(speaker) => speaker.speak(message).await,
            None => {
                debug!("Speaker not configured, dropping voice alert: {}", message);
                Ok(())
            }
        }
    }
}
