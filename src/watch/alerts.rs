use chrono::Duration;
use tracing::warn;

use crate::providers::Notifier;
use crate::watch::config::TimeLimit;

/// A notification produced by a committed state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
    /// Remaining time entered the warning range
    NearLimit {
        client: String,
        remaining: Duration,
        threshold_minutes: u32,
    },
    /// The client was blocked for the rest of the day
    Blocked { client: String, limit: TimeLimit },
    /// Blocking failed; retried next cycle
    BlockFailed { client: String, reason: String },
    /// Unblocking failed during the daily reset
    UnblockFailed { client: String, reason: String },
}

/// Spoken messages for the alerts that have a voice counterpart
#[derive(Debug, Clone)]
pub struct VoiceMessages {
    pub near_limit: String,
    pub limit_reached: String,
}

impl Alert {
    pub fn client(&self) -> &str {
        match self {
            Alert::NearLimit { client, .. }
            | Alert::Blocked { client, .. }
            | Alert::BlockFailed { client, .. }
            | Alert::UnblockFailed { client, .. } => client,
        }
    }

    /// Message for the text channel
    pub fn text(&self) -> String {
        match self {
            Alert::NearLimit {
                client,
                remaining,
                threshold_minutes,
            } => format!(
                "Client {} has less than {} minutes left ({})",
                client,
                threshold_minutes,
                format_remaining(*remaining)
            ),
            Alert::Blocked { client, limit } => {
                format!("Client {} reached limit {} and is now blocked", client, limit)
            }
            Alert::BlockFailed { client, reason } => {
                format!("Failed to block client {}: {}", client, reason)
            }
            Alert::UnblockFailed { client, reason } => {
                format!("Failed to unblock client {}: {}", client, reason)
            }
        }
    }

    /// Message for the voice channel, if this alert is spoken
    pub fn voice<'a>(&self, messages: &'a VoiceMessages) -> Option<&'a str> {
        match self {
            Alert::NearLimit { .. } => Some(&messages.near_limit),
            Alert::Blocked { .. } => Some(&messages.limit_reached),
            Alert::BlockFailed { .. } | Alert::UnblockFailed { .. } => None,
        }
    }
}

/// Round to the nearest minute for display
fn format_remaining(remaining: Duration) -> String {
    let minutes = (remaining.num_seconds() + 30) / 60;
    if minutes < 1 {
        "under a minute".to_string()
    } else if minutes == 1 {
        "1 minute".to_string()
    } else {
        format!("{} minutes", minutes)
    }
}

/// Deliver alerts after their transitions are committed.
///
/// Failures are logged and never propagate.
pub async fn dispatch(notifier: &dyn Notifier, messages: &VoiceMessages, alerts: &[Alert]) {
    for alert in alerts {
        let text = alert.text();
        if let Err(e) = notifier.send_text(&text).await {
            warn!("Failed to send text alert for {}: {:#}", alert.client(), e);
        }

        if let Some(voice) = alert.voice(messages) {
            if let Err(e) = notifier.send_voice(voice).await {
                warn!("Failed to send voice alert for {}: {:#}", alert.client(), e);
            }
        }
    }
}
