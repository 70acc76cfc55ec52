use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

use crate::watch::{VoiceMessages, WatchConfig, validate_watch_config};

/// Default location of the daemon configuration
pub const DEFAULT_CONFIG_PATH: &str = "/etc/family-dns-limiter/config.yaml";

/// Commented configuration written by `init`
pub const EXAMPLE_CONFIG: &str = include_str!("../example-config.yaml");

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Daemon configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub pihole: PiholeConfig,

    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub speaker: SpeakerConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Pi-hole connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PiholeConfig {
    /// Base URL of the web interface, e.g. `http://192.168.1.2`
    #[serde(default)]
    pub address: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Seconds before a request is abandoned
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Maximum query log rows per fetch
    #[serde(default = "default_query_limit")]
    pub query_limit: u32,
}

/// Telegram text alerts; disabled unless both values are set
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TelegramConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
}

/// Network speaker voice alerts; disabled without a URL
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpeakerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_near_limit_message")]
    pub near_limit_message: String,

    #[serde(default = "default_limit_reached_message")]
    pub limit_reached_message: String,
}

/// Admin API settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values
fn default_request_timeout() -> u64 {
    10
}

fn default_query_limit() -> u32 {
    10_000
}

fn default_language() -> String {
    "en".to_string()
}

fn default_near_limit_message() -> String {
    "Less than five minutes remaining. Wrap it up.".to_string()
}

fn default_limit_reached_message() -> String {
    "Time's up. Viewing is now blocked.".to_string()
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8081))
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PiholeConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            password: None,
            request_timeout: default_request_timeout(),
            query_limit: default_query_limit(),
        }
    }
}

impl Default for SpeakerConfig {
    fn default() -> Self {
        Self {
            url: None,
            language: default_language(),
            near_limit_message: default_near_limit_message(),
            limit_reached_message: default_limit_reached_message(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl TelegramConfig {
    /// Token and chat id, when text alerts are enabled
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.bot_token.as_deref(), self.chat_id.as_deref()) {
            (Some(token), Some(chat)) => Some((token, chat)),
            _ => None,
        }
    }
}

impl SpeakerConfig {
    pub fn voice_messages(&self) -> VoiceMessages {
        VoiceMessages {
            near_limit: self.near_limit_message.clone(),
            limit_reached: self.limit_reached_message.clone(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, apply environment overrides and validate
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Like [`AppConfig::load`] with an explicit environment lookup
    pub fn load_with_env<F>(path: &Path, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_yaml_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else if env("PIHOLE_ADDRESS").is_some() {
            Self::default()
        } else {
            anyhow::bail!(
                "Config file not found: {} (run 'family-dns-limiter init' or set PIHOLE_ADDRESS)",
                path.display()
            );
        };

        config.apply_env_overrides(env)?;
        config.normalize();
        config.validate()?;

        Ok(config)
    }

    /// Parse without environment overrides or validation
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Invalid YAML configuration")
    }

    fn apply_env_overrides<F>(&mut self, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(address) = env("PIHOLE_ADDRESS") {
            self.pihole.address = address;
        }
        if let Some(password) = env("PIHOLE_PASSWORD") {
            self.pihole.password = Some(password);
        }
        if let Some(token) = env("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = Some(token);
        }
        if let Some(chat_id) = env("TELEGRAM_CHAT_ID") {
            self.telegram.chat_id = Some(chat_id);
        }
        if let Some(url) = env("SPEAKER_URL") {
            self.speaker.url = Some(url);
        }
        if let Some(language) = env("SPEAKER_LANGUAGE") {
            self.speaker.language = language;
        }
        if let Some(listen) = env("API_LISTEN") {
            self.api.listen = listen
                .parse()
                .with_context(|| format!("Invalid API_LISTEN address: {}", listen))?;
        }
        Ok(())
    }

    /// Treat blank optional values as unset
    fn normalize(&mut self) {
        fn blank_to_none(value: &mut Option<String>) {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *value = None;
            }
        }

        blank_to_none(&mut self.pihole.password);
        blank_to_none(&mut self.telegram.bot_token);
        blank_to_none(&mut self.telegram.chat_id);
        blank_to_none(&mut self.speaker.url);
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.pihole.address.trim().is_empty() {
            anyhow::bail!("Pi-hole address is required (pihole.address or PIHOLE_ADDRESS)");
        }
        validate_http_url(&self.pihole.address).context("Invalid Pi-hole address")?;

        if self.pihole.request_timeout == 0 {
            anyhow::bail!("Pi-hole request timeout must be greater than zero");
        }

        if self.pihole.query_limit == 0 {
            anyhow::bail!("Pi-hole query limit must be greater than zero");
        }

        validate_watch_config(&self.watch).context("Invalid watch settings")?;

        if self.telegram.bot_token.is_some() != self.telegram.chat_id.is_some() {
            anyhow::bail!("Telegram needs both bot_token and chat_id");
        }

        if let Some(url) = &self.speaker.url {
            validate_http_url(url).context("Invalid speaker URL")?;
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid log level '{}' (expected one of: {})",
                self.logging.level,
                LOG_LEVELS.join(", ")
            );
        }

        Ok(())
    }
}

fn validate_http_url(value: &str) -> Result<()> {
    let url = url::Url::parse(value).with_context(|| format!("Not a valid URL: {}", value))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!("URL must use http or https (got: {})", url.scheme());
    }

    if url.host_str().is_none() {
        anyhow::bail!("URL has no host: {}", value);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const MINIMAL: &str = "pihole:\n  address: http://192.168.1.2\n";

    #[test]
    fn example_config_is_valid() {
        let mut config = AppConfig::from_yaml_str(EXAMPLE_CONFIG).unwrap();
        config.normalize();
        config.validate().unwrap();

        assert_eq!(config.watch.poll_interval, 60);
        assert_eq!(config.watch.domains.len(), 7);
        assert!(config.pihole.password.is_none());
        assert!(config.telegram.credentials().is_none());
        assert!(config.speaker.url.is_none());
    }

    #[test]
    fn minimal_file_gets_defaults() {
        let temp = assert_fs::NamedTempFile::new("config.yaml").unwrap();
        temp.write_str(MINIMAL).unwrap();

        let config = AppConfig::load_with_env(temp.path(), no_env).unwrap();

        assert_eq!(config.pihole.request_timeout, 10);
        assert_eq!(config.pihole.query_limit, 10_000);
        assert_eq!(config.watch.daily_limit.to_seconds(), 3600);
        assert_eq!(config.api.listen, "0.0.0.0:8081".parse::<SocketAddr>().unwrap());
        assert_eq!(config.speaker.language, "en");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn missing_file_requires_pihole_address() {
        let dir = assert_fs::TempDir::new().unwrap();
        let path = dir.child("absent.yaml");

        let err = AppConfig::load_with_env(path.path(), no_env).unwrap_err();
        assert!(format!("{:#}", err).contains("Config file not found"));

        let config = AppConfig::load_with_env(
            path.path(),
            env_of(&[("PIHOLE_ADDRESS", "http://pi.hole"), ("PIHOLE_PASSWORD", "s3cret")]),
        )
        .unwrap();
        assert_eq!(config.pihole.address, "http://pi.hole");
        assert_eq!(config.pihole.password.as_deref(), Some("s3cret"));
    }

    #[test]
    fn env_overrides_file_values() {
        let temp = assert_fs::NamedTempFile::new("config.yaml").unwrap();
        temp.write_str(
            "pihole:\n  address: http://192.168.1.2\n\
             telegram:\n  bot_token: from-file\n  chat_id: \"1\"\n\
             speaker:\n  url: http://speaker.lan:8080\n",
        )
        .unwrap();

        let config = AppConfig::load_with_env(
            temp.path(),
            env_of(&[
                ("TELEGRAM_BOT_TOKEN", "from-env"),
                ("SPEAKER_LANGUAGE", "nl"),
                ("API_LISTEN", "127.0.0.1:9000"),
                ("PIHOLE_PASSWORD", "  "),
            ]),
        )
        .unwrap();

        assert_eq!(config.telegram.credentials(), Some(("from-env", "1")));
        assert_eq!(config.speaker.language, "nl");
        assert_eq!(config.api.listen, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        // blank variables are ignored
        assert!(config.pihole.password.is_none());
    }

    #[test]
    fn bad_api_listen_is_rejected() {
        let temp = assert_fs::NamedTempFile::new("config.yaml").unwrap();
        temp.write_str(MINIMAL).unwrap();

        let result = AppConfig::load_with_env(temp.path(), env_of(&[("API_LISTEN", "8081")]));
        assert!(result.is_err());
    }

    fn create_temp_yaml_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn invalid_yaml_mentions_file() {
        let temp = create_temp_yaml_config("pihole: [not, a, map");

        let err = AppConfig::load_with_env(temp.path(), no_env).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse config file"));
    }

    #[test]
    fn validation_rejects_bad_urls() {
        let mut config = AppConfig::from_yaml_str(MINIMAL).unwrap();
        assert!(config.validate().is_ok());

        config.pihole.address = "ftp://192.168.1.2".to_string();
        assert!(config.validate().is_err());

        config.pihole.address = "192.168.1.2".to_string();
        assert!(config.validate().is_err());

        config.pihole.address = "http://192.168.1.2".to_string();
        config.speaker.url = Some("file:///tmp/speaker".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_half_telegram_config() {
        let mut config = AppConfig::from_yaml_str(MINIMAL).unwrap();
        config.telegram.bot_token = Some("123:abc".to_string());
        assert!(config.validate().is_err());

        config.telegram.chat_id = Some("42".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation_covers_watch_settings() {
        let mut config = AppConfig::from_yaml_str(MINIMAL).unwrap();
        config.watch.poll_interval = 5;

        let err = config.validate().unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid watch settings"));
    }

    #[test]
    fn validation_rejects_unknown_log_level() {
        let mut config = AppConfig::from_yaml_str(MINIMAL).unwrap();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "DEBUG".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn speaker_messages_become_voice_messages() {
        let config = SpeakerConfig::default();
        let messages = config.voice_messages();
        assert_eq!(messages.limit_reached, "Time's up. Viewing is now blocked.");
        assert_eq!(messages.near_limit, "Less than five minutes remaining. Wrap it up.");
    }
}
