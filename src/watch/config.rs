use anyhow::{Context, Result};
use chrono::Duration;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

/// Domain glob: letters, digits, dots, hyphens and the `*`/`?` wildcards
static DOMAIN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9.*?-]+$").expect("domain pattern regex is valid"));

/// Longest accepted watch window (seconds)
const MAX_WATCH_WINDOW: i64 = 86_400;

/// Values the watch-time engine consumes
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatchConfig {
    /// How often the query log is polled (seconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    /// Daily watching budget per client
    #[serde(default = "default_daily_limit")]
    pub daily_limit: TimeLimit,

    /// Time credited per watch interval (seconds)
    #[serde(default = "default_watch_window")]
    pub watch_window: u64,

    /// Warn once when this many minutes or fewer remain
    #[serde(default = "default_near_limit_warning")]
    pub near_limit_warning: u32,

    /// Domain globs whose queries count as watching
    #[serde(default = "default_domains")]
    pub domains: Vec<String>,

    /// Midnight reset behavior
    #[serde(default)]
    pub daily_reset: DailyResetConfig,
}

fn default_poll_interval() -> u64 {
    60
}

fn default_daily_limit() -> TimeLimit {
    TimeLimit { hours: 1, minutes: 0 }
}

fn default_watch_window() -> u64 {
    300 // 5 minutes
}

fn default_near_limit_warning() -> u32 {
    5
}

fn default_domains() -> Vec<String> {
    [
        "*youtube*",
        "*googlevideo*",
        "*.ggpht.com",
        "*.youtu.be",
        "*.yt.be",
        "*.ytimg.com",
        "*googleusercontent.com",
    ]
    .iter()
    .map(|d| d.to_string())
    .collect()
}

fn default_true() -> bool {
    true
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            daily_limit: default_daily_limit(),
            watch_window: default_watch_window(),
            near_limit_warning: default_near_limit_warning(),
            domains: default_domains(),
            daily_reset: DailyResetConfig::default(),
        }
    }
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::seconds(self.poll_interval as i64)
    }

    pub fn daily_limit(&self) -> Duration {
        Duration::seconds(self.daily_limit.to_seconds())
    }

    /// Width of one watch interval, capped at a day
    pub fn window(&self) -> Duration {
        let secs = i64::try_from(self.watch_window).unwrap_or(i64::MAX);
        Duration::seconds(secs.min(MAX_WATCH_WINDOW))
    }

    pub fn near_limit_threshold(&self) -> Duration {
        Duration::minutes(self.near_limit_warning as i64)
    }
}

/// Daily limit expressed as hours and minutes
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct TimeLimit {
    #[serde(default)]
    pub hours: u32,
    #[serde(default)]
    pub minutes: u32,
}

impl TimeLimit {
    /// Convert to total seconds
    pub fn to_seconds(&self) -> i64 {
        (self.hours as i64 * 3600) + (self.minutes as i64 * 60)
    }
}

impl fmt::Display for TimeLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.hours, self.minutes) {
            (0, m) => write!(f, "{}m", m),
            (h, 0) => write!(f, "{}h", h),
            (h, m) => write!(f, "{}h{}m", h, m),
        }
    }
}

/// What the midnight reset does for a client whose unblock call failed
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DailyResetConfig {
    /// Clear the client's counters and flags anyway.
    ///
    /// When false the client is left blocked with its counters intact until
    /// an admin reset succeeds.
    #[serde(default = "default_true")]
    pub clear_on_unblock_failure: bool,
}

impl Default for DailyResetConfig {
    fn default() -> Self {
        Self {
            clear_on_unblock_failure: true,
        }
    }
}

/// Validate the watch settings
pub fn validate_watch_config(config: &WatchConfig) -> Result<()> {
    if config.poll_interval < 10 {
        anyhow::bail!("Poll interval must be at least 10 seconds (got: {})", config.poll_interval);
    }

    // The midnight window is one poll interval wide; it has to fit in a day
    if config.poll_interval >= 86_400 {
        anyhow::bail!("Poll interval must be shorter than a day (got: {})", config.poll_interval);
    }

    if config.daily_limit.to_seconds() == 0 {
        anyhow::bail!("Daily limit must be greater than zero");
    }

    if config.watch_window == 0 {
        anyhow::bail!("Watch window must be greater than zero");
    }

    if i64::try_from(config.watch_window).map_or(true, |w| w > MAX_WATCH_WINDOW) {
        anyhow::bail!(
            "Watch window must be at most {} seconds (got: {})",
            MAX_WATCH_WINDOW,
            config.watch_window
        );
    }

    if config.domains.is_empty() {
        anyhow::bail!("At least one monitored domain pattern is required");
    }

    let mut seen = HashSet::new();
    for pattern in &config.domains {
        validate_domain_pattern(pattern)
            .with_context(|| format!("Invalid domain pattern '{}'", pattern))?;

        if !seen.insert(pattern.to_lowercase()) {
            anyhow::bail!("Duplicate domain pattern: {}", pattern);
        }
    }

    Ok(())
}

/// Validate a single domain glob
fn validate_domain_pattern(pattern: &str) -> Result<()> {
    if pattern.trim().is_empty() {
        anyhow::bail!("Domain pattern cannot be empty");
    }

    if !DOMAIN_PATTERN.is_match(pattern) {
        anyhow::bail!("Only letters, digits, '.', '-', '*' and '?' are allowed");
    }

    if pattern.chars().all(|c| c == '*' || c == '?' || c == '.') {
        anyhow::bail!("Pattern would match every domain");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WatchConfig::default();
        assert_eq!(config.poll_interval(), Duration::seconds(60));
        assert_eq!(config.daily_limit(), Duration::seconds(3600));
        assert_eq!(config.window(), Duration::seconds(300));
        assert_eq!(config.near_limit_threshold(), Duration::seconds(300));
        assert_eq!(config.domains.len(), 7);
        assert!(config.daily_reset.clear_on_unblock_failure);
        assert!(validate_watch_config(&config).is_ok());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "daily_limit:\n  hours: 2\n  minutes: 30\nnear_limit_warning: 10\n";
        let config: WatchConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.daily_limit(), Duration::seconds(9000));
        assert_eq!(config.near_limit_threshold(), Duration::minutes(10));
        assert_eq!(config.watch_window, 300);
        assert_eq!(config.domains, default_domains());
    }

    #[test]
    fn test_time_limit_conversion() {
        let limit = TimeLimit { hours: 2, minutes: 30 };
        assert_eq!(limit.to_seconds(), 9000);

        assert_eq!(TimeLimit { hours: 0, minutes: 90 }.to_seconds(), 5400);
    }

    #[test]
    fn test_time_limit_display() {
        assert_eq!(TimeLimit { hours: 1, minutes: 0 }.to_string(), "1h");
        assert_eq!(TimeLimit { hours: 0, minutes: 45 }.to_string(), "45m");
        assert_eq!(TimeLimit { hours: 1, minutes: 30 }.to_string(), "1h30m");
    }

    #[test]
    fn test_validate_rejects_short_poll_interval() {
        let config = WatchConfig {
            poll_interval: 5,
            ..Default::default()
        };
        assert!(validate_watch_config(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_day_long_poll_interval() {
        let config = WatchConfig {
            poll_interval: 86_400,
            ..Default::default()
        };
        assert!(validate_watch_config(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_limit_and_window() {
        let config = WatchConfig {
            daily_limit: TimeLimit { hours: 0, minutes: 0 },
            ..Default::default()
        };
        assert!(validate_watch_config(&config).is_err());

        let config = WatchConfig {
            watch_window: 0,
            ..Default::default()
        };
        assert!(validate_watch_config(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_window() {
        let config = WatchConfig {
            watch_window: 86_400,
            ..Default::default()
        };
        assert!(validate_watch_config(&config).is_ok());

        for watch_window in [86_401, 1_000_000_000_000_000, u64::MAX] {
            let config = WatchConfig {
                watch_window,
                ..Default::default()
            };
            let err = validate_watch_config(&config).unwrap_err();
            assert!(err.to_string().contains("at most 86400 seconds"));
        }
    }

    #[test]
    fn test_window_never_wraps_negative() {
        let config = WatchConfig {
            watch_window: u64::MAX,
            ..Default::default()
        };
        assert_eq!(config.window(), Duration::seconds(86_400));

        let config = WatchConfig {
            watch_window: 1_000_000_000_000_000,
            ..Default::default()
        };
        assert_eq!(config.window(), Duration::seconds(86_400));
    }

    #[test]
    fn test_validate_domain_patterns() {
        let mut config = WatchConfig::default();

        config.domains = vec![];
        assert!(validate_watch_config(&config).is_err());

        config.domains = vec!["*youtube*".to_string(), "*YouTube*".to_string()];
        assert!(validate_watch_config(&config).is_err());

        config.domains = vec!["  ".to_string()];
        assert!(validate_watch_config(&config).is_err());

        config.domains = vec!["*.*".to_string()];
        assert!(validate_watch_config(&config).is_err());

        config.domains = vec!["you tube.com".to_string()];
        assert!(validate_watch_config(&config).is_err());

        config.domains = vec!["*.twitch.tv".to_string(), "tiktok?.com".to_string()];
        assert!(validate_watch_config(&config).is_ok());
    }
}
