use anyhow::Result;
use std::path::Path;

use crate::config::AppConfig;

/// Load and validate the configuration, then print what the daemon would use
pub fn check_config(config_path: &Path) -> Result<()> {
    let config = AppConfig::load(config_path)?;

    println!("✓ Configuration is valid: {}", config_path.display());
    println!();
    print!("{}", summarize(&config));

    Ok(())
}

fn enabled(on: bool) -> &'static str {
    if on { "enabled" } else { "disabled" }
}

fn summarize(config: &AppConfig) -> String {
    let watch = &config.watch;
    let mut out = String::new();

    out.push_str(&format!("Pi-hole:         {}\n", config.pihole.address));
    out.push_str(&format!(
        "  Password:      {}\n",
        if config.pihole.password.is_some() { "set" } else { "none" }
    ));
    out.push_str(&format!("Poll interval:   {}s\n", watch.poll_interval));
    out.push_str(&format!("Daily limit:     {}\n", watch.daily_limit));
    out.push_str(&format!("Watch window:    {}s\n", watch.watch_window));
    out.push_str(&format!("Near-limit warn: {}m\n", watch.near_limit_warning));
    out.push_str(&format!(
        "Midnight reset:  {}\n",
        if watch.daily_reset.clear_on_unblock_failure {
            "clear every client"
        } else {
            "keep clients whose unblock failed"
        }
    ));
    out.push_str(&format!("Domains ({}):\n", watch.domains.len()));
    for domain in &watch.domains {
        out.push_str(&format!("  - {}\n", domain));
    }
    out.push_str(&format!(
        "Telegram alerts: {}\n",
        enabled(config.telegram.credentials().is_some())
    ));
    out.push_str(&format!("Voice alerts:    {}\n", enabled(config.speaker.url.is_some())));
    out.push_str(&format!("Admin API:       {}\n", config.api.listen));
    out.push_str(&format!("Log level:       {}\n", config.logging.level));

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_lists_settings() {
        let config = AppConfig::from_yaml_str(
            r#"
pihole:
  address: "http://10.0.0.2"
  password: "secret"
watch:
  daily_limit:
    hours: 1
    minutes: 30
  domains:
    - "*youtube*"
telegram:
  bot_token: "123:abc"
  chat_id: "42"
"#,
        )
        .unwrap();

        let summary = summarize(&config);

        assert!(summary.contains("http://10.0.0.2"));
        assert!(summary.contains("Password:      set"));
        assert!(summary.contains("1h30m"));
        assert!(summary.contains("Domains (1):\n  - *youtube*"));
        assert!(summary.contains("Telegram alerts: enabled"));
        assert!(summary.contains("Voice alerts:    disabled"));
        assert!(!summary.contains("secret"));
    }
}
