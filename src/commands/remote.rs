use anyhow::{Context, Result};
use chrono::Local;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::Path;
use tracing::debug;

use crate::admin::AdminClient;
use crate::commands::utils::format_duration;
use crate::config::AppConfig;
use crate::watch::LedgerSnapshot;

const DEFAULT_API_URL: &str = "http://127.0.0.1:8081";

/// Print today's per-client stats from a running daemon
pub fn status(api: Option<String>, config_path: &Path) -> Result<()> {
    let base = resolve_api_url(api, config_path);
    let client = AdminClient::new(&base)?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let snapshot = runtime.block_on(client.stats())?;

    print!("{}", render_stats(&snapshot));
    Ok(())
}

/// Lift a client's block and clear its day on a running daemon
pub fn reset(ip: &str, api: Option<String>, config_path: &Path) -> Result<()> {
    let base = resolve_api_url(api, config_path);
    let client = AdminClient::new(&base)?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let message = runtime
        .block_on(client.reset(ip))
        .with_context(|| format!("Failed to reset {}", ip))?;

    println!("✓ {}", message.trim());
    Ok(())
}

/// `--api` if given, else the configured listen address, else the default port on localhost
fn resolve_api_url(api: Option<String>, config_path: &Path) -> String {
    if let Some(api) = api {
        return api;
    }

    match AppConfig::load(config_path) {
        Ok(config) => api_url_for(config.api.listen),
        Err(e) => {
            debug!("Using {} ({:#})", DEFAULT_API_URL, e);
            DEFAULT_API_URL.to_string()
        }
    }
}

/// URL that reaches a daemon listening on `listen` from the same host
fn api_url_for(listen: SocketAddr) -> String {
    let host = match listen.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    format!("http://{}", SocketAddr::new(host, listen.port()))
}

fn render_stats(snapshot: &LedgerSnapshot) -> String {
    let mut out = String::new();

    out.push_str("Family DNS Limiter Status\n");
    out.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
    out.push_str(&format!("Matched queries today: {}\n", snapshot.global_count));
    out.push_str(&format!("Watched patterns:      {}\n", snapshot.domains.join(", ")));
    out.push('\n');

    if snapshot.clients.is_empty() {
        out.push_str("No clients seen today\n");
        return out;
    }

    out.push_str(&format!(
        "{:<40} {:>9} {:>9} {:>9} {:>10}  {}\n",
        "CLIENT", "REQUESTS", "WATCHED", "INTERVALS", "LAST SEEN", "STATE"
    ));
    for client in &snapshot.clients {
        let last_seen = client
            .last_query_time
            .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        let state = if client.blocked {
            "BLOCKED"
        } else if client.notified_near_limit {
            "warned"
        } else {
            "ok"
        };

        out.push_str(&format!(
            "{:<40} {:>9} {:>9} {:>9} {:>10}  {}\n",
            client.ip,
            client.requests_today,
            format_duration(client.time_watched_today),
            client.watch_intervals.len(),
            last_seen,
            state
        ));
    }

    out
}
