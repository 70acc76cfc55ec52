use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

use crate::admin;
use crate::commands::utils::init_logging;
use crate::config::AppConfig;
use crate::providers::{HouseholdNotifier, PiholeClient, SpeakerClient, TelegramClient};
use crate::watch::clock::Clock;
use crate::watch::{StatsStore, SystemClock, WatchTracker};

/// Start the limiter in the foreground
pub fn start(config_path: &Path, verbose: bool) -> Result<()> {
    let config = AppConfig::load(config_path)?;
    init_logging(verbose, Some(&config.logging.level));

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(run_daemon(config))
}

/// Run the poll loop and the admin API until Ctrl+C
pub async fn run_daemon(config: AppConfig) -> Result<()> {
    info!("Starting family-dns-limiter v{}", env!("CARGO_PKG_VERSION"));
    info!("Pi-hole: {}", config.pihole.address);
    info!(
        "Daily limit: {}, watch window: {}s, near-limit warning: {}m",
        config.watch.daily_limit, config.watch.watch_window, config.watch.near_limit_warning
    );

    let pihole = Arc::new(PiholeClient::new(&config.pihole)?);
    let notifier = Arc::new(build_notifier(&config)?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let store = Arc::new(StatsStore::new(&config.watch, pihole.clone(), clock.clone()));
    let tracker = WatchTracker::new(
        &config.watch,
        store.clone(),
        pihole,
        notifier,
        clock,
        config.speaker.voice_messages(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
        let _ = shutdown_tx.send(true);
    });

    tokio::try_join!(
        tracker.run(shutdown_rx.clone()),
        admin::serve(config.api.listen, store, shutdown_rx),
    )?;

    info!("Shutdown complete");
    Ok(())
}

fn build_notifier(config: &AppConfig) -> Result<HouseholdNotifier> {
    let telegram = match config.telegram.credentials() {
        Some((token, chat_id)) => {
            info!("Telegram alerts enabled for chat {}", chat_id);
            Some(TelegramClient::new(token, chat_id)?)
        }
        None => {
            info!("Telegram alerts disabled");
            None
        }
    };

    let speaker = match &config.speaker.url {
        Some(url) => {
            info!("Voice alerts enabled via {}", url);
            Some(SpeakerClient::new(url, &config.speaker.language)?)
        }
        None => {
            info!("Voice alerts disabled");
            None
        }
    };

    Ok(HouseholdNotifier::new(telegram, speaker))
}
