use anyhow::{Context, Result};
use chrono::Duration;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, Level};

use crate::providers::{EventSource, Notifier};
use crate::watch::aggregator::PollBatch;
use crate::watch::alerts::{self, VoiceMessages};
use crate::watch::clock::Clock;
use crate::watch::config::WatchConfig;
use crate::watch::store::{CycleReport, StatsStore};

/// Poll loop driver
pub struct WatchTracker {
    store: Arc<StatsStore>,
    source: Arc<dyn EventSource>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    domains: Vec<String>,
    poll_interval: Duration,
    messages: VoiceMessages,
}

impl WatchTracker {
    pub fn new(
        config: &WatchConfig,
        store: Arc<StatsStore>,
        source: Arc<dyn EventSource>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        messages: VoiceMessages,
    ) -> Self {
        Self {
            store,
            source,
            notifier,
            clock,
            domains: config.domains.clone(),
            poll_interval: config.poll_interval(),
            messages,
        }
    }

    /// Run poll cycles until `shutdown` turns true or its sender is dropped.
    ///
    /// The first cycle runs immediately. A slow cycle delays the next tick
    /// instead of bursting to catch up.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let period = self
            .poll_interval
            .to_std()
            .context("Poll interval must be positive")?;

        info!(
            "Starting watch tracker: polling {} patterns every {}s",
            self.domains.len(),
            period.as_secs()
        );

        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.track_iteration().await {
                        error!("Error in tracking iteration: {:#}", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Watch tracker stopped");
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// Single poll cycle.
    ///
    /// Any fetch error aborts the cycle before the ledger is touched; the
    /// next cycle's window overlaps enough to pick the queries back up.
    pub async fn track_iteration(&self) -> Result<CycleReport> {
        let until = self.clock.now_utc();
        let from = until - self.poll_interval;

        let mut events = Vec::new();
        for pattern in &self.domains {
            let found = self
                .source
                .fetch_queries(pattern, from, until)
                .await
                .with_context(|| format!("Failed to fetch queries for {}", pattern))?;
            debug!("Pattern {} matched {} queries", pattern, found.len());
            events.extend(found);
        }

        let batch = PollBatch::merge(events);
        if batch.is_empty() {
            debug!("No watch queries in the last {}s", self.poll_interval.num_seconds());
        }
        let report = self.store.apply_poll_cycle(&batch).await;

        if report.daily_reset {
            info!("Daily reset completed");
        }

        // Lock is released; alerts describe committed state
        alerts::dispatch(self.notifier.as_ref(), &self.messages, &report.alerts).await;

        if tracing::enabled!(Level::DEBUG) {
            self.log_client_stats().await;
        }

        Ok(report)
    }

    async fn log_client_stats(&self) {
        let snapshot = self.store.snapshot().await;
        debug!(
            "{} clients, {} matched queries today",
            snapshot.clients.len(),
            snapshot.global_count
        );
        for client in &snapshot.clients {
            debug!(
                "Client {}: {} requests, {}s watched, {} intervals, blocked={}",
                client.ip,
                client.requests_today,
                client.time_watched_today.num_seconds(),
                client.watch_intervals.len(),
                client.blocked
            );
        }
    }
}
