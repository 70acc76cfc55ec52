use chrono::Duration;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::providers::BlockingProvider;
use crate::watch::aggregator::{PollBatch, apply_batch};
use crate::watch::alerts::Alert;
use crate::watch::clock::Clock;
use crate::watch::config::WatchConfig;
use crate::watch::enforcement::LimitEnforcer;
use crate::watch::ledger::{DailyLedger, LedgerSnapshot};
use crate::watch::scheduler::{DailyResetScheduler, reset_day};

/// Why an admin reset did not happen
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResetError {
    #[error("client {0} not found")]
    NotFound(String),

    #[error("failed to unblock client {client}: {reason}")]
    UnblockFailed { client: String, reason: String },
}

/// Result of one applied poll cycle
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Queries accepted by the aggregator
    pub accepted: usize,
    /// Alerts for transitions committed during the cycle
    pub alerts: Vec<Alert>,
    /// Whether the daily reset ran
    pub daily_reset: bool,
}

struct StoreState {
    ledger: DailyLedger,
    reset: DailyResetScheduler,
}

/// Owner of the daily ledger.
///
/// Every operation runs under one readers-writer lock: snapshots share it,
/// while a poll cycle or an admin reset holds it exclusively for its whole
/// duration, including the blocking provider calls it makes.
pub struct StatsStore {
    state: RwLock<StoreState>,
    enforcer: LimitEnforcer,
    window: Duration,
    clear_on_unblock_failure: bool,
    blocker: Arc<dyn BlockingProvider>,
    clock: Arc<dyn Clock>,
}

impl StatsStore {
    pub fn new(config: &WatchConfig, blocker: Arc<dyn BlockingProvider>, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(StoreState {
                ledger: DailyLedger::new(config.domains.clone()),
                reset: DailyResetScheduler::new(config.poll_interval()),
            }),
            enforcer: LimitEnforcer::new(config),
            window: config.window(),
            clear_on_unblock_failure: config.daily_reset.clear_on_unblock_failure,
            blocker,
            clock,
        }
    }

    /// Consistent copy of the ledger
    pub async fn snapshot(&self) -> LedgerSnapshot {
        self.state.read().await.ledger.snapshot()
    }

    /// Aggregate a batch, evaluate every client, then run the daily reset if due.
    ///
    /// The returned alerts describe committed transitions and should be sent
    /// after this call returns.
    pub async fn apply_poll_cycle(&self, batch: &PollBatch) -> CycleReport {
        let mut guard = self.state.write().await;
        let StoreState { ledger, reset } = &mut *guard;

        let accepted = apply_batch(ledger, batch, self.window);
        let mut alerts = self.enforcer.evaluate_all(ledger, self.blocker.as_ref()).await;

        let now = self.clock.now();
        let daily_reset = reset.check_due(&now);
        if daily_reset {
            if let Some(day) = reset.last_reset() {
                info!("Running daily reset for {}", day);
            }
            alerts.extend(reset_day(ledger, self.blocker.as_ref(), self.clear_on_unblock_failure).await);
        }

        CycleReport {
            accepted,
            alerts,
            daily_reset,
        }
    }

    /// Unblock one client and clear its day.
    ///
    /// Nothing changes if the client is unknown or the unblock fails.
    pub async fn reset_client(&self, ip: &str) -> Result<(), ResetError> {
        let mut guard = self.state.write().await;
        let session = guard
            .ledger
            .get_mut(ip)
            .ok_or_else(|| ResetError::NotFound(ip.to_string()))?;

        info!("Admin reset: unblocking client {}", ip);
        if let Err(e) = self.blocker.unblock(ip).await {
            warn!("Admin reset: failed to unblock client {}: {:#}", ip, e);
            return Err(ResetError::UnblockFailed {
                client: ip.to_string(),
                reason: format!("{:#}", e),
            });
        }

        session.clear_day();
        info!("Admin reset: cleared stats for client {}", ip);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::QueryEvent;
    use crate::providers::fakes::FakeBlocker;
    use crate::watch::clock::MockClock;
    use async_trait::async_trait;
    use chrono::{DateTime, Local, TimeZone, Utc};
    use tokio::sync::Notify;

    fn noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap()
    }

    fn event(ip: &str, secs: i64) -> QueryEvent {
        QueryEvent {
            client: ip.to_string(),
            timestamp: noon().with_timezone(&Utc) + Duration::seconds(secs),
        }
    }

    /// Batch with one query every `W` seconds, enough to watch `windows` windows
    fn spaced(ip: &str, from: i64, windows: i64) -> PollBatch {
        PollBatch::merge((0..windows).map(|i| event(ip, from + i * 300)))
    }

    fn store_with(blocker: Arc<FakeBlocker>, clock: MockClock) -> StatsStore {
        StatsStore::new(&WatchConfig::default(), blocker, Arc::new(clock))
    }

    #[tokio::test]
    async fn test_cycle_is_visible_to_next_snapshot() {
        let blocker = Arc::new(FakeBlocker::default());
        let store = store_with(blocker, MockClock::new(noon()));

        let report = store
            .apply_poll_cycle(&PollBatch::merge(vec![event("10.0.0.5", 0), event("10.0.0.5", 100)]))
            .await;

        assert_eq!(report.accepted, 2);
        assert!(!report.daily_reset);
        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.global_count, 2);
        assert_eq!(snapshot.domains.len(), 7);
        let client = snapshot.client("10.0.0.5").unwrap();
        assert_eq!(client.requests_today, 2);
        assert_eq!(client.time_watched_today, Duration::seconds(300));
    }

    #[tokio::test]
    async fn test_cycle_blocks_over_limit_client() {
        let blocker = Arc::new(FakeBlocker::default());
        let store = store_with(blocker.clone(), MockClock::new(noon()));

        let report = store.apply_poll_cycle(&spaced("10.0.0.5", 0, 11)).await;
        assert!(matches!(&report.alerts[..], [Alert::NearLimit { .. }]));

        let report = store.apply_poll_cycle(&spaced("10.0.0.5", 11 * 300, 1)).await;
        assert!(report.alerts.is_empty());
        assert!(!store.snapshot().await.clients[0].blocked);

        let report = store.apply_poll_cycle(&spaced("10.0.0.5", 12 * 300, 1)).await;
        assert!(matches!(&report.alerts[..], [Alert::Blocked { .. }]));
        assert!(store.snapshot().await.clients[0].blocked);
        assert!(blocker.is_blocked("10.0.0.5"));
    }

    #[tokio::test]
    async fn test_daily_reset_runs_inside_midnight_window() {
        let blocker = Arc::new(FakeBlocker::default());
        let clock = MockClock::new(noon());
        let store = store_with(blocker.clone(), clock.clone());

        store.apply_poll_cycle(&spaced("10.0.0.5", 0, 13)).await;
        store.apply_poll_cycle(&spaced("10.0.0.6", 0, 2)).await;
        assert!(store.snapshot().await.clients[0].blocked);

        clock.set(Local.with_ymd_and_hms(2025, 6, 11, 0, 0, 20).unwrap());
        let report = store.apply_poll_cycle(&PollBatch::default()).await;

        assert!(report.daily_reset);
        assert_eq!(blocker.unblock_count(), 1);
        assert!(!blocker.is_blocked("10.0.0.5"));
        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.global_count, 0);
        for client in &snapshot.clients {
            assert!(!client.blocked);
            assert!(!client.notified_near_limit);
            assert_eq!(client.requests_today, 0);
            assert!(client.watch_intervals.is_empty());
        }

        // a second cycle inside the same window does not reset again
        clock.advance(Duration::seconds(30));
        assert!(!store.apply_poll_cycle(&PollBatch::default()).await.daily_reset);
    }

    #[tokio::test]
    async fn test_reset_client_clears_one_client() {
        let blocker = Arc::new(FakeBlocker::default());
        let store = store_with(blocker.clone(), MockClock::new(noon()));
        store.apply_poll_cycle(&spaced("10.0.0.5", 0, 13)).await;
        store.apply_poll_cycle(&spaced("10.0.0.6", 0, 3)).await;

        store.reset_client("10.0.0.5").await.unwrap();

        let snapshot = store.snapshot().await;
        let reset = snapshot.client("10.0.0.5").unwrap();
        assert!(!reset.blocked);
        assert_eq!(reset.requests_today, 0);
        assert_eq!(reset.time_watched_today, Duration::zero());
        assert!(!blocker.is_blocked("10.0.0.5"));
        assert_eq!(snapshot.client("10.0.0.6").unwrap().requests_today, 3);
    }

    #[tokio::test]
    async fn test_reset_unknown_client_changes_nothing() {
        let blocker = Arc::new(FakeBlocker::default());
        let store = store_with(blocker.clone(), MockClock::new(noon()));
        store.apply_poll_cycle(&spaced("10.0.0.5", 0, 2)).await;
        let before = store.snapshot().await;

        let result = store.reset_client("10.0.0.99").await;

        assert_eq!(result, Err(ResetError::NotFound("10.0.0.99".to_string())));
        assert_eq!(store.snapshot().await, before);
        assert_eq!(blocker.unblock_count(), 0);
    }

    #[tokio::test]
    async fn test_reset_with_failed_unblock_changes_nothing() {
        let blocker = Arc::new(FakeBlocker::default());
        let store = store_with(blocker.clone(), MockClock::new(noon()));
        store.apply_poll_cycle(&spaced("10.0.0.5", 0, 13)).await;
        let before = store.snapshot().await;
        blocker.fail_unblock_for("10.0.0.5", true);

        let result = store.reset_client("10.0.0.5").await;

        assert!(matches!(result, Err(ResetError::UnblockFailed { .. })));
        let after = store.snapshot().await;
        assert_eq!(after, before);
        assert!(after.clients[0].blocked);
    }

    /// Blocks until released, to hold a poll cycle mid-flight
    struct GatedBlocker {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl BlockingProvider for GatedBlocker {
        async fn block(&self, _client: &str, _patterns: &[String]) -> anyhow::Result<()> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(())
        }

        async fn unblock(&self, _client: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_snapshot_never_sees_partial_cycle() {
        let blocker = Arc::new(GatedBlocker {
            entered: Notify::new(),
            release: Notify::new(),
        });
        let store = Arc::new(StatsStore::new(
            &WatchConfig::default(),
            blocker.clone(),
            Arc::new(MockClock::new(noon())),
        ));

        let writer = {
            let store = store.clone();
            tokio::spawn(async move { store.apply_poll_cycle(&spaced("10.0.0.5", 0, 13)).await })
        };

        // the cycle is now holding the lock inside block()
        blocker.entered.notified().await;
        let pending = tokio::time::timeout(std::time::Duration::from_millis(50), store.snapshot()).await;
        assert!(pending.is_err(), "snapshot must wait for the cycle to finish");

        blocker.release.notify_one();
        writer.await.unwrap();

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.clients[0].requests_today, 13);
        assert!(snapshot.clients[0].blocked);
    }
}
