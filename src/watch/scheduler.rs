use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone};
use tracing::{debug, error, info};

use crate::providers::BlockingProvider;
use crate::watch::alerts::Alert;
use crate::watch::ledger::DailyLedger;

/// Decides when the once-a-day reset fires.
///
/// The reset is due when a poll cycle lands in
/// `[local midnight, local midnight + poll interval)`. A cycle that is
/// delayed past that window misses the reset for the day.
#[derive(Debug, Clone)]
pub struct DailyResetScheduler {
    poll_interval: Duration,
    last_reset: Option<NaiveDate>,
}

impl DailyResetScheduler {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            last_reset: None,
        }
    }

    /// Whether `now` lies inside today's reset window
    pub fn in_reset_window<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        match local_midnight(now) {
            Some(midnight) => *now >= midnight && *now < midnight.clone() + self.poll_interval,
            None => false,
        }
    }

    /// Check the window and, if due, mark today as done.
    ///
    /// Returns true at most once per calendar day.
    pub fn check_due<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) -> bool {
        if !self.in_reset_window(now) {
            return false;
        }

        let today = now.date_naive();
        if self.last_reset == Some(today) {
            debug!("Daily reset already ran for {}", today);
            return false;
        }

        self.last_reset = Some(today);
        true
    }

    pub fn last_reset(&self) -> Option<NaiveDate> {
        self.last_reset
    }
}

/// Start of the local day containing `now`.
///
/// Where a DST jump skips midnight, the first valid instant after it is used.
pub fn local_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let tz = now.timezone();
    let naive = now.date_naive().and_time(NaiveTime::MIN);

    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
}

/// Start a new day: lift every block, then clear all clients.
///
/// An unblock failure is reported but does not stop the pass. Whether the
/// failed client is cleared anyway is controlled by `clear_on_unblock_failure`.
pub async fn reset_day(
    ledger: &mut DailyLedger,
    blocker: &dyn BlockingProvider,
    clear_on_unblock_failure: bool,
) -> Vec<Alert> {
    info!("Running daily reset for {} clients", ledger.sessions().len());
    let mut alerts = Vec::new();

    for session in ledger.sessions_mut() {
        if session.blocked {
            info!("Client {} is blocked, unblocking", session.ip);
            if let Err(e) = blocker.unblock(&session.ip).await {
                error!("Failed to unblock client {}: {:#}", session.ip, e);
                alerts.push(Alert::UnblockFailed {
                    client: session.ip.clone(),
                    reason: format!("{:#}", e),
                });

                if !clear_on_unblock_failure {
                    continue;
                }
            }
        }

        session.clear_day();
    }

    ledger.clear_global_count();
    alerts
}
