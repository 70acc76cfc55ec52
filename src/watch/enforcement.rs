use chrono::Duration;
use tracing::{error, info};

use crate::providers::BlockingProvider;
use crate::watch::alerts::Alert;
use crate::watch::config::{TimeLimit, WatchConfig};
use crate::watch::ledger::{ClientSession, DailyLedger};

/// Drives the per-client `Clear -> NearLimitNotified -> Blocked` transitions.
///
/// Within a day the machine only moves forward. Once a client is blocked,
/// further watch time has no effect until a daily or admin reset.
#[derive(Debug, Clone)]
pub struct LimitEnforcer {
    daily_limit: Duration,
    limit_label: TimeLimit,
    near_limit: Duration,
    near_limit_minutes: u32,
    domains: Vec<String>,
}

impl LimitEnforcer {
    pub fn new(config: &WatchConfig) -> Self {
        Self {
            daily_limit: config.daily_limit(),
            limit_label: config.daily_limit,
            near_limit: config.near_limit_threshold(),
            near_limit_minutes: config.near_limit_warning,
            domains: config.domains.clone(),
        }
    }

    /// Evaluate one client and return alerts for the transitions it made
    pub async fn evaluate(
        &self,
        session: &mut ClientSession,
        blocker: &dyn BlockingProvider,
    ) -> Vec<Alert> {
        let mut alerts = Vec::new();

        if session.blocked {
            return alerts;
        }

        let remaining = session.remaining(self.daily_limit);

        if !session.notified_near_limit
            && remaining > Duration::zero()
            && remaining <= self.near_limit
        {
            info!(
                "Client {} has {}s left, sending near-limit warning",
                session.ip,
                remaining.num_seconds()
            );
            session.notified_near_limit = true;
            alerts.push(Alert::NearLimit {
                client: session.ip.clone(),
                remaining,
                threshold_minutes: self.near_limit_minutes,
            });
        }

        if session.time_watched_today > self.daily_limit {
            info!("Client {} reached limit {}, blocking", session.ip, self.limit_label);

            match blocker.block(&session.ip, &self.domains).await {
                Ok(()) => {
                    session.blocked = true;
                    info!("Client {} is now blocked", session.ip);
                    alerts.push(Alert::Blocked {
                        client: session.ip.clone(),
                        limit: self.limit_label,
                    });
                }
                Err(e) => {
                    // Left unblocked so the next cycle retries
                    error!("Failed to block client {}: {:#}", session.ip, e);
                    alerts.push(Alert::BlockFailed {
                        client: session.ip.clone(),
                        reason: format!("{:#}", e),
                    });
                }
            }
        }

        alerts
    }

    /// Evaluate every client in first-seen order
    pub async fn evaluate_all(
        &self,
        ledger: &mut DailyLedger,
        blocker: &dyn BlockingProvider,
    ) -> Vec<Alert> {
        let mut alerts = Vec::new();
        for session in ledger.sessions_mut() {
            alerts.extend(self.evaluate(session, blocker).await);
        }
        alerts
    }
}
