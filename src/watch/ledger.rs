use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A fixed-width window of assumed continuous watching
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct WatchInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub requests: u32,
}

impl WatchInterval {
    /// Open a new interval of `width` starting at `start`, charged with one request
    pub fn open(start: DateTime<Utc>, width: Duration) -> Self {
        Self {
            start,
            end: start + width,
            requests: 1,
        }
    }

    /// Whether `t` falls inside the half-open range `[start, end)`
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }
}

/// Watch-time state for a single network client
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ClientSession {
    pub ip: String,
    pub requests_today: u64,
    #[serde(with = "duration_secs")]
    pub time_watched_today: Duration,
    pub watch_intervals: Vec<WatchInterval>,
    pub last_query_time: Option<DateTime<Utc>>,
    pub blocked: bool,
    pub notified_near_limit: bool,
}

impl ClientSession {
    /// Create an empty session for a newly observed address
    pub fn new(ip: &str) -> Self {
        Self {
            ip: ip.to_string(),
            requests_today: 0,
            time_watched_today: Duration::zero(),
            watch_intervals: Vec::new(),
            last_query_time: None,
            blocked: false,
            notified_near_limit: false,
        }
    }

    /// Time left before `limit` is reached (negative once exceeded)
    pub fn remaining(&self, limit: Duration) -> Duration {
        limit - self.time_watched_today
    }

    /// Clear today's counters and both enforcement flags.
    ///
    /// `last_query_time` survives so replayed queries from before the
    /// reset are still rejected.
    pub fn clear_day(&mut self) {
        self.requests_today = 0;
        self.time_watched_today = Duration::zero();
        self.watch_intervals.clear();
        self.notified_near_limit = false;
        self.blocked = false;
    }
}

/// All client sessions observed today.
///
/// Sessions are never removed, so the address index stays valid and
/// `sessions` keeps first-seen order for reporting.
#[derive(Debug, Clone, Default)]
pub struct DailyLedger {
    domains: Vec<String>,
    global_count: u64,
    sessions: Vec<ClientSession>,
    index: HashMap<String, usize>,
}

impl DailyLedger {
    pub fn new(domains: Vec<String>) -> Self {
        Self {
            domains,
            ..Default::default()
        }
    }

    /// Get or create the session for an address
    pub fn get_or_create(&mut self, ip: &str) -> &mut ClientSession {
        let pos = match self.index.get(ip) {
            Some(&pos) => pos,
            None => {
                self.sessions.push(ClientSession::new(ip));
                let pos = self.sessions.len() - 1;
                self.index.insert(ip.to_string(), pos);
                pos
            }
        };
        &mut self.sessions[pos]
    }

    pub fn get(&self, ip: &str) -> Option<&ClientSession> {
        self.index.get(ip).map(|&pos| &self.sessions[pos])
    }

    pub fn get_mut(&mut self, ip: &str) -> Option<&mut ClientSession> {
        self.index.get(ip).map(|&pos| &mut self.sessions[pos])
    }

    /// Sessions in first-seen order
    pub fn sessions(&self) -> &[ClientSession] {
        &self.sessions
    }

    pub fn sessions_mut(&mut self) -> &mut [ClientSession] {
        &mut self.sessions
    }

    pub fn global_count(&self) -> u64 {
        self.global_count
    }

    /// Add matched queries observed in a poll cycle to today's total
    pub fn record_matched(&mut self, count: u64) {
        self.global_count += count;
    }

    /// Reset the day-scoped ledger total
    pub fn clear_global_count(&mut self) {
        self.global_count = 0;
    }

    /// Produce an owned copy that can be read without holding the store lock
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            domains: self.domains.clone(),
            global_count: self.global_count,
            clients: self.sessions.clone(),
        }
    }
}

/// Point-in-time copy of the ledger, as served by the admin API
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LedgerSnapshot {
    pub domains: Vec<String>,
    pub global_count: u64,
    pub clients: Vec<ClientSession>,
}

impl LedgerSnapshot {
    pub fn client(&self, ip: &str) -> Option<&ClientSession> {
        self.clients.iter().find(|c| c.ip == ip)
    }
}

/// Serialize a `chrono::Duration` as whole seconds
mod duration_secs {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = i64::deserialize(deserializer)?;
        Ok(Duration::seconds(secs))
    }
}
