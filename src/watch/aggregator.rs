use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::providers::QueryEvent;
use crate::watch::ledger::{ClientSession, DailyLedger, WatchInterval};

/// What happened to a single query timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Not after the last accepted query: replayed or out of order
    Ignored,
    /// Landed inside the current interval, no extra time charged
    Extended,
    /// Opened a new interval and charged one window
    Opened,
}

/// Fold one query timestamp into a client's session.
///
/// A query is evidence of `window` worth of watching. Queries inside the
/// current interval are free, a gap shorter than `window` is bridged from
/// the previous interval's end, and a longer gap starts a fresh interval.
pub fn apply_event(session: &mut ClientSession, t: DateTime<Utc>, window: Duration) -> EventOutcome {
    if let Some(last) = session.last_query_time {
        if t <= last {
            return EventOutcome::Ignored;
        }
    }

    session.last_query_time = Some(t);
    session.requests_today += 1;

    let start = match session.watch_intervals.last_mut() {
        None => t,
        Some(current) if current.contains(t) => {
            current.requests += 1;
            return EventOutcome::Extended;
        }
        Some(current) => {
            if t - current.end < window {
                current.end
            } else {
                t
            }
        }
    };

    session.watch_intervals.push(WatchInterval::open(start, window));
    session.time_watched_today = session.time_watched_today + window;
    debug!(
        "Client {} opened interval at {} (watched today: {}s)",
        session.ip,
        start.format("%H:%M:%S"),
        session.time_watched_today.num_seconds()
    );

    EventOutcome::Opened
}

/// Fold a client's timestamps, in the order given, into its session.
///
/// Callers must pass timestamps sorted non-decreasing; `PollBatch` does.
/// Returns how many timestamps were accepted.
pub fn apply_events(session: &mut ClientSession, timestamps: &[DateTime<Utc>], window: Duration) -> usize {
    timestamps
        .iter()
        .filter(|&&t| apply_event(session, t, window) != EventOutcome::Ignored)
        .count()
}

/// One client's query times for a poll cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientEvents {
    pub ip: String,
    pub timestamps: Vec<DateTime<Utc>>,
}

/// Query events from one poll cycle, merged across every monitored pattern.
///
/// Identical (address, timestamp) pairs reported by more than one pattern
/// are collapsed. Each client's timestamps are globally sorted, and clients
/// are ordered by their earliest query so new sessions are created in the
/// order they were first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollBatch {
    clients: Vec<ClientEvents>,
    matched: u64,
}

impl PollBatch {
    pub fn merge<I>(events: I) -> Self
    where
        I: IntoIterator<Item = QueryEvent>,
    {
        let mut by_client: BTreeMap<String, BTreeSet<DateTime<Utc>>> = BTreeMap::new();
        for event in events {
            by_client.entry(event.client).or_default().insert(event.timestamp);
        }

        let mut clients: Vec<ClientEvents> = by_client
            .into_iter()
            .map(|(ip, timestamps)| ClientEvents {
                ip,
                timestamps: timestamps.into_iter().collect(),
            })
            .collect();
        // Sets are never empty, and the sort is stable over the address order
        clients.sort_by_key(|c| c.timestamps.first().copied());

        let matched = clients.iter().map(|c| c.timestamps.len() as u64).sum();
        Self { clients, matched }
    }

    pub fn clients(&self) -> &[ClientEvents] {
        &self.clients
    }

    /// Distinct matched queries in this batch
    pub fn matched(&self) -> u64 {
        self.matched
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

/// Apply a merged batch to the ledger, creating sessions lazily.
///
/// Returns the number of accepted (non-duplicate) queries.
pub fn apply_batch(ledger: &mut DailyLedger, batch: &PollBatch, window: Duration) -> usize {
    ledger.record_matched(batch.matched());

    batch
        .clients()
        .iter()
        .map(|events| {
            let session = ledger.get_or_create(&events.ip);
            apply_events(session, &events.timestamps, window)
        })
        .sum()
}
