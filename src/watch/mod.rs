/// Watch-time engine
///
/// This module turns per-client DNS query timestamps into daily watch time:
/// - Aggregate queries into fixed-width watch intervals
/// - Warn near the limit and block once it is exceeded
/// - Reset every client at local midnight
/// - Share one ledger between the poll loop and the admin API

pub mod aggregator;
pub mod alerts;
pub mod clock;
pub mod config;
pub mod enforcement;
pub mod ledger;
pub mod scheduler;
pub mod store;
pub mod tracker;

pub use alerts::VoiceMessages;
pub use clock::SystemClock;
pub use config::{WatchConfig, validate_watch_config};
pub use ledger::LedgerSnapshot;
pub use store::{ResetError, StatsStore};
pub use tracker::WatchTracker;
