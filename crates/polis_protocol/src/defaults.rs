//! Canonical default values shared across the control plane.

/// Periodic sync tick.
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 60;

/// StreamQuery page size; the service caps this server-side.
pub const DEFAULT_STREAM_LIMIT: usize = 1_000;

/// Feed cache size cap.
pub const DEFAULT_FEED_CAP: usize = 500;

/// Feed is reported stale past this refresh age.
pub const DEFAULT_FEED_STALE_SECS: i64 = 15 * 60;

/// Timeout for peer site fetches.
pub const FETCH_TIMEOUT_SECS: u64 = 5;

/// Timeout for discovery calls.
pub const DISCOVERY_TIMEOUT_SECS: u64 = 30;

/// Redirect hops the remote fetcher will follow.
pub const FETCH_MAX_REDIRECTS: usize = 2;

/// User agent for all outbound HTTP.
pub const USER_AGENT: &str = concat!("polis-server/", env!("CARGO_PKG_VERSION"));

/// Public discovery endpoint used when none is configured.
pub const DEFAULT_DISCOVERY_URL: &str = "https://discovery.polis.pub";

/// Metadata backfill cap per request, bounds follow-list latency.
pub const FOLLOW_BACKFILL_CAP: usize = 3;

/// Title derivation bound for publish.
pub const MAX_TITLE_LEN: usize = 80;
