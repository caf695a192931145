//! Controller configuration.

use std::time::Duration;

use url::Url;

/// Number of feed lines retained before the oldest is dropped.
pub const DEFAULT_FEED_CAPACITY: usize = 50;

/// Connection settings for one hub.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Base URL of the hub's web server, e.g. `http://avion-hub.local`.
    pub url: Url,
    /// Per-request timeout for command POSTs.
    pub timeout: Duration,
    /// First reconnect delay after the event stream drops.
    pub reconnect_initial: Duration,
    /// Upper bound for the reconnect backoff.
    pub reconnect_max: Duration,
    /// Give up after this many consecutive failures; `None` retries forever.
    pub max_reconnect_attempts: Option<u32>,
    /// Diagnostics feed depth.
    pub feed_capacity: usize,
}

impl HubConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            timeout: Duration::from_secs(10),
            reconnect_initial: Duration::from_secs(1),
            reconnect_max: Duration::from_secs(30),
            max_reconnect_attempts: None,
            feed_capacity: DEFAULT_FEED_CAPACITY,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_reconnect(mut self, initial: Duration, max: Duration) -> Self {
        self.reconnect_initial = initial;
        self.reconnect_max = max;
        self
    }
}
