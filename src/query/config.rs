use std::time::Duration;

/// Upper bound for the delay between two retries.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Store-wide defaults for every query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    /// How long fetched data counts as fresh.
    ///
    /// Mounting a query whose data is fresh does not fetch. With the default of zero every
    /// mount refetches while still showing the cached data.
    pub stale_time: Duration,

    /// How long an entry without observers is kept before it is garbage collected.
    pub cache_time: Duration,

    /// Extra attempts after a failed fetch.
    pub retry: u32,

    /// Delay before the first retry; doubles on every further attempt.
    pub retry_delay: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            stale_time: Duration::from_secs(0),
            cache_time: Duration::from_secs(5 * 60),
            retry: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl QueryConfig {
    /// A configuration with the given stale and cache times and default retries.
    #[must_use]
    pub fn new(stale_time: Duration, cache_time: Duration) -> Self {
        Self {
            stale_time,
            cache_time,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub const fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Delay before retry number `attempt` (starting at 0).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1_u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.retry_delay
            .checked_mul(factor)
            .map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY))
    }
}

/// Per-query overrides of [`QueryConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// When `false` the fetcher is never called.
    pub enabled: bool,
    /// Retry count; `None` uses the store default.
    pub retry: Option<u32>,
    /// Stale time; `None` uses the store default.
    pub stale_time: Option<Duration>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            retry: None,
            stale_time: None,
        }
    }
}

impl QueryOptions {
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub const fn retry(mut self, retry: u32) -> Self {
        self.retry = Some(retry);
        self
    }

    #[must_use]
    pub const fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }
}
