use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::ApiError;

use super::key::QueryKey;

/// Type-erased query data. Each key is only ever fetched as one concrete type.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Lifecycle of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Never fetched (or reset).
    Idle,
    /// First fetch in flight, no data yet.
    Loading,
    /// Last fetch succeeded.
    Success,
    /// Last fetch failed.
    Error,
}

/// The cached state of one key.
///
/// `data` is only authoritative while `status` is [`QueryStatus::Success`]. A background
/// refetch keeps the status at `Success` and sets `is_fetching`.
#[derive(Clone)]
pub struct CacheEntry {
    pub key: QueryKey,
    pub status: QueryStatus,
    pub data: Option<Payload>,
    pub error: Option<ApiError>,
    pub last_fetched_at: Option<Instant>,
    pub is_fetching: bool,
    pub is_invalidated: bool,
    /// Bumped by [`reset`](Self::reset); fetches started before a reset are discarded.
    pub(crate) epoch: u64,
}

impl CacheEntry {
    /// An idle entry with no data.
    #[must_use]
    pub const fn new(key: QueryKey) -> Self {
        Self {
            key,
            status: QueryStatus::Idle,
            data: None,
            error: None,
            last_fetched_at: None,
            is_fetching: false,
            is_invalidated: false,
            epoch: 0,
        }
    }

    /// Marks the start of a fetch.
    pub fn begin_fetch(&mut self) {
        self.is_fetching = true;
        self.is_invalidated = false;
        if self.status != QueryStatus::Success {
            self.status = QueryStatus::Loading;
        }
    }

    /// Records the outcome of a fetch.
    ///
    /// An invalidation that arrived while the fetch was in flight is kept, so the caller
    /// can tell that the result may already be outdated.
    pub fn resolve(&mut self, result: Result<Payload, ApiError>) {
        self.is_fetching = false;
        self.last_fetched_at = Some(Instant::now());
        match result {
            Ok(data) => {
                self.status = QueryStatus::Success;
                self.data = Some(data);
                self.error = None;
            }
            Err(error) => {
                self.status = QueryStatus::Error;
                self.error = Some(error);
            }
        }
    }

    /// Stores `data` as a successful result without touching the fetch flag.
    pub fn set_data(&mut self, data: Payload) {
        self.status = QueryStatus::Success;
        self.data = Some(data);
        self.error = None;
        self.last_fetched_at = Some(Instant::now());
        self.is_invalidated = false;
    }

    /// Returns `true` if the data can be served without fetching.
    #[must_use]
    pub fn is_fresh(&self, stale_time: Duration) -> bool {
        self.status == QueryStatus::Success
            && !self.is_invalidated
            && self
                .last_fetched_at
                .is_some_and(|at| at.elapsed() < stale_time)
    }

    /// Marks this entry as stale.
    pub const fn mark_stale(&mut self) {
        self.is_invalidated = true;
    }

    /// Forgets data and error, back to `Idle`. The result of a fetch in flight is dropped.
    pub fn reset(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        self.is_fetching = false;
        self.status = QueryStatus::Idle;
        self.data = None;
        self.error = None;
        self.last_fetched_at = None;
        self.is_invalidated = false;
    }

    /// Downcasts the data to `V`.
    #[must_use]
    pub fn data_as<V: Clone + 'static>(&self) -> Option<V> {
        self.data
            .as_ref()
            .and_then(|data| data.downcast_ref::<V>())
            .cloned()
    }
}

impl fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("key", &self.key)
            .field("status", &self.status)
            .field("has_data", &self.data.is_some())
            .field("error", &self.error)
            .field("last_fetched_at", &self.last_fetched_at)
            .field("is_fetching", &self.is_fetching)
            .field("is_invalidated", &self.is_invalidated)
            .finish()
    }
}
