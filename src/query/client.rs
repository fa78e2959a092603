use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream;
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::command::Command;
use crate::error::ApiError;

use super::cache::{CacheEntry, Payload};
use super::config::{QueryConfig, QueryOptions};
use super::key::{QueryFilter, QueryKey};

/// A type-erased fetcher as registered by a [`Query`](super::Query).
pub(crate) type Fetcher =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Payload, ApiError>> + Send + Sync>;

/// Observer bookkeeping of one key.
struct Observers {
    fetcher: Option<Fetcher>,
    retry: Option<u32>,
    /// Mounted observers.
    count: usize,
    /// Mounted observers with `enabled = true`; only these cause fetches.
    active: usize,
    /// When `count` last dropped to zero.
    released_at: Option<Instant>,
}

struct Slot {
    key: QueryKey,
    entry: watch::Sender<CacheEntry>,
    observers: Mutex<Observers>,
}

impl Slot {
    fn new(key: QueryKey) -> Self {
        let (entry, _) = watch::channel(CacheEntry::new(key.clone()));
        Self {
            key,
            entry,
            observers: Mutex::new(Observers {
                fetcher: None,
                retry: None,
                count: 0,
                active: 0,
                released_at: Some(Instant::now()),
            }),
        }
    }

    fn observers(&self) -> MutexGuard<'_, Observers> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases an observer when dropped.
pub(crate) struct ObserverGuard {
    slot: Arc<Slot>,
    enabled: bool,
}

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        let mut observers = self.slot.observers();
        observers.count = observers.count.saturating_sub(1);
        if self.enabled {
            observers.active = observers.active.saturating_sub(1);
        }
        if observers.count == 0 {
            observers.released_at = Some(Instant::now());
        }
        trace!(key = %self.slot.key, observers = observers.count, "observer released");
    }
}

/// The shared query cache.
///
/// One entry per [`QueryKey`], each published through its own watch channel so observers
/// of a key are woken only by changes to that key. The client is a cheap handle: clones
/// share the same cache.
///
/// # Example
///
/// ```
/// use avitolog::query::{QueryClient, QueryConfig, QueryKey};
/// use std::time::Duration;
///
/// let client = QueryClient::with_config(QueryConfig::new(
///     Duration::from_secs(30),  // stale_time
///     Duration::from_secs(300), // cache_time
/// ));
///
/// let key = QueryKey::new("listing").with("id", 42_u64);
/// client.set_query_data(&key, String::from("Велосипед"));
/// assert_eq!(client.get_query_data::<String>(&key).as_deref(), Some("Велосипед"));
/// ```
#[derive(Clone)]
pub struct QueryClient {
    slots: Arc<DashMap<QueryKey, Arc<Slot>>>,
    config: QueryConfig,
}

impl QueryClient {
    /// Creates a client with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(QueryConfig::default())
    }

    #[must_use]
    pub fn with_config(config: QueryConfig) -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Number of cached keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot(&self, key: &QueryKey) -> Arc<Slot> {
        Arc::clone(
            self.slots
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Slot::new(key.clone())))
                .value(),
        )
    }

    fn matching(&self, filter: &QueryFilter) -> Vec<Arc<Slot>> {
        self.slots
            .iter()
            .filter(|slot| filter.matches(slot.key()))
            .map(|slot| Arc::clone(slot.value()))
            .collect()
    }

    /// Registers an observer of `key` and starts a fetch if needed.
    ///
    /// The observer stays registered until the returned guard is dropped.
    pub(crate) fn mount(
        &self,
        key: &QueryKey,
        fetcher: Fetcher,
        options: &QueryOptions,
    ) -> (watch::Receiver<CacheEntry>, ObserverGuard) {
        self.collect_garbage();

        let slot = self.slot(key);
        {
            let mut observers = slot.observers();
            observers.count += 1;
            if options.enabled {
                observers.active += 1;
            }
            observers.fetcher = Some(fetcher);
            observers.retry = options.retry;
            observers.released_at = None;
            trace!(%key, observers = observers.count, enabled = options.enabled, "observer mounted");
        }

        let rx = slot.entry.subscribe();
        if options.enabled {
            let stale_time = options.stale_time.unwrap_or(self.config.stale_time);
            let fresh = slot.entry.borrow().is_fresh(stale_time);
            if fresh {
                trace!(%key, "serving fresh data");
            } else {
                self.start_fetch(&slot);
            }
        }

        let guard = ObserverGuard {
            slot,
            enabled: options.enabled,
        };
        (rx, guard)
    }

    /// Starts a fetch for `slot` unless one is already in flight.
    fn start_fetch(&self, slot: &Arc<Slot>) {
        let (fetcher, retry) = {
            let observers = slot.observers();
            (
                observers.fetcher.clone(),
                observers.retry.unwrap_or(self.config.retry),
            )
        };
        let Some(fetcher) = fetcher else {
            trace!(key = %slot.key, "no fetcher registered");
            return;
        };

        let mut epoch = 0;
        let started = slot.entry.send_if_modified(|entry| {
            if entry.is_fetching {
                return false;
            }
            entry.begin_fetch();
            epoch = entry.epoch;
            true
        });
        if !started {
            trace!(key = %slot.key, "fetch already in flight");
            return;
        }

        debug!(key = %slot.key, "fetching");
        let client = self.clone();
        let slot = Arc::clone(slot);
        tokio::spawn(async move {
            let result = client.fetch_with_retry(&slot.key, &fetcher, retry).await;
            if let Err(e) = &result {
                warn!(key = %slot.key, "fetch failed: {e}");
            }

            let applied = slot.entry.send_if_modified(|entry| {
                if entry.epoch != epoch {
                    return false;
                }
                entry.resolve(result);
                true
            });
            if !applied {
                debug!(key = %slot.key, "discarding result of a reset query");
                return;
            }

            let invalidated = slot.entry.borrow().is_invalidated;
            let active = slot.observers().active;
            if invalidated && active > 0 {
                debug!(key = %slot.key, "invalidated while fetching, refetching");
                client.start_fetch(&slot);
            }
        });
    }

    async fn fetch_with_retry(
        &self,
        key: &QueryKey,
        fetcher: &Fetcher,
        retry: u32,
    ) -> Result<Payload, ApiError> {
        let mut attempt = 0;
        loop {
            match fetcher().await {
                Ok(data) => return Ok(data),
                Err(e) if attempt < retry && is_retryable(&e) => {
                    let delay = self.config.backoff(attempt);
                    debug!(%key, attempt, ?delay, "retrying after error: {e}");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Marks matching entries stale and refetches those with an enabled observer.
    ///
    /// Returns immediately; refetches run in the background. Entries without observers
    /// are refetched on their next mount.
    pub fn invalidate_queries(&self, filter: &QueryFilter) {
        let slots = self.matching(filter);
        debug!(%filter, matched = slots.len(), "invalidating queries");
        for slot in slots {
            slot.entry.send_modify(CacheEntry::mark_stale);
            let active = slot.observers().active;
            if active > 0 {
                self.start_fetch(&slot);
            }
        }
    }

    /// Invalidates entries refused with a 401, and entries being fetched right now.
    ///
    /// Called after the session expired: requests that carried the rejected token are
    /// sent again without it. A fetch in flight is followed by another one once it ends.
    pub fn invalidate_unauthorized(&self) {
        let slots: Vec<Arc<Slot>> = self
            .slots
            .iter()
            .filter(|slot| {
                let entry = slot.entry.borrow();
                entry.is_fetching || entry.error.as_ref().is_some_and(ApiError::is_unauthorized)
            })
            .map(|slot| Arc::clone(slot.value()))
            .collect();
        debug!(matched = slots.len(), "invalidating unauthorized queries");
        for slot in slots {
            slot.entry.send_modify(CacheEntry::mark_stale);
            let active = slot.observers().active;
            if active > 0 {
                self.start_fetch(&slot);
            }
        }
    }

    /// [`invalidate_queries`](Self::invalidate_queries) as a command, for use in `update`.
    ///
    /// The command produces no messages.
    pub fn invalidate<Msg>(&self, filter: impl Into<QueryFilter>) -> Command<Msg>
    where
        Msg: Send + 'static,
    {
        let client = self.clone();
        let filter = filter.into();

        Command {
            stream: Some(
                stream::once(async move { client.invalidate_queries(&filter) })
                    .filter_map(|()| async { None })
                    .boxed(),
            ),
        }
    }

    /// Returns matching entries to `Idle`, dropping their data.
    ///
    /// A fetch in flight for a reset entry completes but its result is discarded.
    pub fn reset_queries(&self, filter: &QueryFilter) {
        let slots = self.matching(filter);
        debug!(%filter, matched = slots.len(), "resetting queries");
        for slot in slots {
            slot.entry.send_modify(CacheEntry::reset);
        }
    }

    /// Writes `value` into the cache as a successful result for `key`.
    pub fn set_query_data<V>(&self, key: &QueryKey, value: V)
    where
        V: Send + Sync + 'static,
    {
        let data: Payload = Arc::new(value);
        self.slot(key).entry.send_modify(|entry| entry.set_data(data));
    }

    /// The cached data for `key`, if present and of type `V`.
    #[must_use]
    pub fn get_query_data<V>(&self, key: &QueryKey) -> Option<V>
    where
        V: Clone + 'static,
    {
        let slot = self.slots.get(key).map(|slot| Arc::clone(slot.value()))?;
        slot.entry.borrow().data_as()
    }

    /// A snapshot of the entry for `key`.
    #[must_use]
    pub fn get_entry(&self, key: &QueryKey) -> Option<CacheEntry> {
        let slot = self.slots.get(key).map(|slot| Arc::clone(slot.value()))?;
        Some(slot.entry.borrow().clone())
    }

    /// Drops entries that have had no observer for longer than `cache_time` and are not
    /// being fetched. Returns the number of dropped entries.
    pub fn collect_garbage(&self) -> usize {
        let cache_time = self.config.cache_time;
        let mut collected = 0;
        self.slots.retain(|key, slot| {
            let fetching = slot.entry.borrow().is_fetching;
            let observers = slot.observers();
            let expired = !fetching
                && observers.count == 0
                && observers
                    .released_at
                    .is_some_and(|at| at.elapsed() >= cache_time);
            if expired {
                trace!(%key, "collecting unused entry");
                collected += 1;
            }
            !expired
        });
        collected
    }

    #[cfg(test)]
    pub(crate) fn observer_count(&self, key: &QueryKey) -> (usize, usize) {
        self.slots.get(key).map_or((0, 0), |slot| {
            let observers = slot.observers();
            (observers.count, observers.active)
        })
    }
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryClient")
            .field("entries", &self.slots.len())
            .field("config", &self.config)
            .finish()
    }
}

/// 4xx responses are not retried.
fn is_retryable(error: &ApiError) -> bool {
    !matches!(error.status(), Some(400..=499))
}
