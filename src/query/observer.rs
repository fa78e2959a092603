use std::hash::{DefaultHasher, Hash, Hasher};
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::{BoxStream, Stream};
use futures::{FutureExt, StreamExt};
use tokio_stream::wrappers::WatchStream;

use crate::error::ApiError;
use crate::subscription::{SubscriptionId, SubscriptionSource};

use super::cache::{CacheEntry, Payload, QueryStatus};
use super::client::{Fetcher, ObserverGuard, QueryClient};
use super::config::QueryOptions;
use super::key::QueryKey;

/// The state of a query as seen by the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryState<V> {
    /// Not fetched yet, or the query is disabled.
    Idle,
    /// First fetch in flight.
    Loading,
    /// Data is available.
    Success {
        data: V,
        /// The data was invalidated and a newer version is expected.
        is_stale: bool,
    },
    /// The last fetch failed.
    Error(ApiError),
}

/// One update emitted by a [`Query`] subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult<V> {
    pub state: QueryState<V>,
    /// A fetch is in flight. With `Success` this is a background refetch.
    pub is_fetching: bool,
}

impl<V> Default for QueryResult<V> {
    fn default() -> Self {
        Self {
            state: QueryState::Idle,
            is_fetching: false,
        }
    }
}

impl<V: Clone + 'static> QueryResult<V> {
    /// Projects a cache entry onto the typed view state.
    #[must_use]
    pub fn from_entry(entry: &CacheEntry) -> Self {
        let state = match entry.status {
            QueryStatus::Idle => QueryState::Idle,
            QueryStatus::Loading => QueryState::Loading,
            QueryStatus::Success => match entry.data_as::<V>() {
                Some(data) => QueryState::Success {
                    data,
                    is_stale: entry.is_invalidated,
                },
                None => QueryState::Error(ApiError::Decode(format!(
                    "cached data for {} has an unexpected type",
                    entry.key
                ))),
            },
            QueryStatus::Error => entry
                .error
                .clone()
                .map_or(QueryState::Idle, QueryState::Error),
        };
        Self {
            state,
            is_fetching: entry.is_fetching,
        }
    }
}

impl<V> QueryResult<V> {
    /// The data, if the query succeeded.
    pub const fn data(&self) -> Option<&V> {
        match &self.state {
            QueryState::Success { data, .. } => Some(data),
            _ => None,
        }
    }

    /// The error, if the last fetch failed.
    pub const fn error(&self) -> Option<&ApiError> {
        match &self.state {
            QueryState::Error(error) => Some(error),
            _ => None,
        }
    }

    pub const fn is_idle(&self) -> bool {
        matches!(self.state, QueryState::Idle)
    }

    pub const fn is_loading(&self) -> bool {
        matches!(self.state, QueryState::Loading)
    }

    pub const fn is_success(&self) -> bool {
        matches!(self.state, QueryState::Success { .. })
    }

    pub const fn is_error(&self) -> bool {
        matches!(self.state, QueryState::Error(_))
    }

    pub const fn is_stale(&self) -> bool {
        matches!(self.state, QueryState::Success { is_stale: true, .. })
    }
}

/// A query subscription: observes one key of the [`QueryClient`] and fetches it when
/// needed.
///
/// While mounted, the subscription yields the current state of its key and then every
/// change to it: loading, data, errors, background refetches and invalidations. Results
/// for other keys never reach it.
///
/// # Example
///
/// ```rust,ignore
/// fn subscriptions(&self) -> Vec<Subscription<Message>> {
///     let api = self.api.clone();
///     vec![
///         Subscription::new(Query::new(
///             keys::listing(self.id),
///             move || {
///                 let api = api.clone();
///                 async move { api.listing(id).await }
///             },
///             &self.queries,
///         ))
///         .map(Message::Listing),
///     ]
/// }
/// ```
pub struct Query<V> {
    key: QueryKey,
    fetcher: Fetcher,
    client: QueryClient,
    options: QueryOptions,
    _marker: PhantomData<fn() -> V>,
}

impl<V> Query<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a query for `key`.
    ///
    /// `fetcher` is called by the client whenever the key needs (re)fetching. Queries with
    /// the same key must fetch the same resource.
    pub fn new<F, Fut>(key: QueryKey, fetcher: F, client: &QueryClient) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
    {
        let fetcher: Fetcher = Arc::new(move || {
            fetcher()
                .map(|result| result.map(|data| Arc::new(data) as Payload))
                .boxed()
        });
        Self {
            key,
            fetcher,
            client: client.clone(),
            options: QueryOptions::default(),
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub const fn key(&self) -> &QueryKey {
        &self.key
    }
}

impl<V> SubscriptionSource for Query<V>
where
    V: Clone + Send + Sync + 'static,
{
    type Output = QueryResult<V>;

    fn stream(&self) -> BoxStream<'static, Self::Output> {
        let (rx, guard) =
            self.client
                .mount(&self.key, Arc::clone(&self.fetcher), &self.options);
        Observed {
            inner: WatchStream::new(rx),
            _guard: guard,
        }
        .map(|entry| QueryResult::from_entry(&entry))
        .boxed()
    }

    fn id(&self) -> SubscriptionId {
        let mut hasher = DefaultHasher::new();
        self.key.hash(&mut hasher);
        self.options.enabled.hash(&mut hasher);
        SubscriptionId::of::<Self>(hasher.finish())
    }
}

/// Entry updates of one key; unregisters the observer when dropped.
struct Observed {
    inner: WatchStream<CacheEntry>,
    _guard: ObserverGuard,
}

impl Stream for Observed {
    type Item = CacheEntry;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}
