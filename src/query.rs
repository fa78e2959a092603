//! A keyed query cache with de-duplicated fetching and invalidation.
//!
//! Reads from the backend go through a [`QueryClient`]: every resource is cached under a
//! [`QueryKey`] and observed through a [`Query`] subscription, in the spirit of SWR or
//! TanStack Query.
//!
//! # Subscriptions as observers
//!
//! A query is a subscription that stays mounted as long as the application returns it
//! from `subscriptions()`. While mounted:
//!
//! 1. the current entry for its key is emitted right away,
//! 2. if that entry is missing or stale, a fetch starts; concurrent observers of the same
//!    key share it,
//! 3. when the key is invalidated, the entry is refetched and the new data is emitted.
//!
//! Writes happen through [`Mutation`](crate::mutation::Mutation)s, whose success hooks
//! invalidate the keys they affect:
//!
//! ```rust,ignore
//! let add_comment = Mutation::new(move |text: String| {
//!     let api = api.clone();
//!     async move { api.add_comment(listing_id, &text).await }
//! })
//! .on_success({
//!     let queries = queries.clone();
//!     move |_, _| queries.invalidate_queries(&keys::comments(listing_id).into())
//! });
//! ```

mod cache;
mod client;
mod config;
mod key;
mod observer;

pub use cache::{CacheEntry, Payload, QueryStatus};
pub use client::QueryClient;
pub use config::{QueryConfig, QueryOptions};
pub use key::{KeyParam, QueryFilter, QueryKey};
pub use observer::{Query, QueryResult, QueryState};
