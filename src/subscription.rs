//! Long-lived event sources and the manager that mounts and unmounts them.
//!
//! A [`Subscription`] wraps a [`SubscriptionSource`]: anything that can produce a stream
//! of values and name itself with a stable [`SubscriptionId`]. The runtime asks the
//! application for its subscriptions after every update and hands the list to the
//! [`SubscriptionManager`], which:
//!
//! - starts sources whose id is not running yet (mount),
//! - leaves sources whose id is still present untouched,
//! - cancels sources whose id disappeared (unmount).
//!
//! Cancelling drops the source's stream. For query subscriptions this releases the cache
//! observer, so results of a fetch that is still in flight no longer reach the view.

pub mod session;
pub mod terminal;

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::command::Action;

/// Stable identity of a running subscription.
///
/// Two sources with the same id are considered the same subscription, so the manager
/// keeps the running one instead of restarting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    type_id: TypeId,
    hash: u64,
}

impl SubscriptionId {
    /// Builds an id from the source type and a hash of its parameters.
    #[must_use]
    pub fn of<T: 'static>(hash: u64) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            hash,
        }
    }
}

/// A source of values that can be run as a subscription.
pub trait SubscriptionSource: Send + Sync + 'static {
    /// The values produced by the source.
    type Output;

    /// Starts the source. Called once per mount.
    fn stream(&self) -> BoxStream<'static, Self::Output>;

    /// Identity of this source; see [`SubscriptionId`].
    fn id(&self) -> SubscriptionId;
}

/// A type-erased, mappable subscription ready to be handed to the runtime.
pub struct Subscription<Msg> {
    pub(crate) id: SubscriptionId,
    pub(crate) spawn: Box<dyn Fn() -> BoxStream<'static, Msg> + Send + Sync>,
}

impl<Msg: Send + 'static> Subscription<Msg> {
    /// Wraps a source.
    pub fn new<S>(source: S) -> Self
    where
        S: SubscriptionSource<Output = Msg>,
    {
        let id = source.id();
        let source = Arc::new(source);
        Self {
            id,
            spawn: Box::new(move || source.stream()),
        }
    }

    /// Converts every value into another message type. The id is preserved.
    pub fn map<T, F>(self, f: F) -> Subscription<T>
    where
        T: Send + 'static,
        F: Fn(Msg) -> T + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let spawn = self.spawn;
        Subscription {
            id: self.id,
            spawn: Box::new(move || {
                let f = Arc::clone(&f);
                spawn().map(move |msg| f(msg)).boxed()
            }),
        }
    }

    /// The id of the wrapped source.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }
}

/// Handle for a running subscription task.
struct Handle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl Handle {
    fn cancel(self) {
        self.token.cancel();
        drop(self.join);
    }
}

/// Keeps the set of running subscriptions in sync with what the application asks for.
pub struct SubscriptionManager<Msg> {
    running: HashMap<SubscriptionId, Handle>,
    tx: mpsc::UnboundedSender<Action<Msg>>,
}

impl<Msg: Send + 'static> SubscriptionManager<Msg> {
    /// Creates a manager forwarding every produced value to `tx`.
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<Action<Msg>>) -> Self {
        Self {
            running: HashMap::new(),
            tx,
        }
    }

    /// Starts new subscriptions and cancels the ones no longer requested.
    pub fn update(&mut self, subscriptions: impl IntoIterator<Item = Subscription<Msg>>) {
        let mut wanted = HashSet::new();

        for sub in subscriptions {
            if !wanted.insert(sub.id) || self.running.contains_key(&sub.id) {
                continue;
            }
            trace!(id = ?sub.id, "starting subscription");
            let handle = self.spawn(&sub);
            self.running.insert(sub.id, handle);
        }

        let stale: Vec<_> = self
            .running
            .keys()
            .filter(|id| !wanted.contains(id))
            .copied()
            .collect();
        for id in stale {
            if let Some(handle) = self.running.remove(&id) {
                trace!(id = ?id, "cancelling subscription");
                handle.cancel();
            }
        }
    }

    /// Number of running subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.running.len()
    }

    /// Returns `true` if nothing is running.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }

    /// Cancels every running subscription.
    pub fn shutdown(&mut self) {
        for (_, handle) in self.running.drain() {
            handle.cancel();
        }
    }

    fn spawn(&self, sub: &Subscription<Msg>) -> Handle {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let tx = self.tx.clone();
        let mut stream = (sub.spawn)();

        let join = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = cancelled.cancelled() => break,
                    item = stream.next() => match item {
                        Some(msg) => {
                            if tx.send(Action::Message(msg)).is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
        });

        Handle { token, join }
    }
}

impl<Msg> Drop for SubscriptionManager<Msg> {
    fn drop(&mut self) {
        for (_, handle) in self.running.drain() {
            handle.token.cancel();
        }
    }
}
