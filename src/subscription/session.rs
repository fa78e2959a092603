use futures::{StreamExt, stream::BoxStream};
use tokio_stream::wrappers::BroadcastStream;

use super::{SubscriptionId, SubscriptionSource};
use crate::api::SessionStore;

/// Emits `()` each time the backend rejects the stored token.
///
/// The HTTP adapter expires the session when a request carrying the token gets a 401.
/// The application subscribes to this to drop the cached current user and tell the user
/// to sign in again.
#[derive(Debug, Clone)]
pub struct SessionExpired {
    session: SessionStore,
}

impl SessionExpired {
    #[must_use]
    pub const fn new(session: SessionStore) -> Self {
        Self { session }
    }
}

impl SubscriptionSource for SessionExpired {
    type Output = ();

    fn stream(&self) -> BoxStream<'static, ()> {
        BroadcastStream::new(self.session.expired_events())
            .filter_map(|event| async move { event.ok() })
            .boxed()
    }

    fn id(&self) -> SubscriptionId {
        SubscriptionId::of::<Self>(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{Duration, timeout};

    #[tokio::test]
    async fn test_emits_on_expire() {
        let session = SessionStore::in_memory();
        let mut stream = SessionExpired::new(session.clone()).stream();

        session.set_token("abc");
        session.expire("abc");

        let event = timeout(Duration::from_millis(100), stream.next()).await;
        assert_eq!(event.expect("event in time"), Some(()));
    }
}
