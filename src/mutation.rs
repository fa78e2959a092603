//! Writes to the backend.
//!
//! Unlike queries, mutations are not subscriptions: each call is a discrete side effect
//! with a clear start and end, so it is started from `update` and delivered back as a
//! [`Command`]. After a successful write, related queries usually need refetching; this
//! is what [`Mutation::on_success`] hooks are for.
//!
//! # Example
//!
//! ```rust,ignore
//! enum Message {
//!     Submit,
//!     Submitted(Result<Comment, ApiError>),
//! }
//!
//! fn update(&mut self, msg: Message) -> Command<Message> {
//!     match msg {
//!         Message::Submit => self.add_comment.mutate(self.draft.clone(), Message::Submitted),
//!         Message::Submitted(Ok(_)) => {
//!             self.draft.clear();
//!             Command::none()
//!         }
//!         Message::Submitted(Err(_)) => Command::none(),
//!     }
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::command::Command;
use crate::error::ApiError;

type Mutator<I, O> = Arc<dyn Fn(I) -> BoxFuture<'static, Result<O, ApiError>> + Send + Sync>;
type SuccessHook<I, O> = Arc<dyn Fn(&I, &O) + Send + Sync>;
type ErrorHook<I> = Arc<dyn Fn(&I, &ApiError) + Send + Sync>;

/// The state of the latest call of a [`Mutation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationState<O> {
    /// Never called, or reset.
    Idle,
    /// A call is in flight.
    Pending,
    /// The latest call succeeded.
    Success(O),
    /// The latest call failed.
    Error(ApiError),
}

struct Tracked<O> {
    generation: u64,
    state: MutationState<O>,
}

/// Callbacks for a single call, run after the mutation's own hooks.
pub struct MutateOptions<I, O> {
    on_success: Vec<SuccessHook<I, O>>,
    on_error: Vec<ErrorHook<I>>,
}

impl<I, O> Default for MutateOptions<I, O> {
    fn default() -> Self {
        Self {
            on_success: Vec::new(),
            on_error: Vec::new(),
        }
    }
}

impl<I, O> MutateOptions<I, O> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_success(mut self, hook: impl Fn(&I, &O) + Send + Sync + 'static) -> Self {
        self.on_success.push(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_error(mut self, hook: impl Fn(&I, &ApiError) + Send + Sync + 'static) -> Self {
        self.on_error.push(Arc::new(hook));
        self
    }
}

/// A write operation with observable state.
///
/// Clones share state and hooks, so a page can hand a clone to a command and still read
/// [`is_pending`](Self::is_pending) from its model. Every call bumps a generation counter;
/// only the latest call settles the state, so a slow earlier call never overwrites the
/// outcome of a later one. Calls are not de-duplicated.
pub struct Mutation<I, O> {
    mutator: Mutator<I, O>,
    on_success: Vec<SuccessHook<I, O>>,
    on_error: Vec<ErrorHook<I>>,
    state: Arc<watch::Sender<Tracked<O>>>,
}

impl<I, O> Clone for Mutation<I, O> {
    fn clone(&self) -> Self {
        Self {
            mutator: Arc::clone(&self.mutator),
            on_success: self.on_success.clone(),
            on_error: self.on_error.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<I, O> Mutation<I, O>
where
    I: Clone + Send + Sync + 'static,
    O: Clone + Send + Sync + 'static,
{
    /// Creates a mutation performing `mutator` on every call.
    pub fn new<F, Fut>(mutator: F) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, ApiError>> + Send + 'static,
    {
        let (state, _) = watch::channel(Tracked {
            generation: 0,
            state: MutationState::Idle,
        });
        Self {
            mutator: Arc::new(move |input| mutator(input).boxed()),
            on_success: Vec::new(),
            on_error: Vec::new(),
            state: Arc::new(state),
        }
    }

    /// Registers a hook run after every successful call, before per-call hooks.
    ///
    /// This is where cache invalidation belongs.
    #[must_use]
    pub fn on_success(mut self, hook: impl Fn(&I, &O) + Send + Sync + 'static) -> Self {
        self.on_success.push(Arc::new(hook));
        self
    }

    /// Registers a hook run after every failed call, before per-call hooks.
    #[must_use]
    pub fn on_error(mut self, hook: impl Fn(&I, &ApiError) + Send + Sync + 'static) -> Self {
        self.on_error.push(Arc::new(hook));
        self
    }

    /// Starts a call and returns its result as a future.
    ///
    /// The state is `Pending` as soon as this returns. Hooks run before the future
    /// resolves.
    pub fn mutate_async(
        &self,
        input: I,
    ) -> impl Future<Output = Result<O, ApiError>> + Send + use<I, O> {
        self.mutate_async_with(input, MutateOptions::default())
    }

    /// Like [`mutate_async`](Self::mutate_async), with per-call hooks.
    pub fn mutate_async_with(
        &self,
        input: I,
        options: MutateOptions<I, O>,
    ) -> impl Future<Output = Result<O, ApiError>> + Send + use<I, O> {
        let mut generation = 0;
        self.state.send_modify(|tracked| {
            tracked.generation += 1;
            tracked.state = MutationState::Pending;
            generation = tracked.generation;
        });
        debug!(generation, "mutation started");

        let request = (self.mutator)(input.clone());
        let on_success = self.on_success.clone();
        let on_error = self.on_error.clone();
        let state = Arc::clone(&self.state);

        async move {
            let result = request.await;
            match &result {
                Ok(output) => {
                    for hook in on_success.iter().chain(&options.on_success) {
                        hook(&input, output);
                    }
                }
                Err(e) => {
                    warn!(generation, "mutation failed: {e}");
                    for hook in on_error.iter().chain(&options.on_error) {
                        hook(&input, e);
                    }
                }
            }

            let settled = state.send_if_modified(|tracked| {
                if tracked.generation != generation {
                    return false;
                }
                tracked.state = match &result {
                    Ok(output) => MutationState::Success(output.clone()),
                    Err(e) => MutationState::Error(e.clone()),
                };
                true
            });
            if !settled {
                debug!(generation, "superseded by a later call");
            }
            result
        }
    }

    /// Starts a call and delivers its result as a message.
    pub fn mutate<Msg>(
        &self,
        input: I,
        to_message: impl FnOnce(Result<O, ApiError>) -> Msg + Send + 'static,
    ) -> Command<Msg>
    where
        Msg: Send + 'static,
    {
        Command::perform(self.mutate_async(input), to_message)
    }

    /// Like [`mutate`](Self::mutate), with per-call hooks.
    pub fn mutate_with<Msg>(
        &self,
        input: I,
        options: MutateOptions<I, O>,
        to_message: impl FnOnce(Result<O, ApiError>) -> Msg + Send + 'static,
    ) -> Command<Msg>
    where
        Msg: Send + 'static,
    {
        Command::perform(self.mutate_async_with(input, options), to_message)
    }
}

impl<I, O: Clone> Mutation<I, O> {
    /// The state of the latest call.
    #[must_use]
    pub fn state(&self) -> MutationState<O> {
        self.state.borrow().state.clone()
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self.state.borrow().state, MutationState::Idle)
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self.state.borrow().state, MutationState::Pending)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.state.borrow().state, MutationState::Success(_))
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self.state.borrow().state, MutationState::Error(_))
    }

    /// The error of the latest call, if it failed.
    #[must_use]
    pub fn error(&self) -> Option<ApiError> {
        match &self.state.borrow().state {
            MutationState::Error(e) => Some(e.clone()),
            _ => None,
        }
    }

    /// The output of the latest call, if it succeeded.
    #[must_use]
    pub fn data(&self) -> Option<O> {
        match &self.state.borrow().state {
            MutationState::Success(output) => Some(output.clone()),
            _ => None,
        }
    }

    /// Back to `Idle`. Calls still in flight no longer settle the state.
    pub fn reset(&self) {
        self.state.send_modify(|tracked| {
            tracked.generation += 1;
            tracked.state = MutationState::Idle;
        });
    }
}

impl<I, O: fmt::Debug> fmt::Debug for Mutation<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tracked = self.state.borrow();
        f.debug_struct("Mutation")
            .field("generation", &tracked.generation)
            .field("state", &tracked.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    fn echo() -> Mutation<String, usize> {
        Mutation::new(|text: String| async move { Ok(text.len()) })
    }

    #[tokio::test]
    async fn test_success_settles_state() {
        let mutation = echo();
        assert!(mutation.is_idle());

        let result = mutation.mutate_async("привет".to_string()).await;

        assert_eq!(result, Ok(12));
        assert!(mutation.is_success());
        assert_eq!(mutation.data(), Some(12));
    }

    #[tokio::test]
    async fn test_pending_is_set_synchronously() {
        let (tx, rx) = oneshot::channel::<()>();
        let rx = Arc::new(Mutex::new(Some(rx)));
        let mutation: Mutation<(), ()> = Mutation::new(move |()| {
            let rx = rx.lock().expect("lock").take();
            async move {
                if let Some(rx) = rx {
                    let _ = rx.await;
                }
                Ok(())
            }
        });

        let call = mutation.mutate_async(());
        assert!(mutation.is_pending());

        tx.send(()).expect("receiver alive");
        call.await.expect("mutation succeeds");
        assert!(mutation.is_success());
    }

    #[tokio::test]
    async fn test_error_state() {
        let mutation: Mutation<u64, ()> = Mutation::new(|_id| async {
            Err(ApiError::Http {
                status: 403,
                body: None,
            })
        });

        let result = mutation.mutate_async(7).await;

        assert!(result.is_err());
        assert!(mutation.is_error());
        assert_eq!(mutation.error().and_then(|e| e.status()), Some(403));
    }

    #[tokio::test]
    async fn test_hooks_run_global_then_per_call_before_resolve() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mutation = echo().on_success({
            let log = log.clone();
            move |input: &String, output: &usize| {
                log.lock().expect("lock").push(format!("global {input} {output}"));
            }
        });
        let options = MutateOptions::new().on_success({
            let log = log.clone();
            move |_: &String, _: &usize| log.lock().expect("lock").push("call".to_string())
        });

        mutation.mutate_async_with("ab".to_string(), options).await.expect("ok");

        assert_eq!(*log.lock().expect("lock"), vec!["global ab 2", "call"]);
    }

    #[tokio::test]
    async fn test_error_hooks_run() {
        let failed = Arc::new(Mutex::new(0));
        let mutation: Mutation<(), ()> =
            Mutation::new(|()| async { Err(ApiError::Network("down".to_string())) }).on_error({
                let failed = failed.clone();
                move |_, _| *failed.lock().expect("lock") += 1
            });

        let _ = mutation.mutate_async(()).await;
        assert_eq!(*failed.lock().expect("lock"), 1);
    }

    #[tokio::test]
    async fn test_last_call_wins() {
        let (slow_tx, slow_rx) = oneshot::channel::<()>();
        let slow_rx = Arc::new(Mutex::new(Some(slow_rx)));
        let mutation: Mutation<&'static str, &'static str> = Mutation::new(move |input| {
            let gate = if input == "slow" {
                slow_rx.lock().expect("lock").take()
            } else {
                None
            };
            async move {
                if let Some(gate) = gate {
                    let _ = gate.await;
                }
                Ok(input)
            }
        });

        let slow = tokio::spawn(mutation.mutate_async("slow"));
        let fast = mutation.mutate_async("fast");
        assert_eq!(fast.await, Ok("fast"));
        assert_eq!(mutation.data(), Some("fast"));

        slow_tx.send(()).expect("receiver alive");
        assert_eq!(slow.await.expect("task"), Ok("slow"));
        assert_eq!(mutation.data(), Some("fast"));
    }

    #[tokio::test]
    async fn test_reset() {
        let mutation = echo();
        mutation.mutate_async("x".to_string()).await.expect("ok");
        mutation.reset();
        assert!(mutation.is_idle());
    }

    #[tokio::test]
    async fn test_mutate_command_delivers_message() {
        #[derive(Debug, PartialEq)]
        enum Message {
            Done(Result<usize, ApiError>),
        }

        let mutation = echo();
        let cmd = mutation.mutate("abc".to_string(), Message::Done);
        assert!(mutation.is_pending());

        let mut stream = cmd.stream.expect("stream");
        let action = futures::StreamExt::next(&mut stream).await;
        assert!(matches!(
            action,
            Some(crate::command::Action::Message(Message::Done(Ok(3))))
        ));
    }
}
