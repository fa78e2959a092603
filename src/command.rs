use futures::{
    FutureExt, StreamExt,
    stream::{self, BoxStream, select_all},
};

/// An action emitted by a running command.
///
/// Actions are consumed by the [`Runtime`](crate::runtime::Runtime): messages are fed back
/// into [`Application::update`](crate::application::Application::update), and `Quit`
/// ends the event loop.
#[derive(Debug)]
pub enum Action<Msg> {
    /// Deliver a message to the application's update function.
    Message(Msg),

    /// Stop the runtime and restore the terminal.
    Quit,
}

impl<Msg> Action<Msg> {
    fn map<T>(self, f: impl FnOnce(Msg) -> T) -> Action<T> {
        match self {
            Self::Message(msg) => Action::Message(f(msg)),
            Self::Quit => Action::Quit,
        }
    }
}

/// A one-shot side effect returned from `new` and `update`.
///
/// Every HTTP request the client makes outside of a query subscription (ingesting a URL,
/// posting a comment, signing in) is a command. The runtime drives the command to
/// completion in a background task and routes each produced [`Action`] back into the loop.
///
/// # Examples
///
/// ```
/// use avitolog::command::Command;
///
/// enum Message {
///     Loaded(u32),
/// }
///
/// let cmd = Command::perform(async { 42 }, Message::Loaded);
/// ```
pub struct Command<Msg: Send + 'static> {
    pub(crate) stream: Option<BoxStream<'static, Action<Msg>>>,
}

impl<Msg: Send + 'static> Command<Msg> {
    /// A command that does nothing.
    #[must_use]
    pub fn none() -> Self {
        Self { stream: None }
    }

    /// Runs `future` and converts its output into a message with `f`.
    pub fn perform<A>(
        future: impl Future<Output = A> + Send + 'static,
        f: impl FnOnce(A) -> Msg + Send + 'static,
    ) -> Self {
        Self::future(future.map(f))
    }

    /// Runs a future that directly produces a message.
    pub fn future(future: impl Future<Output = Msg> + Send + 'static) -> Self {
        Self {
            stream: Some(future.into_stream().map(Action::Message).boxed()),
        }
    }

    /// Emits a single action right away.
    ///
    /// ```
    /// use avitolog::command::{Action, Command};
    ///
    /// let quit: Command<()> = Command::effect(Action::Quit);
    /// ```
    pub fn effect(action: Action<Msg>) -> Self {
        Self {
            stream: Some(stream::once(async move { action }).boxed()),
        }
    }

    /// Re-enters `update` with `msg`.
    ///
    /// Used for navigation: a page asks the application to switch routes by sending it a
    /// message instead of touching the route itself.
    pub fn message(msg: Msg) -> Self {
        Self::effect(Action::Message(msg))
    }

    /// Runs several commands concurrently. `Command::none()` entries are dropped.
    ///
    /// The order in which messages arrive is not guaranteed.
    pub fn batch(commands: impl IntoIterator<Item = Self>) -> Self {
        let streams: Vec<_> = commands.into_iter().filter_map(|cmd| cmd.stream).collect();

        if streams.is_empty() {
            Self::none()
        } else {
            Self {
                stream: Some(select_all(streams).boxed()),
            }
        }
    }

    /// Converts every message this command produces. `Quit` passes through unchanged.
    pub fn map<T: Send + 'static>(self, f: impl Fn(Msg) -> T + Send + 'static) -> Command<T> {
        Command {
            stream: self
                .stream
                .map(|stream| stream.map(move |action| action.map(&f)).boxed()),
        }
    }

    /// Returns `true` if running this command has no effect.
    #[must_use]
    pub const fn is_none(&self) -> bool {
        self.stream.is_none()
    }
}
