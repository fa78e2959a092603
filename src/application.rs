use ratatui::Frame;

use crate::{command::Command, subscription::Subscription};

/// A terminal application following the Elm Architecture.
///
/// The runtime owns the model and is its only writer: terminal events, query results
/// and finished commands all arrive as messages and go through [`update`](Self::update).
///
/// # Example
///
/// ```
/// use avitolog::{application::Application, command::Command, subscription::Subscription};
/// use ratatui::{Frame, widgets::Paragraph};
///
/// enum Draft {
///     Type(char),
///     Clear,
/// }
///
/// struct CommentBox {
///     text: String,
/// }
///
/// impl Application for CommentBox {
///     type Message = Draft;
///     type Flags = String;
///
///     fn new(text: String) -> (Self, Command<Draft>) {
///         (Self { text }, Command::none())
///     }
///
///     fn update(&mut self, msg: Draft) -> Command<Draft> {
///         match msg {
///             Draft::Type(c) => self.text.push(c),
///             Draft::Clear => self.text.clear(),
///         }
///         Command::none()
///     }
///
///     fn view(&self, frame: &mut Frame<'_>) {
///         frame.render_widget(Paragraph::new(self.text.as_str()), frame.area());
///     }
///
///     fn subscriptions(&self) -> Vec<Subscription<Draft>> {
///         Vec::new()
///     }
/// }
/// ```
pub trait Application: Sized {
    /// Every event the application reacts to.
    type Message: Send + 'static;

    /// Data needed to build the initial model (API handles, initial route, ...).
    type Flags: Clone + Send;

    /// Builds the initial model and an optional startup command.
    fn new(flags: Self::Flags) -> (Self, Command<Self::Message>);

    /// Applies a message to the model.
    fn update(&mut self, msg: Self::Message) -> Command<Self::Message>;

    /// Renders the model. Called once per frame; must not change state.
    fn view(&self, frame: &mut Frame<'_>);

    /// The event sources that should be running for the current model.
    ///
    /// Called after every update. Sources are identified by their
    /// [`SubscriptionId`](crate::subscription::SubscriptionId): a source whose id is new is
    /// started (mounted) and a running source whose id disappeared is cancelled
    /// (unmounted). Query subscriptions rely on this to fetch when a page opens and to
    /// stop delivering results once it closes.
    fn subscriptions(&self) -> Vec<Subscription<Self::Message>>;
}
