//! The Avitolog terminal client: pages, navigation and the auth modal.
//!
//! [`App`] owns the current page and routes every message to it. Pages keep their query
//! results in the model and declare their queries as subscriptions, so opening a page
//! mounts its queries and leaving it unmounts them.

pub mod auth_modal;
pub mod format;
pub mod gating;
pub mod home;
pub mod listing;
mod not_found;
mod route;


use std::sync::Arc;

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout},
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::Paragraph,
};
use tracing::{debug, error, info};

use crate::{
    api::{AvitologApi, SessionStore, keys},
    application::Application,
    command::{Action, Command},
    query::{QueryClient, QueryFilter},
    subscription::{Subscription, session::SessionExpired, terminal::TerminalEvents},
};

use home::{HomeMessage, HomePage};
use listing::{ListingMessage, ListingPage};
use not_found::NotFoundPage;

pub use route::Route;

const SESSION_EXPIRED: &str = "Сессия истекла. Войдите снова.";

/// Handles shared by every page.
#[derive(Clone)]
pub struct Context {
    pub api: Arc<dyn AvitologApi>,
    pub session: SessionStore,
    pub queries: QueryClient,
}

impl Context {
    /// The `me` query is only worth running with a stored token.
    #[must_use]
    pub fn has_session(&self) -> bool {
        self.session.has_token()
    }
}

#[derive(Clone)]
pub struct Flags {
    pub api: Arc<dyn AvitologApi>,
    pub session: SessionStore,
    pub queries: QueryClient,
    /// The page to open first.
    pub route: Route,
    /// How many listings the home page asks for.
    pub listings_limit: u32,
    /// Subscribe to terminal input. Off when the app is driven without a terminal.
    pub read_terminal: bool,
}

#[derive(Debug)]
pub enum Message {
    Terminal(Event),
    TerminalError(String),
    SessionExpired,
    /// The auth modal stored a new token.
    SignedIn,
    Navigate(Route),
    Home(HomeMessage),
    /// Tagged with the listing id so results for a page that was left are dropped.
    Listing(u64, ListingMessage),
    Quit,
}

enum Page {
    Home(HomePage),
    Listing(ListingPage),
    NotFound(NotFoundPage),
}

pub struct App {
    ctx: Context,
    route: Route,
    page: Page,
    status: Option<String>,
    listings_limit: u32,
    read_terminal: bool,
}

impl App {
    #[must_use]
    pub const fn route(&self) -> Route {
        self.route
    }

    /// The notice shown in the footer, if any.
    #[must_use]
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    #[must_use]
    pub const fn home(&self) -> Option<&HomePage> {
        match &self.page {
            Page::Home(page) => Some(page),
            _ => None,
        }
    }

    #[must_use]
    pub const fn listing(&self) -> Option<&ListingPage> {
        match &self.page {
            Page::Listing(page) => Some(page),
            _ => None,
        }
    }

    fn open(&mut self, route: Route) {
        debug!(%route, "navigating");
        self.route = route;
        self.page = match route {
            Route::Home => Page::Home(HomePage::new(&self.ctx, self.listings_limit)),
            Route::Listing(id) => Page::Listing(ListingPage::new(&self.ctx, id)),
            Route::NotFound => Page::NotFound(NotFoundPage),
        };
    }

    fn handle_key(&mut self, key: KeyEvent) -> Command<Message> {
        if key.kind != KeyEventKind::Press {
            return Command::none();
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Command::message(Message::Quit);
        }
        match &mut self.page {
            Page::Home(page) => page.handle_key(key),
            Page::Listing(page) => page.handle_key(key),
            Page::NotFound(page) => page.handle_key(key),
        }
    }

    fn help(&self) -> Vec<(&'static str, &'static str)> {
        match &self.page {
            Page::Home(page) => page.help(),
            Page::Listing(page) => page.help(),
            Page::NotFound(page) => page.help(),
        }
    }
}

impl Application for App {
    type Message = Message;
    type Flags = Flags;

    fn new(flags: Flags) -> (Self, Command<Message>) {
        let ctx = Context {
            api: flags.api,
            session: flags.session,
            queries: flags.queries,
        };
        info!(route = %flags.route, signed_in = ctx.has_session(), "starting");

        let mut app = Self {
            page: Page::NotFound(NotFoundPage),
            ctx,
            route: flags.route,
            status: None,
            listings_limit: flags.listings_limit,
            read_terminal: flags.read_terminal,
        };
        app.open(flags.route);
        (app, Command::none())
    }

    fn update(&mut self, msg: Message) -> Command<Message> {
        match msg {
            Message::Terminal(Event::Key(key)) => self.handle_key(key),
            Message::Terminal(_) => Command::none(),
            Message::TerminalError(e) => {
                error!("terminal input failed: {e}");
                Command::effect(Action::Quit)
            }
            Message::SessionExpired => {
                info!("session expired");
                self.ctx
                    .queries
                    .reset_queries(&QueryFilter::from(keys::me()));
                self.ctx.queries.invalidate_unauthorized();
                self.status = Some(SESSION_EXPIRED.to_string());
                Command::none()
            }
            Message::SignedIn => {
                self.status = None;
                Command::none()
            }
            Message::Navigate(route) => {
                self.status = None;
                self.open(route);
                Command::none()
            }
            Message::Home(msg) => match &mut self.page {
                Page::Home(page) => page.update(msg),
                _ => Command::none(),
            },
            Message::Listing(id, msg) => match &mut self.page {
                Page::Listing(page) if page.id() == id => page.update(msg),
                _ => {
                    debug!(id, "dropping message for a closed listing");
                    Command::none()
                }
            },
            Message::Quit => Command::effect(Action::Quit),
        }
    }

    fn view(&self, frame: &mut Frame<'_>) {
        let [header, body, footer] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        frame.render_widget(
            Line::from(vec![
                " Авитолог ".bold().black().on_green(),
                Span::raw(" "),
                Span::styled(self.route.path(), Style::new().dark_gray()),
            ]),
            header,
        );

        match &self.page {
            Page::Home(page) => page.view(frame, body),
            Page::Listing(page) => page.view(frame, body),
            Page::NotFound(page) => page.view(frame, body),
        }

        let footer_line = match &self.status {
            Some(status) => Line::from(Span::styled(
                status.as_str(),
                Style::new().fg(Color::Yellow),
            )),
            None => hints(&self.help()),
        };
        frame.render_widget(Paragraph::new(footer_line), footer);
    }

    fn subscriptions(&self) -> Vec<Subscription<Message>> {
        let mut subs = vec![
            Subscription::new(SessionExpired::new(self.ctx.session.clone()))
                .map(|()| Message::SessionExpired),
        ];
        if self.read_terminal {
            subs.push(
                Subscription::new(TerminalEvents::new()).map(|event| match event {
                    Ok(event) => Message::Terminal(event),
                    Err(e) => Message::TerminalError(e.to_string()),
                }),
            );
        }
        match &self.page {
            Page::Home(page) => subs.extend(page.subscriptions()),
            Page::Listing(page) => subs.extend(page.subscriptions()),
            Page::NotFound(_) => {}
        }
        subs
    }
}

/// Renders `[(key, action)]` as a dim help line.
fn hints(items: &[(&'static str, &'static str)]) -> Line<'static> {
    let mut spans = Vec::with_capacity(items.len() * 3);
    for (i, (key, action)) in items.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw("  "));
        }
        spans.push(Span::styled(*key, Style::new().bold()));
        spans.push(Span::styled(format!(" {action}"), Style::new().dark_gray()));
    }
    Line::from(spans)
}

/// Applies a typing key to `buffer`. Returns `false` for keys that are not editing keys.
pub(crate) fn edit(buffer: &mut String, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char(c)
            if !key
                .modifiers
                .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
        {
            buffer.push(c);
            true
        }
        KeyCode::Backspace => {
            buffer.pop();
            true
        }
        _ => false,
    }
}
