//! Sign-in and registration form shown over the listing page.

use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph},
};
use tracing::info;

use super::{Context, edit};
use crate::{
    api::{AuthToken, Credentials, RegisterForm, keys},
    command::Command,
    error::ApiError,
    mutation::{MutateOptions, Mutation},
    query::QueryFilter,
};

const AUTH_FAILED: &str = "Ошибка авторизации. Проверьте данные.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Login,
    Register,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Username,
    Password,
    Email,
}

#[derive(Debug)]
pub enum AuthMessage {
    Finished(Result<AuthToken, ApiError>),
}

/// What the owner of the modal should do after a key or message.
pub enum Outcome {
    Stay(Command<AuthMessage>),
    Close,
    /// Closed after a successful login or registration.
    SignedIn,
}

pub struct AuthModal {
    ctx: Context,
    mode: AuthMode,
    field: Field,
    username: String,
    password: String,
    email: String,
    login: Mutation<Credentials, AuthToken>,
    register: Mutation<RegisterForm, AuthToken>,
}

impl AuthModal {
    pub fn new(ctx: &Context, mode: AuthMode) -> Self {
        let api = Arc::clone(&ctx.api);
        let login = Mutation::new(move |credentials: Credentials| {
            let api = Arc::clone(&api);
            async move { api.login(&credentials).await }
        });
        let api = Arc::clone(&ctx.api);
        let register = Mutation::new(move |form: RegisterForm| {
            let api = Arc::clone(&api);
            async move { api.register(&form).await }
        });

        Self {
            ctx: ctx.clone(),
            mode,
            field: Field::Username,
            username: String::new(),
            password: String::new(),
            email: String::new(),
            login,
            register,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> AuthMode {
        self.mode
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        match self.mode {
            AuthMode::Login => self.login.is_pending(),
            AuthMode::Register => self.register.is_pending(),
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        match self.mode {
            AuthMode::Login => self.login.is_error(),
            AuthMode::Register => self.register.is_error(),
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Outcome {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => return Outcome::Close,
            KeyCode::Enter => return Outcome::Stay(self.submit()),
            KeyCode::Char('r') if ctrl => self.switch_mode(),
            KeyCode::Tab | KeyCode::Down => self.field = self.next_field(),
            KeyCode::BackTab | KeyCode::Up => self.field = self.previous_field(),
            _ if !self.is_pending() => {
                let buffer = match self.field {
                    Field::Username => &mut self.username,
                    Field::Password => &mut self.password,
                    Field::Email => &mut self.email,
                };
                edit(buffer, key);
            }
            _ => {}
        }
        Outcome::Stay(Command::none())
    }

    pub fn update(&mut self, msg: AuthMessage) -> Outcome {
        match msg {
            AuthMessage::Finished(Ok(token)) => {
                info!(username = %token.username, "authenticated");
                Outcome::SignedIn
            }
            AuthMessage::Finished(Err(_)) => Outcome::Stay(Command::none()),
        }
    }

    fn submit(&self) -> Command<AuthMessage> {
        let username = self.username.trim();
        if username.is_empty() || self.password.trim().is_empty() || self.is_pending() {
            return Command::none();
        }

        match self.mode {
            AuthMode::Login => self.login.mutate_with(
                Credentials {
                    username: username.to_string(),
                    password: self.password.clone(),
                },
                self.store_token(),
                AuthMessage::Finished,
            ),
            AuthMode::Register => {
                let email = self.email.trim();
                self.register.mutate_with(
                    RegisterForm {
                        username: username.to_string(),
                        password: self.password.clone(),
                        email: (!email.is_empty()).then(|| email.to_string()),
                    },
                    self.store_token(),
                    AuthMessage::Finished,
                )
            }
        }
    }

    /// Keeps the new token and refetches the current user.
    fn store_token<I: 'static>(&self) -> MutateOptions<I, AuthToken> {
        let session = self.ctx.session.clone();
        let queries = self.ctx.queries.clone();
        MutateOptions::new().on_success(move |_, token: &AuthToken| {
            session.set_token(token.token.as_str());
            queries.invalidate_queries(&QueryFilter::from(keys::me()));
        })
    }

    fn switch_mode(&mut self) {
        self.mode = match self.mode {
            AuthMode::Login => AuthMode::Register,
            AuthMode::Register => AuthMode::Login,
        };
        if self.field == Field::Email {
            self.field = Field::Username;
        }
    }

    fn fields(&self) -> &'static [Field] {
        match self.mode {
            AuthMode::Login => &[Field::Username, Field::Password],
            AuthMode::Register => &[Field::Username, Field::Password, Field::Email],
        }
    }

    fn next_field(&self) -> Field {
        let fields = self.fields();
        let i = fields.iter().position(|f| *f == self.field).unwrap_or(0);
        fields[(i + 1) % fields.len()]
    }

    fn previous_field(&self) -> Field {
        let fields = self.fields();
        let i = fields.iter().position(|f| *f == self.field).unwrap_or(0);
        fields[(i + fields.len() - 1) % fields.len()]
    }

    pub fn view(&self, frame: &mut Frame<'_>, area: Rect) {
        let height = if self.mode == AuthMode::Register { 15 } else { 12 };
        let popup = centered(area, 50, height);
        frame.render_widget(Clear, popup);

        let (title, submit, switch) = match self.mode {
            AuthMode::Login => (" Вход ", "Войти", "Нет аккаунта? Зарегистрируйтесь"),
            AuthMode::Register => (
                " Регистрация ",
                "Зарегистрироваться",
                "Уже есть аккаунт? Войдите",
            ),
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .title(title.bold());
        let inner = block.inner(popup);
        frame.render_widget(block, popup);

        let mut rows = vec![Constraint::Length(3), Constraint::Length(3)];
        if self.mode == AuthMode::Register {
            rows.push(Constraint::Length(3));
        }
        rows.extend([Constraint::Length(1), Constraint::Length(1), Constraint::Min(0)]);
        let areas = Layout::vertical(rows).split(inner);

        let masked = "•".repeat(self.password.chars().count());
        self.view_field(frame, areas[0], "Логин", &self.username, Field::Username);
        self.view_field(frame, areas[1], "Пароль", &masked, Field::Password);
        let mut next = 2;
        if self.mode == AuthMode::Register {
            self.view_field(frame, areas[2], "Email (необязательно)", &self.email, Field::Email);
            next = 3;
        }

        if self.is_error() {
            frame.render_widget(Paragraph::new(AUTH_FAILED).fg(Color::Red), areas[next]);
        }
        let action = if self.is_pending() { "Подождите…" } else { submit };
        frame.render_widget(
            Paragraph::new(Line::from(vec![
                Span::styled(action, Style::new().add_modifier(Modifier::BOLD)),
                Span::styled(" (Enter)", Style::new().dark_gray()),
            ])),
            areas[next + 1],
        );
        frame.render_widget(
            Paragraph::new(Line::from(vec![
                Span::styled(switch, Style::new().fg(Color::Cyan)),
                Span::styled(" (Ctrl+R)", Style::new().dark_gray()),
            ])),
            areas[next + 2],
        );
    }

    fn view_field(&self, frame: &mut Frame<'_>, area: Rect, label: &str, value: &str, field: Field) {
        let border = if self.field == field {
            Style::new().fg(Color::Cyan)
        } else {
            Style::new().dark_gray()
        };
        frame.render_widget(
            Paragraph::new(value).block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(border)
                    .title(label),
            ),
            area,
        );
    }
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let [row] = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .areas(area);
    let [popup] = Layout::horizontal([Constraint::Length(width)])
        .flex(Flex::Center)
        .areas(row);
    popup
}
