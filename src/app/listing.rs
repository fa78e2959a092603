use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use tracing::{debug, info};

use super::{
    Context, Message, Route,
    auth_modal::{AuthMessage, AuthMode, AuthModal, Outcome},
    edit, format, gating,
};
use crate::{
    api::{Comment, Listing, Me, keys},
    command::Command,
    error::ApiError,
    mutation::Mutation,
    query::{Query, QueryClient, QueryFilter, QueryOptions, QueryResult, QueryState},
    subscription::Subscription,
};

const BLOCKED: &str = "Ваш аккаунт заблокирован. Вы не можете оставлять комментарии.";

#[derive(Debug)]
pub enum ListingMessage {
    Listing(QueryResult<Listing>),
    Comments(QueryResult<Vec<Comment>>),
    Me(QueryResult<Me>),
    CommentAdded(Result<Comment, ApiError>),
    CommentDeleted(Result<(), ApiError>),
    Auth(AuthMessage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Comments,
    Draft,
}

/// One listing with its comment thread.
pub struct ListingPage {
    ctx: Context,
    id: u64,
    listing: QueryResult<Listing>,
    comments: QueryResult<Vec<Comment>>,
    me: QueryResult<Me>,
    draft: String,
    focus: Focus,
    selected: usize,
    add_comment: Mutation<String, Comment>,
    delete_comment: Mutation<u64, ()>,
    auth: Option<AuthModal>,
}

impl ListingPage {
    pub fn new(ctx: &Context, id: u64) -> Self {
        let api = Arc::clone(&ctx.api);
        let add_comment = Mutation::new(move |text: String| {
            let api = Arc::clone(&api);
            async move { api.add_comment(id, &text).await }
        })
        .on_success(refetch_comments(ctx.queries.clone(), id));

        let api = Arc::clone(&ctx.api);
        let delete_comment = Mutation::new(move |comment_id: u64| {
            let api = Arc::clone(&api);
            async move { api.delete_comment(comment_id).await }
        })
        .on_success(refetch_comments(ctx.queries.clone(), id));

        Self {
            ctx: ctx.clone(),
            id,
            listing: QueryResult::default(),
            comments: QueryResult::default(),
            me: QueryResult::default(),
            draft: String::new(),
            focus: Focus::Comments,
            selected: 0,
            add_comment,
            delete_comment,
            auth: None,
        }
    }

    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub const fn listing(&self) -> &QueryResult<Listing> {
        &self.listing
    }

    #[must_use]
    pub const fn comments(&self) -> &QueryResult<Vec<Comment>> {
        &self.comments
    }

    #[must_use]
    pub const fn me(&self) -> &QueryResult<Me> {
        &self.me
    }

    #[must_use]
    pub fn draft(&self) -> &str {
        &self.draft
    }

    #[must_use]
    pub const fn focus(&self) -> Focus {
        self.focus
    }

    #[must_use]
    pub const fn auth_modal(&self) -> Option<&AuthModal> {
        self.auth.as_ref()
    }

    /// The signed-in user, once the `me` query has loaded.
    #[must_use]
    pub fn current_user(&self) -> Option<&Me> {
        gating::current_user(self.ctx.has_session(), &self.me)
    }

    #[must_use]
    pub fn can_post(&self) -> bool {
        gating::can_post(self.ctx.has_session(), self.current_user())
    }

    #[must_use]
    pub fn can_submit(&self) -> bool {
        gating::can_submit(
            self.ctx.has_session(),
            self.current_user(),
            &self.draft,
            self.add_comment.is_pending(),
        )
    }

    /// Whether the delete action is offered for `comment`.
    #[must_use]
    pub fn can_delete(&self, comment: &Comment) -> bool {
        gating::can_delete(self.current_user(), comment)
    }

    fn selected_comment(&self) -> Option<&Comment> {
        self.comments
            .data()
            .and_then(|comments| comments.get(self.selected))
    }

    fn wrap(&self) -> impl Fn(ListingMessage) -> Message + Send + Sync + use<> {
        let id = self.id;
        move |msg| Message::Listing(id, msg)
    }

    pub fn update(&mut self, msg: ListingMessage) -> Command<Message> {
        match msg {
            ListingMessage::Listing(result) => {
                let missing = result.error().is_some_and(ApiError::is_not_found);
                self.listing = result;
                if missing {
                    info!(listing_id = self.id, "listing not found");
                    return Command::message(Message::Navigate(Route::NotFound));
                }
            }
            ListingMessage::Comments(result) => {
                self.comments = result;
                let len = self.comments.data().map_or(0, Vec::len);
                self.selected = self.selected.min(len.saturating_sub(1));
            }
            ListingMessage::Me(result) => {
                self.me = result;
                if !self.can_post() {
                    self.focus = Focus::Comments;
                }
            }
            ListingMessage::CommentAdded(Ok(comment)) => {
                debug!(comment_id = comment.id, "comment posted");
                self.draft.clear();
                self.focus = Focus::Comments;
            }
            ListingMessage::CommentDeleted(Ok(())) => debug!("comment deleted"),
            ListingMessage::CommentAdded(Err(_)) | ListingMessage::CommentDeleted(Err(_)) => {}
            ListingMessage::Auth(msg) => {
                let Some(modal) = self.auth.as_mut() else {
                    return Command::none();
                };
                let outcome = modal.update(msg);
                return self.after_modal(outcome);
            }
        }
        Command::none()
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Command<Message> {
        if let Some(modal) = self.auth.as_mut() {
            let outcome = modal.handle_key(key);
            return self.after_modal(outcome);
        }
        match self.focus {
            Focus::Draft => self.handle_draft_key(key),
            Focus::Comments => self.handle_thread_key(key),
        }
    }

    fn after_modal(&mut self, outcome: Outcome) -> Command<Message> {
        match outcome {
            Outcome::Stay(cmd) => {
                let wrap = self.wrap();
                cmd.map(move |msg| wrap(ListingMessage::Auth(msg)))
            }
            Outcome::Close => {
                self.auth = None;
                Command::none()
            }
            Outcome::SignedIn => {
                self.auth = None;
                Command::message(Message::SignedIn)
            }
        }
    }

    fn handle_draft_key(&mut self, key: KeyEvent) -> Command<Message> {
        match key.code {
            KeyCode::Esc => self.focus = Focus::Comments,
            KeyCode::Enter => return self.submit(),
            _ if !self.add_comment.is_pending() => {
                edit(&mut self.draft, key);
            }
            _ => {}
        }
        Command::none()
    }

    fn handle_thread_key(&mut self, key: KeyEvent) -> Command<Message> {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                let len = self.comments.data().map_or(0, Vec::len);
                self.selected = (self.selected + 1).min(len.saturating_sub(1));
            }
            KeyCode::Char('i') | KeyCode::Tab | KeyCode::Enter if self.can_post() => {
                self.focus = Focus::Draft;
            }
            KeyCode::Char('d') | KeyCode::Delete => return self.delete_selected(),
            KeyCode::Char('l') if self.current_user().is_none() => {
                self.auth = Some(AuthModal::new(&self.ctx, AuthMode::Login));
            }
            KeyCode::Char('r') if self.current_user().is_none() => {
                self.auth = Some(AuthModal::new(&self.ctx, AuthMode::Register));
            }
            KeyCode::Char('o') if self.ctx.has_session() => self.logout(),
            KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('b') => {
                return Command::message(Message::Navigate(Route::Home));
            }
            KeyCode::Char('q') => return Command::message(Message::Quit),
            _ => {}
        }
        Command::none()
    }

    fn submit(&self) -> Command<Message> {
        if !self.can_submit() {
            return Command::none();
        }
        let wrap = self.wrap();
        self.add_comment
            .mutate(self.draft.trim().to_string(), move |result| {
                wrap(ListingMessage::CommentAdded(result))
            })
    }

    fn delete_selected(&self) -> Command<Message> {
        let Some(comment) = self.selected_comment() else {
            return Command::none();
        };
        if !self.can_delete(comment) || self.delete_comment.is_pending() {
            return Command::none();
        }
        let wrap = self.wrap();
        self.delete_comment.mutate(comment.id, move |result| {
            wrap(ListingMessage::CommentDeleted(result))
        })
    }

    fn logout(&mut self) {
        info!("signing out");
        self.ctx.session.clear();
        self.ctx
            .queries
            .reset_queries(&QueryFilter::from(keys::me()));
        self.me = QueryResult::default();
        self.focus = Focus::Comments;
    }

    pub fn subscriptions(&self) -> Vec<Subscription<Message>> {
        let id = self.id;
        let queries = &self.ctx.queries;

        let api = Arc::clone(&self.ctx.api);
        let listing = Query::new(
            keys::listing(id),
            move || {
                let api = Arc::clone(&api);
                async move { api.listing(id).await }
            },
            queries,
        );

        let api = Arc::clone(&self.ctx.api);
        let comments = Query::new(
            keys::comments(id),
            move || {
                let api = Arc::clone(&api);
                async move { api.comments(id).await }
            },
            queries,
        );

        let api = Arc::clone(&self.ctx.api);
        let me = Query::new(
            keys::me(),
            move || {
                let api = Arc::clone(&api);
                async move { api.me().await }
            },
            queries,
        )
        .with_options(
            QueryOptions::default()
                .enabled(self.ctx.has_session())
                .retry(0),
        );

        vec![
            Subscription::new(listing).map(move |r| Message::Listing(id, ListingMessage::Listing(r))),
            Subscription::new(comments)
                .map(move |r| Message::Listing(id, ListingMessage::Comments(r))),
            Subscription::new(me).map(move |r| Message::Listing(id, ListingMessage::Me(r))),
        ]
    }

    pub fn help(&self) -> Vec<(&'static str, &'static str)> {
        if self.auth.is_some() {
            return vec![("Tab", "поле"), ("Enter", "отправить"), ("Esc", "закрыть")];
        }
        if self.focus == Focus::Draft {
            return vec![("Enter", "отправить"), ("Esc", "к комментариям")];
        }

        let mut hints = vec![("↑↓", "выбор")];
        if self.can_post() {
            hints.push(("i", "написать"));
        }
        if self.selected_comment().is_some_and(|c| self.can_delete(c)) {
            hints.push(("d", "удалить"));
        }
        if self.current_user().is_none() {
            hints.push(("l", "войти"));
            hints.push(("r", "регистрация"));
        }
        if self.ctx.has_session() {
            hints.push(("o", "выйти"));
        }
        hints.push(("Esc", "назад"));
        hints
    }

    pub fn view(&self, frame: &mut Frame<'_>, area: Rect) {
        let [details, thread] =
            Layout::vertical([Constraint::Length(9), Constraint::Min(0)]).areas(area);
        self.view_details(frame, details);
        self.view_thread(frame, thread);

        if let Some(modal) = &self.auth {
            modal.view(frame, area);
        }
    }

    fn view_details(&self, frame: &mut Frame<'_>, area: Rect) {
        let listing = match &self.listing.state {
            QueryState::Success { data, .. } => data,
            QueryState::Error(_) => {
                frame.render_widget(
                    Paragraph::new("Не удалось загрузить объявление").fg(Color::Red),
                    area,
                );
                return;
            }
            QueryState::Idle | QueryState::Loading => {
                frame.render_widget(Paragraph::new("Загрузка…"), area);
                return;
            }
        };

        let mut lines = vec![Line::from(Span::styled(
            listing.title.as_str(),
            Style::new().add_modifier(Modifier::BOLD),
        ))];
        let price = format::format_price(listing.price.as_deref());
        if !price.is_empty() {
            lines.push(Line::from(Span::styled(price, Style::new().fg(Color::Green))));
        }
        let published = format::format_date(listing.published_at.as_deref());
        if !published.is_empty() {
            lines.push(Line::from(vec![
                Span::styled("Опубликовано: ", Style::new().dark_gray()),
                Span::raw(published),
            ]));
        }
        lines.push(match &listing.image_url {
            Some(url) => Line::from(Span::styled(url.as_str(), Style::new().dark_gray())),
            None => Line::from(Span::styled(
                "Изображение недоступно",
                Style::new().dark_gray(),
            )),
        });
        if listing.description.trim().is_empty() {
            lines.push(Line::from(Span::styled(
                "Описание отсутствует",
                Style::new().dark_gray().italic(),
            )));
        } else {
            lines.push(Line::from(listing.description.as_str()));
        }
        if !listing.url.is_empty() {
            lines.push(Line::from(Span::styled(
                listing.url.as_str(),
                Style::new().fg(Color::Cyan).underlined(),
            )));
        }

        frame.render_widget(
            Paragraph::new(lines).wrap(Wrap { trim: true }),
            area,
        );
    }

    fn view_thread(&self, frame: &mut Frame<'_>, area: Rect) {
        let mut block = Block::default()
            .borders(Borders::TOP)
            .title(" Комментарии ".bold());
        if let Some(me) = self.current_user() {
            block = block.title(Line::from(format!(" {} ", me.username)).right_aligned());
        }
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let [prompt, list] =
            Layout::vertical([Constraint::Length(3), Constraint::Min(0)]).areas(inner);
        self.view_prompt(frame, prompt);

        let comments = match &self.comments.state {
            QueryState::Success { data, .. } => data,
            QueryState::Error(_) => {
                frame.render_widget(
                    Paragraph::new("Не удалось загрузить комментарии").fg(Color::Red),
                    list,
                );
                return;
            }
            QueryState::Idle | QueryState::Loading => {
                frame.render_widget(Paragraph::new("Загрузка комментариев…"), list);
                return;
            }
        };
        if comments.is_empty() {
            frame.render_widget(
                Paragraph::new("Пока нет комментариев. Будьте первым!").dark_gray(),
                list,
            );
            return;
        }

        let items: Vec<ListItem<'_>> = comments
            .iter()
            .map(|comment| {
                let mut header = vec![
                    Span::styled(
                        comment.user_username.as_str(),
                        Style::new().add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(
                        format!("  {}", format::format_date_time(Some(&comment.created_at))),
                        Style::new().dark_gray(),
                    ),
                ];
                if self.can_delete(comment) {
                    header.push(Span::styled("  Удалить", Style::new().fg(Color::Red)));
                }
                ListItem::new(vec![Line::from(header), Line::from(comment.text.as_str())])
            })
            .collect();

        let mut state = ListState::default().with_selected(Some(self.selected));
        frame.render_stateful_widget(
            List::new(items).highlight_symbol("› ").highlight_style(
                if self.focus == Focus::Comments {
                    Style::new().add_modifier(Modifier::REVERSED)
                } else {
                    Style::new()
                },
            ),
            list,
            &mut state,
        );
    }

    /// Draft box, sign-in prompt or blocked notice, depending on who is looking.
    fn view_prompt(&self, frame: &mut Frame<'_>, area: Rect) {
        if self.current_user().is_some_and(|me| me.is_blocked) {
            frame.render_widget(Paragraph::new(BLOCKED).fg(Color::Red), area);
            return;
        }
        if !self.can_post() {
            let prompt = Line::from(vec![
                Span::styled("Войти", Style::new().fg(Color::Cyan).bold()),
                Span::styled(" (l)", Style::new().dark_gray()),
                Span::raw("  ·  "),
                Span::styled("Зарегистрироваться", Style::new().fg(Color::Cyan).bold()),
                Span::styled(" (r)", Style::new().dark_gray()),
            ]);
            frame.render_widget(Paragraph::new(prompt), area);
            return;
        }

        let pending = self.add_comment.is_pending();
        let button = if pending { " Отправляем… " } else { " Отправить " };
        let text = if self.draft.is_empty() {
            Line::from(Span::styled(
                "Напишите свой комментарий",
                Style::new().dark_gray(),
            ))
        } else {
            Line::from(self.draft.as_str())
        };
        let border = if self.focus == Focus::Draft {
            Style::new().fg(Color::Cyan)
        } else {
            Style::new().dark_gray()
        };
        let mut block = Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title_bottom(Line::from(button.bold()).right_aligned());
        if self.add_comment.is_error() {
            block = block.title(
                Line::from(" Не удалось отправить комментарий ".fg(Color::Red)).right_aligned(),
            );
        }
        frame.render_widget(Paragraph::new(text).block(block), area);
    }
}

/// Mutation hook that refetches the thread of `listing_id`.
fn refetch_comments<I: 'static, O: 'static>(
    queries: QueryClient,
    listing_id: u64,
) -> impl Fn(&I, &O) + Send + Sync + 'static {
    move |_, _| queries.invalidate_queries(&QueryFilter::from(keys::comments(listing_id)))
}
