use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};
use tracing::info;

use super::{Context, Message, Route, edit, format};
use crate::{
    api::{Listing, keys},
    command::Command,
    error::ApiError,
    mutation::Mutation,
    query::{Query, QueryFilter, QueryResult, QueryState},
    subscription::Subscription,
};

const PLACEHOLDER: &str = "Вставьте ссылку на объявление avito.ru";
const INGEST_FAILED: &str =
    "Не удалось обработать ссылку. Проверьте корректность и попробуйте ещё раз.";

#[derive(Debug)]
pub enum HomeMessage {
    Listings(QueryResult<Vec<Listing>>),
    Ingested(Result<Listing, ApiError>),
}

/// The landing page: a URL box for importing a listing and the most viewed listings.
pub struct HomePage {
    ctx: Context,
    limit: u32,
    url: String,
    listings: QueryResult<Vec<Listing>>,
    selected: usize,
    ingest: Mutation<String, Listing>,
}

impl HomePage {
    pub fn new(ctx: &Context, limit: u32) -> Self {
        let api = Arc::clone(&ctx.api);
        let queries = ctx.queries.clone();
        let ingest = Mutation::new(move |url: String| {
            let api = Arc::clone(&api);
            async move { api.ingest_by_url(&url).await }
        })
        .on_success(move |_, listing: &Listing| {
            queries.invalidate_queries(&QueryFilter::from(keys::listing(listing.id)));
            queries.invalidate_queries(&keys::all_listings());
        });

        Self {
            ctx: ctx.clone(),
            limit,
            url: String::new(),
            listings: QueryResult::default(),
            selected: 0,
            ingest,
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub const fn listings(&self) -> &QueryResult<Vec<Listing>> {
        &self.listings
    }

    #[must_use]
    pub const fn ingest(&self) -> &Mutation<String, Listing> {
        &self.ingest
    }

    pub fn update(&mut self, msg: HomeMessage) -> Command<Message> {
        match msg {
            HomeMessage::Listings(result) => {
                self.listings = result;
                let len = self.listings.data().map_or(0, Vec::len);
                self.selected = self.selected.min(len.saturating_sub(1));
                Command::none()
            }
            HomeMessage::Ingested(Ok(listing)) => {
                info!(listing_id = listing.id, "opening ingested listing");
                self.url.clear();
                Command::message(Message::Navigate(Route::Listing(listing.id)))
            }
            HomeMessage::Ingested(Err(_)) => Command::none(),
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Command<Message> {
        match key.code {
            KeyCode::Enter if self.url.trim().is_empty() => self.open_selected(),
            KeyCode::Enter => self.submit(),
            KeyCode::Up => {
                self.selected = self.selected.saturating_sub(1);
                Command::none()
            }
            KeyCode::Down => {
                let len = self.listings.data().map_or(0, Vec::len);
                self.selected = (self.selected + 1).min(len.saturating_sub(1));
                Command::none()
            }
            KeyCode::Esc if self.url.is_empty() => Command::message(Message::Quit),
            KeyCode::Esc => {
                self.url.clear();
                Command::none()
            }
            _ => {
                if !self.ingest.is_pending() {
                    edit(&mut self.url, key);
                }
                Command::none()
            }
        }
    }

    fn submit(&self) -> Command<Message> {
        let url = self.url.trim();
        if url.is_empty() || self.ingest.is_pending() {
            return Command::none();
        }
        self.ingest.mutate(url.to_string(), |result| {
            Message::Home(HomeMessage::Ingested(result))
        })
    }

    fn open_selected(&self) -> Command<Message> {
        self.listings
            .data()
            .and_then(|listings| listings.get(self.selected))
            .map_or_else(Command::none, |listing| {
                Command::message(Message::Navigate(Route::Listing(listing.id)))
            })
    }

    pub fn subscriptions(&self) -> Vec<Subscription<Message>> {
        let api = Arc::clone(&self.ctx.api);
        let limit = self.limit;
        let top = Query::new(
            keys::listings(limit),
            move || {
                let api = Arc::clone(&api);
                async move { api.top_listings(limit).await }
            },
            &self.ctx.queries,
        );
        vec![Subscription::new(top).map(|result| Message::Home(HomeMessage::Listings(result)))]
    }

    pub fn help(&self) -> Vec<(&'static str, &'static str)> {
        if self.url.is_empty() {
            vec![("↑↓", "выбор"), ("Enter", "открыть"), ("Esc", "выход")]
        } else {
            vec![("Enter", "открыть ссылку"), ("Esc", "очистить")]
        }
    }

    pub fn view(&self, frame: &mut Frame<'_>, area: Rect) {
        let [intro, input, notice, list] = Layout::vertical([
            Constraint::Length(2),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .areas(area);

        frame.render_widget(
            Paragraph::new("Комментируйте объявления с Avito.").fg(Color::Gray),
            intro,
        );

        let pending = self.ingest.is_pending();
        let button = if pending { " Открываем… " } else { " Открыть " };
        let text = if self.url.is_empty() {
            Line::from(Span::styled(PLACEHOLDER, Style::new().dark_gray()))
        } else {
            Line::from(self.url.as_str())
        };
        let input_style = if pending {
            Style::new().dark_gray()
        } else {
            Style::new()
        };
        frame.render_widget(
            Paragraph::new(text).style(input_style).block(
                Block::default()
                    .borders(Borders::ALL)
                    .title_bottom(Line::from(button.bold()).right_aligned()),
            ),
            input,
        );

        if self.ingest.is_error() {
            frame.render_widget(Paragraph::new(INGEST_FAILED).fg(Color::Red), notice);
        }

        self.view_listings(frame, list);
    }

    fn view_listings(&self, frame: &mut Frame<'_>, area: Rect) {
        let block = Block::default()
            .borders(Borders::TOP)
            .title(" Самые просматриваемые ".bold());

        let listings = match &self.listings.state {
            QueryState::Success { data, .. } => data,
            QueryState::Error(_) => {
                frame.render_widget(
                    Paragraph::new("Ошибка загрузки объявлений")
                        .fg(Color::Red)
                        .block(block),
                    area,
                );
                return;
            }
            QueryState::Idle | QueryState::Loading => {
                frame.render_widget(Paragraph::new("Загрузка…").block(block), area);
                return;
            }
        };

        let items: Vec<ListItem<'_>> = listings
            .iter()
            .map(|listing| {
                let mut spans = vec![Span::styled(
                    listing.title.as_str(),
                    Style::new().add_modifier(Modifier::BOLD),
                )];
                let price = format::format_price(listing.price.as_deref());
                if !price.is_empty() {
                    spans.push(Span::raw("  "));
                    spans.push(Span::styled(price, Style::new().fg(Color::Green)));
                }
                let published = format::format_date(listing.published_at.as_deref());
                if !published.is_empty() {
                    spans.push(Span::styled(
                        format!("  {published}"),
                        Style::new().dark_gray(),
                    ));
                }
                ListItem::new(Line::from(spans))
            })
            .collect();

        let mut state = ListState::default().with_selected(Some(self.selected));
        frame.render_stateful_widget(
            List::new(items)
                .block(block)
                .highlight_symbol("› ")
                .highlight_style(Style::new().add_modifier(Modifier::REVERSED)),
            area,
            &mut state,
        );
    }
}
