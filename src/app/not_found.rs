use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Flex, Layout, Rect},
    style::{Color, Stylize},
    text::Line,
    widgets::Paragraph,
};

use super::{Message, Route};
use crate::command::Command;

pub struct NotFoundPage;

impl NotFoundPage {
    pub fn handle_key(&mut self, key: KeyEvent) -> Command<Message> {
        match key.code {
            KeyCode::Enter | KeyCode::Esc | KeyCode::Char('h') => {
                Command::message(Message::Navigate(Route::Home))
            }
            KeyCode::Char('q') => Command::message(Message::Quit),
            _ => Command::none(),
        }
    }

    pub fn help(&self) -> Vec<(&'static str, &'static str)> {
        vec![("Enter", "на главную"), ("q", "выход")]
    }

    pub fn view(&self, frame: &mut Frame<'_>, area: Rect) {
        let [body] = Layout::vertical([Constraint::Length(5)])
            .flex(Flex::Center)
            .areas(area);
        let lines = vec![
            Line::from("404".bold().fg(Color::Red)),
            Line::from("Страница не найдена"),
            Line::default(),
            Line::from("На главную (Enter)".fg(Color::Cyan)),
        ];
        frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), body);
    }
}
