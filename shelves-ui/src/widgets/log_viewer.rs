//! Log viewer widget
//!
//! A scrollable text area for the conversation log

use cosmic::iced::Length;
use cosmic::widget::{self, column, container, scrollable, text};
use cosmic::Element;

use crate::shell::ConversationLog;

/// Log viewer component
///
/// `scroll_id` names the scrollable so the app can snap it to the newest
/// entry.
pub struct LogViewer<'a> {
    log: &'a ConversationLog,
    scroll_id: widget::Id,
}

impl<'a> LogViewer<'a> {
    pub fn new(log: &'a ConversationLog, scroll_id: widget::Id) -> Self {
        Self { log, scroll_id }
    }

    pub fn view<M: 'a>(self) -> Element<'a, M> {
        let log_elements: Vec<Element<'a, M>> = self
            .log
            .text()
            .lines()
            .map(|line| text(line).size(14).into())
            .collect();

        let log_column = column::with_children(log_elements).spacing(2);

        let log_scroll = scrollable(log_column)
            .id(self.scroll_id)
            .height(Length::Fill);

        container(log_scroll)
            .width(Length::Fill)
            .height(Length::Fill)
            .padding(8)
            .into()
    }
}
