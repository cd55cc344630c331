//! Busy spinner widget

use cosmic::iced::Alignment;
use cosmic::widget::{row, text};
use cosmic::Element;

use crate::shell::Spinner;

const BUSY_LABEL: &str = "Waiting...";

/// Animated glyph plus label; callers only show it while visible
pub fn view<'a, M: 'a>(spinner: &Spinner) -> Element<'a, M> {
    row()
        .push(text(spinner.glyph()).size(16))
        .push(text(BUSY_LABEL).size(12))
        .spacing(8)
        .align_y(Alignment::Center)
        .into()
}
