//! Palette and semantic styles.

use ratatui::style::{Color, Modifier, Style};

use crate::action::NotificationLevel;

// ── Palette ───────────────────────────────────────────────────────────

pub const BARK: Color = Color::Rgb(205, 133, 63); // #cd853f
pub const MOSS: Color = Color::Rgb(138, 201, 38); // #8ac926
pub const SKY: Color = Color::Rgb(128, 255, 234); // #80ffea
pub const AMBER: Color = Color::Rgb(241, 250, 140); // #f1fa8c
pub const ERROR_RED: Color = Color::Rgb(255, 99, 99); // #ff6363

pub const DIM_WHITE: Color = Color::Rgb(189, 193, 207); // #bdc1cf
pub const BORDER_GRAY: Color = Color::Rgb(98, 114, 164); // #6272a4
pub const BG_HIGHLIGHT: Color = Color::Rgb(40, 42, 54); // #282a36

// ── Semantic Styles ───────────────────────────────────────────────────

pub fn title_style() -> Style {
    Style::default().fg(SKY).add_modifier(Modifier::BOLD)
}

pub fn border_default() -> Style {
    Style::default().fg(BORDER_GRAY)
}

pub fn icon_style() -> Style {
    Style::default().fg(BARK)
}

/// Record count and elapsed label in the header.
pub fn header_meta() -> Style {
    Style::default().fg(DIM_WHITE)
}

pub fn row_label() -> Style {
    Style::default().fg(DIM_WHITE)
}

/// Secondary column values after the row label.
pub fn row_column() -> Style {
    Style::default().fg(BORDER_GRAY)
}

/// Marker beside the widget's own record.
pub fn own_record() -> Style {
    Style::default().fg(MOSS).add_modifier(Modifier::BOLD)
}

pub fn row_selected() -> Style {
    Style::default()
        .fg(SKY)
        .bg(BG_HIGHLIGHT)
        .add_modifier(Modifier::BOLD)
}

pub fn throbber() -> Style {
    Style::default().fg(MOSS)
}

pub fn key_hint() -> Style {
    Style::default().fg(BORDER_GRAY)
}

pub fn key_hint_key() -> Style {
    Style::default().fg(SKY).add_modifier(Modifier::BOLD)
}

pub fn notification(level: NotificationLevel) -> Style {
    let color = match level {
        NotificationLevel::Info => SKY,
        NotificationLevel::Warning => AMBER,
        NotificationLevel::Error => ERROR_RED,
    };
    Style::default().fg(color)
}
