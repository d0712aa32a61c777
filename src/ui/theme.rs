//! Colour palettes for the dark and light themes.

use ratatui::style::{Color, Modifier, Style};

use crate::message::Role;
use crate::session::Theme;

/// Resolved styles for one theme
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub border: Style,
    pub focused_border: Style,
    pub muted: Style,
    pub user: Style,
    pub assistant: Style,
    pub system: Style,
    pub notice: Style,
    pub error: Style,
    pub code: Style,
    pub highlight: Style,
    pub accent: Style,
}

impl Palette {
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Self {
                border: Style::default().fg(Color::Gray),
                focused_border: Style::default().fg(Color::Green),
                muted: Style::default().fg(Color::DarkGray),
                user: Style::default().fg(Color::Cyan),
                assistant: Style::default().fg(Color::Green),
                system: Style::default().fg(Color::Yellow),
                notice: Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
                error: Style::default().fg(Color::Red),
                code: Style::default().fg(Color::LightMagenta),
                highlight: Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
                accent: Style::default().fg(Color::Yellow),
            },
            Theme::Light => Self {
                border: Style::default().fg(Color::DarkGray),
                focused_border: Style::default().fg(Color::Blue),
                muted: Style::default().fg(Color::Gray),
                user: Style::default().fg(Color::Blue),
                assistant: Style::default().fg(Color::Black),
                system: Style::default().fg(Color::Magenta),
                notice: Style::default().fg(Color::Magenta).add_modifier(Modifier::ITALIC),
                error: Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                code: Style::default().fg(Color::Rgb(120, 40, 140)),
                highlight: Style::default()
                    .fg(Color::White)
                    .bg(Color::Blue)
                    .add_modifier(Modifier::BOLD),
                accent: Style::default().fg(Color::Blue),
            },
        }
    }

    /// Content style based on role
    pub fn for_role(&self, role: Role) -> Style {
        match role {
            Role::User => self.user,
            Role::Assistant => self.assistant,
            Role::System => self.system,
        }
    }
}
