use crate::session::ConversationSummary;
use crate::ui::theme::Palette;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Modifier,
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

/// Conversation previews, newest first, numbered for `/switch` and `/delete`
pub struct ConversationSidebar<'a> {
    pub conversations: &'a [ConversationSummary],
    pub palette: &'a Palette,
}

impl ConversationSidebar<'_> {
    pub fn lines(&self) -> Vec<Line<'static>> {
        self.conversations
            .iter()
            .enumerate()
            .map(|(index, summary)| {
                let (marker, style) = if summary.is_current {
                    ("▶", self.palette.highlight)
                } else {
                    (" ", self.palette.border)
                };
                Line::from(vec![
                    Span::styled(format!("{}{:>2}. ", marker, index + 1), style),
                    Span::styled(summary.preview.clone(), style),
                    Span::styled(
                        format!(" ({})", summary.message_count),
                        self.palette.muted.add_modifier(Modifier::DIM),
                    ),
                ])
            })
            .collect()
    }
}

impl Widget for ConversationSidebar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.palette.border)
            .title(" 🗂 Chats ");
        let inner = block.inner(area);
        block.render(area, buf);

        let lines = self.lines();
        // Keep the current conversation in view when the list is long.
        let current = self
            .conversations
            .iter()
            .position(|summary| summary.is_current)
            .unwrap_or(0);
        let skip = current.saturating_sub(inner.height.saturating_sub(1) as usize);

        for (row, line) in lines.iter().skip(skip).take(inner.height as usize).enumerate() {
            buf.set_line(inner.x, inner.y + row as u16, line, inner.width);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Theme;

    #[test]
    fn test_current_row_is_marked() {
        let palette = Palette::for_theme(Theme::Dark);
        let rows = vec![
            ConversationSummary {
                id: "b".to_string(),
                preview: "New conversation".to_string(),
                message_count: 0,
                is_current: true,
            },
            ConversationSummary {
                id: "a".to_string(),
                preview: "hello".to_string(),
                message_count: 2,
                is_current: false,
            },
        ];
        let sidebar = ConversationSidebar {
            conversations: &rows,
            palette: &palette,
        };
        let text: Vec<String> = sidebar
            .lines()
            .iter()
            .map(|line| line.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect();
        assert_eq!(text[0], "▶ 1. New conversation (0)");
        assert_eq!(text[1], "  2. hello (2)");
    }
}
