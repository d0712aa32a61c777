//! Conversation history display component

use crate::message::{ContentPart, Message, Role};
use crate::prompts::WELCOME_LINES;
use crate::ui::theme::Palette;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Scrollbar, ScrollbarOrientation, ScrollbarState, StatefulWidget, Widget},
};
use std::cell::Cell;

/// How an inline line is styled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
    /// Reply text that streamed before the turn failed
    Partial,
}

/// Transient line shown between messages; never stored in a conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineNotice {
    pub kind: NoticeKind,
    pub text: String,
    /// Number of messages that preceded the notice
    pub after: usize,
}

/// Scroll position and inline notices for the visible conversation
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    notices: Vec<InlineNotice>,
    /// Lines scrolled up from the bottom
    scroll_offset: usize,
    /// Largest useful offset as of the last draw
    max_scroll: Cell<usize>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show a notice after the given number of messages
    pub fn push_notice(&mut self, kind: NoticeKind, text: impl Into<String>, after: usize) {
        self.notices.push(InlineNotice {
            kind,
            text: text.into(),
            after,
        });
        self.scroll_to_bottom();
    }

    pub fn notices(&self) -> &[InlineNotice] {
        &self.notices
    }

    /// Drop notices, e.g. when another conversation becomes visible
    pub fn clear_notices(&mut self) {
        self.notices.clear();
        self.scroll_to_bottom();
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_offset = self
            .scroll_offset
            .saturating_add(lines)
            .min(self.max_scroll.get());
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_offset = 0;
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }
}

/// Everything needed to draw the history pane once
pub struct HistoryView<'a> {
    pub history: &'a ConversationHistory,
    pub messages: &'a [Message],
    pub streaming: Option<&'a str>,
    pub palette: &'a Palette,
    pub code_wrap: bool,
}

impl HistoryView<'_> {
    /// Lay out every message, notice and the in-flight reply as display lines
    pub fn lines(&self, width: usize) -> Vec<Line<'static>> {
        let mut all_lines = Vec::new();
        let mut notices = self.history.notices.iter().peekable();

        for (index, message) in self.messages.iter().enumerate() {
            while let Some(notice) = notices.next_if(|n| n.after <= index) {
                all_lines.extend(self.render_notice(notice, width));
            }
            all_lines.extend(self.render_message(message, width));
            all_lines.push(Line::default());
        }

        if let Some(text) = self.streaming {
            all_lines.push(Line::from(Span::styled(
                format!("🤖 {}", "─".repeat(20)),
                self.palette.muted,
            )));
            all_lines.extend(self.render_body(Role::Assistant, text, width));
        }

        for notice in notices {
            all_lines.extend(self.render_notice(notice, width));
        }

        all_lines
    }

    fn render_message(&self, message: &Message, width: usize) -> Vec<Line<'static>> {
        let icon = match message.role {
            Role::User => "👤",
            Role::Assistant => "🤖",
            Role::System => "⚙️",
        };

        let header = format!(
            "{} {} {}",
            icon,
            message.created_at.format("%H:%M:%S"),
            "─".repeat(20)
        );
        let mut lines = vec![Line::from(Span::styled(header, self.palette.muted))];
        for part in message.parts() {
            match part {
                ContentPart::Text(text) => {
                    lines.extend(self.render_body(message.role, text, width));
                }
                ContentPart::Image(image) => {
                    lines.push(Line::from(vec![
                        Span::raw("  "),
                        Span::styled(
                            format!("📎 {} ({})", image.name, image.size_label()),
                            self.palette.accent,
                        ),
                    ]));
                }
            }
        }
        lines
    }

    /// Message text with fenced code blocks wrapped or clipped
    fn render_body(&self, role: Role, text: &str, width: usize) -> Vec<Line<'static>> {
        let mut lines = Vec::new();

        let content_width = width.saturating_sub(2);
        let text_style = self.palette.for_role(role);
        let mut in_code = false;

        for raw in text.split('\n') {
            let is_fence = raw.trim_start().starts_with("```");
            let style = if in_code || is_fence {
                self.palette.code
            } else {
                text_style
            };

            let wrapped = if in_code && !is_fence && !self.code_wrap {
                vec![clip_line(raw, content_width)]
            } else if in_code {
                wrap_chars(raw, content_width)
            } else {
                wrap_text(raw, content_width)
            };

            for segment in wrapped {
                lines.push(Line::from(vec![Span::raw("  "), Span::styled(segment, style)]));
            }

            if is_fence {
                in_code = !in_code;
            }
        }
        lines
    }

    fn render_notice(&self, notice: &InlineNotice, width: usize) -> Vec<Line<'static>> {
        let style = match notice.kind {
            NoticeKind::Info => self.palette.notice,
            NoticeKind::Error => self.palette.error,
            NoticeKind::Partial => self.palette.muted,
        };
        let marker = match notice.kind {
            NoticeKind::Info => "ℹ ",
            NoticeKind::Error => "❌ ",
            NoticeKind::Partial => "… ",
        };

        let mut lines = Vec::new();
        for raw in notice.text.split('\n') {
            for segment in wrap_text(raw, width.saturating_sub(4)) {
                lines.push(Line::from(vec![
                    Span::styled(marker, style),
                    Span::styled(segment, style),
                ]));
            }
        }
        lines.push(Line::default());
        lines
    }
}

impl Widget for HistoryView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.palette.border)
            .title(" 💬 Conversation ");

        let inner_area = block.inner(area);
        block.render(area, buf);

        if self.messages.is_empty() && self.streaming.is_none() && self.history.notices.is_empty() {
            let styles = [self.palette.assistant, self.palette.muted, self.palette.muted];
            for (i, (text, style)) in WELCOME_LINES.iter().zip(styles).enumerate() {
                let y = inner_area.y + (i as u16) * 2;
                if y < inner_area.bottom() {
                    let line = Line::from(Span::styled(*text, style));
                    buf.set_line(inner_area.x, y, &line, inner_area.width);
                }
            }
            self.history.max_scroll.set(0);
            return;
        }

        let all_lines = self.lines(inner_area.width as usize);
        let height = inner_area.height as usize;
        let total = all_lines.len();
        let max_offset = total.saturating_sub(height);
        self.history.max_scroll.set(max_offset);
        let offset = self.history.scroll_offset.min(max_offset);
        let start = max_offset - offset;

        for (i, line) in all_lines.iter().skip(start).take(height).enumerate() {
            buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
        }

        if total > height {
            let mut state = ScrollbarState::new(max_offset).position(start);
            Scrollbar::default()
                .orientation(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("↑"))
                .end_symbol(Some("↓"))
                .style(self.palette.muted)
                .render(area, buf, &mut state);
        }
    }
}

/// Wrap text on word boundaries; words longer than the width are split
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current_line = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if current_len > 0 && current_len + 1 + word_len <= width {
            current_line.push(' ');
            current_line.push_str(word);
            current_len += 1 + word_len;
            continue;
        }

        if current_len > 0 {
            lines.push(std::mem::take(&mut current_line));
        }
        let mut pieces = wrap_chars(word, width);
        let last = pieces.pop().unwrap_or_default();
        lines.extend(pieces);
        current_len = last.chars().count();
        current_line = last;
    }

    if !current_line.is_empty() || lines.is_empty() {
        lines.push(current_line);
    }

    lines
}

/// Hard wrap every `width` characters, keeping whitespace
pub fn wrap_chars(text: &str, width: usize) -> Vec<String> {
    if width == 0 || text.is_empty() {
        return vec![text.to_string()];
    }
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(width).map(|chunk| chunk.iter().collect()).collect()
}

/// Cut a line to `width` characters, marking the cut
pub fn clip_line(text: &str, width: usize) -> String {
    if width == 0 || text.chars().count() <= width {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(width.saturating_sub(1)).collect();
    clipped.push('…');
    clipped
}
