use crate::ui::conversation::commands::{
    CommandEntry, ParsedCommand, command_entries, parse_slash_command,
};
use crate::ui::theme::Palette;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Widget},
};

/// Result returned when the user interacts with the conversation composer
#[derive(Debug, PartialEq)]
pub enum ConversationResult {
    Submitted(String),
    Command(ParsedCommand),
    None,
}

/// State for the text area within the composer
#[derive(Debug, Clone, Default)]
pub struct TextAreaState {
    pub content: String,
    /// Byte offset, always on a char boundary
    pub cursor_position: usize,
}

/// Conversation composer for user input
#[derive(Clone)]
pub struct ConversationComposer {
    state: TextAreaState,
    placeholder: String,
    has_focus: bool,
    model: String,
    attachment: Option<String>,
    palette: Palette,
    command_entries: Vec<CommandEntry>,
    filtered_commands: Vec<CommandEntry>,
    show_command_palette: bool,
    selected_command: Option<usize>,
}

impl ConversationComposer {
    pub fn new(placeholder: impl Into<String>, palette: Palette) -> Self {
        Self {
            state: TextAreaState::default(),
            placeholder: placeholder.into(),
            has_focus: false,
            model: String::new(),
            attachment: None,
            palette,
            command_entries: command_entries(),
            filtered_commands: Vec::new(),
            show_command_palette: false,
            selected_command: None,
        }
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ConversationResult {
        if key.kind != KeyEventKind::Press {
            return ConversationResult::None;
        }

        match key.code {
            KeyCode::Enter => {
                if key.modifiers.contains(KeyModifiers::SHIFT)
                    || key.modifiers.contains(KeyModifiers::ALT)
                {
                    self.insert_char('\n');
                    return ConversationResult::None;
                }
                if self.show_command_palette
                    && parse_slash_command(&self.state.content).is_none()
                {
                    self.apply_selected_command();
                    return ConversationResult::None;
                }
                return self.submit();
            }
            KeyCode::Up if self.show_command_palette => self.move_command_selection(-1),
            KeyCode::Down if self.show_command_palette => self.move_command_selection(1),
            KeyCode::Esc if self.show_command_palette => self.close_command_palette(),
            KeyCode::Tab if self.show_command_palette => {
                self.apply_selected_command();
            }
            KeyCode::Char(c) => {
                if key.modifiers.contains(KeyModifiers::CONTROL) {
                    return ConversationResult::None;
                }
                self.insert_char(c);
                self.sync_command_palette();
            }
            KeyCode::Backspace => {
                if self.backspace() {
                    self.sync_command_palette();
                }
            }
            KeyCode::Delete => {
                if self.delete() {
                    self.sync_command_palette();
                }
            }
            KeyCode::Left => {
                let previous = self.char_before_cursor();
                if let Some(c) = previous {
                    self.state.cursor_position -= c.len_utf8();
                }
            }
            KeyCode::Right => {
                let next = self.state.content[self.state.cursor_position..].chars().next();
                if let Some(c) = next {
                    self.state.cursor_position += c.len_utf8();
                }
            }
            KeyCode::Home => {
                self.state.cursor_position = 0;
            }
            KeyCode::End => {
                self.state.cursor_position = self.state.content.len();
            }
            _ => {}
        }

        ConversationResult::None
    }

    fn submit(&mut self) -> ConversationResult {
        let has_text = !self.state.content.trim().is_empty();
        if !has_text && self.attachment.is_none() {
            return ConversationResult::None;
        }

        let content = std::mem::take(&mut self.state.content);
        self.state.cursor_position = 0;
        self.close_command_palette();

        match parse_slash_command(&content) {
            Some(command) => ConversationResult::Command(command),
            None => ConversationResult::Submitted(content),
        }
    }

    /// Insert a character at the cursor position
    fn insert_char(&mut self, c: char) {
        self.state.content.insert(self.state.cursor_position, c);
        self.state.cursor_position += c.len_utf8();
    }

    fn char_before_cursor(&self) -> Option<char> {
        self.state.content[..self.state.cursor_position]
            .chars()
            .next_back()
    }

    /// Delete character before cursor
    fn backspace(&mut self) -> bool {
        match self.char_before_cursor() {
            Some(c) => {
                self.state.cursor_position -= c.len_utf8();
                self.state.content.remove(self.state.cursor_position);
                true
            }
            None => false,
        }
    }

    /// Delete character at cursor
    fn delete(&mut self) -> bool {
        if self.state.cursor_position < self.state.content.len() {
            self.state.content.remove(self.state.cursor_position);
            true
        } else {
            false
        }
    }

    /// Open, refresh or close the palette to match the typed text
    fn sync_command_palette(&mut self) {
        let content = &self.state.content;
        let is_command_word = content.starts_with('/') && !content.contains(char::is_whitespace);
        if is_command_word {
            if !self.show_command_palette {
                self.show_command_palette = true;
                self.selected_command = Some(0);
            }
            self.refresh_command_palette();
        } else {
            self.close_command_palette();
        }
    }

    fn close_command_palette(&mut self) {
        self.show_command_palette = false;
        self.filtered_commands.clear();
        self.selected_command = None;
    }

    fn refresh_command_palette(&mut self) {
        let query = self.state.content.trim_start_matches('/').to_lowercase();
        self.filtered_commands = self
            .command_entries
            .iter()
            .filter(|entry| query.is_empty() || entry.keyword.starts_with(&query))
            .copied()
            .collect();

        if self.filtered_commands.is_empty() {
            self.selected_command = None;
        } else {
            let index = self.selected_command.unwrap_or(0);
            self.selected_command = Some(index.min(self.filtered_commands.len() - 1));
        }
    }

    fn move_command_selection(&mut self, delta: isize) {
        if self.filtered_commands.is_empty() {
            self.selected_command = None;
            return;
        }

        let current = self.selected_command.unwrap_or(0) as isize;
        let len = self.filtered_commands.len() as isize;
        let next = (current + delta).rem_euclid(len);
        self.selected_command = Some(next as usize);
    }

    fn apply_selected_command(&mut self) -> bool {
        let Some(entry) = self
            .selected_command
            .and_then(|index| self.filtered_commands.get(index))
            .copied()
        else {
            return false;
        };

        self.state.content = format!("/{} ", entry.keyword);
        self.state.cursor_position = self.state.content.len();
        self.close_command_palette();
        true
    }

    /// Set focus state
    pub fn set_focus(&mut self, has_focus: bool) {
        self.has_focus = has_focus;
    }

    /// Model and staged attachment shown in the title
    pub fn set_context(&mut self, model: &str, attachment: Option<String>) {
        self.model = model.to_string();
        self.attachment = attachment;
    }

    pub fn set_palette(&mut self, palette: Palette) {
        self.palette = palette;
    }

    /// Get current content
    pub fn content(&self) -> &str {
        &self.state.content
    }

    pub fn is_palette_open(&self) -> bool {
        self.show_command_palette
    }

    /// Clear content
    pub fn clear(&mut self) {
        self.state = TextAreaState::default();
        self.close_command_palette();
    }

    fn title(&self) -> String {
        match &self.attachment {
            Some(label) => format!(" ✍ {} │ 📎 {} ", self.model, label),
            None => format!(" ✍ {} ", self.model),
        }
    }

    /// Rows needed for the current text, clamped to a sensible range
    pub fn desired_height(&self) -> u16 {
        let lines = self.state.content.split('\n').count().clamp(1, 6);
        lines as u16 + 2
    }
}

impl Widget for &ConversationComposer {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let palette = &self.palette;
        let block = Block::default()
            .borders(Borders::ALL)
            .title(self.title())
            .style(if self.has_focus {
                palette.focused_border
            } else {
                palette.border
            });

        let inner_area = block.inner(area);
        block.render(area, buf);

        if self.state.content.is_empty() {
            let placeholder_line = Line::from(Span::styled(&self.placeholder, palette.muted));
            buf.set_line(inner_area.x, inner_area.y, &placeholder_line, inner_area.width);
        } else {
            let mut content = self.state.content.clone();
            let cursor = self.state.cursor_position.min(content.len());
            if self.has_focus {
                content.insert(cursor, '▌');
            }

            // Keep the cursor's line visible when the text is taller than the box.
            let cursor_line = content[..cursor].matches('\n').count();
            let skip = (cursor_line + 1).saturating_sub(inner_area.height as usize);
            let lines: Vec<&str> = content.split('\n').collect();
            for (i, line_text) in lines.iter().skip(skip).enumerate() {
                let line = Line::from(Span::raw(*line_text));
                buf.set_line(inner_area.x, inner_area.y + i as u16, &line, inner_area.width);
            }
        }

        if self.show_command_palette && !self.filtered_commands.is_empty() {
            let palette_height = (self.filtered_commands.len().min(8) + 2) as u16;
            let palette_area = Rect {
                x: area.x,
                y: area.y.saturating_sub(palette_height),
                width: area.width,
                height: palette_height.min(area.y),
            };
            if palette_area.height < 3 {
                return;
            }

            Clear.render(palette_area, buf);
            let block = Block::default()
                .borders(Borders::ALL)
                .title("Commands")
                .style(palette.accent);
            let inner = block.inner(palette_area);
            block.render(palette_area, buf);

            let skip = self
                .selected_command
                .unwrap_or(0)
                .saturating_sub(inner.height.saturating_sub(1) as usize);
            for (row, (index, entry)) in self
                .filtered_commands
                .iter()
                .enumerate()
                .skip(skip)
                .take(inner.height as usize)
                .enumerate()
            {
                let style = if self.selected_command == Some(index) {
                    palette.highlight
                } else {
                    Style::default()
                };

                let line = Line::from(vec![
                    Span::styled(format!("/{}", entry.keyword), style),
                    Span::styled(" - ", palette.muted),
                    Span::styled(entry.description, palette.muted),
                ]);

                buf.set_line(inner.x, inner.y + row as u16, &line, inner.width);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Theme;
    use crate::ui::conversation::commands::SlashCommand;

    fn composer() -> ConversationComposer {
        ConversationComposer::new("Type a message...", Palette::for_theme(Theme::Dark))
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(composer: &mut ConversationComposer, text: &str) {
        for c in text.chars() {
            composer.handle_key(press(KeyCode::Char(c)));
        }
    }

    #[test]
    fn test_enter_submits_and_clears() {
        let mut composer = composer();
        type_text(&mut composer, "hello");
        assert_eq!(
            composer.handle_key(press(KeyCode::Enter)),
            ConversationResult::Submitted("hello".to_string())
        );
        assert_eq!(composer.content(), "");
    }

    #[test]
    fn test_shift_enter_inserts_newline() {
        let mut composer = composer();
        type_text(&mut composer, "a");
        composer.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::SHIFT));
        type_text(&mut composer, "b");
        assert_eq!(composer.content(), "a\nb");
    }

    #[test]
    fn test_blank_input_is_not_submitted() {
        let mut composer = composer();
        type_text(&mut composer, "   ");
        assert_eq!(composer.handle_key(press(KeyCode::Enter)), ConversationResult::None);
    }

    #[test]
    fn test_attachment_allows_empty_text() {
        let mut composer = composer();
        composer.set_context("m", Some("cat.png".to_string()));
        assert_eq!(
            composer.handle_key(press(KeyCode::Enter)),
            ConversationResult::Submitted(String::new())
        );
    }

    #[test]
    fn test_full_command_submits_directly() {
        let mut composer = composer();
        type_text(&mut composer, "/new");
        assert!(composer.is_palette_open());
        match composer.handle_key(press(KeyCode::Enter)) {
            ConversationResult::Command(parsed) => assert_eq!(parsed.command, SlashCommand::New),
            other => panic!("expected command, got {:?}", other),
        }
    }

    #[test]
    fn test_partial_command_completes_from_palette() {
        let mut composer = composer();
        type_text(&mut composer, "/he");
        assert_eq!(composer.handle_key(press(KeyCode::Tab)), ConversationResult::None);
        assert_eq!(composer.content(), "/help ");
        assert!(!composer.is_palette_open());
    }

    #[test]
    fn test_multibyte_editing() {
        let mut composer = composer();
        type_text(&mut composer, "héé");
        composer.handle_key(press(KeyCode::Left));
        composer.handle_key(press(KeyCode::Backspace));
        assert_eq!(composer.content(), "hé");
        composer.handle_key(press(KeyCode::Home));
        composer.handle_key(press(KeyCode::Delete));
        assert_eq!(composer.content(), "é");
    }

    fn rendered_rows(composer: &ConversationComposer, area: Rect) -> Vec<String> {
        let mut buf = Buffer::empty(area);
        composer.render(area, &mut buf);
        (area.y + 1..area.bottom() - 1)
            .map(|y| {
                (area.x + 1..area.right() - 1)
                    .map(|x| buf.get(x, y).symbol().to_string())
                    .collect::<String>()
                    .trim_end()
                    .to_string()
            })
            .collect()
    }

    #[test]
    fn test_tall_text_scrolls_to_cursor_line() {
        let mut composer = composer();
        composer.set_focus(true);
        for (i, line) in ["one", "two", "three", "four"].iter().enumerate() {
            if i > 0 {
                composer.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::SHIFT));
            }
            type_text(&mut composer, line);
        }
        let area = Rect::new(0, 10, 20, 4);

        assert_eq!(rendered_rows(&composer, area), vec!["three", "four▌"]);

        composer.handle_key(press(KeyCode::Home));
        assert_eq!(rendered_rows(&composer, area), vec!["▌one", "two"]);
    }
}
