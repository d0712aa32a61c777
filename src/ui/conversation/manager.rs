use crate::agent::{ChatController, TurnEvent};
use crate::attachment::ImageAttachment;
use crate::llm::CompletionBackend;
use crate::models::{catalog_listing, lookup};
use crate::prompts::turn_failed_message;
use crate::session::Theme;
use crate::ui::conversation::composer::ConversationResult;
use crate::ui::conversation::{
    ConversationComposer, ConversationHistory, ConversationSidebar, HistoryView, NoticeKind,
    ParsedCommand, SlashCommand, StreamingIndicator, get_help_text,
};
use crate::ui::theme::Palette;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout},
};
use std::path::PathBuf;

const SCROLL_PAGE: usize = 10;

/// Actions that can be requested by the conversation manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationAction {
    None,
    Exit,
}

/// Manages the conversation flow and UI components
pub struct ConversationManager<B: CompletionBackend> {
    controller: ChatController<B>,
    history: ConversationHistory,
    composer: ConversationComposer,
    attachment: Option<ImageAttachment>,
    palette: Palette,
    frame: usize,
}

impl<B: CompletionBackend> ConversationManager<B> {
    pub fn new(controller: ChatController<B>) -> Self {
        let palette = Palette::for_theme(controller.preferences().theme);
        let mut composer =
            ConversationComposer::new("Ask anything... (/help for commands)", palette);
        composer.set_focus(true);

        let mut manager = Self {
            controller,
            history: ConversationHistory::new(),
            composer,
            attachment: None,
            palette,
            frame: 0,
        };
        manager.refresh_composer();
        manager
    }

    pub fn controller(&self) -> &ChatController<B> {
        &self.controller
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn attachment(&self) -> Option<&ImageAttachment> {
        self.attachment.as_ref()
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ConversationAction {
        if key.kind != KeyEventKind::Press {
            return ConversationAction::None;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') => return ConversationAction::Exit,
                KeyCode::Char('n') => {
                    return self.handle_slash_command(ParsedCommand {
                        command: SlashCommand::New,
                        argument: None,
                    });
                }
                _ => {}
            }
        }

        match key.code {
            KeyCode::PageUp => {
                self.history.scroll_up(SCROLL_PAGE);
                return ConversationAction::None;
            }
            KeyCode::PageDown => {
                self.history.scroll_down(SCROLL_PAGE);
                return ConversationAction::None;
            }
            _ => {}
        }

        match self.composer.handle_key(key) {
            ConversationResult::Submitted(input) => {
                self.handle_input(input);
                ConversationAction::None
            }
            ConversationResult::Command(command) => self.handle_slash_command(command),
            ConversationResult::None => ConversationAction::None,
        }
    }

    /// Submit user input and start streaming the reply
    pub fn handle_input(&mut self, input: String) {
        let image = self.attachment.clone();
        match self.controller.submit(input, image) {
            Ok(submission) => {
                self.attachment = None;
                self.history.scroll_to_bottom();
                if let Some(notice) = submission.notice {
                    self.notice(NoticeKind::Info, notice);
                }
                self.refresh_composer();
            }
            Err(rejected) => self.notice(NoticeKind::Info, rejected.to_string()),
        }
    }

    /// Apply every stream event that has arrived; returns whether anything changed
    pub fn process_streaming_chunks(&mut self) -> bool {
        let events = self.controller.poll_events();
        let changed = !events.is_empty();
        for event in events {
            self.apply_turn_event(event);
        }
        changed
    }

    fn apply_turn_event(&mut self, event: TurnEvent) {
        match event {
            TurnEvent::Fragment { .. } => {}
            TurnEvent::Committed { .. } => self.history.scroll_to_bottom(),
            TurnEvent::Failed { partial, error } => {
                if !partial.is_empty() {
                    self.notice(NoticeKind::Partial, partial);
                }
                let text = turn_failed_message(&error.to_string(), error.hint());
                self.notice(NoticeKind::Error, text);
            }
        }
    }

    /// Advance animations
    pub fn on_tick(&mut self) {
        self.frame = self.frame.wrapping_add(1);
    }

    fn notice(&mut self, kind: NoticeKind, text: impl Into<String>) {
        let after = self.controller.store().current().len();
        self.history.push_notice(kind, text, after);
    }

    fn refresh_composer(&mut self) {
        let label = self
            .attachment
            .as_ref()
            .map(|image| format!("{} ({})", image.name, image.size_label()));
        let model = self.controller.preferences().model.clone();
        self.composer.set_context(&model, label);
    }

    /// Handle slash commands
    pub fn handle_slash_command(&mut self, command: ParsedCommand) -> ConversationAction {
        if self.controller.is_busy() && !command.command.available_during_streaming() {
            self.notice(
                NoticeKind::Info,
                format!(
                    "/{} is unavailable while a reply is streaming.",
                    command.command.command()
                ),
            );
            return ConversationAction::None;
        }

        match command.command {
            SlashCommand::New => {
                if let Some(store) = self.controller.store_mut() {
                    store.create_conversation();
                }
                self.history.clear_notices();
            }
            SlashCommand::Delete => self.delete_conversation(&command),
            SlashCommand::Switch => self.switch_conversation(&command),
            SlashCommand::Clear => {
                if let Some(store) = self.controller.store_mut() {
                    store.reset_current();
                }
                self.history.clear_notices();
            }
            SlashCommand::Model => match command.argument().and_then(lookup) {
                Some(model) => {
                    tracing::info!("Model switched to {}", model);
                    self.controller.preferences_mut().model = model.clone();
                    self.refresh_composer();
                    self.notice(NoticeKind::Info, format!("Model set to {}.", model));
                }
                None => self.show_models(),
            },
            SlashCommand::Models => self.show_models(),
            SlashCommand::Attach => self.attach(command.argument()),
            SlashCommand::Detach => {
                if self.attachment.take().is_some() {
                    self.notice(NoticeKind::Info, "Attachment removed.");
                }
                self.refresh_composer();
            }
            SlashCommand::Theme => {
                let current = self.controller.preferences().theme;
                let theme = match command.argument() {
                    Some(arg) => match Theme::parse(arg) {
                        Some(theme) => theme,
                        None => {
                            self.notice(NoticeKind::Error, format!("Unknown theme `{}`.", arg));
                            return ConversationAction::None;
                        }
                    },
                    None => current.toggled(),
                };
                self.controller.preferences_mut().theme = theme;
                self.palette = Palette::for_theme(theme);
                self.composer.set_palette(self.palette);
            }
            SlashCommand::Wrap => {
                let prefs = self.controller.preferences_mut();
                prefs.code_wrap = !prefs.code_wrap;
                let state = if prefs.code_wrap { "on" } else { "off" };
                self.notice(NoticeKind::Info, format!("Code wrapping {}.", state));
            }
            SlashCommand::Preview => {
                let prefs = self.controller.preferences_mut();
                prefs.show_previews = !prefs.show_previews;
            }
            SlashCommand::Help => self.notice(NoticeKind::Info, get_help_text()),
            SlashCommand::Bye => return ConversationAction::Exit,
        }

        ConversationAction::None
    }

    /// Id of the conversation at a 1-based sidebar position
    fn conversation_at(&mut self, command: &ParsedCommand) -> Option<String> {
        let rows = self.controller.store().list_conversations();
        match command.list_index().and_then(|index| rows.get(index)) {
            Some(row) => Some(row.id.clone()),
            None => {
                self.notice(
                    NoticeKind::Error,
                    format!("No conversation numbered `{}`.", command.argument().unwrap_or("")),
                );
                None
            }
        }
    }

    fn delete_conversation(&mut self, command: &ParsedCommand) {
        let target = if command.argument().is_some() {
            self.conversation_at(command)
        } else {
            Some(self.controller.store().current_id().to_string())
        };
        let Some(id) = target else {
            return;
        };

        let was_current = id == self.controller.store().current_id();
        if let Some(store) = self.controller.store_mut() {
            store.delete_conversation(&id);
        }
        if was_current {
            self.history.clear_notices();
        }
    }

    fn switch_conversation(&mut self, command: &ParsedCommand) {
        let Some(id) = self.conversation_at(command) else {
            return;
        };
        if let Some(store) = self.controller.store_mut() {
            store.select(&id);
        }
        self.history.clear_notices();
    }

    fn show_models(&mut self) {
        let listing = catalog_listing(&self.controller.preferences().model);
        self.notice(
            NoticeKind::Info,
            format!("{}\n\nUse /model <n|id> to switch.", listing),
        );
    }

    fn attach(&mut self, argument: Option<&str>) {
        let Some(raw) = argument else {
            self.notice(NoticeKind::Error, "Usage: /attach <path to png or jpeg>");
            return;
        };

        match ImageAttachment::from_path(&expand_home(raw)) {
            Ok(image) => {
                self.notice(
                    NoticeKind::Info,
                    format!("Attached {} ({}).", image.name, image.size_label()),
                );
                self.attachment = Some(image);
                self.refresh_composer();
            }
            Err(err) => self.notice(NoticeKind::Error, err.to_string()),
        }
    }

    /// Draw the whole screen once
    pub fn render(&self, frame: &mut Frame) {
        let prefs = self.controller.preferences();
        let mut area = frame.size();

        if prefs.show_previews && area.width >= 60 {
            let columns = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Length(34), Constraint::Min(20)])
                .split(area);
            let rows = self.controller.store().list_conversations();
            frame.render_widget(
                ConversationSidebar {
                    conversations: &rows,
                    palette: &self.palette,
                },
                columns[0],
            );
            area = columns[1];
        }

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(5),
                Constraint::Length(1),
                Constraint::Length(self.composer.desired_height()),
            ])
            .split(area);

        let streaming = self.controller.streaming_display();
        frame.render_widget(
            HistoryView {
                history: &self.history,
                messages: self.controller.store().current().messages(),
                streaming: streaming.as_deref(),
                palette: &self.palette,
                code_wrap: prefs.code_wrap,
            },
            chunks[0],
        );
        frame.render_widget(
            StreamingIndicator {
                phase: self.controller.phase(),
                model: &prefs.model,
                frame: self.frame,
                palette: &self.palette,
            },
            chunks[1],
        );
        frame.render_widget(&self.composer, chunks[2]);
    }
}

/// Expand a leading `~/` to the home directory
fn expand_home(raw: &str) -> PathBuf {
    match (raw.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::TurnPhase;
    use crate::error::ChatError;
    use crate::llm::{ChatRequest, LlmEvent};
    use crate::message::Role;
    use std::io::Write;
    use tokio::sync::mpsc;

    /// Answers every request with the same fragments
    struct EchoBackend {
        reply: Vec<&'static str>,
        finish: bool,
    }

    impl CompletionBackend for EchoBackend {
        fn stream(&self, _request: ChatRequest) -> mpsc::Receiver<LlmEvent> {
            let (tx, rx) = mpsc::channel(16);
            for fragment in &self.reply {
                tx.try_send(LlmEvent::TextDelta(fragment.to_string())).unwrap();
            }
            if self.finish {
                tx.try_send(LlmEvent::StreamComplete).unwrap();
            } else {
                // Keep the turn open by leaking the sender for the test's lifetime.
                std::mem::forget(tx);
            }
            rx
        }
    }

    /// Streams a few fragments, then fails
    struct FailingBackend;

    impl CompletionBackend for FailingBackend {
        fn stream(&self, _request: ChatRequest) -> mpsc::Receiver<LlmEvent> {
            let (tx, rx) = mpsc::channel(4);
            tx.try_send(LlmEvent::TextDelta("Half an ".to_string())).unwrap();
            tx.try_send(LlmEvent::TextDelta("answer".to_string())).unwrap();
            tx.try_send(LlmEvent::Error(ChatError::Api {
                status: 503,
                message: "down".to_string(),
            }))
            .unwrap();
            rx
        }
    }

    fn manager(finish: bool) -> ConversationManager<EchoBackend> {
        let backend = EchoBackend {
            reply: vec!["Hi", " there!"],
            finish,
        };
        ConversationManager::new(ChatController::new(backend))
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_line(manager: &mut ConversationManager<EchoBackend>, text: &str) -> ConversationAction {
        for c in text.chars() {
            manager.handle_key(press(KeyCode::Char(c)));
        }
        manager.handle_key(press(KeyCode::Enter))
    }

    #[test]
    fn test_message_round_trip_through_ui() {
        let mut manager = manager(true);
        type_line(&mut manager, "hello");
        assert!(manager.process_streaming_chunks());

        let messages = manager.controller().store().current().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].text(), "Hi there!");
        assert!(manager.history().notices().is_empty());
    }

    #[test]
    fn test_failed_turn_keeps_partial_reply_visible() {
        let mut manager = ConversationManager::new(ChatController::new(FailingBackend));
        manager.handle_input("hi".to_string());
        assert!(manager.process_streaming_chunks());

        assert_eq!(manager.controller().phase(), TurnPhase::Idle);
        assert!(manager.controller().streaming_display().is_none());
        assert_eq!(manager.controller().store().current().len(), 1);

        let notices: Vec<_> = manager
            .history()
            .notices()
            .iter()
            .map(|n| (n.kind, n.text.as_str()))
            .collect();
        assert_eq!(
            notices,
            vec![
                (NoticeKind::Partial, "Half an answer"),
                (NoticeKind::Error, "Error: down (HTTP 503)"),
            ]
        );
    }

    #[test]
    fn test_conversation_commands_refused_while_streaming() {
        let mut manager = manager(false);
        type_line(&mut manager, "hello");
        manager.process_streaming_chunks();
        assert_eq!(manager.controller().phase(), TurnPhase::Streaming);

        type_line(&mut manager, "/new");
        assert_eq!(manager.controller().store().len(), 1);
        assert!(manager
            .history()
            .notices()
            .iter()
            .any(|n| n.text.contains("unavailable")));
    }

    #[test]
    fn test_new_switch_and_delete() {
        let mut manager = manager(true);
        let first = manager.controller().store().current_id().to_string();
        manager.handle_key(KeyEvent::new(KeyCode::Char('n'), KeyModifiers::CONTROL));
        assert_eq!(manager.controller().store().len(), 2);

        // Newest first: the original conversation is row 2.
        type_line(&mut manager, "/switch 2");
        assert_eq!(manager.controller().store().current_id(), first);

        type_line(&mut manager, "/delete");
        assert_eq!(manager.controller().store().len(), 2);
        assert!(manager.controller().store().get(&first).is_none());

        type_line(&mut manager, "/switch 9");
        assert_eq!(manager.history().notices().len(), 1);
    }

    #[test]
    fn test_model_theme_and_toggles() {
        let mut manager = manager(true);
        type_line(&mut manager, "/model 2");
        assert_eq!(manager.controller().preferences().model, "llama-3.1-8b-instant");

        type_line(&mut manager, "/theme");
        assert_eq!(manager.controller().preferences().theme, Theme::Light);
        type_line(&mut manager, "/theme dark");
        assert_eq!(manager.controller().preferences().theme, Theme::Dark);

        type_line(&mut manager, "/wrap");
        assert!(!manager.controller().preferences().code_wrap);
        type_line(&mut manager, "/preview");
        assert!(!manager.controller().preferences().show_previews);
    }

    #[test]
    fn test_attach_then_send_clears_attachment() {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(b"\x89PNG\r\n\x1a\n").unwrap();

        let mut manager = manager(true);
        let path = file.path().display().to_string();
        type_line(&mut manager, &format!("/attach {}", path));
        assert!(manager.attachment().is_some());

        type_line(&mut manager, "what is this?");
        assert!(manager.attachment().is_none());
        let user = &manager.controller().store().current().messages()[0];
        assert!(user.has_image());
        // Substitution notice is shown inline.
        assert!(manager
            .history()
            .notices()
            .iter()
            .any(|n| n.text.contains("vision")));
    }

    #[test]
    fn test_bye_and_ctrl_c_exit() {
        let mut manager = manager(true);
        assert_eq!(type_line(&mut manager, "/q"), ConversationAction::Exit);
        assert_eq!(
            manager.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            ConversationAction::Exit
        );
    }
}
