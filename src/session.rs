use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

use crate::config::Config;
use crate::message::{ContentPart, Message, Role};
use crate::models::DEFAULT_TEXT_MODEL;
use crate::prompts::NEW_CONVERSATION_PREVIEW;

/// Maximum number of characters in a conversation preview
pub const PREVIEW_LIMIT: usize = 40;

/// Marker appended to truncated previews
pub const ELLIPSIS: &str = "...";

/// One ordered thread of messages, identified by its creation timestamp
#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: String,
    pub created_at: DateTime<Utc>,
    messages: Vec<Message>,
}

impl Conversation {
    fn new(id: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at,
            messages: Vec::new(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Preview derived from the most recent non-empty user text
    pub fn preview(&self) -> String {
        self.messages
            .iter()
            .rev()
            .filter(|message| message.role == Role::User)
            .flat_map(|message| message.parts().iter().rev())
            .find_map(|part| match part {
                ContentPart::Text(text) if !text.trim().is_empty() => Some(text.as_str()),
                _ => None,
            })
            .map(truncate_preview)
            .unwrap_or_else(|| NEW_CONVERSATION_PREVIEW.to_string())
    }
}

/// Cut text to [`PREVIEW_LIMIT`] characters, marking the cut with [`ELLIPSIS`]
pub fn truncate_preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_LIMIT {
        text.to_string()
    } else {
        let head: String = text.chars().take(PREVIEW_LIMIT).collect();
        format!("{}{}", head, ELLIPSIS)
    }
}

/// Row returned by [`ConversationStore::list_conversations`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    pub id: String,
    pub preview: String,
    pub message_count: usize,
    pub is_current: bool,
}

/// In-memory conversation store. Exactly one conversation is current at all times.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    conversations: BTreeMap<String, Conversation>,
    current: String,
    last_issued: Option<DateTime<Utc>>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    /// Create a store holding one empty, current conversation
    pub fn new() -> Self {
        let mut store = Self {
            conversations: BTreeMap::new(),
            current: String::new(),
            last_issued: None,
        };
        store.create_conversation();
        store
    }

    /// Start a new conversation and make it current
    pub fn create_conversation(&mut self) -> String {
        let now = self.next_timestamp();
        let id = now.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string();

        self.conversations
            .insert(id.clone(), Conversation::new(id.clone(), now));
        self.current = id.clone();
        tracing::debug!("Created conversation {}", id);
        id
    }

    /// Timestamps strictly increase so ids never collide and sort by age
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_issued {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_issued = Some(now);
        now
    }

    /// Append to a conversation; unknown ids are ignored
    pub fn append_message(&mut self, id: &str, message: Message) -> bool {
        match self.conversations.get_mut(id) {
            Some(conversation) => {
                conversation.messages.push(message);
                true
            }
            None => {
                tracing::warn!("Dropping message for unknown conversation {}", id);
                false
            }
        }
    }

    /// All conversations, newest first
    pub fn list_conversations(&self) -> Vec<ConversationSummary> {
        self.conversations
            .values()
            .rev()
            .map(|conversation| ConversationSummary {
                id: conversation.id.clone(),
                preview: conversation.preview(),
                message_count: conversation.len(),
                is_current: conversation.id == self.current,
            })
            .collect()
    }

    /// Remove a conversation. Deleting the current one starts a fresh conversation.
    pub fn delete_conversation(&mut self, id: &str) -> bool {
        if self.conversations.remove(id).is_none() {
            return false;
        }
        if self.current == id {
            self.create_conversation();
        }
        true
    }

    /// Make an existing conversation current
    pub fn select(&mut self, id: &str) -> bool {
        if self.conversations.contains_key(id) {
            self.current = id.to_string();
            true
        } else {
            false
        }
    }

    /// Replace the current conversation with an empty one
    pub fn reset_current(&mut self) -> String {
        let current = self.current.clone();
        self.conversations.remove(&current);
        self.create_conversation()
    }

    pub fn current_id(&self) -> &str {
        &self.current
    }

    pub fn current(&self) -> &Conversation {
        // The current id always names a stored conversation.
        &self.conversations[&self.current]
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.get(id)
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}

/// Terminal colour scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Dark,
    Light,
}

impl Theme {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "dark" => Some(Theme::Dark),
            "light" => Some(Theme::Light),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }
}

/// Session-scoped UI preferences; never persisted
#[derive(Debug, Clone, PartialEq)]
pub struct Preferences {
    pub theme: Theme,
    pub code_wrap: bool,
    pub show_previews: bool,
    pub model: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: Theme::Dark,
            code_wrap: true,
            show_previews: true,
            model: DEFAULT_TEXT_MODEL.to_string(),
        }
    }
}

impl Preferences {
    /// Seed preferences from the config, ignoring invalid theme names
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        Self {
            theme: Theme::parse(&config.ui.theme).unwrap_or(defaults.theme),
            code_wrap: config.ui.code_wrap,
            show_previews: config.ui.show_previews,
            model: config.default_model.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn current_count(store: &ConversationStore) -> usize {
        store
            .list_conversations()
            .iter()
            .filter(|summary| summary.is_current)
            .count()
    }

    #[test]
    fn test_new_store_has_one_current_conversation() {
        let store = ConversationStore::new();
        assert_eq!(store.len(), 1);
        assert_eq!(current_count(&store), 1);
        assert!(store.current().is_empty());
    }

    #[test]
    fn test_create_always_leaves_exactly_one_current() {
        let mut store = ConversationStore::new();
        let mut ids = vec![store.current_id().to_string()];
        for _ in 0..50 {
            let id = store.create_conversation();
            assert_eq!(store.current_id(), id);
            assert_eq!(current_count(&store), 1);
            ids.push(id);
        }

        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted, ids, "ids must be unique and increasing");
    }

    #[test]
    fn test_append_updates_only_target_preview() {
        let mut store = ConversationStore::new();
        let first = store.current_id().to_string();
        let second = store.create_conversation();

        assert!(store.append_message(&first, Message::user("hello there", None)));

        let rows = store.list_conversations();
        let preview_of = |id: &str| {
            rows.iter()
                .find(|row| row.id == id)
                .map(|row| row.preview.clone())
                .unwrap()
        };
        assert_eq!(preview_of(&first), "hello there");
        assert_eq!(preview_of(&second), NEW_CONVERSATION_PREVIEW);
        assert_eq!(store.get(&second).unwrap().len(), 0);
    }

    #[test]
    fn test_append_to_unknown_id_is_noop() {
        let mut store = ConversationStore::new();
        assert!(!store.append_message("nope", Message::user("x", None)));
        assert!(store.current().is_empty());
    }

    #[test]
    fn test_preview_uses_latest_user_text() {
        let mut store = ConversationStore::new();
        let id = store.current_id().to_string();
        store.append_message(&id, Message::user("first question", None));
        store.append_message(&id, Message::assistant("an answer"));
        store.append_message(&id, Message::user("second question", None));
        store.append_message(&id, Message::assistant("another answer"));

        assert_eq!(store.current().preview(), "second question");
    }

    #[test]
    fn test_assistant_only_or_empty_text_gives_placeholder() {
        let mut store = ConversationStore::new();
        let id = store.current_id().to_string();
        store.append_message(&id, Message::assistant("hi"));
        store.append_message(&id, Message::user("", None));
        assert_eq!(store.current().preview(), NEW_CONVERSATION_PREVIEW);
    }

    #[test]
    fn test_preview_truncation_boundary() {
        let exact = "a".repeat(PREVIEW_LIMIT);
        assert_eq!(truncate_preview(&exact), exact);
        assert_eq!(truncate_preview(" short "), " short ");

        let long = "é".repeat(PREVIEW_LIMIT + 5);
        let preview = truncate_preview(&long);
        assert!(preview.ends_with(ELLIPSIS));
        assert_eq!(
            preview.trim_end_matches(ELLIPSIS).chars().count(),
            PREVIEW_LIMIT
        );
    }

    #[test]
    fn test_delete_current_creates_replacement() {
        let mut store = ConversationStore::new();
        let only = store.current_id().to_string();

        assert!(store.delete_conversation(&only));
        assert_eq!(store.len(), 1);
        assert_ne!(store.current_id(), only);
        assert_eq!(current_count(&store), 1);
    }

    #[test]
    fn test_delete_other_keeps_current() {
        let mut store = ConversationStore::new();
        let old = store.current_id().to_string();
        let newer = store.create_conversation();

        assert!(store.delete_conversation(&old));
        assert_eq!(store.current_id(), newer);
        assert_eq!(store.len(), 1);
        assert!(!store.delete_conversation(&old));
    }

    #[test]
    fn test_select_and_reset() {
        let mut store = ConversationStore::new();
        let first = store.current_id().to_string();
        store.append_message(&first, Message::user("keep me", None));
        let second = store.create_conversation();

        assert!(store.select(&first));
        assert_eq!(store.current_id(), first);
        assert!(!store.select("missing"));

        let fresh = store.reset_current();
        assert!(store.get(&first).is_none());
        assert_eq!(store.current_id(), fresh);
        assert!(store.get(&second).is_some());
        assert_eq!(current_count(&store), 1);
    }

    #[test]
    fn test_list_is_newest_first() {
        let mut store = ConversationStore::new();
        let first = store.current_id().to_string();
        let second = store.create_conversation();
        let ids: Vec<_> = store.list_conversations().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![second, first]);
    }

    #[test]
    fn test_preferences_from_config() {
        let mut config = Config::default();
        config.ui.theme = "LIGHT".to_string();
        config.ui.code_wrap = false;
        config.default_model = "llama-3.1-8b-instant".to_string();
        let prefs = Preferences::from_config(&config);
        assert_eq!(prefs.theme, Theme::Light);
        assert!(!prefs.code_wrap);
        assert_eq!(prefs.model, "llama-3.1-8b-instant");

        config.ui.theme = "solarized".to_string();
        assert_eq!(Preferences::from_config(&config).theme, Theme::Dark);
    }
}
