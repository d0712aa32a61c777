/// System prompt used when the config does not set one.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a helpful, friendly assistant.

- Answer clearly and concisely; use Markdown when it helps readability.
- Put code in fenced code blocks with a language tag.
- When an image is attached, describe what you see before answering questions about it.
- If you are unsure, say so instead of guessing."#;

/// Preview shown for a conversation without user text.
pub const NEW_CONVERSATION_PREVIEW: &str = "New conversation";

/// One-time notice shown when an image forces a vision model.
pub fn vision_switch_notice(model: &str) -> String {
    format!("Switched to {} (vision) for image support.", model)
}

/// Inline error text for a failed turn.
pub fn turn_failed_message(error: &str, hint: Option<&str>) -> String {
    match hint {
        Some(hint) => format!("{}\n{}", error, hint),
        None => format!("Error: {}", error),
    }
}

pub const WELCOME_LINES: [&str; 3] = [
    "Welcome to chatline! 🤖",
    "Type a message below. Attach an image with /attach <path>.",
    "Press Enter to send, Shift+Enter for new line, /help for commands.",
];
