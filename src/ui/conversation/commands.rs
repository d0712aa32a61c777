use std::str::FromStr;

use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Commands that can be invoked by starting a message with a leading slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Start a new conversation
    New,
    /// Delete a conversation (current by default)
    Delete,
    /// Make another conversation current
    Switch,
    /// Empty the current conversation
    Clear,
    /// Switch to a different model
    Model,
    /// List available models
    Models,
    /// Stage an image for the next message
    Attach,
    /// Drop the staged image
    Detach,
    /// Toggle or set the colour theme
    Theme,
    /// Toggle wrapping of code blocks
    Wrap,
    /// Toggle the conversation sidebar
    Preview,
    /// Show help
    Help,
    /// Exit the application
    Bye,
}

pub fn command_entries() -> Vec<CommandEntry> {
    SlashCommand::iter()
        .map(|command| CommandEntry {
            command,
            keyword: command.command(),
            description: command.description(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: SlashCommand,
    pub argument: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEntry {
    pub command: SlashCommand,
    pub keyword: &'static str,
    pub description: &'static str,
}

impl ParsedCommand {
    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }

    /// 1-based position in the sidebar list, converted to an index
    pub fn list_index(&self) -> Option<usize> {
        self.argument()?
            .trim()
            .parse::<usize>()
            .ok()?
            .checked_sub(1)
    }
}

impl SlashCommand {
    /// User-visible description shown in help.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::New => "start a new conversation",
            SlashCommand::Delete => "delete conversation <n> (current if omitted)",
            SlashCommand::Switch => "switch to conversation <n>",
            SlashCommand::Clear => "clear the current conversation",
            SlashCommand::Model => "switch model by number or id",
            SlashCommand::Models => "list available models",
            SlashCommand::Attach => "attach a png or jpeg image to the next message",
            SlashCommand::Detach => "remove the attached image",
            SlashCommand::Theme => "toggle theme, or set dark|light",
            SlashCommand::Wrap => "toggle wrapping of code blocks",
            SlashCommand::Preview => "toggle the conversation sidebar",
            SlashCommand::Help => "show available commands",
            SlashCommand::Bye => "exit the application",
        }
    }

    /// Command string without the leading '/'.
    pub fn command(self) -> &'static str {
        self.into()
    }

    /// Whether this command can be run while streaming is active.
    pub fn available_during_streaming(self) -> bool {
        match self {
            SlashCommand::New
            | SlashCommand::Delete
            | SlashCommand::Switch
            | SlashCommand::Clear => false,
            SlashCommand::Model
            | SlashCommand::Models
            | SlashCommand::Attach
            | SlashCommand::Detach
            | SlashCommand::Theme
            | SlashCommand::Wrap
            | SlashCommand::Preview
            | SlashCommand::Help
            | SlashCommand::Bye => true,
        }
    }
}

/// Return all built-in commands in a Vec paired with their command string.
pub fn built_in_slash_commands() -> Vec<(&'static str, SlashCommand)> {
    SlashCommand::iter().map(|c| (c.command(), c)).collect()
}

/// Parse a slash command from user input
pub fn parse_slash_command(input: &str) -> Option<ParsedCommand> {
    let body = input.trim().strip_prefix('/')?;

    let mut parts = body.splitn(2, char::is_whitespace);
    let head = parts.next()?.to_lowercase();
    let rest = parts.next().map(str::trim).unwrap_or_default();

    let command = SlashCommand::from_str(&head)
        .ok()
        .or_else(|| match head.as_str() {
            "q" | "quit" | "exit" => Some(SlashCommand::Bye),
            _ => None,
        })?;

    // Paths may contain spaces, so the argument is kept as typed.
    let argument = if rest.is_empty() {
        None
    } else {
        Some(rest.to_string())
    };

    Some(ParsedCommand { command, argument })
}

/// Get help text for all available commands
pub fn get_help_text() -> String {
    let mut help = String::from("Available commands:\n\n");
    for (command_str, command) in built_in_slash_commands() {
        help.push_str(&format!("/{} - {}\n", command_str, command.description()));
    }

    help.push_str("\nAliases: /q, /quit and /exit for /bye.");
    help.push_str("\nKeys: Ctrl+N new conversation, PageUp/PageDown scroll, Ctrl+C quit.");

    help
}
