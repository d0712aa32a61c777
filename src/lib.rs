//! Terminal chat client for OpenAI-compatible chat-completion APIs.

pub mod agent;
pub mod attachment;
pub mod commands;
pub mod config;
pub mod error;
pub mod llm;
pub mod message;
pub mod models;
pub mod prompts;
pub mod session;
pub mod streaming;
pub mod tui;
pub mod ui;

pub use agent::{ChatController, Submission, TurnEvent, TurnPhase, TurnRejected};
pub use config::Config;
pub use error::ChatError;
pub use llm::{ChatRequest, CompletionBackend, LlmClient, LlmEvent};
pub use message::{ContentPart, Message, Role};
