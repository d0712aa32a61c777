use crate::attachment::ImageAttachment;
use crate::config::Config;
use crate::error::ChatError;
use crate::llm::{ChatRequest, CompletionBackend, LlmEvent};
use crate::message::Message;
use crate::models::{DEFAULT_VISION_MODEL, resolve_model};
use crate::prompts::{DEFAULT_SYSTEM_PROMPT, vision_switch_notice};
use crate::session::{ConversationStore, Preferences};
use crate::streaming::{StreamController, StreamUpdate};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

/// Where the request cycle currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    /// Waiting for user input
    Idle,
    /// Request sent, no fragment yet
    Submitted,
    /// At least one fragment received
    Streaming,
}

/// Why a submission was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRejected {
    /// A reply is still streaming
    Busy,
    /// No text and no image
    Empty,
}

impl std::fmt::Display for TurnRejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TurnRejected::Busy => f.write_str("Please wait for the current reply to finish."),
            TurnRejected::Empty => f.write_str("Nothing to send."),
        }
    }
}

/// Accepted submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub conversation_id: String,
    /// Model the request was sent to
    pub model: String,
    /// Set when an image forced a switch to a vision model
    pub notice: Option<String>,
}

/// Progress of the in-flight turn
#[derive(Debug)]
pub enum TurnEvent {
    /// Display buffer grew
    Fragment { display: String },
    /// Reply committed as an assistant message
    Committed { text: String },
    /// Reply aborted; nothing was committed
    Failed { partial: String, error: ChatError },
}

struct ActiveTurn {
    conversation_id: String,
    receiver: mpsc::Receiver<LlmEvent>,
}

/// Owns the conversations and drives one request cycle at a time:
/// `Idle -> Submitted -> Streaming -> Committed | Failed -> Idle`
pub struct ChatController<B: CompletionBackend> {
    backend: B,
    store: ConversationStore,
    preferences: Preferences,
    system_prompt: String,
    vision_model: String,
    temperature: f32,
    max_tokens: u32,
    stream: StreamController,
    phase: TurnPhase,
    active: Option<ActiveTurn>,
}

impl<B: CompletionBackend> ChatController<B> {
    /// Controller with default preferences and prompt
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            store: ConversationStore::new(),
            preferences: Preferences::default(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 1024,
            stream: StreamController::new(),
            phase: TurnPhase::Idle,
            active: None,
        }
    }

    /// Controller seeded from the config file
    pub fn from_config(backend: B, config: &Config) -> Self {
        let mut controller = Self::new(backend);
        controller.preferences = Preferences::from_config(config);
        controller.system_prompt = config.system_prompt.clone();
        controller.vision_model = config.vision_model.clone();
        controller.temperature = config.temperature;
        controller.max_tokens = config.max_tokens;
        controller
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Submit a user turn and open the completion stream
    pub fn submit(
        &mut self,
        text: impl Into<String>,
        image: Option<ImageAttachment>,
    ) -> Result<Submission, TurnRejected> {
        if self.phase != TurnPhase::Idle {
            return Err(TurnRejected::Busy);
        }
        let text = text.into();
        if text.trim().is_empty() && image.is_none() {
            return Err(TurnRejected::Empty);
        }

        let choice = resolve_model(&self.preferences.model, image.is_some(), &self.vision_model);
        let notice = if choice.substituted {
            tracing::info!(
                "Image attached; switching model {} -> {}",
                self.preferences.model,
                choice.model
            );
            self.preferences.model = choice.model.clone();
            Some(vision_switch_notice(&choice.model))
        } else {
            None
        };

        let conversation_id = self.store.current_id().to_string();
        self.store
            .append_message(&conversation_id, Message::user(text, image));

        let history = self.store.current().messages().to_vec();
        let request = ChatRequest::new(choice.model.clone(), history)
            .with_system_prompt(self.system_prompt.clone())
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        let receiver = self.backend.stream(request);
        self.stream.start_streaming();
        self.phase = TurnPhase::Submitted;
        self.active = Some(ActiveTurn {
            conversation_id: conversation_id.clone(),
            receiver,
        });

        Ok(Submission {
            conversation_id,
            model: choice.model,
            notice,
        })
    }

    /// Wait for the next event of the in-flight turn; `None` when idle
    pub async fn next_event(&mut self) -> Option<TurnEvent> {
        loop {
            let active = self.active.as_mut()?;
            let event = active.receiver.recv().await;
            match event {
                Some(event) => {
                    if let Some(turn_event) = self.apply(event) {
                        return Some(turn_event);
                    }
                }
                None => return Some(self.finish_on_close()),
            }
        }
    }

    /// Drain every event that is ready without waiting
    pub fn poll_events(&mut self) -> Vec<TurnEvent> {
        let mut events = Vec::new();
        while let Some(active) = self.active.as_mut() {
            match active.receiver.try_recv() {
                Ok(event) => events.extend(self.apply(event)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => events.push(self.finish_on_close()),
            }
        }
        events
    }

    /// Run the in-flight turn to its end, returning the final event
    pub async fn finish_turn(&mut self) -> Option<TurnEvent> {
        let mut last = None;
        while let Some(event) = self.next_event().await {
            let terminal = !matches!(event, TurnEvent::Fragment { .. });
            last = Some(event);
            if terminal {
                break;
            }
        }
        last
    }

    fn apply(&mut self, event: LlmEvent) -> Option<TurnEvent> {
        let update = self.stream.process_event(&event)?;
        match (update, event) {
            (StreamUpdate::Fragment { display }, _) => {
                self.phase = TurnPhase::Streaming;
                Some(TurnEvent::Fragment { display })
            }
            (StreamUpdate::Completed { text }, _) => Some(self.commit(text)),
            (StreamUpdate::Failed { partial }, LlmEvent::Error(error)) => {
                Some(self.fail(partial, error))
            }
            (StreamUpdate::Failed { partial }, _) => Some(self.fail(
                partial,
                ChatError::StreamFormat("stream failed".to_string()),
            )),
        }
    }

    /// Sender dropped without a terminal event: the stream is exhausted
    fn finish_on_close(&mut self) -> TurnEvent {
        match self.stream.complete() {
            StreamUpdate::Completed { text } => self.commit(text),
            _ => {
                let partial = self.stream.display().to_string();
                self.fail(partial, ChatError::StreamFormat("stream closed".to_string()))
            }
        }
    }

    fn commit(&mut self, text: String) -> TurnEvent {
        if let Some(active) = self.active.take() {
            self.store
                .append_message(&active.conversation_id, Message::assistant(text.clone()));
            tracing::debug!("Committed reply to {}", active.conversation_id);
        }
        self.phase = TurnPhase::Idle;
        TurnEvent::Committed { text }
    }

    fn fail(&mut self, partial: String, error: ChatError) -> TurnEvent {
        // The user message stays; no assistant message is recorded.
        self.active = None;
        self.phase = TurnPhase::Idle;
        tracing::warn!("Turn failed: {}", error);
        TurnEvent::Failed { partial, error }
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn is_busy(&self) -> bool {
        self.phase != TurnPhase::Idle
    }

    /// Text received so far in the in-flight turn
    pub fn streaming_display(&self) -> Option<String> {
        if self.is_busy() {
            Some(self.stream.display_with_cursor())
        } else {
            None
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Mutable store access; refused while a turn is in flight
    pub fn store_mut(&mut self) -> Option<&mut ConversationStore> {
        if self.is_busy() {
            None
        } else {
            Some(&mut self.store)
        }
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn preferences_mut(&mut self) -> &mut Preferences {
        &mut self.preferences
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}
