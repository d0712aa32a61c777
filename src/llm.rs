use crate::config::Config;
use crate::error::ChatError;
use crate::message::{ContentPart, Message, Role};
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;

/// Events emitted during LLM streaming
#[derive(Debug)]
pub enum LlmEvent {
    /// Text delta from streaming response
    TextDelta(String),
    /// Stream completed
    StreamComplete,
    /// Error occurred; the stream is over
    Error(ChatError),
}

/// Request to send to LLM
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system_prompt: Option<String>,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            system_prompt: None,
            messages,
            temperature: 0.7,
            max_tokens: 1024,
        }
    }

    /// Blank prompts are dropped so no empty system message is sent
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        self.system_prompt = if prompt.trim().is_empty() {
            None
        } else {
            Some(prompt)
        };
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = temp;
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = tokens;
        self
    }

    /// OpenAI-compatible request body
    pub fn to_payload(&self) -> ChatPayload {
        let system = self
            .system_prompt
            .as_ref()
            .map(|prompt| WireMessage {
                role: Role::System,
                content: WireContent::Text(prompt.clone()),
            });

        let messages = system
            .into_iter()
            .chain(self.messages.iter().map(WireMessage::from))
            .collect();

        ChatPayload {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: true,
        }
    }
}

/// Body of `POST /chat/completions`
#[derive(Debug, Clone, Serialize)]
pub struct ChatPayload {
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct WireMessage {
    pub role: Role,
    pub content: WireContent,
}

/// Plain string for text-only messages, typed parts when an image is attached
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum WireContent {
    Text(String),
    Parts(Vec<WirePart>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WirePart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        let content = if message.has_image() {
            WireContent::Parts(
                message
                    .parts()
                    .iter()
                    .map(|part| match part {
                        ContentPart::Text(text) => WirePart::Text { text: text.clone() },
                        ContentPart::Image(image) => WirePart::ImageUrl {
                            image_url: ImageUrl {
                                url: image.data_uri(),
                            },
                        },
                    })
                    .collect(),
            )
        } else {
            WireContent::Text(message.text())
        };

        WireMessage {
            role: message.role,
            content,
        }
    }
}

/// Anything that can turn a request into a stream of [`LlmEvent`]s.
///
/// The receiver yields deltas in arrival order and ends with either
/// `StreamComplete` or `Error`.
pub trait CompletionBackend {
    fn stream(&self, request: ChatRequest) -> mpsc::Receiver<LlmEvent>;
}

/// LLM client for streaming responses from an OpenAI-compatible endpoint
#[derive(Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl LlmClient {
    /// Build a client for the configured provider; fails without an API key
    pub fn new(config: &Config) -> Result<Self, ChatError> {
        let api_key = config.api_key()?;
        Self::with_endpoint(&config.provider.base_url, api_key)
    }

    pub fn with_endpoint(base_url: &str, api_key: impl Into<String>) -> Result<Self, ChatError> {
        // No total timeout: a long answer may stream for minutes.
        let client = reqwest::Client::builder()
            .user_agent(concat!("chatline/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Send the request and forward the SSE stream to `tx`
    async fn stream_chat(
        client: reqwest::Client,
        url: String,
        api_key: String,
        request: ChatRequest,
        tx: mpsc::Sender<LlmEvent>,
    ) -> Result<(), ChatError> {
        let payload = request.to_payload();
        tracing::info!(
            "Opening stream: model={} messages={}",
            payload.model,
            payload.messages.len()
        );

        let response = client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::warn!("Completion request failed with status {}", status);
            return Err(ChatError::from_api_body(
                status.as_u16(),
                &request.model,
                &error_text,
            ));
        }

        Self::process_sse_stream(response, &request.model, tx).await
    }

    /// Process Server-Sent Events stream
    async fn process_sse_stream(
        response: reqwest::Response,
        model: &str,
        tx: mpsc::Sender<LlmEvent>,
    ) -> Result<(), ChatError> {
        let status = response.status().as_u16();
        let mut stream = response.bytes_stream();
        let mut decoder = SseDecoder::default();
        let mut fragments = 0usize;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            for event in decoder.push(&chunk) {
                match event {
                    SseEvent::Delta(text) => {
                        fragments += 1;
                        if tx.send(LlmEvent::TextDelta(text)).await.is_err() {
                            // Receiver gone: the turn was abandoned.
                            tracing::debug!("Stream receiver dropped, closing connection");
                            return Ok(());
                        }
                    }
                    SseEvent::Failed(data) => {
                        return Err(ChatError::from_api_body(status, model, &data));
                    }
                    SseEvent::Done => {
                        tracing::info!("Stream finished after {} fragments", fragments);
                        let _ = tx.send(LlmEvent::StreamComplete).await;
                        return Ok(());
                    }
                }
            }
        }

        // Flush any remaining buffer line (without newline)
        for event in decoder.finish() {
            match event {
                SseEvent::Delta(text) => {
                    fragments += 1;
                    let _ = tx.send(LlmEvent::TextDelta(text)).await;
                }
                SseEvent::Failed(data) => {
                    return Err(ChatError::from_api_body(status, model, &data));
                }
                SseEvent::Done => {}
            }
        }

        if fragments == 0 && decoder.malformed_lines() > 0 {
            return Err(ChatError::StreamFormat(format!(
                "{} undecodable data lines and no content",
                decoder.malformed_lines()
            )));
        }

        tracing::info!("Stream closed after {} fragments", fragments);
        let _ = tx.send(LlmEvent::StreamComplete).await;
        Ok(())
    }
}

impl CompletionBackend for LlmClient {
    /// Spawn the request on the current tokio runtime
    fn stream(&self, request: ChatRequest) -> mpsc::Receiver<LlmEvent> {
        let (tx, rx) = mpsc::channel(1000);

        let client = self.client.clone();
        let url = self.endpoint();
        let api_key = self.api_key.clone();

        tokio::spawn(async move {
            let tx_clone = tx.clone();
            if let Err(e) = Self::stream_chat(client, url, api_key, request, tx).await {
                tracing::warn!("Stream failed: {}", e);
                let _ = tx_clone.send(LlmEvent::Error(e)).await;
            }
        });

        rx
    }
}

/// One decoded `data:` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Delta(String),
    /// Raw JSON of an `{"error": ...}` chunk
    Failed(String),
    Done,
}

/// Incremental SSE line decoder.
///
/// Bytes are buffered until a full line arrives, so chunk boundaries may fall
/// anywhere, including inside a multi-byte character.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    malformed: usize,
}

impl SseDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline_pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            if let Some(event) = self.decode_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Decode whatever is left once the body has ended
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let line = std::mem::take(&mut self.buffer);
        self.decode_line(&line).into_iter().collect()
    }

    pub fn malformed_lines(&self) -> usize {
        self.malformed
    }

    fn decode_line(&mut self, raw: &[u8]) -> Option<SseEvent> {
        let line = String::from_utf8_lossy(raw);
        let data = line.trim().strip_prefix("data:")?.trim_start();

        if data == "[DONE]" {
            return Some(SseEvent::Done);
        }

        let chunk: serde_json::Value = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                self.malformed += 1;
                tracing::debug!("Skipping undecodable stream line: {}", e);
                return None;
            }
        };

        if chunk.get("error").is_some() {
            return Some(SseEvent::Failed(data.to_string()));
        }

        let content = chunk
            .get("choices")?
            .get(0)?
            .get("delta")?
            .get("content")?
            .as_str()?;

        if content.is_empty() {
            None
        } else {
            Some(SseEvent::Delta(content.to_string()))
        }
    }
}
