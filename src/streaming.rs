use crate::llm::LlmEvent;

/// Glyph drawn after the text while a reply is still arriving
pub const STREAM_CURSOR: &str = "▌";

/// Text accumulated for the reply in flight
#[derive(Debug, Clone, Default)]
pub struct StreamState {
    /// Accumulated text buffer
    text_buffer: String,
    /// Number of fragments received
    fragments: usize,
}

impl StreamState {
    /// Append one fragment
    pub fn push_delta(&mut self, delta: &str) {
        self.fragments += 1;
        self.text_buffer.push_str(delta);
    }

    pub fn text(&self) -> &str {
        &self.text_buffer
    }

    pub fn fragments(&self) -> usize {
        self.fragments
    }

    pub fn has_content(&self) -> bool {
        !self.text_buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.text_buffer.clear();
        self.fragments = 0;
    }
}

/// What one stream event did to the display
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamUpdate {
    /// Buffer grew; `display` is the full text so far
    Fragment { display: String },
    /// Stream exhausted; `text` is the final reply
    Completed { text: String },
    /// Stream aborted; `partial` is whatever arrived before the error
    Failed { partial: String },
}

/// Tracks one streamed reply from first fragment to completion
#[derive(Debug, Clone, Default)]
pub struct StreamController {
    state: StreamState,
    is_streaming: bool,
    is_complete: bool,
}

impl StreamController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start streaming
    pub fn start_streaming(&mut self) {
        self.state.clear();
        self.is_streaming = true;
        self.is_complete = false;
    }

    /// Process an LLM event. Events after completion are ignored.
    pub fn process_event(&mut self, event: &LlmEvent) -> Option<StreamUpdate> {
        if self.is_complete {
            return None;
        }

        match event {
            LlmEvent::TextDelta(delta) => {
                self.state.push_delta(delta);
                Some(StreamUpdate::Fragment {
                    display: self.state.text().to_string(),
                })
            }
            LlmEvent::StreamComplete => Some(self.complete()),
            LlmEvent::Error(_) => {
                self.is_complete = true;
                self.is_streaming = false;
                Some(StreamUpdate::Failed {
                    partial: self.state.text().to_string(),
                })
            }
        }
    }

    /// Finish the stream with whatever has been received
    pub fn complete(&mut self) -> StreamUpdate {
        self.is_complete = true;
        self.is_streaming = false;
        StreamUpdate::Completed {
            text: self.state.text().to_string(),
        }
    }

    /// Current text
    pub fn display(&self) -> &str {
        self.state.text()
    }

    /// Current text with the typing cursor, for rendering only
    pub fn display_with_cursor(&self) -> String {
        if self.is_streaming {
            format!("{}{}", self.state.text(), STREAM_CURSOR)
        } else {
            self.state.text().to_string()
        }
    }

    /// Fragments are still arriving
    pub fn is_streaming(&self) -> bool {
        self.is_streaming
    }

    /// A terminal event was seen
    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    pub fn has_content(&self) -> bool {
        self.state.has_content()
    }

    pub fn fragments(&self) -> usize {
        self.state.fragments()
    }
}
