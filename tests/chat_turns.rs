//! End-to-end turns against a scripted completion backend.

use chatline::attachment::ImageAttachment;
use chatline::commands::{AskOutcome, ask};
use chatline::llm::WireContent;
use chatline::models::{DEFAULT_TEXT_MODEL, DEFAULT_VISION_MODEL};
use chatline::{
    ChatController, ChatError, ChatRequest, CompletionBackend, ContentPart, LlmEvent, Role,
    TurnEvent, TurnRejected,
};
use pretty_assertions::assert_eq;
use std::io::Write;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Replays one scripted turn per request and records what was sent
#[derive(Default)]
struct ScriptedBackend {
    turns: Mutex<Vec<Vec<LlmEvent>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedBackend {
    fn new(turns: Vec<Vec<LlmEvent>>) -> Self {
        Self {
            turns: Mutex::new(turns.into_iter().rev().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn last_request(&self) -> ChatRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

impl CompletionBackend for ScriptedBackend {
    fn stream(&self, request: ChatRequest) -> mpsc::Receiver<LlmEvent> {
        self.requests.lock().unwrap().push(request);
        let events = self.turns.lock().unwrap().pop().unwrap_or_default();
        let (tx, rx) = mpsc::channel(events.len().max(1));
        for event in events {
            tx.try_send(event).unwrap();
        }
        rx
    }
}

fn reply(fragments: &[&str]) -> Vec<LlmEvent> {
    fragments
        .iter()
        .map(|f| LlmEvent::TextDelta(f.to_string()))
        .chain(std::iter::once(LlmEvent::StreamComplete))
        .collect()
}

fn png_attachment() -> ImageAttachment {
    ImageAttachment::from_bytes("chart.png", b"\x89PNG\r\n\x1a\nrest").unwrap()
}

#[tokio::test]
async fn test_text_turn_stores_user_and_assistant() {
    let mut chat = ChatController::new(ScriptedBackend::new(vec![reply(&["H", "i there!"])]));

    let submission = chat.submit("hi", None).unwrap();
    assert_eq!(submission.model, DEFAULT_TEXT_MODEL);

    let mut displays = Vec::new();
    let mut committed = None;
    while let Some(event) = chat.next_event().await {
        match event {
            TurnEvent::Fragment { display } => displays.push(display),
            TurnEvent::Committed { text } => {
                committed = Some(text);
                break;
            }
            TurnEvent::Failed { error, .. } => panic!("turn failed: {error}"),
        }
    }
    assert_eq!(displays, vec!["H", "Hi there!"]);
    assert_eq!(committed.as_deref(), Some("Hi there!"));

    let messages = chat.store().current().messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].parts(), &[ContentPart::Text("hi".to_string())]);
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].text(), "Hi there!");
}

#[tokio::test]
async fn test_image_turn_substitutes_vision_model() {
    let mut chat = ChatController::new(ScriptedBackend::new(vec![reply(&["A bar chart."])]));

    let submission = chat.submit("describe this", Some(png_attachment())).unwrap();
    assert_eq!(submission.model, DEFAULT_VISION_MODEL);
    let notice = submission.notice.expect("substitution notice");
    assert!(notice.contains(DEFAULT_VISION_MODEL));

    chat.finish_turn().await;

    let request = chat.backend().last_request();
    assert_eq!(request.model, DEFAULT_VISION_MODEL);
    let payload = request.to_payload();
    let user = payload.messages.last().unwrap();
    match &user.content {
        WireContent::Parts(parts) => assert_eq!(parts.len(), 2),
        WireContent::Text(text) => panic!("expected typed parts, got text {text:?}"),
    }

    let json = serde_json::to_value(&payload).unwrap();
    let parts = &json["messages"][1]["content"];
    assert_eq!(parts[0]["type"], "text");
    assert_eq!(parts[0]["text"], "describe this");
    assert_eq!(parts[1]["type"], "image_url");
    assert!(
        parts[1]["image_url"]["url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,")
    );
}

#[tokio::test]
async fn test_remote_error_keeps_only_user_message() {
    let mut chat = ChatController::new(ScriptedBackend::new(vec![vec![LlmEvent::Error(
        ChatError::ModelDecommissioned {
            model: "mixtral-8x7b-32768".to_string(),
        },
    )]]));
    chat.preferences_mut().model = "mixtral-8x7b-32768".to_string();

    chat.submit("hello?", None).unwrap();
    match chat.finish_turn().await {
        Some(TurnEvent::Failed { partial, error }) => {
            assert_eq!(partial, "");
            assert!(error.hint().unwrap().contains("llama-3.3-70b-versatile"));
        }
        other => panic!("expected failure, got {other:?}"),
    }

    let messages = chat.store().current().messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, Role::User);
}

#[tokio::test]
async fn test_reply_lands_in_conversation_that_was_current() {
    let mut chat = ChatController::new(ScriptedBackend::new(vec![
        reply(&["first answer"]),
        reply(&["second answer"]),
    ]));
    let first = chat.store().current_id().to_string();
    chat.submit("question one", None).unwrap();
    assert!(chat.store_mut().is_none(), "store is locked mid-turn");
    chat.finish_turn().await;

    let second = chat.store_mut().unwrap().create_conversation();
    chat.submit("question two", None).unwrap();
    chat.finish_turn().await;

    let store = chat.store();
    assert_eq!(store.get(&first).unwrap().len(), 2);
    assert_eq!(store.get(&second).unwrap().len(), 2);
    assert_eq!(chat.backend().last_request().messages.len(), 1);

    let previews: Vec<_> = store
        .list_conversations()
        .into_iter()
        .map(|row| row.preview)
        .collect();
    assert_eq!(previews, vec!["question two", "question one"]);
}

#[tokio::test]
async fn test_second_submit_while_streaming_is_busy() {
    let mut chat = ChatController::new(ScriptedBackend::new(vec![reply(&["ok"])]));
    chat.submit("one", None).unwrap();
    assert_eq!(chat.submit("two", None), Err(TurnRejected::Busy));
    chat.finish_turn().await;
    assert_eq!(chat.store().current().len(), 2);
}

#[tokio::test]
async fn test_ask_prints_reply_and_notice() {
    let mut chat = ChatController::new(ScriptedBackend::new(vec![reply(&["Hello", ", world"])]));
    let mut image = tempfile::Builder::new().suffix(".jpg").tempfile().unwrap();
    image.write_all(&[0xFF, 0xD8, 0xFF, 0xE0]).unwrap();

    let mut out = Vec::new();
    let mut err = Vec::new();
    let outcome = ask(&mut chat, "what is this", Some(image.path()), &mut out, &mut err)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        AskOutcome::Answered {
            model: DEFAULT_VISION_MODEL.to_string(),
            text: "Hello, world".to_string(),
        }
    );
    assert_eq!(String::from_utf8(out).unwrap(), "Hello, world\n");
    assert!(String::from_utf8(err).unwrap().contains("vision"));
}

#[tokio::test]
async fn test_ask_reports_failure_on_stderr() {
    let mut chat = ChatController::new(ScriptedBackend::new(vec![vec![
        LlmEvent::TextDelta("Half".to_string()),
        LlmEvent::Error(ChatError::Api {
            status: 503,
            message: "Service Unavailable".to_string(),
        }),
    ]]));

    let mut out = Vec::new();
    let mut err = Vec::new();
    let outcome = ask(&mut chat, "hi", None, &mut out, &mut err).await.unwrap();

    assert_eq!(outcome, AskOutcome::Failed);
    assert_eq!(String::from_utf8(out).unwrap(), "Half\n");
    assert_eq!(
        String::from_utf8(err).unwrap(),
        "Error: Service Unavailable (HTTP 503)\n"
    );
}
