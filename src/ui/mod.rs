//! Interactive chat screen.

pub mod conversation;
pub mod theme;

use anyhow::Result;

use crate::agent::ChatController;
use crate::llm::CompletionBackend;
use crate::tui::{self, AppEvent, EventHandler, TICK_RATE};
use conversation::{ConversationAction, ConversationManager};

/// Run the chat screen until the user quits
pub async fn run<B: CompletionBackend>(controller: ChatController<B>) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = event_loop(&mut terminal, controller).await;
    tui::restore()?;
    result
}

async fn event_loop<B: CompletionBackend>(
    terminal: &mut tui::Tui,
    controller: ChatController<B>,
) -> Result<()> {
    let mut manager = ConversationManager::new(controller);
    let mut events = EventHandler::new(TICK_RATE);

    terminal.draw(|frame| manager.render(frame))?;

    while let Some(event) = events.next().await {
        match event {
            AppEvent::Key(key) => {
                if manager.handle_key(key) == ConversationAction::Exit {
                    break;
                }
                manager.process_streaming_chunks();
            }
            AppEvent::Resize(_, _) => {}
            AppEvent::Tick => {
                manager.on_tick();
                manager.process_streaming_chunks();
            }
        }

        terminal.draw(|frame| manager.render(frame))?;
    }

    tracing::info!("Chat session closed");
    Ok(())
}
