use anyhow::{Context, Result, bail};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::agent::{ChatController, TurnEvent};
use crate::attachment::ImageAttachment;
use crate::config::Config;
use crate::llm::CompletionBackend;
use crate::models::catalog_listing;
use crate::prompts::turn_failed_message;

/// Outcome of a one-shot `ask`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AskOutcome {
    Answered { model: String, text: String },
    Failed,
}

/// Send one prompt and stream the reply to `out` as it arrives.
///
/// Notices and errors go to `err` so the reply can be piped cleanly.
pub async fn ask<B, O, E>(
    controller: &mut ChatController<B>,
    prompt: &str,
    image: Option<&Path>,
    out: &mut O,
    err: &mut E,
) -> Result<AskOutcome>
where
    B: CompletionBackend,
    O: Write,
    E: Write,
{
    let image = image
        .map(ImageAttachment::from_path)
        .transpose()
        .context("Failed to attach image")?;

    let submission = match controller.submit(prompt, image) {
        Ok(submission) => submission,
        Err(rejected) => bail!("{}", rejected),
    };
    if let Some(notice) = &submission.notice {
        writeln!(err, "{}", notice)?;
    }

    let mut printed = 0;
    while let Some(event) = controller.next_event().await {
        match event {
            TurnEvent::Fragment { display } => {
                out.write_all(display[printed..].as_bytes())?;
                out.flush()?;
                printed = display.len();
            }
            TurnEvent::Committed { text } => {
                out.write_all(text[printed.min(text.len())..].as_bytes())?;
                writeln!(out)?;
                return Ok(AskOutcome::Answered {
                    model: submission.model,
                    text,
                });
            }
            TurnEvent::Failed { partial, error } => {
                if !partial.is_empty() {
                    writeln!(out)?;
                }
                writeln!(err, "{}", turn_failed_message(&error.to_string(), error.hint()))?;
                return Ok(AskOutcome::Failed);
            }
        }
    }

    Ok(AskOutcome::Failed)
}

/// Print the model catalog and the configured defaults
pub fn list_models<W: Write>(config: &Config, out: &mut W) -> Result<()> {
    writeln!(out, "🤖 Models ({}):", config.provider.name)?;
    writeln!(out, "{}", "=".repeat(50))?;
    writeln!(out, "{}", catalog_listing(&config.default_model))?;
    writeln!(out)?;
    writeln!(out, "Default model: {}", config.default_model)?;
    writeln!(out, "Vision model:  {}", config.vision_model)?;
    writeln!(out, "👁 marks models that accept images.")?;
    Ok(())
}

/// Write a default config file; refuses to overwrite unless `force`
pub fn init_config(path: &Path, force: bool) -> Result<PathBuf> {
    if path.exists() && !force {
        bail!(
            "Config file {} already exists (use --force to overwrite)",
            path.display()
        );
    }

    Config::default().save_to(path)?;
    tracing::info!("Wrote default config to {}", path.display());
    Ok(path.to_path_buf())
}
