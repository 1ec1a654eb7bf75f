//! One-shot "say" command
//!
//! Sends a single message, streams the reply to stdout, and exits. Ctrl+C
//! stops the reply; whatever arrived so far is kept on screen.

use std::error::Error;
use std::io;

use crate::cli::render::render_event;
use crate::cli::{exit_with, CliContext};
use crate::core::chat_stream::{ChatSession, TurnOutcome};
use crate::core::events::{CoreEvent, EventSink};

pub async fn run_say(ctx: CliContext, prompt: Vec<String>) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    let model = match ctx.pick_model().await {
        Ok(model) => model,
        Err(err) => exit_with(&err),
    };

    let (events, mut rx) = EventSink::channel();
    let mut session = ChatSession::new(ctx.transport, ctx.connection, events);
    session.set_model(model);
    let turn = session.send(&prompt).await?;

    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                // Failures are reported below with an exit status.
                if !matches!(event, CoreEvent::ChatFailed(_)) {
                    render_event(&event, &mut stdout, &mut stderr)?;
                }
                if matches!(event, CoreEvent::ChatCompleted { .. } | CoreEvent::ChatFailed(_)) {
                    break;
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                turn.cancel();
            }
        }
    }

    match turn.join().await {
        TurnOutcome::Completed { .. } | TurnOutcome::Cancelled { .. } => Ok(()),
        TurnOutcome::Failed(err) => {
            println!();
            exit_with(&err)
        }
    }
}
