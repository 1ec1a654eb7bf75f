//! Interactive chat loop.
//!
//! Reads lines from stdin, sends them as turns, and renders core events as
//! they arrive. Ctrl+C stops the reply being streamed.

use std::error::Error;
use std::io::{self, Write};

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cli::render::render_event;
use crate::cli::{exit_with, CliContext};
use crate::core::catalog::ModelCatalog;
use crate::core::chat_stream::{ChatSession, SendError};
use crate::core::config::ConnectionConfig;
use crate::core::events::EventSink;

const HELP_TEXT: &str = "Commands:
  /clear          Forget the conversation
  /model NAME     Switch model for the next message
  /models         List installed models
  /host URL       Connect to another server
  /history        Print the conversation as JSON
  /ping           Check the server connection
  /quit           Exit (also Ctrl+D)";

#[derive(Debug, PartialEq, Eq)]
pub enum ChatCommand {
    Send(String),
    Clear,
    Model(String),
    Models,
    Host(String),
    History,
    Ping,
    Help,
    Quit,
    Unknown(String),
    Empty,
}

impl ChatCommand {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return ChatCommand::Empty;
        }
        let Some(command) = trimmed.strip_prefix('/') else {
            return ChatCommand::Send(trimmed.to_string());
        };

        let (name, rest) = command
            .split_once(char::is_whitespace)
            .map(|(name, rest)| (name, rest.trim()))
            .unwrap_or((command, ""));
        match (name, rest) {
            ("clear", _) => ChatCommand::Clear,
            ("models", _) => ChatCommand::Models,
            ("history", _) => ChatCommand::History,
            ("ping", _) => ChatCommand::Ping,
            ("help", _) => ChatCommand::Help,
            ("quit" | "exit", _) => ChatCommand::Quit,
            ("model", model) if !model.is_empty() => ChatCommand::Model(model.to_string()),
            ("host", host) if !host.is_empty() => ChatCommand::Host(host.to_string()),
            _ => ChatCommand::Unknown(trimmed.to_string()),
        }
    }
}

pub async fn run_chat(ctx: CliContext) -> Result<(), Box<dyn Error>> {
    let model = match ctx.pick_model().await {
        Ok(model) => model,
        Err(err) => exit_with(&err),
    };

    let (events, mut rx) = EventSink::channel();
    let catalog = ModelCatalog::new(ctx.transport.clone(), events.clone());
    let mut session = ChatSession::new(ctx.transport, ctx.connection, events);
    session.set_model(model.clone());

    eprintln!("🚀 Palaver - {}", session.connection().base_url());
    eprintln!("📡 Using model: {model}");
    eprintln!("💡 Ctrl+C stops a reply, /help lists commands, Ctrl+D quits");
    eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = io::stdout();
    let mut stderr = io::stderr();

    loop {
        tokio::select! {
            line = input.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let keep_going = handle_command(
                    ChatCommand::parse(&line),
                    &mut session,
                    &catalog,
                )
                .await?;
                if !keep_going {
                    break;
                }
            }
            Some(event) = rx.recv() => {
                render_event(&event, &mut stdout, &mut stderr)?;
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                if !session.cancel().await {
                    break;
                }
            }
        }
    }

    session.cancel().await;
    Ok(())
}

/// Returns `false` when the loop should exit.
async fn handle_command(
    command: ChatCommand,
    session: &mut ChatSession,
    catalog: &ModelCatalog,
) -> Result<bool, Box<dyn Error>> {
    match command {
        ChatCommand::Empty => {}
        ChatCommand::Send(text) => match session.send(&text).await {
            Ok(_turn) => {}
            Err(SendError::TurnInProgress) => {
                eprintln!("⚠️  Still replying; press Ctrl+C to stop it first");
            }
            Err(err) => eprintln!("⚠️  {err}"),
        },
        ChatCommand::Clear => match session.clear().await {
            Ok(()) => eprintln!("🧹 Conversation cleared"),
            Err(err) => eprintln!("⚠️  {err}"),
        },
        ChatCommand::Model(model) => {
            eprintln!("📡 Using model: {model}");
            session.set_model(model);
        }
        ChatCommand::Models => {
            let _ = catalog.refresh(session.connection());
        }
        ChatCommand::Host(host) => {
            session.set_connection(ConnectionConfig::new(&host));
            eprintln!("🌐 Server: {}", session.connection().base_url());
            let _ = catalog.refresh(session.connection());
        }
        ChatCommand::History => {
            let mut stdout = io::stdout();
            writeln!(stdout, "{}", session.export_history().await)?;
            stdout.flush()?;
        }
        ChatCommand::Ping => {
            let base_url = session.connection().base_url().to_string();
            if catalog.check_connection(session.connection()).await {
                eprintln!("✅ Server reachable at {base_url}");
            } else {
                eprintln!("❌ Could not reach the server at {base_url}");
            }
        }
        ChatCommand::Help => eprintln!("{HELP_TEXT}"),
        ChatCommand::Quit => return Ok(false),
        ChatCommand::Unknown(input) => {
            eprintln!("⚠️  Unknown command: {input} (try /help)");
        }
    }
    Ok(true)
}
