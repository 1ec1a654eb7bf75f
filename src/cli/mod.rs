//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod chat;
pub mod manage;
pub mod model_list;
pub mod render;
pub mod say;

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::api::models::list_models;
use crate::cli::chat::run_chat;
use crate::cli::manage::{delete_model, ping, pull_model};
use crate::cli::model_list::list_models_command;
use crate::cli::say::run_say;
use crate::core::config::{path_display, ConnectionConfig, Settings, DEFAULT_BASE_URL};
use crate::core::error::OperationError;
use crate::core::transport::Transport;
use crate::utils::logging::{self, LOG_LEVELS};

#[derive(Parser)]
#[command(name = "palaver")]
#[command(version)]
#[command(about = "A terminal chat client for a local model server")]
#[command(
    long_about = "Palaver chats with models served by a local Ollama-compatible server. \
Replies stream in as they are generated, and installed models can be listed, \
downloaded, and deleted.\n\n\
Environment Variables:\n\
  OLLAMA_HOST       Server address (optional, defaults to http://127.0.0.1:11434)\n\
  RUST_LOG          Overrides --log-level with a full tracing filter\n\n\
Controls (chat):\n\
  Enter             Send the message\n\
  Ctrl+C            Stop the reply being streamed; press again when idle to quit\n\
  /help             List chat commands"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Server address, e.g. 127.0.0.1:11434 (http:// is added when missing)
    #[arg(short = 'H', long, global = true, env = "OLLAMA_HOST")]
    pub host: Option<String>,

    /// Model to chat with (defaults to the configured model, then the first installed one)
    #[arg(short = 'm', long, global = true)]
    pub model: Option<String>,

    /// Settings file to read instead of the platform default
    #[arg(short = 'c', long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Diagnostic log level
    #[arg(long, global = true, default_value = "warn", value_parser = LOG_LEVELS)]
    pub log_level: String,

    /// Write diagnostic logs to a file instead of stderr
    #[arg(short = 'l', long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive chat (default)
    Chat,
    /// Send one message and print the reply
    Say {
        /// Message to send
        #[arg(trailing_var_arg = true, required = true)]
        prompt: Vec<String>,
    },
    /// List installed models
    Models,
    /// Download a model
    Pull {
        name: String,
        /// Allow insecure connections to the registry
        #[arg(long)]
        insecure: bool,
    },
    /// Delete an installed model
    Delete { name: String },
    /// Check that the server answers
    Ping,
}

/// Resolved settings every command starts from.
pub struct CliContext {
    pub connection: ConnectionConfig,
    pub transport: Transport,
    pub default_model: Option<String>,
}

impl CliContext {
    fn resolve(args: &Args) -> Result<Self, Box<dyn Error>> {
        let settings = match &args.config {
            Some(path) => Settings::load_from_path(path)?,
            None => Settings::load()?,
        };

        let connection = args
            .host
            .as_deref()
            .map(ConnectionConfig::new)
            .or_else(|| settings.connection())
            .unwrap_or_else(|| ConnectionConfig::new(DEFAULT_BASE_URL));
        let transport = Transport::new(settings.timeouts())?;

        if let Some(path) = &args.config {
            tracing::debug!(path = %path_display(path), "Loaded settings");
        }

        Ok(Self {
            connection,
            transport,
            default_model: args.model.clone().or(settings.default_model),
        })
    }

    /// The model to chat with: explicit choice first, otherwise the first
    /// installed model.
    pub async fn pick_model(&self) -> Result<String, OperationError> {
        if let Some(model) = &self.default_model {
            return Ok(model.clone());
        }
        let models = list_models(&self.transport, &self.connection).await?;
        models
            .into_iter()
            .next()
            .map(|model| model.name)
            .ok_or(OperationError::ModelNotFound)
    }
}

/// Print `error` with its quick fixes and end the process.
pub(crate) fn exit_with(error: &OperationError) -> ! {
    let _ = render::write_operation_error(error, &mut std::io::stderr());
    std::process::exit(error.exit_code());
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    logging::init(&args.log_level, args.log_file.as_deref())?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    let ctx = CliContext::resolve(&args)?;

    match args.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_chat(ctx).await,
        Commands::Say { prompt } => run_say(ctx, prompt).await,
        Commands::Models => list_models_command(ctx).await,
        Commands::Pull { name, insecure } => pull_model(ctx, &name, insecure).await,
        Commands::Delete { name } => delete_model(ctx, &name).await,
        Commands::Ping => ping(ctx).await,
    }
}
