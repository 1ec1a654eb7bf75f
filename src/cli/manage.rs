//! Model management commands: pull, delete, ping.

use std::error::Error;
use std::io;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use crate::cli::render::render_event;
use crate::cli::CliContext;
use crate::core::catalog::ModelCatalog;
use crate::core::error::OperationError;
use crate::core::events::{CoreEvent, EventSink};

pub async fn pull_model(ctx: CliContext, name: &str, insecure: bool) -> Result<(), Box<dyn Error>> {
    println!("⬇️  Pulling {name} from {}", ctx.connection.base_url());
    let (events, rx) = EventSink::channel();
    let catalog = ModelCatalog::new(ctx.transport, events);
    let task = catalog.pull(&ctx.connection, name, insecure);
    drop(catalog);
    finish(task, rx).await
}

pub async fn delete_model(ctx: CliContext, name: &str) -> Result<(), Box<dyn Error>> {
    println!("🗑️  Deleting {name} from {}", ctx.connection.base_url());
    let (events, rx) = EventSink::channel();
    let catalog = ModelCatalog::new(ctx.transport, events);
    let task = catalog.delete(&ctx.connection, name);
    drop(catalog);
    finish(task, rx).await
}

pub async fn ping(ctx: CliContext) -> Result<(), Box<dyn Error>> {
    let (events, _rx) = EventSink::channel();
    let catalog = ModelCatalog::new(ctx.transport, events);
    let base_url = ctx.connection.base_url();
    if catalog.check_connection(&ctx.connection).await {
        println!("✅ Server reachable at {base_url}");
        Ok(())
    } else {
        eprintln!("❌ Could not reach the server at {base_url}");
        std::process::exit(2);
    }
}

/// Render events until the task drops the last sender, then exit non-zero
/// if the operation failed. The failure itself was already rendered.
async fn finish(
    task: JoinHandle<Result<(), OperationError>>,
    mut rx: UnboundedReceiver<CoreEvent>,
) -> Result<(), Box<dyn Error>> {
    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    while let Some(event) = rx.recv().await {
        render_event(&event, &mut stdout, &mut stderr)?;
    }

    match task.await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => std::process::exit(err.exit_code()),
        Err(join_err) => Err(OperationError::from(join_err).into()),
    }
}
