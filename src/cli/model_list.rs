//! Model listing command

use std::error::Error;
use std::io;

use crate::api::models::list_models;
use crate::cli::render::write_model_list;
use crate::cli::{exit_with, CliContext};

pub async fn list_models_command(ctx: CliContext) -> Result<(), Box<dyn Error>> {
    println!("🤖 Models on {}", ctx.connection.base_url());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if let Some(default_model) = &ctx.default_model {
        println!("🎯 Default model: {default_model}");
    }

    match list_models(&ctx.transport, &ctx.connection).await {
        Ok(models) => {
            write_model_list(&models, &mut io::stdout())?;
            Ok(())
        }
        Err(err) => exit_with(&err),
    }
}
