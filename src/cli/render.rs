//! Plain-text rendering of core events.

use std::io::{self, Write};

use crate::api::models::ModelDescriptor;
use crate::core::error::OperationError;
use crate::core::events::CoreEvent;

/// Write `event` to `out` (reply text and listings) or `err` (problems).
pub fn render_event<W: Write, E: Write>(event: &CoreEvent, out: &mut W, err: &mut E) -> io::Result<()> {
    match event {
        CoreEvent::ChatStarted { model } => {
            write!(out, "🤖 {model}: ")?;
        }
        CoreEvent::ChatFragment(text) => {
            write!(out, "{text}")?;
        }
        CoreEvent::ChatCompleted { cancelled, .. } => {
            writeln!(out)?;
            if *cancelled {
                writeln!(out, "⏹  (stopped)")?;
            }
            writeln!(out)?;
        }
        CoreEvent::ChatFailed(error) => {
            writeln!(out)?;
            write_operation_error(error, err)?;
        }
        CoreEvent::CatalogUpdated(models) => {
            write_model_list(models, out)?;
        }
        CoreEvent::CatalogError(error) => {
            write_operation_error(error, err)?;
        }
        CoreEvent::PullProgress(progress) => match progress.percentage() {
            Some(percent) => writeln!(out, "{progress} {percent:.0}%")?,
            None => writeln!(out, "{progress}")?,
        },
        CoreEvent::PullFinished(result) => match result {
            Ok(()) => writeln!(out, "✅ Download finished")?,
            Err(error) => {
                write!(err, "Download failed. ")?;
                write_operation_error(error, err)?;
            }
        },
        CoreEvent::DeleteFinished(result) => match result {
            Ok(()) => writeln!(out, "✅ Model deleted")?,
            Err(OperationError::ModelNotFound) => writeln!(err, "⚠️  Model not found")?,
            Err(error) => {
                write!(err, "Delete failed. ")?;
                write_operation_error(error, err)?;
            }
        },
    }
    out.flush()?;
    err.flush()
}

pub fn write_model_list<W: Write>(models: &[ModelDescriptor], out: &mut W) -> io::Result<()> {
    writeln!(out, "📦 Installed models ({})", models.len())?;
    for model in models {
        writeln!(out, "  • {}", model.name)?;
    }
    Ok(())
}

pub fn write_operation_error<W: Write>(error: &OperationError, out: &mut W) -> io::Result<()> {
    writeln!(out, "❌ {error}")?;
    let fixes = error.quick_fixes();
    if !fixes.is_empty() {
        writeln!(out, "💡 Quick fixes:")?;
        for fix in fixes {
            writeln!(out, "  • {fix}")?;
        }
    }
    Ok(())
}
