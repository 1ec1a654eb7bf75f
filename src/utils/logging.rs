//! Diagnostic logging setup.
//!
//! Logs go to stderr (or a file) so they never interleave with reply text
//! streamed to stdout.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

pub const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Directive applied when `RUST_LOG` is not set.
pub fn default_directive(level: &str) -> String {
    format!("palaver={level}")
}

/// Install the global subscriber. `RUST_LOG` takes precedence over `level`.
pub fn init(level: &str, log_file: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level)));

    match log_file {
        Some(path) => {
            // Test if we can create/write to the file before installing it
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(|err| err as Box<dyn std::error::Error>)?;
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|err| err as Box<dyn std::error::Error>)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directive_targets_this_crate() {
        assert_eq!(default_directive("debug"), "palaver=debug");
        for level in LOG_LEVELS {
            assert!(default_directive(level).parse::<EnvFilter>().is_ok());
        }
    }

    #[test]
    fn unwritable_log_file_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing_parent = dir.path().join("no-such-dir").join("palaver.log");
        assert!(init("info", Some(&missing_parent)).is_err());
    }

    #[test]
    fn second_subscriber_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("palaver.log");
        let _ = init("debug", Some(&path));
        assert!(path.exists());
        assert!(init("debug", Some(&path)).is_err());
    }
}
