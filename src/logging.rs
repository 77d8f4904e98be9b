//! Structured logging setup shared by both binaries. Level is a simple 0-3
//! dial rather than exposing `tracing`'s full filter syntax on the CLI,
//! matching the coarse verbosity knob in the wire contract's CLI surface.

use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

/// `0` = warnings and errors, `1` = info (default), `2` = debug, `3` = trace.
pub fn level_filter(level: u8) -> EnvFilter {
    let directive = match level {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    EnvFilter::new(directive)
}

/// Initializes the global tracing subscriber. With `log_file` set, output
/// goes there instead of stderr; callers own the returned guard for the
/// process lifetime of any buffered writer.
pub fn init(level: u8, log_file: Option<&Path>) -> io::Result<()> {
    let filter = level_filter(level);

    match log_file {
        Some(path) => {
            let file = File::create(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
    Ok(())
}
