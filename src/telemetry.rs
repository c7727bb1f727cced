//! Diagnostic tracing for the daemonizer itself.
//!
//! Fatal errors are not logged here; they are printed as plain lines by the
//! entry point. Tracing only narrates the sequence when asked to.

use std::io::{self, IsTerminal};

use tracing::Level;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::fmt;

/// Maps the number of `-v` flags to the most verbose level shown.
pub fn level_for(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Installs a compact stderr subscriber as the global default.
///
/// Events go to whatever descriptor 2 is at the time they are emitted, so
/// after stderr is rebound they land in its pipe.
pub fn initialise(verbosity: u8) -> Result<(), SetGlobalDefaultError> {
    let subscriber = fmt::Subscriber::builder()
        .with_max_level(level_for(verbosity))
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .with_ansi(io::stderr().is_terminal())
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
}
