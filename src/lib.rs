//! # daemonize
//!
//! Turns an arbitrary foreground program into a detached background process.
//!
//! The daemonization sequence is strictly ordered: inherited descriptors are
//! closed, the process forks, the parent records the child pid and leaves,
//! the child becomes a session leader, optionally rebinds its standard
//! streams to freshly created named pipes, and finally replaces itself with
//! the target program.
//!
//! Every step reports failure as a [`DaemonError`]; nothing in this crate
//! terminates the process on its own. The binary's `main` is the single
//! place where diagnostics are printed and the exit status is chosen.

#[cfg(not(unix))]
compile_error!("daemonize only supports POSIX targets");

pub mod cli;
mod daemon;
mod error;
mod flush;
mod stdio;
mod sys;
pub mod telemetry;

// Re-export public types to keep the API flat
pub use daemon::{Daemon, Detached};
pub use error::{DaemonError, DaemonResult, EXIT_EXEC_ENOENT, EXIT_EXEC_FAILED, PidfileAction};
pub use flush::ExitFlusher;
pub use stdio::Stdio;
