use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Exit status when the target program was located but could not be run.
pub const EXIT_EXEC_FAILED: u8 = 126;
/// Exit status when the target program could not be found.
pub const EXIT_EXEC_ENOENT: u8 = 127;

/// Which step of the pidfile write failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidfileAction {
    Open,
    Write,
    Close,
}

impl PidfileAction {
    fn verb(self) -> &'static str {
        match self {
            PidfileAction::Open => "open",
            PidfileAction::Write => "write",
            PidfileAction::Close => "close",
        }
    }
}

/// Error type for the daemonization sequence.
///
/// Every variant is fatal. The `Display` form is the single-line diagnostic
/// printed by the entry point, `<action>: <system error>` whenever an OS
/// error underlies the failure.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// The command line did not describe a program to run.
    #[error("{0}")]
    Argument(String),
    /// `fork` failed; no state has changed yet.
    #[error("fork failed: {0}")]
    ForkFailed(#[source] io::Error),
    /// The child could not become a session leader.
    #[error("setsid failed: {0}")]
    Session(#[source] io::Error),
    /// The parent could not record the child pid.
    #[error("failed to {} {}: {source}", .action.verb(), .path.display())]
    Pidfile {
        action: PidfileAction,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// A named pipe could not be created, including when the path already exists.
    #[error("mkfifo failed for {}: {source}", .path.display())]
    PipeCreate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// A standard stream could not be reopened against its named pipe.
    #[error("failed to reopen {stream} on {}: {source}", .path.display())]
    PipeOpen {
        stream: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The target program does not exist.
    #[error("failed to execute {}: {source}", .program.to_string_lossy())]
    ExecNotFound {
        program: OsString,
        #[source]
        source: io::Error,
    },
    /// The target program exists but could not be executed.
    #[error("failed to execute {}: {source}", .program.to_string_lossy())]
    ExecFailed {
        program: OsString,
        #[source]
        source: io::Error,
    },
    /// Buffered standard output could not be written out at exit.
    #[error("write error: {0}")]
    Flush(#[source] io::Error),
}

impl DaemonError {
    pub(crate) fn pidfile(action: PidfileAction, path: &Path, source: io::Error) -> Self {
        DaemonError::Pidfile {
            action,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Classifies an exec failure by whether the program could be found.
    pub(crate) fn exec(program: OsString, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            DaemonError::ExecNotFound { program, source }
        } else {
            DaemonError::ExecFailed { program, source }
        }
    }

    /// Process exit status for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            DaemonError::ExecNotFound { .. } => EXIT_EXEC_ENOENT,
            DaemonError::ExecFailed { .. } => EXIT_EXEC_FAILED,
            _ => 1,
        }
    }
}

/// A specialized Result type for daemonization steps.
pub type DaemonResult<T> = Result<T, DaemonError>;
