use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use crate::error::{DaemonError, DaemonResult};
use crate::stdio::{Stdio, Stream};

/// The resolved configuration of one daemonization run.
///
/// Built once from the command line, then consumed by [`Daemon::start`].
/// `argv[0]` is the program itself; the rest are passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Daemon {
    pub(crate) argv: Vec<OsString>,
    pub(crate) pid_file: Option<PathBuf>,
    pub(crate) stdin: Stdio,
    pub(crate) stdout: Stdio,
    pub(crate) stderr: Stdio,
}

/// What the parent sees once the child is running on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detached {
    /// Pid of the forked child, also written to the pidfile if one was requested.
    pub child: libc::pid_t,
}

impl Daemon {
    /// Creates a configuration for running `argv` in the background.
    ///
    /// A leading `--` separator is dropped. Fails when no program remains.
    pub fn new<I, S>(argv: I) -> DaemonResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut argv: Vec<OsString> = argv.into_iter().map(Into::into).collect();
        if argv.first().is_some_and(|arg| arg == "--") {
            argv.remove(0);
        }
        if argv.is_empty() {
            return Err(DaemonError::Argument(
                "no program given to daemonize".to_owned(),
            ));
        }

        Ok(Daemon {
            argv,
            pid_file: None,
            stdin: Stdio::Keep,
            stdout: Stdio::Keep,
            stderr: Stdio::Keep,
        })
    }

    // --- Public Getters ---

    /// The program that will replace the daemon, as given (looked up in `PATH`).
    pub fn program(&self) -> &OsStr {
        &self.argv[0]
    }

    /// Arguments passed to the program, without `argv[0]`.
    pub fn args(&self) -> &[OsString] {
        &self.argv[1..]
    }

    /// Returns the configured PID file path, if any.
    pub fn pid_file_path(&self) -> Option<&Path> {
        self.pid_file.as_deref()
    }

    pub(crate) fn binding(&self, stream: Stream) -> &Stdio {
        match stream {
            Stream::Stdin => &self.stdin,
            Stream::Stdout => &self.stdout,
            Stream::Stderr => &self.stderr,
        }
    }

    // --- Builder Methods ---

    /// Sets the file that receives the child pid, written by the parent.
    pub fn pid_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.pid_file = Some(path.into());
        self
    }

    /// Configures the standard input stream.
    pub fn stdin<S: Into<Stdio>>(mut self, stdio: S) -> Self {
        self.stdin = stdio.into();
        self
    }

    /// Configures the standard output stream.
    pub fn stdout<S: Into<Stdio>>(mut self, stdio: S) -> Self {
        self.stdout = stdio.into();
        self
    }

    /// Configures the standard error stream.
    pub fn stderr<S: Into<Stdio>>(mut self, stdio: S) -> Self {
        self.stderr = stdio.into();
        self
    }

    /// Runs the daemonization sequence.
    ///
    /// Only the parent ever gets `Ok`: it returns once the child pid is
    /// recorded. The child either becomes the target program or comes back
    /// with the error that stopped it.
    ///
    /// Opening a pipe blocks until another process opens its other end, so
    /// a `stdin` pipe with no writer hangs the child indefinitely.
    pub fn start(self) -> DaemonResult<Detached> {
        crate::sys::unix::start(self)
    }
}
