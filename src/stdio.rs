use std::path::{Path, PathBuf};

/// Defines how one standard stream (stdin, stdout, stderr) is bound in the daemon.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Stdio {
    /// Keeps whatever descriptor the stream inherited. Default option.
    #[default]
    Keep,
    /// Creates a named pipe at the path and rebinds the stream to it.
    Fifo(PathBuf),
}

impl Stdio {
    /// Creates a binding to a named pipe that does not exist yet.
    pub fn fifo<P: Into<PathBuf>>(path: P) -> Self {
        Stdio::Fifo(path.into())
    }

    /// Returns the pipe path, if the stream is rebound.
    pub fn fifo_path(&self) -> Option<&Path> {
        match self {
            Stdio::Fifo(path) => Some(path),
            Stdio::Keep => None,
        }
    }
}

impl From<PathBuf> for Stdio {
    fn from(path: PathBuf) -> Self {
        Stdio::Fifo(path)
    }
}

impl From<&Path> for Stdio {
    fn from(path: &Path) -> Self {
        Stdio::Fifo(path.to_path_buf())
    }
}

impl From<Option<PathBuf>> for Stdio {
    fn from(path: Option<PathBuf>) -> Self {
        path.map_or(Stdio::Keep, Stdio::Fifo)
    }
}

/// One of the three standard streams, with the open mode its pipe needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stream {
    Stdin,
    Stdout,
    Stderr,
}

impl Stream {
    pub(crate) const ALL: [Stream; 3] = [Stream::Stdin, Stream::Stdout, Stream::Stderr];

    pub(crate) fn name(self) -> &'static str {
        match self {
            Stream::Stdin => "stdin",
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
        }
    }

    pub(crate) fn fd(self) -> libc::c_int {
        match self {
            Stream::Stdin => libc::STDIN_FILENO,
            Stream::Stdout => libc::STDOUT_FILENO,
            Stream::Stderr => libc::STDERR_FILENO,
        }
    }

    /// Input is read-only; output streams append.
    pub(crate) fn is_input(self) -> bool {
        matches!(self, Stream::Stdin)
    }
}
