//! Flushing of the standard output streams on the way out.

use std::io::{self, Write};
use std::os::unix::io::RawFd;
use std::process::ExitCode;

use crate::error::{DaemonError, DaemonResult};

/// Finalizer owned by the entry point, run once on every exit path.
///
/// [`ExitFlusher::finish`] flushes stdout, then stderr, and may turn a
/// successful exit into a failure. If the flusher is dropped without
/// `finish` (a panic unwinding through `main`), the flush still happens but
/// cannot change the exit status.
#[derive(Debug)]
pub struct ExitFlusher {
    done: bool,
}

impl ExitFlusher {
    pub fn install() -> Self {
        ExitFlusher { done: false }
    }

    /// Flushes both streams and returns the status the process should exit with.
    ///
    /// A broken pipe on stdout is ignored. Any other stdout failure is
    /// reported on stderr and forces a failure status; any stderr failure
    /// forces a failure status silently.
    pub fn finish(mut self, code: ExitCode) -> ExitCode {
        match self.flush() {
            Ok(()) => code,
            Err(FlushFailure::Stdout(err)) => {
                let _ = writeln!(io::stderr(), "{}", DaemonError::Flush(err));
                ExitCode::FAILURE
            }
            Err(FlushFailure::Stderr) => ExitCode::FAILURE,
        }
    }

    fn flush(&mut self) -> Result<(), FlushFailure> {
        if self.done {
            return Ok(());
        }
        self.done = true;

        let stdout = flush_standard_stream(&mut io::stdout(), libc::STDOUT_FILENO);
        let stderr = flush_standard_stream(&mut io::stderr(), libc::STDERR_FILENO);
        apply_policy(stdout, stderr)
    }
}

impl Drop for ExitFlusher {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[derive(Debug)]
enum FlushFailure {
    Stdout(io::Error),
    Stderr,
}

fn apply_policy(stdout: io::Result<()>, stderr: io::Result<()>) -> Result<(), FlushFailure> {
    match stdout {
        Err(err) if err.kind() != io::ErrorKind::BrokenPipe => {
            return Err(FlushFailure::Stdout(err));
        }
        _ => {}
    }
    stderr.map_err(|_| FlushFailure::Stderr)
}

/// Writes out whatever `stream` still buffers before the process hands it off
/// (fork, rebinding, exec). A reader that went away is not an error.
pub(crate) fn flush_pending<W: Write>(stream: &mut W) -> DaemonResult<()> {
    match stream.flush() {
        Err(err) if err.kind() != io::ErrorKind::BrokenPipe => Err(DaemonError::Flush(err)),
        _ => Ok(()),
    }
}

/// Flushes `stream`, then closes a duplicate of `fd`.
///
/// Some filesystems (NFS) only report write errors on close, which a plain
/// flush never sees. A stream whose descriptor is already closed counts as
/// flushed.
fn flush_standard_stream<W: Write>(stream: &mut W, fd: RawFd) -> io::Result<()> {
    match stream.flush().and_then(|()| release_fd(fd)) {
        Err(err) if err.raw_os_error() == Some(libc::EBADF) => Ok(()),
        result => result,
    }
}

fn release_fd(fd: RawFd) -> io::Result<()> {
    let dup = unsafe { libc::dup(fd) };
    if dup < 0 {
        return Err(io::Error::last_os_error());
    }
    if unsafe { libc::close(dup) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
