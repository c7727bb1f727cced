use std::convert::Infallible;
use std::ffi::CString;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::{AsRawFd, IntoRawFd};
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::Command;

use tracing::{debug, info};

use crate::daemon::{Daemon, Detached};
use crate::error::{DaemonError, DaemonResult, PidfileAction};
use crate::flush::flush_pending;
use crate::stdio::Stream;

/// Used when the descriptor table size cannot be queried.
const FALLBACK_OPEN_MAX: libc::c_int = 1024;

/// Mode for freshly created pipes, before the umask applies.
const FIFO_MODE: libc::mode_t = 0o666;

/// Main entry point for Unix systems.
///
/// Performs a single fork. The child detaches from the controlling terminal
/// with `setsid` alone: a session leader without a terminal cannot acquire
/// one unless it opens a tty without `O_NOCTTY`, so the classic second fork
/// is skipped.
pub(crate) fn start(daemon: Daemon) -> DaemonResult<Detached> {
    close_nonstd_fds();

    // Anything still buffered would otherwise be written by both processes.
    flush_pending(&mut io::stdout())?;

    let pid = unsafe { perform_fork()? };
    if pid > 0 {
        info!(child = pid, "forked daemon process");
        if let Some(path) = daemon.pid_file_path() {
            write_pid_file(path, pid)?;
            debug!(path = %path.display(), "wrote pid file");
        }
        return Ok(Detached { child: pid });
    }

    // New Session
    if unsafe { libc::setsid() } < 0 {
        return Err(DaemonError::Session(io::Error::last_os_error()));
    }
    debug!("started new session");

    // IO Redirection
    apply_io_redirection(&daemon)?;

    match launch(&daemon)? {}
}

// =========================================================================
// Helpers
// =========================================================================

/// Closes every descriptor above stderr.
///
/// Closing a descriptor that is not open is harmless, so errors are ignored.
pub(crate) fn close_nonstd_fds() {
    #[cfg(target_os = "linux")]
    {
        let closed = unsafe {
            libc::syscall(
                libc::SYS_close_range,
                3 as libc::c_uint,
                libc::c_uint::MAX,
                0 as libc::c_uint,
            )
        };
        if closed == 0 {
            return;
        }
    }

    for fd in 3..open_max() {
        unsafe { libc::close(fd) };
    }
}

fn open_max() -> libc::c_int {
    let max = unsafe { libc::sysconf(libc::_SC_OPEN_MAX) };
    if max <= 0 {
        FALLBACK_OPEN_MAX
    } else {
        libc::c_int::try_from(max).unwrap_or(libc::c_int::MAX)
    }
}

unsafe fn perform_fork() -> DaemonResult<libc::pid_t> {
    let pid = unsafe { libc::fork() };
    if pid < 0 {
        Err(DaemonError::ForkFailed(io::Error::last_os_error()))
    } else {
        Ok(pid)
    }
}

/// Writes the decimal pid, with no trailing newline, truncating any previous content.
pub(crate) fn write_pid_file(path: &Path, pid: libc::pid_t) -> DaemonResult<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|err| DaemonError::pidfile(PidfileAction::Open, path, err))?;

    write!(file, "{}", pid).map_err(|err| DaemonError::pidfile(PidfileAction::Write, path, err))?;

    // Dropping a File swallows close errors.
    let fd = file.into_raw_fd();
    if unsafe { libc::close(fd) } < 0 {
        return Err(DaemonError::pidfile(
            PidfileAction::Close,
            path,
            io::Error::last_os_error(),
        ));
    }
    Ok(())
}

/// Creates every requested pipe, then rebinds the streams in stdin, stdout, stderr order.
fn apply_io_redirection(daemon: &Daemon) -> DaemonResult<()> {
    for stream in Stream::ALL {
        if let Some(path) = daemon.binding(stream).fifo_path() {
            create_fifo(path)?;
            debug!(stream = stream.name(), path = %path.display(), "created fifo");
        }
    }

    for stream in Stream::ALL {
        if let Some(path) = daemon.binding(stream).fifo_path() {
            redirect_stream(stream, path)?;
        }
    }
    Ok(())
}

/// Creates a named pipe. An existing file at `path` is an error.
pub(crate) fn create_fifo(path: &Path) -> DaemonResult<()> {
    let pipe_error = |source| DaemonError::PipeCreate {
        path: path.to_path_buf(),
        source,
    };

    let cpath = CString::new(path.as_os_str().as_bytes()).map_err(|_| {
        pipe_error(io::Error::new(
            io::ErrorKind::InvalidInput,
            "path contains a NUL byte",
        ))
    })?;
    if unsafe { libc::mkfifo(cpath.as_ptr(), FIFO_MODE) } < 0 {
        return Err(pipe_error(io::Error::last_os_error()));
    }
    Ok(())
}

/// Opens `path` in blocking mode and moves it onto the stream's descriptor.
///
/// The open does not return until a process opens the other end of the pipe.
fn redirect_stream(stream: Stream, path: &Path) -> DaemonResult<()> {
    let open_error = |source| DaemonError::PipeOpen {
        stream: stream.name(),
        path: path.to_path_buf(),
        source,
    };

    debug!(stream = stream.name(), path = %path.display(), "waiting for fifo peer");
    let file = if stream.is_input() {
        OpenOptions::new().read(true).open(path)
    } else {
        OpenOptions::new().append(true).open(path)
    }
    .map_err(open_error)?;

    // Buffered output belongs to the old target. Stderr is unbuffered.
    if stream == Stream::Stdout {
        flush_pending(&mut io::stdout())?;
    }

    if unsafe { libc::dup2(file.as_raw_fd(), stream.fd()) } < 0 {
        return Err(open_error(io::Error::last_os_error()));
    }
    Ok(())
}

/// Replaces the process image with the target program.
///
/// Never returns on success. The default `SIGPIPE` disposition is restored
/// for the target as part of the exec.
fn launch(daemon: &Daemon) -> DaemonResult<Infallible> {
    info!(program = %daemon.program().to_string_lossy(), "executing target");
    flush_pending(&mut io::stdout())?;

    let error = Command::new(daemon.program()).args(daemon.args()).exec();
    Err(DaemonError::exec(daemon.program().to_owned(), error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::{FileTypeExt, PermissionsExt};
    use tempfile::TempDir;

    #[test]
    fn pid_file_holds_decimal_pid_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.pid");

        write_pid_file(&path, 4242).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "4242");
    }

    #[test]
    fn pid_file_is_truncated_on_rewrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.pid");
        fs::write(&path, "1234567890\n").unwrap();

        write_pid_file(&path, 7).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "7");
    }

    #[test]
    fn pid_file_in_missing_directory_fails_on_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("t.pid");

        let error = write_pid_file(&path, 1).unwrap_err();

        assert!(matches!(
            error,
            DaemonError::Pidfile {
                action: PidfileAction::Open,
                ..
            }
        ));
        assert!(error.to_string().starts_with("failed to open "));
    }

    #[test]
    fn fifo_is_created_as_a_pipe() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.fifo");

        create_fifo(&path).unwrap();

        let metadata = fs::metadata(&path).unwrap();
        assert!(metadata.file_type().is_fifo());
        assert_eq!(metadata.permissions().mode() & 0o600, 0o600);
    }

    #[test]
    fn existing_path_is_not_reused_as_fifo() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("in.fifo");
        fs::write(&path, "").unwrap();

        let error = create_fifo(&path).unwrap_err();

        match error {
            DaemonError::PipeCreate { source, .. } => {
                assert_eq!(source.kind(), io::ErrorKind::AlreadyExists);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn exec_of_missing_program_exits_127() {
        let daemon = Daemon::new(["/path/does/not/exist"]).unwrap();

        let error = match launch(&daemon) {
            Err(error) => error,
            Ok(never) => match never {},
        };

        assert!(matches!(error, DaemonError::ExecNotFound { .. }));
        assert_eq!(error.exit_code(), 127);
        assert!(error.to_string().contains("/path/does/not/exist"));
    }

    #[test]
    fn exec_of_non_executable_file_exits_126() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("not-executable");
        fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o644)).unwrap();
        let daemon = Daemon::new([script.as_os_str()]).unwrap();

        let error = match launch(&daemon) {
            Err(error) => error,
            Ok(never) => match never {},
        };

        assert!(matches!(error, DaemonError::ExecFailed { .. }));
        assert_eq!(error.exit_code(), 126);
    }

    #[test]
    fn open_max_is_positive() {
        assert!(open_max() > 2);
    }
}
