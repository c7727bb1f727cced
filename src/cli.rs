//! Command-line surface of the `daemonize` binary.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::daemon::Daemon;
use crate::error::DaemonResult;

/// Daemonize a program.
#[derive(Debug, Parser)]
#[command(
    name = "daemonize",
    version,
    about = "Daemonize a program.",
    override_usage = "daemonize [options] <program> [arguments ...]"
)]
pub struct Cli {
    /// Named pipe to simulate stdin.
    #[arg(short = 'i', long = "stdin", value_name = "STDIN")]
    pub stdin: Option<PathBuf>,

    /// Named pipe to simulate stdout.
    #[arg(short = 'o', long = "stdout", value_name = "STDOUT")]
    pub stdout: Option<PathBuf>,

    /// Named pipe to simulate stderr.
    #[arg(short = 'e', long = "stderr", value_name = "STDERR")]
    pub stderr: Option<PathBuf>,

    /// File to write PID into.
    #[arg(short = 'p', long = "pidfile", value_name = "PIDFILE")]
    pub pidfile: Option<PathBuf>,

    /// Log what the daemonizer does on stderr (repeat for more detail).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Program to run, followed by its arguments.
    #[arg(
        value_name = "PROGRAM",
        required = true,
        num_args = 1..,
        trailing_var_arg = true
    )]
    pub command: Vec<OsString>,
}

impl Cli {
    /// Resolves the parsed flags into a daemon configuration.
    pub fn into_daemon(self) -> DaemonResult<Daemon> {
        let mut daemon = Daemon::new(self.command)?
            .stdin(self.stdin)
            .stdout(self.stdout)
            .stderr(self.stderr);
        if let Some(path) = self.pidfile {
            daemon = daemon.pid_file(path);
        }
        Ok(daemon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DaemonError;
    use crate::stdio::{Stdio, Stream};
    use std::path::Path;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("daemonize").chain(args.iter().copied()))
    }

    #[test]
    fn missing_program_is_an_argument_error() {
        let error = parse(&["-p", "/tmp/t.pid"]).unwrap_err();
        assert_eq!(
            error.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn unknown_flag_before_program_is_rejected() {
        let error = parse(&["--bogus", "/bin/true"]).unwrap_err();
        assert_eq!(error.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn misspelt_short_flag_is_not_taken_as_program() {
        let error = parse(&["-P", "/tmp/t.pid", "sleep", "1"]).unwrap_err();
        assert_eq!(error.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn flags_after_program_belong_to_it() {
        let cli = parse(&["-p", "/tmp/t.pid", "ls", "-l", "-p", "x"]).unwrap();
        let daemon = cli.into_daemon().unwrap();

        assert_eq!(daemon.program(), "ls");
        assert_eq!(
            daemon.args(),
            [OsString::from("-l"), OsString::from("-p"), OsString::from("x")]
        );
        assert_eq!(daemon.pid_file_path(), Some(Path::new("/tmp/t.pid")));
    }

    #[test]
    fn separator_is_not_passed_to_the_program() {
        let cli = parse(&["-o", "/tmp/out", "--", "grep", "-v", "x"]).unwrap();
        let daemon = cli.into_daemon().unwrap();

        assert_eq!(daemon.program(), "grep");
        assert_eq!(daemon.args(), [OsString::from("-v"), OsString::from("x")]);
        assert_eq!(daemon.binding(Stream::Stdout), &Stdio::fifo("/tmp/out"));
        assert_eq!(daemon.binding(Stream::Stdin), &Stdio::Keep);
    }

    #[test]
    fn long_flags_configure_every_stream() {
        let cli = parse(&[
            "--stdin", "/tmp/i", "--stdout", "/tmp/o", "--stderr", "/tmp/e", "cat",
        ])
        .unwrap();
        let daemon = cli.into_daemon().unwrap();

        assert_eq!(daemon.binding(Stream::Stdin), &Stdio::fifo("/tmp/i"));
        assert_eq!(daemon.binding(Stream::Stdout), &Stdio::fifo("/tmp/o"));
        assert_eq!(daemon.binding(Stream::Stderr), &Stdio::fifo("/tmp/e"));
        assert_eq!(daemon.pid_file_path(), None);
    }

    #[test]
    fn verbosity_counts_repeats() {
        let cli = parse(&["-vv", "true"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn empty_command_is_rejected_before_daemonizing() {
        let cli = Cli {
            stdin: None,
            stdout: None,
            stderr: None,
            pidfile: None,
            verbose: 0,
            command: Vec::new(),
        };
        assert!(matches!(cli.into_daemon(), Err(DaemonError::Argument(_))));
    }
}
