use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;
use tracing::debug;

use daemonize::ExitFlusher;
use daemonize::cli::Cli;
use daemonize::telemetry;

fn main() -> ExitCode {
    let flusher = ExitFlusher::install();
    let code = run();
    flusher.finish(code)
}

fn run() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => return argument_error(err),
    };

    if let Err(err) = telemetry::initialise(cli.verbose) {
        let _ = writeln!(io::stderr(), "failed to initialise logging: {err}");
    }

    let daemon = match cli.into_daemon() {
        Ok(daemon) => daemon,
        Err(err) => return fatal(&err),
    };

    // Only the parent gets here with `Ok`; the child either became the
    // target program or is reporting why it could not.
    match daemon.start() {
        Ok(detached) => {
            debug!(child = detached.child, "parent exiting");
            ExitCode::SUCCESS
        }
        Err(err) => fatal(&err),
    }
}

fn fatal(err: &daemonize::DaemonError) -> ExitCode {
    let _ = writeln!(io::stderr(), "{err}");
    ExitCode::from(err.exit_code())
}

/// Help and version requests are not errors; everything else exits 1 with usage.
fn argument_error(err: clap::Error) -> ExitCode {
    let _ = err.print();
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}
