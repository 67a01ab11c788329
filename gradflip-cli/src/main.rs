//! CLI entry point for running gradflip attacks.
//!
//! Parses arguments with clap, runs the requested command, renders the
//! summary to stdout, and maps errors to a failing exit code. Logging is
//! initialised first so every later step can emit structured diagnostics.

use std::io::{self, BufWriter, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use gradflip_cli::{
    cli::{Cli, FailureCodes, render_summary, run_cli},
    logging::{self, LoggingError},
};
use tracing::{error, field};

/// Parse CLI arguments, execute the command, render the summary, and flush the
/// output stream.
fn try_main() -> Result<()> {
    let cli = Cli::parse();
    let summary = run_cli(cli).context("failed to execute command")?;
    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    render_summary(&summary, &mut writer).context("failed to render summary")?;
    writer.flush().context("failed to flush output")?;
    Ok(())
}

fn main() -> ExitCode {
    if let Err(err) = logging::init_logging() {
        report_logging_init_error(&err);
        return ExitCode::FAILURE;
    }
    match try_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log_failure(&err);
            ExitCode::FAILURE
        }
    }
}

fn log_failure(err: &anyhow::Error) {
    let codes = FailureCodes::from_anyhow(err);
    let display_code = |code: Option<&'static str>| code.map(field::display);
    error!(
        error = %err,
        code = display_code(codes.attack.map(|code| code.as_str())),
        kind = codes.kind.map(field::debug),
        oracle_code = display_code(codes.oracle.map(|code| code.as_str())),
        violation_code = display_code(codes.violation.map(|code| code.as_str())),
        "command execution failed"
    );
}

#[expect(
    clippy::print_stderr,
    reason = "Emit one-off diagnostic before tracing is initialized"
)]
fn report_logging_init_error(err: &LoggingError) {
    eprintln!("failed to initialize logging: {err}");
}
