//! Entry point for the `jobrelayd` binary.

use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    match jobrelayd::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            // Telemetry may not be installed when bootstrap fails.
            drop(writeln!(io::stderr(), "jobrelayd: {error}"));
            ExitCode::FAILURE
        }
    }
}
