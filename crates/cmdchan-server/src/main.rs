//! Entry point for the `cmdchan-server` binary.
//!
//! Usage: `cmdchan-server <BIND_HOST> <BIND_PORT>`. The process runs until it
//! receives SIGTERM, SIGINT, SIGQUIT or SIGHUP.

use std::io::{self, Write};
use std::process::ExitCode;

use cmdchan_server::{LaunchError, run_server};

fn main() -> ExitCode {
    match run_server(std::env::args_os()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(LaunchError::Arguments { source }) => source.exit(),
        Err(error) => {
            let mut stderr = io::stderr().lock();
            drop(writeln!(stderr, "cmdchan-server: {error}"));
            ExitCode::FAILURE
        }
    }
}
