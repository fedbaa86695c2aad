//! Process bootstrap: from the command line to a listening server.

mod errors;
mod launch;
mod shutdown;

pub use errors::LaunchError;
pub use launch::run_server;
#[cfg(test)]
pub(crate) use launch::{LaunchPlan, ProcessControl, ServiceDeps, run_with};
pub use shutdown::{
    ArmedShutdown, ArmedSignals, ShutdownError, ShutdownSignal, SystemShutdownSignal,
};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
