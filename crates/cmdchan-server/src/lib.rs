//! Command-channel server for the agent's remote management interface.
//!
//! The server accepts TCP connections (optionally TLS) from a remote
//! management process, decodes binary request frames, relays each request
//! to the agent's command executor over a local channel and writes the
//! executor's answer back as a response frame.
//!
//! Startup is driven by [`run_server`]: parse the listen address, connect
//! the local channel, read the agent's TLS settings from it, bind the
//! listener and announce readiness. Failures before readiness are fatal and
//! reported through a [`HealthReporter`].
//!
//! Each connection runs on its own worker thread. The local channel is
//! shared by all of them and serialises whole request/reply exchanges.

pub mod channel;
pub mod dispatch;
mod health;
pub mod pipeline;
mod process;
pub mod server;
mod telemetry;
pub mod tls;
pub mod transport;

pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{
    ArmedShutdown, ArmedSignals, LaunchError, ShutdownError, ShutdownSignal,
    SystemShutdownSignal, run_server,
};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
