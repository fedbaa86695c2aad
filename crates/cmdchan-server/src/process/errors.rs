//! Defines the unified error surface for server startup and supervision.

use cmdchan_config::TlsConfigError;
use cmdchan_protocol::RelayError;
use thiserror::Error;

use crate::channel::ChannelError;
use crate::telemetry::TelemetryError;
use crate::tls::TlsProviderError;
use crate::transport::ListenerError;

use super::shutdown::ShutdownError;

/// Errors surfaced while launching or supervising the server process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The command line was rejected, or help or version output was asked for.
    #[error("{source}")]
    Arguments {
        /// Parser error, including its rendered usage.
        #[source]
        source: clap::Error,
    },
    /// Structured logging could not be installed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The local channel failed during startup.
    #[error("local channel failed during startup: {source}")]
    Channel {
        /// Underlying channel error.
        #[source]
        source: ChannelError,
    },
    /// The agent sent a TLS configuration that did not parse.
    #[error("invalid TLS configuration from agent: {source}")]
    TlsConfig {
        /// Underlying parse error.
        #[source]
        source: TlsConfigError,
    },
    /// The TLS server configuration could not be built.
    #[error("failed to configure TLS: {source}")]
    Tls {
        /// Underlying provider error.
        #[source]
        source: TlsProviderError,
    },
    /// The command listener could not be bound or stopped.
    #[error("command listener failed: {source}")]
    Listener {
        /// Underlying listener error.
        #[source]
        source: ListenerError,
    },
    /// A lifecycle notice could not be encoded.
    #[error("failed to encode lifecycle notice: {source}")]
    Announce {
        /// Underlying relay error.
        #[source]
        source: RelayError,
    },
    /// Shutdown notification could not be armed.
    #[error("failed to arm shutdown handling: {source}")]
    Shutdown {
        /// Underlying signal error.
        #[source]
        source: ShutdownError,
    },
}

impl From<clap::Error> for LaunchError {
    fn from(source: clap::Error) -> Self {
        Self::Arguments { source }
    }
}

impl From<TelemetryError> for LaunchError {
    fn from(source: TelemetryError) -> Self {
        Self::Telemetry { source }
    }
}

impl From<ChannelError> for LaunchError {
    fn from(source: ChannelError) -> Self {
        Self::Channel { source }
    }
}

impl From<TlsConfigError> for LaunchError {
    fn from(source: TlsConfigError) -> Self {
        Self::TlsConfig { source }
    }
}

impl From<TlsProviderError> for LaunchError {
    fn from(source: TlsProviderError) -> Self {
        Self::Tls { source }
    }
}

impl From<ListenerError> for LaunchError {
    fn from(source: ListenerError) -> Self {
        Self::Listener { source }
    }
}

impl From<RelayError> for LaunchError {
    fn from(source: RelayError) -> Self {
        Self::Announce { source }
    }
}

impl From<ShutdownError> for LaunchError {
    fn from(source: ShutdownError) -> Self {
        Self::Shutdown { source }
    }
}
