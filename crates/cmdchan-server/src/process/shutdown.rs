use std::io;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::info;

use super::PROCESS_TARGET;

/// Abstraction over shutdown notification mechanisms.
///
/// Notification is armed with [`install`](Self::install) before readiness is
/// announced, so a failure to arm it is still a startup failure.
pub trait ShutdownSignal: Send + Sync {
    /// Armed listener returned by [`install`](Self::install).
    type Armed: ArmedShutdown;

    /// Starts listening for shutdown requests.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError`] if the listener cannot be set up.
    fn install(&self) -> Result<Self::Armed, ShutdownError>;
}

/// A shutdown listener that is already receiving notifications.
pub trait ArmedShutdown {
    /// Blocks until shutdown should proceed.
    fn wait(self);
}

/// Errors reported by shutdown signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Shutdown listener that waits for termination signals.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShutdownSignal;

impl SystemShutdownSignal {
    /// Builds a signal listener.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ShutdownSignal for SystemShutdownSignal {
    type Armed = ArmedSignals;

    fn install(&self) -> Result<ArmedSignals, ShutdownError> {
        let signals = Signals::new([SIGTERM, SIGINT, SIGQUIT, SIGHUP])
            .map_err(|source| ShutdownError::Install { source })?;
        Ok(ArmedSignals { signals })
    }
}

/// Registered termination signal handlers.
pub struct ArmedSignals {
    signals: Signals,
}

impl ArmedShutdown for ArmedSignals {
    fn wait(mut self) {
        if let Some(signal) = self.signals.forever().next() {
            info!(target: PROCESS_TARGET, signal, "shutdown signal received");
        }
    }
}
