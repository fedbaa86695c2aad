//! Test double for [`HealthReporter`] that records lifecycle events.

use std::net::SocketAddr;
use std::sync::Mutex;

use cmdchan_config::{ServerArgs, TlsConfig};

use crate::health::HealthReporter;
use crate::process::LaunchError;

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    /// Arguments parsed, startup beginning.
    BootstrapStarting,
    /// TLS settings received from the agent.
    TlsConfigured {
        /// Whether the command channel uses TLS.
        command_channel: bool,
    },
    /// Listener bound and readiness announced.
    BootstrapSucceeded(SocketAddr),
    /// Startup failed with an error description.
    BootstrapFailed(String),
    /// Listener stopped.
    ShutdownComplete,
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    /// Address reported by a successful bootstrap, if any.
    pub fn bound_address(&self) -> Option<SocketAddr> {
        self.events().into_iter().find_map(|event| match event {
            HealthEvent::BootstrapSucceeded(address) => Some(address),
            _ => None,
        })
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self, _args: &ServerArgs) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn tls_configured(&self, config: &TlsConfig) {
        self.record(HealthEvent::TlsConfigured {
            command_channel: config.enable_for_command_channel(),
        });
    }

    fn bootstrap_succeeded(&self, address: SocketAddr) {
        self.record(HealthEvent::BootstrapSucceeded(address));
    }

    fn bootstrap_failed(&self, error: &LaunchError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn shutdown_complete(&self) {
        self.record(HealthEvent::ShutdownComplete);
    }
}
