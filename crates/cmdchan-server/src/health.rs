//! Structured health reporting for server lifecycle events.

use std::net::SocketAddr;
use std::sync::Arc;

use cmdchan_config::{ServerArgs, TlsConfig};

use crate::process::LaunchError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked once arguments are parsed, before the local channel is opened.
    fn bootstrap_starting(&self, args: &ServerArgs);

    /// Invoked after the agent's TLS configuration has been parsed.
    fn tls_configured(&self, config: &TlsConfig);

    /// Invoked after the listener is bound and readiness has been announced.
    fn bootstrap_succeeded(&self, address: SocketAddr);

    /// Invoked when any startup step fails.
    fn bootstrap_failed(&self, error: &LaunchError);

    /// Invoked after the listener has stopped.
    fn shutdown_complete(&self);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter + ?Sized,
{
    fn bootstrap_starting(&self, args: &ServerArgs) {
        (**self).bootstrap_starting(args);
    }

    fn tls_configured(&self, config: &TlsConfig) {
        (**self).tls_configured(config);
    }

    fn bootstrap_succeeded(&self, address: SocketAddr) {
        (**self).bootstrap_succeeded(address);
    }

    fn bootstrap_failed(&self, error: &LaunchError) {
        (**self).bootstrap_failed(error);
    }

    fn shutdown_complete(&self) {
        (**self).shutdown_complete();
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self, args: &ServerArgs) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            bind_host = %args.bind_host,
            bind_port = args.bind_port,
            channel = %args.channel_endpoint,
            relay_timeout_ms = args.relay_timeout_ms,
            "starting command channel server"
        );
    }

    fn tls_configured(&self, config: &TlsConfig) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "tls_configured",
            command_channel = config.enable_for_command_channel(),
            backing_storage = config.enable_for_backing_storage(),
            hostname_verification = !config.disable_hostname_verification(),
            keystore = ?config.keystore_file(),
            "received TLS configuration"
        );
    }

    fn bootstrap_succeeded(&self, address: SocketAddr) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            %address,
            "command channel server ready"
        );
    }

    fn bootstrap_failed(&self, error: &LaunchError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "command channel server failed to start"
        );
    }

    fn shutdown_complete(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "shutdown_complete",
            "command channel server stopped"
        );
    }
}
