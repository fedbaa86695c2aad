//! Runs the server bootstrap on a background thread with test collaborators.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use cmdchan_config::ChannelEndpoint;

use super::{RecordingHealthReporter, TestShutdownSignal};
use crate::channel::{ChannelConnector, ChannelError, LocalChannel, SystemChannelConnector};
use crate::process::{LaunchError, LaunchPlan, ProcessControl, ServiceDeps, run_with};
use crate::server::TcpServerFactory;
use crate::tls::PemTlsProvider;

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Real connector that counts connection attempts.
struct CountingConnector {
    attempts: Arc<AtomicUsize>,
}

impl ChannelConnector for CountingConnector {
    fn connect(
        &self,
        endpoint: &ChannelEndpoint,
        relay_timeout: Duration,
    ) -> Result<Box<dyn LocalChannel>, ChannelError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        SystemChannelConnector.connect(endpoint, relay_timeout)
    }
}

/// One server run, from launch to shutdown.
pub struct ServerHarness {
    reporter: Arc<RecordingHealthReporter>,
    shutdown: TestShutdownSignal,
    attempts: Arc<AtomicUsize>,
    handle: Option<JoinHandle<Result<(), LaunchError>>>,
    result: Option<Result<(), LaunchError>>,
}

impl ServerHarness {
    /// Builds an idle harness.
    pub fn new() -> Self {
        Self::with_shutdown(TestShutdownSignal::new())
    }

    /// Builds an idle harness that launches with `shutdown`.
    pub fn with_shutdown(shutdown: TestShutdownSignal) -> Self {
        Self {
            reporter: Arc::new(RecordingHealthReporter::default()),
            shutdown,
            attempts: Arc::new(AtomicUsize::new(0)),
            handle: None,
            result: None,
        }
    }

    /// Starts `cmdchan-server <host> <port>` against `endpoint`.
    pub fn launch(&mut self, host: &str, port: &str, endpoint: &ChannelEndpoint) {
        let argv = vec![
            String::from("cmdchan-server"),
            host.to_owned(),
            port.to_owned(),
            format!("--channel-endpoint={endpoint}"),
            String::from("--log-filter=warn"),
            String::from("--relay-timeout-ms=2000"),
        ];
        let plan = LaunchPlan {
            process: ProcessControl {
                shutdown: self.shutdown.clone(),
            },
            services: ServiceDeps {
                connector: Box::new(CountingConnector {
                    attempts: Arc::clone(&self.attempts),
                }),
                tls: Box::new(PemTlsProvider),
                servers: Box::new(TcpServerFactory),
                reporter: self.reporter.clone(),
            },
        };
        self.handle = Some(thread::spawn(move || run_with(argv, plan)));
    }

    /// Waits until the server is ready or its run has ended.
    ///
    /// Returns the bound address when the server came up.
    pub fn wait_until_settled(&mut self) -> Result<Option<SocketAddr>, String> {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        while Instant::now() < deadline {
            if let Some(address) = self.reporter.bound_address() {
                return Ok(Some(address));
            }
            if self.handle.as_ref().is_some_and(JoinHandle::is_finished) {
                self.join()?;
                return Ok(None);
            }
            thread::sleep(POLL_INTERVAL);
        }
        Err(String::from("server neither became ready nor exited"))
    }

    /// Triggers shutdown and waits for the run to finish.
    pub fn stop(&mut self) -> Result<(), String> {
        self.shutdown.trigger();
        self.join()
    }

    fn join(&mut self) -> Result<(), String> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| String::from("server not running"))?;
        let result = handle
            .join()
            .map_err(|_| String::from("server thread panicked"))?;
        self.result = Some(result);
        Ok(())
    }

    /// Outcome of a finished run.
    pub fn result(&self) -> Option<&Result<(), LaunchError>> {
        self.result.as_ref()
    }

    /// Number of times the local channel was dialled.
    pub fn connect_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Lifecycle events seen by the health reporter.
    pub fn reporter(&self) -> &RecordingHealthReporter {
        &self.reporter
    }
}

impl Drop for ServerHarness {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}
