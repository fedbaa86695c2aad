//! Supervises server launch sequencing and shutdown.

use std::ffi::OsString;
use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use cmdchan_config::{ServerArgs, TlsConfig};
use cmdchan_protocol::LifecycleNotice;
use tracing::info;

use crate::channel::{ChannelConnector, SharedChannel, SystemChannelConnector};
use crate::dispatch::RequestDispatcher;
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::pipeline::{ConnectionPipeline, RequestHandler};
use crate::server::{CommandChannelServer, ServerFactory, TcpServerFactory};
use crate::telemetry;
use crate::tls::{PemTlsProvider, TlsProvider};

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ArmedShutdown, ShutdownSignal, SystemShutdownSignal};

/// Process-level collaborators needed to control the server lifecycle.
pub(crate) struct ProcessControl<S> {
    pub(crate) shutdown: S,
}

/// Service dependencies required to bring the server up.
pub(crate) struct ServiceDeps {
    pub(crate) connector: Box<dyn ChannelConnector>,
    pub(crate) tls: Box<dyn TlsProvider>,
    pub(crate) servers: Box<dyn ServerFactory>,
    pub(crate) reporter: Arc<dyn HealthReporter>,
}

/// Collaborators required to launch the server.
pub(crate) struct LaunchPlan<S> {
    pub(crate) process: ProcessControl<S>,
    pub(crate) services: ServiceDeps,
}

/// A server that is listening and has announced readiness.
struct Started {
    server: CommandChannelServer,
    address: SocketAddr,
}

/// Runs the server with production collaborators until a termination
/// signal arrives.
///
/// `argv` includes the program name, as returned by
/// [`std::env::args_os`].
///
/// # Errors
///
/// Returns [`LaunchError`] when the arguments are rejected or any startup
/// step fails. No readiness notice has been sent in that case.
pub fn run_server<I, T>(argv: I) -> Result<(), LaunchError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let plan = LaunchPlan {
        process: ProcessControl {
            shutdown: SystemShutdownSignal::new(),
        },
        services: ServiceDeps {
            connector: Box::new(SystemChannelConnector),
            tls: Box::new(PemTlsProvider),
            servers: Box::new(TcpServerFactory),
            reporter: Arc::new(StructuredHealthReporter::new()),
        },
    };
    run_with(argv, plan)
}

/// Runs the server with injected collaborators.
pub(crate) fn run_with<I, T, S>(argv: I, plan: LaunchPlan<S>) -> Result<(), LaunchError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    S: ShutdownSignal,
{
    let LaunchPlan { process, services } = plan;
    let ProcessControl { shutdown } = process;

    let args = ServerArgs::try_parse_from(argv)?;
    telemetry::initialise(&args)?;
    services.reporter.bootstrap_starting(&args);

    let (armed, Started { mut server, address }) = match start(&shutdown, &args, &services) {
        Ok(started) => started,
        Err(error) => {
            services.reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };
    services.reporter.bootstrap_succeeded(address);

    armed.wait();
    server.stop_listening();
    services.reporter.shutdown_complete();
    info!(target: PROCESS_TARGET, "shutdown sequence completed");
    Ok(())
}

/// Arms shutdown handling, then brings the server up. Handlers are in place
/// before readiness is announced.
fn start<S: ShutdownSignal>(
    shutdown: &S,
    args: &ServerArgs,
    services: &ServiceDeps,
) -> Result<(S::Armed, Started), LaunchError> {
    let armed = shutdown.install()?;
    let started = bring_up(args, services)?;
    Ok((armed, started))
}

fn bring_up(args: &ServerArgs, services: &ServiceDeps) -> Result<Started, LaunchError> {
    let channel = SharedChannel::new(
        services
            .connector
            .connect(&args.channel_endpoint, args.relay_timeout())?,
    );

    let tls_config = TlsConfig::parse(&channel.receive()?)?;
    services.reporter.tls_configured(&tls_config);
    let server_config = tls_config
        .enable_for_command_channel()
        .then(|| services.tls.server_config(&tls_config))
        .transpose()?;

    let dispatcher = Arc::new(RequestDispatcher::new(channel.clone()));
    let handler: Arc<dyn RequestHandler> = dispatcher.clone();
    let pipeline = ConnectionPipeline::new(server_config, handler, dispatcher);
    info!(
        target: PROCESS_TARGET,
        tls = pipeline.is_tls(),
        "connection pipeline configured"
    );
    let mut server = services.servers.create(Arc::new(pipeline));
    let address = server.start_listening(&args.bind_host, args.bind_port)?;

    if let Err(error) = announce(&channel) {
        server.stop_listening();
        return Err(error);
    }
    Ok(Started { server, address })
}

fn announce(channel: &SharedChannel) -> Result<(), LaunchError> {
    for notice in [LifecycleNotice::Started, LifecycleNotice::Ready] {
        channel.send(&notice.encode()?)?;
        info!(target: PROCESS_TARGET, ?notice, "announced lifecycle notice");
    }
    Ok(())
}
