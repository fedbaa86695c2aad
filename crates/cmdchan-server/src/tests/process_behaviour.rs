//! Behavioural tests covering the server bootstrap sequence.

use std::cell::RefCell;
use std::net::TcpListener;
use std::time::Duration;

use cmdchan_config::ChannelEndpoint;
use cmdchan_protocol::LifecycleNotice;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use crate::process::LaunchError;
use crate::tests::support::{
    AgentBehaviour, FakeAgent, HealthEvent, ServerHarness, TestShutdownSignal, strip_quotes,
    tls_config_message,
};

const NOTICE_TIMEOUT: Duration = Duration::from_secs(2);

type StepResult = Result<(), String>;

struct ProcessWorld {
    agent: Option<FakeAgent>,
    endpoint: Option<ChannelEndpoint>,
    reserved: Option<TcpListener>,
    harness: ServerHarness,
}

impl ProcessWorld {
    fn new() -> Self {
        Self {
            agent: None,
            endpoint: None,
            reserved: None,
            harness: ServerHarness::new(),
        }
    }

    fn offer(&mut self, tls_config: Vec<u8>) {
        let agent = FakeAgent::start(tls_config, AgentBehaviour::Answer);
        self.endpoint = Some(agent.endpoint().clone());
        self.agent = Some(agent);
    }

    fn start(&mut self, port: &str) -> StepResult {
        let endpoint = self
            .endpoint
            .clone()
            .ok_or_else(|| String::from("no channel endpoint configured"))?;
        self.harness.launch("127.0.0.1", port, &endpoint);
        self.harness.wait_until_settled()?;
        Ok(())
    }

    fn agent(&self) -> Result<&FakeAgent, String> {
        self.agent
            .as_ref()
            .ok_or_else(|| String::from("no agent started"))
    }

    fn error(&self) -> Result<&LaunchError, String> {
        match self.harness.result() {
            Some(Err(error)) => Ok(error),
            Some(Ok(())) => Err(String::from("server run succeeded")),
            None => Err(String::from("server run has not finished")),
        }
    }
}

#[fixture]
fn world() -> RefCell<ProcessWorld> {
    RefCell::new(ProcessWorld::new())
}

#[given("an agent offering a plain TLS configuration")]
fn given_plain_agent(world: &RefCell<ProcessWorld>) {
    world.borrow_mut().offer(tls_config_message(None, false));
}

#[given("an agent offering a malformed TLS configuration")]
fn given_malformed_agent(world: &RefCell<ProcessWorld>) {
    world
        .borrow_mut()
        .offer(br#"{"tls_config":{"keystore_file":null}}"#.to_vec());
}

#[given("an agent enabling TLS without a keystore")]
fn given_tls_agent_without_keystore(world: &RefCell<ProcessWorld>) {
    world.borrow_mut().offer(tls_config_message(None, true));
}

#[given("no agent is listening")]
fn given_no_agent(world: &RefCell<ProcessWorld>) -> StepResult {
    let spare = TcpListener::bind(("127.0.0.1", 0)).map_err(|error| error.to_string())?;
    let port = spare
        .local_addr()
        .map_err(|error| error.to_string())?
        .port();
    drop(spare);
    world.borrow_mut().endpoint = Some(ChannelEndpoint::tcp("127.0.0.1", port));
    Ok(())
}

#[given("the bind port is already taken")]
fn given_port_taken(world: &RefCell<ProcessWorld>) -> StepResult {
    let reserved = TcpListener::bind(("127.0.0.1", 0)).map_err(|error| error.to_string())?;
    world.borrow_mut().reserved = Some(reserved);
    Ok(())
}

#[given("shutdown handling cannot be armed")]
fn given_refusing_shutdown(world: &RefCell<ProcessWorld>) {
    world.borrow_mut().harness = ServerHarness::with_shutdown(TestShutdownSignal::refusing());
}

#[when("the server starts on a free port")]
fn when_server_starts(world: &RefCell<ProcessWorld>) -> StepResult {
    world.borrow_mut().start("0")
}

#[when("the server starts on the taken port")]
fn when_server_starts_on_taken_port(world: &RefCell<ProcessWorld>) -> StepResult {
    let port = world
        .borrow()
        .reserved
        .as_ref()
        .ok_or_else(|| String::from("no port reserved"))?
        .local_addr()
        .map_err(|error| error.to_string())?
        .port();
    world.borrow_mut().start(&port.to_string())
}

#[when("the server starts with port {port}")]
fn when_server_starts_with_port(world: &RefCell<ProcessWorld>, port: String) -> StepResult {
    world.borrow_mut().start(strip_quotes(&port))
}

#[when("shutdown is triggered")]
fn when_shutdown(world: &RefCell<ProcessWorld>) -> StepResult {
    world.borrow_mut().harness.stop()
}

#[then("the agent received started then ready")]
fn then_started_then_ready(world: &RefCell<ProcessWorld>) -> StepResult {
    let binding = world.borrow();
    let agent = binding.agent()?;
    if !agent.wait_for_notices(2, NOTICE_TIMEOUT) {
        return Err(format!("expected two notices, saw {:?}", agent.notices()));
    }
    assert_eq!(
        agent.notices(),
        vec![LifecycleNotice::Started, LifecycleNotice::Ready]
    );
    Ok(())
}

#[then("the agent received no readiness notice")]
fn then_no_readiness(world: &RefCell<ProcessWorld>) -> StepResult {
    let binding = world.borrow();
    let notices = binding.agent()?.notices();
    assert!(
        notices.is_empty(),
        "no lifecycle notice should be sent after a failed startup: {notices:?}"
    );
    Ok(())
}

#[then("the health reporter saw the server come up")]
fn then_reporter_saw_startup(world: &RefCell<ProcessWorld>) {
    let events = world.borrow().harness.reporter().events();
    assert_eq!(events.first(), Some(&HealthEvent::BootstrapStarting));
    assert!(events.contains(&HealthEvent::TlsConfigured {
        command_channel: false
    }));
    assert!(matches!(
        events.last(),
        Some(HealthEvent::BootstrapSucceeded(address)) if address.port() != 0
    ));
}

#[then("the health reporter saw the shutdown")]
fn then_reporter_saw_shutdown(world: &RefCell<ProcessWorld>) {
    let events = world.borrow().harness.reporter().events();
    assert_eq!(events.last(), Some(&HealthEvent::ShutdownComplete));
}

#[then("the health reporter saw a bootstrap failure")]
fn then_reporter_saw_failure(world: &RefCell<ProcessWorld>) {
    let events = world.borrow().harness.reporter().events();
    assert!(
        matches!(events.last(), Some(HealthEvent::BootstrapFailed(_))),
        "expected a bootstrap failure, saw {events:?}"
    );
    assert!(
        !events
            .iter()
            .any(|event| matches!(event, HealthEvent::BootstrapSucceeded(_)))
    );
}

#[then("the server run succeeds")]
fn then_run_succeeds(world: &RefCell<ProcessWorld>) {
    let binding = world.borrow();
    let result = binding.harness.result().expect("server run should have finished");
    assert!(result.is_ok(), "server run should succeed: {result:?}");
}

#[then("the server run fails with a TLS configuration error")]
fn then_fails_with_tls_config(world: &RefCell<ProcessWorld>) -> StepResult {
    let binding = world.borrow();
    let error = binding.error()?;
    assert!(matches!(error, LaunchError::TlsConfig { .. }), "{error}");
    Ok(())
}

#[then("the server run fails with a TLS error")]
fn then_fails_with_tls(world: &RefCell<ProcessWorld>) -> StepResult {
    let binding = world.borrow();
    let error = binding.error()?;
    assert!(matches!(error, LaunchError::Tls { .. }), "{error}");
    Ok(())
}

#[then("the server run fails with a listener error")]
fn then_fails_with_listener(world: &RefCell<ProcessWorld>) -> StepResult {
    let binding = world.borrow();
    let error = binding.error()?;
    assert!(matches!(error, LaunchError::Listener { .. }), "{error}");
    Ok(())
}

#[then("the server run fails with an argument error")]
fn then_fails_with_arguments(world: &RefCell<ProcessWorld>) -> StepResult {
    let binding = world.borrow();
    let error = binding.error()?;
    assert!(matches!(error, LaunchError::Arguments { .. }), "{error}");
    Ok(())
}

#[then("the server run fails with a channel error")]
fn then_fails_with_channel(world: &RefCell<ProcessWorld>) -> StepResult {
    let binding = world.borrow();
    let error = binding.error()?;
    assert!(matches!(error, LaunchError::Channel { .. }), "{error}");
    Ok(())
}

#[then("the server run fails with a shutdown error")]
fn then_fails_with_shutdown(world: &RefCell<ProcessWorld>) -> StepResult {
    let binding = world.borrow();
    let error = binding.error()?;
    assert!(matches!(error, LaunchError::Shutdown { .. }), "{error}");
    Ok(())
}

#[then("the local channel was never dialled")]
fn then_never_dialled(world: &RefCell<ProcessWorld>) {
    assert_eq!(world.borrow().harness.connect_attempts(), 0);
}

#[scenario(
    path = "tests/features/server_process.feature",
    name = "Startup announces started then ready"
)]
fn startup_announces_readiness(world: RefCell<ProcessWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/server_process.feature",
    name = "A malformed TLS configuration suppresses readiness"
)]
fn malformed_tls_config_is_fatal(world: RefCell<ProcessWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/server_process.feature",
    name = "TLS without a keystore suppresses readiness"
)]
fn tls_without_keystore_is_fatal(world: RefCell<ProcessWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/server_process.feature",
    name = "A bind failure suppresses readiness"
)]
fn bind_failure_is_fatal(world: RefCell<ProcessWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/server_process.feature",
    name = "A non-numeric port fails before connecting"
)]
fn bad_port_is_fatal(world: RefCell<ProcessWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/server_process.feature",
    name = "An unreachable agent is fatal"
)]
fn unreachable_agent_is_fatal(world: RefCell<ProcessWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/server_process.feature",
    name = "Shutdown handling is armed before readiness"
)]
fn unarmed_shutdown_is_fatal(world: RefCell<ProcessWorld>) {
    drop(world);
}
