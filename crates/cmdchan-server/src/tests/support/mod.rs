//! Test harness utilities shared by the behavioural suites.

mod agent;
mod harness;
mod reporter;
mod shutdown;

pub use agent::{AgentBehaviour, FakeAgent, tls_config_message};
pub use harness::ServerHarness;
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use shutdown::TestShutdownSignal;

/// Removes the quotes Gherkin placeholders keep around string values.
pub fn strip_quotes(value: &str) -> &str {
    value.trim().trim_matches('"')
}
