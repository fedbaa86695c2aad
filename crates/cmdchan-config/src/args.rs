use std::time::Duration;

use clap::Parser;

use crate::defaults::{DEFAULT_LOG_FILTER, DEFAULT_RELAY_TIMEOUT_MS, default_channel_endpoint};
use crate::{ChannelEndpoint, LogFormat};

/// Command line of the `cmdchan-server` binary.
///
/// The two positional arguments name the listen address. Everything else has
/// a default and can be overridden through `CMDCHAN_*` environment variables.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "cmdchan-server",
    version,
    about = "Accepts remote management commands and relays them to the local agent"
)]
pub struct ServerArgs {
    /// Host name or address to listen on.
    #[arg(value_name = "BIND_HOST")]
    pub bind_host: String,

    /// TCP port to listen on.
    #[arg(value_name = "BIND_PORT")]
    pub bind_port: u16,

    /// Local channel to the agent's command executor.
    #[arg(
        long,
        env = "CMDCHAN_CHANNEL_ENDPOINT",
        value_name = "URL",
        default_value_t = default_channel_endpoint()
    )]
    pub channel_endpoint: ChannelEndpoint,

    /// Tracing filter directive, as understood by `EnvFilter`.
    #[arg(
        long,
        env = "CMDCHAN_LOG_FILTER",
        value_name = "FILTER",
        default_value = DEFAULT_LOG_FILTER
    )]
    pub log_filter: String,

    /// Log output format.
    #[arg(
        long,
        env = "CMDCHAN_LOG_FORMAT",
        value_name = "FORMAT",
        default_value_t = LogFormat::Json
    )]
    pub log_format: LogFormat,

    /// Milliseconds to wait for the executor to answer a relayed request.
    /// Must be at least one.
    #[arg(
        long,
        env = "CMDCHAN_RELAY_TIMEOUT_MS",
        value_name = "MILLIS",
        default_value_t = DEFAULT_RELAY_TIMEOUT_MS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub relay_timeout_ms: u64,
}

impl ServerArgs {
    /// Relay timeout as a [`Duration`].
    #[must_use]
    pub const fn relay_timeout(&self) -> Duration {
        Duration::from_millis(self.relay_timeout_ms)
    }
}
