//! Configuration shared by the command-channel server and its tests.
//!
//! Runtime options come from the command line and `CMDCHAN_*` environment
//! variables ([`ServerArgs`]). TLS settings are not configured locally: the
//! agent sends them as the first local-channel message, parsed by
//! [`TlsConfig::parse`].

mod args;
pub mod defaults;
mod endpoint;
mod logging;
mod tls;

pub use args::ServerArgs;
pub use endpoint::{ChannelEndpoint, EndpointParseError};
pub use logging::{LogFormat, LogFormatParseError};
pub use tls::{TlsConfig, TlsConfigError};
