//! Error types for the local channel.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Errors surfaced while connecting to or exchanging messages with the agent.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The endpoint's host name did not resolve.
    #[error("failed to resolve channel endpoint {endpoint}: {source}")]
    Resolve {
        /// Endpoint being resolved.
        endpoint: String,
        /// Underlying resolver error.
        #[source]
        source: io::Error,
    },
    /// Resolution produced no addresses.
    #[error("no addresses resolved for channel endpoint {endpoint}")]
    ResolveEmpty {
        /// Endpoint being resolved.
        endpoint: String,
    },
    /// Connecting to the endpoint failed.
    #[error("failed to connect to channel endpoint {endpoint}: {source}")]
    Connect {
        /// Endpoint being connected.
        endpoint: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// Unix endpoints are unavailable on this platform.
    #[cfg(not(unix))]
    #[error("unix sockets are unsupported for channel endpoint {endpoint}")]
    UnsupportedUnix {
        /// Configured endpoint.
        endpoint: String,
    },
    /// Socket options could not be applied.
    #[error("failed to configure channel socket: {source}")]
    Configure {
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// The channel was closed by an earlier failure.
    #[error("local channel is closed")]
    Closed,
    /// The agent closed its end of the channel.
    #[error("agent closed the local channel")]
    Eof,
    /// No reply arrived within the relay timeout.
    #[error("no message from the agent within {}ms", timeout.as_millis())]
    Timeout {
        /// Configured read timeout.
        timeout: Duration,
    },
    /// Writing a message failed.
    #[error("failed to send message to the agent: {source}")]
    Send {
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// Reading a message failed.
    #[error("failed to receive message from the agent: {source}")]
    Receive {
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// A message exceeded the framing limit.
    #[error("channel message of {length} bytes exceeds the {max} byte limit")]
    MessageTooLarge {
        /// Announced or actual length.
        length: usize,
        /// Framing limit.
        max: usize,
    },
    /// A thread panicked while holding the channel lock.
    #[error("local channel lock poisoned")]
    Poisoned,
}
