//! Default values for [`ServerArgs`](crate::ServerArgs).

#[cfg(unix)]
use std::env;
use std::time::Duration;

#[cfg(unix)]
use camino::Utf8PathBuf;
#[cfg(unix)]
use dirs::runtime_dir;
#[cfg(unix)]
use libc::geteuid;

use crate::{ChannelEndpoint, LogFormat};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default relay timeout in milliseconds.
pub const DEFAULT_RELAY_TIMEOUT_MS: u64 = 30_000;

/// Default TCP port of the local channel on hosts without Unix sockets.
pub const DEFAULT_CHANNEL_TCP_PORT: u16 = 9780;

/// Default log output format.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default time to wait for the executor's reply.
#[must_use]
pub const fn default_relay_timeout() -> Duration {
    Duration::from_millis(DEFAULT_RELAY_TIMEOUT_MS)
}

/// Computes the default local-channel endpoint.
///
/// Prefers `$XDG_RUNTIME_DIR/cmdchan/agent.sock`. Without a runtime directory
/// the socket lives under the temporary directory, namespaced by user id.
#[must_use]
pub fn default_channel_endpoint() -> ChannelEndpoint {
    default_channel_endpoint_inner()
}

#[cfg(unix)]
fn default_channel_endpoint_inner() -> ChannelEndpoint {
    let (mut base, namespaced) = match runtime_base_directory() {
        Some(dir) => (dir, false),
        None => (fallback_base_directory(), true),
    };
    base.push("cmdchan");
    if namespaced {
        base.push(user_namespace());
    }
    ChannelEndpoint::unix(base.join("agent.sock"))
}

#[cfg(unix)]
fn runtime_base_directory() -> Option<Utf8PathBuf> {
    runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}

#[cfg(unix)]
fn fallback_base_directory() -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(env::temp_dir()).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}

#[cfg(unix)]
fn user_namespace() -> String {
    // SAFETY: geteuid has no preconditions and cannot fail.
    let uid = unsafe { geteuid() };
    format!("uid-{uid}")
}

#[cfg(not(unix))]
fn default_channel_endpoint_inner() -> ChannelEndpoint {
    ChannelEndpoint::tcp("127.0.0.1", DEFAULT_CHANNEL_TCP_PORT)
}
