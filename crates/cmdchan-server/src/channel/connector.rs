//! Opens the local channel from a configured endpoint.

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use cmdchan_config::ChannelEndpoint;
use tracing::info;

use super::socket::ChannelStream;
use super::{CHANNEL_TARGET, ChannelError, LocalChannel, SocketChannel};

#[cfg(unix)]
use socket2::{Domain, SockAddr, Socket, Type};
#[cfg(unix)]
use std::os::unix::net::UnixStream;

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Creates the local channel for an endpoint.
pub trait ChannelConnector: Send + Sync {
    /// Connects to `endpoint`. Reads on the returned channel give up after
    /// `relay_timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] when the endpoint cannot be reached.
    fn connect(
        &self,
        endpoint: &ChannelEndpoint,
        relay_timeout: Duration,
    ) -> Result<Box<dyn LocalChannel>, ChannelError>;
}

/// Connector for real Unix and TCP sockets.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemChannelConnector;

impl ChannelConnector for SystemChannelConnector {
    fn connect(
        &self,
        endpoint: &ChannelEndpoint,
        relay_timeout: Duration,
    ) -> Result<Box<dyn LocalChannel>, ChannelError> {
        let stream = match endpoint {
            ChannelEndpoint::Tcp { host, port } => {
                let address = resolve_tcp_address(endpoint, host, *port)?;
                TcpStream::connect_timeout(&address, CONNECTION_TIMEOUT)
                    .map(ChannelStream::Tcp)
                    .map_err(|source| ChannelError::Connect {
                        endpoint: endpoint.to_string(),
                        source,
                    })?
            }
            ChannelEndpoint::Unix { path } => connect_unix(endpoint, path.as_str())?,
        };
        info!(
            target: CHANNEL_TARGET,
            endpoint = %endpoint,
            "connected to local channel"
        );
        let channel = SocketChannel::new(stream, endpoint.to_string(), relay_timeout)?;
        Ok(Box::new(channel))
    }
}

fn resolve_tcp_address(
    endpoint: &ChannelEndpoint,
    host: &str,
    port: u16,
) -> Result<SocketAddr, ChannelError> {
    (host, port)
        .to_socket_addrs()
        .map_err(|source| ChannelError::Resolve {
            endpoint: endpoint.to_string(),
            source,
        })?
        .next()
        .ok_or_else(|| ChannelError::ResolveEmpty {
            endpoint: endpoint.to_string(),
        })
}

#[cfg(unix)]
fn connect_unix(endpoint: &ChannelEndpoint, path: &str) -> Result<ChannelStream, ChannelError> {
    let connect = || -> std::io::Result<UnixStream> {
        let socket = Socket::new(Domain::UNIX, Type::STREAM, None)?;
        let address = SockAddr::unix(path)?;
        socket.connect_timeout(&address, CONNECTION_TIMEOUT)?;
        Ok(socket.into())
    };
    connect()
        .map(ChannelStream::Unix)
        .map_err(|source| ChannelError::Connect {
            endpoint: endpoint.to_string(),
            source,
        })
}

#[cfg(not(unix))]
fn connect_unix(endpoint: &ChannelEndpoint, _path: &str) -> Result<ChannelStream, ChannelError> {
    Err(ChannelError::UnsupportedUnix {
        endpoint: endpoint.to_string(),
    })
}
